//! Lead API handlers.

use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::IntoResponse,
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use callrunner_core::{
    parse_leads_csv, CreateLeadRequest, Lead, LeadError, LeadFilter, LeadStatus,
    LEAD_CSV_TEMPLATE,
};

use super::handlers::{error_response, ErrorResponse};
use crate::state::AppState;

/// Maximum allowed limit for lead queries
const MAX_LIMIT: i64 = 1000;

/// Default limit for lead queries
const DEFAULT_LIMIT: i64 = 100;

// ============================================================================
// Request/Response Types
// ============================================================================

/// Request body for one lead
#[derive(Debug, Deserialize)]
pub struct CreateLeadBody {
    pub contact_number: String,
    pub business_name: String,
    pub contact_name: String,
    #[serde(default)]
    pub business_type: String,
    #[serde(default)]
    pub company_size: String,
    pub current_challenges: Option<String>,
    pub best_call_time: Option<String>,
}

impl From<CreateLeadBody> for CreateLeadRequest {
    fn from(body: CreateLeadBody) -> Self {
        Self {
            contact_number: body.contact_number,
            business_name: body.business_name,
            contact_name: body.contact_name,
            business_type: body.business_type,
            company_size: body.company_size,
            current_challenges: body.current_challenges,
            best_call_time: body.best_call_time,
        }
    }
}

/// Either a single lead or a batch import
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum CreateLeadsBody {
    Batch { leads: Vec<CreateLeadBody> },
    Single(CreateLeadBody),
}

/// Response for lead creation
#[derive(Debug, Serialize)]
pub struct CreateLeadsResponse {
    pub created: usize,
    pub leads: Vec<Lead>,
}

/// Query parameters for listing leads
#[derive(Debug, Deserialize)]
pub struct ListLeadsParams {
    /// Filter by status
    pub status: Option<String>,
    /// Filter by classification
    pub business_type: Option<String>,
    /// Filter by size bucket
    pub company_size: Option<String>,
    /// Maximum number of leads to return
    pub limit: Option<i64>,
    /// Pagination offset
    pub offset: Option<i64>,
}

/// Response for listing leads
#[derive(Debug, Serialize)]
pub struct ListLeadsResponse {
    pub leads: Vec<Lead>,
    pub total: i64,
    pub limit: i64,
    pub offset: i64,
}

fn lead_error(e: LeadError) -> (StatusCode, Json<ErrorResponse>) {
    let status = match &e {
        LeadError::NotFound(_) => StatusCode::NOT_FOUND,
        LeadError::Invalid(_) => StatusCode::BAD_REQUEST,
        LeadError::InvalidTransition { .. } => StatusCode::CONFLICT,
        LeadError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    error_response(status, e.to_string())
}

impl ListLeadsParams {
    fn to_filter(&self) -> Result<LeadFilter, (StatusCode, Json<ErrorResponse>)> {
        let limit = self.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);
        let offset = self.offset.unwrap_or(0).max(0);

        let mut filter = LeadFilter::new().with_limit(limit).with_offset(offset);

        if let Some(ref status) = self.status {
            let status: LeadStatus = status
                .parse()
                .map_err(|e: String| error_response(StatusCode::BAD_REQUEST, e))?;
            filter = filter.with_status(status);
        }

        if let Some(ref business_type) = self.business_type {
            filter = filter.with_business_types(vec![business_type.clone()]);
        }

        if let Some(ref company_size) = self.company_size {
            filter = filter.with_company_sizes(vec![company_size.clone()]);
        }

        Ok(filter)
    }
}

// ============================================================================
// Handlers
// ============================================================================

/// Import one lead or a batch
///
/// A batch is validated as a whole before anything is stored.
pub async fn create_leads(
    State(state): State<Arc<AppState>>,
    Json(body): Json<CreateLeadsBody>,
) -> Result<(StatusCode, Json<CreateLeadsResponse>), (StatusCode, Json<ErrorResponse>)> {
    let bodies = match body {
        CreateLeadsBody::Batch { leads } => leads,
        CreateLeadsBody::Single(lead) => vec![lead],
    };

    if bodies.is_empty() {
        return Err(error_response(StatusCode::BAD_REQUEST, "No leads given"));
    }

    for (index, body) in bodies.iter().enumerate() {
        if body.business_name.trim().is_empty() {
            return Err(error_response(
                StatusCode::BAD_REQUEST,
                format!("Lead {}: business_name is required", index),
            ));
        }
    }

    store_leads(&state, bodies.into_iter().map(CreateLeadRequest::from).collect())
}

/// Import leads from a CSV upload
///
/// The body is the raw CSV file. The upload is rejected as a whole if any
/// row is invalid.
pub async fn upload_leads(
    State(state): State<Arc<AppState>>,
    body: String,
) -> Result<(StatusCode, Json<CreateLeadsResponse>), (StatusCode, Json<ErrorResponse>)> {
    let requests = parse_leads_csv(body.as_bytes()).map_err(lead_error)?;
    store_leads(&state, requests)
}

/// Example CSV for uploads
pub async fn lead_template() -> impl IntoResponse {
    (
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8"),
            (
                header::CONTENT_DISPOSITION,
                "attachment; filename=\"leads_template.csv\"",
            ),
        ],
        LEAD_CSV_TEMPLATE,
    )
}

fn store_leads(
    state: &AppState,
    requests: Vec<CreateLeadRequest>,
) -> Result<(StatusCode, Json<CreateLeadsResponse>), (StatusCode, Json<ErrorResponse>)> {
    let mut leads = Vec::with_capacity(requests.len());
    for request in requests {
        let lead = state.leads().create(request).map_err(lead_error)?;
        leads.push(lead);
    }

    tracing::info!("Imported {} leads", leads.len());
    Ok((
        StatusCode::CREATED,
        Json(CreateLeadsResponse {
            created: leads.len(),
            leads,
        }),
    ))
}

/// List leads with optional filters
pub async fn list_leads(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ListLeadsParams>,
) -> Result<Json<ListLeadsResponse>, (StatusCode, Json<ErrorResponse>)> {
    let filter = params.to_filter()?;

    let leads = state.leads().list(&filter).map_err(lead_error)?;
    let total = state.leads().count(&filter).map_err(lead_error)?;

    Ok(Json(ListLeadsResponse {
        leads,
        total,
        limit: filter.limit,
        offset: filter.offset,
    }))
}

/// List pending leads (the dial queue)
pub async fn list_pending(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ListLeadsParams>,
) -> Result<Json<ListLeadsResponse>, (StatusCode, Json<ErrorResponse>)> {
    let filter = params.to_filter()?.with_status(LeadStatus::Pending);

    let leads = state.leads().list_pending(&filter).map_err(lead_error)?;
    let total = state.leads().count(&filter).map_err(lead_error)?;

    Ok(Json(ListLeadsResponse {
        leads,
        total,
        limit: filter.limit,
        offset: filter.offset,
    }))
}

/// Get a lead by ID
pub async fn get_lead(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Lead>, (StatusCode, Json<ErrorResponse>)> {
    match state.leads().get(&id) {
        Ok(Some(lead)) => Ok(Json(lead)),
        Ok(None) => Err(error_response(
            StatusCode::NOT_FOUND,
            format!("Lead not found: {}", id),
        )),
        Err(e) => Err(lead_error(e)),
    }
}
