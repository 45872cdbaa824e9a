//! Call result API handlers.

use axum::{
    extract::{Query, State},
    http::{header, StatusCode},
    response::IntoResponse,
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use callrunner_core::{
    outcomes_to_csv, CallStatistics, OutcomeError, OutcomeFilter, OutcomeRecord, OutcomeStatus,
};

use super::handlers::{error_response, ErrorResponse};
use crate::state::AppState;

/// Maximum allowed limit for result queries
const MAX_LIMIT: i64 = 1000;

/// Default limit for result queries
const DEFAULT_LIMIT: i64 = 100;

// ============================================================================
// Request/Response Types
// ============================================================================

/// Query parameters for listing results
#[derive(Debug, Deserialize)]
pub struct ListResultsParams {
    pub lead_id: Option<String>,
    pub run_id: Option<String>,
    /// completed, failed or timed_out
    pub status: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

/// Query parameters for a results export
#[derive(Debug, Default, Deserialize)]
pub struct DownloadResultsParams {
    pub run_id: Option<String>,
    pub status: Option<String>,
}

/// Response for listing results
#[derive(Debug, Serialize)]
pub struct ListResultsResponse {
    pub results: Vec<OutcomeRecord>,
    pub limit: i64,
    pub offset: i64,
}

fn parse_status(status: &str) -> Result<OutcomeStatus, (StatusCode, Json<ErrorResponse>)> {
    status
        .parse()
        .map_err(|e: String| error_response(StatusCode::BAD_REQUEST, e))
}

fn outcome_error(e: OutcomeError) -> (StatusCode, Json<ErrorResponse>) {
    let status = match &e {
        OutcomeError::NotFound(_) => StatusCode::NOT_FOUND,
        OutcomeError::Database(_) | OutcomeError::Export(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    error_response(status, e.to_string())
}

// ============================================================================
// Handlers
// ============================================================================

/// List outcome records, newest first
pub async fn list_results(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ListResultsParams>,
) -> Result<Json<ListResultsResponse>, (StatusCode, Json<ErrorResponse>)> {
    let limit = params.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);
    let offset = params.offset.unwrap_or(0).max(0);

    let mut filter = OutcomeFilter::new().with_limit(limit).with_offset(offset);

    if let Some(lead_id) = params.lead_id {
        filter = filter.with_lead(lead_id);
    }

    if let Some(run_id) = params.run_id {
        filter = filter.with_run(run_id);
    }

    if let Some(ref status) = params.status {
        filter = filter.with_status(parse_status(status)?);
    }

    let results = state.results().list(&filter).map_err(outcome_error)?;

    Ok(Json(ListResultsResponse {
        results,
        limit,
        offset,
    }))
}

/// Aggregate call statistics
pub async fn statistics(
    State(state): State<Arc<AppState>>,
) -> Result<Json<CallStatistics>, (StatusCode, Json<ErrorResponse>)> {
    state
        .results()
        .statistics()
        .map(Json)
        .map_err(outcome_error)
}

/// Export outcome records as CSV, newest first
pub async fn download_results(
    State(state): State<Arc<AppState>>,
    Query(params): Query<DownloadResultsParams>,
) -> Result<impl IntoResponse, (StatusCode, Json<ErrorResponse>)> {
    let mut filter = OutcomeFilter::new().with_limit(i64::MAX);

    if let Some(run_id) = params.run_id {
        filter = filter.with_run(run_id);
    }

    if let Some(ref status) = params.status {
        filter = filter.with_status(parse_status(status)?);
    }

    let records = state.results().list(&filter).map_err(outcome_error)?;
    let body = outcomes_to_csv(&records).map_err(outcome_error)?;
    tracing::debug!("Exported {} outcome records", records.len());

    Ok((
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8"),
            (
                header::CONTENT_DISPOSITION,
                "attachment; filename=\"campaign_results.csv\"",
            ),
        ],
        body,
    ))
}
