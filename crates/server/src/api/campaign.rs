//! Campaign API handlers.

use axum::{extract::State, http::StatusCode, Json};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{error, info};

use callrunner_core::{
    CampaignError, CampaignFilters, CampaignStatus, RunHandle, RunOptions, StopAck,
};

use super::handlers::{error_response, ErrorResponse};
use crate::state::AppState;

// ============================================================================
// Request Types
// ============================================================================

/// Request body for starting a campaign
#[derive(Debug, Default, Deserialize)]
pub struct StartCampaignBody {
    #[serde(flatten)]
    pub filters: CampaignFilters,
    #[serde(flatten)]
    pub options: RunOptions,
}

/// Request body for retrying failed calls
#[derive(Debug, Default, Deserialize)]
pub struct RetryBody {
    /// Only retry leads whose failure was recorded after this instant
    pub since: Option<DateTime<Utc>>,
    /// Look-back in hours when `since` is absent (0 = all history)
    pub window_hours: Option<u64>,
    #[serde(flatten)]
    pub options: RunOptions,
}

// ============================================================================
// Handlers
// ============================================================================

fn campaign_error(e: CampaignError) -> (StatusCode, Json<ErrorResponse>) {
    let status = match &e {
        CampaignError::AlreadyRunning { .. } => StatusCode::CONFLICT,
        CampaignError::NoEligibleLeads => StatusCode::NOT_FOUND,
        CampaignError::RetryDisabled => StatusCode::FORBIDDEN,
        CampaignError::InvalidOptions(_) => StatusCode::BAD_REQUEST,
        CampaignError::LeadStore(_) | CampaignError::ResultSink(_) => {
            error!("Campaign storage error: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR
        }
    };
    error_response(status, e.to_string())
}

/// Start a campaign run
pub async fn start(
    State(state): State<Arc<AppState>>,
    Json(body): Json<StartCampaignBody>,
) -> Result<(StatusCode, Json<RunHandle>), (StatusCode, Json<ErrorResponse>)> {
    let handle = state
        .controller()
        .start(body.filters, body.options)
        .await
        .map_err(campaign_error)?;

    info!("Campaign {} started with {} leads", handle.run_id, handle.lead_ids.len());
    Ok((StatusCode::ACCEPTED, Json(handle)))
}

/// Get the current (or last) run status
pub async fn status(State(state): State<Arc<AppState>>) -> Json<CampaignStatus> {
    Json(state.controller().status().await)
}

/// Stop the current run
pub async fn stop(State(state): State<Arc<AppState>>) -> Json<StopAck> {
    Json(state.controller().stop().await)
}

/// Start a run over recently failed leads
pub async fn retry(
    State(state): State<Arc<AppState>>,
    Json(body): Json<RetryBody>,
) -> Result<(StatusCode, Json<RunHandle>), (StatusCode, Json<ErrorResponse>)> {
    let now = Utc::now();
    let since = match (body.since, body.window_hours) {
        (Some(since), _) => Some(since),
        (None, Some(0)) => None,
        (None, Some(hours)) => now.checked_sub_signed(chrono::Duration::hours(
            hours.min(876_000) as i64,
        )),
        (None, None) => state.controller().config().default_retry_since(now),
    };

    let handle = state
        .controller()
        .retry_failed(since, body.options)
        .await
        .map_err(campaign_error)?;

    info!("Retry run {} started with {} leads", handle.run_id, handle.lead_ids.len());
    Ok((StatusCode::ACCEPTED, Json(handle)))
}
