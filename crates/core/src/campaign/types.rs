//! Types for the campaign controller.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::lead::LeadFilter;

use super::config::{MAX_CALL_TIMEOUT_SECS, MAX_CONCURRENT_CALLS};

/// Errors returned synchronously by controller operations.
#[derive(Debug, Error)]
pub enum CampaignError {
    /// A run is already active.
    #[error("a campaign run is already active: {run_id}")]
    AlreadyRunning { run_id: String },

    /// Nothing matched the selection.
    #[error("no eligible leads")]
    NoEligibleLeads,

    /// Retry runs are disabled by configuration.
    #[error("retrying failed calls is disabled")]
    RetryDisabled,

    /// A run option override is out of range.
    #[error("invalid run options: {0}")]
    InvalidOptions(String),

    /// Lead store error.
    #[error("lead store error: {0}")]
    LeadStore(#[from] crate::lead::LeadError),

    /// Result sink error.
    #[error("result sink error: {0}")]
    ResultSink(#[from] crate::outcome::OutcomeError),
}

/// Why a run was started.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunKind {
    Campaign,
    Retry,
}

impl RunKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunKind::Campaign => "campaign",
            RunKind::Retry => "retry",
        }
    }
}

/// Lifecycle of a run: `running → stopping → stopped`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    Running,
    Stopping,
    Stopped,
}

/// Lead selection for a campaign run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CampaignFilters {
    /// Accept only these business types (empty = all).
    #[serde(default)]
    pub business_types: Vec<String>,
    /// Accept only these company sizes (empty = all).
    #[serde(default)]
    pub company_sizes: Vec<String>,
    /// Cap on the number of leads selected.
    #[serde(default)]
    pub max_leads: Option<usize>,
}

impl CampaignFilters {
    pub fn to_lead_filter(&self) -> LeadFilter {
        let limit = self
            .max_leads
            .map(|n| i64::try_from(n).unwrap_or(i64::MAX))
            .unwrap_or(i64::MAX);
        LeadFilter::new()
            .with_business_types(self.business_types.clone())
            .with_company_sizes(self.company_sizes.clone())
            .with_limit(limit)
    }
}

/// Per-run overrides of the configured settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunOptions {
    /// Dial regardless of the business-hours window.
    #[serde(default)]
    pub ignore_business_hours: bool,
    #[serde(default)]
    pub max_concurrent_calls: Option<usize>,
    #[serde(default)]
    pub call_timeout_secs: Option<u64>,
    /// Hold dispatch until this time. Must be in the future.
    #[serde(default)]
    pub start_at: Option<DateTime<Utc>>,
}

impl RunOptions {
    pub fn validate(&self) -> Result<(), CampaignError> {
        match self.max_concurrent_calls {
            Some(0) => {
                return Err(CampaignError::InvalidOptions(
                    "max_concurrent_calls must be at least 1".to_string(),
                ))
            }
            Some(n) if n > MAX_CONCURRENT_CALLS => {
                return Err(CampaignError::InvalidOptions(format!(
                    "max_concurrent_calls must be at most {}",
                    MAX_CONCURRENT_CALLS
                )))
            }
            _ => {}
        }
        match self.call_timeout_secs {
            Some(0) => {
                return Err(CampaignError::InvalidOptions(
                    "call_timeout_secs must be positive".to_string(),
                ))
            }
            Some(n) if n > MAX_CALL_TIMEOUT_SECS => {
                return Err(CampaignError::InvalidOptions(format!(
                    "call_timeout_secs must be at most {}",
                    MAX_CALL_TIMEOUT_SECS
                )))
            }
            _ => {}
        }
        if let Some(start_at) = self.start_at {
            if start_at <= Utc::now() {
                return Err(CampaignError::InvalidOptions(
                    "start_at must be in the future".to_string(),
                ));
            }
        }
        Ok(())
    }
}

/// Effective settings of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSettings {
    pub max_concurrent_calls: usize,
    pub call_timeout_secs: u64,
    pub honour_business_hours: bool,
    /// Scheduled start, if the run was deferred.
    pub start_at: Option<DateTime<Utc>>,
}

/// Outcome counters of a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunCounters {
    pub completed: usize,
    pub failed: usize,
    pub timed_out: usize,
    pub skipped: usize,
    pub meetings_scheduled: usize,
}

impl RunCounters {
    /// Leads that reached any terminal outcome.
    pub fn concluded(&self) -> usize {
        self.completed + self.failed + self.timed_out + self.skipped
    }
}

/// Returned when a run is accepted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunHandle {
    pub run_id: String,
    pub kind: RunKind,
    pub lead_ids: Vec<String>,
    pub settings: RunSettings,
    pub started_at: DateTime<Utc>,
}

/// Snapshot of the current (or last finished) run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CampaignStatus {
    /// True while a run is active (running or stopping).
    pub is_running: bool,
    pub state: RunState,
    pub stopping: bool,
    pub run_id: Option<String>,
    pub kind: Option<RunKind>,
    pub total_leads: usize,
    pub counters: RunCounters,
    pub concluded: usize,
    pub active_lead_ids: Vec<String>,
    pub queued: usize,
    /// Dispatch is waiting for business hours to open.
    pub paused_for_hours: bool,
    /// Dispatch is waiting for the scheduled start.
    pub awaiting_start: bool,
    pub within_business_hours: bool,
    pub gate_capacity: usize,
    pub gate_in_use: usize,
    pub settings: Option<RunSettings>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
}

/// Acknowledgement of a stop request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StopAck {
    /// False when no run was active.
    pub accepted: bool,
    pub run_id: Option<String>,
    pub active_attempts: usize,
    pub message: String,
}
