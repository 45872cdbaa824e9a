//! Result sink trait and types.

use chrono::{DateTime, Utc};
use thiserror::Error;

use super::{CallStatistics, OutcomeRecord, OutcomeStatus};

/// Error type for outcome storage.
#[derive(Debug, Error)]
pub enum OutcomeError {
    #[error("Outcome not found: {0}")]
    NotFound(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Export error: {0}")]
    Export(String),
}

/// Filter for querying outcome records. Results are newest first.
#[derive(Debug, Clone, Default)]
pub struct OutcomeFilter {
    pub lead_id: Option<String>,
    pub run_id: Option<String>,
    pub status: Option<OutcomeStatus>,
    pub limit: i64,
    pub offset: i64,
}

impl OutcomeFilter {
    pub fn new() -> Self {
        Self {
            limit: 100,
            ..Default::default()
        }
    }

    pub fn with_lead(mut self, lead_id: impl Into<String>) -> Self {
        self.lead_id = Some(lead_id.into());
        self
    }

    pub fn with_run(mut self, run_id: impl Into<String>) -> Self {
        self.run_id = Some(run_id.into());
        self
    }

    pub fn with_status(mut self, status: OutcomeStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_limit(mut self, limit: i64) -> Self {
        self.limit = limit;
        self
    }

    pub fn with_offset(mut self, offset: i64) -> Self {
        self.offset = offset;
        self
    }
}

/// Append-only store of outcome records.
pub trait ResultSink: Send + Sync {
    /// Append a record. Records are never updated.
    fn append(&self, record: &OutcomeRecord) -> Result<(), OutcomeError>;

    /// List records matching the filter.
    fn list(&self, filter: &OutcomeFilter) -> Result<Vec<OutcomeRecord>, OutcomeError>;

    /// Lead IDs whose most recent outcome is failed or timed out, in the
    /// order those outcomes were recorded. With `since`, only outcomes
    /// recorded at or after that instant count.
    fn latest_failed(&self, since: Option<DateTime<Utc>>) -> Result<Vec<String>, OutcomeError>;

    /// Aggregate statistics over all records.
    fn statistics(&self) -> Result<CallStatistics, OutcomeError>;
}
