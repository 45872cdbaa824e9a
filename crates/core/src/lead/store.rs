//! Lead storage trait and types.

use thiserror::Error;

use super::{Lead, LeadStatus};

/// Error type for lead operations.
#[derive(Debug, Error)]
pub enum LeadError {
    /// Lead not found.
    #[error("Lead not found: {0}")]
    NotFound(String),

    /// Status change not allowed from the current status.
    #[error("Cannot move lead {lead_id} from {from} to {to}")]
    InvalidTransition {
        lead_id: String,
        from: LeadStatus,
        to: LeadStatus,
    },

    /// Rejected input.
    #[error("Invalid lead: {0}")]
    Invalid(String),

    /// Database error.
    #[error("Database error: {0}")]
    Database(String),
}

/// Request to create a new lead.
#[derive(Debug, Clone)]
pub struct CreateLeadRequest {
    pub contact_number: String,
    pub business_name: String,
    pub contact_name: String,
    pub business_type: String,
    pub company_size: String,
    pub current_challenges: Option<String>,
    pub best_call_time: Option<String>,
}

/// Filter for querying leads.
///
/// Empty `business_types` / `company_sizes` match everything.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LeadFilter {
    /// Filter by status.
    pub status: Option<LeadStatus>,
    /// Accept only these classifications.
    pub business_types: Vec<String>,
    /// Accept only these size buckets.
    pub company_sizes: Vec<String>,
    /// Maximum number of results.
    pub limit: i64,
    /// Offset for pagination.
    pub offset: i64,
}

impl LeadFilter {
    /// Create a new filter with defaults.
    pub fn new() -> Self {
        Self {
            status: None,
            business_types: Vec::new(),
            company_sizes: Vec::new(),
            limit: 100,
            offset: 0,
        }
    }

    /// Filter by status.
    pub fn with_status(mut self, status: LeadStatus) -> Self {
        self.status = Some(status);
        self
    }

    /// Restrict to the given business types.
    pub fn with_business_types(mut self, types: Vec<String>) -> Self {
        self.business_types = types;
        self
    }

    /// Restrict to the given company sizes.
    pub fn with_company_sizes(mut self, sizes: Vec<String>) -> Self {
        self.company_sizes = sizes;
        self
    }

    /// Set limit.
    pub fn with_limit(mut self, limit: i64) -> Self {
        self.limit = limit;
        self
    }

    /// Set offset.
    pub fn with_offset(mut self, offset: i64) -> Self {
        self.offset = offset;
        self
    }
}

/// Trait for lead storage backends.
pub trait LeadStore: Send + Sync {
    /// Create a new lead in `pending` status.
    fn create(&self, request: CreateLeadRequest) -> Result<Lead, LeadError>;

    /// Get a lead by ID.
    fn get(&self, id: &str) -> Result<Option<Lead>, LeadError>;

    /// List leads matching the filter, oldest first.
    fn list(&self, filter: &LeadFilter) -> Result<Vec<Lead>, LeadError>;

    /// Count leads matching the filter (limit/offset ignored).
    fn count(&self, filter: &LeadFilter) -> Result<i64, LeadError>;

    /// Move a lead to a new status, enforcing [`LeadStatus::can_transition_to`].
    fn set_status(&self, id: &str, status: LeadStatus) -> Result<Lead, LeadError>;

    /// List pending leads matching the filter.
    fn list_pending(&self, filter: &LeadFilter) -> Result<Vec<Lead>, LeadError> {
        self.list(&filter.clone().with_status(LeadStatus::Pending))
    }
}
