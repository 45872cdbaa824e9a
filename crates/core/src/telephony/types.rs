//! Call placement types and trait.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::lead::Lead;

/// Errors from the call placement provider.
#[derive(Debug, Clone, Error)]
pub enum PlacementError {
    /// Destination number cannot be dialed.
    #[error("Invalid destination: {0}")]
    InvalidDestination(String),

    /// Provider refused the request.
    #[error("Provider rejected call (HTTP {status}): {message}")]
    Rejected { status: u16, message: String },

    /// Transport-level failure.
    #[error("HTTP error: {0}")]
    Http(String),

    /// Provider did not answer in time.
    #[error("Provider request timed out")]
    Timeout,

    /// No telephony provider configured.
    #[error("Telephony provider not configured")]
    NotConfigured,
}

/// Data the provider needs to route a call back to us.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallContext {
    pub run_id: String,
    pub lead_id: String,
    pub business_name: String,
    pub contact_name: String,
}

impl CallContext {
    pub fn for_lead(run_id: &str, lead: &Lead) -> Self {
        Self {
            run_id: run_id.to_string(),
            lead_id: lead.id.clone(),
            business_name: lead.business_name.clone(),
            contact_name: lead.contact_name.clone(),
        }
    }
}

/// A call the provider accepted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlacedCall {
    /// Provider-assigned call identifier.
    pub external_call_id: String,
}

/// Places and tears down outbound calls.
#[async_trait]
pub trait CallPlacementClient: Send + Sync {
    /// Place one outbound call.
    async fn place_call(
        &self,
        destination: &str,
        context: &CallContext,
    ) -> Result<PlacedCall, PlacementError>;

    /// Hang up a call by provider identifier. Best-effort.
    async fn hang_up(&self, external_call_id: &str) -> Result<(), PlacementError>;
}
