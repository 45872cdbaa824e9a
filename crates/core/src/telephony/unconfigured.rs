//! Placement client used when no telephony provider is configured.

use async_trait::async_trait;
use tracing::warn;

use super::{CallContext, CallPlacementClient, PlacedCall, PlacementError};

/// Rejects every call with [`PlacementError::NotConfigured`].
#[derive(Debug, Default, Clone, Copy)]
pub struct UnconfiguredPlacementClient;

#[async_trait]
impl CallPlacementClient for UnconfiguredPlacementClient {
    async fn place_call(
        &self,
        _destination: &str,
        context: &CallContext,
    ) -> Result<PlacedCall, PlacementError> {
        warn!(lead_id = %context.lead_id, "Cannot place call: no telephony provider configured");
        Err(PlacementError::NotConfigured)
    }

    async fn hang_up(&self, _external_call_id: &str) -> Result<(), PlacementError> {
        Err(PlacementError::NotConfigured)
    }
}
