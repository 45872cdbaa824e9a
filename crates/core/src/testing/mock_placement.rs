//! Mock call placement client for testing.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

use crate::telephony::{CallContext, CallPlacementClient, PlacedCall, PlacementError};

/// A recorded place_call for test assertions.
#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub destination: String,
    pub context: CallContext,
    pub external_call_id: String,
    pub timestamp: chrono::DateTime<Utc>,
}

/// Mock implementation of the CallPlacementClient trait.
///
/// - Records placed calls and hang-ups
/// - Fails calls to chosen destinations
/// - Delays placement to simulate a slow provider
#[derive(Debug)]
pub struct MockPlacementClient {
    placed: Arc<RwLock<Vec<RecordedCall>>>,
    hang_ups: Arc<RwLock<Vec<String>>>,
    failing: Arc<RwLock<HashSet<String>>>,
    /// If set, the next placement fails with this error.
    next_error: Arc<RwLock<Option<PlacementError>>>,
    delay: Arc<RwLock<Duration>>,
    call_counter: AtomicU64,
}

impl Default for MockPlacementClient {
    fn default() -> Self {
        Self::new()
    }
}

impl MockPlacementClient {
    pub fn new() -> Self {
        Self {
            placed: Arc::new(RwLock::new(Vec::new())),
            hang_ups: Arc::new(RwLock::new(Vec::new())),
            failing: Arc::new(RwLock::new(HashSet::new())),
            next_error: Arc::new(RwLock::new(None)),
            delay: Arc::new(RwLock::new(Duration::ZERO)),
            call_counter: AtomicU64::new(0),
        }
    }

    /// All successful placements, in order.
    pub async fn placed_calls(&self) -> Vec<RecordedCall> {
        self.placed.read().await.clone()
    }

    /// Call IDs that were hung up, in order.
    pub async fn hang_ups(&self) -> Vec<String> {
        self.hang_ups.read().await.clone()
    }

    /// Reject every call to this destination.
    pub async fn fail_for(&self, destination: &str) {
        self.failing.write().await.insert(destination.to_string());
    }

    /// Stop rejecting calls to this destination.
    pub async fn clear_failure(&self, destination: &str) {
        self.failing.write().await.remove(destination);
    }

    /// Make the next placement fail with the given error.
    pub async fn set_next_error(&self, error: PlacementError) {
        *self.next_error.write().await = Some(error);
    }

    /// Delay every placement by `delay`.
    pub async fn set_delay(&self, delay: Duration) {
        *self.delay.write().await = delay;
    }
}

#[async_trait]
impl CallPlacementClient for MockPlacementClient {
    async fn place_call(
        &self,
        destination: &str,
        context: &CallContext,
    ) -> Result<PlacedCall, PlacementError> {
        let delay = *self.delay.read().await;
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        if let Some(error) = self.next_error.write().await.take() {
            return Err(error);
        }

        if self.failing.read().await.contains(destination) {
            return Err(PlacementError::Rejected {
                status: 400,
                message: format!("mock rejection for {}", destination),
            });
        }

        let n = self.call_counter.fetch_add(1, Ordering::SeqCst) + 1;
        let external_call_id = format!("CA{:06}", n);

        self.placed.write().await.push(RecordedCall {
            destination: destination.to_string(),
            context: context.clone(),
            external_call_id: external_call_id.clone(),
            timestamp: Utc::now(),
        });

        Ok(PlacedCall { external_call_id })
    }

    async fn hang_up(&self, external_call_id: &str) -> Result<(), PlacementError> {
        self.hang_ups.write().await.push(external_call_id.to_string());
        Ok(())
    }
}
