//! Mock conversation pipeline for testing.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

use crate::conversation::{ConversationEnd, ConversationPipeline, PipelineError, Speaker, Turn};
use crate::telephony::{CallContext, PlacedCall};

#[derive(Debug, Default)]
struct Concurrency {
    current: AtomicUsize,
    max: AtomicUsize,
}

/// Decrements the in-flight count even when the wait is cancelled.
struct InFlight<'a>(&'a Concurrency);

impl<'a> InFlight<'a> {
    fn enter(concurrency: &'a Concurrency) -> Self {
        let now = concurrency.current.fetch_add(1, Ordering::SeqCst) + 1;
        concurrency.max.fetch_max(now, Ordering::SeqCst);
        Self(concurrency)
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.current.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Mock implementation of the ConversationPipeline trait.
///
/// Every call "talks" for a configurable duration and then ends with a
/// configurable conversation. Tracks how many conversations overlap.
#[derive(Debug)]
pub struct MockConversationPipeline {
    conversation: Arc<RwLock<ConversationEnd>>,
    duration: Arc<RwLock<Duration>>,
    /// If set, the next wait fails with this error.
    next_error: Arc<RwLock<Option<PipelineError>>>,
    /// Errors returned for specific leads on every wait.
    lead_errors: Arc<RwLock<HashMap<String, PipelineError>>>,
    waits: AtomicUsize,
    concurrency: Concurrency,
}

impl Default for MockConversationPipeline {
    fn default() -> Self {
        Self::new()
    }
}

impl MockConversationPipeline {
    pub fn new() -> Self {
        Self {
            conversation: Arc::new(RwLock::new(ConversationEnd {
                transcript: vec![
                    Turn {
                        speaker: Speaker::Agent,
                        text: "Hi, do you have a couple of minutes?".to_string(),
                    },
                    Turn {
                        speaker: Speaker::Contact,
                        text: "Yes, tell me more".to_string(),
                    },
                ],
                answered: true,
            })),
            duration: Arc::new(RwLock::new(Duration::ZERO)),
            next_error: Arc::new(RwLock::new(None)),
            lead_errors: Arc::new(RwLock::new(HashMap::new())),
            waits: AtomicUsize::new(0),
            concurrency: Concurrency::default(),
        }
    }

    /// Conversation returned by successful waits.
    pub async fn set_conversation(&self, conversation: ConversationEnd) {
        *self.conversation.write().await = conversation;
    }

    /// How long each conversation lasts.
    pub async fn set_duration(&self, duration: Duration) {
        *self.duration.write().await = duration;
    }

    /// Make the next wait fail with the given error.
    pub async fn set_next_error(&self, error: PipelineError) {
        *self.next_error.write().await = Some(error);
    }

    /// Fail every wait for this lead.
    pub async fn fail_lead(&self, lead_id: &str, error: PipelineError) {
        self.lead_errors
            .write()
            .await
            .insert(lead_id.to_string(), error);
    }

    /// Number of waits started.
    pub fn wait_count(&self) -> usize {
        self.waits.load(Ordering::SeqCst)
    }

    /// Conversations currently in progress.
    pub fn in_flight(&self) -> usize {
        self.concurrency.current.load(Ordering::SeqCst)
    }

    /// Highest number of overlapping conversations seen.
    pub fn max_in_flight(&self) -> usize {
        self.concurrency.max.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ConversationPipeline for MockConversationPipeline {
    async fn await_completion(
        &self,
        _call: &PlacedCall,
        context: &CallContext,
    ) -> Result<ConversationEnd, PipelineError> {
        self.waits.fetch_add(1, Ordering::SeqCst);
        let _in_flight = InFlight::enter(&self.concurrency);

        let duration = *self.duration.read().await;
        if !duration.is_zero() {
            tokio::time::sleep(duration).await;
        }

        if let Some(error) = self.next_error.write().await.take() {
            return Err(error);
        }
        if let Some(error) = self.lead_errors.read().await.get(&context.lead_id) {
            return Err(error.clone());
        }

        Ok(self.conversation.read().await.clone())
    }
}
