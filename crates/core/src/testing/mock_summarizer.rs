//! Mock summarizer for testing.

use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::conversation::ConversationEnd;
use crate::lead::Lead;
use crate::outcome::InterestLevel;
use crate::summary::{CallSummary, Summarizer, SummaryError};

/// Mock implementation of the Summarizer trait.
#[derive(Debug)]
pub struct MockSummarizer {
    summary: Arc<RwLock<CallSummary>>,
    fail: Arc<RwLock<bool>>,
    /// Lead IDs summarized, in order.
    calls: Arc<RwLock<Vec<String>>>,
}

impl Default for MockSummarizer {
    fn default() -> Self {
        Self::new()
    }
}

impl MockSummarizer {
    pub fn new() -> Self {
        Self {
            summary: Arc::new(RwLock::new(CallSummary {
                summary: "Mock summary".to_string(),
                interest_level: InterestLevel::Medium,
                meeting_scheduled: false,
                next_steps: "follow_up".to_string(),
            })),
            fail: Arc::new(RwLock::new(false)),
            calls: Arc::new(RwLock::new(Vec::new())),
        }
    }

    pub async fn set_summary(&self, summary: CallSummary) {
        *self.summary.write().await = summary;
    }

    /// Make every summary request fail.
    pub async fn set_fail(&self, fail: bool) {
        *self.fail.write().await = fail;
    }

    pub async fn calls(&self) -> Vec<String> {
        self.calls.read().await.clone()
    }
}

#[async_trait]
impl Summarizer for MockSummarizer {
    fn name(&self) -> &str {
        "mock"
    }

    async fn summarize(
        &self,
        lead: &Lead,
        _conversation: &ConversationEnd,
    ) -> Result<CallSummary, SummaryError> {
        self.calls.write().await.push(lead.id.clone());

        if *self.fail.read().await {
            return Err(SummaryError::Api {
                status: 529,
                message: "mock overloaded".to_string(),
            });
        }

        Ok(self.summary.read().await.clone())
    }
}
