use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::conversation::ConversationEnd;
use crate::lead::Lead;
use crate::outcome::InterestLevel;

/// Error type for summary generation.
#[derive(Debug, Error)]
pub enum SummaryError {
    #[error("HTTP error: {0}")]
    Http(String),

    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    #[error("Failed to parse summary: {0}")]
    Parse(String),

    #[error("Summarizer not configured: {0}")]
    NotConfigured(String),
}

/// Assessment of a finished conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallSummary {
    pub summary: String,
    pub interest_level: InterestLevel,
    pub meeting_scheduled: bool,
    pub next_steps: String,
}

impl CallSummary {
    /// Stand-in used when summary generation fails.
    pub fn placeholder(reason: &str) -> Self {
        Self {
            summary: format!("Summary unavailable: {}", reason),
            interest_level: InterestLevel::None,
            meeting_scheduled: false,
            next_steps: "review_manually".to_string(),
        }
    }
}

/// Turns a finished conversation into a [`CallSummary`].
#[async_trait]
pub trait Summarizer: Send + Sync {
    /// Short backend name for logs and metrics.
    fn name(&self) -> &str;

    async fn summarize(
        &self,
        lead: &Lead,
        conversation: &ConversationEnd,
    ) -> Result<CallSummary, SummaryError>;
}
