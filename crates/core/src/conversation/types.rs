//! Conversation pipeline types.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::telephony::{CallContext, PlacedCall};

/// Errors reported while waiting for a live conversation to end.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PipelineError {
    /// The contact never picked up (provider reported `no-answer` or `busy`).
    #[error("Call not answered: {0}")]
    NoAnswer(String),

    /// The pipeline or provider reported a failure.
    #[error("Conversation failed: {0}")]
    Failed(String),

    /// The pipeline went away without reporting an end.
    #[error("Conversation pipeline closed")]
    Closed,
}

/// Who said a line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Speaker {
    Agent,
    Contact,
}

/// One line of the transcript.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    pub speaker: Speaker,
    pub text: String,
}

/// A conversation that ended normally.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationEnd {
    #[serde(default)]
    pub transcript: Vec<Turn>,
    /// Whether a person answered (false for voicemail or silence).
    #[serde(default = "default_answered")]
    pub answered: bool,
}

fn default_answered() -> bool {
    true
}

impl ConversationEnd {
    /// Everything the contact said, one line per turn.
    pub fn contact_text(&self) -> String {
        self.transcript
            .iter()
            .filter(|t| t.speaker == Speaker::Contact)
            .map(|t| t.text.as_str())
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Full transcript rendered as `speaker: text` lines.
    pub fn render(&self) -> String {
        self.transcript
            .iter()
            .map(|t| {
                let who = match t.speaker {
                    Speaker::Agent => "Agent",
                    Speaker::Contact => "Contact",
                };
                format!("{}: {}", who, t.text)
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Signals the end of a live call's conversation.
///
/// The caller applies the deadline; implementations must be cancel-safe
/// (dropping the future abandons the wait).
#[async_trait]
pub trait ConversationPipeline: Send + Sync {
    async fn await_completion(
        &self,
        call: &PlacedCall,
        context: &CallContext,
    ) -> Result<ConversationEnd, PipelineError>;
}
