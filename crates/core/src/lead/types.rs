//! Lead record and status types.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Call status of a lead.
///
/// Transitions are `pending → in_progress → {completed | failed}`; a failed
/// lead may be reset to `pending` for a retry run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LeadStatus {
    /// Not yet called (or reset for retry).
    Pending,
    /// An attempt is outstanding.
    InProgress,
    /// The last attempt completed.
    Completed,
    /// The last attempt failed or timed out.
    Failed,
}

impl LeadStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            LeadStatus::Pending => "pending",
            LeadStatus::InProgress => "in_progress",
            LeadStatus::Completed => "completed",
            LeadStatus::Failed => "failed",
        }
    }

    /// Returns true if a lead may move from this status to `next`.
    pub fn can_transition_to(&self, next: LeadStatus) -> bool {
        matches!(
            (self, next),
            (LeadStatus::Pending, LeadStatus::InProgress)
                | (LeadStatus::InProgress, LeadStatus::Completed)
                | (LeadStatus::InProgress, LeadStatus::Failed)
                | (LeadStatus::Failed, LeadStatus::Pending)
        )
    }
}

impl fmt::Display for LeadStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LeadStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(LeadStatus::Pending),
            "in_progress" => Ok(LeadStatus::InProgress),
            "completed" => Ok(LeadStatus::Completed),
            "failed" => Ok(LeadStatus::Failed),
            other => Err(format!("unknown lead status: {}", other)),
        }
    }
}

/// A prospect eligible for an outbound call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Lead {
    /// Unique identifier (UUID).
    pub id: String,
    /// Destination phone number.
    pub contact_number: String,
    /// Organization name.
    pub business_name: String,
    /// Person to ask for.
    pub contact_name: String,
    /// Classification tag (e.g. "Restaurant", "Healthcare").
    pub business_type: String,
    /// Size bucket (e.g. "Small", "Medium").
    pub company_size: String,
    /// Free-text context for the conversation.
    pub current_challenges: Option<String>,
    /// Preferred call window as given by the source data.
    pub best_call_time: Option<String>,
    /// Current call status.
    pub status: LeadStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Lead {
    /// Returns true if the lead has something to dial.
    pub fn has_destination(&self) -> bool {
        !self.contact_number.trim().is_empty()
    }
}
