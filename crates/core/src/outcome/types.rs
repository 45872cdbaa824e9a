//! Outcome record types.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Final status of a concluded call attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeStatus {
    Completed,
    Failed,
    TimedOut,
}

impl OutcomeStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OutcomeStatus::Completed => "completed",
            OutcomeStatus::Failed => "failed",
            OutcomeStatus::TimedOut => "timed_out",
        }
    }

    /// Failed and timed-out attempts are eligible for a retry run.
    pub fn is_retryable(&self) -> bool {
        matches!(self, OutcomeStatus::Failed | OutcomeStatus::TimedOut)
    }
}

impl fmt::Display for OutcomeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OutcomeStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "completed" => Ok(OutcomeStatus::Completed),
            "failed" => Ok(OutcomeStatus::Failed),
            "timed_out" => Ok(OutcomeStatus::TimedOut),
            other => Err(format!("unknown outcome status: {}", other)),
        }
    }
}

/// Interest expressed by the contact during the conversation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InterestLevel {
    High,
    Medium,
    Low,
    #[default]
    None,
}

impl InterestLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            InterestLevel::High => "high",
            InterestLevel::Medium => "medium",
            InterestLevel::Low => "low",
            InterestLevel::None => "none",
        }
    }
}

impl fmt::Display for InterestLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for InterestLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "high" => Ok(InterestLevel::High),
            "medium" => Ok(InterestLevel::Medium),
            "low" => Ok(InterestLevel::Low),
            "none" => Ok(InterestLevel::None),
            other => Err(format!("unknown interest level: {}", other)),
        }
    }
}

/// Immutable record of one concluded call attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutcomeRecord {
    pub id: String,
    /// Campaign run that produced the attempt.
    pub run_id: String,
    pub lead_id: String,
    /// Provider call identifier, if placement succeeded.
    pub external_call_id: Option<String>,
    pub status: OutcomeStatus,
    /// Machine-readable failure reason (`placement_error`, `pipeline_error`,
    /// `no_answer`, `internal_error`).
    pub failure_reason: Option<String>,
    /// Seconds from attempt start to terminal transition.
    pub duration_secs: f64,
    pub summary: String,
    pub interest_level: InterestLevel,
    pub meeting_scheduled: bool,
    pub next_steps: String,
    pub recorded_at: DateTime<Utc>,
}

/// Aggregate counts over all outcome records.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CallStatistics {
    pub total_outcomes: i64,
    pub completed: i64,
    pub failed: i64,
    pub timed_out: i64,
    pub meetings_scheduled: i64,
    pub high_interest: i64,
    /// Mean duration of completed calls, 0 when there are none.
    pub average_duration_secs: f64,
}
