//! Per-lead call attempt state machine and driver.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::time::{timeout, timeout_at, Instant};
use tracing::{debug, error, info, warn};

use crate::conversation::{ConversationPipeline, PipelineError};
use crate::lead::Lead;
use crate::metrics::SUMMARY_FAILURES;
use crate::summary::{CallSummary, Summarizer};
use crate::telephony::{CallContext, CallPlacementClient};

use super::gate::GateSlot;

/// Upper bound on a best-effort hang-up request.
const HANG_UP_TIMEOUT: Duration = Duration::from_secs(10);

/// Stand-in deadline when the budget does not fit in an `Instant`.
const UNBOUNDED_BUDGET: Duration = Duration::from_secs(86_400 * 365 * 30);

/// Why an attempt failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureReason {
    PlacementError,
    PipelineError,
    NoAnswer,
    InternalError,
}

impl FailureReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureReason::PlacementError => "placement_error",
            FailureReason::PipelineError => "pipeline_error",
            FailureReason::NoAnswer => "no_answer",
            FailureReason::InternalError => "internal_error",
        }
    }
}

/// Terminal result of an attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TerminalOutcome {
    Completed,
    Failed { reason: FailureReason },
    TimedOut,
    Skipped,
}

/// Lifecycle phase of a call attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "phase", rename_all = "snake_case")]
pub enum AttemptPhase {
    Queued,
    Dialing,
    Connected,
    Summarizing,
    Terminal { outcome: TerminalOutcome },
}

impl AttemptPhase {
    pub fn name(&self) -> &'static str {
        match self {
            AttemptPhase::Queued => "queued",
            AttemptPhase::Dialing => "dialing",
            AttemptPhase::Connected => "connected",
            AttemptPhase::Summarizing => "summarizing",
            AttemptPhase::Terminal { outcome } => match outcome {
                TerminalOutcome::Completed => "completed",
                TerminalOutcome::Failed { .. } => "failed",
                TerminalOutcome::TimedOut => "timed_out",
                TerminalOutcome::Skipped => "skipped",
            },
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, AttemptPhase::Terminal { .. })
    }

    /// Returns true if an attempt may move from this phase to `next`.
    pub fn can_transition_to(&self, next: &AttemptPhase) -> bool {
        use AttemptPhase::*;
        use TerminalOutcome::*;

        match (self, next) {
            (Queued, Dialing) => true,
            (Queued, Terminal { outcome: Skipped }) => true,
            (Dialing, Connected) => true,
            (Dialing, Terminal { outcome: Failed { .. } | TimedOut }) => true,
            (Connected, Summarizing) => true,
            (Connected, Terminal { outcome: Failed { .. } | TimedOut }) => true,
            (Summarizing, Terminal { outcome: Completed }) => true,
            _ => false,
        }
    }
}

impl fmt::Display for AttemptPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Errors from misuse of the attempt state machine.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AttemptError {
    #[error("illegal attempt transition for lead {lead_id}: {from} -> {to}")]
    IllegalTransition {
        lead_id: String,
        from: AttemptPhase,
        to: AttemptPhase,
    },
}

/// One call attempt for one lead.
#[derive(Debug, Clone, Serialize)]
pub struct CallAttempt {
    pub lead_id: String,
    /// Assigned once the provider accepts the call.
    pub external_call_id: Option<String>,
    pub started_at: DateTime<Utc>,
    phase: AttemptPhase,
    #[serde(skip)]
    started: Instant,
}

impl CallAttempt {
    pub fn new(lead_id: impl Into<String>) -> Self {
        Self {
            lead_id: lead_id.into(),
            external_call_id: None,
            started_at: Utc::now(),
            phase: AttemptPhase::Queued,
            started: Instant::now(),
        }
    }

    pub fn phase(&self) -> AttemptPhase {
        self.phase
    }

    /// Terminal outcome, `None` until finished.
    pub fn outcome(&self) -> Option<TerminalOutcome> {
        match self.phase {
            AttemptPhase::Terminal { outcome } => Some(outcome),
            _ => None,
        }
    }

    /// Time since the attempt started.
    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    pub fn transition(&mut self, next: AttemptPhase) -> Result<(), AttemptError> {
        if !self.phase.can_transition_to(&next) {
            return Err(AttemptError::IllegalTransition {
                lead_id: self.lead_id.clone(),
                from: self.phase,
                to: next,
            });
        }
        debug!(lead_id = %self.lead_id, from = %self.phase, to = %next, "Attempt transition");
        self.phase = next;
        Ok(())
    }

    /// Conclude a queued lead that will not be dialed.
    pub fn skip(lead_id: impl Into<String>) -> Self {
        let mut attempt = Self::new(lead_id);
        advance(&mut attempt, terminal(TerminalOutcome::Skipped));
        attempt
    }
}

/// Collaborators an attempt talks to.
#[derive(Clone)]
pub struct AttemptDeps {
    pub placement: Arc<dyn CallPlacementClient>,
    pub pipeline: Arc<dyn ConversationPipeline>,
    pub summarizer: Arc<dyn Summarizer>,
}

/// What a finished attempt hands back to the controller.
#[derive(Debug, Clone)]
pub struct AttemptReport {
    pub lead: Lead,
    pub attempt: CallAttempt,
    /// Present for completed attempts.
    pub summary: Option<CallSummary>,
    /// Human-readable failure detail.
    pub error: Option<String>,
    pub duration: Duration,
}

impl AttemptReport {
    pub fn outcome(&self) -> TerminalOutcome {
        self.attempt.outcome().unwrap_or(TerminalOutcome::Failed {
            reason: FailureReason::InternalError,
        })
    }

    /// Report for an attempt that died without reaching a terminal phase.
    pub fn internal_error(lead: Lead, message: String, duration: Duration) -> Self {
        let mut attempt = CallAttempt::new(lead.id.clone());
        attempt.phase = terminal(TerminalOutcome::Failed {
            reason: FailureReason::InternalError,
        });
        Self {
            lead,
            attempt,
            summary: None,
            error: Some(message),
            duration,
        }
    }
}

fn advance(attempt: &mut CallAttempt, next: AttemptPhase) {
    if let Err(e) = attempt.transition(next) {
        error!("{}", e);
    }
}

fn terminal(outcome: TerminalOutcome) -> AttemptPhase {
    AttemptPhase::Terminal { outcome }
}

/// Free the gate slot, then enter the terminal phase.
fn conclude(attempt: &mut CallAttempt, slot: GateSlot, outcome: TerminalOutcome) {
    drop(slot);
    advance(attempt, terminal(outcome));
}

fn deadline_after(budget: Duration) -> Instant {
    let now = Instant::now();
    now.checked_add(budget)
        .unwrap_or_else(|| now + UNBOUNDED_BUDGET)
}

async fn hang_up(deps: &AttemptDeps, lead_id: &str, call_id: &str) {
    match timeout(HANG_UP_TIMEOUT, deps.placement.hang_up(call_id)).await {
        Ok(Ok(())) => debug!(lead_id = %lead_id, call_id = %call_id, "Hung up call"),
        Ok(Err(e)) => warn!(lead_id = %lead_id, call_id = %call_id, error = %e, "Hang-up failed"),
        Err(_) => warn!(lead_id = %lead_id, call_id = %call_id, "Hang-up timed out"),
    }
}

/// Drive one attempt from `queued` to a terminal phase.
///
/// `budget` bounds placement plus conversation, measured from the attempt
/// start. The gate slot is released just before the terminal transition.
pub async fn run_attempt(
    deps: AttemptDeps,
    run_id: String,
    lead: Lead,
    budget: Duration,
    slot: GateSlot,
) -> AttemptReport {
    let mut attempt = CallAttempt::new(lead.id.clone());
    let deadline = deadline_after(budget);
    let context = CallContext::for_lead(&run_id, &lead);

    let (summary, error) = drive(&deps, &lead, &context, &mut attempt, deadline, slot).await;

    let duration = attempt.elapsed();
    info!(
        lead_id = %lead.id,
        outcome = %attempt.phase(),
        duration_secs = duration.as_secs_f64(),
        "Call attempt finished"
    );

    AttemptReport {
        lead,
        attempt,
        summary,
        error,
        duration,
    }
}

async fn drive(
    deps: &AttemptDeps,
    lead: &Lead,
    context: &CallContext,
    attempt: &mut CallAttempt,
    deadline: Instant,
    slot: GateSlot,
) -> (Option<CallSummary>, Option<String>) {
    advance(attempt, AttemptPhase::Dialing);

    let call = match timeout_at(deadline, deps.placement.place_call(&lead.contact_number, context))
        .await
    {
        Err(_) => {
            warn!(lead_id = %lead.id, "Attempt budget elapsed while dialing");
            conclude(attempt, slot, TerminalOutcome::TimedOut);
            return (None, Some("timed out while dialing".to_string()));
        }
        Ok(Err(e)) => {
            warn!(lead_id = %lead.id, error = %e, "Call placement failed");
            conclude(
                attempt,
                slot,
                TerminalOutcome::Failed {
                    reason: FailureReason::PlacementError,
                },
            );
            return (None, Some(e.to_string()));
        }
        Ok(Ok(call)) => call,
    };

    attempt.external_call_id = Some(call.external_call_id.clone());
    advance(attempt, AttemptPhase::Connected);
    info!(lead_id = %lead.id, call_id = %call.external_call_id, "Call placed");

    // Dropping the wait future on timeout abandons the conversation.
    let conversation = match timeout_at(deadline, deps.pipeline.await_completion(&call, context))
        .await
    {
        Err(_) => {
            warn!(lead_id = %lead.id, call_id = %call.external_call_id, "Attempt budget elapsed, hanging up");
            hang_up(deps, &lead.id, &call.external_call_id).await;
            conclude(attempt, slot, TerminalOutcome::TimedOut);
            return (None, Some("call timed out".to_string()));
        }
        Ok(Err(PipelineError::NoAnswer(status))) => {
            conclude(
                attempt,
                slot,
                TerminalOutcome::Failed {
                    reason: FailureReason::NoAnswer,
                },
            );
            return (None, Some(format!("not answered ({})", status)));
        }
        Ok(Err(e)) => {
            warn!(lead_id = %lead.id, call_id = %call.external_call_id, error = %e, "Conversation failed");
            hang_up(deps, &lead.id, &call.external_call_id).await;
            conclude(
                attempt,
                slot,
                TerminalOutcome::Failed {
                    reason: FailureReason::PipelineError,
                },
            );
            return (None, Some(e.to_string()));
        }
        Ok(Ok(conversation)) => conversation,
    };

    advance(attempt, AttemptPhase::Summarizing);

    let summary = match deps.summarizer.summarize(lead, &conversation).await {
        Ok(summary) => summary,
        Err(e) => {
            warn!(lead_id = %lead.id, summarizer = deps.summarizer.name(), error = %e, "Summary failed, using placeholder");
            SUMMARY_FAILURES
                .with_label_values(&[deps.summarizer.name()])
                .inc();
            CallSummary::placeholder(&e.to_string())
        }
    };

    conclude(attempt, slot, TerminalOutcome::Completed);
    (Some(summary), None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::campaign::ConcurrencyGate;
    use crate::outcome::InterestLevel;
    use crate::testing::{fixtures, MockConversationPipeline, MockPlacementClient, MockSummarizer};

    struct Harness {
        placement: Arc<MockPlacementClient>,
        pipeline: Arc<MockConversationPipeline>,
        summarizer: Arc<MockSummarizer>,
        gate: ConcurrencyGate,
    }

    impl Harness {
        fn new() -> Self {
            Self {
                placement: Arc::new(MockPlacementClient::new()),
                pipeline: Arc::new(MockConversationPipeline::new()),
                summarizer: Arc::new(MockSummarizer::new()),
                gate: ConcurrencyGate::new(1),
            }
        }

        fn deps(&self) -> AttemptDeps {
            AttemptDeps {
                placement: self.placement.clone(),
                pipeline: self.pipeline.clone(),
                summarizer: self.summarizer.clone(),
            }
        }

        async fn run(&self, lead: Lead, budget: Duration) -> AttemptReport {
            let slot = self.gate.acquire().await.unwrap();
            run_attempt(self.deps(), "run-1".to_string(), lead, budget, slot).await
        }
    }

    #[test]
    fn test_legal_path() {
        let mut attempt = CallAttempt::new("lead-1");
        assert_eq!(attempt.phase(), AttemptPhase::Queued);
        attempt.transition(AttemptPhase::Dialing).unwrap();
        attempt.transition(AttemptPhase::Connected).unwrap();
        attempt.transition(AttemptPhase::Summarizing).unwrap();
        attempt
            .transition(terminal(TerminalOutcome::Completed))
            .unwrap();
        assert_eq!(attempt.outcome(), Some(TerminalOutcome::Completed));
    }

    #[test]
    fn test_illegal_transitions_rejected() {
        let mut attempt = CallAttempt::new("lead-1");
        let err = attempt.transition(AttemptPhase::Connected).unwrap_err();
        assert_eq!(
            err.to_string(),
            "illegal attempt transition for lead lead-1: queued -> connected"
        );
        assert_eq!(attempt.phase(), AttemptPhase::Queued);

        // Completed only after summarizing
        attempt.transition(AttemptPhase::Dialing).unwrap();
        assert!(attempt
            .transition(terminal(TerminalOutcome::Completed))
            .is_err());
    }

    #[test]
    fn test_skip_concludes_queued_attempt() {
        let attempt = CallAttempt::skip("lead-1");
        assert_eq!(attempt.outcome(), Some(TerminalOutcome::Skipped));
        assert_eq!(attempt.phase().name(), "skipped");
        assert!(attempt.external_call_id.is_none());
        assert!(AttemptPhase::Queued.can_transition_to(&attempt.phase()));
        assert!(!AttemptPhase::Dialing.can_transition_to(&attempt.phase()));
    }

    #[test]
    fn test_no_transition_out_of_terminal() {
        let mut attempt = CallAttempt::skip("lead-1");
        assert!(attempt.phase().is_terminal());
        assert!(attempt.transition(AttemptPhase::Dialing).is_err());
        assert!(attempt
            .transition(terminal(TerminalOutcome::TimedOut))
            .is_err());
    }

    #[tokio::test]
    async fn test_successful_attempt() {
        let h = Harness::new();
        let report = h.run(fixtures::lead("Acme"), Duration::from_secs(5)).await;

        assert_eq!(report.outcome(), TerminalOutcome::Completed);
        assert!(report.attempt.external_call_id.is_some());
        assert!(report.summary.is_some());
        assert!(report.error.is_none());
        assert_eq!(h.gate.available(), 1);
        assert!(h.placement.hang_ups().await.is_empty());
    }

    #[tokio::test]
    async fn test_placement_failure() {
        let h = Harness::new();
        let lead = fixtures::lead("Acme");
        h.placement.fail_for(&lead.contact_number).await;

        let report = h.run(lead, Duration::from_secs(5)).await;
        assert_eq!(
            report.outcome(),
            TerminalOutcome::Failed {
                reason: FailureReason::PlacementError
            }
        );
        assert!(report.attempt.external_call_id.is_none());
        assert_eq!(h.pipeline.wait_count(), 0);
    }

    #[tokio::test]
    async fn test_no_answer() {
        let h = Harness::new();
        h.pipeline
            .set_next_error(PipelineError::NoAnswer("busy".to_string()))
            .await;

        let report = h.run(fixtures::lead("Acme"), Duration::from_secs(5)).await;
        assert_eq!(
            report.outcome(),
            TerminalOutcome::Failed {
                reason: FailureReason::NoAnswer
            }
        );
        assert!(h.placement.hang_ups().await.is_empty());
    }

    #[tokio::test]
    async fn test_pipeline_failure_hangs_up() {
        let h = Harness::new();
        h.pipeline
            .set_next_error(PipelineError::Failed("stream dropped".to_string()))
            .await;

        let report = h.run(fixtures::lead("Acme"), Duration::from_secs(5)).await;
        assert_eq!(
            report.outcome(),
            TerminalOutcome::Failed {
                reason: FailureReason::PipelineError
            }
        );
        assert_eq!(h.placement.hang_ups().await.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_hangs_up_and_frees_slot() {
        let h = Harness::new();
        h.pipeline.set_duration(Duration::from_secs(600)).await;

        let report = h.run(fixtures::lead("Acme"), Duration::from_secs(30)).await;
        assert_eq!(report.outcome(), TerminalOutcome::TimedOut);
        let call_id = report.attempt.external_call_id.clone().unwrap();
        assert_eq!(h.placement.hang_ups().await, vec![call_id]);
        assert_eq!(h.gate.available(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_while_dialing() {
        let h = Harness::new();
        h.placement.set_delay(Duration::from_secs(120)).await;

        let report = h.run(fixtures::lead("Acme"), Duration::from_secs(30)).await;
        assert_eq!(report.outcome(), TerminalOutcome::TimedOut);
        assert!(report.attempt.external_call_id.is_none());
        assert!(h.placement.hang_ups().await.is_empty());
    }

    #[tokio::test]
    async fn test_conclude_frees_slot_before_terminal_phase() {
        let gate = ConcurrencyGate::new(1);
        let slot = gate.acquire().await.unwrap();
        let mut attempt = CallAttempt::new("lead-1");
        attempt.transition(AttemptPhase::Dialing).unwrap();

        conclude(&mut attempt, slot, TerminalOutcome::TimedOut);
        assert_eq!(gate.in_use(), 0);
        assert_eq!(attempt.outcome(), Some(TerminalOutcome::TimedOut));
    }

    #[test]
    fn test_deadline_after_huge_budget() {
        let before = Instant::now();
        let deadline = deadline_after(Duration::MAX);
        assert!(deadline > before + Duration::from_secs(86_400 * 365));

        let deadline = deadline_after(Duration::from_secs(5));
        assert!(deadline <= Instant::now() + Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_huge_budget_completes_normally() {
        let h = Harness::new();
        let report = h.run(fixtures::lead("Acme"), Duration::MAX).await;
        assert_eq!(report.outcome(), TerminalOutcome::Completed);
        assert!(report.error.is_none());
        assert_eq!(h.gate.available(), 1);
    }

    #[tokio::test]
    async fn test_summary_failure_uses_placeholder() {
        let h = Harness::new();
        h.summarizer.set_fail(true).await;

        let report = h.run(fixtures::lead("Acme"), Duration::from_secs(5)).await;
        assert_eq!(report.outcome(), TerminalOutcome::Completed);
        let summary = report.summary.unwrap();
        assert!(summary.summary.starts_with("Summary unavailable"));
        assert_eq!(summary.interest_level, InterestLevel::None);
    }
}
