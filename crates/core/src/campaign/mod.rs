//! Campaign orchestration: dials pending leads under a concurrency cap.
//!
//! - **Gate**: bounds simultaneous call attempts
//! - **Hours**: pauses dispatch outside the configured call window
//! - **Attempt**: drives one call from dialing to a terminal outcome
//! - **Controller**: owns the run, dispatches attempts, records outcomes

mod attempt;
mod config;
mod controller;
mod gate;
mod hours;
mod types;

pub use attempt::{
    run_attempt, AttemptDeps, AttemptError, AttemptPhase, AttemptReport, CallAttempt,
    FailureReason, TerminalOutcome,
};
pub use config::{CampaignConfig, MAX_CALL_TIMEOUT_SECS, MAX_CONCURRENT_CALLS};
pub use controller::{CampaignController, RECOVERY_RUN_ID};
pub use gate::{ConcurrencyGate, GateClosed, GateSlot};
pub use hours::{BusinessHoursPolicy, CallWindow, HoursError};
pub use types::{
    CampaignError, CampaignFilters, CampaignStatus, RunCounters, RunHandle, RunKind, RunOptions,
    RunSettings, RunState, StopAck,
};
