//! Campaign controller.
//!
//! Owns at most one campaign run at a time. Each run gets a dispatch task
//! that works through its lead queue:
//! - Waits for the scheduled start, if the run was deferred
//! - Waits for business hours (unless the run ignores them)
//! - Waits for a free concurrency slot
//! - Spawns one call attempt per lead and records its outcome

use std::any::Any;
use std::collections::{BTreeSet, VecDeque};
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Local, Utc};
use futures::FutureExt;
use tokio::sync::{watch, Notify, RwLock};
use tokio::task::{JoinError, JoinSet};
use tracing::{debug, error, info, warn};

use crate::lead::{Lead, LeadFilter, LeadStatus, LeadStore};
use crate::metrics::{
    ACTIVE_CALLS, CALL_ATTEMPTS, CALL_DURATION, CAMPAIGN_RUNS, GATE_WAIT, LEADS_SKIPPED,
    MEETINGS_SCHEDULED,
};
use crate::outcome::{InterestLevel, OutcomeRecord, OutcomeStatus, ResultSink};

use super::attempt::{
    run_attempt, AttemptDeps, AttemptReport, CallAttempt, FailureReason, TerminalOutcome,
};
use super::config::CampaignConfig;
use super::gate::ConcurrencyGate;
use super::hours::BusinessHoursPolicy;
use super::types::{
    CampaignError, CampaignFilters, CampaignStatus, RunCounters, RunHandle, RunKind, RunOptions,
    RunSettings, RunState, StopAck,
};

/// Run id stamped on records written by [`CampaignController::recover_interrupted`].
pub const RECOVERY_RUN_ID: &str = "recovery";

/// One orchestration session.
struct CampaignRun {
    id: String,
    kind: RunKind,
    lead_ids: Vec<String>,
    state: RunState,
    settings: RunSettings,
    counters: RunCounters,
    active: BTreeSet<String>,
    queued: usize,
    paused_for_hours: bool,
    awaiting_start: bool,
    gate: Arc<ConcurrencyGate>,
    stop: Arc<Notify>,
    started_at: DateTime<Utc>,
    finished_at: Option<DateTime<Utc>>,
}

impl CampaignRun {
    fn new(kind: RunKind, leads: &[Lead], settings: RunSettings) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            kind,
            lead_ids: leads.iter().map(|l| l.id.clone()).collect(),
            state: RunState::Running,
            settings,
            counters: RunCounters::default(),
            active: BTreeSet::new(),
            queued: leads.len(),
            paused_for_hours: false,
            awaiting_start: settings.start_at.is_some(),
            gate: Arc::new(ConcurrencyGate::new(settings.max_concurrent_calls)),
            stop: Arc::new(Notify::new()),
            started_at: Utc::now(),
            finished_at: None,
        }
    }

    fn handle(&self) -> RunHandle {
        RunHandle {
            run_id: self.id.clone(),
            kind: self.kind,
            lead_ids: self.lead_ids.clone(),
            settings: self.settings,
            started_at: self.started_at,
        }
    }

    fn snapshot(&self, within_business_hours: bool) -> CampaignStatus {
        CampaignStatus {
            is_running: self.state != RunState::Stopped,
            state: self.state,
            stopping: self.state == RunState::Stopping,
            run_id: Some(self.id.clone()),
            kind: Some(self.kind),
            total_leads: self.lead_ids.len(),
            counters: self.counters,
            concluded: self.counters.concluded(),
            active_lead_ids: self.active.iter().cloned().collect(),
            queued: self.queued,
            paused_for_hours: self.paused_for_hours,
            awaiting_start: self.awaiting_start,
            within_business_hours,
            gate_capacity: self.gate.capacity(),
            gate_in_use: self.gate.in_use(),
            settings: Some(self.settings),
            started_at: Some(self.started_at),
            finished_at: self.finished_at,
        }
    }
}

/// The current run plus the last finished one.
#[derive(Default)]
struct RunSlot {
    current: Option<CampaignRun>,
    last: Option<CampaignRun>,
}

/// Drives campaign runs over the lead store.
pub struct CampaignController {
    config: CampaignConfig,
    dispatcher: Dispatcher,
}

impl CampaignController {
    /// Create a new controller.
    pub fn new(
        config: CampaignConfig,
        leads: Arc<dyn LeadStore>,
        results: Arc<dyn ResultSink>,
        deps: AttemptDeps,
        hours: Arc<dyn BusinessHoursPolicy>,
    ) -> Self {
        let (idle_tx, _) = watch::channel(false);

        let dispatcher = Dispatcher {
            leads,
            results,
            deps,
            hours,
            slot: Arc::new(RwLock::new(RunSlot::default())),
            running: Arc::new(idle_tx),
            hours_check_interval: Duration::from_millis(config.hours_check_interval_ms.max(1)),
        };

        Self { config, dispatcher }
    }

    pub fn config(&self) -> &CampaignConfig {
        &self.config
    }

    /// Start a run over the pending leads matching `filters`.
    pub async fn start(
        &self,
        filters: CampaignFilters,
        options: RunOptions,
    ) -> Result<RunHandle, CampaignError> {
        options.validate()?;

        let mut slot = self.dispatcher.slot.write().await;
        if let Some(run) = &slot.current {
            return Err(CampaignError::AlreadyRunning {
                run_id: run.id.clone(),
            });
        }

        let leads = self
            .dispatcher
            .leads
            .list_pending(&filters.to_lead_filter())?;
        if leads.is_empty() {
            return Err(CampaignError::NoEligibleLeads);
        }

        Ok(self.launch(&mut slot, RunKind::Campaign, leads, &options))
    }

    /// Start a run over the leads whose latest outcome was a failure.
    ///
    /// `since` limits the look-back; `None` considers all history.
    pub async fn retry_failed(
        &self,
        since: Option<DateTime<Utc>>,
        options: RunOptions,
    ) -> Result<RunHandle, CampaignError> {
        if !self.config.retry_enabled {
            return Err(CampaignError::RetryDisabled);
        }
        options.validate()?;

        let mut slot = self.dispatcher.slot.write().await;
        if let Some(run) = &slot.current {
            return Err(CampaignError::AlreadyRunning {
                run_id: run.id.clone(),
            });
        }

        let failed_ids = self.dispatcher.results.latest_failed(since)?;
        let mut leads = Vec::with_capacity(failed_ids.len());
        for id in failed_ids {
            let Some(lead) = self.dispatcher.leads.get(&id)? else {
                warn!("Failed outcome references unknown lead {}", id);
                continue;
            };
            match lead.status {
                LeadStatus::Failed => {
                    leads.push(self.dispatcher.leads.set_status(&id, LeadStatus::Pending)?);
                }
                LeadStatus::Pending => leads.push(lead),
                other => {
                    debug!("Not retrying lead {} in status {}", id, other);
                }
            }
        }

        if leads.is_empty() {
            return Err(CampaignError::NoEligibleLeads);
        }

        info!("Retrying {} failed leads", leads.len());
        Ok(self.launch(&mut slot, RunKind::Retry, leads, &options))
    }

    fn launch(
        &self,
        slot: &mut RunSlot,
        kind: RunKind,
        leads: Vec<Lead>,
        options: &RunOptions,
    ) -> RunHandle {
        let settings = RunSettings {
            max_concurrent_calls: options
                .max_concurrent_calls
                .unwrap_or(self.config.max_concurrent_calls)
                .max(1),
            call_timeout_secs: options
                .call_timeout_secs
                .unwrap_or(self.config.call_timeout_secs),
            honour_business_hours: !options.ignore_business_hours,
            start_at: options.start_at,
        };

        let run = CampaignRun::new(kind, &leads, settings);
        let handle = run.handle();
        let gate = Arc::clone(&run.gate);
        let stop = Arc::clone(&run.stop);
        slot.current = Some(run);

        self.dispatcher.running.send_replace(true);
        CAMPAIGN_RUNS.with_label_values(&[kind.as_str()]).inc();

        info!(
            run_id = %handle.run_id,
            kind = kind.as_str(),
            leads = leads.len(),
            max_concurrent_calls = settings.max_concurrent_calls,
            call_timeout_secs = settings.call_timeout_secs,
            start_at = ?settings.start_at,
            "Campaign run started"
        );

        let dispatcher = self.dispatcher.clone();
        let run_id = handle.run_id.clone();
        tokio::spawn(async move {
            dispatcher
                .run(run_id, VecDeque::from(leads), gate, stop, settings)
                .await;
        });

        handle
    }

    /// Snapshot of the current run, or the last finished one.
    pub async fn status(&self) -> CampaignStatus {
        let within_business_hours = self.dispatcher.hours.is_within_window(Local::now());
        let slot = self.dispatcher.slot.read().await;

        match slot.current.as_ref().or(slot.last.as_ref()) {
            Some(run) => run.snapshot(within_business_hours),
            None => CampaignStatus {
                is_running: false,
                state: RunState::Stopped,
                stopping: false,
                run_id: None,
                kind: None,
                total_leads: 0,
                counters: RunCounters::default(),
                concluded: 0,
                active_lead_ids: Vec::new(),
                queued: 0,
                paused_for_hours: false,
                awaiting_start: false,
                within_business_hours,
                gate_capacity: self.config.max_concurrent_calls.max(1),
                gate_in_use: 0,
                settings: None,
                started_at: None,
                finished_at: None,
            },
        }
    }

    /// Request a graceful halt. In-flight attempts run to completion.
    ///
    /// Closes the run's gate so a dispatcher waiting for a slot wakes up,
    /// and cancels a scheduled start that has not fired yet.
    pub async fn stop(&self) -> StopAck {
        let mut slot = self.dispatcher.slot.write().await;

        let Some(run) = slot.current.as_mut() else {
            return StopAck {
                accepted: false,
                run_id: None,
                active_attempts: 0,
                message: "No campaign is running".to_string(),
            };
        };

        if run.state == RunState::Running {
            run.state = RunState::Stopping;
            run.gate.close();
            run.stop.notify_one();
            info!(run_id = %run.id, active = run.active.len(), "Campaign run stopping");
        }

        StopAck {
            accepted: true,
            run_id: Some(run.id.clone()),
            active_attempts: run.active.len(),
            message: format!(
                "Stopping; {} active attempt(s) will finish",
                run.active.len()
            ),
        }
    }

    /// Wait until no run is active.
    pub async fn wait_idle(&self) {
        let mut rx = self.dispatcher.running.subscribe();
        // The sender lives as long as the controller.
        let _ = rx.wait_for(|running| !*running).await;
    }

    /// Stop the current run and wait for it to finish.
    pub async fn shutdown(&self) {
        let ack = self.stop().await;
        if ack.accepted {
            info!("Waiting for {} active call attempt(s)", ack.active_attempts);
        }
        self.wait_idle().await;
    }

    /// Close out leads left `in_progress` by a previous process.
    ///
    /// Each one gets a failed outcome record with reason `internal_error`,
    /// which makes it eligible for [`retry_failed`](Self::retry_failed).
    pub async fn recover_interrupted(&self) -> Result<usize, CampaignError> {
        let slot = self.dispatcher.slot.read().await;
        if slot.current.is_some() {
            return Ok(0);
        }

        let filter = LeadFilter::new()
            .with_status(LeadStatus::InProgress)
            .with_limit(i64::MAX);
        let interrupted = self.dispatcher.leads.list(&filter)?;

        for lead in &interrupted {
            let record = OutcomeRecord {
                id: uuid::Uuid::new_v4().to_string(),
                run_id: RECOVERY_RUN_ID.to_string(),
                lead_id: lead.id.clone(),
                external_call_id: None,
                status: OutcomeStatus::Failed,
                failure_reason: Some(FailureReason::InternalError.as_str().to_string()),
                duration_secs: 0.0,
                summary: "Call attempt interrupted by a restart".to_string(),
                interest_level: InterestLevel::None,
                meeting_scheduled: false,
                next_steps: "retry_later".to_string(),
                recorded_at: Utc::now(),
            };
            self.dispatcher.results.append(&record)?;
            self.dispatcher.leads.set_status(&lead.id, LeadStatus::Failed)?;
            info!("Recovered interrupted lead: {}", lead.id);
        }

        if !interrupted.is_empty() {
            warn!("Recovered {} interrupted call attempts", interrupted.len());
        }
        Ok(interrupted.len())
    }
}

/// What happened when the dispatcher tried to register a lead.
enum Admission {
    Admitted,
    Stopping,
    Unavailable(String),
}

/// Everything a run's dispatch task needs.
#[derive(Clone)]
struct Dispatcher {
    leads: Arc<dyn LeadStore>,
    results: Arc<dyn ResultSink>,
    deps: AttemptDeps,
    hours: Arc<dyn BusinessHoursPolicy>,
    slot: Arc<RwLock<RunSlot>>,
    /// True while a run is active.
    running: Arc<watch::Sender<bool>>,
    hours_check_interval: Duration,
}

impl Dispatcher {
    async fn run(
        self,
        run_id: String,
        mut queue: VecDeque<Lead>,
        gate: Arc<ConcurrencyGate>,
        stop: Arc<Notify>,
        settings: RunSettings,
    ) {
        let budget = Duration::from_secs(settings.call_timeout_secs);
        let mut tasks: JoinSet<AttemptReport> = JoinSet::new();

        if let Some(start_at) = settings.start_at {
            self.wait_for_start(&run_id, start_at, &stop).await;
        }

        loop {
            if self.is_stopping().await || queue.is_empty() {
                match tasks.join_next().await {
                    Some(joined) => {
                        self.finish_attempt(&run_id, joined).await;
                        continue;
                    }
                    None => break,
                }
            }

            if settings.honour_business_hours && !self.hours.is_within_window(Local::now()) {
                if self.set_paused(true).await {
                    info!(run_id = %run_id, "Outside business hours, dispatch paused");
                }
                tokio::select! {
                    Some(joined) = tasks.join_next(), if !tasks.is_empty() => {
                        self.finish_attempt(&run_id, joined).await;
                    }
                    _ = stop.notified() => {}
                    _ = tokio::time::sleep(self.hours_check_interval) => {}
                }
                continue;
            }
            if self.set_paused(false).await {
                info!(run_id = %run_id, "Business hours open, dispatch resumed");
            }

            let wait_started = std::time::Instant::now();
            let slot = tokio::select! {
                biased;
                _ = stop.notified() => continue,
                Some(joined) = tasks.join_next(), if !tasks.is_empty() => {
                    self.finish_attempt(&run_id, joined).await;
                    continue;
                }
                acquired = gate.acquire() => match acquired {
                    Ok(slot) => slot,
                    Err(e) => {
                        warn!(run_id = %run_id, "{}, stopping run", e);
                        self.mark_stopping().await;
                        continue;
                    }
                },
            };
            GATE_WAIT.observe(wait_started.elapsed().as_secs_f64());

            let Some(lead) = queue.pop_front() else {
                continue;
            };

            if !lead.has_destination() {
                warn!(run_id = %run_id, lead_id = %lead.id, "Lead has no destination, skipping");
                self.skip_leads(std::slice::from_ref(&lead), "no_destination").await;
                continue;
            }

            match self.admit(&lead).await {
                Admission::Admitted => {}
                Admission::Stopping => {
                    queue.push_front(lead);
                    continue;
                }
                Admission::Unavailable(reason) => {
                    warn!(run_id = %run_id, lead_id = %lead.id, "Lead unavailable, skipping: {}", reason);
                    self.skip_leads(std::slice::from_ref(&lead), "unavailable").await;
                    continue;
                }
            }

            ACTIVE_CALLS.inc();
            debug!(run_id = %run_id, lead_id = %lead.id, "Dispatching call attempt");

            let deps = self.deps.clone();
            let attempt_run_id = run_id.clone();
            tasks.spawn(async move {
                let started = tokio::time::Instant::now();
                let fallback = lead.clone();
                match AssertUnwindSafe(run_attempt(deps, attempt_run_id, lead, budget, slot))
                    .catch_unwind()
                    .await
                {
                    Ok(report) => report,
                    Err(panic) => {
                        let message = panic_message(panic.as_ref());
                        error!(lead_id = %fallback.id, "Call attempt panicked: {}", message);
                        AttemptReport::internal_error(
                            fallback,
                            format!("attempt panicked: {}", message),
                            started.elapsed(),
                        )
                    }
                }
            });
        }

        self.finalize(&run_id, Vec::from(queue)).await;
    }

    /// Sleep until `start_at`, or until the run is stopped.
    async fn wait_for_start(&self, run_id: &str, start_at: DateTime<Utc>, stop: &Notify) {
        let delay = (start_at - Utc::now()).to_std().unwrap_or_default();
        info!(run_id = %run_id, %start_at, "Campaign run scheduled, waiting {:?}", delay);

        tokio::select! {
            biased;
            _ = stop.notified() => {
                info!(run_id = %run_id, "Scheduled campaign run cancelled");
            }
            _ = tokio::time::sleep(delay) => {
                info!(run_id = %run_id, "Scheduled start reached");
            }
        }

        if let Some(run) = self.slot.write().await.current.as_mut() {
            run.awaiting_start = false;
        }
    }

    async fn is_stopping(&self) -> bool {
        self.slot
            .read()
            .await
            .current
            .as_ref()
            .map(|run| run.state != RunState::Running)
            .unwrap_or(true)
    }

    async fn mark_stopping(&self) {
        if let Some(run) = self.slot.write().await.current.as_mut() {
            run.state = RunState::Stopping;
        }
    }

    /// Returns true if the paused flag changed.
    async fn set_paused(&self, paused: bool) -> bool {
        let mut slot = self.slot.write().await;
        match slot.current.as_mut() {
            Some(run) if run.paused_for_hours != paused => {
                run.paused_for_hours = paused;
                true
            }
            _ => false,
        }
    }

    /// Conclude `leads` as skipped. They stay `pending` and get no record.
    async fn skip_leads(&self, leads: &[Lead], reason: &str) {
        let skipped = leads
            .iter()
            .map(|lead| CallAttempt::skip(lead.id.clone()))
            .filter(|attempt| attempt.outcome() == Some(TerminalOutcome::Skipped))
            .count();
        if skipped == 0 {
            return;
        }
        if let Some(run) = self.slot.write().await.current.as_mut() {
            run.counters.skipped += skipped;
            run.queued = run.queued.saturating_sub(skipped);
        }
        LEADS_SKIPPED
            .with_label_values(&[reason])
            .inc_by(skipped as u64);
    }

    /// Register `lead` as active, unless the run is stopping.
    ///
    /// The stop flag is checked under the same lock `stop()` takes.
    async fn admit(&self, lead: &Lead) -> Admission {
        let mut slot = self.slot.write().await;
        let Some(run) = slot.current.as_mut() else {
            return Admission::Stopping;
        };
        if run.state != RunState::Running {
            return Admission::Stopping;
        }

        if let Err(e) = self.leads.set_status(&lead.id, LeadStatus::InProgress) {
            return Admission::Unavailable(e.to_string());
        }

        run.active.insert(lead.id.clone());
        run.queued = run.queued.saturating_sub(1);
        Admission::Admitted
    }

    async fn finish_attempt(&self, run_id: &str, joined: Result<AttemptReport, JoinError>) {
        ACTIVE_CALLS.dec();

        let report = match joined {
            Ok(report) => report,
            Err(e) => {
                // Panics are caught inside the task; this is cancellation.
                error!(run_id = %run_id, "Call attempt task lost: {}", e);
                return;
            }
        };

        let Some(record) = outcome_record(run_id, &report) else {
            error!(run_id = %run_id, lead_id = %report.lead.id, "Dispatched attempt ended as skipped");
            let mut slot = self.slot.write().await;
            if let Some(run) = slot.current.as_mut() {
                run.active.remove(&report.lead.id);
                run.counters.skipped += 1;
            }
            return;
        };
        let label = record.status.as_str();
        CALL_ATTEMPTS.with_label_values(&[label]).inc();
        CALL_DURATION
            .with_label_values(&[label])
            .observe(record.duration_secs);
        if record.meeting_scheduled {
            MEETINGS_SCHEDULED.inc();
        }

        if let Err(e) = self.results.append(&record) {
            error!(run_id = %run_id, lead_id = %record.lead_id, "Failed to record outcome: {}", e);
        }

        let lead_status = match record.status {
            OutcomeStatus::Completed => LeadStatus::Completed,
            OutcomeStatus::Failed | OutcomeStatus::TimedOut => LeadStatus::Failed,
        };
        if let Err(e) = self.leads.set_status(&record.lead_id, lead_status) {
            error!(run_id = %run_id, lead_id = %record.lead_id, "Failed to update lead status: {}", e);
        }

        let mut slot = self.slot.write().await;
        if let Some(run) = slot.current.as_mut() {
            run.active.remove(&record.lead_id);
            match record.status {
                OutcomeStatus::Completed => run.counters.completed += 1,
                OutcomeStatus::Failed => run.counters.failed += 1,
                OutcomeStatus::TimedOut => run.counters.timed_out += 1,
            }
            if record.meeting_scheduled {
                run.counters.meetings_scheduled += 1;
            }
        }
    }

    async fn finalize(&self, run_id: &str, remaining: Vec<Lead>) {
        self.skip_leads(&remaining, "stopped").await;

        let mut slot = self.slot.write().await;
        if let Some(mut run) = slot.current.take() {
            if !run.active.is_empty() {
                warn!(run_id = %run_id, "Run finished with {} untracked attempts", run.active.len());
                run.active.clear();
            }
            run.state = RunState::Stopped;
            run.queued = 0;
            run.paused_for_hours = false;
            run.awaiting_start = false;
            run.finished_at = Some(Utc::now());

            let c = run.counters;
            info!(
                run_id = %run_id,
                completed = c.completed,
                failed = c.failed,
                timed_out = c.timed_out,
                skipped = c.skipped,
                meetings_scheduled = c.meetings_scheduled,
                "Campaign run finished"
            );
            slot.last = Some(run);
        }
        drop(slot);

        self.running.send_replace(false);
    }
}

/// Build the outcome record for a finished attempt. Skipped attempts get none.
fn outcome_record(run_id: &str, report: &AttemptReport) -> Option<OutcomeRecord> {
    let (status, failure_reason) = match report.outcome() {
        TerminalOutcome::Completed => (OutcomeStatus::Completed, None),
        TerminalOutcome::TimedOut => (OutcomeStatus::TimedOut, None),
        TerminalOutcome::Failed { reason } => (OutcomeStatus::Failed, Some(reason)),
        TerminalOutcome::Skipped => return None,
    };

    let (summary, interest_level, meeting_scheduled, next_steps) = match &report.summary {
        Some(s) => (
            s.summary.clone(),
            s.interest_level,
            s.meeting_scheduled,
            s.next_steps.clone(),
        ),
        None => (
            report.error.clone().unwrap_or_default(),
            InterestLevel::None,
            false,
            "retry_later".to_string(),
        ),
    };

    Some(OutcomeRecord {
        id: uuid::Uuid::new_v4().to_string(),
        run_id: run_id.to_string(),
        lead_id: report.lead.id.clone(),
        external_call_id: report.attempt.external_call_id.clone(),
        status,
        failure_reason: failure_reason.map(|r| r.as_str().to_string()),
        duration_secs: report.duration.as_secs_f64(),
        summary,
        interest_level,
        meeting_scheduled,
        next_steps,
        recorded_at: Utc::now(),
    })
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
