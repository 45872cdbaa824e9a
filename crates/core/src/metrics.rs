//! Prometheus metrics for core components.
//!
//! This module provides metrics for:
//! - Campaign runs (attempts, outcomes, concurrency)
//! - Call events arriving from the provider
//! - External services (telephony provider, LLM)

use once_cell::sync::Lazy;
use prometheus::{Histogram, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, IntGauge, Opts};

// =============================================================================
// Campaign Metrics
// =============================================================================

/// Campaign runs started by kind.
pub static CAMPAIGN_RUNS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("callrunner_campaign_runs_total", "Total campaign runs started"),
        &["kind"], // "campaign", "retry"
    )
    .unwrap()
});

/// Finished call attempts by outcome.
pub static CALL_ATTEMPTS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("callrunner_call_attempts_total", "Total finished call attempts"),
        &["outcome"], // "completed", "failed", "timed_out"
    )
    .unwrap()
});

/// Call attempt duration in seconds.
pub static CALL_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "callrunner_call_duration_seconds",
            "Duration of call attempts",
        )
        .buckets(vec![1.0, 5.0, 15.0, 30.0, 60.0, 120.0, 300.0, 600.0]),
        &["outcome"],
    )
    .unwrap()
});

/// Call attempts currently holding a gate slot.
pub static ACTIVE_CALLS: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new("callrunner_active_calls", "Call attempts in progress").unwrap()
});

/// Time the dispatcher waited for a free slot.
pub static GATE_WAIT: Lazy<Histogram> = Lazy::new(|| {
    Histogram::with_opts(
        HistogramOpts::new(
            "callrunner_gate_wait_seconds",
            "Time spent waiting for a concurrency slot",
        )
        .buckets(vec![0.001, 0.01, 0.1, 1.0, 10.0, 60.0, 300.0]),
    )
    .unwrap()
});

/// Leads that were never dialed.
pub static LEADS_SKIPPED: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("callrunner_leads_skipped_total", "Total leads skipped by a run"),
        &["reason"], // "no_destination", "stopped", "unavailable"
    )
    .unwrap()
});

/// Meetings agreed on calls.
pub static MEETINGS_SCHEDULED: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "callrunner_meetings_scheduled_total",
        "Total calls that ended with a meeting scheduled",
    )
    .unwrap()
});

/// Summaries replaced by the placeholder.
pub static SUMMARY_FAILURES: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "callrunner_summary_failures_total",
            "Total summaries that fell back to the placeholder",
        ),
        &["backend"],
    )
    .unwrap()
});

// =============================================================================
// Call Event Metrics
// =============================================================================

/// Provider and pipeline events by kind and delivery result.
pub static CALL_EVENTS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("callrunner_call_events_total", "Total call events received"),
        &["kind", "delivery"], // delivery: "delivered", "held", "ignored"
    )
    .unwrap()
});

// =============================================================================
// External Service Metrics
// =============================================================================

/// External service request duration.
pub static EXTERNAL_SERVICE_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "callrunner_external_service_duration_seconds",
            "Duration of external service calls",
        )
        .buckets(vec![0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0]),
        &["service", "operation"],
    )
    .unwrap()
});

/// External service requests total.
pub static EXTERNAL_SERVICE_REQUESTS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "callrunner_external_service_requests_total",
            "Total external service requests",
        ),
        &["service", "operation", "status"], // status: "success", "error"
    )
    .unwrap()
});

/// Record one external request.
pub fn observe_external(service: &str, operation: &str, ok: bool, elapsed_secs: f64) {
    EXTERNAL_SERVICE_DURATION
        .with_label_values(&[service, operation])
        .observe(elapsed_secs);
    EXTERNAL_SERVICE_REQUESTS
        .with_label_values(&[service, operation, if ok { "success" } else { "error" }])
        .inc();
}

// =============================================================================
// Helper functions
// =============================================================================

/// Get all core metrics for registration in a registry.
pub fn all_metrics() -> Vec<Box<dyn prometheus::core::Collector>> {
    vec![
        // Campaign
        Box::new(CAMPAIGN_RUNS.clone()),
        Box::new(CALL_ATTEMPTS.clone()),
        Box::new(CALL_DURATION.clone()),
        Box::new(ACTIVE_CALLS.clone()),
        Box::new(GATE_WAIT.clone()),
        Box::new(LEADS_SKIPPED.clone()),
        Box::new(MEETINGS_SCHEDULED.clone()),
        Box::new(SUMMARY_FAILURES.clone()),
        // Call events
        Box::new(CALL_EVENTS.clone()),
        // External services
        Box::new(EXTERNAL_SERVICE_DURATION.clone()),
        Box::new(EXTERNAL_SERVICE_REQUESTS.clone()),
    ]
}
