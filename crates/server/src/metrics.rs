//! Prometheus metrics for observability.
//!
//! This module provides metrics for monitoring the callrunner server:
//! - HTTP request metrics (latency, counts, errors)
//! - Lead counts by status
//! - Campaign run status (collected dynamically)

use once_cell::sync::Lazy;
use prometheus::{
    self, Encoder, HistogramOpts, HistogramVec, IntCounterVec, IntGauge, IntGaugeVec, Opts,
    Registry, TextEncoder,
};

use callrunner_core::{LeadFilter, LeadStatus};

/// Global metrics registry.
pub static REGISTRY: Lazy<Registry> = Lazy::new(|| {
    let registry = Registry::new();
    register_metrics(&registry);
    registry
});

static UUID_SEGMENT: Lazy<regex_lite::Regex> = Lazy::new(|| {
    regex_lite::Regex::new(
        r"[0-9a-fA-F]{8}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{12}",
    )
    .unwrap()
});

static NUMERIC_SEGMENT: Lazy<regex_lite::Regex> =
    Lazy::new(|| regex_lite::Regex::new(r"/\d+(/|$)").unwrap());

// =============================================================================
// HTTP Request Metrics
// =============================================================================

/// HTTP request duration in seconds.
pub static HTTP_REQUEST_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "callrunner_http_request_duration_seconds",
            "HTTP request duration in seconds",
        )
        .buckets(vec![
            0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0,
        ]),
        &["method", "path", "status"],
    )
    .unwrap()
});

/// HTTP requests total count.
pub static HTTP_REQUESTS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("callrunner_http_requests_total", "Total HTTP requests"),
        &["method", "path", "status"],
    )
    .unwrap()
});

/// HTTP requests currently in flight.
pub static HTTP_REQUESTS_IN_FLIGHT: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "callrunner_http_requests_in_flight",
        "Number of HTTP requests currently being processed",
    )
    .unwrap()
});

// =============================================================================
// Lead Metrics
// =============================================================================

/// Leads by status.
pub static LEADS_BY_STATUS: Lazy<IntGaugeVec> = Lazy::new(|| {
    IntGaugeVec::new(
        Opts::new("callrunner_leads_by_status", "Number of leads in each status"),
        &["status"],
    )
    .unwrap()
});

// =============================================================================
// Campaign Metrics
// =============================================================================

/// Whether a campaign run is active (1 = running or stopping).
pub static CAMPAIGN_RUNNING: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "callrunner_campaign_running",
        "Whether a campaign run is active",
    )
    .unwrap()
});

/// Leads still waiting in the current run.
pub static CAMPAIGN_QUEUED: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "callrunner_campaign_queued_leads",
        "Leads waiting to be dialed in the current run",
    )
    .unwrap()
});

/// Attempts waiting on a webhook event.
pub static CALL_EVENT_WAITERS: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "callrunner_call_event_waiters",
        "Call attempts waiting for a conversation end",
    )
    .unwrap()
});

fn register_metrics(registry: &Registry) {
    // HTTP
    registry
        .register(Box::new(HTTP_REQUEST_DURATION.clone()))
        .unwrap();
    registry
        .register(Box::new(HTTP_REQUESTS_TOTAL.clone()))
        .unwrap();
    registry
        .register(Box::new(HTTP_REQUESTS_IN_FLIGHT.clone()))
        .unwrap();

    // Leads
    registry
        .register(Box::new(LEADS_BY_STATUS.clone()))
        .unwrap();

    // Campaign
    registry
        .register(Box::new(CAMPAIGN_RUNNING.clone()))
        .unwrap();
    registry
        .register(Box::new(CAMPAIGN_QUEUED.clone()))
        .unwrap();
    registry
        .register(Box::new(CALL_EVENT_WAITERS.clone()))
        .unwrap();

    // Core metrics (campaign runs, call attempts, external services)
    for metric in callrunner_core::metrics::all_metrics() {
        registry.register(metric).unwrap();
    }
}

/// Encode all metrics as Prometheus text format.
pub fn encode_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::error!("Failed to encode metrics: {}", e);
    }
    String::from_utf8_lossy(&buffer).into_owned()
}

/// Collect dynamic metrics from current application state.
///
/// Called before encoding so gauges reflect the campaign and lead store
/// at scrape time.
pub async fn collect_dynamic_metrics(state: &crate::state::AppState) {
    let status = state.controller().status().await;
    CAMPAIGN_RUNNING.set(if status.is_running { 1 } else { 0 });
    CAMPAIGN_QUEUED.set(if status.is_running {
        status.queued as i64
    } else {
        0
    });

    CALL_EVENT_WAITERS.set(state.call_events().waiting() as i64);

    for lead_status in [
        LeadStatus::Pending,
        LeadStatus::InProgress,
        LeadStatus::Completed,
        LeadStatus::Failed,
    ] {
        let filter = LeadFilter::new().with_status(lead_status);
        if let Ok(count) = state.leads().count(&filter) {
            LEADS_BY_STATUS
                .with_label_values(&[lead_status.as_str()])
                .set(count);
        }
    }
}

/// Normalize a path for metric labels (replace IDs with placeholders).
pub fn normalize_path(path: &str) -> String {
    let result = UUID_SEGMENT.replace_all(path, "{id}");
    let result = NUMERIC_SEGMENT.replace_all(&result, "/{id}$1");
    result.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_path_uuid() {
        let path = "/api/v1/leads/550e8400-e29b-41d4-a716-446655440000";
        assert_eq!(normalize_path(path), "/api/v1/leads/{id}");
    }

    #[test]
    fn test_normalize_path_numeric() {
        let path = "/api/v1/leads/12345";
        assert_eq!(normalize_path(path), "/api/v1/leads/{id}");
    }

    #[test]
    fn test_normalize_path_no_ids() {
        let path = "/api/v1/campaign/status";
        assert_eq!(normalize_path(path), "/api/v1/campaign/status");
    }

    #[test]
    fn test_encode_metrics_returns_prometheus_format() {
        HTTP_REQUESTS_TOTAL
            .with_label_values(&["GET", "/test", "200"])
            .inc();

        let output = encode_metrics();
        assert!(output.contains("callrunner_http_requests_total"));
        assert!(output.contains("# HELP"));
        assert!(output.contains("# TYPE"));
    }

    #[test]
    fn test_registry_contains_all_metrics() {
        // Prometheus only outputs vectors that have been touched
        HTTP_REQUEST_DURATION
            .with_label_values(&["GET", "/test", "200"])
            .observe(0.1);
        HTTP_REQUESTS_IN_FLIGHT.set(0);
        LEADS_BY_STATUS.with_label_values(&["pending"]).set(0);
        CAMPAIGN_RUNNING.set(0);
        callrunner_core::metrics::CALL_ATTEMPTS
            .with_label_values(&["completed"])
            .inc_by(0);

        let output = encode_metrics();

        assert!(output.contains("callrunner_http_request_duration_seconds"));
        assert!(output.contains("callrunner_http_requests_in_flight"));
        assert!(output.contains("callrunner_leads_by_status"));
        assert!(output.contains("callrunner_campaign_running"));
        assert!(output.contains("callrunner_active_calls"));
        assert!(output.contains("callrunner_call_attempts_total"));
    }
}
