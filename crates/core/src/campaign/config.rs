//! Campaign configuration.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::hours::{CallWindow, HoursError};

/// Upper bound for `max_concurrent_calls`, in config and per-run overrides.
pub const MAX_CONCURRENT_CALLS: usize = 1_000;

/// Upper bound for `call_timeout_secs` (one day).
pub const MAX_CALL_TIMEOUT_SECS: u64 = 86_400;

/// Configuration for campaign runs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CampaignConfig {
    /// Maximum simultaneous call attempts (at least 1).
    #[serde(default = "default_max_concurrent_calls")]
    pub max_concurrent_calls: usize,

    /// Wall-clock budget per attempt, measured from attempt start (seconds).
    #[serde(default = "default_call_timeout")]
    pub call_timeout_secs: u64,

    /// Start of the daily call window, local time `HH:MM`.
    #[serde(default = "default_call_hours_start")]
    pub call_hours_start: String,

    /// End of the daily call window, local time `HH:MM`.
    /// Equal to the start means no restriction.
    #[serde(default = "default_call_hours_end")]
    pub call_hours_end: String,

    /// How often a paused run re-checks business hours (milliseconds).
    #[serde(default = "default_hours_check_interval")]
    pub hours_check_interval_ms: u64,

    /// Allow operator-triggered retry runs.
    #[serde(default = "default_retry_enabled")]
    pub retry_enabled: bool,

    /// Default look-back for retry runs (hours, 0 = all history).
    #[serde(default = "default_retry_window_hours")]
    pub default_retry_window_hours: u64,
}

fn default_max_concurrent_calls() -> usize {
    3
}

fn default_call_timeout() -> u64 {
    300 // 5 minutes
}

fn default_call_hours_start() -> String {
    "09:00".to_string()
}

fn default_call_hours_end() -> String {
    "17:00".to_string()
}

fn default_hours_check_interval() -> u64 {
    30_000 // 30 seconds
}

fn default_retry_enabled() -> bool {
    true
}

fn default_retry_window_hours() -> u64 {
    24
}

impl Default for CampaignConfig {
    fn default() -> Self {
        Self {
            max_concurrent_calls: default_max_concurrent_calls(),
            call_timeout_secs: default_call_timeout(),
            call_hours_start: default_call_hours_start(),
            call_hours_end: default_call_hours_end(),
            hours_check_interval_ms: default_hours_check_interval(),
            retry_enabled: default_retry_enabled(),
            default_retry_window_hours: default_retry_window_hours(),
        }
    }
}

impl CampaignConfig {
    /// Parse the configured call window.
    pub fn call_window(&self) -> Result<CallWindow, HoursError> {
        CallWindow::parse(&self.call_hours_start, &self.call_hours_end)
    }

    /// Cut-off for a retry run when the caller gives none.
    pub fn default_retry_since(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        if self.default_retry_window_hours == 0 {
            return None;
        }
        // Clamped to a century so the subtraction cannot overflow.
        let hours = self.default_retry_window_hours.min(876_000) as i64;
        now.checked_sub_signed(chrono::Duration::hours(hours))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = CampaignConfig::default();
        assert_eq!(config.max_concurrent_calls, 3);
        assert_eq!(config.call_timeout_secs, 300);
        assert_eq!(config.call_hours_start, "09:00");
        assert_eq!(config.call_hours_end, "17:00");
        assert_eq!(config.hours_check_interval_ms, 30_000);
        assert!(config.retry_enabled);
        assert_eq!(config.default_retry_window_hours, 24);
    }

    #[test]
    fn test_deserialize_minimal() {
        let toml = r#"
            max_concurrent_calls = 8
            retry_enabled = false
        "#;
        let config: CampaignConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.max_concurrent_calls, 8);
        assert!(!config.retry_enabled);
        assert_eq!(config.call_timeout_secs, 300);
    }

    #[test]
    fn test_call_window() {
        let config = CampaignConfig {
            call_hours_start: "22:00".to_string(),
            call_hours_end: "06:00".to_string(),
            ..Default::default()
        };
        let window = config.call_window().unwrap();
        assert!(window.start > window.end);
    }

    #[test]
    fn test_default_retry_since() {
        let now = Utc::now();
        let config = CampaignConfig::default();
        assert_eq!(
            config.default_retry_since(now),
            Some(now - chrono::Duration::hours(24))
        );

        let config = CampaignConfig {
            default_retry_window_hours: 0,
            ..Default::default()
        };
        assert_eq!(config.default_retry_since(now), None);
    }
}
