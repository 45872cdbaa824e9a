//! Business-hours call window.

use chrono::{DateTime, Local, NaiveTime, Timelike};
use serde::Serialize;
use thiserror::Error;

/// Invalid call window setting.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HoursError {
    #[error("invalid time of day {0:?}, expected HH:MM")]
    InvalidTime(String),
}

/// Decides whether new calls may start at a given moment.
pub trait BusinessHoursPolicy: Send + Sync {
    fn is_within_window(&self, now: DateTime<Local>) -> bool;
}

/// Daily window in local time, `[start, end)`.
///
/// A window whose end is before its start crosses midnight. Equal start and
/// end means calls are allowed at any time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CallWindow {
    pub start: NaiveTime,
    pub end: NaiveTime,
}

fn parse_time(value: &str) -> Result<NaiveTime, HoursError> {
    NaiveTime::parse_from_str(value.trim(), "%H:%M")
        .map_err(|_| HoursError::InvalidTime(value.to_string()))
}

impl CallWindow {
    pub fn parse(start: &str, end: &str) -> Result<Self, HoursError> {
        Ok(Self {
            start: parse_time(start)?,
            end: parse_time(end)?,
        })
    }

    pub fn always_open() -> Self {
        Self {
            start: NaiveTime::default(),
            end: NaiveTime::default(),
        }
    }

    pub fn contains(&self, time: NaiveTime) -> bool {
        // Minute resolution, matching the HH:MM settings.
        let time = time.with_second(0).and_then(|t| t.with_nanosecond(0)).unwrap_or(time);
        if self.start == self.end {
            true
        } else if self.start < self.end {
            self.start <= time && time < self.end
        } else {
            time >= self.start || time < self.end
        }
    }
}

impl BusinessHoursPolicy for CallWindow {
    fn is_within_window(&self, now: DateTime<Local>) -> bool {
        self.contains(now.time())
    }
}
