//! Switchable business-hours policy for testing.

use chrono::{DateTime, Local};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use crate::campaign::BusinessHoursPolicy;

/// Business-hours policy that is open or closed on command.
#[derive(Debug)]
pub struct MockHoursPolicy {
    open: AtomicBool,
    checks: AtomicUsize,
}

impl Default for MockHoursPolicy {
    fn default() -> Self {
        Self::new(true)
    }
}

impl MockHoursPolicy {
    pub fn new(open: bool) -> Self {
        Self {
            open: AtomicBool::new(open),
            checks: AtomicUsize::new(0),
        }
    }

    pub fn set_open(&self, open: bool) {
        self.open.store(open, Ordering::SeqCst);
    }

    /// Number of times the window was consulted.
    pub fn checks(&self) -> usize {
        self.checks.load(Ordering::SeqCst)
    }
}

impl BusinessHoursPolicy for MockHoursPolicy {
    fn is_within_window(&self, _now: DateTime<Local>) -> bool {
        self.checks.fetch_add(1, Ordering::SeqCst);
        self.open.load(Ordering::SeqCst)
    }
}
