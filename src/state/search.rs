//! Debounced search input.
//!
//! At most one evaluation is ever pending: each keystroke replaces the
//! pending query and restarts the delay. The host drives it with `poll` from
//! its periodic tick, the same way it would drive any other timer.
use std::time::Duration;

use tokio::time::Instant;

/// Delay between the last keystroke and search evaluation.
pub const DEFAULT_SEARCH_DEBOUNCE: Duration = Duration::from_millis(200);

#[derive(Debug, Clone)]
struct PendingSearch {
    query: String,
    due: Instant,
}

#[derive(Debug, Clone)]
pub struct SearchDebouncer {
    delay: Duration,
    pending: Option<PendingSearch>,
}

impl Default for SearchDebouncer {
    fn default() -> Self {
        Self::new(DEFAULT_SEARCH_DEBOUNCE)
    }
}

impl SearchDebouncer {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            pending: None,
        }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Replace any pending query and restart the delay from `now`.
    pub fn schedule(&mut self, query: impl Into<String>, now: Instant) {
        if self.pending.is_some() {
            tracing::trace!("Rescheduling pending search");
        }
        self.pending = Some(PendingSearch {
            query: query.into(),
            due: now + self.delay,
        });
    }

    /// Take the pending query once its delay has elapsed.
    pub fn poll(&mut self, now: Instant) -> Option<String> {
        match &self.pending {
            Some(pending) if now >= pending.due => self.pending.take().map(|p| p.query),
            _ => None,
        }
    }

    /// Take the pending query immediately (explicit submit).
    pub fn flush(&mut self) -> Option<String> {
        self.pending.take().map(|p| p.query)
    }

    /// Drop the pending query. Returns whether one was pending.
    pub fn cancel(&mut self) -> bool {
        self.pending.take().is_some()
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }
}
