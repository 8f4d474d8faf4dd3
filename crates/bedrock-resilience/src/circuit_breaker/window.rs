//! Sliding failure window.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

/// Failure timestamps younger than a fixed window.
///
/// Not synchronized; the owning breaker guards it with its own lock.
#[derive(Debug, Clone)]
pub struct FailureWindow {
    window: Duration,
    failures: VecDeque<Instant>,
}

impl FailureWindow {
    #[must_use]
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            failures: VecDeque::new(),
        }
    }

    #[must_use]
    pub const fn window(&self) -> Duration {
        self.window
    }

    /// Records a failure now.
    pub fn record_failure(&mut self) {
        self.record_failure_at(Instant::now());
    }

    /// Records a failure observed at `at`, dropping expired ones first.
    pub fn record_failure_at(&mut self, at: Instant) {
        self.evict_expired(at);
        self.failures.push_back(at);
    }

    /// Timestamps currently held, without evicting.
    #[must_use]
    pub fn stored(&self) -> usize {
        self.failures.len()
    }

    /// Failures inside the window, dropping expired ones first.
    pub fn failure_count(&mut self) -> usize {
        self.failure_count_at(Instant::now())
    }

    /// Like [`failure_count`](Self::failure_count) with an explicit clock.
    pub fn failure_count_at(&mut self, now: Instant) -> usize {
        self.evict_expired(now);
        self.failures.len()
    }

    pub fn is_empty(&mut self) -> bool {
        self.failure_count() == 0
    }

    pub fn reset(&mut self) {
        self.failures.clear();
    }

    fn evict_expired(&mut self, now: Instant) {
        let Some(cutoff) = now.checked_sub(self.window) else {
            return;
        };
        // Timestamps are pushed in order, so expired ones sit at the front.
        while self.failures.front().is_some_and(|at| *at < cutoff) {
            self.failures.pop_front();
        }
    }
}
