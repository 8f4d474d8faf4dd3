//! Shutdown hooks and their execution.

use bedrock_core::panic_message;
use serde::Serialize;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::time::{Duration, Instant};
use tracing::{debug, error, warn};

/// Callback run at shutdown. Receives what is left of the shutdown budget.
pub type ShutdownHook = Box<dyn FnOnce(Duration) + Send + 'static>;

pub(crate) struct HookEntry {
    pub(crate) name: String,
    pub(crate) hook: ShutdownHook,
}

impl HookEntry {
    pub(crate) fn new(name: impl Into<String>, hook: ShutdownHook) -> Self {
        Self {
            name: name.into(),
            hook,
        }
    }
}

impl fmt::Debug for HookEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HookEntry").field("name", &self.name).finish_non_exhaustive()
    }
}

/// A hook that took longer than the budget it was given.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HookOverrun {
    pub name: String,
    pub budget: Duration,
    pub elapsed: Duration,
}

/// A hook that panicked.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HookFailure {
    pub name: String,
    pub message: String,
}

/// What happened during one shutdown.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ShutdownReport {
    /// Hook names in the order they ran.
    pub hooks_run: Vec<String>,
    pub overruns: Vec<HookOverrun>,
    pub failures: Vec<HookFailure>,
    /// Total budget handed to the hooks.
    pub budget: Duration,
    /// Wall time spent in hooks.
    pub elapsed: Duration,
}

impl ShutdownReport {
    /// Report of a shutdown that had nothing to do.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// No overrun and no failure.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.overruns.is_empty() && self.failures.is_empty()
    }

    /// Whether the hooks together ran past the budget.
    #[must_use]
    pub fn budget_exceeded(&self) -> bool {
        self.elapsed > self.budget
    }
}

/// Runs `hooks` last-registered first. Every hook runs, even once the
/// budget is spent; it then receives `Duration::ZERO`. Such hooks are not
/// listed as overruns, [`ShutdownReport::budget_exceeded`] covers them.
pub(crate) fn run_hooks(hooks: Vec<HookEntry>, budget: Duration) -> ShutdownReport {
    let started = Instant::now();
    let deadline = started.checked_add(budget);
    let mut report = ShutdownReport {
        budget,
        ..ShutdownReport::default()
    };

    for HookEntry { name, hook } in hooks.into_iter().rev() {
        let remaining = deadline.map_or(budget, |deadline| deadline.saturating_duration_since(Instant::now()));
        debug!(hook = %name, remaining_ms = remaining.as_millis(), "Running shutdown hook");

        let hook_started = Instant::now();
        let outcome = panic::catch_unwind(AssertUnwindSafe(move || hook(remaining)));
        let elapsed = hook_started.elapsed();

        if let Err(payload) = outcome {
            let message = panic_message(payload.as_ref());
            error!(hook = %name, error = %message, "Shutdown hook panicked");
            report.failures.push(HookFailure {
                name: name.clone(),
                message,
            });
        }

        if !remaining.is_zero() && elapsed > remaining {
            warn!(
                hook = %name,
                budget_ms = remaining.as_millis(),
                elapsed_ms = elapsed.as_millis(),
                "Shutdown hook overran its budget"
            );
            report.overruns.push(HookOverrun {
                name: name.clone(),
                budget: remaining,
                elapsed,
            });
        }

        report.hooks_run.push(name);
    }

    report.elapsed = started.elapsed();
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::sync::Arc;
    use std::thread;

    fn recording(log: &Arc<Mutex<Vec<String>>>, name: &str) -> HookEntry {
        let log = Arc::clone(log);
        let label = name.to_string();
        HookEntry::new(name, Box::new(move |_| log.lock().push(label)))
    }

    #[test]
    fn test_hooks_run_lifo() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let hooks = vec![recording(&log, "a"), recording(&log, "b"), recording(&log, "c")];

        let report = run_hooks(hooks, Duration::from_secs(5));

        assert_eq!(*log.lock(), vec!["c", "b", "a"]);
        assert_eq!(report.hooks_run, vec!["c", "b", "a"]);
        assert!(report.is_clean());
        assert!(!report.budget_exceeded());
    }

    #[test]
    fn test_remaining_budget_shrinks() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let first = Arc::clone(&seen);
        let second = Arc::clone(&seen);
        let hooks = vec![
            HookEntry::new("later", Box::new(move |remaining| first.lock().push(remaining))),
            HookEntry::new(
                "slow",
                Box::new(move |remaining| {
                    second.lock().push(remaining);
                    thread::sleep(Duration::from_millis(50));
                }),
            ),
        ];

        let report = run_hooks(hooks, Duration::from_secs(2));
        let seen = seen.lock();
        assert!(seen[1] <= seen[0] - Duration::from_millis(50));
        assert!(report.is_clean());
    }

    #[test]
    fn test_overrun_reported_and_later_hooks_still_run() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let zero_seen = Arc::new(Mutex::new(None));
        let zero = Arc::clone(&zero_seen);
        let hooks = vec![
            HookEntry::new("last", Box::new(move |remaining| *zero.lock() = Some(remaining))),
            recording(&log, "middle"),
            HookEntry::new("slow", Box::new(|_| thread::sleep(Duration::from_millis(40)))),
        ];

        let report = run_hooks(hooks, Duration::from_millis(10));

        assert_eq!(report.overruns.len(), 1);
        assert_eq!(report.overruns[0].name, "slow");
        assert_eq!(*log.lock(), vec!["middle"]);
        assert_eq!(*zero_seen.lock(), Some(Duration::ZERO));
        assert!(report.budget_exceeded());
    }

    #[test]
    fn test_panicking_hook_is_isolated() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let hooks = vec![
            recording(&log, "survivor"),
            HookEntry::new("broken", Box::new(|_| panic!("hook exploded"))),
        ];

        let report = run_hooks(hooks, Duration::from_secs(1));

        assert_eq!(*log.lock(), vec!["survivor"]);
        assert_eq!(
            report.failures,
            vec![HookFailure {
                name: "broken".to_string(),
                message: "hook exploded".to_string(),
            }]
        );
        assert!(!report.is_clean());
    }
}
