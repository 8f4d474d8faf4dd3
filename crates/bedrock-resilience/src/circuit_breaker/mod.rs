//! Circuit breaker implementation.

mod window;

pub use window::FailureWindow;

use bedrock_core::codes::common;
use bedrock_core::{ErrorInfo, Result};
use parking_lot::Mutex;
use serde::Serialize;
use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, info, warn};

const MODULE: &str = "circuit_breaker";

/// Circuit breaker state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum CircuitState {
    /// Circuit is closed - requests are allowed.
    Closed = 0,
    /// Circuit is open - requests are rejected.
    Open = 1,
    /// Circuit is half-open - limited requests are allowed.
    HalfOpen = 2,
}

impl From<u8> for CircuitState {
    fn from(value: u8) -> Self {
        match value {
            1 => Self::Open,
            2 => Self::HalfOpen,
            _ => Self::Closed,
        }
    }
}

impl fmt::Display for CircuitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Closed => "CLOSED",
            Self::Open => "OPEN",
            Self::HalfOpen => "HALF_OPEN",
        })
    }
}

/// Circuit breaker configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CircuitBreakerConfig {
    /// Failures inside `failure_window` that open the circuit.
    pub failure_threshold: usize,
    /// Consecutive half-open successes that close the circuit.
    pub success_threshold: usize,
    /// How long a failure keeps counting.
    pub failure_window: Duration,
    /// Time spent open before probing in half-open.
    pub open_timeout: Duration,
    /// Probe requests let through while half-open.
    pub half_open_max_requests: usize,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            success_threshold: 2,
            failure_window: Duration::from_secs(60),
            open_timeout: Duration::from_secs(30),
            half_open_max_requests: 3,
        }
    }
}

/// Point-in-time view of a breaker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CircuitStats {
    pub state: CircuitState,
    pub failure_count: usize,
    pub consecutive_successes: usize,
    pub half_open_requests: usize,
    pub failure_threshold: usize,
    pub is_open: bool,
}

#[derive(Debug)]
struct Inner {
    window: FailureWindow,
    consecutive_successes: usize,
    half_open_requests: usize,
    last_state_change: Instant,
}

/// Circuit breaker for protecting against cascading failures.
///
/// The state is readable without locking; transitions happen under a
/// single mutex together with the failure window.
pub struct CircuitBreaker {
    name: String,
    state: AtomicU8,
    inner: Mutex<Inner>,
    config: CircuitBreakerConfig,
}

impl CircuitBreaker {
    /// Creates a new circuit breaker.
    #[must_use]
    pub fn new(name: impl Into<String>, config: CircuitBreakerConfig) -> Self {
        Self {
            name: name.into(),
            state: AtomicU8::new(CircuitState::Closed as u8),
            inner: Mutex::new(Inner {
                window: FailureWindow::new(config.failure_window),
                consecutive_successes: 0,
                half_open_requests: 0,
                last_state_change: Instant::now(),
            }),
            config,
        }
    }

    /// Creates a new circuit breaker with default configuration.
    #[must_use]
    pub fn with_defaults(name: impl Into<String>) -> Self {
        Self::new(name, CircuitBreakerConfig::default())
    }

    /// Returns the current state of the circuit breaker.
    #[must_use]
    pub fn state(&self) -> CircuitState {
        CircuitState::from(self.state.load(Ordering::Acquire))
    }

    /// Returns the name of the circuit breaker.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub const fn config(&self) -> &CircuitBreakerConfig {
        &self.config
    }

    /// Checks if a request should be allowed.
    ///
    /// An open circuit whose timeout has elapsed moves to half-open and
    /// admits this request as the first probe.
    pub fn allow_request(&self) -> bool {
        let mut inner = self.inner.lock();

        match self.state() {
            CircuitState::Closed => true,
            CircuitState::Open => {
                if inner.last_state_change.elapsed() >= self.config.open_timeout {
                    self.transition(&mut inner, CircuitState::HalfOpen);
                    inner.half_open_requests = 1;
                    true
                } else {
                    false
                }
            }
            CircuitState::HalfOpen => {
                if inner.half_open_requests < self.config.half_open_max_requests {
                    inner.half_open_requests += 1;
                    true
                } else {
                    debug!(breaker = %self.name, "Half-open probe limit reached");
                    false
                }
            }
        }
    }

    /// Records a successful operation.
    pub fn record_success(&self) {
        let mut inner = self.inner.lock();

        if self.state() == CircuitState::HalfOpen {
            inner.consecutive_successes += 1;
            if inner.consecutive_successes >= self.config.success_threshold {
                self.transition(&mut inner, CircuitState::Closed);
            }
        }
    }

    /// Records a failed operation.
    pub fn record_failure(&self) {
        let mut inner = self.inner.lock();
        inner.window.record_failure();

        match self.state() {
            CircuitState::HalfOpen => self.transition(&mut inner, CircuitState::Open),
            CircuitState::Closed => {
                if inner.window.failure_count() >= self.config.failure_threshold {
                    self.transition(&mut inner, CircuitState::Open);
                }
            }
            CircuitState::Open => {}
        }
    }

    /// Manually resets the circuit breaker to closed state.
    pub fn reset(&self) {
        let mut inner = self.inner.lock();
        self.transition(&mut inner, CircuitState::Closed);
        debug!(breaker = %self.name, "Circuit breaker manually reset");
    }

    #[must_use]
    pub fn stats(&self) -> CircuitStats {
        let mut inner = self.inner.lock();
        let state = self.state();
        CircuitStats {
            state,
            failure_count: inner.window.failure_count(),
            consecutive_successes: inner.consecutive_successes,
            half_open_requests: inner.half_open_requests,
            failure_threshold: self.config.failure_threshold,
            is_open: state == CircuitState::Open,
        }
    }

    /// Runs `f` with circuit breaker protection.
    ///
    /// A panic inside `f` is recorded as a failure before it propagates.
    ///
    /// # Errors
    ///
    /// `CIRCUIT_OPEN` if the request is rejected, otherwise the error
    /// returned by `f`.
    pub fn call<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce() -> Result<T>,
    {
        if !self.allow_request() {
            return Err(self.open_error());
        }

        let guard = self.guard();
        let outcome = f();
        if outcome.is_ok() {
            guard.succeed();
        }
        outcome
    }

    /// Like [`call`](Self::call) for operations with their own error type.
    ///
    /// # Errors
    ///
    /// [`CircuitBreakerError::Open`] if the request is rejected,
    /// [`CircuitBreakerError::Failure`] wrapping the error returned by `f`.
    pub fn try_call<T, E, F>(&self, f: F) -> std::result::Result<T, CircuitBreakerError<E>>
    where
        F: FnOnce() -> std::result::Result<T, E>,
    {
        if !self.allow_request() {
            return Err(CircuitBreakerError::Open(self.name.clone()));
        }

        let guard = self.guard();
        match f() {
            Ok(value) => {
                guard.succeed();
                Ok(value)
            }
            Err(e) => Err(CircuitBreakerError::Failure(e)),
        }
    }

    /// Returns a recorder that reports a failure when dropped unless
    /// [`CircuitGuard::succeed`] is called first.
    ///
    /// The guard does not consult [`allow_request`](Self::allow_request).
    #[must_use]
    pub fn guard(&self) -> CircuitGuard<'_> {
        CircuitGuard {
            breaker: self,
            settled: false,
        }
    }

    fn open_error(&self) -> ErrorInfo {
        ErrorInfo::new(common::CIRCUIT_OPEN, format!("circuit breaker '{}' is open", self.name), MODULE)
    }

    fn transition(&self, inner: &mut Inner, to: CircuitState) {
        let from = self.state.swap(to as u8, Ordering::AcqRel);
        inner.consecutive_successes = 0;
        inner.half_open_requests = 0;
        inner.last_state_change = Instant::now();

        match to {
            CircuitState::Open => {
                warn!(breaker = %self.name, from = %CircuitState::from(from), "Circuit breaker opened");
            }
            CircuitState::HalfOpen => {
                debug!(breaker = %self.name, "Circuit breaker transitioning to half-open");
            }
            CircuitState::Closed => {
                inner.window.reset();
                if from != CircuitState::Closed as u8 {
                    info!(breaker = %self.name, "Circuit breaker closed");
                }
            }
        }
    }
}

impl fmt::Debug for CircuitBreaker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CircuitBreaker")
            .field("name", &self.name)
            .field("state", &self.state())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// RAII outcome recorder returned by [`CircuitBreaker::guard`].
#[must_use = "dropping the guard immediately records a failure"]
pub struct CircuitGuard<'a> {
    breaker: &'a CircuitBreaker,
    settled: bool,
}

impl CircuitGuard<'_> {
    /// Records a success and disarms the guard.
    pub fn succeed(mut self) {
        self.settled = true;
        self.breaker.record_success();
    }
}

impl Drop for CircuitGuard<'_> {
    fn drop(&mut self) {
        if !self.settled {
            self.breaker.record_failure();
        }
    }
}

/// Error type for [`CircuitBreaker::try_call`].
#[derive(Debug, Error)]
pub enum CircuitBreakerError<E> {
    /// Circuit is open, request was rejected.
    #[error("circuit breaker '{0}' is open")]
    Open(String),
    /// The underlying operation failed.
    #[error("operation failed: {0}")]
    Failure(#[source] E),
}

impl<E> From<CircuitBreakerError<E>> for ErrorInfo
where
    E: fmt::Display,
{
    fn from(err: CircuitBreakerError<E>) -> Self {
        match err {
            CircuitBreakerError::Open(name) => {
                ErrorInfo::new(common::CIRCUIT_OPEN, format!("circuit breaker '{name}' is open"), MODULE)
            }
            CircuitBreakerError::Failure(e) => ErrorInfo::internal("operation failed", MODULE).with_details(e.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::panic::{self, AssertUnwindSafe};
    use std::sync::Arc;
    use std::thread;

    fn fail() -> Result<i32> {
        Err(ErrorInfo::internal("boom", "test"))
    }

    fn quick(failure_threshold: usize) -> CircuitBreaker {
        CircuitBreaker::new(
            "quick",
            CircuitBreakerConfig {
                failure_threshold,
                open_timeout: Duration::from_millis(20),
                ..Default::default()
            },
        )
    }

    #[test]
    fn test_circuit_breaker_closed() {
        let cb = CircuitBreaker::with_defaults("test");
        assert_eq!(cb.call(|| Ok(42)).unwrap(), 42);
        assert_eq!(cb.state(), CircuitState::Closed);
        assert_eq!(cb.name(), "test");
    }

    #[test]
    fn test_circuit_breaker_opens_on_failures() {
        let cb = quick(2);

        assert!(cb.call(fail).is_err());
        assert_eq!(cb.state(), CircuitState::Closed);

        assert!(cb.call(fail).is_err());
        assert_eq!(cb.state(), CircuitState::Open);

        let err = cb.call(|| Ok(1)).unwrap_err();
        assert_eq!(err.code(), common::CIRCUIT_OPEN);
        assert!(err.message().contains("quick"));
    }

    #[test]
    fn test_failure_error_is_passed_through() {
        let cb = CircuitBreaker::with_defaults("passthrough");
        let err = cb.call(fail).unwrap_err();
        assert_eq!(err.message(), "boom");
        assert_eq!(cb.stats().failure_count, 1);
    }

    #[test]
    fn test_half_open_after_timeout_then_closes() {
        let cb = quick(1);
        cb.record_failure();
        assert_eq!(cb.state(), CircuitState::Open);
        assert!(!cb.allow_request());

        thread::sleep(Duration::from_millis(40));
        assert!(cb.allow_request());
        assert_eq!(cb.state(), CircuitState::HalfOpen);

        cb.record_success();
        assert_eq!(cb.state(), CircuitState::HalfOpen);
        cb.record_success();
        assert_eq!(cb.state(), CircuitState::Closed);
        assert_eq!(cb.stats().failure_count, 0);
    }

    #[test]
    fn test_half_open_failure_reopens() {
        let cb = quick(1);
        cb.record_failure();
        thread::sleep(Duration::from_millis(40));
        assert!(cb.allow_request());

        cb.record_failure();
        assert_eq!(cb.state(), CircuitState::Open);
        assert!(!cb.allow_request());
    }

    #[test]
    fn test_half_open_probe_limit() {
        let cb = quick(1);
        cb.record_failure();
        thread::sleep(Duration::from_millis(40));

        assert!(cb.allow_request());
        assert!(cb.allow_request());
        assert!(cb.allow_request());
        assert!(!cb.allow_request());
        assert_eq!(cb.stats().half_open_requests, 3);
    }

    #[test]
    fn test_failures_outside_window_do_not_trip() {
        let cb = CircuitBreaker::new(
            "windowed",
            CircuitBreakerConfig {
                failure_threshold: 2,
                failure_window: Duration::from_millis(20),
                ..Default::default()
            },
        );
        cb.record_failure();
        thread::sleep(Duration::from_millis(40));
        cb.record_failure();
        assert_eq!(cb.state(), CircuitState::Closed);
    }

    #[test]
    fn test_guard_records_failure_unless_succeeded() {
        let cb = quick(2);
        {
            let _guard = cb.guard();
        }
        assert_eq!(cb.stats().failure_count, 1);

        cb.guard().succeed();
        assert_eq!(cb.stats().failure_count, 1);
        assert_eq!(cb.state(), CircuitState::Closed);
    }

    #[test]
    fn test_panic_in_call_counts_as_failure() {
        let cb = quick(1);
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| cb.call::<i32, _>(|| panic!("exploded"))));
        assert!(outcome.is_err());
        assert_eq!(cb.state(), CircuitState::Open);
    }

    #[test]
    fn test_try_call_wraps_errors() {
        let cb = quick(1);
        match cb.try_call(|| Err::<i32, &str>("bad")) {
            Err(CircuitBreakerError::Failure(e)) => assert_eq!(e, "bad"),
            other => panic!("Expected Failure error, got {other:?}"),
        }
        match cb.try_call(|| Ok::<i32, &str>(1)) {
            Err(CircuitBreakerError::Open(name)) => assert_eq!(name, "quick"),
            other => panic!("Expected Open error, got {other:?}"),
        }
    }

    #[test]
    fn test_error_conversion() {
        let open: ErrorInfo = CircuitBreakerError::<std::io::Error>::Open("db".to_string()).into();
        assert_eq!(open.code(), common::CIRCUIT_OPEN);

        let failed: ErrorInfo = CircuitBreakerError::Failure("disk gone").into();
        assert_eq!(failed.code(), common::INTERNAL_ERROR);
        assert_eq!(failed.details(), Some("disk gone"));
    }

    #[test]
    fn test_reset_closes_circuit() {
        let cb = quick(1);
        cb.record_failure();
        assert!(cb.stats().is_open);
        cb.reset();
        assert_eq!(cb.state(), CircuitState::Closed);
        assert_eq!(cb.stats().failure_count, 0);
    }

    #[test]
    fn test_stats_serialize() {
        let cb = CircuitBreaker::with_defaults("stats");
        let json = serde_json::to_value(cb.stats()).unwrap();
        assert_eq!(json["state"], "closed");
        assert_eq!(json["failure_threshold"], 5);
    }

    #[test]
    fn test_circuit_state_from_u8() {
        assert_eq!(CircuitState::from(0), CircuitState::Closed);
        assert_eq!(CircuitState::from(1), CircuitState::Open);
        assert_eq!(CircuitState::from(2), CircuitState::HalfOpen);
        assert_eq!(CircuitState::from(255), CircuitState::Closed);
        assert_eq!(CircuitState::HalfOpen.to_string(), "HALF_OPEN");
    }

    #[test]
    fn test_concurrent_failures_open_once() {
        let cb = Arc::new(quick(8));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let cb = Arc::clone(&cb);
                thread::spawn(move || cb.record_failure())
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(cb.state(), CircuitState::Open);
    }

    #[test]
    fn test_circuit_breaker_config_default() {
        let config = CircuitBreakerConfig::default();
        assert_eq!(config.failure_threshold, 5);
        assert_eq!(config.success_threshold, 2);
        assert_eq!(config.failure_window, Duration::from_secs(60));
        assert_eq!(config.open_timeout, Duration::from_secs(30));
        assert_eq!(config.half_open_max_requests, 3);
    }
}
