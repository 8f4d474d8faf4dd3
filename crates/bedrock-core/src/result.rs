//! Result type aliases and helpers.
//!
//! `Result<T>` is the standard library result with [`ErrorInfo`] as the error
//! type, so `map`, `and_then`, `or_else`, `unwrap_or`, `is_ok` and `?` all
//! come for free. [`ResultExt`] adds the accessors that treat misuse as a
//! contract violation, plus a few helpers for logging and re-wrapping.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};

use crate::codes::common;
use crate::ErrorInfo;

/// A specialized `Result` type for Bedrock operations.
pub type Result<T, E = ErrorInfo> = std::result::Result<T, E>;

/// Result of an operation that produces no value.
pub type VoidResult = Result<()>;

/// Details attached to errors produced from a caught panic.
pub const PANIC_DETAILS: &str = "panic";

/// Wraps `value` in `Ok`.
#[inline]
pub fn ok<T>(value: T) -> Result<T> {
    Ok(value)
}

/// Builds an `Err` issued by `module`.
///
/// # Panics
///
/// Panics if `code` is outside `module`'s range and outside `common`.
#[track_caller]
pub fn make_error<T>(code: i32, message: impl Into<String>, module: impl Into<String>) -> Result<T> {
    Err(ErrorInfo::new(code, message, module))
}

/// Builds an `Err` with details attached.
///
/// # Panics
///
/// Panics if `code` is outside `module`'s range and outside `common`.
#[track_caller]
pub fn make_error_with_details<T>(
    code: i32,
    message: impl Into<String>,
    module: impl Into<String>,
    details: impl Into<String>,
) -> Result<T> {
    Err(ErrorInfo::new(code, message, module).with_details(details))
}

/// Extra accessors for [`Result`].
pub trait ResultExt<T> {
    /// Borrows the success value.
    ///
    /// # Panics
    ///
    /// Panics if the result is an error.
    fn value(&self) -> &T;

    /// Takes the success value.
    ///
    /// # Panics
    ///
    /// Panics if the result is an error.
    fn into_value(self) -> T;

    /// Borrows the error.
    ///
    /// # Panics
    ///
    /// Panics if the result is a success.
    fn error(&self) -> &ErrorInfo;

    /// Takes the error.
    ///
    /// # Panics
    ///
    /// Panics if the result is a success.
    fn into_error(self) -> ErrorInfo;

    /// Returns the payload on success, a clone of `default` otherwise.
    fn unwrap_or_cloned(self, default: &T) -> T
    where
        T: Clone;

    /// Replaces an error with a new one from `module`, keeping the old error
    /// in the details.
    fn wrap_err(self, code: i32, message: impl Into<String>, module: impl Into<String>) -> Result<T>;

    /// Logs an error at `error` level and returns the result unchanged.
    fn log_err(self, context: &str) -> Result<T>;
}

impl<T> ResultExt<T> for Result<T> {
    #[track_caller]
    fn value(&self) -> &T {
        match self {
            Ok(value) => value,
            Err(err) => panic!("value() called on an error result: {err}"),
        }
    }

    #[track_caller]
    fn into_value(self) -> T {
        match self {
            Ok(value) => value,
            Err(err) => panic!("into_value() called on an error result: {err}"),
        }
    }

    #[track_caller]
    fn error(&self) -> &ErrorInfo {
        match self {
            Ok(_) => panic!("error() called on a success result"),
            Err(err) => err,
        }
    }

    #[track_caller]
    fn into_error(self) -> ErrorInfo {
        match self {
            Ok(_) => panic!("into_error() called on a success result"),
            Err(err) => err,
        }
    }

    fn unwrap_or_cloned(self, default: &T) -> T
    where
        T: Clone,
    {
        match self {
            Ok(value) => value,
            Err(_) => default.clone(),
        }
    }

    #[track_caller]
    fn wrap_err(self, code: i32, message: impl Into<String>, module: impl Into<String>) -> Result<T> {
        self.map_err(|inner| ErrorInfo::new(code, message, module).with_details(inner.to_string()))
    }

    fn log_err(self, context: &str) -> Result<T> {
        if let Err(err) = &self {
            tracing::error!(
                code = err.code(),
                module = %err.module(),
                details = ?err.details(),
                "{}: {}",
                context,
                err.message()
            );
        }
        self
    }
}

/// Extracts a readable message from a panic payload.
#[must_use]
pub fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else if let Some(err) = payload.downcast_ref::<ErrorInfo>() {
        err.to_string()
    } else {
        "unknown panic".to_string()
    }
}

/// Converts a panic payload into an `INTERNAL_ERROR` issued by `module`.
#[must_use]
pub fn panic_to_error(payload: &(dyn Any + Send), module: impl Into<String>) -> ErrorInfo {
    ErrorInfo::from_parts(
        common::INTERNAL_ERROR,
        panic_message(payload),
        module.into(),
        Some(PANIC_DETAILS.to_string()),
    )
}

/// Runs `f`, turning a panic into an `INTERNAL_ERROR` result.
///
/// This is the single point where foreign faults cross into the result
/// world; use it around third-party code that may panic.
pub fn try_catch<T, F>(f: F, module: &str) -> Result<T>
where
    F: FnOnce() -> T,
{
    panic::catch_unwind(AssertUnwindSafe(f)).map_err(|payload| panic_to_error(payload.as_ref(), module))
}

/// Runs a fallible closure, converting both panics and returned errors.
///
/// Returned errors go through [`ErrorInfo::from_anyhow`].
pub fn try_catch_fallible<T, F>(f: F, module: &str) -> Result<T>
where
    F: FnOnce() -> anyhow::Result<T>,
{
    try_catch(f, module)?.map_err(|err| ErrorInfo::from_anyhow(&err, module))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codes::thread;

    fn parse(input: &str) -> Result<i32> {
        input
            .parse::<i32>()
            .map_err(|e| ErrorInfo::invalid_argument(e.to_string(), "app"))
    }

    #[test]
    fn test_ok_and_make_error() {
        let success = ok(42);
        assert!(success.is_ok());
        assert_eq!(*success.value(), 42);

        let failure: Result<i32> = make_error(thread::POOL_FULL, "full", "thread");
        assert!(failure.is_err());
        assert_eq!(failure.error().code(), thread::POOL_FULL);
    }

    #[test]
    fn test_make_error_with_details() {
        let failure: VoidResult = make_error_with_details(common::TIMEOUT, "slow", "network", "after 5s");
        assert_eq!(failure.error().details(), Some("after 5s"));
    }

    #[test]
    #[should_panic(expected = "outside the range")]
    fn test_make_error_out_of_range_panics() {
        let _: VoidResult = make_error(-250, "logger code from thread", "thread");
    }

    #[test]
    #[should_panic(expected = "value() called on an error result")]
    fn test_value_on_error_panics() {
        let failure: Result<i32> = make_error(common::NOT_FOUND, "missing", "app");
        let _ = failure.value();
    }

    #[test]
    #[should_panic(expected = "error() called on a success result")]
    fn test_error_on_success_panics() {
        let _ = ok(1).error();
    }

    #[test]
    fn test_into_value_and_into_error() {
        assert_eq!(ok(String::from("moved")).into_value(), "moved");
        let failure: Result<()> = make_error(common::CANCELLED, "stop", "app");
        assert_eq!(failure.into_error().code(), common::CANCELLED);
    }

    #[test]
    fn test_unwrap_or_variants() {
        let failure: Result<String> = make_error(common::NOT_FOUND, "missing", "app");
        let default = String::from("fallback");
        assert_eq!(failure.clone().unwrap_or_cloned(&default), "fallback");
        assert_eq!(default, "fallback");
        assert_eq!(failure.unwrap_or(default), "fallback");
        assert_eq!(ok(String::from("value")).unwrap_or_cloned(&String::new()), "value");
    }

    #[test]
    fn test_combinators_short_circuit() {
        let doubled = parse("21").map(|v| v * 2);
        assert_eq!(doubled, Ok(42));

        let mut called = false;
        let chained = parse("nope").and_then(|v| {
            called = true;
            ok(v + 1)
        });
        assert!(!called);
        assert_eq!(chained.error().code(), common::INVALID_ARGUMENT);

        let recovered = parse("nope").or_else(|_| ok(0));
        assert_eq!(recovered, Ok(0));
    }

    #[test]
    fn test_wrap_err_keeps_inner_error() {
        let wrapped = parse("x").wrap_err(thread::JOB_REJECTED, "job input invalid", "thread");
        let err = wrapped.error();
        assert_eq!(err.code(), thread::JOB_REJECTED);
        assert!(err.details().unwrap().contains("[app]"));
    }

    #[test]
    fn test_log_err_returns_input() {
        let failure = parse("x").log_err("parsing input");
        assert!(failure.is_err());
        assert_eq!(parse("5").log_err("parsing input"), Ok(5));
    }

    #[test]
    fn test_try_catch_converts_panic() {
        let result: Result<i32> = try_catch(|| panic!("kaboom"), "worker");
        let err = result.error();
        assert_eq!(err.code(), common::INTERNAL_ERROR);
        assert_eq!(err.message(), "kaboom");
        assert_eq!(err.module(), "worker");
        assert_eq!(err.details(), Some(PANIC_DETAILS));

        assert_eq!(try_catch(|| 7, "worker"), Ok(7));
    }

    #[test]
    fn test_try_catch_formatted_panic_message() {
        let id = 3;
        let result: Result<()> = try_catch(|| panic!("worker {id} died"), "thread");
        assert_eq!(result.error().message(), "worker 3 died");
    }

    #[test]
    fn test_try_catch_fallible_maps_io_errors() {
        let result: Result<()> = try_catch_fallible(
            || Err(std::io::Error::new(std::io::ErrorKind::NotFound, "config.toml").into()),
            "config",
        );
        assert_eq!(result.error().code(), common::NOT_FOUND);

        let value = try_catch_fallible(|| Ok::<_, anyhow::Error>(5), "config");
        assert_eq!(value, Ok(5));
    }
}
