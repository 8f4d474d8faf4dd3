//! Runtime error code registry.
//!
//! The built-in table in [`codes`](crate::codes) covers the ecosystem modules.
//! Applications that ship their own modules register extra ranges here during
//! startup, then [`freeze`](ErrorCodeRegistry::freeze) the registry; every
//! later registration attempt fails.

use parking_lot::RwLock;
use std::borrow::Cow;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, info};

use crate::codes::{self, common, UNKNOWN_ERROR_MESSAGE};
use crate::{ErrorInfo, Result, VoidResult};

const MODULE: &str = "error_registry";

/// A range registered with an [`ErrorCodeRegistry`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegisteredRange {
    pub module: String,
    pub min: i32,
    pub max: i32,
}

impl RegisteredRange {
    /// Returns true if `code` falls inside this range.
    #[must_use]
    pub fn contains(&self, code: i32) -> bool {
        code >= self.min && code <= self.max
    }

    fn overlaps(&self, min: i32, max: i32) -> bool {
        self.min <= max && min <= self.max
    }
}

#[derive(Default)]
struct RegistryTable {
    ranges: Vec<RegisteredRange>,
    messages: HashMap<i32, Cow<'static, str>>,
}

/// Mapping of module names to code ranges and of codes to messages.
///
/// Safe to share between threads. Reads take a shared lock; registration and
/// freezing take the exclusive lock, so a freeze never interleaves with a
/// registration in flight.
pub struct ErrorCodeRegistry {
    table: RwLock<RegistryTable>,
    frozen: AtomicBool,
}

impl Default for ErrorCodeRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ErrorCodeRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            table: RwLock::new(RegistryTable::default()),
            frozen: AtomicBool::new(false),
        }
    }

    /// Creates a registry seeded with the built-in ecosystem ranges.
    #[must_use]
    pub fn with_ecosystem_ranges() -> Self {
        let ranges = codes::ECOSYSTEM_RANGES
            .iter()
            .map(|range| RegisteredRange {
                module: range.module().to_string(),
                min: range.min(),
                max: range.max(),
            })
            .collect();
        let messages = codes::ECOSYSTEM_RANGES
            .iter()
            .flat_map(|range| range.min()..=range.max())
            .filter_map(|code| codes::builtin_message(code).map(|message| (code, Cow::Borrowed(message))))
            .collect();

        Self {
            table: RwLock::new(RegistryTable { ranges, messages }),
            frozen: AtomicBool::new(false),
        }
    }

    /// Registers `[min, max]` for `module`.
    ///
    /// # Errors
    ///
    /// * `REGISTRY_FROZEN` after [`freeze`](Self::freeze).
    /// * `INVALID_ARGUMENT` if `min > max` or the range reaches `0`.
    /// * `ALREADY_EXISTS` if the module is already registered or the range
    ///   overlaps another module's range.
    pub fn register_range(&self, module: &str, min: i32, max: i32) -> VoidResult {
        if min > max {
            return Err(ErrorInfo::invalid_argument(
                format!("invalid range for '{module}': min {min} > max {max}"),
                MODULE,
            ));
        }
        if max >= 0 {
            return Err(ErrorInfo::invalid_argument(
                format!("range for '{module}' must be strictly negative, got [{min}, {max}]"),
                MODULE,
            ));
        }

        let mut table = self.table.write();
        if self.frozen.load(Ordering::Acquire) {
            return Err(frozen_error(module));
        }
        if table.ranges.iter().any(|range| range.module == module) {
            return Err(ErrorInfo::from_parts(
                common::ALREADY_EXISTS,
                format!("module '{module}' already has a registered range"),
                MODULE.to_string(),
                None,
            ));
        }
        if let Some(existing) = table.ranges.iter().find(|range| range.overlaps(min, max)) {
            return Err(ErrorInfo::from_parts(
                common::ALREADY_EXISTS,
                format!("range [{min}, {max}] for '{module}' overlaps '{}'", existing.module),
                MODULE.to_string(),
                Some(format!("[{}, {}]", existing.min, existing.max)),
            ));
        }

        table.ranges.push(RegisteredRange {
            module: module.to_string(),
            min,
            max,
        });
        info!(module = %module, min, max, "Error code range registered");
        Ok(())
    }

    /// Registers a human readable message for `code`.
    ///
    /// # Errors
    ///
    /// * `REGISTRY_FROZEN` after [`freeze`](Self::freeze).
    /// * `NOT_FOUND` if `code` is not inside any registered range.
    pub fn register_message(&self, code: i32, message: impl Into<String>) -> VoidResult {
        let mut table = self.table.write();
        if self.frozen.load(Ordering::Acquire) {
            return Err(frozen_error("message"));
        }
        if !table.ranges.iter().any(|range| range.contains(code)) {
            return Err(ErrorInfo::not_found(
                format!("code {code} is not inside any registered range"),
                MODULE,
            ));
        }
        table.messages.insert(code, Cow::Owned(message.into()));
        Ok(())
    }

    /// Prevents any further registration. Calling it again has no effect.
    pub fn freeze(&self) {
        let _guard = self.table.write();
        if !self.frozen.swap(true, Ordering::AcqRel) {
            debug!("Error code registry frozen");
        }
    }

    /// Returns true once [`freeze`](Self::freeze) has been called.
    #[must_use]
    pub fn is_frozen(&self) -> bool {
        self.frozen.load(Ordering::Acquire)
    }

    /// Returns the message for `code`.
    ///
    /// Total: `0` maps to `"Success"`, unmapped codes to
    /// [`UNKNOWN_ERROR_MESSAGE`].
    #[must_use]
    pub fn message_for(&self, code: i32) -> String {
        if code == common::SUCCESS {
            return codes::SUCCESS_MESSAGE.to_string();
        }
        self.table
            .read()
            .messages
            .get(&code)
            .map_or_else(|| UNKNOWN_ERROR_MESSAGE.to_string(), ToString::to_string)
    }

    /// Returns true if `code` lies in the range registered for `module`.
    #[must_use]
    pub fn validate(&self, module: &str, code: i32) -> bool {
        self.table
            .read()
            .ranges
            .iter()
            .any(|range| range.module == module && range.contains(code))
    }

    /// Returns the module owning `code`, if any.
    #[must_use]
    pub fn module_for(&self, code: i32) -> Option<String> {
        self.table
            .read()
            .ranges
            .iter()
            .find(|range| range.contains(code))
            .map(|range| range.module.clone())
    }

    /// Returns a copy of every registered range, in registration order.
    #[must_use]
    pub fn ranges(&self) -> Vec<RegisteredRange> {
        self.table.read().ranges.clone()
    }

    /// Builds an error for `module`, checked against this registry.
    ///
    /// Codes in the `common` range are accepted for any module.
    ///
    /// # Panics
    ///
    /// Panics if `code` lies neither in `module`'s range nor in `common`.
    #[track_caller]
    #[must_use]
    pub fn error(&self, code: i32, message: impl Into<String>, module: &str) -> ErrorInfo {
        assert!(
            self.validate(module, code) || codes::COMMON.contains(code),
            "error code {code} is outside the range of module '{module}'"
        );
        ErrorInfo::from_parts(code, message.into(), module.to_string(), None)
    }

    /// Like [`error`](Self::error), wrapped in `Err`.
    ///
    /// # Panics
    ///
    /// Panics under the same conditions as [`error`](Self::error).
    #[track_caller]
    pub fn make_error<T>(&self, code: i32, message: impl Into<String>, module: &str) -> Result<T> {
        Err(self.error(code, message, module))
    }
}

fn frozen_error(what: &str) -> ErrorInfo {
    ErrorInfo::from_parts(
        common::REGISTRY_FROZEN,
        format!("cannot register '{what}': registry is frozen"),
        MODULE.to_string(),
        None,
    )
}
