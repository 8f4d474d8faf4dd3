//! The error value carried by every fallible operation in Bedrock.

use serde::Serialize;
use std::io;
use thiserror::Error;

use crate::codes::{self, common, CodeRange};

/// Describes why an operation failed.
///
/// An `ErrorInfo` is immutable once built. Its `code` always lies inside the
/// issuing module's code range or inside the shared `common` range; building
/// one that does not is a contract violation and panics.
#[derive(Error, Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[error("[{module}] {message} (code {code})")]
pub struct ErrorInfo {
    code: i32,
    message: String,
    module: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<String>,
}

impl ErrorInfo {
    /// Creates an error issued by `module`.
    ///
    /// # Panics
    ///
    /// Panics if `code` is neither in `module`'s built-in range nor in the
    /// `common` range. Modules registered at runtime build their errors
    /// through [`ErrorCodeRegistry::error`](crate::ErrorCodeRegistry::error).
    #[track_caller]
    #[must_use]
    pub fn new(code: i32, message: impl Into<String>, module: impl Into<String>) -> Self {
        let module = module.into();
        assert!(
            codes::is_permitted(&module, code),
            "error code {code} is outside the range of module '{module}'"
        );
        Self::from_parts(code, message.into(), module, None)
    }

    /// Creates an error whose code is checked against an explicit range.
    ///
    /// # Panics
    ///
    /// Panics if `code` is outside `range`.
    #[track_caller]
    #[must_use]
    pub fn in_range(range: &CodeRange, code: i32, message: impl Into<String>) -> Self {
        assert!(
            range.contains(code),
            "error code {code} is outside the range of module '{}'",
            range.module()
        );
        Self::from_parts(code, message.into(), range.module().to_string(), None)
    }

    /// Builds an error without any range check. Callers must have validated
    /// the code already.
    pub(crate) fn from_parts(code: i32, message: String, module: String, details: Option<String>) -> Self {
        Self {
            code,
            message,
            module,
            details,
        }
    }

    /// Returns a copy of this error carrying `details`.
    #[must_use]
    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    /// The numeric error code (always negative).
    #[must_use]
    pub const fn code(&self) -> i32 {
        self.code
    }

    /// Human readable message.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Name of the module that issued the error.
    #[must_use]
    pub fn module(&self) -> &str {
        &self.module
    }

    /// Optional free-form details.
    #[must_use]
    pub fn details(&self) -> Option<&str> {
        self.details.as_deref()
    }

    /// Name of the built-in module range the code falls into, if any.
    #[must_use]
    pub fn category(&self) -> Option<&'static str> {
        codes::range_for_code(self.code).map(CodeRange::module)
    }

    /// Returns true if this error carries `code`.
    #[must_use]
    pub const fn is(&self, code: i32) -> bool {
        self.code == code
    }

    // ============ Common constructors ============

    /// Internal error.
    #[must_use]
    pub fn internal(message: impl Into<String>, module: impl Into<String>) -> Self {
        Self::from_parts(common::INTERNAL_ERROR, message.into(), module.into(), None)
    }

    /// Not found error.
    #[must_use]
    pub fn not_found(message: impl Into<String>, module: impl Into<String>) -> Self {
        Self::from_parts(common::NOT_FOUND, message.into(), module.into(), None)
    }

    /// Invalid argument error.
    #[must_use]
    pub fn invalid_argument(message: impl Into<String>, module: impl Into<String>) -> Self {
        Self::from_parts(common::INVALID_ARGUMENT, message.into(), module.into(), None)
    }

    /// Invalid state error.
    #[must_use]
    pub fn invalid_state(message: impl Into<String>, module: impl Into<String>) -> Self {
        Self::from_parts(common::INVALID_STATE, message.into(), module.into(), None)
    }

    /// Timeout error.
    #[must_use]
    pub fn timeout(message: impl Into<String>, module: impl Into<String>) -> Self {
        Self::from_parts(common::TIMEOUT, message.into(), module.into(), None)
    }

    // ============ Conversions at the fault boundary ============

    /// Maps an I/O error onto the common codes by kind.
    #[must_use]
    pub fn from_io(err: &io::Error, module: impl Into<String>) -> Self {
        let code = match err.kind() {
            io::ErrorKind::NotFound => common::NOT_FOUND,
            io::ErrorKind::PermissionDenied => common::PERMISSION_DENIED,
            io::ErrorKind::TimedOut => common::TIMEOUT,
            io::ErrorKind::OutOfMemory => common::OUT_OF_MEMORY,
            io::ErrorKind::InvalidInput | io::ErrorKind::InvalidData => common::INVALID_ARGUMENT,
            _ => common::IO_ERROR,
        };
        Self::from_parts(code, err.to_string(), module.into(), None)
    }

    /// Converts an `anyhow` error.
    ///
    /// An `ErrorInfo` anywhere in the chain is returned as is. An
    /// `io::Error` is mapped by kind. Anything else becomes
    /// `INTERNAL_ERROR` with the full chain rendered into `details`.
    #[must_use]
    pub fn from_anyhow(err: &anyhow::Error, module: impl Into<String>) -> Self {
        if let Some(info) = err.chain().find_map(|cause| cause.downcast_ref::<ErrorInfo>()) {
            return info.clone();
        }
        if let Some(io_err) = err.chain().find_map(|cause| cause.downcast_ref::<io::Error>()) {
            return Self::from_io(io_err, module).with_details(format!("{err:#}"));
        }
        Self::internal(err.to_string(), module).with_details(format!("{err:#}"))
    }
}
