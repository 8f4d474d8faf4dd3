//! Validation of loaded bootstrap options.

use thiserror::Error;
use tracing::warn;

use crate::BootstrapOptions;

/// Longest accepted shutdown budget (one hour).
pub const MAX_SHUTDOWN_TIMEOUT_MS: u64 = 3_600_000;

/// A single problem found in the options.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigValidationError {
    #[error("shutdown_timeout_ms must be greater than zero")]
    ZeroShutdownTimeout,

    #[error("shutdown_timeout_ms {value} exceeds the maximum of {max}")]
    ShutdownTimeoutTooLarge { value: u64, max: u64 },

    #[error("telemetry.service_name must not be empty")]
    EmptyServiceName,

    #[error("telemetry.default_filter must not be empty")]
    EmptyLogFilter,

    #[error("environment must not be empty")]
    EmptyEnvironment,
}

/// Checks [`BootstrapOptions`] and collects every problem found.
pub struct ConfigValidator;

impl ConfigValidator {
    /// Validates `options`.
    ///
    /// # Errors
    ///
    /// Every rule the options break, in a fixed order.
    pub fn validate(options: &BootstrapOptions) -> Result<(), Vec<ConfigValidationError>> {
        let mut errors = Vec::new();

        if options.environment.trim().is_empty() {
            errors.push(ConfigValidationError::EmptyEnvironment);
        }

        if options.shutdown_timeout_ms == 0 {
            errors.push(ConfigValidationError::ZeroShutdownTimeout);
        } else if options.shutdown_timeout_ms > MAX_SHUTDOWN_TIMEOUT_MS {
            errors.push(ConfigValidationError::ShutdownTimeoutTooLarge {
                value: options.shutdown_timeout_ms,
                max: MAX_SHUTDOWN_TIMEOUT_MS,
            });
        }

        if options.telemetry.service_name.trim().is_empty() {
            errors.push(ConfigValidationError::EmptyServiceName);
        }
        if options.telemetry.default_filter.trim().is_empty() {
            errors.push(ConfigValidationError::EmptyLogFilter);
        }

        if options.environment == "production" && !options.enable_logging {
            warn!("Logging is disabled in production");
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

/// Joins validation errors into one message.
#[must_use]
pub fn format_validation_errors(errors: &[ConfigValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}
