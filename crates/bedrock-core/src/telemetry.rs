//! Telemetry module for structured logging.
//!
//! Every Bedrock crate logs through `tracing`. This module installs a global
//! subscriber with an `EnvFilter` (taken from `RUST_LOG` when set) and a
//! plain or JSON fmt layer.

#[cfg(feature = "telemetry")]
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::VoidResult;
use serde::{Deserialize, Serialize};

/// Telemetry configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TelemetryConfig {
    /// Service name attached to the startup record.
    #[serde(default = "default_service_name")]
    pub service_name: String,

    /// Filter directives used when `RUST_LOG` is not set.
    #[serde(default = "default_filter")]
    pub default_filter: String,

    /// Emit JSON lines instead of human readable output.
    #[serde(default)]
    pub json_format: bool,

    /// Whether to enable console output.
    #[serde(default = "default_console_output")]
    pub console_output: bool,
}

fn default_service_name() -> String {
    "bedrock".to_string()
}

fn default_filter() -> String {
    "info,bedrock=debug".to_string()
}

fn default_console_output() -> bool {
    true
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            service_name: default_service_name(),
            default_filter: default_filter(),
            json_format: false,
            console_output: default_console_output(),
        }
    }
}

/// Initialize the global `tracing` subscriber.
///
/// A subscriber that is already installed (by an earlier call, or by the
/// host application) is left in place.
#[cfg(feature = "telemetry")]
pub fn init_telemetry(config: &TelemetryConfig) -> VoidResult {
    if !config.console_output {
        return Ok(());
    }

    let filter = EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(&config.default_filter));
    let filter = filter.map_err(|e| {
        crate::ErrorInfo::invalid_argument(format!("invalid log filter '{}'", config.default_filter), "telemetry")
            .with_details(e.to_string())
    })?;

    let installed = if config.json_format {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json().with_target(true))
            .try_init()
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().with_target(true))
            .try_init()
    };

    match installed {
        Ok(()) => tracing::info!(
            service_name = %config.service_name,
            json = config.json_format,
            "Telemetry initialized"
        ),
        Err(e) => tracing::debug!(error = %e, "Global subscriber already installed"),
    }

    Ok(())
}

/// Placeholder for when telemetry feature is disabled.
#[cfg(not(feature = "telemetry"))]
pub fn init_telemetry(_config: &TelemetryConfig) -> VoidResult {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = TelemetryConfig::default();
        assert_eq!(config.service_name, "bedrock");
        assert_eq!(config.default_filter, "info,bedrock=debug");
        assert!(!config.json_format);
        assert!(config.console_output);
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let config: TelemetryConfig = serde_json::from_str(r#"{"json_format": true}"#).unwrap();
        assert!(config.json_format);
        assert_eq!(config.service_name, "bedrock");
    }

    #[test]
    fn test_init_is_repeatable() {
        let config = TelemetryConfig::default();
        assert!(init_telemetry(&config).is_ok());
        assert!(init_telemetry(&config).is_ok());
    }
}
