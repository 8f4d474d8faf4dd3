//! Bootstrap options.

use bedrock_core::telemetry::TelemetryConfig;
use bedrock_core::{ErrorInfo, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Default budget for running shutdown hooks.
pub const DEFAULT_SHUTDOWN_TIMEOUT_MS: u64 = 30_000;

/// Optional subsystem a module can depend on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Capability {
    Logging,
    Monitoring,
    Database,
    Network,
}

impl Capability {
    pub const ALL: [Capability; 4] = [
        Capability::Logging,
        Capability::Monitoring,
        Capability::Database,
        Capability::Network,
    ];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Logging => "logging",
            Self::Monitoring => "monitoring",
            Self::Database => "database",
            Self::Network => "network",
        }
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Capability {
    type Err = ErrorInfo;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|capability| capability.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| ErrorInfo::invalid_argument(format!("unknown capability '{s}'"), "config"))
    }
}

/// Options consumed by the bootstrapper.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BootstrapOptions {
    /// Deployment environment name (development, staging, production).
    pub environment: String,

    pub enable_logging: bool,
    pub enable_monitoring: bool,
    pub enable_database: bool,
    pub enable_network: bool,

    /// Total budget for shutdown hooks, in milliseconds.
    pub shutdown_timeout_ms: u64,

    /// Logging setup.
    pub telemetry: TelemetryConfig,
}

impl Default for BootstrapOptions {
    fn default() -> Self {
        Self {
            environment: "development".to_string(),
            enable_logging: true,
            enable_monitoring: true,
            enable_database: false,
            enable_network: false,
            shutdown_timeout_ms: DEFAULT_SHUTDOWN_TIMEOUT_MS,
            telemetry: TelemetryConfig::default(),
        }
    }
}

impl BootstrapOptions {
    /// Whether `capability` is switched on.
    #[must_use]
    pub const fn is_enabled(&self, capability: Capability) -> bool {
        match capability {
            Capability::Logging => self.enable_logging,
            Capability::Monitoring => self.enable_monitoring,
            Capability::Database => self.enable_database,
            Capability::Network => self.enable_network,
        }
    }

    /// Switches `capability` on or off.
    #[must_use]
    pub fn with_capability(mut self, capability: Capability, enabled: bool) -> Self {
        let flag = match capability {
            Capability::Logging => &mut self.enable_logging,
            Capability::Monitoring => &mut self.enable_monitoring,
            Capability::Database => &mut self.enable_database,
            Capability::Network => &mut self.enable_network,
        };
        *flag = enabled;
        self
    }

    #[must_use]
    pub fn with_shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
        self
    }

    #[must_use]
    pub const fn shutdown_timeout(&self) -> Duration {
        Duration::from_millis(self.shutdown_timeout_ms)
    }

    /// Capabilities that are switched on.
    #[must_use]
    pub fn enabled_capabilities(&self) -> Vec<Capability> {
        Capability::ALL
            .into_iter()
            .filter(|capability| self.is_enabled(*capability))
            .collect()
    }

    /// Renders the options as TOML, e.g. to dump the effective configuration.
    ///
    /// # Errors
    ///
    /// `SERIALIZATION_FAILED` if the options cannot be rendered.
    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| {
            ErrorInfo::new(
                bedrock_core::codes::storage::SERIALIZATION_FAILED,
                "failed to render bootstrap options",
                "storage",
            )
            .with_details(e.to_string())
        })
    }
}
