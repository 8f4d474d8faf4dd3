//! Configuration loader with layered sources.

use bedrock_core::{ErrorInfo, Result, VoidResult};
use config::{Config, ConfigError, Environment, File};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

use crate::validation::{format_validation_errors, ConfigValidator};
use crate::BootstrapOptions;

/// Prefix of environment variable overrides.
pub const ENV_PREFIX: &str = "BEDROCK";

/// Variable selecting the environment-specific file.
pub const ENVIRONMENT_VAR: &str = "BEDROCK_ENVIRONMENT";

const MODULE: &str = "config";

/// Loads [`BootstrapOptions`] and keeps the current copy for reloads.
#[derive(Clone)]
pub struct ConfigLoader {
    options: Arc<RwLock<BootstrapOptions>>,
    config_dir: PathBuf,
    env_override: Option<HashMap<String, String>>,
}

impl ConfigLoader {
    /// Creates a new configuration loader.
    ///
    /// Configuration is loaded from multiple sources in order:
    /// 1. `{config_dir}/default.toml` - Default values
    /// 2. `{config_dir}/{environment}.toml` - Environment-specific overrides,
    ///    where the environment comes from `BEDROCK_ENVIRONMENT`
    ///    (default `development`)
    /// 3. `{config_dir}/local.toml` - Local overrides
    /// 4. Environment variables with the `BEDROCK_` prefix, nested keys
    ///    separated by `__` (`BEDROCK_TELEMETRY__JSON_FORMAT=true`)
    ///
    /// Missing files are skipped. A `.env` file in the working directory is
    /// loaded first when present.
    ///
    /// # Errors
    ///
    /// `INVALID_ARGUMENT` if a source cannot be parsed or the result fails
    /// validation.
    pub fn new(config_dir: impl Into<PathBuf>) -> Result<Self> {
        Self::build(config_dir.into(), None)
    }

    /// Loads from `./config`.
    ///
    /// # Errors
    ///
    /// Same as [`new`](Self::new).
    pub fn from_default_location() -> Result<Self> {
        Self::new("./config")
    }

    /// Like [`new`](Self::new), reading overrides from `vars` instead of the
    /// process environment.
    ///
    /// # Errors
    ///
    /// Same as [`new`](Self::new).
    pub fn with_environment(config_dir: impl Into<PathBuf>, vars: HashMap<String, String>) -> Result<Self> {
        Self::build(config_dir.into(), Some(vars))
    }

    fn build(config_dir: PathBuf, env_override: Option<HashMap<String, String>>) -> Result<Self> {
        let options = load_options(&config_dir, env_override.as_ref())?;
        Ok(Self {
            options: Arc::new(RwLock::new(options)),
            config_dir,
            env_override,
        })
    }

    /// Returns the current options.
    #[must_use]
    pub fn get(&self) -> BootstrapOptions {
        self.options.read().clone()
    }

    /// Reloads the options from disk. The current options are kept if the
    /// new ones fail to load.
    ///
    /// # Errors
    ///
    /// Same as [`new`](Self::new).
    pub fn reload(&self) -> VoidResult {
        let fresh = load_options(&self.config_dir, self.env_override.as_ref())?;
        *self.options.write() = fresh;
        info!(dir = %self.config_dir.display(), "Configuration reloaded successfully");
        Ok(())
    }

    /// Gets a specific value by dotted key path, e.g. `telemetry.json_format`.
    #[must_use]
    pub fn get_value<T: serde::de::DeserializeOwned>(&self, key: &str) -> Option<T> {
        let json = serde_json::to_value(&*self.options.read()).ok()?;

        let mut current = &json;
        for part in key.split('.') {
            current = current.get(part)?;
        }

        serde_json::from_value(current.clone()).ok()
    }
}

fn load_options(config_dir: &Path, env_override: Option<&HashMap<String, String>>) -> Result<BootstrapOptions> {
    let environment = match env_override {
        Some(vars) => vars.get(ENVIRONMENT_VAR).cloned(),
        None => {
            if let Err(e) = dotenvy::dotenv() {
                debug!(error = %e, "No .env file loaded");
            }
            std::env::var(ENVIRONMENT_VAR).ok()
        }
    }
    .unwrap_or_else(|| "development".to_string());

    info!(environment = %environment, dir = %config_dir.display(), "Loading configuration");

    let mut builder = Config::builder().set_default("environment", environment.as_str()).map_err(config_error)?;

    for name in ["default", environment.as_str(), "local"] {
        let path = config_dir.join(format!("{name}.toml"));
        if path.exists() {
            debug!(path = %path.display(), "Loading config file");
            builder = builder.add_source(File::from(path).required(false));
        }
    }

    let mut env_source = Environment::with_prefix(ENV_PREFIX)
        .prefix_separator("_")
        .separator("__")
        .try_parsing(true);
    if let Some(vars) = env_override {
        env_source = env_source.source(Some(vars.clone().into_iter().collect()));
    }
    builder = builder.add_source(env_source);

    let options: BootstrapOptions = builder
        .build()
        .and_then(|config| config.try_deserialize())
        .map_err(config_error)?;

    ConfigValidator::validate(&options).map_err(|errors| {
        ErrorInfo::invalid_argument("invalid bootstrap configuration", MODULE)
            .with_details(format_validation_errors(&errors))
    })?;

    Ok(options)
}

fn config_error(err: ConfigError) -> ErrorInfo {
    ErrorInfo::invalid_argument("failed to load configuration", MODULE).with_details(err.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use bedrock_core::codes::common;
    use std::fs;
    use tempfile::TempDir;

    fn vars(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs.iter().map(|(k, v)| ((*k).to_string(), (*v).to_string())).collect()
    }

    fn write(dir: &TempDir, name: &str, contents: &str) {
        fs::write(dir.path().join(name), contents).unwrap();
    }

    #[test]
    fn test_empty_directory_yields_defaults() {
        let dir = TempDir::new().unwrap();
        let loader = ConfigLoader::with_environment(dir.path(), HashMap::new()).unwrap();
        assert_eq!(loader.get(), BootstrapOptions::default());
    }

    #[test]
    fn test_layers_override_in_order() {
        let dir = TempDir::new().unwrap();
        write(&dir, "default.toml", "enable_database = true\nshutdown_timeout_ms = 10000\n");
        write(&dir, "staging.toml", "shutdown_timeout_ms = 5000\nenable_network = true\n");
        write(&dir, "local.toml", "enable_network = false\n");

        let loader = ConfigLoader::with_environment(
            dir.path(),
            vars(&[(ENVIRONMENT_VAR, "staging"), ("BEDROCK_TELEMETRY__JSON_FORMAT", "true")]),
        )
        .unwrap();
        let options = loader.get();

        assert_eq!(options.environment, "staging");
        assert!(options.enable_database);
        assert_eq!(options.shutdown_timeout_ms, 5000);
        assert!(!options.enable_network);
        assert!(options.telemetry.json_format);
    }

    #[test]
    fn test_environment_variables_win() {
        let dir = TempDir::new().unwrap();
        write(&dir, "default.toml", "shutdown_timeout_ms = 10000\n");

        let loader =
            ConfigLoader::with_environment(dir.path(), vars(&[("BEDROCK_SHUTDOWN_TIMEOUT_MS", "2500")])).unwrap();
        assert_eq!(loader.get().shutdown_timeout_ms, 2500);
        assert_eq!(loader.get_value::<u64>("shutdown_timeout_ms"), Some(2500));
        assert_eq!(loader.get_value::<String>("telemetry.service_name"), Some("bedrock".to_string()));
        assert_eq!(loader.get_value::<String>("telemetry.missing"), None);
    }

    #[test]
    fn test_invalid_values_rejected() {
        let dir = TempDir::new().unwrap();
        write(&dir, "default.toml", "shutdown_timeout_ms = 0\n");

        let err = ConfigLoader::with_environment(dir.path(), HashMap::new()).err().unwrap();
        assert_eq!(err.code(), common::INVALID_ARGUMENT);
        assert!(err.details().unwrap().contains("greater than zero"));
    }

    #[test]
    fn test_malformed_file_rejected() {
        let dir = TempDir::new().unwrap();
        write(&dir, "default.toml", "enable_logging = [not toml");

        let err = ConfigLoader::with_environment(dir.path(), HashMap::new()).err().unwrap();
        assert_eq!(err.code(), common::INVALID_ARGUMENT);
        assert_eq!(err.module(), "config");
    }

    #[test]
    fn test_reload_picks_up_changes_and_keeps_old_on_failure() {
        let dir = TempDir::new().unwrap();
        write(&dir, "default.toml", "enable_monitoring = true\n");
        let loader = ConfigLoader::with_environment(dir.path(), HashMap::new()).unwrap();

        write(&dir, "default.toml", "enable_monitoring = false\n");
        loader.reload().unwrap();
        assert!(!loader.get().enable_monitoring);

        write(&dir, "default.toml", "shutdown_timeout_ms = 0\n");
        assert!(loader.reload().is_err());
        assert!(!loader.get().enable_monitoring);
        assert_eq!(loader.get().shutdown_timeout_ms, 30_000);
    }
}
