//! Configuration System
//!
//! Process-level settings for hosts embedding runners: logging plus the
//! defaults applied to every [`MutationConfig`](crate::runner::MutationConfig)
//! built through [`RunnerDefaults::apply`]. Sources are layered with the
//! `config` crate: built-in defaults, then an optional TOML file, then
//! `MUTATION_RUNNER__*` environment variables.

use crate::error::RunnerError;
use crate::logging::LoggingConfig;
use crate::runner::MutationConfig;
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::debug;

pub const ENV_PREFIX: &str = "MUTATION_RUNNER";

/// Root configuration structure
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunnerSettings {
    #[serde(default)]
    pub runner: RunnerDefaults,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Defaults stamped onto new mutation configs.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunnerDefaults {
    #[serde(default)]
    pub ignore_results: bool,

    #[serde(default)]
    pub await_refetch_queries: bool,
}

impl RunnerDefaults {
    /// Overwrite `ignore_results` and `await_refetch_queries` on `config` with
    /// these values, replacing whatever the caller set. Apply before any
    /// per-runner adjustments.
    pub fn apply(&self, mut config: MutationConfig) -> MutationConfig {
        config.ignore_results = self.ignore_results;
        config.await_refetch_queries = self.await_refetch_queries;
        config
    }
}

/// Configuration validation errors
#[derive(Debug, Clone)]
pub enum ValidationError {
    Logging(String),
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ValidationError::Logging(msg) => write!(f, "Logging: {}", msg),
        }
    }
}

impl std::error::Error for ValidationError {}

impl RunnerSettings {
    /// Validate the entire configuration
    pub fn validate(&self) -> Result<(), Vec<ValidationError>> {
        let mut errors = Vec::new();

        if let Err(e) = self.logging.validate() {
            errors.push(ValidationError::Logging(e));
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

pub struct SettingsLoader;

impl SettingsLoader {
    /// Load from defaults and the environment only.
    pub fn load() -> Result<RunnerSettings, RunnerError> {
        Self::build(None)
    }

    /// Load with a TOML file layered between defaults and the environment.
    pub fn load_from_file(path: &Path) -> Result<RunnerSettings, RunnerError> {
        if !path.exists() {
            return Err(RunnerError::ConfigError(format!(
                "Config file not found: {}",
                path.display()
            )));
        }
        Self::build(Some(path))
    }

    fn build(path: Option<&Path>) -> Result<RunnerSettings, RunnerError> {
        let mut builder = Config::builder();
        if let Some(path) = path {
            debug!(config_path = %path.display(), "Loading runner settings");
            builder = builder.add_source(File::from(path).required(true));
        }
        builder = builder.add_source(
            Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("__")
                .separator("__"),
        );

        let settings: RunnerSettings = builder.build()?.try_deserialize()?;
        settings.validate().map_err(|errors| {
            let error_msgs: Vec<String> = errors.iter().map(|e| e.to_string()).collect();
            RunnerError::ConfigError(format!(
                "Configuration validation failed:\n{}",
                error_msgs.join("\n")
            ))
        })?;
        Ok(settings)
    }
}
