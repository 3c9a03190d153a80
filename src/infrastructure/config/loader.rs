use anyhow::{Context, Result};
use figment::Figment;
use figment::providers::{Env, Format, Serialized, Yaml};
use thiserror::Error;

use crate::domain::models::config::Config;

/// Configuration error types
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid log level: {0}. Must be one of: trace, debug, info, warn, error")]
    InvalidLogLevel(String),

    #[error("Invalid log format: {0}. Must be one of: json, pretty")]
    InvalidLogFormat(String),

    #[error("Invalid audit max_entries: {0}. Must be at least 1")]
    InvalidAuditCapacity(usize),

    #[error("Invalid scheduler tick_interval_ms: {0}. Must be positive")]
    InvalidTickInterval(u64),

    #[error("Invalid scheduler max_jobs: {0}. Must be at least 1")]
    InvalidMaxJobs(usize),

    #[error("Invalid workflow definition: {0}")]
    InvalidWorkflow(String),
}

/// Configuration loader with hierarchical merging
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration with hierarchical merging
    ///
    /// Precedence (lowest to highest):
    /// 1. Programmatic defaults (Serialized)
    /// 2. .folio/config.yaml (project config)
    /// 3. .folio/local.yaml (project local overrides, optional)
    /// 4. Environment variables (FOLIO_* prefix, `__` separates nesting)
    pub fn load() -> Result<Config> {
        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file(".folio/config.yaml"))
            .merge(Yaml::file(".folio/local.yaml"))
            .merge(Env::prefixed("FOLIO_").split("__"))
            .extract()
            .context("Failed to extract configuration from figment")?;

        Self::validate(&config)?;
        Ok(config)
    }

    /// Load configuration from a specific file
    pub fn load_from_file(path: impl AsRef<std::path::Path>) -> Result<Config> {
        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file(path.as_ref()))
            .extract()
            .context(format!(
                "Failed to load config from {}",
                path.as_ref().display()
            ))?;

        Self::validate(&config)?;
        Ok(config)
    }

    /// Validate configuration after loading
    pub fn validate(config: &Config) -> Result<(), ConfigError> {
        let valid_log_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_log_levels.contains(&config.logging.level.as_str()) {
            return Err(ConfigError::InvalidLogLevel(config.logging.level.clone()));
        }

        let valid_log_formats = ["json", "pretty"];
        if !valid_log_formats.contains(&config.logging.format.as_str()) {
            return Err(ConfigError::InvalidLogFormat(config.logging.format.clone()));
        }

        if config.audit.max_entries == 0 {
            return Err(ConfigError::InvalidAuditCapacity(config.audit.max_entries));
        }

        if config.scheduler.tick_interval_ms == 0 {
            return Err(ConfigError::InvalidTickInterval(
                config.scheduler.tick_interval_ms,
            ));
        }

        if config.scheduler.max_jobs == 0 {
            return Err(ConfigError::InvalidMaxJobs(config.scheduler.max_jobs));
        }

        for definition in &config.workflows {
            definition
                .normalized()
                .validate()
                .map_err(ConfigError::InvalidWorkflow)?;
        }

        Ok(())
    }
}
