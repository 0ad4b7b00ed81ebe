//! Runtime configuration.
//!
//! Sources, lowest precedence first: built-in defaults, an optional
//! `clinic-intake.toml` (or an explicit file), then `CLINIC_INTAKE_*`
//! environment variables.

use std::path::Path;

use anyhow::{anyhow, Result};
use config::{Config, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};

const VALID_LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, uniffi::Record)]
pub struct IntakeConfig {
    /// SQLite file holding the offline queue and snapshots
    pub database_path: String,
    /// Base URL of the intake server, e.g. `http://localhost:3000`
    pub server_url: String,
    pub request_timeout_secs: u64,
    pub log_level: String,
}

impl Default for IntakeConfig {
    fn default() -> Self {
        Self {
            database_path: "clinic-intake.db".to_string(),
            server_url: "http://localhost:3000".to_string(),
            request_timeout_secs: 10,
            log_level: "info".to_string(),
        }
    }
}

impl IntakeConfig {
    /// Load from `clinic-intake.toml` in the working directory, if present.
    pub fn load() -> Result<Self> {
        Self::load_from(None)
    }

    /// Load with `path` in place of the default config file.
    pub fn load_from(path: Option<&Path>) -> Result<Self> {
        let defaults = Self::default();
        let file = match path {
            Some(path) => File::from(path).format(FileFormat::Toml).required(true),
            None => File::with_name("clinic-intake").required(false),
        };

        let config = Config::builder()
            .set_default("database_path", defaults.database_path)?
            .set_default("server_url", defaults.server_url)?
            .set_default("request_timeout_secs", defaults.request_timeout_secs as i64)?
            .set_default("log_level", defaults.log_level)?
            .add_source(file)
            .add_source(Environment::with_prefix("CLINIC_INTAKE").try_parsing(true))
            .build()
            .map_err(|e| anyhow!("Failed to load configuration: {}", e))?;

        let loaded: IntakeConfig = config
            .try_deserialize()
            .map_err(|e| anyhow!("Failed to deserialize configuration: {}", e))?;

        loaded.validate()?;
        Ok(loaded)
    }

    pub fn validate(&self) -> Result<()> {
        if self.request_timeout_secs == 0 {
            return Err(anyhow!("request_timeout_secs must be greater than 0"));
        }
        if self.server_url.trim().is_empty() {
            return Err(anyhow!("server_url must not be empty"));
        }
        if self.database_path.trim().is_empty() {
            return Err(anyhow!("database_path must not be empty"));
        }
        if !VALID_LOG_LEVELS.contains(&self.log_level.as_str()) {
            return Err(anyhow!(
                "Invalid log level: {}. Must be one of: {:?}",
                self.log_level,
                VALID_LOG_LEVELS
            ));
        }
        Ok(())
    }

    pub fn request_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.request_timeout_secs)
    }
}
