// src/config.rs

use chrono::FixedOffset;
use serde::Deserialize;
use thiserror::Error;
use url::Url;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read configuration from environment: {0}")]
    Env(#[from] envy::Error),
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

fn default_threshold_minutes() -> u32 {
    30
}

fn default_weekday_start_hour() -> u32 {
    9
}

fn default_weekday_end_hour() -> u32 {
    21
}

fn default_utc_offset_hours() -> i32 {
    7
}

fn default_misfire_grace_secs() -> u64 {
    300
}

/// Runtime configuration, read from `BEACONWATCH_`-prefixed environment
/// variables. `threshold_minutes` doubles as the absence cutoff and the
/// scheduling cadence so each employee is checked at most once per
/// threshold window.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub database_url: String,
    pub api_base_url: String,
    pub push_url: String,
    pub auth_username: String,
    pub auth_password: String,
    #[serde(default = "default_threshold_minutes")]
    pub threshold_minutes: u32,
    #[serde(default = "default_weekday_start_hour")]
    pub weekday_start_hour: u32,
    #[serde(default = "default_weekday_end_hour")]
    pub weekday_end_hour: u32,
    #[serde(default = "default_utc_offset_hours")]
    pub utc_offset_hours: i32,
    #[serde(default = "default_misfire_grace_secs")]
    pub misfire_grace_secs: u64,
    #[serde(default)]
    pub audit_log_path: Option<String>,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let config: AppConfig = envy::prefixed("BEACONWATCH_").from_env()?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.threshold_minutes == 0 {
            return Err(ConfigError::Invalid(
                "BEACONWATCH_THRESHOLD_MINUTES must be greater than zero".into(),
            ));
        }
        if self.weekday_start_hour > 23 || self.weekday_end_hour > 23 {
            return Err(ConfigError::Invalid(format!(
                "window hours must be within 0-23, got start={} end={}",
                self.weekday_start_hour, self.weekday_end_hour
            )));
        }
        self.operating_offset()?;
        for (name, value) in [
            ("BEACONWATCH_API_BASE_URL", &self.api_base_url),
            ("BEACONWATCH_PUSH_URL", &self.push_url),
        ] {
            Url::parse(value)
                .map_err(|e| ConfigError::Invalid(format!("{} is not a valid URL: {}", name, e)))?;
        }
        Ok(())
    }

    /// The single operating timezone used for all absence arithmetic.
    pub fn operating_offset(&self) -> Result<FixedOffset, ConfigError> {
        FixedOffset::east_opt(self.utc_offset_hours * 3600).ok_or_else(|| {
            ConfigError::Invalid(format!(
                "BEACONWATCH_UTC_OFFSET_HOURS {} does not form a valid offset",
                self.utc_offset_hours
            ))
        })
    }
}
