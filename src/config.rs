use serde::Deserialize;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::constants::{
    DEFAULT_DATABASE_PATH, DEFAULT_MAX_ATTEMPTS, DEFAULT_PRICE_LIMIT, DEFAULT_RETRY_DELAY_SECS,
    SOURCE_TABLE, TARGET_TABLE,
};
use crate::error::{EtlError, Result};
use crate::pipeline::RetryPolicy;

pub const CONFIG_PATH: &str = "config.toml";

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct Config {
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub pipeline: PipelineSettings,
}

/// Where the staging and analytics relations live
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct DatabaseConfig {
    pub path: PathBuf,
    pub source_table: String,
    pub target_table: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from(DEFAULT_DATABASE_PATH),
            source_table: SOURCE_TABLE.to_string(),
            target_table: TARGET_TABLE.to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct PipelineSettings {
    pub price_limit: f64,
    pub max_attempts: u32,
    pub retry_delay_secs: u64,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            price_limit: DEFAULT_PRICE_LIMIT,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            retry_delay_secs: DEFAULT_RETRY_DELAY_SECS,
        }
    }
}

impl PipelineSettings {
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.max_attempts, Duration::from_secs(self.retry_delay_secs))
    }
}

impl Config {
    /// Load `config.toml` from the working directory if present, then apply
    /// `ETL_*` environment overrides (a `.env` file is honoured).
    pub fn load() -> Result<Self> {
        dotenv::dotenv().ok();
        let mut config = Self::from_file_or_default(CONFIG_PATH)?;
        config.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file_or_default<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(Self::default());
        }
        let config_content = fs::read_to_string(path).map_err(|e| {
            EtlError::Config(format!("Failed to read config file '{}': {}", path.display(), e))
        })?;
        Self::from_toml_str(&config_content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content)?;
        Ok(config)
    }

    fn apply_env_overrides(&mut self) -> Result<()> {
        if let Some(path) = env_var("ETL_DATABASE_PATH") {
            self.database.path = PathBuf::from(path);
        }
        if let Some(limit) = env_var("ETL_PRICE_LIMIT") {
            self.pipeline.price_limit = parse_env("ETL_PRICE_LIMIT", &limit)?;
        }
        if let Some(attempts) = env_var("ETL_MAX_ATTEMPTS") {
            self.pipeline.max_attempts = parse_env("ETL_MAX_ATTEMPTS", &attempts)?;
        }
        if let Some(delay) = env_var("ETL_RETRY_DELAY_SECS") {
            self.pipeline.retry_delay_secs = parse_env("ETL_RETRY_DELAY_SECS", &delay)?;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if !self.pipeline.price_limit.is_finite() {
            return Err(EtlError::Config(format!(
                "price_limit must be a finite number, got {}",
                self.pipeline.price_limit
            )));
        }
        if self.pipeline.max_attempts == 0 {
            return Err(EtlError::Config("max_attempts must be at least 1".to_string()));
        }
        if self.database.source_table == self.database.target_table {
            return Err(EtlError::Config(
                "source_table and target_table must differ".to_string(),
            ));
        }
        Ok(())
    }
}

fn env_var(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn parse_env<T: std::str::FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| EtlError::Config(format!("Invalid value for {key}: '{value}'")))
}
