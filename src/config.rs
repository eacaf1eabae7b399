use crate::constants::{
    COST_PER_DELIVERY_TARGET, DEFAULT_CONFIG_FILE, DEFAULT_DB_HOST, DEFAULT_DB_NAME,
    DEFAULT_DB_PORT, DEFAULT_DB_USER, DEFAULT_PROCESSED_DATASET, DEFAULT_RAW_DATASET,
    DELIVERED_KEYWORDS, LATE_KEYWORDS, MAX_ACCEPTABLE_DELAY_HOURS, ON_TIME_DELIVERY_TARGET,
};
use crate::error::{EtlError, Result};
use crate::pipeline::transform::StatusKeywords;
use serde::Deserialize;
use std::env;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Everything a pipeline run needs, passed explicitly to [`crate::pipeline::Pipeline::new`]
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct EtlConfig {
    pub raw_dataset: PathBuf,
    pub processed_dataset: PathBuf,
    /// Run the database stage after the file is written
    pub load_database: bool,
    pub database: DbConfig,
    pub kpi: KpiThresholds,
    pub status_keywords: StatusKeywordConfig,
}

#[derive(Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct DbConfig {
    pub host: String,
    pub port: u16,
    pub database: String,
    pub user: String,
    pub password: String,
}

/// Business targets. Reported next to observed values, never enforced.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct KpiThresholds {
    pub on_time_delivery_target: f64,
    pub max_acceptable_delay_hours: f64,
    pub cost_per_delivery_target: f64,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct StatusKeywordConfig {
    pub delivered: Vec<String>,
    pub late: Vec<String>,
}

impl Default for EtlConfig {
    fn default() -> Self {
        Self {
            raw_dataset: PathBuf::from(DEFAULT_RAW_DATASET),
            processed_dataset: PathBuf::from(DEFAULT_PROCESSED_DATASET),
            load_database: true,
            database: DbConfig::default(),
            kpi: KpiThresholds::default(),
            status_keywords: StatusKeywordConfig::default(),
        }
    }
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_DB_HOST.to_string(),
            port: DEFAULT_DB_PORT,
            database: DEFAULT_DB_NAME.to_string(),
            user: DEFAULT_DB_USER.to_string(),
            password: String::new(),
        }
    }
}

impl fmt::Debug for DbConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DbConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("database", &self.database)
            .field("user", &self.user)
            .field("password", &"***")
            .finish()
    }
}

impl Default for KpiThresholds {
    fn default() -> Self {
        Self {
            on_time_delivery_target: ON_TIME_DELIVERY_TARGET,
            max_acceptable_delay_hours: MAX_ACCEPTABLE_DELAY_HOURS,
            cost_per_delivery_target: COST_PER_DELIVERY_TARGET,
        }
    }
}

impl Default for StatusKeywordConfig {
    fn default() -> Self {
        let owned = |words: &[&str]| -> Vec<String> { words.iter().map(|w| w.to_string()).collect() };
        Self {
            delivered: owned(DELIVERED_KEYWORDS),
            late: owned(LATE_KEYWORDS),
        }
    }
}

impl StatusKeywordConfig {
    pub fn keywords(&self) -> StatusKeywords {
        StatusKeywords::new(self.delivered.as_slice(), self.late.as_slice())
    }
}

fn parse_bool(key: &str, value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(EtlError::Config(format!("{key} must be a boolean, got '{other}'"))),
    }
}

impl EtlConfig {
    /// Load `.env`, then the optional TOML file (`ETL_CONFIG`, default `etl.toml`), then environment
    /// overrides.
    pub fn load() -> Result<Self> {
        dotenv::dotenv().ok();

        let path = env::var("ETL_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_FILE));
        let mut config = if path.exists() {
            debug!("Reading configuration from {}", path.display());
            Self::from_file(&path)?
        } else {
            Self::default()
        };

        config.apply_env(|key| env::var(key).ok())?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            EtlError::Config(format!(
                "Failed to read config file '{}': {}",
                path.display(),
                e
            ))
        })?;
        Ok(toml::from_str(&content)?)
    }

    /// Apply overrides from `lookup` (the process environment in [`EtlConfig::load`]).
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("ETL_RAW_DATASET") {
            self.raw_dataset = PathBuf::from(v);
        }
        if let Some(v) = lookup("ETL_PROCESSED_DATASET") {
            self.processed_dataset = PathBuf::from(v);
        }
        if let Some(v) = lookup("ETL_LOAD_DB") {
            self.load_database = parse_bool("ETL_LOAD_DB", &v)?;
        }
        if let Some(v) = lookup("DB_HOST") {
            self.database.host = v;
        }
        if let Some(v) = lookup("DB_PORT") {
            self.database.port = v
                .trim()
                .parse()
                .map_err(|e| EtlError::Config(format!("DB_PORT must be a port number: {e}")))?;
        }
        if let Some(v) = lookup("DB_NAME") {
            self.database.database = v;
        }
        if let Some(v) = lookup("DB_USER") {
            self.database.user = v;
        }
        if let Some(v) = lookup("DB_PASSWORD") {
            self.database.password = v;
        }
        Ok(())
    }
}
