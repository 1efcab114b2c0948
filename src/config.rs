use crate::constants::{
    DEFAULT_ARCHIVE_PATH, DEFAULT_CONFIG_FILE, DEFAULT_DATABASE_PATH, DEFAULT_INPUT_PATH,
    DEFAULT_LOG_DIR, DEFAULT_METRICS_JOB,
};
use crate::error::{EtlError, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EtlConfig {
    pub input_path: PathBuf,
    pub archive: ArchiveConfig,
    pub structured: StructuredConfig,
    pub logging: LoggingConfig,
    pub metrics: MetricsConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArchiveConfig {
    pub enabled: bool,
    pub path: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StructuredConfig {
    pub path: PathBuf,
    /// Create `raw_transaction_logs` when it does not exist yet.
    pub create_table_if_missing: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub dir: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    pub pushgateway_url: Option<String>,
    pub job: Option<String>,
}

impl Default for EtlConfig {
    fn default() -> Self {
        Self {
            input_path: PathBuf::from(DEFAULT_INPUT_PATH),
            archive: ArchiveConfig::default(),
            structured: StructuredConfig::default(),
            logging: LoggingConfig::default(),
            metrics: MetricsConfig::default(),
        }
    }
}

impl Default for ArchiveConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            path: PathBuf::from(DEFAULT_ARCHIVE_PATH),
        }
    }
}

impl Default for StructuredConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from(DEFAULT_DATABASE_PATH),
            create_table_if_missing: false,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from(DEFAULT_LOG_DIR),
        }
    }
}

impl MetricsConfig {
    pub fn job_name(&self) -> &str {
        self.job.as_deref().unwrap_or(DEFAULT_METRICS_JOB)
    }
}

impl EtlConfig {
    /// Load configuration: explicit file (must exist), else `txn_etl.toml`
    /// in the working directory if present, else defaults. Environment
    /// overrides are applied on top.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None if Path::new(DEFAULT_CONFIG_FILE).exists() => {
                Self::from_file(Path::new(DEFAULT_CONFIG_FILE))?
            }
            None => Self::default(),
        };
        config.apply_overrides(|key| std::env::var(key).ok());
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
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Apply `TXN_ETL_*` overrides from `lookup` (the process environment in
    /// production, a map in tests).
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(v) = non_empty("TXN_ETL_INPUT") {
            self.input_path = PathBuf::from(v);
        }
        if let Some(v) = non_empty("TXN_ETL_ARCHIVE_PATH") {
            self.archive.path = PathBuf::from(v);
        }
        if let Some(v) = non_empty("TXN_ETL_ARCHIVE_ENABLED") {
            self.archive.enabled = !matches!(v.trim(), "0" | "false" | "no" | "off");
        }
        if let Some(v) = non_empty("TXN_ETL_DATABASE_PATH") {
            self.structured.path = PathBuf::from(v);
        }
        if let Some(v) = non_empty("TXN_ETL_LOG_DIR") {
            self.logging.dir = PathBuf::from(v);
        }
        if let Some(v) = non_empty("TXN_ETL_PUSHGATEWAY_URL") {
            self.metrics.pushgateway_url = Some(v);
        }
    }
}
