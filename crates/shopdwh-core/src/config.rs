//! TOML pipeline definitions.
//!
//! ```toml
//! [source]
//! kind = "postgres"
//! credentials_env = "SHOPDWH_SOURCE_URL"
//! acquire_timeout_secs = 30
//!
//! [destination]
//! kind = "parquet"
//! path = "warehouse"
//!
//! [retry]
//! retries = 1
//! retry_delay_secs = 300
//!
//! [[pipelines]]
//! name = "dim_date"
//! source_table = "shop_dataset.orders"
//! dest_table = "shop_dwh.Dim_Date"
//! ```

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

use crate::credentials::Credentials;
use crate::error::PipelineError;
use crate::registry::registry;
use crate::table_ref::TableRef;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("pipeline '{0}' is defined more than once")]
    DuplicatePipeline(String),

    #[error("pipeline '{name}': {source}")]
    InvalidPipeline {
        name: String,
        #[source]
        source: PipelineError,
    },

    #[error("credentials variable {variable} is not set")]
    MissingCredentials { variable: String },

    #[error("no pipeline named '{0}'")]
    UnknownPipeline(String),
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    pub source: ConnectionConfig,
    pub destination: ConnectionConfig,
    #[serde(default)]
    pub retry: RetryConfig,
    #[serde(default)]
    pub pipelines: Vec<PipelineConfig>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ConnectionConfig {
    /// `credentials_env` names the variable holding the connection URL.
    Postgres {
        credentials_env: String,
        #[serde(default)]
        acquire_timeout_secs: Option<u64>,
    },
    Parquet { path: PathBuf },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RetryConfig {
    #[serde(default = "default_retries")]
    pub retries: u32,
    #[serde(default = "default_retry_delay_secs")]
    pub retry_delay_secs: u64,
}

fn default_retries() -> u32 {
    1
}

fn default_retry_delay_secs() -> u64 {
    300
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            retries: default_retries(),
            retry_delay_secs: default_retry_delay_secs(),
        }
    }
}

impl RetryConfig {
    pub fn delay(&self) -> Duration {
        Duration::from_secs(self.retry_delay_secs)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PipelineConfig {
    pub name: String,
    pub source_table: String,
    pub dest_table: String,
    #[serde(default)]
    pub description: Option<String>,
}

impl PipelineConfig {
    pub fn source_table(&self) -> Result<TableRef, PipelineError> {
        self.source_table.parse()
    }

    pub fn dest_table(&self) -> Result<TableRef, PipelineError> {
        self.dest_table.parse()
    }

    fn validate(&self) -> Result<(), PipelineError> {
        self.source_table()?;
        let dest = self.dest_table()?;
        registry().lookup(dest.table())?;
        Ok(())
    }
}

impl Config {
    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let mut seen = HashSet::new();
        for pipeline in &self.pipelines {
            if !seen.insert(pipeline.name.as_str()) {
                return Err(ConfigError::DuplicatePipeline(pipeline.name.clone()));
            }
            pipeline
                .validate()
                .map_err(|source| ConfigError::InvalidPipeline {
                    name: pipeline.name.clone(),
                    source,
                })?;
        }
        Ok(())
    }

    pub fn pipeline(&self, name: &str) -> Result<&PipelineConfig, ConfigError> {
        self.pipelines
            .iter()
            .find(|pipeline| pipeline.name == name)
            .ok_or_else(|| ConfigError::UnknownPipeline(name.to_string()))
    }
}

impl ConnectionConfig {
    /// Resolves the credential handle through `lookup` (normally the process
    /// environment). File-backed connections need none.
    pub fn credentials(
        &self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Credentials, ConfigError> {
        match self {
            ConnectionConfig::Postgres { credentials_env, .. } => lookup(credentials_env)
                .map(Credentials::new)
                .ok_or_else(|| ConfigError::MissingCredentials {
                    variable: credentials_env.clone(),
                }),
            ConnectionConfig::Parquet { .. } => Ok(Credentials::new(String::new())),
        }
    }
}
