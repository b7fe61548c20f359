//! Store configuration.
//!
//! A `StoreConfig` is built once at startup, from an optional YAML file plus
//! environment overrides, and handed to the store constructors.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

/// Path of a YAML configuration file.
pub const CONFIG_PATH_ENV: &str = "CAIRN_CONFIG_PATH";
/// PostgreSQL connection string for the stream store.
pub const DATABASE_URL_ENV: &str = "CAIRN_DATABASE_URL";
/// Events read per page.
pub const PAGE_SIZE_ENV: &str = "CAIRN_PAGE_SIZE";
/// Per-operation timeout in milliseconds.
pub const OPERATION_TIMEOUT_ENV: &str = "CAIRN_OPERATION_TIMEOUT_MS";
/// Connection pool size.
pub const MAX_CONNECTIONS_ENV: &str = "CAIRN_MAX_CONNECTIONS";

const DEFAULT_PAGE_SIZE: u64 = 100;
const DEFAULT_MAX_CONNECTIONS: u32 = 10;

/// Errors raised while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("cannot read config file {path}: {source}")]
    Io {
        /// The file that failed.
        path: PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The configuration file is not valid YAML for `StoreConfig`.
    #[error("cannot parse config: {0}")]
    Parse(#[from] serde_yaml::Error),

    /// An environment override could not be parsed.
    #[error("{key} must be {expected}, got {value:?}")]
    InvalidValue {
        /// The offending variable.
        key: &'static str,
        /// What the variable should hold.
        expected: &'static str,
        /// The raw value.
        value: String,
    },

    /// The assembled configuration violates a constraint.
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Settings shared by the event store, the aggregate store and the stream
/// store adapters.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StoreConfig {
    /// Events requested per forward read.
    pub page_size: u64,
    /// Upper bound on any single store operation, in milliseconds.
    pub operation_timeout_ms: Option<u64>,
    /// PostgreSQL connection string. Absent means the in-memory store.
    pub database_url: Option<String>,
    /// PostgreSQL pool size.
    pub max_connections: u32,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
            operation_timeout_ms: None,
            database_url: None,
            max_connections: DEFAULT_MAX_CONNECTIONS,
        }
    }
}

impl StoreConfig {
    /// Parses a YAML document. Missing keys take their defaults.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Parse` on malformed YAML or unknown keys, and
    /// `ConfigError::Invalid` if the result fails validation.
    pub fn from_yaml_str(yaml: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads and parses a YAML file.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Io` if the file cannot be read, otherwise as
    /// [`StoreConfig::from_yaml_str`].
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let yaml = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml_str(&yaml)
    }

    /// Loads the file named by `CAIRN_CONFIG_PATH`, if set, then applies the
    /// `CAIRN_*` environment overrides.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if the file or any override is invalid.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// As [`StoreConfig::from_env`], reading variables through `lookup`.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if the file or any override is invalid.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let base = match lookup(CONFIG_PATH_ENV) {
            Some(path) => Self::from_yaml_file(path)?,
            None => Self::default(),
        };
        base.with_overrides(lookup)
    }

    /// Applies `CAIRN_*` overrides on top of this configuration. Variables
    /// win over file values.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` for unparsable numbers and
    /// `ConfigError::Invalid` if the result fails validation.
    pub fn with_overrides<F>(mut self, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup(DATABASE_URL_ENV) {
            self.database_url = Some(url);
        }
        if let Some(raw) = lookup(PAGE_SIZE_ENV) {
            self.page_size = parse_number(PAGE_SIZE_ENV, &raw)?;
        }
        if let Some(raw) = lookup(OPERATION_TIMEOUT_ENV) {
            self.operation_timeout_ms = Some(parse_number(OPERATION_TIMEOUT_ENV, &raw)?);
        }
        if let Some(raw) = lookup(MAX_CONNECTIONS_ENV) {
            self.max_connections = parse_number(MAX_CONNECTIONS_ENV, &raw)?;
        }
        self.validate()?;
        Ok(self)
    }

    /// Checks value constraints.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` if `page_size` or `max_connections` is 0.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.page_size == 0 {
            return Err(ConfigError::Invalid("page_size must be at least 1".into()));
        }
        if self.max_connections == 0 {
            return Err(ConfigError::Invalid(
                "max_connections must be at least 1".into(),
            ));
        }
        Ok(())
    }

    /// The per-operation timeout, if configured.
    #[must_use]
    pub fn operation_timeout(&self) -> Option<Duration> {
        self.operation_timeout_ms.map(Duration::from_millis)
    }
}

fn parse_number<T: std::str::FromStr>(key: &'static str, raw: &str) -> Result<T, ConfigError> {
    raw.trim().parse().map_err(|_| ConfigError::InvalidValue {
        key,
        expected: "a non-negative integer",
        value: raw.to_owned(),
    })
}
