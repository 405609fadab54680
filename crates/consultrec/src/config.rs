//! Configuration management for consultrec.
//!
//! This module provides configuration loading and validation using figment,
//! supporting TOML config files, environment variables, and defaults.

use std::path::PathBuf;
use std::time::Duration;

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::store::EvictionPolicy;
use crate::sync::{DeliveryMode, PayloadFormat, RetryPolicy};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "config.toml";

/// Default data directory name.
const DATA_DIR_NAME: &str = "consultrec";

/// Default database file name.
const DATABASE_FILE_NAME: &str = "consultations.db";

/// Environment variable prefix.
const ENV_PREFIX: &str = "CONSULTREC_";

/// Application configuration.
///
/// Configuration is loaded from (in order of precedence, highest first):
/// 1. Environment variables (prefixed with `CONSULTREC_`, sections separated
///    by `__`, e.g. `CONSULTREC_SYNC__ENDPOINT`)
/// 2. TOML config file at `~/.config/consultrec/config.toml`
/// 3. Default values
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Local record store configuration.
    pub storage: StorageConfig,
    /// Remote sync configuration.
    pub sync: SyncConfig,
}

/// Local record store configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Path to the database file.
    /// Defaults to `~/.local/share/consultrec/consultations.db`
    pub database_path: Option<PathBuf>,
    /// Name of the blob holding the record collection.
    pub blob_key: String,
    /// Storage quota in bytes. Set to 0 for unlimited.
    pub quota_bytes: u64,
    /// Minimum number of records evicted when the quota is hit.
    pub min_eviction_batch: usize,
    /// Percentage of stored records evicted when the quota is hit.
    pub eviction_percent: u8,
}

/// Remote sync configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Collection endpoint. Remote sync is skipped when unset.
    pub endpoint: Option<String>,
    /// Per-attempt timeout in seconds.
    pub attempt_timeout_secs: u64,
    /// Retries after the first attempt.
    pub max_retries: u32,
    /// Delay before the first retry in milliseconds; doubles per retry.
    pub backoff_base_ms: u64,
    /// What counts as a successful delivery.
    pub delivery: DeliveryMode,
    /// UTC offset, in hours, used to render the submission timestamp.
    pub utc_offset_hours: i32,
    /// Value sent for contact fields left blank.
    pub missing_placeholder: String,
    /// `isSuccess` value when the analysis was possible.
    pub success_label: String,
    /// `isSuccess` value when the analysis was refused.
    pub failure_label: String,
    /// Skip the network interface check and always treat the host as online.
    pub assume_online: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: None, // Will be resolved to default at runtime
            blob_key: "consultation_db_v1".to_string(),
            quota_bytes: 5 * 1024 * 1024,
            min_eviction_batch: 5,
            eviction_percent: 20,
        }
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            attempt_timeout_secs: 15,
            max_retries: 2,
            backoff_base_ms: 1000,
            delivery: DeliveryMode::default(),
            utc_offset_hours: 9, // Asia/Seoul
            missing_placeholder: "미입력".to_string(),
            success_label: "분석 성공".to_string(),
            failure_label: "분석 실패".to_string(),
            assume_online: false,
        }
    }
}

impl StorageConfig {
    /// The quota as an option, `None` meaning unlimited.
    #[must_use]
    pub fn quota(&self) -> Option<u64> {
        (self.quota_bytes > 0).then_some(self.quota_bytes)
    }

    /// The eviction policy described by this configuration.
    #[must_use]
    pub fn eviction_policy(&self) -> EvictionPolicy {
        EvictionPolicy {
            min_batch: self.min_eviction_batch,
            percent: self.eviction_percent,
        }
    }
}

impl SyncConfig {
    /// The retry policy described by this configuration.
    #[must_use]
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_retries: self.max_retries,
            backoff_base: Duration::from_millis(self.backoff_base_ms),
            attempt_timeout: Duration::from_secs(self.attempt_timeout_secs),
        }
    }

    /// The payload rendering settings described by this configuration.
    #[must_use]
    pub fn payload_format(&self) -> PayloadFormat {
        PayloadFormat {
            utc_offset_hours: self.utc_offset_hours,
            missing_placeholder: self.missing_placeholder.clone(),
            success_label: self.success_label.clone(),
            failure_label: self.failure_label.clone(),
        }
    }

    /// The parsed endpoint, if one is configured.
    ///
    /// # Errors
    ///
    /// Returns an error if the endpoint is not an `http` or `https` URL.
    pub fn endpoint_url(&self) -> Result<Option<reqwest::Url>> {
        let Some(raw) = self.endpoint.as_deref() else {
            return Ok(None);
        };
        let url = reqwest::Url::parse(raw).map_err(|e| Error::ConfigValidation {
            message: format!("invalid sync endpoint '{raw}': {e}"),
        })?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(Error::ConfigValidation {
                message: format!("sync endpoint must use http or https: {raw}"),
            });
        }
        Ok(Some(url))
    }
}

impl Config {
    /// Load configuration from all sources.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration loading or parsing fails.
    pub fn load() -> Result<Self> {
        Self::load_from(None)
    }

    /// Load configuration with an optional custom config path.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration loading or parsing fails.
    pub fn load_from(config_path: Option<PathBuf>) -> Result<Self> {
        let config_file = config_path.unwrap_or_else(Self::default_config_path);

        let figment = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Toml::file(&config_file))
            .merge(Env::prefixed(ENV_PREFIX).split("__"));

        let config: Config = figment.extract()?;
        config.validate()?;
        Ok(config)
    }

    /// Get the default configuration file path.
    #[must_use]
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from(".config"))
            .join(DATA_DIR_NAME)
            .join(CONFIG_FILE_NAME)
    }

    /// Get the default data directory path.
    #[must_use]
    pub fn default_data_dir() -> PathBuf {
        dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from(".local/share"))
            .join(DATA_DIR_NAME)
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if any configuration values are invalid.
    pub fn validate(&self) -> Result<()> {
        if self.storage.blob_key.trim().is_empty() {
            return Err(Error::ConfigValidation {
                message: "blob_key must not be empty".to_string(),
            });
        }

        if self.storage.min_eviction_batch == 0 {
            return Err(Error::ConfigValidation {
                message: "min_eviction_batch must be greater than 0".to_string(),
            });
        }

        if !(1..=100).contains(&self.storage.eviction_percent) {
            return Err(Error::ConfigValidation {
                message: format!(
                    "eviction_percent ({}) must be between 1 and 100",
                    self.storage.eviction_percent
                ),
            });
        }

        if self.sync.attempt_timeout_secs == 0 {
            return Err(Error::ConfigValidation {
                message: "attempt_timeout_secs must be greater than 0".to_string(),
            });
        }

        if !(-12..=14).contains(&self.sync.utc_offset_hours) {
            return Err(Error::ConfigValidation {
                message: format!(
                    "utc_offset_hours ({}) must be between -12 and 14",
                    self.sync.utc_offset_hours
                ),
            });
        }

        self.sync.endpoint_url()?;

        Ok(())
    }

    /// Get the database path, resolving defaults if not set.
    #[must_use]
    pub fn database_path(&self) -> PathBuf {
        self.storage
            .database_path
            .clone()
            .unwrap_or_else(|| Self::default_data_dir().join(DATABASE_FILE_NAME))
    }
}
