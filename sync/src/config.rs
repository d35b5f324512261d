//! Cloud sync configuration with TOML file support.

use crate::{ElectionRules, RetryPolicy, SyncError};
use edgevote_ledger::LedgerConfig;
use edgevote_types::ElectionId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

/// Configuration for the cloud sync service.
///
/// Loaded from a TOML file via [`SyncConfig::from_toml_file`] or built
/// programmatically (e.g. for tests).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Largest number of votes accepted in one batch.
    #[serde(default = "default_max_batch_size")]
    pub max_batch_size: usize,

    /// How long a processed batch result is replayed for its `batchId`.
    #[serde(default = "default_result_ttl_secs")]
    pub result_ttl_secs: u64,

    /// Period of the background result-cache sweep.
    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,

    /// `"human"` or `"json"`.
    #[serde(default = "default_log_format")]
    pub log_format: String,

    /// Tracing filter, e.g. `"info"` or `"info,edgevote_sync=debug"`.
    #[serde(default = "default_log_level")]
    pub log_level: String,

    #[serde(default = "default_rpc_port")]
    pub rpc_port: u16,

    // TOML tables must follow plain keys.
    #[serde(default)]
    pub storage_retry: RetryPolicy,

    /// Edge-side ledger memory bound.
    #[serde(default)]
    pub ledger: LedgerConfig,

    /// Per-election rules, keyed by election id (`[elections.E1]`).
    #[serde(default)]
    pub elections: BTreeMap<ElectionId, ElectionRules>,
}

fn default_max_batch_size() -> usize {
    500
}

fn default_result_ttl_secs() -> u64 {
    24 * 3600
}

fn default_sweep_interval_secs() -> u64 {
    60
}

fn default_log_format() -> String {
    "human".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_rpc_port() -> u16 {
    7090
}

impl SyncConfig {
    /// Load configuration from a TOML file.
    pub fn from_toml_file(path: &str) -> Result<Self, SyncError> {
        let content =
            std::fs::read_to_string(path).map_err(|e| SyncError::Config(format!("{path}: {e}")))?;
        Self::from_toml_str(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn from_toml_str(s: &str) -> Result<Self, SyncError> {
        let config: Self = toml::from_str(s).map_err(|e| SyncError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize the configuration to a TOML string.
    pub fn to_toml_string(&self) -> Result<String, SyncError> {
        toml::to_string_pretty(self).map_err(|e| SyncError::Config(e.to_string()))
    }

    pub fn validate(&self) -> Result<(), SyncError> {
        if self.max_batch_size == 0 {
            return Err(SyncError::Config("max_batch_size must be positive".into()));
        }
        if self.sweep_interval_secs == 0 {
            return Err(SyncError::Config("sweep_interval_secs must be positive".into()));
        }
        if self.ledger.memory_entry_limit == Some(0) {
            return Err(SyncError::Config("ledger.memory_entry_limit must be positive".into()));
        }
        Ok(())
    }

    pub fn result_ttl(&self) -> Duration {
        Duration::from_secs(self.result_ttl_secs)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            max_batch_size: default_max_batch_size(),
            result_ttl_secs: default_result_ttl_secs(),
            sweep_interval_secs: default_sweep_interval_secs(),
            storage_retry: RetryPolicy::default(),
            ledger: LedgerConfig::default(),
            elections: BTreeMap::new(),
            log_format: default_log_format(),
            log_level: default_log_level(),
            rpc_port: default_rpc_port(),
        }
    }
}
