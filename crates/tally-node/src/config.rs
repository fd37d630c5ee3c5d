//! Node configuration
//!
//! Loaded from a TOML file; a missing file yields the defaults. Command-line
//! flags are merged on top by the binary.

use crate::errors::ConfigError;
use crate::ledgers::LedgerLocation;
use crate::tracking::TrackingPolicy;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use tally_core::ChainId;

/// File name of the chain store inside the database directory
pub const CHAIN_STORE_FILE: &str = "chains.sqlite3";

/// Node settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    /// Directory holding the chain store and per-chain ledgers; in-memory
    /// when unset
    pub db_dir: Option<PathBuf>,
    /// `tracing` filter directive
    pub log_filter: String,
    /// Chains followed concurrently during catch-up
    pub max_parallel_chains: usize,
    /// Only these chains may be tracked, when non-empty
    pub whitelist: Vec<ChainId>,
    /// These chains are never tracked
    pub blacklist: Vec<ChainId>,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            db_dir: None,
            log_filter: "info".to_string(),
            max_parallel_chains: 4,
            whitelist: Vec::new(),
            blacklist: Vec::new(),
        }
    }
}

impl NodeConfig {
    /// Load from `path`, or return the defaults if the file does not exist
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&text).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }

    /// Check that settings are usable together
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_parallel_chains == 0 {
            return Err(ConfigError::Invalid(
                "max_parallel_chains must be at least 1".to_string(),
            ));
        }
        let whitelist: BTreeSet<_> = self.whitelist.iter().collect();
        if let Some(chain) = self.blacklist.iter().find(|c| whitelist.contains(c)) {
            return Err(ConfigError::Invalid(format!(
                "chain {chain} is both whitelisted and blacklisted"
            )));
        }
        Ok(())
    }

    /// Tracking policy built from the chain lists
    pub fn tracking_policy(&self) -> TrackingPolicy {
        TrackingPolicy::new(self.whitelist.iter().copied(), self.blacklist.iter().copied())
    }

    /// Where chain ledgers are stored
    pub fn ledger_location(&self) -> LedgerLocation {
        match &self.db_dir {
            Some(dir) => LedgerLocation::Dir(dir.clone()),
            None => LedgerLocation::Memory,
        }
    }

    /// Path of the chain store, `None` when running in memory
    pub fn chain_store_path(&self) -> Option<PathBuf> {
        self.db_dir.as_ref().map(|dir| dir.join(CHAIN_STORE_FILE))
    }
}
