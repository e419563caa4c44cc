//! Node-local settings of the chain engine
//!
//! Consensus values live in [`Params`]; this file only covers how the engine
//! runs on this machine.

use consensus_core::config::{NetworkKind, Params};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::errors::{ChainError, ChainResult};

const IN_FLIGHT_FILE: &str = "inflight.block";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChainConfig {
    pub network: NetworkKind,
    pub data_dir: PathBuf,
    /// Overrides the network's orphan pool capacity when set
    pub max_orphan_blocks: Option<usize>,
    /// Regtest only
    pub coinbase_maturity: Option<u64>,
    /// Pending submissions the worker queue holds before callers block
    pub request_queue_size: usize,
    pub block_cache_size: usize,
}

impl Default for ChainConfig {
    fn default() -> Self {
        Self {
            network: NetworkKind::Mainnet,
            data_dir: PathBuf::from("data"),
            max_orphan_blocks: None,
            coinbase_maturity: None,
            request_queue_size: 64,
            block_cache_size: 1024,
        }
    }
}

impl ChainConfig {
    /// Load configuration from file if it exists, otherwise use defaults
    pub fn load(path: &Path) -> ChainResult<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| ChainError::Config(format!("failed to parse {}: {}", path.display(), e)))
    }

    pub fn for_network(network: NetworkKind, data_dir: impl Into<PathBuf>) -> Self {
        Self { network, data_dir: data_dir.into(), ..Self::default() }
    }

    pub fn db_path(&self) -> PathBuf {
        self.data_dir.join("chain")
    }

    pub fn in_flight_path(&self) -> PathBuf {
        self.data_dir.join(IN_FLIGHT_FILE)
    }

    pub fn validate(&self) -> ChainResult<()> {
        if self.request_queue_size == 0 {
            return Err(ChainError::Config("request_queue_size must be positive".into()));
        }
        if self.max_orphan_blocks == Some(0) {
            return Err(ChainError::Config("max_orphan_blocks must be positive".into()));
        }
        if self.coinbase_maturity.is_some() && self.network != NetworkKind::Regtest {
            return Err(ChainError::Config(format!("coinbase_maturity cannot be overridden on {}", self.network)));
        }
        Ok(())
    }

    /// Consensus parameters of the configured network with local overrides applied.
    pub fn params(&self) -> Params {
        let mut params = Params::for_network(self.network);
        if let Some(max) = self.max_orphan_blocks {
            params.max_orphan_blocks = max;
        }
        if let Some(maturity) = self.coinbase_maturity {
            params.coinbase_maturity = maturity;
        }
        params
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_missing_file_gives_defaults() {
        let cfg = ChainConfig::load(Path::new("/definitely/not/here.toml")).unwrap();
        assert_eq!(cfg.request_queue_size, 64);
        assert_eq!(cfg.network, NetworkKind::Mainnet);
    }

    #[test]
    fn test_load_partial_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("chain.toml");
        fs::write(&path, "network = \"regtest\"\nmax_orphan_blocks = 7\n").unwrap();
        let cfg = ChainConfig::load(&path).unwrap();
        assert_eq!(cfg.network, NetworkKind::Regtest);
        assert_eq!(cfg.params().max_orphan_blocks, 7);
        assert_eq!(cfg.block_cache_size, 1024);
        cfg.validate().unwrap();

        let mainnet = ChainConfig { coinbase_maturity: Some(1), ..ChainConfig::default() };
        assert!(matches!(mainnet.validate(), Err(ChainError::Config(_))));

        fs::write(&path, "network = 3").unwrap();
        assert!(matches!(ChainConfig::load(&path), Err(ChainError::Config(_))));
    }
}
