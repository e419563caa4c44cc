use jio_math::{compact_to_target, U256};
use serde::{Deserialize, Serialize};

use crate::block::Block;
use crate::constants::{ATOMS_PER_COIN, DEFAULT_MAX_ORPHAN_BLOCKS};
use crate::pow::PowType;
use crate::Hash;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum NetworkKind {
    #[default]
    Mainnet,
    Testnet,
    Regtest,
}

impl std::fmt::Display for NetworkKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            NetworkKind::Mainnet => "mainnet",
            NetworkKind::Testnet => "testnet",
            NetworkKind::Regtest => "regtest",
        };
        f.write_str(name)
    }
}

/// Retarget strategy a network runs with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DifficultyMode {
    /// Periodic retarget over main-chain blocks of the same algorithm
    Legacy,
    /// Sliding average over the blue past
    Ghostdag,
}

/// Per-algorithm difficulty bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PowConfig {
    pub pow_type: PowType,
    /// Easiest difficulty ever accepted for this algorithm
    pub pow_limit_bits: u32,
    /// Difficulty used until enough history exists to retarget
    pub initial_bits: u32,
}

/// A known-good block at a main height.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Checkpoint {
    pub height: u64,
    pub hash: Hash,
}

/// Consensus parameters of a network.
///
/// Constructed once and handed to every component that needs it; nothing
/// reads network settings from global state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Params {
    pub net: NetworkKind,
    pub genesis_timestamp: u64,
    pub genesis_pow: PowType,
    pub pow_configs: Vec<PowConfig>,

    pub difficulty_mode: DifficultyMode,
    pub target_time_per_block_ms: u64,
    /// Number of blue samples the windowed retarget averages over
    pub working_window_size: usize,
    /// Largest factor a single retarget may move the target by
    pub retarget_adjustment_factor: u64,
    pub legacy_blocks_per_retarget: u64,
    /// Testnets allow a minimum-difficulty block after a long gap
    pub reduce_min_difficulty: bool,
    pub min_diff_reduction_time_ms: u64,

    pub ghostdag_k: usize,
    pub max_block_parents: usize,
    pub max_block_size: usize,
    pub max_time_offset_ms: u64,
    pub median_time_blocks: usize,

    pub coinbase_maturity: u64,
    pub base_subsidy: u64,
    pub subsidy_reduction_interval: u64,
    pub max_orphan_blocks: usize,

    pub checkpoints: Vec<Checkpoint>,
}

impl Params {
    pub fn mainnet() -> Self {
        Self {
            net: NetworkKind::Mainnet,
            genesis_timestamp: 1_696_118_400_000,
            genesis_pow: PowType::Blake2bd,
            pow_configs: PowType::ALL
                .iter()
                .map(|&pow_type| PowConfig { pow_type, pow_limit_bits: 0x1f00_ffff, initial_bits: 0x1f00_ffff })
                .collect(),
            difficulty_mode: DifficultyMode::Ghostdag,
            target_time_per_block_ms: 30_000,
            working_window_size: 2641,
            retarget_adjustment_factor: 4,
            legacy_blocks_per_retarget: 1440,
            reduce_min_difficulty: false,
            min_diff_reduction_time_ms: 0,
            ghostdag_k: 18,
            max_block_parents: 50,
            max_block_size: 1_048_576,
            max_time_offset_ms: 2 * 60 * 60 * 1000,
            median_time_blocks: 11,
            coinbase_maturity: 720,
            base_subsidy: 10 * ATOMS_PER_COIN,
            subsidy_reduction_interval: 4_200_000,
            max_orphan_blocks: DEFAULT_MAX_ORPHAN_BLOCKS,
            checkpoints: Vec::new(),
        }
    }

    pub fn testnet() -> Self {
        Self {
            net: NetworkKind::Testnet,
            genesis_timestamp: 1_696_204_800_000,
            difficulty_mode: DifficultyMode::Legacy,
            legacy_blocks_per_retarget: 144,
            reduce_min_difficulty: true,
            min_diff_reduction_time_ms: 20 * 60 * 1000,
            coinbase_maturity: 16,
            ..Self::mainnet()
        }
    }

    pub fn regtest() -> Self {
        Self {
            net: NetworkKind::Regtest,
            genesis_timestamp: 1_696_291_200_000,
            genesis_pow: PowType::Sha256d,
            pow_configs: PowType::ALL
                .iter()
                .map(|&pow_type| PowConfig { pow_type, pow_limit_bits: 0x207f_ffff, initial_bits: 0x207f_ffff })
                .collect(),
            target_time_per_block_ms: 1_000,
            coinbase_maturity: 16,
            subsidy_reduction_interval: 150,
            ..Self::mainnet()
        }
    }

    pub fn for_network(net: NetworkKind) -> Self {
        match net {
            NetworkKind::Mainnet => Self::mainnet(),
            NetworkKind::Testnet => Self::testnet(),
            NetworkKind::Regtest => Self::regtest(),
        }
    }

    pub fn pow_config(&self, pow_type: PowType) -> Option<&PowConfig> {
        self.pow_configs.iter().find(|c| c.pow_type == pow_type)
    }

    /// Compact limit for `pow_type`; algorithms the network does not list get
    /// the genesis algorithm's limit.
    pub fn pow_limit_bits(&self, pow_type: PowType) -> u32 {
        self.pow_config(pow_type).or_else(|| self.pow_config(self.genesis_pow)).map(|c| c.pow_limit_bits).unwrap_or(0x207f_ffff)
    }

    pub fn pow_limit(&self, pow_type: PowType) -> U256 {
        compact_to_target(self.pow_limit_bits(pow_type))
    }

    pub fn initial_bits(&self, pow_type: PowType) -> u32 {
        self.pow_config(pow_type).map(|c| c.initial_bits).unwrap_or_else(|| self.pow_limit_bits(pow_type))
    }

    /// Legacy retarget timespan
    pub fn target_timespan_ms(&self) -> u64 {
        self.target_time_per_block_ms * self.legacy_blocks_per_retarget
    }

    pub fn genesis_block(&self) -> Block {
        super::genesis::build_genesis(self)
    }

    pub fn genesis_hash(&self) -> Hash {
        self.genesis_block().hash()
    }
}

impl Default for Params {
    fn default() -> Self {
        Self::mainnet()
    }
}
