use serde::{Deserialize, Serialize};

use crate::Hash;

/// Persisted best-chain record, rewritten with every connected or
/// disconnected block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct BestChainState {
    pub tip_hash: Hash,
    pub tip_order: u64,
    pub bits: u32,
    pub total_txns: u64,
    pub total_subsidy: u64,
    pub token_tip_hash: Hash,
    /// Cumulative weight of the main tip
    pub work: u64,
}
