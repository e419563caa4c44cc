//! Engine-facing types shared by the pipeline and its callers

use bitflags::bitflags;
use consensus_core::pow::PowType;
use consensus_core::Hash;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::dag::IBlock;

bitflags! {
    /// Modifiers for block admission.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct BehaviorFlags: u8 {
        /// Already known good (checkpointed); skips context checks and the
        /// checkpoint difficulty floor
        const FAST_ADD = 0b01;
        /// Skips the proof-of-work check
        const NO_POW_CHECK = 0b10;
    }
}

/// Summary of the DAG shape as seen from the main tip.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphState {
    pub tips: Vec<Hash>,
    pub main_height: u64,
    pub main_order: u64,
    pub block_count: u64,
}

/// Immutable snapshot of the chain. A new one is published after every
/// accepted block; holders of an older snapshot keep a consistent view.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BestState {
    pub hash: Hash,
    pub order: u64,
    pub bits: u32,
    pub pow_type: PowType,
    pub block_size: u64,
    pub num_txns: u64,
    pub total_txns: u64,
    pub median_time: u64,
    pub total_subsidy: u64,
    pub token_tip_hash: Hash,
    pub graph_state: GraphState,
    /// Cumulative weight of the main tip
    pub work: u64,
}

/// Result of a block submission.
#[derive(Clone)]
pub struct ProcessOutcome {
    /// The DAG handle, absent when the block went to the orphan pool
    pub block: Option<Arc<dyn IBlock>>,
    pub is_orphan: bool,
}

impl std::fmt::Debug for ProcessOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProcessOutcome")
            .field("block", &self.block.as_ref().map(|b| b.hash()))
            .field("is_orphan", &self.is_orphan)
            .finish()
    }
}
