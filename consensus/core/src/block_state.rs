use bitflags::bitflags;
use serde::{Deserialize, Serialize};

use crate::constants::MAX_BLOCK_ORDER;
use crate::Hash;

bitflags! {
    /// Validation status bits a DAG block carries.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
    pub struct BlockStatus: u8 {
        /// Stamped while outside the ordered history; its effects were never applied
        const BAD_SIDE = 0b0000_0001;
        /// Failed connect-time validation; kept in the DAG but excluded from weight and UTXO effects
        const INVALID = 0b0000_0010;
    }
}

/// Engine-owned state of a DAG block: where it sits in the order, whether it
/// is valid, and the cumulative figures derived when it was connected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockState {
    /// DAG block id (insertion sequence)
    pub id: u64,
    pub order: u64,
    pub status: BlockStatus,
    /// Cumulative subsidy over the block's blue past, itself included
    pub weight: u64,
    /// Subsidy the block earned, zero unless connected and valid
    pub subsidy: u64,
    /// Fees collected by the block's transactions
    pub fees: u64,
    /// Side-chain head after this block was applied
    pub side_chain_head: Hash,
}

impl BlockState {
    pub fn new(id: u64) -> Self {
        Self {
            id,
            order: MAX_BLOCK_ORDER,
            status: BlockStatus::empty(),
            weight: 0,
            subsidy: 0,
            fees: 0,
            side_chain_head: Hash::default(),
        }
    }

    /// Default stamp for a block that is not ordered: it carries its main
    /// parent's cumulative figures and none of its own.
    pub fn inherit(id: u64, main_parent: &BlockState) -> Self {
        Self {
            id,
            order: MAX_BLOCK_ORDER,
            status: BlockStatus::BAD_SIDE,
            weight: main_parent.weight,
            subsidy: 0,
            fees: 0,
            side_chain_head: main_parent.side_chain_head,
        }
    }

    pub fn is_ordered(&self) -> bool {
        self.order != MAX_BLOCK_ORDER
    }

    pub fn is_invalid(&self) -> bool {
        self.status.contains(BlockStatus::INVALID)
    }
}
