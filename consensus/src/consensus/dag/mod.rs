//! DAG topology seam
//!
//! The engine never computes blue sets or orders itself. It consumes them
//! through [`BlockDag`], and reads per-block facts through the [`IBlock`]
//! capability trait instead of inspecting concrete node types.

pub mod block_node;
pub mod memory_dag;

#[cfg(test)]
mod integration_test;

use consensus_core::block_state::{BlockState, BlockStatus};
use consensus_core::constants::MAX_BLOCK_ORDER;
use consensus_core::pow::PowType;
use consensus_core::Hash;
use jio_math::U256;
use std::sync::Arc;

use super::types::GraphState;
use crate::errors::ChainResult;

pub use block_node::BlockNode;
pub use memory_dag::MemoryDag;

/// Read access to a block held by the DAG provider, plus the engine-owned
/// [`BlockState`] attached to it.
pub trait IBlock: Send + Sync {
    fn hash(&self) -> Hash;
    /// Insertion sequence number, stable across restarts
    fn id(&self) -> u64;
    /// Position in the ordered history, [`MAX_BLOCK_ORDER`] when unordered
    fn order(&self) -> u64;
    /// Distance from genesis along main parents
    fn height(&self) -> u64;
    fn blue_score(&self) -> u64;
    fn blue_work(&self) -> U256;
    fn main_parent(&self) -> Option<Hash>;
    fn parents(&self) -> &[Hash];
    fn timestamp(&self) -> u64;
    fn bits(&self) -> u32;
    fn pow_type(&self) -> PowType;

    fn state(&self) -> BlockState;
    fn set_state(&self, state: BlockState);

    fn is_ordered(&self) -> bool {
        self.order() != MAX_BLOCK_ORDER
    }

    fn status(&self) -> BlockStatus {
        self.state().status
    }

    fn weight(&self) -> u64 {
        self.state().weight
    }
}

/// What changed when a block was inserted.
pub struct DagInsertion {
    pub block: Arc<dyn IBlock>,
    /// Blocks that received an order (or, for a block left unordered, just
    /// that block), in ascending order
    pub new_orders: Vec<Arc<dyn IBlock>>,
    /// Blocks whose previous order was withdrawn, in their old ascending order
    pub old_orders: Vec<Arc<dyn IBlock>>,
    pub main_tip_changed: bool,
}

/// Predicate over window candidates.
pub type BlockFilter<'a> = &'a dyn Fn(&dyn IBlock) -> bool;

/// The DAG topology provider.
pub trait BlockDag: Send + Sync {
    fn genesis(&self) -> Option<Arc<dyn IBlock>>;

    /// Inserts a block whose parents are all present.
    fn insert(&self, node: &BlockNode) -> ChainResult<DagInsertion>;

    fn get(&self, hash: &Hash) -> Option<Arc<dyn IBlock>>;
    fn get_by_order(&self, order: u64) -> Option<Arc<dyn IBlock>>;

    fn has(&self, hash: &Hash) -> bool {
        self.get(hash).is_some()
    }

    /// The parent a block with these parents would build on.
    fn main_parent_of(&self, parents: &[Hash]) -> Option<Arc<dyn IBlock>>;

    fn main_tip(&self) -> Option<Arc<dyn IBlock>>;
    fn graph_state(&self) -> GraphState;
    fn tips(&self) -> Vec<Hash>;
    fn block_count(&self) -> u64;

    /// Whether the block is in the blue set of the main tip
    fn is_blue(&self, hash: &Hash) -> bool;

    /// Blue-score distance from the main tip, zero for unordered blocks
    fn confirmations(&self, hash: &Hash) -> u64;

    /// Up to `size` blue blocks of `from`'s past (itself included), newest
    /// first, that pass `filter`.
    fn blue_window(&self, from: &Hash, size: usize, filter: BlockFilter<'_>) -> Vec<Arc<dyn IBlock>>;

    /// Blue blocks merged by `hash` besides its main parent.
    fn blue_diff_anticone(&self, hash: &Hash) -> Vec<Arc<dyn IBlock>>;

    fn mark_invalid(&self, hash: &Hash);
    fn mark_valid(&self, hash: &Hash);

    /// Makes the last insertion durable on the provider side.
    fn commit(&self) -> ChainResult<()> {
        Ok(())
    }
}
