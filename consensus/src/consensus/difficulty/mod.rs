//! Difficulty adjustment
//!
//! Two retarget strategies share one interface. The network's
//! [`DifficultyMode`] picks the strategy once, at engine construction.

pub mod legacy;
pub mod window;
pub mod windowed;

use consensus_core::config::params::{DifficultyMode, Params};
use consensus_core::pow::PowType;
use jio_math::{compact_to_target, narrow_saturating, target_to_compact, widen, U512};
use std::sync::Arc;

use super::dag::{BlockDag, IBlock};

pub use legacy::LegacyDifficulty;
pub use window::{BlockWindow, DifficultyBlock};
pub use windowed::WindowedDifficulty;

pub trait DifficultyManager: Send + Sync {
    /// Loosest difficulty reachable from `bits` after `duration_ms` without
    /// blocks, given the largest move a single retarget may make.
    fn calc_easiest_difficulty(&self, bits: u32, duration_ms: u64, pow_type: PowType) -> u32;

    /// Difficulty a block built on `main_parent` at `new_time_ms` must declare.
    fn required_difficulty(&self, main_parent: &dyn IBlock, new_time_ms: u64, pow_type: PowType) -> u32;

    /// Bits of the nearest block of `pow_type` along the main-parent chain,
    /// `block` included.
    fn current_pow_diff(&self, block: &dyn IBlock, pow_type: PowType) -> u32;
}

pub fn new_difficulty_manager(params: Arc<Params>, dag: Arc<dyn BlockDag>) -> Arc<dyn DifficultyManager> {
    match params.difficulty_mode {
        DifficultyMode::Legacy => Arc::new(LegacyDifficulty::new(params, dag)),
        DifficultyMode::Ghostdag => Arc::new(WindowedDifficulty::new(params, dag)),
    }
}

/// Multiplies the target by the adjustment factor once per elapsed
/// `max_retarget_timespan_ms`, stopping at the pow limit.
pub(crate) fn easiest_difficulty(params: &Params, bits: u32, duration_ms: u64, pow_type: PowType, max_retarget_timespan_ms: u64) -> u32 {
    let limit_bits = params.pow_limit_bits(pow_type);
    if params.reduce_min_difficulty && duration_ms > params.min_diff_reduction_time_ms {
        return limit_bits;
    }
    // a factor of one never loosens the target
    if params.retarget_adjustment_factor <= 1 {
        return bits;
    }
    let limit = widen(params.pow_limit(pow_type));
    let factor = U512::from(params.retarget_adjustment_factor);
    let step = max_retarget_timespan_ms.max(1);

    let mut target = widen(compact_to_target(bits));
    let mut remaining = duration_ms;
    while remaining > 0 && target < limit {
        target *= factor;
        remaining = remaining.saturating_sub(step);
    }
    if target > limit {
        return limit_bits;
    }
    target_to_compact(narrow_saturating(target))
}

/// Walks main parents from `block`, inclusive, to the first block of `pow_type`.
pub(crate) fn last_block_of_pow(dag: &dyn BlockDag, block: &dyn IBlock, pow_type: PowType) -> Option<Arc<dyn IBlock>> {
    let mut cursor = dag.get(&block.hash());
    while let Some(current) = cursor {
        if current.pow_type() == pow_type {
            return Some(current);
        }
        cursor = current.main_parent().and_then(|mp| dag.get(&mp));
    }
    None
}
