//! Periodic retarget along the main chain
//!
//! Every `legacy_blocks_per_retarget` main heights the target of each
//! algorithm is rescaled by the time its own last interval of blocks took.

use consensus_core::config::params::Params;
use consensus_core::pow::PowType;
use jio_math::{compact_to_target, narrow_saturating, target_to_compact, widen, U512};
use std::sync::Arc;
use tracing::debug;

use super::{easiest_difficulty, last_block_of_pow, DifficultyManager};
use crate::consensus::dag::{BlockDag, IBlock};

pub struct LegacyDifficulty {
    params: Arc<Params>,
    dag: Arc<dyn BlockDag>,
}

impl LegacyDifficulty {
    pub fn new(params: Arc<Params>, dag: Arc<dyn BlockDag>) -> Self {
        Self { params, dag }
    }

    fn interval(&self) -> u64 {
        self.params.legacy_blocks_per_retarget.max(1)
    }

    fn previous_of_pow(&self, block: &dyn IBlock, pow_type: PowType) -> Option<Arc<dyn IBlock>> {
        let parent = self.dag.get(&block.main_parent()?)?;
        last_block_of_pow(self.dag.as_ref(), parent.as_ref(), pow_type)
    }

    /// Last bits of `pow_type` that were not a minimum-difficulty exception.
    fn last_regular_bits(&self, from: Arc<dyn IBlock>, pow_type: PowType) -> u32 {
        let limit_bits = self.params.pow_limit_bits(pow_type);
        let mut cursor = from;
        while cursor.bits() == limit_bits && cursor.height() % self.interval() != 0 {
            match self.previous_of_pow(cursor.as_ref(), pow_type) {
                Some(previous) => cursor = previous,
                None => break,
            }
        }
        cursor.bits()
    }

    /// Rescales `last.bits` by the clamped timespan since `first`.
    pub fn retarget(&self, first_timestamp: u64, last_timestamp: u64, last_bits: u32, pow_type: PowType) -> u32 {
        let target_timespan = self.params.target_timespan_ms().max(1);
        let factor = self.params.retarget_adjustment_factor.max(1);
        let actual = last_timestamp.saturating_sub(first_timestamp).clamp(target_timespan / factor, target_timespan * factor);

        let new_target = widen(compact_to_target(last_bits)) * U512::from(actual) / U512::from(target_timespan);
        let limit = widen(self.params.pow_limit(pow_type));
        if new_target > limit || new_target.is_zero() {
            return self.params.pow_limit_bits(pow_type);
        }
        target_to_compact(narrow_saturating(new_target))
    }
}

impl DifficultyManager for LegacyDifficulty {
    fn calc_easiest_difficulty(&self, bits: u32, duration_ms: u64, pow_type: PowType) -> u32 {
        let max_retarget_timespan = self.params.target_timespan_ms() * self.params.retarget_adjustment_factor;
        easiest_difficulty(&self.params, bits, duration_ms, pow_type, max_retarget_timespan)
    }

    fn required_difficulty(&self, main_parent: &dyn IBlock, new_time_ms: u64, pow_type: PowType) -> u32 {
        let Some(last) = last_block_of_pow(self.dag.as_ref(), main_parent, pow_type) else {
            return self.params.initial_bits(pow_type);
        };
        let interval = self.interval();

        if (main_parent.height() + 1) % interval != 0 {
            if self.params.reduce_min_difficulty {
                if new_time_ms > last.timestamp() + self.params.min_diff_reduction_time_ms {
                    return self.params.pow_limit_bits(pow_type);
                }
                return self.last_regular_bits(last, pow_type);
            }
            return last.bits();
        }

        let mut first = last.clone();
        for _ in 1..interval {
            match self.previous_of_pow(first.as_ref(), pow_type) {
                Some(previous) => first = previous,
                None => break,
            }
        }
        let bits = self.retarget(first.timestamp(), last.timestamp(), last.bits(), pow_type);
        debug!("Retarget {} at height {}: {:#010x} -> {:#010x}", pow_type, main_parent.height() + 1, last.bits(), bits);
        bits
    }

    fn current_pow_diff(&self, block: &dyn IBlock, pow_type: PowType) -> u32 {
        last_block_of_pow(self.dag.as_ref(), block, pow_type).map(|b| b.bits()).unwrap_or_else(|| self.params.initial_bits(pow_type))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consensus::dag::{BlockNode, MemoryDag};
    use consensus_core::block::Block;
    use consensus_core::config::params::DifficultyMode;
    use consensus_core::header::Header;
    use consensus_core::Hash;

    fn params() -> Params {
        let mut params = Params::regtest();
        params.difficulty_mode = DifficultyMode::Legacy;
        params.legacy_blocks_per_retarget = 4;
        params
    }

    fn chain(dag: &MemoryDag, timestamps: &[u64], bits: u32) -> Arc<dyn IBlock> {
        let mut parents: Vec<Hash> = Vec::new();
        let mut last = None;
        for (i, ts) in timestamps.iter().enumerate() {
            let header = Header {
                version: 1,
                parents: parents.clone(),
                tx_root: Hash::from_u64_word(i as u64 + 1),
                state_root: Hash::default(),
                timestamp: *ts,
                bits,
                pow_type: PowType::Sha256d,
                nonce: 0,
            };
            let main_parent = dag.main_parent_of(&parents).map(|b| b.hash());
            let inserted = dag.insert(&BlockNode::new(Arc::new(Block::new(header, Vec::new())), main_parent)).unwrap();
            parents = vec![inserted.block.hash()];
            last = Some(inserted.block);
        }
        last.unwrap()
    }

    #[test]
    fn test_no_retarget_between_intervals() {
        let dag = Arc::new(MemoryDag::new(3));
        let tip = chain(&dag, &[0, 1_000, 2_000], 0x1d00_ffff);
        let manager = LegacyDifficulty::new(Arc::new(params()), dag);
        // tip height 2, next height 3
        assert_eq!(manager.required_difficulty(tip.as_ref(), 3_000, PowType::Sha256d), 0x1d00_ffff);
        assert_eq!(manager.required_difficulty(tip.as_ref(), 3_000, PowType::Keccak256), 0x207f_ffff);
    }

    #[test]
    fn test_retarget_at_interval_boundary() {
        let dag = Arc::new(MemoryDag::new(3));
        // four blocks spanning 2 * 4 * 1_000 ms, next height 4
        let tip = chain(&dag, &[0, 2_000, 4_000, 8_000], 0x1d00_ffff);
        let manager = LegacyDifficulty::new(Arc::new(params()), dag);
        let bits = manager.required_difficulty(tip.as_ref(), 9_000, PowType::Sha256d);
        assert_eq!(compact_to_target(bits), compact_to_target(0x1d00_ffff) * 2);
    }

    #[test]
    fn test_retarget_clamps_timespan() {
        let manager = LegacyDifficulty::new(Arc::new(params()), Arc::new(MemoryDag::new(3)));
        let target_timespan = params().target_timespan_ms();
        let fast = manager.retarget(0, 1, 0x1d00_ffff, PowType::Sha256d);
        assert_eq!(compact_to_target(fast), compact_to_target(0x1d00_ffff) / 4);
        let slow = manager.retarget(0, target_timespan * 100, 0x1d00_ffff, PowType::Sha256d);
        assert_eq!(compact_to_target(slow), compact_to_target(0x1d00_ffff) * 4);
    }

    #[test]
    fn test_min_difficulty_exception() {
        let mut params = params();
        params.reduce_min_difficulty = true;
        params.min_diff_reduction_time_ms = 5_000;
        let dag = Arc::new(MemoryDag::new(3));
        let tip = chain(&dag, &[0, 1_000, 2_000], 0x1d00_ffff);
        let manager = LegacyDifficulty::new(Arc::new(params), dag);
        assert_eq!(manager.required_difficulty(tip.as_ref(), 60_000, PowType::Sha256d), 0x207f_ffff);
        assert_eq!(manager.required_difficulty(tip.as_ref(), 3_000, PowType::Sha256d), 0x1d00_ffff);
    }
}
