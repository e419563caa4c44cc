//! Windowed retarget over the blue past
//!
//! The required target is the average target of the last `W` blue blocks of
//! the same algorithm, scaled by the ratio of their observed to expected
//! timespan. Until `W` samples exist every block keeps the initial bits.

use consensus_core::config::params::Params;
use consensus_core::pow::PowType;
use jio_math::{narrow_saturating, target_to_compact, U256, U512};
use std::sync::Arc;
use tracing::trace;

use super::window::{BlockWindow, DifficultyBlock};
use super::{easiest_difficulty, last_block_of_pow, DifficultyManager};
use crate::consensus::dag::{BlockDag, IBlock};

/// Averages the window after dropping its earliest sample and scales it by
/// `max(maxTs - minTs, 1) / target_time_per_block_ms / remaining samples`.
pub fn window_target(mut window: BlockWindow, target_time_per_block_ms: u64) -> Option<U256> {
    let (min_ts, max_ts) = window.min_max_timestamps()?;
    window.remove_earliest();
    let average = window.average_target()?;
    let span = U512::from(max_ts.saturating_sub(min_ts).max(1));
    let scaled = average * span / U512::from(target_time_per_block_ms.max(1)) / U512::from(window.len());
    Some(narrow_saturating(scaled))
}

pub struct WindowedDifficulty {
    params: Arc<Params>,
    dag: Arc<dyn BlockDag>,
}

impl WindowedDifficulty {
    pub fn new(params: Arc<Params>, dag: Arc<dyn BlockDag>) -> Self {
        Self { params, dag }
    }

    /// Blue samples of `pow_type` reachable from `from`, newest first.
    pub fn gather_window(&self, from: &dyn IBlock, pow_type: PowType) -> BlockWindow {
        let filter = |b: &dyn IBlock| b.pow_type() == pow_type;
        let blocks = self.dag.blue_window(&from.hash(), self.params.working_window_size, &filter);
        BlockWindow::new(blocks.iter().map(|b| DifficultyBlock::from_block(b.as_ref())).collect())
    }
}

impl DifficultyManager for WindowedDifficulty {
    fn calc_easiest_difficulty(&self, bits: u32, duration_ms: u64, pow_type: PowType) -> u32 {
        let max_retarget_timespan =
            self.params.target_time_per_block_ms * self.params.working_window_size as u64 * self.params.retarget_adjustment_factor;
        easiest_difficulty(&self.params, bits, duration_ms, pow_type, max_retarget_timespan)
    }

    fn required_difficulty(&self, main_parent: &dyn IBlock, _new_time_ms: u64, pow_type: PowType) -> u32 {
        let initial = self.params.initial_bits(pow_type);
        let window = self.gather_window(main_parent, pow_type);
        if window.len() < 2 || window.len() < self.params.working_window_size {
            trace!("Difficulty window for {} holds {} samples, keeping initial bits", pow_type, window.len());
            return initial;
        }
        let limit = self.params.pow_limit(pow_type);
        match window_target(window, self.params.target_time_per_block_ms) {
            Some(target) if !target.is_zero() && target <= limit => target_to_compact(target),
            _ => self.params.pow_limit_bits(pow_type),
        }
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
    use consensus_core::header::Header;
    use consensus_core::Hash;
    use jio_math::compact_to_target;

    fn samples(count: u64, interval: u64, bits: u32) -> BlockWindow {
        BlockWindow::new(
            (0..count)
                .map(|i| DifficultyBlock {
                    timestamp: 10_000 + i * interval,
                    bits,
                    is_blue: true,
                    blue_work: U256::from(i),
                    hash: Hash::from_u64_word(i + 1),
                })
                .collect(),
        )
    }

    #[test]
    fn test_on_target_window_keeps_bits() {
        for bits in [0x1d00_ffffu32, 0x1b04_04cb, 0x207f_ffff] {
            let target = window_target(samples(20, 1_000, bits), 1_000).unwrap();
            assert_eq!(target_to_compact(target), bits);
        }
    }

    #[test]
    fn test_slow_window_eases_target() {
        let target = window_target(samples(11, 2_000, 0x1d00_ffff), 1_000).unwrap();
        assert_eq!(target, compact_to_target(0x1d00_ffff) * 2);
        let fast = window_target(samples(11, 500, 0x1d00_ffff), 1_000).unwrap();
        assert_eq!(fast, compact_to_target(0x1d00_ffff) / 2);
    }

    fn chain(dag: &MemoryDag, len: u64, interval: u64, bits: u32, pow_type: PowType) -> Arc<dyn IBlock> {
        let mut parents: Vec<Hash> = Vec::new();
        let mut last = None;
        for i in 0..len {
            let header = Header {
                version: 1,
                parents: parents.clone(),
                tx_root: Hash::from_u64_word(i + 1),
                state_root: Hash::default(),
                timestamp: 1_000_000 + i * interval,
                bits,
                pow_type,
                nonce: i,
            };
            let main_parent = dag.main_parent_of(&parents).map(|b| b.hash());
            let inserted = dag.insert(&BlockNode::new(Arc::new(Block::new(header, Vec::new())), main_parent)).unwrap();
            parents = vec![inserted.block.hash()];
            last = Some(inserted.block);
        }
        last.unwrap()
    }

    fn manager(window: usize, dag: Arc<MemoryDag>) -> WindowedDifficulty {
        let mut params = Params::regtest();
        params.working_window_size = window;
        WindowedDifficulty::new(Arc::new(params), dag)
    }

    #[test]
    fn test_bootstrap_returns_initial_bits() {
        let dag = Arc::new(MemoryDag::new(3));
        let tip = chain(&dag, 4, 1_000, 0x1d00_ffff, PowType::Sha256d);
        let manager = manager(5, dag);
        assert_eq!(manager.required_difficulty(tip.as_ref(), 0, PowType::Sha256d), 0x207f_ffff);
        assert_eq!(manager.current_pow_diff(tip.as_ref(), PowType::Sha256d), 0x1d00_ffff);
        assert_eq!(manager.current_pow_diff(tip.as_ref(), PowType::Keccak256), 0x207f_ffff);
    }

    #[test]
    fn test_steady_chain_keeps_bits() {
        let dag = Arc::new(MemoryDag::new(3));
        let tip = chain(&dag, 12, 1_000, 0x1d00_ffff, PowType::Sha256d);
        let manager = manager(5, dag);
        assert_eq!(manager.gather_window(tip.as_ref(), PowType::Sha256d).len(), 5);
        assert_eq!(manager.required_difficulty(tip.as_ref(), 0, PowType::Sha256d), 0x1d00_ffff);
        // no samples of another algorithm
        assert_eq!(manager.required_difficulty(tip.as_ref(), 0, PowType::Blake2bd), 0x207f_ffff);
    }

    #[test]
    fn test_competing_tips_gather_blue_windows() {
        let dag = Arc::new(MemoryDag::new(3));
        let tip = chain(&dag, 6, 1_000, 0x1d00_ffff, PowType::Sha256d);
        let fork = tip.main_parent().unwrap();
        let header = Header {
            version: 1,
            parents: vec![fork],
            tx_root: Hash::from_u64_word(99),
            state_root: Hash::default(),
            timestamp: tip.timestamp(),
            bits: 0x1d00_ffff,
            pow_type: PowType::Sha256d,
            nonce: 99,
        };
        let sibling = dag.insert(&BlockNode::new(Arc::new(Block::new(header, Vec::new())), Some(fork))).unwrap().block;

        // only one of the two siblings is blue from the main tip's view
        let manager = manager(4, dag);
        for from in [&tip, &sibling] {
            let window = manager.gather_window(from.as_ref(), PowType::Sha256d);
            assert_eq!(window.len(), 4);
            assert_eq!(window.blocks()[0].hash, from.hash());
            assert!(window.blocks().iter().all(|b| b.is_blue));
        }
    }

    #[test]
    fn test_slow_chain_clamps_to_limit() {
        let dag = Arc::new(MemoryDag::new(3));
        let tip = chain(&dag, 8, 5_000, 0x207f_ffff, PowType::Sha256d);
        let manager = manager(5, dag);
        assert_eq!(manager.required_difficulty(tip.as_ref(), 0, PowType::Sha256d), 0x207f_ffff);
    }
}
