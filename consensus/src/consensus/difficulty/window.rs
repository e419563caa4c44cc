//! Difficulty window
//!
//! A snapshot of the blue blocks the windowed retarget averages over. The
//! window is gathered once per calculation from the DAG provider and never
//! mutated afterwards except for dropping its oldest sample.

use consensus_core::Hash;
use jio_math::{compact_to_target, widen, U256, U512};

use crate::consensus::dag::IBlock;

/// One retarget sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DifficultyBlock {
    pub timestamp: u64,
    pub bits: u32,
    /// Informational; the ordering uses blue work, not membership.
    pub is_blue: bool,
    pub blue_work: U256,
    pub hash: Hash,
}

impl DifficultyBlock {
    /// A sample taken from a blue window, so always blue in that window's view.
    pub fn from_block(block: &dyn IBlock) -> Self {
        Self {
            timestamp: block.timestamp(),
            bits: block.bits(),
            is_blue: true,
            blue_work: block.blue_work(),
            hash: block.hash(),
        }
    }

    /// Equal timestamps are ordered by blue work, then by hash, so the
    /// extremes of a window are unique.
    fn sort_key(&self) -> (u64, U256, Hash) {
        (self.timestamp, self.blue_work, self.hash)
    }
}

#[derive(Debug, Clone, Default)]
pub struct BlockWindow {
    blocks: Vec<DifficultyBlock>,
}

impl BlockWindow {
    pub fn new(blocks: Vec<DifficultyBlock>) -> Self {
        Self { blocks }
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    pub fn blocks(&self) -> &[DifficultyBlock] {
        &self.blocks
    }

    fn min_index(&self) -> Option<usize> {
        self.blocks.iter().enumerate().min_by_key(|(_, b)| b.sort_key()).map(|(i, _)| i)
    }

    /// Timestamps of the earliest and the latest sample.
    pub fn min_max_timestamps(&self) -> Option<(u64, u64)> {
        let min = self.blocks.iter().min_by_key(|b| b.sort_key())?;
        let max = self.blocks.iter().max_by_key(|b| b.sort_key())?;
        Some((min.timestamp, max.timestamp))
    }

    /// Drops the earliest sample.
    pub fn remove_earliest(&mut self) -> Option<DifficultyBlock> {
        let index = self.min_index()?;
        Some(self.blocks.swap_remove(index))
    }

    /// Elapsed time between the extremes, never below one millisecond.
    pub fn time_span(&self) -> Option<u64> {
        self.min_max_timestamps().map(|(min, max)| max.saturating_sub(min).max(1))
    }

    /// Mean target of the samples, carried in 512 bits.
    pub fn average_target(&self) -> Option<U512> {
        if self.blocks.is_empty() {
            return None;
        }
        let sum = self.blocks.iter().fold(U512::zero(), |acc, b| acc + widen(compact_to_target(b.bits)));
        Some(sum / U512::from(self.blocks.len()))
    }
}
