//! Past median time along the main chain

use std::sync::Arc;

use crate::consensus::dag::{BlockDag, IBlock};

/// Median of the last `median_time_span` timestamps on the main-parent chain
/// ending at a block.
pub struct PastMedianTimeManager {
    median_time_span: usize,
    dag: Arc<dyn BlockDag>,
}

impl PastMedianTimeManager {
    pub fn new(median_time_span: usize, dag: Arc<dyn BlockDag>) -> Self {
        Self { median_time_span: median_time_span.max(1), dag }
    }

    /// Timestamps of `block` and its main-chain ancestors, newest first.
    fn past_timestamps(&self, block: &dyn IBlock) -> Vec<u64> {
        let mut timestamps = Vec::with_capacity(self.median_time_span);
        timestamps.push(block.timestamp());
        let mut cursor = block.main_parent().and_then(|h| self.dag.get(&h));
        while let Some(current) = cursor {
            if timestamps.len() >= self.median_time_span {
                break;
            }
            timestamps.push(current.timestamp());
            cursor = current.main_parent().and_then(|h| self.dag.get(&h));
        }
        timestamps
    }

    pub fn calc_past_median_time(&self, block: &dyn IBlock) -> u64 {
        let mut timestamps = self.past_timestamps(block);
        timestamps.sort_unstable();
        timestamps[timestamps.len() / 2]
    }
}
