//! Block sanity checks
//!
//! Everything here depends only on the block itself and the network
//! parameters, so it runs before the block touches any shared state.

use consensus_core::block::Block;
use consensus_core::config::params::Params;
use consensus_core::constants::BLOCK_VERSION;
use consensus_core::errors::RuleResult;
use consensus_core::rule_err;
use consensus_core::tx::COINBASE_TRANSACTION_INDEX;
use jio_math::compact_to_target;
use std::collections::HashSet;
use std::sync::Arc;

use super::transaction_validator::check_transaction_sanity;
use crate::consensus::types::BehaviorFlags;

pub struct BlockValidator {
    params: Arc<Params>,
}

impl BlockValidator {
    pub fn new(params: Arc<Params>) -> Self {
        Self { params }
    }

    /// Runs every context-free check against `block`. `adjusted_time_ms` is
    /// the network-adjusted clock used to bound future timestamps.
    pub fn check_block_sanity(&self, block: &Block, flags: BehaviorFlags, adjusted_time_ms: u64) -> RuleResult<()> {
        self.check_header_sanity(block, flags, adjusted_time_ms)?;
        self.check_transactions(block)?;

        let size = block.serialized_size();
        if size > self.params.max_block_size {
            return rule_err!(BlockTooBig, "block {} is {} bytes, above {}", block.hash(), size, self.params.max_block_size);
        }
        let root = block.calc_tx_root();
        if root != block.header.tx_root {
            return rule_err!(BadMerkleRoot, "block {} commits to tx root {} but has {}", block.hash(), block.header.tx_root, root);
        }
        Ok(())
    }

    fn check_header_sanity(&self, block: &Block, flags: BehaviorFlags, adjusted_time_ms: u64) -> RuleResult<()> {
        let header = &block.header;
        if header.version < BLOCK_VERSION {
            return rule_err!(BlockVersionTooOld, "block version {} is below {}", header.version, BLOCK_VERSION);
        }

        if header.parents.is_empty() {
            return rule_err!(NoParents, "block {} has no parents", block.hash());
        }
        if header.parents.len() > self.params.max_block_parents {
            return rule_err!(TooManyParents, "block {} has {} parents, at most {}", block.hash(), header.parents.len(), self.params.max_block_parents);
        }
        let mut seen = HashSet::with_capacity(header.parents.len());
        if let Some(parent) = header.parents.iter().find(|p| !seen.insert(**p)) {
            return rule_err!(DuplicateParent, "block {} lists parent {} twice", block.hash(), parent);
        }

        let target = compact_to_target(header.bits);
        if target.is_zero() || target > self.params.pow_limit(header.pow_type) {
            return rule_err!(UnexpectedDifficulty, "bits {:#010x} are outside the {} range", header.bits, header.pow_type);
        }
        if !flags.contains(BehaviorFlags::NO_POW_CHECK) && !header.check_pow() {
            return rule_err!(HighHash, "pow hash of block {} is above its target", block.hash());
        }

        let latest = adjusted_time_ms.saturating_add(self.params.max_time_offset_ms);
        if header.timestamp > latest {
            return rule_err!(TimeTooNew, "block timestamp {} is after {}", header.timestamp, latest);
        }
        Ok(())
    }

    fn check_transactions(&self, block: &Block) -> RuleResult<()> {
        let Some(first) = block.transactions.get(COINBASE_TRANSACTION_INDEX) else {
            return rule_err!(NoTransactions, "block {} has no transactions", block.hash());
        };
        if !first.is_coinbase() {
            return rule_err!(FirstTxNotCoinbase, "first tx of block {} is not a coinbase", block.hash());
        }
        if block.transactions.iter().skip(1).any(|tx| tx.is_coinbase()) {
            return rule_err!(MultipleCoinbases, "block {} has more than one coinbase", block.hash());
        }

        let mut ids = HashSet::with_capacity(block.transactions.len());
        for tx in &block.transactions {
            check_transaction_sanity(tx)?;
            if !ids.insert(tx.id()) {
                return rule_err!(DuplicateTx, "block {} contains tx {} twice", block.hash(), tx.id());
            }
        }
        Ok(())
    }
}
