//! Context checks
//!
//! Rules that depend on where a block attaches: its main parent's median
//! time, the required difficulty, checkpoints and transaction finality.

use consensus_core::block::Block;
use consensus_core::config::params::Params;
use consensus_core::errors::RuleResult;
use consensus_core::rule_err;
use consensus_core::tx::BASE_COIN;
use std::sync::Arc;

use super::transaction_validator::is_finalized;
use crate::consensus::dag::IBlock;
use crate::consensus::difficulty::DifficultyManager;
use crate::process::past_median_time::PastMedianTimeManager;

pub struct ContextualValidator {
    params: Arc<Params>,
    difficulty: Arc<dyn DifficultyManager>,
    median_time: Arc<PastMedianTimeManager>,
}

impl ContextualValidator {
    pub fn new(params: Arc<Params>, difficulty: Arc<dyn DifficultyManager>, median_time: Arc<PastMedianTimeManager>) -> Self {
        Self { params, difficulty, median_time }
    }

    pub fn check_block_context(&self, block: &Block, main_parent: &dyn IBlock) -> RuleResult<()> {
        let header = &block.header;
        let median_time = self.median_time.calc_past_median_time(main_parent);
        if header.timestamp <= median_time {
            return rule_err!(TimeTooOld, "block timestamp {} is not after the past median time {}", header.timestamp, median_time);
        }

        let expected = self.difficulty.required_difficulty(main_parent, header.timestamp, header.pow_type);
        if header.bits != expected {
            return rule_err!(
                UnexpectedDifficulty,
                "block {} declares bits {:#010x}, expected {:#010x}",
                block.hash(),
                header.bits,
                expected
            );
        }

        let height = main_parent.height() + 1;
        if let Some(checkpoint) = self.params.checkpoints.iter().find(|c| c.height == height) {
            if checkpoint.hash != block.hash() {
                return rule_err!(BadCheckpoint, "block {} at height {} does not match checkpoint {}", block.hash(), height, checkpoint.hash);
            }
        }

        for tx in &block.transactions {
            if !is_finalized(tx, height, median_time) {
                return rule_err!(UnfinalizedTx, "tx {} is not final at height {}", tx.id(), height);
            }
        }
        Ok(())
    }
}

/// The coinbase may claim at most the subsidy plus the block's fees.
pub fn check_coinbase_value(block: &Block, subsidy: u64, fees: u64) -> RuleResult<()> {
    let Some(coinbase) = block.transactions.first() else {
        return rule_err!(NoTransactions, "block {} has no coinbase", block.hash());
    };
    let claimed: u128 = coinbase.outputs.iter().filter(|o| o.amount.id == BASE_COIN).map(|o| u128::from(o.amount.value)).sum();
    let allowed = u128::from(subsidy) + u128::from(fees);
    if claimed > allowed {
        return rule_err!(BadCoinbaseValue, "coinbase of block {} claims {} of {} allowed", block.hash(), claimed, allowed);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consensus::dag::{BlockDag, BlockNode, MemoryDag};
    use crate::consensus::difficulty::new_difficulty_manager;
    use consensus_core::config::params::Checkpoint;
    use consensus_core::errors::ErrorCode;
    use consensus_core::header::Header;
    use consensus_core::pow::PowType;
    use consensus_core::script::pay_to_pubkey_hash;
    use consensus_core::tx::{Amount, Transaction, TransactionOutput, TxType};
    use consensus_core::Hash;

    fn block_on(parent: Hash, timestamp: u64, bits: u32, coinbase_value: u64) -> Block {
        let coinbase = Transaction::new(
            TxType::Coinbase,
            Vec::new(),
            vec![TransactionOutput::new(Amount::base(coinbase_value), pay_to_pubkey_hash(&[3; 20]))],
            0,
            timestamp.to_le_bytes().to_vec(),
        );
        let mut block = Block::new(
            Header {
                version: 1,
                parents: vec![parent],
                tx_root: Hash::default(),
                state_root: Hash::default(),
                timestamp,
                bits,
                pow_type: PowType::Sha256d,
                nonce: 0,
            },
            vec![coinbase],
        );
        block.header.tx_root = block.calc_tx_root();
        block
    }

    fn setup(params: Params) -> (Arc<MemoryDag>, ContextualValidator, Arc<dyn IBlock>) {
        let params = Arc::new(params);
        let dag = Arc::new(MemoryDag::new(params.ghostdag_k));
        let genesis = params.genesis_block();
        dag.insert(&BlockNode::new(Arc::new(genesis), None)).unwrap();
        let tip = dag.genesis().unwrap();
        let difficulty = new_difficulty_manager(params.clone(), dag.clone());
        let median = Arc::new(PastMedianTimeManager::new(params.median_time_blocks, dag.clone()));
        (dag, ContextualValidator::new(params, difficulty, median), tip)
    }

    #[test]
    fn test_context_rules() {
        let params = Params::regtest();
        let start = params.genesis_timestamp;
        let (_dag, validator, genesis) = setup(params);

        let good = block_on(genesis.hash(), start + 1_000, 0x207f_ffff, 1);
        assert!(validator.check_block_context(&good, genesis.as_ref()).is_ok());
        let stale = block_on(genesis.hash(), start, 0x207f_ffff, 1);
        assert_eq!(validator.check_block_context(&stale, genesis.as_ref()).unwrap_err().code, ErrorCode::TimeTooOld);
        let wrong_bits = block_on(genesis.hash(), start + 1_000, 0x1f00_ffff, 1);
        assert_eq!(validator.check_block_context(&wrong_bits, genesis.as_ref()).unwrap_err().code, ErrorCode::UnexpectedDifficulty);
    }

    #[test]
    fn test_checkpoint_mismatch() {
        let mut params = Params::regtest();
        params.checkpoints.push(Checkpoint { height: 1, hash: Hash::from_u64_word(42) });
        let start = params.genesis_timestamp;
        let (_dag, validator, genesis) = setup(params);
        let block = block_on(genesis.hash(), start + 1_000, 0x207f_ffff, 1);
        assert_eq!(validator.check_block_context(&block, genesis.as_ref()).unwrap_err().code, ErrorCode::BadCheckpoint);
    }

    #[test]
    fn test_coinbase_value_bound() {
        let block = block_on(Hash::from_u64_word(1), 1, 0x207f_ffff, 150);
        assert!(check_coinbase_value(&block, 100, 50).is_ok());
        assert_eq!(check_coinbase_value(&block, 100, 49).unwrap_err().code, ErrorCode::BadCoinbaseValue);
    }
}
