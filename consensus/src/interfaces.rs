//! Collaborators the engine drives but does not own
//!
//! Secondary indexes, the side-chain executor, the token ledger and the
//! network clock are injected through these traits.

use consensus_core::block::Block;
use consensus_core::errors::RuleResult;
use consensus_core::token::TokenState;
use consensus_core::tx::{Transaction, TransactionId};
use consensus_core::utxo::SpentTxOut;
use consensus_core::{Hash, ZERO_HASH};

use crate::consensus::storage::UtxoViewpoint;
use crate::errors::ChainResult;

/// Secondary indexes kept in step with connected blocks.
pub trait IndexManager: Send + Sync {
    fn connect_block(&self, block: &Block, stxos: &[SpentTxOut]) -> ChainResult<()>;
    fn disconnect_block(&self, block: &Block, stxos: &[SpentTxOut]) -> ChainResult<()>;
    fn update_main_tip(&self, tip: &Hash, order: u64) -> ChainResult<()>;

    /// Whether `tx` would duplicate a transaction the index already holds
    fn is_duplicate_tx(&self, _tx: &Transaction) -> bool {
        false
    }

    fn has_tx(&self, id: &TransactionId) -> bool;
}

/// Execution environment of the side chain that follows the ordered history.
pub trait SideChainBridge: Send + Sync {
    /// Rewinds or forwards the side chain to `head` before blocks are attached.
    fn prepare_environment(&self, head: Hash) -> ChainResult<()>;
    fn check_connect_block(&self, block: &Block, view: &UtxoViewpoint) -> RuleResult<()>;
    /// Applies the block and returns the new side-chain head.
    fn connect_block(&self, block: &Block) -> ChainResult<Hash>;
    fn current_head(&self) -> Hash;
}

/// Bridge for nodes without a side chain.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopBridge;

impl SideChainBridge for NoopBridge {
    fn prepare_environment(&self, _head: Hash) -> ChainResult<()> {
        Ok(())
    }

    fn check_connect_block(&self, _block: &Block, _view: &UtxoViewpoint) -> RuleResult<()> {
        Ok(())
    }

    fn connect_block(&self, _block: &Block) -> ChainResult<Hash> {
        Ok(ZERO_HASH)
    }

    fn current_head(&self) -> Hash {
        ZERO_HASH
    }
}

/// Derives per-block token supply from the transactions a block connects.
pub trait TokenLedger: Send + Sync {
    fn genesis_state(&self) -> TokenState;

    /// Token state after `block`, given the state of the block ordered before
    /// it and a view holding the outputs the block spent.
    fn update(&self, prev: &TokenState, block: &Block, view: &UtxoViewpoint) -> RuleResult<TokenState>;
}

/// Clock adjusted by the offsets peers report.
pub trait MedianTimeSource: Send + Sync {
    fn adjusted_time_ms(&self) -> u64;
    fn add_time_sample(&self, source: &str, time_ms: u64);
    fn offset_ms(&self) -> i64;
}
