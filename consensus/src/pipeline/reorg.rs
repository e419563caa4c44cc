//! Ledger reorganization
//!
//! After every DAG insertion the ledger is brought in line with the order the
//! DAG reports. Withdrawn blocks are detached newest first using their spend
//! journals, then newly ordered blocks are attached oldest first. Each block
//! is written in its own batch; the in-flight marker covers the whole pass.
//!
//! A block that fails connect-time validation stays in the DAG marked
//! [`BlockStatus::INVALID`] with no ledger effects, and the pass continues
//! with the next block.

use consensus_core::block::Block;
use consensus_core::block_state::{BlockState, BlockStatus};
use consensus_core::chain_state::BestChainState;
use consensus_core::errors::{ErrorCode, RuleError};
use consensus_core::subsidy::calc_block_subsidy;
use consensus_core::token::TokenState;
use consensus_core::tx::TransactionOutpoint;
use consensus_core::utxo::SpentTxOut;
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::chain::BlockChain;
use super::notifications::Notification;
use crate::consensus::dag::{DagInsertion, IBlock};
use crate::consensus::storage::{count_spent_outputs, UtxoViewpoint};
use crate::consensus::validation::check_coinbase_value;
use crate::errors::{fatal, ChainError, ChainResult};

/// Effects of a block that passed connect-time validation.
struct ConnectedBlock {
    stxos: Vec<SpentTxOut>,
    fees: u64,
    subsidy: u64,
    token_state: TokenState,
}

impl BlockChain {
    /// Applies a DAG insertion to the ledger and returns the resulting
    /// best-chain record.
    pub(crate) fn reorganize(&self, insertion: &DagInsertion) -> ChainResult<BestChainState> {
        let block = &insertion.block;
        let mut batch = self.db.batch();
        self.index.put_index(&mut batch, block.id(), &block.hash())?;
        self.db.commit(batch)?;

        let mut record = self.chain_state.get()?.unwrap_or_default();
        let old_tip = record.tip_hash;
        let reorg = !insertion.old_orders.is_empty();
        if reorg {
            info!("Reorganizing: detaching {} blocks, attaching {}", insertion.old_orders.len(), insertion.new_orders.len());
            self.detach_blocks(&insertion.old_orders, &mut record)?;
            let Some(fork_point) = self.dag.get(&record.tip_hash) else {
                return fatal(format!("fork point {} is not in the dag", record.tip_hash));
            };
            self.bridge.prepare_environment(fork_point.state().side_chain_head)?;
        }

        for node in &insertion.new_orders {
            if node.is_ordered() {
                self.attach_block(node, &mut record)?;
            } else {
                self.stamp_unordered(node.as_ref())?;
            }
        }

        if reorg {
            self.notifications.queue(Notification::Reorganization {
                old_tip,
                new_tip: record.tip_hash,
                detached: insertion.old_orders.len(),
                attached: insertion.new_orders.len(),
            });
        }
        if insertion.main_tip_changed {
            if let Some(indexer) = &self.index_manager {
                indexer.update_main_tip(&record.tip_hash, record.tip_order)?;
            }
        }
        Ok(record)
    }

    fn detach_blocks(&self, withdrawn: &[Arc<dyn IBlock>], record: &mut BestChainState) -> ChainResult<()> {
        for (position, node) in withdrawn.iter().enumerate().rev() {
            let previous = match position {
                0 => {
                    let old_order = node.state().order;
                    let Some(previous_order) = old_order.checked_sub(1) else {
                        return fatal(format!("block {} at order 0 cannot be detached", node.hash()));
                    };
                    match self.dag.get_by_order(previous_order) {
                        Some(previous) => previous,
                        None => return fatal(format!("nothing is ordered before detached block {}", node.hash())),
                    }
                }
                _ => withdrawn[position - 1].clone(),
            };
            self.detach_block(node.as_ref(), previous.as_ref(), record)?;
        }
        Ok(())
    }

    /// Reverts `node`'s effects and moves the record's tip back to
    /// `previous`, the block ordered right before it.
    fn detach_block(&self, node: &dyn IBlock, previous: &dyn IBlock, record: &mut BestChainState) -> ChainResult<()> {
        let hash = node.hash();
        let state = node.state();
        let Some(raw) = self.blocks.get_block(&hash)? else {
            return fatal(format!("detached block {} is not stored", hash));
        };
        let Some(main_parent) = node.main_parent().and_then(|h| self.dag.get(&h)) else {
            return fatal(format!("detached block {} has no main parent", hash));
        };
        let Some(previous_tokens) = self.tokens.get(previous.id())? else {
            return fatal(format!("no token state for block {}", previous.hash()));
        };

        let mut batch = self.db.batch();
        let mut view = UtxoViewpoint::with_viewpoints(vec![hash]);
        let mut stxos = Vec::new();
        if !state.is_invalid() {
            stxos = match self.journal.get(&hash)? {
                Some(stxos) => stxos,
                None => return fatal(format!("spend journal of connected block {} is missing", hash)),
            };
            let expected = count_spent_outputs(&raw);
            if stxos.len() != expected {
                return fatal(format!("spend journal of block {} has {} entries, expected {}", hash, stxos.len(), expected));
            }
            view.fetch_output_utxos(&self.utxos, &raw)?;
            view.disconnect_transactions(&raw, &stxos)?;
            view.write_to(&self.utxos, &mut batch)?;
            self.journal.delete(&mut batch, &hash)?;

            let (Some(total_txns), Some(total_subsidy)) = (
                record.total_txns.checked_sub(raw.transactions.len() as u64),
                record.total_subsidy.checked_sub(state.subsidy),
            ) else {
                return fatal(format!("chain totals underflow while detaching {}", hash));
            };
            record.total_txns = total_txns;
            record.total_subsidy = total_subsidy;
        }
        self.tokens.delete(&mut batch, node.id())?;

        let previous_state = previous.state();
        record.tip_hash = previous.hash();
        record.tip_order = previous_state.order;
        record.bits = previous.bits();
        record.work = previous_state.weight;
        record.token_tip_hash = previous_tokens.hash();

        let detached = BlockState::inherit(node.id(), &main_parent.state());
        self.index.put_state(&mut batch, &hash, &detached)?;
        self.chain_state.put(&mut batch, record)?;
        self.db.commit(batch)?;
        view.commit();

        node.set_state(detached);
        self.dag.mark_valid(&hash);
        if !state.is_invalid() {
            if let Some(indexer) = &self.index_manager {
                indexer.disconnect_block(&raw, &stxos)?;
            }
            self.notifications.queue(Notification::BlockDisconnected { hash });
        }
        debug!("Detached block {} from order {}", hash, state.order);
        Ok(())
    }

    /// Validates and applies an ordered block, or marks it invalid.
    pub(crate) fn attach_block(&self, node: &Arc<dyn IBlock>, record: &mut BestChainState) -> ChainResult<()> {
        let hash = node.hash();
        let order = node.order();
        let Some(raw) = self.blocks.get_block(&hash)? else {
            return fatal(format!("attached block {} is not stored", hash));
        };
        let previous_tokens = match order.checked_sub(1) {
            None => self.token_ledger.genesis_state(),
            Some(previous_order) => {
                let Some(previous) = self.dag.get_by_order(previous_order) else {
                    return fatal(format!("no block at order {}", previous_order));
                };
                match self.tokens.get(previous.id())? {
                    Some(tokens) => tokens,
                    None => return fatal(format!("no token state for block {}", previous.hash())),
                }
            }
        };
        let base = match node.main_parent() {
            Some(mp) => match self.dag.get(&mp) {
                Some(main_parent) => BlockState::inherit(node.id(), &main_parent.state()),
                None => return fatal(format!("main parent {} of {} is not in the dag", mp, hash)),
            },
            None => BlockState::new(node.id()),
        };
        let inherited_weight = base.weight;
        let mut state = BlockState { order, status: BlockStatus::empty(), subsidy: 0, fees: 0, ..base };

        let mut batch = self.db.batch();
        let mut view = UtxoViewpoint::with_viewpoints(vec![hash]);
        let connected = match self.check_connect_block(node.as_ref(), &raw, &mut view, &previous_tokens) {
            Ok(connected) => Some(connected),
            Err(ChainError::Rule(err)) => {
                warn!("Block {} at order {} fails connect-time validation and is marked invalid: {}", hash, order, err);
                None
            }
            Err(err) => return Err(err),
        };

        let mut token_state = match &connected {
            Some(connected) => {
                state.subsidy = connected.subsidy;
                state.fees = connected.fees;
                state.side_chain_head = self.bridge.connect_block(&raw)?;
                view.write_to(&self.utxos, &mut batch)?;
                self.journal.put(&mut batch, &hash, &connected.stxos)?;
                record.total_txns += raw.transactions.len() as u64;
                record.total_subsidy += connected.subsidy;
                connected.token_state.clone()
            }
            None => {
                state.status = BlockStatus::INVALID;
                previous_tokens
            }
        };
        token_state.block_id = node.id();
        self.tokens.put(&mut batch, &token_state)?;

        let merged: u64 = self.dag.blue_diff_anticone(&hash).iter().map(|b| b.state().subsidy).sum();
        state.weight = inherited_weight + state.subsidy + merged;
        record.tip_hash = hash;
        record.tip_order = order;
        record.bits = node.bits();
        record.work = state.weight;
        record.token_tip_hash = token_state.hash();

        self.index.put_state(&mut batch, &hash, &state)?;
        self.chain_state.put(&mut batch, record)?;
        self.db.commit(batch)?;
        view.commit();

        node.set_state(state);
        match connected {
            Some(connected) => {
                self.dag.mark_valid(&hash);
                if let Some(indexer) = &self.index_manager {
                    indexer.connect_block(&raw, &connected.stxos)?;
                }
                self.notifications.queue(Notification::BlockConnected { hash, order });
                debug!("Connected block {} at order {} with {} fees", hash, order, connected.fees);
            }
            None => self.dag.mark_invalid(&hash),
        }
        Ok(())
    }

    /// Connect-time validation on a fresh view. On success the view holds the
    /// block's effects, not yet written.
    fn check_connect_block(
        &self,
        node: &dyn IBlock,
        raw: &Block,
        view: &mut UtxoViewpoint,
        previous_tokens: &TokenState,
    ) -> ChainResult<ConnectedBlock> {
        let hash = raw.hash();

        // A transaction may not overwrite outputs that are still unspent.
        view.fetch_output_utxos(&self.utxos, raw)?;
        for tx in &raw.transactions {
            let id = tx.id();
            let overwrites =
                (0..tx.outputs.len() as u32).any(|i| view.lookup_entry(&TransactionOutpoint::new(id, i)).is_some_and(|e| !e.is_spent()));
            let indexed = self.index_manager.as_ref().is_some_and(|indexer| indexer.is_duplicate_tx(tx));
            if overwrites || indexed {
                return Err(RuleError::new(ErrorCode::DuplicateTx, format!("block {} repeats tx {}", hash, id)).into());
            }
        }

        view.fetch_input_utxos(&self.utxos, raw)?;
        let positions = UtxoViewpoint::positions(raw);
        let mut stxos = Vec::with_capacity(count_spent_outputs(raw));
        let mut fees = 0u64;
        for (index, tx) in raw.transactions.iter().enumerate() {
            let fee = self.tx_validator.check_transaction_inputs(tx, node.blue_score(), view, self.dag.as_ref())?;
            fees = match fees.checked_add(fee.value) {
                Some(total) => total,
                None => return Err(RuleError::new(ErrorCode::BadFees, format!("fees of block {} overflow", hash)).into()),
            };
            view.connect_transaction(tx, index, hash, &positions, fee, Some(&mut stxos))?;
        }

        let subsidy = calc_block_subsidy(&self.params, node.height());
        check_coinbase_value(raw, subsidy, fees)?;
        self.bridge.check_connect_block(raw, view)?;
        let token_state = self.token_ledger.update(previous_tokens, raw, view)?;

        let expected = count_spent_outputs(raw);
        if stxos.len() != expected {
            return fatal(format!("block {} journaled {} spends, expected {}", hash, stxos.len(), expected));
        }
        Ok(ConnectedBlock { stxos, fees, subsidy, token_state })
    }

    /// Stamps a block left outside the order with its main parent's figures.
    pub(crate) fn stamp_unordered(&self, node: &dyn IBlock) -> ChainResult<()> {
        let Some(main_parent) = node.main_parent().and_then(|h| self.dag.get(&h)) else {
            return fatal(format!("unordered block {} has no main parent", node.hash()));
        };
        let state = BlockState::inherit(node.id(), &main_parent.state());
        let mut batch = self.db.batch();
        self.index.put_state(&mut batch, &node.hash(), &state)?;
        self.db.commit(batch)?;
        node.set_state(state);
        debug!("Block {} stays off the ordered history", node.hash());
        Ok(())
    }
}
