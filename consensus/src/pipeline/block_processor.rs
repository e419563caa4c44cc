//! Block admission
//!
//! A submitted block is checked on its own first, under the shared lock. A
//! block with unknown parents goes to the orphan pool; any other block is
//! accepted under the exclusive lock: context checks, DAG insertion, then the
//! ledger follows whatever order the DAG now reports. Orphans waiting on the
//! new block are retried afterwards.

use consensus_core::block::Block;
use consensus_core::errors::{ErrorCode, RuleError, RuleResult};
use consensus_core::rule_err;
use consensus_core::Hash;
use jio_math::compact_to_target;
use std::collections::VecDeque;
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::chain::BlockChain;
use super::notifications::Notification;
use crate::consensus::dag::{BlockNode, IBlock};
use crate::consensus::types::{BehaviorFlags, ProcessOutcome};
use crate::errors::{ChainError, ChainResult};
use crate::process::median_time::unix_now_ms;

enum Precheck {
    Ready,
    MissingParents(Vec<Hash>),
}

impl BlockChain {
    /// Admits `block`. Rule violations reject it and leave no trace; an
    /// error that [`ChainError::is_fatal`] means the stored state can no
    /// longer be trusted.
    pub fn process_block(&self, block: Arc<Block>, flags: BehaviorFlags) -> ChainResult<ProcessOutcome> {
        let hash = block.hash();
        let precheck = {
            let _guard = self.chain_lock.read();
            self.precheck_block(&block, flags)?
        };
        if let Precheck::MissingParents(missing) = precheck {
            info!("Adding orphan block {} with {} missing parents", hash, missing.len());
            self.orphans.lock().add(block, unix_now_ms());
            return Ok(ProcessOutcome { block: None, is_orphan: true });
        }

        let node = {
            let _guard = self.chain_lock.write();
            self.accept_block(block, flags)?
        };
        self.process_orphans(hash, flags)?;
        Ok(ProcessOutcome { block: Some(node), is_orphan: false })
    }

    fn precheck_block(&self, block: &Block, flags: BehaviorFlags) -> ChainResult<Precheck> {
        let hash = block.hash();
        if self.dag.has(&hash) {
            return Err(RuleError::new(ErrorCode::DuplicateBlock, format!("already have block {}", hash)).into());
        }
        if self.orphans.lock().contains(&hash) {
            return Err(RuleError::new(ErrorCode::DuplicateBlock, format!("already have block {} as an orphan", hash)).into());
        }

        self.block_validator.check_block_sanity(block, flags, self.time_source.adjusted_time_ms())?;
        self.check_against_checkpoint(block, flags)?;

        let missing: Vec<Hash> = block.parents().iter().filter(|p| !self.dag.has(p)).copied().collect();
        if missing.is_empty() {
            Ok(Precheck::Ready)
        } else {
            Ok(Precheck::MissingParents(missing))
        }
    }

    /// The newest checkpoint that is part of the ordered history.
    fn latest_known_checkpoint(&self) -> Option<Arc<dyn IBlock>> {
        self.params.checkpoints.iter().rev().filter_map(|c| self.dag.get(&c.hash)).find(|b| b.is_ordered())
    }

    fn check_against_checkpoint(&self, block: &Block, flags: BehaviorFlags) -> RuleResult<()> {
        let Some(checkpoint) = self.latest_known_checkpoint() else {
            return Ok(());
        };
        let header = &block.header;
        if header.timestamp < checkpoint.timestamp() {
            return rule_err!(
                CheckpointTimeTooOld,
                "block {} has timestamp {} before checkpoint {} at {}",
                block.hash(),
                header.timestamp,
                checkpoint.hash(),
                checkpoint.timestamp()
            );
        }
        if flags.contains(BehaviorFlags::FAST_ADD) {
            return Ok(());
        }

        // Difficulty can only have dropped so far since the checkpoint.
        let elapsed = header.timestamp - checkpoint.timestamp();
        let checkpoint_bits = self.difficulty.current_pow_diff(checkpoint.as_ref(), header.pow_type);
        let easiest = self.difficulty.calc_easiest_difficulty(checkpoint_bits, elapsed, header.pow_type);
        if compact_to_target(header.bits) > compact_to_target(easiest) {
            return rule_err!(
                DifficultyTooLow,
                "block {} declares bits {:#010x}, easier than {:#010x} allowed {} ms after checkpoint {}",
                block.hash(),
                header.bits,
                easiest,
                elapsed,
                checkpoint.hash()
            );
        }
        Ok(())
    }

    /// Runs with the exclusive lock held. Nothing is written before the
    /// context checks pass; once the DAG took the block, any failure is fatal.
    fn accept_block(&self, block: Arc<Block>, flags: BehaviorFlags) -> ChainResult<Arc<dyn IBlock>> {
        let hash = block.hash();
        // another caller may have accepted it between the precheck and the write lock
        if self.dag.has(&hash) {
            return Err(RuleError::new(ErrorCode::DuplicateBlock, format!("already have block {}", hash)).into());
        }
        let Some(main_parent) = self.dag.main_parent_of(block.parents()) else {
            return Err(ChainError::Dag(format!("no main parent among the parents of {}", hash)));
        };
        if !flags.contains(BehaviorFlags::FAST_ADD) {
            self.context_validator.check_block_context(&block, main_parent.as_ref())?;
        }

        self.blocks.put_block(&block)?;
        self.in_flight.set(&hash)?;
        let insertion = match self.dag.insert(&BlockNode::new(block, Some(main_parent.hash()))) {
            Ok(insertion) => insertion,
            Err(err) => {
                // the provider rejected the block before changing anything
                warn!("DAG provider rejected block {}: {}", hash, err);
                self.blocks.delete_block(&hash)?;
                self.in_flight.clear()?;
                return Err(err);
            }
        };
        debug!(
            "Inserted block {} with id {}: {} ordered, {} withdrawn",
            hash,
            insertion.block.id(),
            insertion.new_orders.len(),
            insertion.old_orders.len()
        );
        self.notifications.queue(Notification::BlockAccepted { hash, main_tip_changed: insertion.main_tip_changed });

        let result = self.reorganize(&insertion).and_then(|record| {
            self.dag.commit()?;
            self.in_flight.clear()?;
            self.publish_best_state(&record)
        });
        if let Err(err) = result {
            self.notifications.discard();
            return Err(err.escalate());
        }
        self.notifications.flush();

        let best = self.best_snapshot();
        info!(
            "Accepted block {} (order {}, blue score {}); main tip {} at order {}",
            hash,
            insertion.block.order(),
            insertion.block.blue_score(),
            best.hash,
            best.order
        );
        Ok(insertion.block)
    }

    /// Accepts every orphan that became connectable, breadth first from
    /// `parent`. An orphan that fails is dropped and does not stop the rest.
    fn process_orphans(&self, parent: Hash, flags: BehaviorFlags) -> ChainResult<()> {
        let mut queue = VecDeque::from([parent]);
        while let Some(accepted) = queue.pop_front() {
            let children = self.orphans.lock().children_of(&accepted);
            for orphan in children {
                let hash = orphan.hash();
                if orphan.parents().iter().any(|p| !self.dag.has(p)) {
                    continue;
                }
                self.orphans.lock().remove(&hash);
                let result = {
                    let _guard = self.chain_lock.write();
                    self.accept_block(orphan, flags)
                };
                match result {
                    Ok(_) => queue.push_back(hash),
                    Err(err) if err.is_fatal() => return Err(err),
                    Err(err) => warn!("Dropping orphan {}: {}", hash, err),
                }
            }
        }
        Ok(())
    }
}
