use consensus_core::chain_state::BestChainState;
use consensus_core::ZERO_HASH;
use tracing::info;

use super::chain::BlockChain;
use crate::errors::{fatal, ChainResult};

impl BlockChain {
    /// Re-derives the UTXO set, spend journals, token states and the
    /// best-chain record by replaying every ordered block from genesis. The
    /// DAG and the stored blocks are kept as they are.
    ///
    /// Events raised during the replay are not delivered.
    pub fn rebuild(&self) -> ChainResult<()> {
        let _guard = self.chain_lock.write();
        let Some(tip) = self.dag.main_tip() else {
            return fatal("cannot rebuild without a main tip");
        };
        self.in_flight.set(&tip.hash())?;
        info!("Rebuilding ledger state over {} ordered blocks", tip.order() + 1);

        self.utxos.clear()?;
        self.journal.clear()?;
        self.tokens.clear()?;
        self.chain_state.clear()?;
        self.bridge.prepare_environment(ZERO_HASH)?;

        let mut record = BestChainState::default();
        for order in 0..=tip.order() {
            let Some(node) = self.dag.get_by_order(order) else {
                return fatal(format!("no block at order {} below the main tip", order));
            };
            self.dag.mark_valid(&node.hash());
            self.attach_block(&node, &mut record)?;
        }

        // Ids ascend with insertion, so a main parent is stamped before its children.
        for (_, hash) in self.index.hashes_by_id()? {
            let Some(node) = self.dag.get(&hash) else {
                return fatal(format!("indexed block {} is not in the dag", hash));
            };
            if !node.is_ordered() {
                self.stamp_unordered(node.as_ref())?;
            }
        }

        self.dag.commit()?;
        self.in_flight.clear()?;
        self.notifications.discard();
        self.publish_best_state(&record)?;
        info!("Rebuilt ledger state up to {} at order {}", record.tip_hash, record.tip_order);
        Ok(())
    }
}
