use crate::db::CF_CHAIN_STATE;
use crate::{Database, DbResult, StoreBatch};
use consensus_core::chain_state::BestChainState;
use std::sync::Arc;

const BEST_CHAIN_STATE_KEY: &[u8] = b"best-chain-state";

pub struct ChainStateStore {
    db: Arc<Database>,
}

impl ChainStateStore {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    pub fn get(&self) -> DbResult<Option<BestChainState>> {
        match self.db.get(CF_CHAIN_STATE, BEST_CHAIN_STATE_KEY)? {
            Some(bytes) => Ok(Some(bincode::deserialize(&bytes)?)),
            None => Ok(None),
        }
    }

    pub fn put(&self, batch: &mut StoreBatch<'_>, state: &BestChainState) -> DbResult<()> {
        batch.put(CF_CHAIN_STATE, BEST_CHAIN_STATE_KEY, &bincode::serialize(state)?)
    }

    pub fn clear(&self) -> DbResult<usize> {
        self.db.clear(CF_CHAIN_STATE)
    }
}
