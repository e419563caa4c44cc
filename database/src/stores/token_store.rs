use crate::db::CF_TOKEN_STATE;
use crate::{Database, DbResult, StoreBatch};
use consensus_core::token::TokenState;
use std::sync::Arc;

/// Token supplies keyed by the DAG id of the block that produced them.
pub struct TokenStore {
    db: Arc<Database>,
}

impl TokenStore {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    pub fn get(&self, block_id: u64) -> DbResult<Option<TokenState>> {
        match self.db.get(CF_TOKEN_STATE, &block_id.to_be_bytes())? {
            Some(bytes) => Ok(Some(bincode::deserialize(&bytes)?)),
            None => Ok(None),
        }
    }

    pub fn put(&self, batch: &mut StoreBatch<'_>, state: &TokenState) -> DbResult<()> {
        batch.put(CF_TOKEN_STATE, &state.block_id.to_be_bytes(), &bincode::serialize(state)?)
    }

    pub fn delete(&self, batch: &mut StoreBatch<'_>, block_id: u64) -> DbResult<()> {
        batch.delete(CF_TOKEN_STATE, &block_id.to_be_bytes())
    }

    pub fn clear(&self) -> DbResult<usize> {
        self.db.clear(CF_TOKEN_STATE)
    }
}
