use crate::db::CF_SPEND_JOURNAL;
use crate::{Database, DbResult, StoreBatch};
use consensus_core::utxo::serialization::{deserialize_spend_journal, serialize_spend_journal};
use consensus_core::utxo::SpentTxOut;
use consensus_core::Hash;
use std::sync::Arc;

/// Per-block record of the outputs a block spent, in spend order.
pub struct SpendJournalStore {
    db: Arc<Database>,
}

impl SpendJournalStore {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    pub fn get(&self, block_hash: &Hash) -> DbResult<Option<Vec<SpentTxOut>>> {
        match self.db.get(CF_SPEND_JOURNAL, block_hash.as_bytes())? {
            Some(data) => Ok(Some(deserialize_spend_journal(&data)?)),
            None => Ok(None),
        }
    }

    pub fn put(&self, batch: &mut StoreBatch<'_>, block_hash: &Hash, stxos: &[SpentTxOut]) -> DbResult<()> {
        batch.put(CF_SPEND_JOURNAL, block_hash.as_bytes(), &serialize_spend_journal(stxos))
    }

    pub fn delete(&self, batch: &mut StoreBatch<'_>, block_hash: &Hash) -> DbResult<()> {
        batch.delete(CF_SPEND_JOURNAL, block_hash.as_bytes())
    }

    pub fn clear(&self) -> DbResult<usize> {
        self.db.clear(CF_SPEND_JOURNAL)
    }
}
