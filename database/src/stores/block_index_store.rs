use crate::db::{CF_BLOCK_INDEX, CF_BLOCK_STATES};
use crate::{Database, DbError, DbResult, StoreBatch};
use consensus_core::block_state::BlockState;
use consensus_core::Hash;
use std::sync::Arc;

/// Insertion order of DAG blocks and the engine state kept for each of them.
/// Together with the raw blocks this is enough to rebuild the in-memory DAG.
pub struct BlockIndexStore {
    db: Arc<Database>,
}

impl BlockIndexStore {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    pub fn put_index(&self, batch: &mut StoreBatch<'_>, id: u64, hash: &Hash) -> DbResult<()> {
        batch.put(CF_BLOCK_INDEX, &id.to_be_bytes(), hash.as_bytes())
    }

    pub fn put_state(&self, batch: &mut StoreBatch<'_>, hash: &Hash, state: &BlockState) -> DbResult<()> {
        batch.put(CF_BLOCK_STATES, hash.as_bytes(), &bincode::serialize(state)?)
    }

    pub fn get_state(&self, hash: &Hash) -> DbResult<Option<BlockState>> {
        match self.db.get(CF_BLOCK_STATES, hash.as_bytes())? {
            Some(bytes) => Ok(Some(bincode::deserialize(&bytes)?)),
            None => Ok(None),
        }
    }

    /// All indexed blocks in insertion order.
    pub fn hashes_by_id(&self) -> DbResult<Vec<(u64, Hash)>> {
        let mut out = Vec::new();
        for item in self.db.iterator(CF_BLOCK_INDEX, rocksdb::IteratorMode::Start)? {
            let (key, value) = item?;
            let id_bytes: [u8; 8] =
                key.as_ref().try_into().map_err(|_| DbError::Malformed(format!("block index key of {} bytes", key.len())))?;
            let hash = Hash::try_from_slice(&value)
                .map_err(|_| DbError::Malformed(format!("block index value of {} bytes", value.len())))?;
            out.push((u64::from_be_bytes(id_bytes), hash));
        }
        Ok(out)
    }

    pub fn len(&self) -> DbResult<usize> {
        let mut count = 0usize;
        for item in self.db.iterator(CF_BLOCK_INDEX, rocksdb::IteratorMode::Start)? {
            item?;
            count += 1;
        }
        Ok(count)
    }

    pub fn is_empty(&self) -> DbResult<bool> {
        Ok(self.len()? == 0)
    }
}
