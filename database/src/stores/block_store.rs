use crate::cache::LruCache;
use crate::db::CF_BLOCKS;
use crate::{Database, DbResult};
use consensus_core::block::Block;
use consensus_core::Hash;
use std::sync::Arc;

pub struct BlockStore {
    db: Arc<Database>,
    cache: LruCache<Hash, Arc<Block>>,
}

impl BlockStore {
    pub fn new(db: Arc<Database>, cache_size: usize) -> Self {
        Self { db, cache: LruCache::new(cache_size) }
    }

    pub fn put_block(&self, block: &Block) -> DbResult<()> {
        let hash = block.hash();
        let serialized = bincode::serialize(block)?;
        self.db.put(CF_BLOCKS, hash.as_bytes(), &serialized)?;
        self.cache.insert(hash, Arc::new(block.clone()));
        Ok(())
    }

    pub fn get_block(&self, hash: &Hash) -> DbResult<Option<Arc<Block>>> {
        if let Some(b) = self.cache.get(hash) {
            return Ok(Some(b));
        }
        if let Some(data) = self.db.get(CF_BLOCKS, hash.as_bytes())? {
            let block: Arc<Block> = Arc::new(bincode::deserialize(&data)?);
            self.cache.insert(*hash, block.clone());
            Ok(Some(block))
        } else {
            Ok(None)
        }
    }

    pub fn has_block(&self, hash: &Hash) -> DbResult<bool> {
        if self.cache.contains(hash) {
            return Ok(true);
        }
        self.db.exists(CF_BLOCKS, hash.as_bytes())
    }

    pub fn delete_block(&self, hash: &Hash) -> DbResult<()> {
        self.db.delete(CF_BLOCKS, hash.as_bytes())?;
        self.cache.remove(hash);
        Ok(())
    }

    pub fn count(&self) -> DbResult<usize> {
        let mut count = 0usize;
        for item in self.db.iterator(CF_BLOCKS, rocksdb::IteratorMode::Start)? {
            item?;
            count += 1;
        }
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use consensus_core::config::Params;
    use tempfile::TempDir;

    #[test]
    fn test_put_get_delete_block() {
        let tmp = TempDir::new().unwrap();
        let db = Arc::new(Database::open(tmp.path()).unwrap());
        let store = BlockStore::new(db.clone(), 4);
        let genesis = Params::regtest().genesis_block();
        let hash = genesis.hash();

        assert!(!store.has_block(&hash).unwrap());
        store.put_block(&genesis).unwrap();
        assert!(store.has_block(&hash).unwrap());
        assert_eq!(store.count().unwrap(), 1);

        // a fresh store has a cold cache and must read from disk
        let cold = BlockStore::new(db, 4);
        assert_eq!(cold.get_block(&hash).unwrap().as_deref(), Some(&genesis));

        store.delete_block(&hash).unwrap();
        assert!(!store.has_block(&hash).unwrap());
        assert!(store.get_block(&hash).unwrap().is_none());
    }
}
