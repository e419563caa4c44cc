use crate::db::CF_UTXOS;
use crate::{Database, DbResult, StoreBatch};
use consensus_core::tx::TransactionOutpoint;
use consensus_core::utxo::serialization::{deserialize_utxo_entry, outpoint_from_key, serialize_utxo_entry};
use consensus_core::utxo::{UtxoEntry, UtxoKeyBuf};
use std::sync::Arc;

/// The persisted set of unspent outputs. Only unspent entries are stored;
/// spending an output deletes its key.
pub struct UtxoStore {
    db: Arc<Database>,
}

impl UtxoStore {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    pub fn get_entry(&self, keys: &mut UtxoKeyBuf, outpoint: &TransactionOutpoint) -> DbResult<Option<UtxoEntry>> {
        match self.db.get(CF_UTXOS, keys.key(outpoint))? {
            Some(data) => Ok(Some(deserialize_utxo_entry(&data)?)),
            None => Ok(None),
        }
    }

    pub fn put_entry(
        &self,
        batch: &mut StoreBatch<'_>,
        keys: &mut UtxoKeyBuf,
        outpoint: &TransactionOutpoint,
        entry: &UtxoEntry,
    ) -> DbResult<()> {
        batch.put(CF_UTXOS, keys.key(outpoint), &serialize_utxo_entry(entry))
    }

    pub fn delete_entry(&self, batch: &mut StoreBatch<'_>, keys: &mut UtxoKeyBuf, outpoint: &TransactionOutpoint) -> DbResult<()> {
        batch.delete(CF_UTXOS, keys.key(outpoint))
    }

    /// Every stored entry in key order
    pub fn iter_entries(&self) -> DbResult<Vec<(TransactionOutpoint, UtxoEntry)>> {
        let mut entries = Vec::new();
        for item in self.db.iterator(CF_UTXOS, rocksdb::IteratorMode::Start)? {
            let (key, value) = item?;
            entries.push((outpoint_from_key(&key)?, deserialize_utxo_entry(&value)?));
        }
        Ok(entries)
    }

    pub fn count(&self) -> DbResult<usize> {
        let mut count = 0usize;
        for item in self.db.iterator(CF_UTXOS, rocksdb::IteratorMode::Start)? {
            item?;
            count += 1;
        }
        Ok(count)
    }

    pub fn clear(&self) -> DbResult<usize> {
        self.db.clear(CF_UTXOS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use consensus_core::tx::Amount;
    use consensus_core::Hash;
    use tempfile::TempDir;

    #[test]
    fn test_entries_roundtrip_through_batches() {
        let tmp = TempDir::new().unwrap();
        let db = Arc::new(Database::open(tmp.path()).unwrap());
        let store = UtxoStore::new(db.clone());
        let mut keys = UtxoKeyBuf::new();

        let a = TransactionOutpoint::new(Hash::from_u64_word(1), 0);
        let b = TransactionOutpoint::new(Hash::from_u64_word(1), 1);
        let entry = UtxoEntry::new(Amount::base(50), vec![0x51], Hash::from_u64_word(9), true);
        let token = UtxoEntry::new(Amount::new(70, 3), vec![0x51], Hash::from_u64_word(9), false);

        let mut batch = db.batch();
        store.put_entry(&mut batch, &mut keys, &a, &entry).unwrap();
        store.put_entry(&mut batch, &mut keys, &b, &token).unwrap();
        db.commit(batch).unwrap();

        assert_eq!(store.get_entry(&mut keys, &a).unwrap(), Some(entry));
        assert_eq!(store.count().unwrap(), 2);
        let dumped: Vec<TransactionOutpoint> = store.iter_entries().unwrap().into_iter().map(|(o, _)| o).collect();
        assert_eq!(dumped, vec![a, b]);

        let mut batch = db.batch();
        store.delete_entry(&mut batch, &mut keys, &a).unwrap();
        db.commit(batch).unwrap();
        assert_eq!(store.get_entry(&mut keys, &a).unwrap(), None);
        assert_eq!(store.clear().unwrap(), 1);
    }
}
