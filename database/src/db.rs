use crate::errors::{DbError, DbResult};
use parking_lot::RwLock;
use rocksdb::{ColumnFamilyDescriptor, IteratorMode, Options, WriteBatch, DB};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

/// Raw blocks by hash
pub const CF_BLOCKS: &str = "blocks";
/// DAG insertion id (big endian) to block hash
pub const CF_BLOCK_INDEX: &str = "block_index";
/// Engine state of every DAG block by hash
pub const CF_BLOCK_STATES: &str = "block_states";
pub const CF_UTXOS: &str = "utxos";
pub const CF_SPEND_JOURNAL: &str = "spend_journal";
pub const CF_CHAIN_STATE: &str = "chain_state";
/// Token supplies by DAG block id (big endian)
pub const CF_TOKEN_STATE: &str = "token_state";

pub const ALL_COLUMN_FAMILIES: [&str; 7] =
    [CF_BLOCKS, CF_BLOCK_INDEX, CF_BLOCK_STATES, CF_UTXOS, CF_SPEND_JOURNAL, CF_CHAIN_STATE, CF_TOKEN_STATE];

pub struct Database {
    db: Arc<DB>,
    is_closed: Arc<RwLock<bool>>,
}

impl Database {
    pub fn open<P: AsRef<Path>>(path: P) -> DbResult<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);
        opts.set_max_open_files(10000);
        opts.set_keep_log_file_num(10);
        opts.set_max_background_jobs(4);
        opts.set_bytes_per_sync(1048576);
        opts.increase_parallelism(4);
        opts.set_compression_type(rocksdb::DBCompressionType::Lz4);
        opts.set_write_buffer_size(64 * 1024 * 1024);
        opts.set_max_write_buffer_number(3);

        let cf_descriptors: Vec<_> =
            ALL_COLUMN_FAMILIES.iter().map(|name| ColumnFamilyDescriptor::new(*name, Options::default())).collect();

        let db = DB::open_cf_descriptors(&opts, path.as_ref(), cf_descriptors)?;
        info!("Opened chain database at {}", path.as_ref().display());
        Ok(Self { db: Arc::new(db), is_closed: Arc::new(RwLock::new(false)) })
    }

    fn check_closed(&self) -> DbResult<()> {
        if *self.is_closed.read() {
            return Err(DbError::DatabaseClosed);
        }
        Ok(())
    }

    fn get_cf_handle(&self, cf_name: &str) -> DbResult<&rocksdb::ColumnFamily> {
        self.db.cf_handle(cf_name).ok_or_else(|| DbError::MissingColumnFamily(cf_name.to_string()))
    }

    pub fn put(&self, cf_name: &str, key: &[u8], value: &[u8]) -> DbResult<()> {
        self.check_closed()?;
        let cf = self.get_cf_handle(cf_name)?;
        self.db.put_cf(cf, key, value)?;
        Ok(())
    }

    pub fn get(&self, cf_name: &str, key: &[u8]) -> DbResult<Option<Vec<u8>>> {
        self.check_closed()?;
        let cf = self.get_cf_handle(cf_name)?;
        Ok(self.db.get_cf(cf, key)?)
    }

    pub fn delete(&self, cf_name: &str, key: &[u8]) -> DbResult<()> {
        self.check_closed()?;
        let cf = self.get_cf_handle(cf_name)?;
        self.db.delete_cf(cf, key)?;
        Ok(())
    }

    pub fn exists(&self, cf_name: &str, key: &[u8]) -> DbResult<bool> {
        self.check_closed()?;
        let cf = self.get_cf_handle(cf_name)?;
        Ok(self.db.get_pinned_cf(cf, key)?.is_some())
    }

    /// Starts an atomic batch. Nothing is visible until [`Database::commit`].
    pub fn batch(&self) -> StoreBatch<'_> {
        StoreBatch { db: self, inner: WriteBatch::default() }
    }

    pub fn commit(&self, batch: StoreBatch<'_>) -> DbResult<()> {
        self.check_closed()?;
        let count = batch.inner.len();
        self.db.write(batch.inner)?;
        debug!("Committed write batch of {} operations", count);
        Ok(())
    }

    pub fn iterator(&self, cf_name: &str, mode: IteratorMode) -> DbResult<rocksdb::DBIteratorWithThreadMode<'_, DB>> {
        self.check_closed()?;
        let cf = self.get_cf_handle(cf_name)?;
        Ok(self.db.iterator_cf(cf, mode))
    }

    /// Deletes every key of a column family in one batch.
    pub fn clear(&self, cf_name: &str) -> DbResult<usize> {
        let mut batch = self.batch();
        let mut removed = 0usize;
        for item in self.iterator(cf_name, IteratorMode::Start)? {
            let (key, _) = item?;
            batch.delete(cf_name, &key)?;
            removed += 1;
        }
        self.commit(batch)?;
        debug!("Cleared {} keys from {}", removed, cf_name);
        Ok(removed)
    }

    pub fn close(&self) {
        *self.is_closed.write() = true;
    }
}

impl Clone for Database {
    fn clone(&self) -> Self {
        Self { db: self.db.clone(), is_closed: self.is_closed.clone() }
    }
}

/// A write batch addressed by column family name.
pub struct StoreBatch<'a> {
    db: &'a Database,
    inner: WriteBatch,
}

impl StoreBatch<'_> {
    pub fn put(&mut self, cf_name: &str, key: &[u8], value: &[u8]) -> DbResult<()> {
        let cf = self.db.get_cf_handle(cf_name)?;
        self.inner.put_cf(cf, key, value);
        Ok(())
    }

    pub fn delete(&mut self, cf_name: &str, key: &[u8]) -> DbResult<()> {
        let cf = self.db.get_cf_handle(cf_name)?;
        self.inner.delete_cf(cf, key);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}
