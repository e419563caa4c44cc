use consensus_core::utxo::DecodeError;
use thiserror::Error;

/// Failures of the chain database. None of them is recoverable by retrying
/// the same call.
#[derive(Error, Debug)]
pub enum DbError {
    #[error("rocksdb: {0}")]
    RocksDb(#[from] rocksdb::Error),

    /// A bincode record could not be encoded or decoded
    #[error("record encoding: {0}")]
    Encoding(String),

    /// A UTXO or spend-journal value is not valid VLQ data
    #[error("utxo record: {0}")]
    Decode(#[from] DecodeError),

    #[error("malformed {0}")]
    Malformed(String),

    #[error("column family {0} does not exist")]
    MissingColumnFamily(String),

    #[error("database is closed")]
    DatabaseClosed,
}

pub type DbResult<T> = Result<T, DbError>;

impl From<bincode::Error> for DbError {
    fn from(err: bincode::Error) -> Self {
        DbError::Encoding(err.to_string())
    }
}
