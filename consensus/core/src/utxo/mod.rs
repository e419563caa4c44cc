pub mod compress;
pub mod serialization;
pub mod utxo_entry;
pub mod vlq;

pub use serialization::{DecodeError, UtxoKeyBuf};
pub use utxo_entry::{SpentTxOut, TxoFlags, UtxoEntry};
