//! Block and transaction validation
//!
//! Sanity checks need only the block, context checks need its main parent,
//! and input checks need a UTXO viewpoint of the block's past.

pub mod block_validator;
pub mod contextual;
pub mod transaction_validator;

pub use block_validator::BlockValidator;
pub use contextual::{check_coinbase_value, ContextualValidator};
pub use transaction_validator::{check_transaction_sanity, is_finalized, TransactionValidator};
