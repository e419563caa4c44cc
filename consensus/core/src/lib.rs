//! Consensus core types
//!
//! Blocks, transactions, network parameters and the persisted records shared
//! by the storage layer and the chain-state engine.

pub mod block;
pub mod block_state;
pub mod chain_state;
pub mod config;
pub mod constants;
pub mod errors;
pub mod hashing;
pub mod header;
pub mod merkle;
pub mod pow;
pub mod script;
pub mod subsidy;
pub mod token;
pub mod tx;
pub mod utxo;

pub use crypto_hashes::{Hash, ZERO_HASH};
