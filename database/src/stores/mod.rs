pub mod block_index_store;
pub mod block_store;
pub mod chain_state_store;
pub mod spend_journal_store;
pub mod token_store;
pub mod utxo_store;

pub use block_index_store::BlockIndexStore;
pub use block_store::BlockStore;
pub use chain_state_store::ChainStateStore;
pub use spend_journal_store::SpendJournalStore;
pub use token_store::TokenStore;
pub use utxo_store::UtxoStore;
