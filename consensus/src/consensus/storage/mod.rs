//! In-memory views over the persisted chain state

pub mod utxo_viewpoint;

pub use utxo_viewpoint::{count_spent_outputs, UtxoViewpoint};
