//! Chain-state engine of a BlockDAG node
//!
//! Admits blocks into a GHOSTDAG-ordered DAG and keeps the UTXO set, spend
//! journals, token supplies and the best-chain record consistent with the
//! order the DAG reports, across reorganizations and restarts.

pub mod config;
pub mod consensus;
pub mod errors;
pub mod interfaces;
pub mod pipeline;
pub mod process;

pub use config::ChainConfig;
pub use consensus::dag::{BlockDag, IBlock, MemoryDag};
pub use consensus::types::{BehaviorFlags, BestState, GraphState, ProcessOutcome};
pub use consensus_core::Hash;
pub use errors::{ChainError, ChainResult};
pub use interfaces::{IndexManager, MedianTimeSource, NoopBridge, SideChainBridge, TokenLedger};
pub use pipeline::{BlockChain, ChainWorker, Collaborators, Notification};
