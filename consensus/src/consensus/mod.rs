//! Chain-state building blocks
//!
//! The DAG seam and its in-memory provider, the difficulty managers, UTXO
//! viewpoints and block validation. The pipeline composes these into the
//! chain-state engine.

pub mod dag;
pub mod difficulty;
pub mod storage;
pub mod types;
pub mod validation;

pub use dag::{BlockDag, BlockNode, DagInsertion, IBlock, MemoryDag};
pub use difficulty::{new_difficulty_manager, DifficultyManager};
pub use storage::UtxoViewpoint;
pub use types::{BehaviorFlags, BestState, GraphState, ProcessOutcome};
pub use validation::{BlockValidator, ContextualValidator, TransactionValidator};
