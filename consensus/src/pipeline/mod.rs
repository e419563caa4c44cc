//! Chain-state engine
//!
//! Block admission, the ledger reorganization it triggers, rebuilds and the
//! worker that serializes them.

pub mod block_processor;
pub mod chain;
pub mod flow;
pub mod in_flight;
pub mod notifications;
pub mod orphan_pool;
pub mod rebuild;
pub mod reorg;


pub use chain::{BlockChain, Collaborators};
pub use flow::ChainWorker;
pub use in_flight::InFlightMarker;
pub use notifications::{Notification, NotificationHub};
pub use orphan_pool::OrphanPool;
