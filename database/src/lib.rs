pub mod cache;
pub mod db;
pub mod errors;
pub mod stores;

pub use db::{Database, StoreBatch};
pub use errors::{DbError, DbResult};
