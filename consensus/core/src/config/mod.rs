pub mod genesis;
pub mod params;

pub use params::{Checkpoint, DifficultyMode, NetworkKind, Params, PowConfig};
