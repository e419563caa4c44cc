/// Current block version
pub const BLOCK_VERSION: u32 = 1;

/// Current transaction version
pub const TX_VERSION: u32 = 1;

/// Number of atoms (base units) in one coin
pub const ATOMS_PER_COIN: u64 = 100_000_000;

/// Largest amount a single output, or the sum of a transaction's outputs, may carry
pub const MAX_AMOUNT: u64 = 21_000_000 * ATOMS_PER_COIN;

/// Order sentinel carried by blocks the DAG has not placed yet
pub const MAX_BLOCK_ORDER: u64 = u64::MAX;

/// Lock times below this value are interpreted as main heights, above it as
/// unix seconds
pub const LOCK_TIME_THRESHOLD: u64 = 500_000_000;

/// Sequence value that opts an input out of lock-time enforcement
pub const MAX_TX_IN_SEQUENCE: u32 = u32::MAX;

/// Largest script accepted as spendable
pub const MAX_SCRIPT_SIZE: usize = 10_000;

/// Orphans older than this are dropped on the next insertion (milliseconds)
pub const ORPHAN_EXPIRATION_MS: u64 = 60 * 60 * 1000;

/// Default orphan pool capacity
pub const DEFAULT_MAX_ORPHAN_BLOCKS: usize = 500;
