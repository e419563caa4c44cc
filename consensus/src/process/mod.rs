//! Processes the engine relies on besides the DAG: clocks and token supply.

pub mod median_time;
pub mod past_median_time;
pub mod token_ledger;

#[cfg(test)]
pub(crate) mod test_utils;

#[cfg(test)]
mod integration_test;

pub use median_time::MedianTime;
pub use past_median_time::PastMedianTimeManager;
pub use token_ledger::SupplyLedger;
