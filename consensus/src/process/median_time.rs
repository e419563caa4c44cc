//! Network-adjusted clock
//!
//! Peers report their time when they connect. The median of the reported
//! offsets is applied to the local clock as long as it stays within the
//! allowed drift; a larger median is ignored and logged.

use parking_lot::Mutex;
use std::collections::{HashSet, VecDeque};
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{debug, warn};

use crate::interfaces::MedianTimeSource;

const MAX_TIME_SAMPLES: usize = 200;
const MIN_TIME_SAMPLES: usize = 5;

pub(crate) fn unix_now_ms() -> u64 {
    SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_millis() as u64).unwrap_or(0)
}

#[derive(Default)]
struct TimeSamples {
    sources: HashSet<String>,
    offsets: VecDeque<i64>,
    offset_ms: i64,
}

pub struct MedianTime {
    max_offset_ms: i64,
    samples: Mutex<TimeSamples>,
}

impl MedianTime {
    pub fn new(max_offset_ms: u64) -> Self {
        Self { max_offset_ms: i64::try_from(max_offset_ms).unwrap_or(i64::MAX), samples: Mutex::new(TimeSamples::default()) }
    }

    fn record_offset(&self, source: &str, offset_ms: i64) {
        let mut samples = self.samples.lock();
        if !samples.sources.insert(source.to_string()) {
            return;
        }
        if samples.offsets.len() == MAX_TIME_SAMPLES {
            samples.offsets.pop_front();
        }
        samples.offsets.push_back(offset_ms);

        // an even count has no single median; wait for the next sample
        let count = samples.offsets.len();
        if count < MIN_TIME_SAMPLES || count % 2 == 0 {
            return;
        }
        let mut sorted: Vec<i64> = samples.offsets.iter().copied().collect();
        sorted.sort_unstable();
        let median = sorted[count / 2];
        if median.abs() <= self.max_offset_ms {
            samples.offset_ms = median;
            debug!("Adjusted time offset is now {} ms over {} samples", median, count);
        } else {
            samples.offset_ms = 0;
            warn!("Median peer time offset {} ms exceeds {} ms; check the local clock", median, self.max_offset_ms);
        }
    }
}

impl MedianTimeSource for MedianTime {
    fn adjusted_time_ms(&self) -> u64 {
        let offset = self.offset_ms();
        let now = unix_now_ms();
        if offset >= 0 {
            now.saturating_add(offset as u64)
        } else {
            now.saturating_sub(offset.unsigned_abs())
        }
    }

    fn add_time_sample(&self, source: &str, time_ms: u64) {
        let now = unix_now_ms() as i128;
        let offset = (time_ms as i128 - now).clamp(i64::MIN as i128, i64::MAX as i128) as i64;
        self.record_offset(source, offset);
    }

    fn offset_ms(&self) -> i64 {
        self.samples.lock().offset_ms
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_offset_needs_enough_samples() {
        let clock = MedianTime::new(70 * 60 * 1000);
        for (i, offset) in [1_000i64, 2_000, 3_000, 4_000].iter().enumerate() {
            clock.record_offset(&format!("peer{}", i), *offset);
        }
        assert_eq!(clock.offset_ms(), 0);
        clock.record_offset("peer4", 5_000);
        assert_eq!(clock.offset_ms(), 3_000);
        // repeated sources are ignored
        clock.record_offset("peer4", 90_000);
        clock.record_offset("peer4", 90_000);
        assert_eq!(clock.offset_ms(), 3_000);
    }

    #[test]
    fn test_large_median_is_ignored() {
        let clock = MedianTime::new(10_000);
        for i in 0..5 {
            clock.record_offset(&format!("peer{}", i), -60_000);
        }
        assert_eq!(clock.offset_ms(), 0);
        let now = unix_now_ms();
        assert!(clock.adjusted_time_ms() >= now);
    }
}
