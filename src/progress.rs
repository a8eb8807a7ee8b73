use log::info;

use std::sync::atomic::{AtomicU64, Ordering};

use crate::retain::estimate_records;

/// Number of steps between 0% and 100% that progress is reported at.
const PERCENT_TO_TWO_DECIMALS: u64 = 10_000;

pub trait ProgressTracker: Send + Sync {
    /// Called once per persisted record.
    fn note_progress(&self);

    /// Report progress if enough records were persisted since the last report.
    ///
    /// Returns the reported percentage.
    fn print_progress(&self) -> Option<f64>;
}

pub struct NoProgress;

impl ProgressTracker for NoProgress {
    fn note_progress(&self) {}

    fn print_progress(&self) -> Option<f64> {
        None
    }
}

/// Progress estimated from the compressed size of the input.
pub struct ByteProgress {
    written: AtomicU64,
    last_printed: AtomicU64,
    expected: u64,
    update_interval: u64,
}

impl ByteProgress {
    pub fn new(total_bytes: u64) -> Self {
        let expected = estimate_records(total_bytes).max(1);
        Self {
            written: AtomicU64::new(0),
            last_printed: AtomicU64::new(0),
            expected,
            update_interval: expected / PERCENT_TO_TWO_DECIMALS,
        }
    }
}

impl ProgressTracker for ByteProgress {
    fn note_progress(&self) {
        self.written.fetch_add(1, Ordering::Relaxed);
    }

    fn print_progress(&self) -> Option<f64> {
        let current = self.written.load(Ordering::Relaxed);
        let last = self.last_printed.load(Ordering::Relaxed);

        if current.saturating_sub(last) <= self.update_interval {
            return None;
        }
        self.last_printed.store(current, Ordering::Relaxed);

        let percent = (current * PERCENT_TO_TWO_DECIMALS / self.expected) as f64 / 100.0;
        info!("Processed roughly {percent} percent ({current} reads)");
        Some(percent)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_byte_progress() {
        let tracker = ByteProgress::new(2048);
        assert_eq!(tracker.print_progress(), None);

        tracker.note_progress();
        assert_eq!(tracker.print_progress(), None);

        for _ in 0..100 {
            tracker.note_progress();
        }
        let percent = tracker.print_progress().unwrap();
        assert!(percent > 0.0 && percent < 0.5);

        // nothing new since the last report
        assert_eq!(tracker.print_progress(), None);
    }

    #[test]
    fn test_no_progress() {
        let tracker = NoProgress;
        tracker.note_progress();
        assert_eq!(tracker.print_progress(), None);
    }
}
