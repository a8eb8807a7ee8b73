use std::sync::atomic::{AtomicU64, Ordering};

use crate::trie::FuzzyMiss;

/// Counters shared by every stage of one run.
#[derive(Debug, Default)]
pub struct OutputStats {
    pub written: AtomicU64,
    pub fuzzed: AtomicU64,
    pub skipped: AtomicU64,
    pub skipped_header: AtomicU64,
    pub skipped_duplicate: AtomicU64,
    pub skipped_quality: AtomicU64,
    pub skipped_multiple_bad: AtomicU64,
    pub redacted: AtomicU64,
}

/// Plain copy of [`OutputStats`], taken once the pipeline has shut down.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub written: u64,
    pub fuzzed: u64,
    pub skipped: u64,
    pub skipped_header: u64,
    pub skipped_duplicate: u64,
    pub skipped_quality: u64,
    pub skipped_multiple_bad: u64,
    pub redacted: u64,
}

impl OutputStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn inc(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// Count a read whose barcode could not be recovered, by reason.
    pub fn note_miss(&self, miss: FuzzyMiss) {
        use FuzzyMiss::*;
        match miss {
            Ambiguous => Self::inc(&self.skipped_duplicate),
            QualityTooHigh => Self::inc(&self.skipped_quality),
            MultipleErrors => Self::inc(&self.skipped_multiple_bad),
            NoMatch => (),
        }
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        let get = |c: &AtomicU64| c.load(Ordering::Relaxed);
        StatsSnapshot {
            written: get(&self.written),
            fuzzed: get(&self.fuzzed),
            skipped: get(&self.skipped),
            skipped_header: get(&self.skipped_header),
            skipped_duplicate: get(&self.skipped_duplicate),
            skipped_quality: get(&self.skipped_quality),
            skipped_multiple_bad: get(&self.skipped_multiple_bad),
            redacted: get(&self.redacted),
        }
    }
}
