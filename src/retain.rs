use rand::distributions::Bernoulli;
use rand::prelude::*;
use rand_xoshiro::Xoshiro256PlusPlus;

/// Records estimated per kilobyte of gzipped FASTQ input.
pub const ESTIMATED_RECORDS_PER_KB: u64 = 45_000;

/// Estimate how many records a gzipped input of `compressed_bytes` holds.
pub fn estimate_records(compressed_bytes: u64) -> u64 {
    compressed_bytes / 1024 * ESTIMATED_RECORDS_PER_KB
}

/// Decides which records survive downsampling.
///
/// Consulted once per record (or record pair) in input order.
pub enum RetentionStrategy {
    KeepAll,
    /// Keep each record independently with probability `percent / 100`.
    RandomSample {
        bernoulli: Bernoulli,
        rng: Xoshiro256PlusPlus,
    },
    /// Keep the first `target` records, drop everything after.
    DeterministicTruncate { seen: u64, target: u64 },
}

impl RetentionStrategy {
    /// Pick the strategy for keeping `percent` of roughly `estimated_records` records.
    ///
    /// Random samples are reproducible only when a `seed` is given.
    pub fn from_percent(percent: u8, estimated_records: u64, truncate: bool, seed: Option<u64>) -> Self {
        if percent >= 100 {
            Self::KeepAll
        } else if truncate {
            Self::truncate(estimated_records * percent as u64 / 100)
        } else {
            Self::random_sample(percent, seed)
        }
    }

    pub fn random_sample(percent: u8, seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => Xoshiro256PlusPlus::seed_from_u64(seed),
            None => Xoshiro256PlusPlus::from_entropy(),
        };

        Self::RandomSample {
            bernoulli: Bernoulli::from_ratio(percent.min(100) as u32, 100)
                .unwrap_or_else(|e| panic!("Error creating bernoulli distribution: {e}")),
            rng,
        }
    }

    pub fn truncate(target: u64) -> Self {
        Self::DeterministicTruncate { seen: 0, target }
    }

    /// Whether the next record should be kept.
    pub fn keep(&mut self) -> bool {
        use RetentionStrategy::*;
        match self {
            KeepAll => true,
            RandomSample { bernoulli, rng } => bernoulli.sample(rng),
            DeterministicTruncate { seen, target } => {
                let keep = *seen < *target;
                *seen += 1;
                keep
            }
        }
    }
}
