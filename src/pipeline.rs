use crossbeam::channel::{bounded, Receiver, Sender};
use crossbeam::select;
use crossbeam::sync::WaitGroup;
use log::debug;
use thread_local::ThreadLocal;

use std::cell::Cell;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use std::thread;
use std::time::{Duration, Instant};

use crate::errors::*;
use crate::fastq::PairSource;
use crate::output::OutputRouter;
use crate::progress::*;
use crate::read::*;
use crate::retain::RetentionStrategy;
use crate::stats::*;
use crate::trie::BarcodeTrie;

pub const DEFAULT_QUEUE_CAPACITY: usize = 150;
pub const MAX_PERSIST_THREADS: usize = 5;

pub fn default_persist_threads() -> usize {
    thread::available_parallelism()
        .map_or(1, |n| n.get())
        .min(MAX_PERSIST_THREADS)
}

#[derive(Debug, Clone)]
pub struct PipelineOptions {
    /// Try to correct one low quality symbol when there is no exact match.
    pub fuzzy: bool,
    /// Symbols with a quality below this may be corrected.
    pub min_quality: u8,
    /// Number of pooled read pair slots, also the capacity of the ready queue.
    pub queue_capacity: usize,
    pub persist_threads: usize,
    /// Keep the persist stages alive for at least this long before cancelling them.
    pub min_runtime: Duration,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            fuzzy: false,
            min_quality: b'F',
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            persist_threads: default_persist_threads(),
            min_runtime: Duration::ZERO,
        }
    }
}

/// Counters and timings of one pipeline run, complete or not.
#[derive(Debug)]
pub struct PipelineReport {
    pub stats: StatsSnapshot,
    pub elapsed: Duration,
    /// Time spent writing, summed over every persist stage.
    pub persist_time: Duration,
    /// First failure, if the run stopped early. The counters cover every pair loaded
    /// before it.
    pub error: Option<Error>,
}

/// First error hit by a persist stage. Once set, later stages stop writing and only
/// recycle slots so the load stage is never left blocked.
#[derive(Default)]
struct Failure {
    first: Mutex<Option<Error>>,
    failed: AtomicBool,
}

impl Failure {
    fn record(&self, e: Error) {
        let mut first = self.first.lock().unwrap_or_else(|e| e.into_inner());
        if first.is_none() {
            *first = Some(e);
        }
        self.failed.store(true, Ordering::Release);
    }

    fn is_set(&self) -> bool {
        self.failed.load(Ordering::Acquire)
    }

    fn into_error(self) -> Option<Error> {
        self.first.into_inner().unwrap_or_else(|e| e.into_inner())
    }
}

struct PersistStage<'p, R> {
    router: &'p R,
    ready: Receiver<ReadPair>,
    available: Sender<ReadPair>,
    cancel: Receiver<()>,
    failure: &'p Failure,
    busy: &'p ThreadLocal<Cell<Duration>>,
}

/// One load stage feeding several persist stages through a fixed pool of slots.
///
/// Slots circulate between an "available" pool and a "ready" queue, both bounded by
/// the queue capacity, so a slow output throttles the reader.
pub struct Pipeline<'a> {
    trie: &'a BarcodeTrie,
    options: PipelineOptions,
    tracker: &'a dyn ProgressTracker,
}

impl<'a> Pipeline<'a> {
    pub fn new(trie: &'a BarcodeTrie, options: PipelineOptions) -> Self {
        Self {
            trie,
            options,
            tracker: &NoProgress,
        }
    }

    pub fn with_tracker(mut self, tracker: &'a dyn ProgressTracker) -> Self {
        self.tracker = tracker;
        self
    }

    pub fn options(&self) -> &PipelineOptions {
        &self.options
    }

    /// Match every pair of `source` and hand it to `router`.
    ///
    /// Returns once every loaded pair was persisted, even if reading or writing
    /// failed along the way. Outputs are left open for the caller to close.
    pub fn run<R: OutputRouter>(
        &self,
        source: &mut PairSource,
        retain: &mut RetentionStrategy,
        router: &R,
    ) -> PipelineReport {
        let start = Instant::now();
        let capacity = self.options.queue_capacity.max(1);
        let threads = self.options.persist_threads.max(1);

        let stats = OutputStats::new();
        let failure = Failure::default();
        let busy = ThreadLocal::new();

        let (available_tx, available_rx) = bounded(capacity);
        let (ready_tx, ready_rx) = bounded(capacity);
        let (cancel_tx, cancel_rx) = bounded::<()>(0);

        for _ in 0..capacity {
            let _ = available_tx.send(ReadPair::new());
        }

        debug!("Starting {threads} persist stages with {capacity} pooled read pairs");

        let load_res = thread::scope(|s| {
            let finished = WaitGroup::new();
            let mut handles = Vec::with_capacity(threads);

            for _ in 0..threads {
                let stage = PersistStage {
                    router,
                    ready: ready_rx.clone(),
                    available: available_tx.clone(),
                    cancel: cancel_rx.clone(),
                    failure: &failure,
                    busy: &busy,
                };
                let finished = finished.clone();

                handles.push(s.spawn(move || {
                    self.persist(stage);
                    drop(finished);
                }));
            }

            // only the stages may hold these, so a stage dying is noticed by the load stage
            drop((ready_rx, available_tx, cancel_rx));

            let load_res = self.load(source, retain, &stats, available_rx, ready_tx, &failure);

            let elapsed = start.elapsed();
            if elapsed < self.options.min_runtime {
                thread::sleep(self.options.min_runtime - elapsed);
            }

            drop(cancel_tx);
            finished.wait();

            for handle in handles {
                if handle.join().is_err() {
                    failure.record(Error::WorkerPanicked("persist"));
                }
            }

            load_res
        });

        PipelineReport {
            stats: stats.snapshot(),
            elapsed: start.elapsed(),
            persist_time: busy.into_iter().map(Cell::into_inner).sum(),
            error: load_res.err().or_else(|| failure.into_error()),
        }
    }

    fn load(
        &self,
        source: &mut PairSource,
        retain: &mut RetentionStrategy,
        stats: &OutputStats,
        available: Receiver<ReadPair>,
        ready: Sender<ReadPair>,
        failure: &Failure,
    ) -> Result<()> {
        // a slot whose pair was not retained is refilled right away
        let mut spare = None;

        while !failure.is_set() {
            let mut pair = match spare.take() {
                Some(pair) => pair,
                None => match available.recv() {
                    Ok(pair) => pair,
                    Err(_) => break,
                },
            };

            if !source.next_pair(&mut pair)? {
                break;
            }

            if !retain.keep() {
                OutputStats::inc(&stats.redacted);
                spare = Some(pair);
                continue;
            }

            self.tag(&mut pair, stats);

            if ready.send(pair).is_err() {
                break;
            }
        }

        Ok(())
    }

    /// Record how the forward read's barcode was recovered, if at all.
    fn tag(&self, pair: &mut ReadPair, stats: &OutputStats) {
        pair.clear_match();

        if !headers_in_sync(&pair.forward.name, &pair.reverse.name) {
            OutputStats::inc(&stats.skipped);
            OutputStats::inc(&stats.skipped_header);
            return;
        }

        let len = self.trie.exact_match(&pair.forward.seq);
        if len >= MIN_BARCODE_LEN {
            pair.barcode_len = len;
            OutputStats::inc(&stats.written);
            return;
        }

        if !self.options.fuzzy {
            OutputStats::inc(&stats.skipped);
            return;
        }

        match self
            .trie
            .fuzzy_match(&pair.forward.seq, &pair.forward.qual, self.options.min_quality)
        {
            Ok(barcode) if barcode.len() >= MIN_BARCODE_LEN => {
                pair.fuzzed = Some(barcode);
                OutputStats::inc(&stats.fuzzed);
            }
            Ok(_) => OutputStats::inc(&stats.skipped),
            Err(miss) => {
                OutputStats::inc(&stats.skipped);
                stats.note_miss(miss);
            }
        }
    }

    fn persist<R: OutputRouter>(&self, stage: PersistStage<R>) {
        loop {
            select! {
                recv(stage.ready) -> pair => match pair {
                    Ok(pair) => self.persist_one(&stage, pair),
                    Err(_) => break,
                },
                recv(stage.cancel) -> _ => break,
            }
        }

        // cancelled: nothing new is coming, but everything queued must still be written
        while let Ok(pair) = stage.ready.try_recv() {
            self.persist_one(&stage, pair);
        }
    }

    fn persist_one<R: OutputRouter>(&self, stage: &PersistStage<R>, mut pair: ReadPair) {
        if !stage.failure.is_set() {
            let start = Instant::now();

            match stage.router.write(&pair) {
                Ok(true) => self.tracker.note_progress(),
                Ok(false) => (),
                Err(e) => stage.failure.record(e),
            }

            let busy = stage.busy.get_or(|| Cell::new(Duration::ZERO));
            busy.set(busy.get() + start.elapsed());
        }

        pair.clear_match();
        // fails only once the load stage is done and the pool is gone
        let _ = stage.available.send(pair);
    }
}
