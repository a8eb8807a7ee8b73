use crossbeam::channel::{bounded, tick};
use crossbeam::select;
use log::{info, log, warn, Level};

use std::fmt;
use std::path::PathBuf;
use std::thread;
use std::time::Duration;

use crate::barcodes::*;
use crate::config::Config;
use crate::errors::*;
use crate::fastq::*;
use crate::output::*;
use crate::pipeline::*;
use crate::progress::*;
use crate::retain::*;
use crate::stats::StatsSnapshot;

const PROGRESS_INTERVAL: Duration = Duration::from_secs(1);

/// Barcodes this similar can be corrected into each other by mistake.
const MIN_SAFE_DISTANCE: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Move the barcode of each forward read onto its reverse mate.
    Attach,
    /// Split pairs into per sample files by barcode.
    Demultiplex,
}

/// Outcome of one run, printed once everything is closed.
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub mode: Mode,
    /// Whether every input pair was read and written.
    pub complete: bool,
    pub stats: StatsSnapshot,
    pub elapsed: Duration,
    pub persist_time: Duration,
    /// Records written per output.
    pub totals: Vec<(String, u64)>,
    pub min_distance: Option<usize>,
}

fn format_elapsed(d: Duration) -> String {
    if d.as_millis() > 60_000 {
        format!("{} minutes", d.as_secs() / 60)
    } else {
        format!("{} ms", d.as_millis())
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "{}, wrote {}, skipped {}, redacted {}, fuzzed {} in {}",
            if self.complete { "Finished" } else { "Stopped" },
            self.stats.written,
            self.stats.skipped,
            self.stats.redacted,
            self.stats.fuzzed,
            format_elapsed(self.elapsed)
        )
    }
}

impl RunSummary {
    /// Log why reads were skipped and where the rest went.
    pub fn log_details(&self, level: Level) {
        let s = &self.stats;
        log!(
            level,
            "Skipped {} due to non-unique fixes, {} due to quality scores, {} due to more than one symbol being off, and {} due to a mismatched header",
            s.skipped_duplicate,
            s.skipped_quality,
            s.skipped_multiple_bad,
            s.skipped_header
        );

        log!(level, "Totals per output:");
        for (name, written) in &self.totals {
            log!(level, "{name}: {written}");
        }
        log!(level, "Spent {} writing", format_elapsed(self.persist_time));
    }
}

/// Open the configured input, along with the compressed size of one mate's worth of it.
pub fn open_source(config: &Config) -> Result<(PairSource<'static>, u64)> {
    if config.is_interleaved() {
        let paths = config.source_file_interleaved.to_vec();
        let bytes = input_size(&paths)?;
        Ok((PairSource::interleaved(&paths)?, bytes / 2))
    } else {
        let forward = config.source_file_forward.to_vec();
        let reverse = config.source_file_reverse.to_vec();
        let bytes = input_size(&forward)?;
        input_size(&reverse)?;
        Ok((PairSource::paired(&forward, &reverse)?, bytes))
    }
}

/// `output`, or `<first input without .gz>.interleaved.barcoded.gz`.
pub fn attach_output_path(config: &Config) -> Result<PathBuf> {
    if let Some(output) = &config.output {
        return Ok(output.clone());
    }

    let first = config
        .source_file_forward
        .to_vec()
        .into_iter()
        .chain(config.source_file_interleaved.to_vec())
        .next()
        .ok_or(Error::MissingOption("sourceFileForward"))?;

    let first = first.to_string_lossy();
    let stem = first.strip_suffix(".gz").unwrap_or(&*first);
    Ok(PathBuf::from(format!("{stem}.interleaved.barcoded.gz")))
}

/// Run `f` while a thread periodically prints progress.
fn with_progress_printer<T>(tracker: &dyn ProgressTracker, enabled: bool, f: impl FnOnce() -> T) -> T {
    if !enabled {
        return f();
    }

    thread::scope(|s| {
        let (done_tx, done_rx) = bounded::<()>(0);
        let ticker = tick(PROGRESS_INTERVAL);

        s.spawn(move || loop {
            select! {
                recv(ticker) -> _ => {
                    tracker.print_progress();
                }
                recv(done_rx) -> _ => break,
            }
        });

        let res = f();
        drop(done_tx);
        res
    })
}

fn execute<R: OutputRouter>(
    config: &Config,
    pipeline: &Pipeline,
    tracker: &dyn ProgressTracker,
    source: &mut PairSource,
    retain: &mut RetentionStrategy,
    router: R,
) -> (PipelineReport, Vec<(String, u64)>) {
    let mut report = with_progress_printer(tracker, config.print_progress, || {
        pipeline.run(source, retain, &router)
    });

    // every persist stage is done, so the outputs can be closed
    let totals = router.totals();
    let closed = router.finish();
    if report.error.is_none() {
        report.error = closed.err();
    }
    (report, totals)
}

/// Match every read pair of the configured input and write it out according to `mode`.
///
/// A failure after the outputs were opened is returned as [`Error::Interrupted`], which
/// still carries the summary of everything done until then.
pub fn run(config: &Config, mode: Mode) -> Result<RunSummary> {
    config.validate()?;

    let barcode_file = config
        .barcode_file
        .as_ref()
        .ok_or(Error::MissingOption("barcodeFile"))?;
    let table = BarcodeTable::from_path(barcode_file)?;
    let trie = table.to_trie(&config.overhang)?;
    info!("Loaded {} barcodes from \"{}\"", table.len(), barcode_file.display());

    let min_distance = min_hamming_distance(table.barcodes());
    if let Some(d) = min_distance {
        info!("Min edit distance: {d}");
        if d < MIN_SAFE_DISTANCE {
            warn!("There is a risk of mis-fuzzing because the barcodes are too similar");
        }
    }

    let (mut source, pair_bytes) = open_source(config)?;
    let mut retain = RetentionStrategy::from_percent(
        config.percent_to_retain,
        estimate_records(pair_bytes),
        config.retain_by_truncating,
        config.seed,
    );

    let tracker: Box<dyn ProgressTracker> = if config.print_progress {
        Box::new(ByteProgress::new(pair_bytes))
    } else {
        Box::new(NoProgress)
    };
    let pipeline = Pipeline::new(&trie, config.pipeline_options()).with_tracker(&*tracker);

    let needs_output_dir = config.debug_out || mode == Mode::Demultiplex;
    if needs_output_dir {
        std::fs::create_dir_all(&config.output_dir).map_err(|e| file_io(&config.output_dir, e))?;
    }

    let debug = if config.debug_out {
        Some(DebugSink::create(config.output_dir.join(DEBUG_FILE_NAME))?)
    } else {
        None
    };

    let (report, totals) = match mode {
        Mode::Attach => {
            let path = attach_output_path(config)?;
            info!("Writing barcoded pairs to \"{}\"", path.display());
            let router = AttachRouter::create(path, config.retain_unmatched, debug)?;
            execute(config, &pipeline, &*tracker, &mut source, &mut retain, router)
        }
        Mode::Demultiplex => {
            let router = DemuxRouter::create(
                &table,
                &config.output_dir,
                &config.population,
                config.align,
                config.append,
                debug,
            )?;
            execute(config, &pipeline, &*tracker, &mut source, &mut retain, router)
        }
    };

    let summary = RunSummary {
        mode,
        complete: report.error.is_none(),
        stats: report.stats,
        elapsed: report.elapsed,
        persist_time: report.persist_time,
        totals,
        min_distance,
    };

    let level = if config.debug_out { Level::Info } else { Level::Debug };
    summary.log_details(level);

    match report.error {
        Some(e) => Err(Error::Interrupted {
            source: Box::new(e),
            summary: Box::new(summary),
        }),
        None => Ok(summary),
    }
}
