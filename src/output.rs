use rustc_hash::FxHashMap;

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use crate::barcodes::BarcodeTable;
use crate::errors::*;
use crate::fastq::*;
use crate::read::*;

/// File name of the debug sink inside the output directory.
pub const DEBUG_FILE_NAME: &str = "debug_out.txt";

/// Destination of persisted read pairs.
///
/// Shared by every persist stage, so writes to one output must be serialized internally.
pub trait OutputRouter: Send + Sync {
    /// Write one pair. Returns whether it ended up in an output.
    fn write(&self, pair: &ReadPair) -> Result<bool>;

    /// Records written so far to each output, by output name.
    fn totals(&self) -> Vec<(String, u64)>;

    /// Flush and close every output.
    fn finish(self) -> Result<()>
    where
        Self: Sized;
}

fn tail(s: &[u8], start: usize) -> &[u8] {
    s.get(start..).unwrap_or_default()
}

fn head(s: &[u8], end: usize) -> &[u8] {
    &s[..end.min(s.len())]
}

/// Plain text file collecting the forward sequence and quality of unusable pairs.
pub struct DebugSink {
    path: PathBuf,
    writer: Mutex<BufWriter<File>>,
}

impl DebugSink {
    pub fn create(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let file = File::create(&path).map_err(|e| file_io(&path, e))?;
        Ok(Self {
            path,
            writer: Mutex::new(BufWriter::new(file)),
        })
    }

    pub fn write(&self, pair: &ReadPair) -> Result<()> {
        let mut writer = self.writer.lock().map_err(|_| Error::WorkerPanicked("persist"))?;
        writer
            .write_all(&pair.forward.seq)
            .and_then(|_| writer.write_all(b"\n"))
            .and_then(|_| writer.write_all(&pair.forward.qual))
            .and_then(|_| writer.write_all(b"\n"))
            .map_err(|e| file_io(&self.path, e))
    }

    pub fn finish(self) -> Result<()> {
        let mut writer = self.writer.into_inner().unwrap_or_else(|e| e.into_inner());
        writer.flush().map_err(|e| file_io(&self.path, e))
    }
}

/// Write a pair with its barcode moved from the forward read to the reverse read.
///
/// The quality of the barcode symbols is taken from the forward read, even for a
/// corrected barcode.
pub fn write_attached(
    writer: &mut (impl Write + ?Sized),
    pair: &ReadPair,
    barcode: &[u8],
) -> std::io::Result<()> {
    let (forward, reverse) = (&pair.forward, &pair.reverse);
    let span = barcode.len();

    write_fastq_record(
        writer,
        &forward.name,
        &[tail(&forward.seq, span)],
        &forward.sep,
        &[tail(&forward.qual, span)],
    )?;
    write_fastq_record(
        writer,
        &reverse.name,
        &[barcode, &reverse.seq],
        &reverse.sep,
        &[head(&forward.qual, span), &reverse.qual],
    )
}

/// Attach mode: every usable pair goes to one interleaved output.
pub struct AttachRouter {
    path: PathBuf,
    writer: Mutex<GzWriter>,
    retain_unmatched: bool,
    written: AtomicU64,
    debug: Option<DebugSink>,
}

impl AttachRouter {
    pub fn create(
        path: impl Into<PathBuf>,
        retain_unmatched: bool,
        debug: Option<DebugSink>,
    ) -> Result<Self> {
        let path = path.into();
        let writer = create_gz(&path, false)?;
        Ok(Self {
            path,
            writer: Mutex::new(writer),
            retain_unmatched,
            written: AtomicU64::new(0),
            debug,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl OutputRouter for AttachRouter {
    fn write(&self, pair: &ReadPair) -> Result<bool> {
        let barcode = pair.barcode();

        if barcode.is_none() {
            if let Some(debug) = &self.debug {
                debug.write(pair)?;
            }
            if !self.retain_unmatched {
                return Ok(false);
            }
        }

        {
            let mut writer = self.writer.lock().map_err(|_| Error::WorkerPanicked("persist"))?;
            let res = match barcode {
                Some(barcode) => write_attached(&mut *writer, pair, barcode),
                None => write_record(&mut *writer, &pair.forward)
                    .and_then(|_| write_record(&mut *writer, &pair.reverse)),
            };
            res.map_err(|e| file_io(&self.path, e))?;
        }

        self.written.fetch_add(1, Ordering::Relaxed);
        Ok(true)
    }

    fn totals(&self) -> Vec<(String, u64)> {
        vec![(
            self.path.display().to_string(),
            self.written.load(Ordering::Relaxed),
        )]
    }

    fn finish(self) -> Result<()> {
        let writer = self.writer.into_inner().unwrap_or_else(|e| e.into_inner());
        finish_gz(writer).map_err(|e| file_io(&self.path, e))?;
        match self.debug {
            Some(debug) => debug.finish(),
            None => Ok(()),
        }
    }
}

/// Forward and reverse output files of one sample.
pub struct OutputFile {
    sample: String,
    forward_path: PathBuf,
    reverse_path: PathBuf,
    writers: Mutex<(GzWriter, GzWriter)>,
    written: AtomicU64,
}

impl OutputFile {
    /// `{population}_{sample}.R1.fq.gz` and `.R2.fq.gz`, or `.F` and `.R` when
    /// the output is meant for alignment.
    pub fn file_names(population: &str, sample: &str, align: bool) -> (String, String) {
        let (f, r) = if align { ("F", "R") } else { ("R1", "R2") };
        (
            format!("{population}_{sample}.{f}.fq.gz"),
            format!("{population}_{sample}.{r}.fq.gz"),
        )
    }

    pub fn create(dir: &Path, population: &str, sample: &str, align: bool, append: bool) -> Result<Self> {
        let (forward, reverse) = Self::file_names(population, sample, align);
        let forward_path = dir.join(forward);
        let reverse_path = dir.join(reverse);

        let writers = (
            create_gz(&forward_path, append)?,
            create_gz(&reverse_path, append)?,
        );

        Ok(Self {
            sample: sample.to_owned(),
            forward_path,
            reverse_path,
            writers: Mutex::new(writers),
            written: AtomicU64::new(0),
        })
    }

    /// Write a pair, dropping the first `barcode_len` symbols of the forward read.
    pub fn write(&self, pair: &ReadPair, barcode_len: usize) -> Result<()> {
        let (forward, reverse) = (&pair.forward, &pair.reverse);

        {
            let mut writers = self.writers.lock().map_err(|_| Error::WorkerPanicked("persist"))?;
            let (forward_writer, reverse_writer) = &mut *writers;

            write_fastq_record(
                forward_writer,
                &forward.name,
                &[tail(&forward.seq, barcode_len)],
                &forward.sep,
                &[tail(&forward.qual, barcode_len)],
            )
            .map_err(|e| file_io(&self.forward_path, e))?;
            write_record(reverse_writer, reverse).map_err(|e| file_io(&self.reverse_path, e))?;
        }

        self.written.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    pub fn sample(&self) -> &str {
        &self.sample
    }

    pub fn written(&self) -> u64 {
        self.written.load(Ordering::Relaxed)
    }

    pub fn paths(&self) -> (&Path, &Path) {
        (&self.forward_path, &self.reverse_path)
    }

    pub fn finish(self) -> Result<()> {
        let (forward, reverse) = self.writers.into_inner().unwrap_or_else(|e| e.into_inner());
        finish_gz(forward).map_err(|e| file_io(&self.forward_path, e))?;
        finish_gz(reverse).map_err(|e| file_io(&self.reverse_path, e))
    }
}

/// Demultiplex mode: each pair goes to the files of the sample its barcode belongs to.
///
/// Barcodes assigned to the same sample share one [`OutputFile`].
pub struct DemuxRouter {
    outputs: Vec<OutputFile>,
    by_barcode: FxHashMap<Vec<u8>, usize>,
    debug: Option<DebugSink>,
}

impl DemuxRouter {
    /// Create the output files of every sample in the table up front.
    pub fn create(
        table: &BarcodeTable,
        dir: &Path,
        population: &str,
        align: bool,
        append: bool,
        debug: Option<DebugSink>,
    ) -> Result<Self> {
        let mut outputs = Vec::new();
        let mut by_sample: FxHashMap<&str, usize> = FxHashMap::default();
        let mut by_barcode = FxHashMap::default();

        for (barcode, sample) in table.iter() {
            let idx = match by_sample.get(sample) {
                Some(&idx) => idx,
                None => {
                    outputs.push(OutputFile::create(dir, population, sample, align, append)?);
                    by_sample.insert(sample, outputs.len() - 1);
                    outputs.len() - 1
                }
            };
            by_barcode.insert(barcode.to_owned(), idx);
        }

        Ok(Self {
            outputs,
            by_barcode,
            debug,
        })
    }

    pub fn outputs(&self) -> &[OutputFile] {
        &self.outputs
    }
}

impl OutputRouter for DemuxRouter {
    fn write(&self, pair: &ReadPair) -> Result<bool> {
        let Some(barcode) = pair.barcode() else {
            if let Some(debug) = &self.debug {
                debug.write(pair)?;
            }
            return Ok(false);
        };

        let Some(&idx) = self.by_barcode.get(barcode) else {
            return Err(Error::UnknownBarcode(utf8(barcode)));
        };

        self.outputs[idx].write(pair, barcode.len())?;
        Ok(true)
    }

    fn totals(&self) -> Vec<(String, u64)> {
        self.outputs
            .iter()
            .map(|o| (o.sample().to_owned(), o.written()))
            .collect()
    }

    fn finish(self) -> Result<()> {
        // close everything before reporting the first failure
        let mut res = Ok(());
        for output in self.outputs {
            let closed = output.finish();
            if res.is_ok() {
                res = closed;
            }
        }
        if let Some(debug) = self.debug {
            let closed = debug.finish();
            if res.is_ok() {
                res = closed;
            }
        }
        res
    }
}
