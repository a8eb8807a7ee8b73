use log::info;

use std::path::{Path, PathBuf};

use crate::errors::*;
use crate::fastq::*;
use crate::read::FastqRecord;

/// `<path without its last extension>.truncated.gz`
pub fn truncated_reads_path(path: &Path) -> PathBuf {
    path.with_extension("truncated.gz")
}

/// Rewrite a FASTQ file with every sequence and quality line cut to at most `max_len` symbols.
///
/// Returns the output path and the number of records written.
pub fn truncate_reads(path: &Path, max_len: usize) -> Result<(PathBuf, u64)> {
    let out = truncated_reads_path(path);
    let mut source = FastqSource::from_paths(&[path.to_owned()])?;
    let mut writer = create_gz(&out, false)?;
    let mut record = FastqRecord::default();
    let mut n = 0;

    while source.next_into(&mut record)? {
        record.seq.truncate(max_len);
        record.qual.truncate(max_len);
        write_record(&mut writer, &record).map_err(|e| file_io(&out, e))?;
        n += 1;
    }

    finish_gz(writer).map_err(|e| file_io(&out, e))?;
    Ok((out, n))
}

/// Every regular file directly inside `dir`, sorted by name.
pub fn files_in(dir: &Path) -> Result<Vec<PathBuf>> {
    let entries = std::fs::read_dir(dir).map_err(|e| file_io(dir, e))?;
    let mut files = Vec::new();

    for entry in entries {
        let path = entry.map_err(|e| file_io(dir, e))?.path();
        if path.is_file() {
            files.push(path);
        }
    }

    files.sort();
    Ok(files)
}

/// Truncate each file, returning the outputs in the same order.
pub fn truncate_all(paths: &[PathBuf], max_len: usize) -> Result<Vec<PathBuf>> {
    let mut outputs = Vec::with_capacity(paths.len());

    for path in paths {
        let (out, n) = truncate_reads(path, max_len)?;
        info!("Truncated {n} records of \"{}\"", path.display());
        outputs.push(out);
    }

    Ok(outputs)
}
