use log::info;

use std::path::{Path, PathBuf};

use crate::config::Config;
use crate::errors::*;
use crate::fastq::*;
use crate::read::ReadPair;
use crate::retain::*;

/// Files written by [`downsample`] and how many pairs made it into them.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DownsampleReport {
    pub outputs: Vec<PathBuf>,
    pub kept: u64,
    pub total: u64,
}

/// `truncated_<name>` next to the input.
pub fn truncated_path(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    path.with_file_name(format!("truncated_{name}"))
}

/// Keep a fraction of the configured input pairs, without looking at barcodes.
///
/// Mates are always kept or dropped together.
pub fn downsample(config: &Config) -> Result<DownsampleReport> {
    config.validate_sources()?;
    let mut report = DownsampleReport::default();

    if config.is_interleaved() {
        let paths = config.source_file_interleaved.to_vec();
        let estimated = estimate_records(input_size(&paths)?) / 2;
        let mut retain = strategy(config, estimated);

        for path in &paths {
            let out = truncated_path(path);
            let mut source = PairSource::interleaved(std::slice::from_ref(path))?;
            let mut writer = create_gz(&out, false)?;

            copy_retained(&mut source, &mut retain, &mut report, |pair| {
                write_record(&mut writer, &pair.forward)
                    .and_then(|_| write_record(&mut writer, &pair.reverse))
                    .map_err(|e| file_io(&out, e))
            })?;

            finish_gz(writer).map_err(|e| file_io(&out, e))?;
            report.outputs.push(out);
        }
    } else {
        let forward = config.source_file_forward.to_vec();
        let reverse = config.source_file_reverse.to_vec();
        let estimated = estimate_records(input_size(&forward)?);
        let mut retain = strategy(config, estimated);

        for (f, r) in forward.iter().zip(&reverse) {
            let (f_out, r_out) = (truncated_path(f), truncated_path(r));
            let mut source = PairSource::paired(std::slice::from_ref(f), std::slice::from_ref(r))?;
            let mut f_writer = create_gz(&f_out, false)?;
            let mut r_writer = create_gz(&r_out, false)?;

            copy_retained(&mut source, &mut retain, &mut report, |pair| {
                write_record(&mut f_writer, &pair.forward).map_err(|e| file_io(&f_out, e))?;
                write_record(&mut r_writer, &pair.reverse).map_err(|e| file_io(&r_out, e))
            })?;

            finish_gz(f_writer).map_err(|e| file_io(&f_out, e))?;
            finish_gz(r_writer).map_err(|e| file_io(&r_out, e))?;
            report.outputs.push(f_out);
            report.outputs.push(r_out);
        }
    }

    info!("Kept {} of {} read pairs", report.kept, report.total);
    Ok(report)
}

fn strategy(config: &Config, estimated_pairs: u64) -> RetentionStrategy {
    RetentionStrategy::from_percent(
        config.percent_to_retain,
        estimated_pairs,
        config.retain_by_truncating,
        config.seed,
    )
}

fn copy_retained(
    source: &mut PairSource,
    retain: &mut RetentionStrategy,
    report: &mut DownsampleReport,
    mut write: impl FnMut(&ReadPair) -> Result<()>,
) -> Result<()> {
    let mut pair = ReadPair::new();

    while source.next_pair(&mut pair)? {
        report.total += 1;
        if retain.keep() {
            write(&pair)?;
            report.kept += 1;
        }
    }

    Ok(())
}
