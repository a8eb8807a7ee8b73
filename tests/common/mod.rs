#![allow(dead_code)]

use flate2::read::MultiGzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;

use std::fs::File;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use copybarcodes::*;

pub const HEADER: &str = "A00589:100:HLKHHDMXX:1:1101:1217:1000:1:N:0:GACTAGGAGC+TAGTACAGGC";
pub const OTHER_TILE: &str = "A00589:100:HLKHHDMXX:1:1102:1217:1000:1:N:0:GACTAGGAGC+TAGTACAGGC";

pub const ALL_F: &str = "FFFFFFFFFFFFFFFFFFFFFFF";
/// One low quality symbol at position 5.
pub const LOW_AT_5: &str = "FFFFF,FFFFFFFFFFFFFFFFF";

pub fn fastq(records: &[(&str, &str, &str)]) -> String {
    records
        .iter()
        .map(|(name, seq, qual)| format!("@{name}\n{seq}\n+\n{qual}\n"))
        .collect()
}

pub fn write_gz(path: &Path, text: &str) {
    let mut encoder = GzEncoder::new(File::create(path).unwrap(), Compression::default());
    encoder.write_all(text.as_bytes()).unwrap();
    encoder.finish().unwrap();
}

pub fn read_gz(path: &Path) -> String {
    let mut text = String::new();
    MultiGzDecoder::new(File::open(path).unwrap())
        .read_to_string(&mut text)
        .unwrap();
    text
}

pub fn count_records(path: &Path) -> usize {
    read_gz(path).lines().count() / 4
}

/// Three pairs: the first and third have an exact `AAAA` barcode, the second has a
/// mismatch in the overhang at a low quality position.
pub fn forward_records() -> String {
    fastq(&[
        (HEADER, "AAAACAGCAAACCCGGGTTTAAA", ALL_F),
        (HEADER, "AAAACCGCAAACCCGGGTTTAAA", LOW_AT_5),
        (HEADER, "AAAACTGCAAACCCGGGTTTAAA", ALL_F),
    ])
}

pub fn reverse_records(first_header: &str) -> String {
    fastq(&[
        (first_header, "CCCCCAAAGGG", "FFFFFFFFFFF"),
        (HEADER, "GGGGGAAACCC", "FFFFFFFFFFF"),
        (HEADER, "GGGGGTTTCCC", "FFFFFFFFFFF"),
    ])
}

pub struct Fixture {
    pub dir: tempfile::TempDir,
    pub forward: PathBuf,
    pub reverse: PathBuf,
    pub barcodes: PathBuf,
}

impl Fixture {
    pub fn new(forward: &str, reverse: &str) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let fixture = Self {
            forward: dir.path().join("fwd.fq.gz"),
            reverse: dir.path().join("rev.fq.gz"),
            barcodes: dir.path().join("barcodes.txt"),
            dir,
        };

        write_gz(&fixture.forward, forward);
        write_gz(&fixture.reverse, reverse);
        std::fs::write(&fixture.barcodes, "AAAA\tfoo\nCCCC\tbar\tstuff\n").unwrap();
        fixture
    }

    pub fn path(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    /// Single persist stage so output order matches input order.
    pub fn config(&self) -> Config {
        Config {
            overhang: vec!["CAGC".to_owned(), "CTGC".to_owned()],
            barcode_file: Some(self.barcodes.clone()),
            source_file_forward: Paths::One(self.forward.clone()),
            source_file_reverse: Paths::One(self.reverse.clone()),
            population: "pop".to_owned(),
            output_dir: self.dir.path().join("out"),
            persist_threads: 1,
            queue_capacity: 2,
            ..Default::default()
        }
    }
}
