use serde::{Deserialize, Serialize};

use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::errors::*;
use crate::pipeline::*;

/// Either one path or a list of paths, read back to back.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Paths {
    #[default]
    Empty,
    One(PathBuf),
    Many(Vec<PathBuf>),
}

impl Paths {
    pub fn to_vec(&self) -> Vec<PathBuf> {
        use Paths::*;
        match self {
            Empty => Vec::new(),
            One(path) => vec![path.clone()],
            Many(paths) => paths.clone(),
        }
    }

    pub fn is_empty(&self) -> bool {
        use Paths::*;
        match self {
            Empty => true,
            One(_) => false,
            Many(paths) => paths.is_empty(),
        }
    }
}

fn default_min_quality() -> char {
    'F'
}

fn default_percent_to_retain() -> u8 {
    100
}

fn default_output_dir() -> PathBuf {
    PathBuf::from(".")
}

fn default_queue_capacity() -> usize {
    DEFAULT_QUEUE_CAPACITY
}

/// Options of a demultiplex, attach or downsample run, read from a YAML file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    #[serde(default = "default_min_quality")]
    pub min_quality: char,
    #[serde(default)]
    pub overhang: Vec<String>,
    pub barcode_file: Option<PathBuf>,
    #[serde(default)]
    pub source_file_forward: Paths,
    #[serde(default)]
    pub source_file_reverse: Paths,
    #[serde(default)]
    pub source_file_interleaved: Paths,
    #[serde(default)]
    pub population: String,
    /// Name outputs `.F`/`.R` instead of `.R1`/`.R2`.
    #[serde(default)]
    pub align: bool,
    #[serde(default)]
    pub append: bool,
    #[serde(default)]
    pub fuzzy_match: bool,
    #[serde(default)]
    pub debug_out: bool,
    #[serde(default = "default_percent_to_retain")]
    pub percent_to_retain: u8,
    #[serde(default)]
    pub retain_by_truncating: bool,
    #[serde(default)]
    pub print_progress: bool,
    /// Attach mode only: write pairs without a barcode unchanged.
    #[serde(default)]
    pub retain_unmatched: bool,
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
    /// Attach mode output file.
    pub output: Option<PathBuf>,
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
    #[serde(default = "default_persist_threads")]
    pub persist_threads: usize,
    /// Seed for random downsampling. Without one every run samples differently.
    pub seed: Option<u64>,
    #[serde(default)]
    pub min_runtime_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            min_quality: default_min_quality(),
            overhang: Vec::new(),
            barcode_file: None,
            source_file_forward: Paths::Empty,
            source_file_reverse: Paths::Empty,
            source_file_interleaved: Paths::Empty,
            population: String::new(),
            align: false,
            append: false,
            fuzzy_match: false,
            debug_out: false,
            percent_to_retain: default_percent_to_retain(),
            retain_by_truncating: false,
            print_progress: false,
            retain_unmatched: false,
            output_dir: default_output_dir(),
            output: None,
            queue_capacity: default_queue_capacity(),
            persist_threads: default_persist_threads(),
            seed: None,
            min_runtime_ms: 0,
        }
    }
}

impl Config {
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| file_io(path, e))?;
        let config = Self::from_yaml(&text).map_err(|e| file_io(path, e))?;
        Ok(config)
    }

    pub fn from_yaml(yaml: &str) -> std::result::Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(yaml)
    }

    /// Check the options needed to run the pipeline.
    pub fn validate(&self) -> Result<()> {
        self.validate_sources()?;

        if self.barcode_file.is_none() {
            return Err(Error::MissingOption("barcodeFile"));
        }

        if let Some(first) = self.overhang.first() {
            if self.overhang.iter().any(|o| o.len() != first.len()) {
                return Err(Error::MismatchedOverhangs(self.overhang.clone()));
            }
        }

        if !self.min_quality.is_ascii() {
            return Err(Error::Config {
                option: "minQuality",
                reason: format!("'{}' is not an ASCII quality score", self.min_quality),
            });
        }
        if self.queue_capacity == 0 {
            return Err(Error::Config {
                option: "queueCapacity",
                reason: "must be at least 1".to_owned(),
            });
        }
        if self.persist_threads == 0 {
            return Err(Error::Config {
                option: "persistThreads",
                reason: "must be at least 1".to_owned(),
            });
        }

        Ok(())
    }

    /// Check the options needed to read input pairs and retain a fraction of them.
    pub fn validate_sources(&self) -> Result<()> {
        if self.source_file_forward.is_empty() {
            if self.source_file_interleaved.is_empty() {
                return Err(Error::MissingOption("sourceFileForward"));
            }
        } else {
            let forward = self.source_file_forward.to_vec().len();
            let reverse = self.source_file_reverse.to_vec().len();
            if reverse == 0 {
                return Err(Error::MissingOption("sourceFileReverse"));
            }
            if forward != reverse {
                return Err(Error::Config {
                    option: "sourceFileReverse",
                    reason: format!("expected {forward} files to match sourceFileForward, got {reverse}"),
                });
            }
        }

        if self.percent_to_retain > 100 {
            return Err(Error::Config {
                option: "percentToRetain",
                reason: format!("{} is not a percentage", self.percent_to_retain),
            });
        }

        Ok(())
    }

    pub fn pipeline_options(&self) -> PipelineOptions {
        PipelineOptions {
            fuzzy: self.fuzzy_match,
            min_quality: self.min_quality as u8,
            queue_capacity: self.queue_capacity,
            persist_threads: self.persist_threads,
            min_runtime: Duration::from_millis(self.min_runtime_ms),
        }
    }

    /// Whether the input is one interleaved stream instead of separate mates.
    pub fn is_interleaved(&self) -> bool {
        self.source_file_forward.is_empty()
    }
}
