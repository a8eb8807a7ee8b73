use thiserror;

use std::fmt;

use crate::runner::RunSummary;

pub type Result<T> = std::result::Result<T, Error>;

pub type BoxedError = Box<dyn std::error::Error + Send + Sync>;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("Error reading or writing \"{file}\": {source}")]
    FileIo { file: String, source: BoxedError },

    #[error("Unpaired read in {0}")]
    UnpairedRead(String),

    #[error("Error parsing record {idx} in {origin}: {source}")]
    ParseRecord {
        origin: Origin,
        idx: usize,
        source: BoxedError,
    },

    #[error("Invalid value for option \"{option}\": {reason}")]
    Config { option: &'static str, reason: String },

    #[error("Missing required option \"{0}\"")]
    MissingOption(&'static str),

    #[error("All overhangs must be the same length, got {0:?}")]
    MismatchedOverhangs(Vec<String>),

    #[error("Barcode \"{barcode}\" contains the unsupported symbol '{symbol}'")]
    InvalidBarcode { barcode: String, symbol: char },

    #[error("No output was created for barcode \"{0}\"")]
    UnknownBarcode(String),

    #[error("The {0} stage panicked")]
    WorkerPanicked(&'static str),

    /// A run that stopped part way, with the counts gathered up to the failure.
    #[error("{source}")]
    Interrupted {
        source: Box<Error>,
        summary: Box<RunSummary>,
    },
}

/// Where a record came from, for error messages.
#[derive(Debug, Clone, PartialEq)]
pub enum Origin {
    File(String),
    Files(Vec<String>),
    Bytes,
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        use Origin::*;
        match self {
            File(file) => write!(f, "file \"{}\"", file),
            Files(files) => write!(f, "files \"{}\"", files.join("\", \"")),
            Bytes => write!(f, "bytes"),
        }
    }
}

pub fn file_io(file: impl AsRef<std::path::Path>, e: impl Into<BoxedError>) -> Error {
    Error::FileIo {
        file: file.as_ref().display().to_string(),
        source: e.into(),
    }
}

pub fn utf8(b: &[u8]) -> String {
    String::from_utf8_lossy(b).into_owned()
}
