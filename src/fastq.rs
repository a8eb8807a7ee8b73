use flate2::read::MultiGzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use log::warn;
use memchr::memchr_iter;
use needletail::errors::ParseErrorKind;
use needletail::{parse_fastx_reader, FastxReader};

use std::collections::VecDeque;
use std::fs::{File, OpenOptions};
use std::io::{self, BufRead, BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use crate::errors::*;
use crate::read::*;

const BUF_SIZE: usize = 1 << 16;
const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

pub type GzWriter = BufWriter<GzEncoder<File>>;

/// Open a file for reading, decompressing it if it starts with the gzip magic bytes.
pub fn open_input(path: &Path) -> io::Result<Box<dyn Read + Send>> {
    let with_path = |e: io::Error| io::Error::new(e.kind(), format!("{}: {e}", path.display()));

    let mut reader = BufReader::with_capacity(BUF_SIZE, File::open(path).map_err(with_path)?);
    let gzipped = reader.fill_buf().map_err(with_path)?.starts_with(&GZIP_MAGIC);

    if gzipped {
        Ok(Box::new(MultiGzDecoder::new(reader)))
    } else {
        Ok(Box::new(reader))
    }
}

/// Total on-disk size of the files.
pub fn input_size(paths: &[PathBuf]) -> Result<u64> {
    paths.iter().try_fold(0, |total, path| {
        let meta = std::fs::metadata(path).map_err(|e| file_io(path, e))?;
        Ok(total + meta.len())
    })
}

/// Create a gzip writer, appending a new gzip member if `append` is set.
pub fn create_gz(path: &Path, append: bool) -> Result<GzWriter> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent).map_err(|e| file_io(parent, e))?;
        }
    }

    let file = OpenOptions::new()
        .create(true)
        .write(true)
        .append(append)
        .truncate(!append)
        .open(path)
        .map_err(|e| file_io(path, e))?;

    Ok(BufWriter::with_capacity(
        BUF_SIZE,
        GzEncoder::new(file, Compression::default()),
    ))
}

/// Flush the buffer and write the gzip trailer.
pub fn finish_gz(writer: GzWriter) -> io::Result<()> {
    let encoder = writer.into_inner().map_err(|e| e.into_error())?;
    encoder.finish()?.flush()
}

/// Reads several files one after the other as one continuous stream.
///
/// Each file is decompressed on its own, so plain and gzipped files can be mixed.
/// A newline is inserted between files when the previous one does not end with one.
pub struct MultiSourceReader {
    remaining: VecDeque<PathBuf>,
    current: Option<Box<dyn Read + Send>>,
    last: Option<u8>,
}

impl MultiSourceReader {
    pub fn new(paths: &[PathBuf]) -> Self {
        Self {
            remaining: paths.iter().cloned().collect(),
            current: None,
            last: None,
        }
    }
}

impl Read for MultiSourceReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }

        loop {
            if self.current.is_none() {
                let Some(path) = self.remaining.pop_front() else {
                    return Ok(0);
                };
                self.current = Some(open_input(&path)?);

                if self.last.map_or(false, |b| b != b'\n') {
                    self.last = Some(b'\n');
                    buf[0] = b'\n';
                    return Ok(1);
                }
            }

            if let Some(current) = self.current.as_mut() {
                let n = current.read(buf)?;
                if n > 0 {
                    self.last = Some(buf[n - 1]);
                    return Ok(n);
                }
            }

            self.current = None;
        }
    }
}

/// Sequential FASTQ records from one logical stream.
pub struct FastqSource<'a> {
    reader: Option<Box<dyn FastxReader + 'a>>,
    origin: Origin,
    idx: usize,
}

impl FastqSource<'static> {
    /// Records from the files, read back to back.
    pub fn from_paths(paths: &[PathBuf]) -> Result<Self> {
        let origin = match paths {
            [path] => Origin::File(path.display().to_string()),
            _ => Origin::Files(paths.iter().map(|p| p.display().to_string()).collect()),
        };
        Self::from_reader(MultiSourceReader::new(paths), origin)
    }
}

impl<'a> FastqSource<'a> {
    pub fn from_bytes(bytes: &'a [u8]) -> Result<Self> {
        Self::from_reader(bytes, Origin::Bytes)
    }

    fn from_reader<R: Read + Send + 'a>(reader: R, origin: Origin) -> Result<Self> {
        let reader = match parse_fastx_reader(reader) {
            Ok(reader) => Some(reader),
            // an empty stream just has no records
            Err(e) if e.kind == ParseErrorKind::EmptyFile => None,
            Err(e) => {
                return Err(Error::ParseRecord {
                    origin,
                    idx: 0,
                    source: Box::new(e),
                })
            }
        };

        Ok(Self {
            reader,
            origin,
            idx: 0,
        })
    }

    pub fn origin(&self) -> &Origin {
        &self.origin
    }

    /// Copy the next record into `record`. Returns `false` at the end of the stream.
    pub fn next_into(&mut self, record: &mut FastqRecord) -> Result<bool> {
        let Some(reader) = self.reader.as_mut() else {
            return Ok(false);
        };
        let Some(next) = reader.next() else {
            return Ok(false);
        };

        let next = next.map_err(|e| Error::ParseRecord {
            origin: self.origin.clone(),
            idx: self.idx,
            source: Box::new(e),
        })?;

        record.set(next.id(), &next.seq(), next.qual().unwrap_or(&[]));
        record.sep.extend_from_slice(separator(next.all()));
        self.idx += 1;
        Ok(true)
    }
}

/// The third line of a raw FASTQ record without its leading `+`.
fn separator(raw: &[u8]) -> &[u8] {
    let mut newlines = memchr_iter(b'\n', raw);
    let (Some(_), Some(start), Some(end)) = (newlines.next(), newlines.next(), newlines.next())
    else {
        return &[];
    };

    let line = &raw[start + 1..end];
    let line = line.strip_suffix(b"\r").unwrap_or(line);
    line.strip_prefix(b"+").unwrap_or(line)
}

/// Where read pairs come from.
pub enum PairSource<'a> {
    /// Forward and reverse mates in separate streams, in the same order.
    Paired {
        forward: FastqSource<'a>,
        reverse: FastqSource<'a>,
    },
    /// Each forward record directly followed by its reverse mate.
    Interleaved(FastqSource<'a>),
}

impl PairSource<'static> {
    pub fn paired(forward: &[PathBuf], reverse: &[PathBuf]) -> Result<Self> {
        Ok(Self::Paired {
            forward: FastqSource::from_paths(forward)?,
            reverse: FastqSource::from_paths(reverse)?,
        })
    }

    pub fn interleaved(paths: &[PathBuf]) -> Result<Self> {
        Ok(Self::Interleaved(FastqSource::from_paths(paths)?))
    }
}

impl<'a> PairSource<'a> {
    /// Fill `pair` with the next record pair. Returns `false` once the forward
    /// records run out.
    pub fn next_pair(&mut self, pair: &mut ReadPair) -> Result<bool> {
        use PairSource::*;
        match self {
            Paired { forward, reverse } => {
                if !forward.next_into(&mut pair.forward)? {
                    if reverse.next_into(&mut pair.reverse)? {
                        warn!(
                            "Ignoring reverse records in {} without a forward mate",
                            reverse.origin()
                        );
                    }
                    return Ok(false);
                }
                if !reverse.next_into(&mut pair.reverse)? {
                    return Err(Error::UnpairedRead(forward.origin().to_string()));
                }
                Ok(true)
            }
            Interleaved(source) => {
                if !source.next_into(&mut pair.forward)? {
                    return Ok(false);
                }
                if !source.next_into(&mut pair.reverse)? {
                    return Err(Error::UnpairedRead(source.origin().to_string()));
                }
                Ok(true)
            }
        }
    }
}

/// Write one record whose sequence and quality lines are the concatenation of parts.
pub fn write_fastq_record(
    writer: &mut (impl Write + ?Sized),
    name: &[u8],
    seq: &[&[u8]],
    sep: &[u8],
    qual: &[&[u8]],
) -> io::Result<()> {
    writer.write_all(b"@")?;
    writer.write_all(name)?;
    writer.write_all(b"\n")?;
    for part in seq {
        writer.write_all(part)?;
    }
    writer.write_all(b"\n+")?;
    writer.write_all(sep)?;
    writer.write_all(b"\n")?;
    for part in qual {
        writer.write_all(part)?;
    }
    writer.write_all(b"\n")
}

pub fn write_record(writer: &mut (impl Write + ?Sized), record: &FastqRecord) -> io::Result<()> {
    write_fastq_record(writer, &record.name, &[&record.seq], &record.sep, &[&record.qual])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interleaved_pairs() {
        let bytes = b"@a/1\nACGT\n+\nFFFF\n@a/2\nTTTT\n+\nFF,F\n@b/1\nGG\n+\nFF\n";
        let mut source = PairSource::Interleaved(FastqSource::from_bytes(bytes).unwrap());
        let mut pair = ReadPair::new();

        assert!(source.next_pair(&mut pair).unwrap());
        assert_eq!(pair.forward.name, b"a/1");
        assert_eq!(pair.reverse.seq, b"TTTT");
        assert_eq!(pair.reverse.qual, b"FF,F");

        assert!(matches!(source.next_pair(&mut pair), Err(Error::UnpairedRead(_))));
    }

    #[test]
    fn test_paired_sources() {
        let mut source = PairSource::Paired {
            forward: FastqSource::from_bytes(b"@a\nACGT\n+\nFFFF\n").unwrap(),
            reverse: FastqSource::from_bytes(b"@a\nCCCC\n+\nFFFF\n@b\nGG\n+\nFF\n").unwrap(),
        };
        let mut pair = ReadPair::new();

        assert!(source.next_pair(&mut pair).unwrap());
        assert_eq!(pair.forward.seq, b"ACGT");
        assert_eq!(pair.reverse.seq, b"CCCC");
        assert!(!source.next_pair(&mut pair).unwrap());
    }

    #[test]
    fn test_empty_source() {
        let mut source = FastqSource::from_bytes(b"").unwrap();
        let mut record = FastqRecord::default();
        assert!(!source.next_into(&mut record).unwrap());
    }

    #[test]
    fn test_multi_source_reader() {
        let dir = tempfile::tempdir().unwrap();
        let plain = dir.path().join("a.fq");
        std::fs::write(&plain, b"@a\nACGT\n+\nFFFF").unwrap();

        let gz = dir.path().join("b.fq.gz");
        let mut writer = create_gz(&gz, false).unwrap();
        writer.write_all(b"@b\nGG\n+\nFF\n").unwrap();
        finish_gz(writer).unwrap();

        let mut text = String::new();
        MultiSourceReader::new(&[plain.clone(), gz.clone()])
            .read_to_string(&mut text)
            .unwrap();
        assert_eq!(text, "@a\nACGT\n+\nFFFF\n@b\nGG\n+\nFF\n");

        let mut source = FastqSource::from_paths(&[plain, gz]).unwrap();
        let mut record = FastqRecord::default();
        assert!(source.next_into(&mut record).unwrap());
        assert!(source.next_into(&mut record).unwrap());
        assert_eq!(record.name, b"b");
        assert!(!source.next_into(&mut record).unwrap());
    }

    #[test]
    fn test_write_fastq_record() {
        let mut out = Vec::new();
        write_fastq_record(&mut out, b"r", &[b"AC", b"GT"], b"", &[b"FF", b",,"]).unwrap();
        assert_eq!(out, b"@r\nACGT\n+\nFF,,\n");
    }

    #[test]
    fn test_separator_is_kept() {
        let bytes = b"@r 1\nACGT\n+r 1\nFFFF\n@s\nGG\n+\r\nFF\r\n@t\nCC\n+t\nFF";
        let mut source = FastqSource::from_bytes(bytes).unwrap();
        let mut record = FastqRecord::default();
        let mut out = Vec::new();

        assert!(source.next_into(&mut record).unwrap());
        assert_eq!(record.sep, b"r 1");
        write_record(&mut out, &record).unwrap();

        assert!(source.next_into(&mut record).unwrap());
        assert!(record.sep.is_empty());
        write_record(&mut out, &record).unwrap();

        // last record without a trailing newline
        assert!(source.next_into(&mut record).unwrap());
        assert_eq!(record.sep, b"t");

        assert_eq!(out, b"@r 1\nACGT\n+r 1\nFFFF\n@s\nGG\n+\nFF\n");
    }
}
