use memchr::memchr_iter;

use std::fmt;

use crate::errors::*;

/// Barcodes shorter than this are never used for routing.
pub const MIN_BARCODE_LEN: usize = 4;

/// Initial capacity of each line buffer, large enough for common read lengths.
const LINE_CAPACITY: usize = 400;

/// One FASTQ record.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FastqRecord {
    pub name: Vec<u8>,
    pub seq: Vec<u8>,
    /// Separator line after the `+`, usually empty but sometimes a copy of the name.
    pub sep: Vec<u8>,
    pub qual: Vec<u8>,
}

impl FastqRecord {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            name: Vec::with_capacity(capacity),
            seq: Vec::with_capacity(capacity),
            sep: Vec::new(),
            qual: Vec::with_capacity(capacity),
        }
    }

    /// Overwrite the record in place, reusing the existing allocations. The separator
    /// is reset to a bare `+`.
    pub fn set(&mut self, name: &[u8], seq: &[u8], qual: &[u8]) {
        self.name.clear();
        self.name.extend_from_slice(name);
        self.seq.clear();
        self.seq.extend_from_slice(seq);
        self.sep.clear();
        self.qual.clear();
        self.qual.extend_from_slice(qual);
    }
}

/// A reusable slot holding one forward/reverse record pair and its match outcome.
///
/// Slots are allocated once and circulated between the pipeline stages by value.
#[derive(Debug, Clone)]
pub struct ReadPair {
    pub forward: FastqRecord,
    pub reverse: FastqRecord,
    /// Length of the exactly matched barcode at the start of the forward read, 0 if none.
    pub barcode_len: usize,
    /// Barcode recovered by correcting one symbol.
    pub fuzzed: Option<Vec<u8>>,
}

impl Default for ReadPair {
    fn default() -> Self {
        Self::new()
    }
}

impl ReadPair {
    pub fn new() -> Self {
        Self {
            forward: FastqRecord::with_capacity(LINE_CAPACITY),
            reverse: FastqRecord::with_capacity(LINE_CAPACITY),
            barcode_len: 0,
            fuzzed: None,
        }
    }

    pub fn clear_match(&mut self) {
        self.barcode_len = 0;
        self.fuzzed = None;
    }

    pub fn is_exact(&self) -> bool {
        self.barcode_len >= MIN_BARCODE_LEN
    }

    /// The barcode this pair should be routed by, if any.
    pub fn barcode(&self) -> Option<&[u8]> {
        if self.is_exact() {
            Some(&self.forward.seq[..self.barcode_len])
        } else {
            self.fuzzed.as_deref()
        }
    }

    /// Number of forward symbols occupied by the barcode.
    pub fn barcode_span(&self) -> usize {
        self.barcode().map_or(0, |b| b.len())
    }
}

impl fmt::Display for ReadPair {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        for record in [&self.forward, &self.reverse] {
            writeln!(f, "@{}", utf8(&record.name))?;
            writeln!(f, "{}", utf8(&record.seq))?;
            writeln!(f, "+{}", utf8(&record.sep))?;
            writeln!(f, "{}", utf8(&record.qual))?;
        }
        match self.barcode() {
            Some(b) if self.fuzzed.is_some() => write!(f, "fuzzed barcode: {}", utf8(b)),
            Some(b) => write!(f, "barcode: {}", utf8(b)),
            None => write!(f, "no barcode"),
        }
    }
}

const HEADER_FIELDS: usize = 5;

/// Whether two mate headers agree on their first five colon separated fields.
///
/// Both headers need at least five colons, and must be identical up to and
/// including the fifth one.
pub fn headers_in_sync(forward: &[u8], reverse: &[u8]) -> bool {
    let Some(end) = memchr_iter(b':', forward).nth(HEADER_FIELDS - 1) else {
        return false;
    };
    reverse.len() > end && forward[..=end] == reverse[..=end]
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEADER: &[u8] = b"A00589:100:HLKHHDMXX:1:1101:1217:1000:1:N:0:GACTAGGAGC+TAGTACAGGC";

    #[test]
    fn test_headers_in_sync() {
        assert!(headers_in_sync(HEADER, HEADER));
        assert!(headers_in_sync(
            HEADER,
            b"A00589:100:HLKHHDMXX:1:1101:9999:1000:2:N:0:GACTAGGAGC+TAGTACAGGC"
        ));
        assert!(!headers_in_sync(
            HEADER,
            b"A00589:100:HLKHHDMXX:2:1101:1217:1000:2:N:0:GACTAGGAGC+TAGTACAGGC"
        ));
        assert!(!headers_in_sync(b"a:b:c:d", b"a:b:c:d"));
        assert!(!headers_in_sync(b"a:b:c:d:e:f", b"a:b:c:d:e"));
        assert!(headers_in_sync(b"a:b:c:d:e:", b"a:b:c:d:e:f"));
    }

    #[test]
    fn test_barcode() {
        let mut pair = ReadPair::new();
        pair.forward.set(b"r", b"AAAACAGC", b"FFFFFFFF");
        assert_eq!(pair.barcode(), None);

        pair.barcode_len = 3;
        assert_eq!(pair.barcode(), None);

        pair.barcode_len = 4;
        assert_eq!(pair.barcode(), Some(&b"AAAA"[..]));

        pair.clear_match();
        pair.fuzzed = Some(b"AAAC".to_vec());
        assert_eq!(pair.barcode(), Some(&b"AAAC"[..]));
        assert_eq!(pair.barcode_span(), 4);
    }
}
