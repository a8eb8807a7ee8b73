use rustc_hash::FxHashMap;

use std::path::Path;

use crate::errors::*;
use crate::trie::BarcodeTrie;

/// Barcode to sample assignments, in file order.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct BarcodeTable {
    entries: Vec<(Vec<u8>, String)>,
}

impl BarcodeTable {
    /// Read a tab separated `barcode<TAB>sample[<TAB>...]` file.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read(path).map_err(|e| file_io(path, e))?;
        Ok(Self::from_tsv(&text))
    }

    /// Parse barcode lines. Lines without a barcode before the first tab are ignored.
    ///
    /// A barcode listed twice keeps the last sample.
    pub fn from_tsv(tsv: &[u8]) -> Self {
        let mut entries: Vec<(Vec<u8>, String)> = Vec::new();
        let mut idx: FxHashMap<Vec<u8>, usize> = FxHashMap::default();

        for line in tsv.split(|&b| b == b'\n') {
            let line = line.strip_suffix(b"\r").unwrap_or(line);

            let Some(tab) = memchr::memchr(b'\t', line) else {
                continue;
            };
            if tab == 0 {
                continue;
            }

            let barcode = line[..tab].to_owned();
            let rest = &line[tab + 1..];
            let sample = utf8(rest.split(|&b| b == b'\t').next().unwrap_or(rest));

            match idx.get(&barcode) {
                Some(&i) => entries[i].1 = sample,
                None => {
                    idx.insert(barcode.clone(), entries.len());
                    entries.push((barcode, sample));
                }
            }
        }

        Self { entries }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&[u8], &str)> {
        self.entries.iter().map(|(b, s)| (b.as_slice(), s.as_str()))
    }

    pub fn barcodes(&self) -> impl Iterator<Item = &[u8]> {
        self.entries.iter().map(|(b, _)| b.as_slice())
    }

    /// Build a trie holding every barcode of the table.
    pub fn to_trie<S: AsRef<[u8]>>(&self, overhangs: &[S]) -> Result<BarcodeTrie> {
        let mut trie = BarcodeTrie::new(overhangs)?;
        for barcode in self.barcodes() {
            trie.insert(barcode)?;
        }
        Ok(trie)
    }
}

/// Smallest number of substitutions between two distinct barcodes of the same length.
///
/// Barcodes of different lengths are never compared.
pub fn min_hamming_distance<'a>(barcodes: impl IntoIterator<Item = &'a [u8]>) -> Option<usize> {
    let barcodes = barcodes.into_iter().collect::<Vec<_>>();
    let mut min = None;

    for (i, a) in barcodes.iter().enumerate() {
        for b in &barcodes[i + 1..] {
            if a.len() != b.len() || a == b {
                continue;
            }
            let dist = a.iter().zip(b.iter()).filter(|(x, y)| x != y).count();
            min = Some(min.map_or(dist, |m: usize| m.min(dist)));
        }
    }

    min
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_table() {
        let table = BarcodeTable::from_tsv(b"AAAA\tfoo\nCCCC\tbar\tstuff\n\tnothing\nnotab\nAAAA\tbaz\r\n");

        assert_eq!(table.len(), 2);
        assert_eq!(
            table.iter().collect::<Vec<_>>(),
            vec![(&b"AAAA"[..], "baz"), (&b"CCCC"[..], "bar")]
        );
    }

    #[test]
    fn test_min_hamming_distance() {
        let barcodes: [&[u8]; 4] = [b"AAAA", b"AACA", b"CCCC", b"ACGTA"];
        assert_eq!(min_hamming_distance(barcodes), Some(1));

        let barcodes: [&[u8]; 2] = [b"AAAA", b"ACGTA"];
        assert_eq!(min_hamming_distance(barcodes), None);
    }
}
