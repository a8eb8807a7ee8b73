use crate::errors::*;

/// Symbols a barcode or overhang may contain, in child-slot order.
const SYMBOLS: [u8; 5] = *b"ACGTN";

fn symbol_idx(b: u8) -> Option<usize> {
    match b {
        b'A' => Some(0),
        b'C' => Some(1),
        b'G' => Some(2),
        b'T' => Some(3),
        b'N' => Some(4),
        _ => None,
    }
}

fn check_symbols(s: &[u8]) -> Result<()> {
    match s.iter().find(|&&b| symbol_idx(b).is_none()) {
        Some(&b) => Err(Error::InvalidBarcode {
            barcode: utf8(s),
            symbol: b as char,
        }),
        None => Ok(()),
    }
}

#[derive(Default)]
struct Node {
    children: [Option<Box<Node>>; SYMBOLS.len()],
    is_barcode: bool,
}

impl Node {
    fn child(&self, b: u8) -> Option<&Node> {
        self.children[symbol_idx(b)?].as_deref()
    }
}

/// Why a fuzzy match could not recover a barcode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FuzzyMiss {
    /// The read ended or no path through the trie exists.
    NoMatch,
    /// The mismatching position has a quality score at or above the threshold.
    QualityTooHigh,
    /// More than one distinct barcode could be reached with a single substitution.
    Ambiguous,
    /// No single substitution at a low quality position reaches a barcode.
    MultipleErrors,
}

type Walk = std::result::Result<(usize, Option<(usize, u8)>), FuzzyMiss>;

/// Prefix tree over every `barcode + overhang` combination.
///
/// Matching is greedy: the walk stops at the first complete path, and never looks
/// further than the longest barcode plus the overhang length.
pub struct BarcodeTrie {
    root: Node,
    overhangs: Vec<Vec<u8>>,
    overhang_len: usize,
    max_len: usize,
}

impl BarcodeTrie {
    /// Create an empty trie where every barcode is followed by one of `overhangs`.
    ///
    /// All overhangs must share one length. An empty set means no overhang.
    pub fn new<S: AsRef<[u8]>>(overhangs: &[S]) -> Result<Self> {
        let mut overhangs = overhangs
            .iter()
            .map(|o| o.as_ref().to_owned())
            .collect::<Vec<_>>();

        if overhangs.is_empty() {
            overhangs.push(Vec::new());
        }

        let overhang_len = overhangs[0].len();

        if overhangs.iter().any(|o| o.len() != overhang_len) {
            return Err(Error::MismatchedOverhangs(
                overhangs.iter().map(|o| utf8(o)).collect(),
            ));
        }

        for overhang in &overhangs {
            check_symbols(overhang)?;
        }

        overhangs.sort_unstable();
        overhangs.dedup();

        Ok(Self {
            root: Node::default(),
            overhangs,
            overhang_len,
            max_len: overhang_len,
        })
    }

    /// Add a barcode, once per overhang. Inserting the same barcode again is a no-op.
    pub fn insert(&mut self, barcode: &[u8]) -> Result<()> {
        check_symbols(barcode)?;

        for overhang in &self.overhangs {
            let mut node = &mut self.root;

            for &b in barcode.iter().chain(overhang) {
                // symbols were checked above
                let slot = &mut node.children[symbol_idx(b).unwrap_or(SYMBOLS.len() - 1)];
                node = slot.get_or_insert_with(Box::default).as_mut();
            }

            node.is_barcode = true;
        }

        self.max_len = self.max_len.max(barcode.len() + self.overhang_len);
        Ok(())
    }

    pub fn overhang_len(&self) -> usize {
        self.overhang_len
    }

    /// Longest prefix (barcode plus overhang) that is ever inspected.
    pub fn max_len(&self) -> usize {
        self.max_len
    }

    /// Length of the barcode that `seq` starts with, excluding the overhang.
    ///
    /// Returns 0 if no barcode matches.
    pub fn exact_match(&self, seq: &[u8]) -> usize {
        self.exact_walk(&self.root, seq, 0)
            .map_or(0, |depth| depth - self.overhang_len)
    }

    /// Recover the barcode that `seq` starts with, allowing one substitution at a
    /// position whose quality is below `min_quality`.
    ///
    /// The correction is only accepted if it leads to exactly one barcode. Candidates
    /// that only differ in the overhang count as the same barcode.
    pub fn fuzzy_match(
        &self,
        seq: &[u8],
        qual: &[u8],
        min_quality: u8,
    ) -> std::result::Result<Vec<u8>, FuzzyMiss> {
        let (depth, fix) = self.fuzzy_walk(&self.root, seq, qual, min_quality, 0)?;
        let len = depth - self.overhang_len;

        let mut barcode = seq[..len].to_owned();
        if let Some((pos, symbol)) = fix {
            if pos < len {
                barcode[pos] = symbol;
            }
        }

        Ok(barcode)
    }

    fn exact_walk(&self, mut node: &Node, seq: &[u8], mut pos: usize) -> Option<usize> {
        loop {
            if node.is_barcode {
                return Some(pos);
            }
            if pos == self.max_len {
                return None;
            }
            node = node.child(*seq.get(pos)?)?;
            pos += 1;
        }
    }

    fn fuzzy_walk(&self, node: &Node, seq: &[u8], qual: &[u8], min_quality: u8, pos: usize) -> Walk {
        if node.is_barcode {
            return Ok((pos, None));
        }
        if pos == self.max_len || pos >= seq.len() {
            return Err(FuzzyMiss::NoMatch);
        }

        let deeper = match node.child(seq[pos]) {
            Some(child) => match self.fuzzy_walk(child, seq, qual, min_quality, pos + 1) {
                Ok(found) => return Ok(found),
                Err(miss) => Some(miss),
            },
            None => None,
        };

        let low_quality = qual.get(pos).map_or(false, |&q| q < min_quality);
        if !low_quality {
            return Err(deeper.unwrap_or(FuzzyMiss::QualityTooHigh));
        }

        // (terminal depth, corrected symbol if it lies inside the barcode)
        let mut first: Option<((usize, Option<u8>), u8)> = None;

        for (i, child) in node.children.iter().enumerate() {
            let Some(child) = child.as_deref() else {
                continue;
            };
            let Some(depth) = self.exact_walk(child, seq, pos + 1) else {
                continue;
            };

            let symbol = SYMBOLS[i];
            let key = (depth, (pos < depth - self.overhang_len).then_some(symbol));

            match first {
                None => first = Some((key, symbol)),
                Some((k, _)) if k != key => return Err(FuzzyMiss::Ambiguous),
                Some(_) => (),
            }
        }

        match first {
            Some(((depth, _), symbol)) => Ok((depth, Some((pos, symbol)))),
            None => Err(deeper.unwrap_or(FuzzyMiss::MultipleErrors)),
        }
    }
}
