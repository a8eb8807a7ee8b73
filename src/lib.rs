//! Barcode recovery and routing for paired-end FASTQ files.
//!
//! # Overview
//! Each forward read starts with a short barcode identifying its sample, usually followed
//! by a fixed length overhang left by the restriction enzyme. This crate finds that
//! barcode, optionally corrects one low quality symbol in it, and then either
//! * writes each pair to the files of its sample ([`Mode::Demultiplex`]), or
//! * moves the barcode onto the reverse mate and writes one interleaved file ([`Mode::Attach`]).
//!
//! ## Matching
//! Barcodes are stored in a [`BarcodeTrie`] once per overhang. [`BarcodeTrie::exact_match`]
//! walks the trie greedily and stops at the first complete barcode.
//! [`BarcodeTrie::fuzzy_match`] may replace one symbol whose quality is below a threshold,
//! but only if that leads to exactly one barcode.
//!
//! ## Pipeline
//! A [`Pipeline`] has one load stage that reads and matches pairs, and several persist
//! stages that hand them to an [`OutputRouter`]. Pairs travel in a fixed pool of reusable
//! [`ReadPair`] slots, so the reader can never run far ahead of the writers. When the input
//! runs out the persist stages are cancelled, write out whatever is still queued, and only
//! then are the outputs closed.
//!
//! ## Downsampling
//! A [`RetentionStrategy`] keeps a random or leading fraction of the input, either inside
//! the pipeline or on its own through [`downsample`].

pub mod barcodes;
pub mod config;
pub mod downsample;
pub mod errors;
pub mod fastq;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod read;
pub mod retain;
pub mod runner;
pub mod stats;
pub mod trie;
pub mod truncate;

// commonly used functions and types

pub use crate::barcodes::*;
pub use crate::config::*;
pub use crate::downsample::*;
pub use crate::errors::*;
pub use crate::fastq::*;
pub use crate::output::*;
pub use crate::pipeline::*;
pub use crate::progress::*;
pub use crate::read::*;
pub use crate::retain::*;
pub use crate::runner::*;
pub use crate::stats::*;
pub use crate::trie::*;
pub use crate::truncate::*;
