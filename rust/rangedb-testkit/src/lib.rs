//! Test fixtures for the rangedb crates.
//!
//! This crate provides:
//! - An in-memory index file writer (meta pages, bulk-loaded B+Trees)
//! - JSON Lines and CSV data file writers
//! - A dataset builder pairing a data file with its index
//! - A resolver wrapper counting the ranges a reader requests
//!
//! It is intended for use as a dev-dependency only.

pub mod counting;
pub mod data_writer;
pub mod dataset;
pub mod index_writer;

pub use counting::CountingResolver;
pub use data_writer::{CsvWriter, JsonlWriter};
pub use dataset::{Dataset, DatasetBuilder};
pub use index_writer::{EntrySpec, IndexWriter};

use rangedb_format::{FileFormat, FileMeta};

/// File metadata for a JSON Lines data file of `len` bytes holding `entries` records.
pub fn jsonl_file_meta(len: usize, entries: usize) -> FileMeta {
    FileMeta {
        version: 1,
        format: FileFormat::Jsonl,
        read_offset: len as u64,
        entries: entries as u64,
    }
}
