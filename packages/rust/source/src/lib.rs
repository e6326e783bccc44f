//! Streaming sources for bulkingest.
//!
//! This crate provides:
//! - [`RecordStream`]: CSV rows merged into logical records by id
//! - [`DirectoryRecords`]: one record per file in a directory
//! - [`EdgeRows`]: raw edges from an adjacency list
//! - [`TextSource`]: picks the record source for a path

pub mod directory;
pub mod edges;
pub mod records;

use std::fs::File;
use std::path::Path;

use bulkingest_shared::{IngestError, LogicalRecord, ParserConfig, Result};

pub use directory::DirectoryRecords;
pub use edges::EdgeRows;
pub use records::RecordStream;

/// A text record source chosen from the shape of a path.
pub enum TextSource {
    Csv(RecordStream<File>),
    Directory(DirectoryRecords),
}

impl TextSource {
    /// `.csv` files stream merged rows; directories yield one record per file.
    pub fn open(path: &Path, config: &ParserConfig) -> Result<Self> {
        if path.is_dir() {
            return Ok(Self::Directory(DirectoryRecords::open(path)?));
        }
        let is_csv = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("csv"));
        if is_csv {
            return Ok(Self::Csv(RecordStream::open(path, config)?));
        }
        Err(IngestError::config(format!(
            "unsupported text source '{}': expected a .csv file or a directory",
            path.display()
        )))
    }
}

impl Iterator for TextSource {
    type Item = Result<LogicalRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        match self {
            Self::Csv(stream) => stream.next(),
            Self::Directory(records) => records.next(),
        }
    }
}
