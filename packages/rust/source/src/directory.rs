//! One whole-file record per immediate child file of a directory.

use std::fs::ReadDir;
use std::path::{Path, PathBuf};

use tracing::{debug, trace};

use bulkingest_shared::{IngestError, LogicalRecord, Result};

/// Lazy iterator over the files of a directory, in listing order.
///
/// Ids are zero-based positions among files; subdirectories are skipped
/// without consuming an id and are never descended into.
pub struct DirectoryRecords {
    dir: PathBuf,
    entries: ReadDir,
    index: i64,
}

impl DirectoryRecords {
    pub fn open(dir: &Path) -> Result<Self> {
        let entries = std::fs::read_dir(dir).map_err(|e| IngestError::io(dir, e))?;
        debug!(dir = %dir.display(), "streaming records from directory");
        Ok(Self {
            dir: dir.to_path_buf(),
            entries,
            index: 0,
        })
    }
}

impl Iterator for DirectoryRecords {
    type Item = Result<LogicalRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let entry = match self.entries.next()? {
                Ok(entry) => entry,
                Err(e) => return Some(Err(IngestError::io(&self.dir, e))),
            };
            let path = entry.path();
            if !path.is_file() {
                trace!(path = %path.display(), "skipping non-file entry");
                continue;
            }

            let bytes = match std::fs::read(&path) {
                Ok(bytes) => bytes,
                Err(e) => return Some(Err(IngestError::io(&path, e))),
            };
            let id = self.index;
            self.index += 1;
            return Some(Ok(LogicalRecord::new(
                id,
                String::from_utf8_lossy(&bytes).into_owned(),
            )));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bulkingest_shared::RecordId;

    #[test]
    fn one_record_per_file_with_listing_order_ids() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.txt"), "alpha").unwrap();
        std::fs::write(dir.path().join("b.txt"), "beta").unwrap();
        std::fs::create_dir(dir.path().join("nested")).unwrap();
        std::fs::write(dir.path().join("nested").join("c.txt"), "gamma").unwrap();

        let expected_order: Vec<String> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().path())
            .filter(|p| p.is_file())
            .map(|p| std::fs::read_to_string(p).unwrap())
            .collect();

        let records = DirectoryRecords::open(dir.path())
            .unwrap()
            .collect::<Result<Vec<_>>>()
            .unwrap();

        assert_eq!(records.len(), 2);
        for (i, record) in records.iter().enumerate() {
            assert_eq!(record.id, RecordId::Int(i as i64));
            assert_eq!(record.text, expected_order[i]);
        }
        assert!(records.iter().all(|r| r.text != "gamma"));
    }

    #[test]
    fn empty_directory_yields_nothing() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(DirectoryRecords::open(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn missing_directory_is_an_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = DirectoryRecords::open(&dir.path().join("absent")).err().unwrap();
        assert!(matches!(err, IngestError::Io { .. }));
    }
}
