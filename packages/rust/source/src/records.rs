//! Streaming logical records out of delimited text.
//!
//! Consecutive rows sharing an id are merged into one [`LogicalRecord`]
//! by concatenating their content. Only the record under construction is
//! held in memory.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use csv::{ReaderBuilder, StringRecord};
use tracing::debug;

use bulkingest_shared::{IngestError, LogicalRecord, ParserConfig, RecordId, Result, ascii_byte};

/// Record being accumulated from one or more rows.
struct Pending {
    id: RecordId,
    text: String,
}

impl Pending {
    fn into_record(self) -> LogicalRecord {
        LogicalRecord {
            id: self.id,
            text: self.text,
        }
    }
}

/// Lazy, single-pass iterator of merged records.
///
/// Yields `Err` once on a malformed row and then ends.
pub struct RecordStream<R: Read> {
    reader: csv::Reader<R>,
    row: StringRecord,
    content_idx: usize,
    id_idx: Option<usize>,
    max_field_size: Option<usize>,
    /// `None` until the first row with an id column has been read.
    pending: Option<Pending>,
    next_seq: i64,
    finished: bool,
}

impl RecordStream<File> {
    /// Open a CSV file for streaming.
    pub fn open(path: &Path, config: &ParserConfig) -> Result<Self> {
        let file = File::open(path).map_err(|e| IngestError::io(path, e))?;
        debug!(path = %path.display(), "streaming records from csv");
        Self::from_reader(file, config)
    }
}

impl<R: Read> RecordStream<R> {
    /// Build a stream from any reader. The header row is read eagerly so a
    /// missing content column fails here rather than mid-import.
    pub fn from_reader(reader: R, config: &ParserConfig) -> Result<Self> {
        let mut reader = ReaderBuilder::new()
            .has_headers(true)
            .delimiter(ascii_byte(config.delimiter, "delimiter")?)
            .flexible(false)
            .from_reader(reader);

        let headers = reader.headers().map_err(csv_error)?.clone();

        let mut stream = Self {
            reader,
            row: StringRecord::new(),
            content_idx: 0,
            id_idx: None,
            max_field_size: config.max_field_size,
            pending: None,
            next_seq: 1,
            finished: false,
        };

        // Nothing at all, not even a header: an empty source.
        if headers.is_empty() {
            stream.finished = true;
            return Ok(stream);
        }

        stream.content_idx = column_index(&headers, &config.content_column)?;
        stream.id_idx = config
            .id_column
            .as_deref()
            .map(|name| column_index(&headers, name))
            .transpose()?;

        Ok(stream)
    }

    fn check_field_sizes(&self) -> Result<()> {
        let Some(limit) = self.max_field_size else {
            return Ok(());
        };
        match self.row.iter().find(|field| field.len() > limit) {
            Some(field) => Err(IngestError::parse(format!(
                "field of {} bytes exceeds field limit ({limit}) at line {}",
                field.len(),
                self.row.position().map_or(0, |p| p.line())
            ))),
            None => Ok(()),
        }
    }

    fn fail(&mut self, err: IngestError) -> Option<Result<LogicalRecord>> {
        self.finished = true;
        self.pending = None;
        Some(Err(err))
    }
}

impl<R: Read> Iterator for RecordStream<R> {
    type Item = Result<LogicalRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }

        loop {
            match self.reader.read_record(&mut self.row) {
                Ok(true) => {}
                Ok(false) => {
                    self.finished = true;
                    return self
                        .pending
                        .take()
                        .filter(|p| !p.text.is_empty())
                        .map(|p| Ok(p.into_record()));
                }
                Err(e) => return self.fail(csv_error(e)),
            }

            if let Err(e) = self.check_field_sizes() {
                return self.fail(e);
            }

            let Some(content) = self.row.get(self.content_idx) else {
                let line = self.row.position().map_or(0, |p| p.line());
                return self.fail(IngestError::parse(format!(
                    "row at line {line} has no content field"
                )));
            };

            let Some(id_idx) = self.id_idx else {
                // Without an id column every non-empty row is its own record.
                if content.is_empty() {
                    continue;
                }
                let id = self.next_seq;
                self.next_seq += 1;
                return Some(Ok(LogicalRecord::new(id, content)));
            };

            let id = RecordId::Text(self.row.get(id_idx).unwrap_or_default().to_owned());
            if let Some(current) = self.pending.as_mut().filter(|p| p.id == id) {
                current.text.push_str(content);
                continue;
            }

            let previous = self.pending.replace(Pending {
                id,
                text: content.to_owned(),
            });
            if let Some(done) = previous.filter(|p| !p.text.is_empty()) {
                return Some(Ok(done.into_record()));
            }
        }
    }
}

fn column_index(headers: &StringRecord, name: &str) -> Result<usize> {
    headers
        .iter()
        .position(|h| h == name)
        .ok_or_else(|| IngestError::parse(format!("missing required column '{name}'")))
}

pub(crate) fn csv_error(e: csv::Error) -> IngestError {
    match e.position() {
        Some(pos) => IngestError::parse(format!("line {}: {e}", pos.line())),
        None => IngestError::parse(e.to_string()),
    }
}
