//! Streaming raw edges out of adjacency lists.
//!
//! Each row is `from_id, to_id[, weight]`, or named columns when the file
//! has a header. Values are passed on as strings; numeric conversion and
//! dropping of bad rows belong to the validator.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use csv::{ReaderBuilder, StringRecord};
use serde_json::{Map, Value};
use tracing::debug;

use bulkingest_shared::{EdgeListConfig, IngestError, RawInput, Result, ascii_byte};

use crate::records::csv_error;

/// Field names assigned to headerless columns, in order.
const POSITIONAL_FIELDS: [&str; 3] = ["from_id", "to_id", "weight"];

/// Lazy iterator of raw edge mappings.
pub struct EdgeRows<R: Read> {
    reader: csv::Reader<R>,
    row: StringRecord,
    names: Vec<String>,
    finished: bool,
}

impl EdgeRows<File> {
    pub fn open(path: &Path, config: &EdgeListConfig) -> Result<Self> {
        let file = File::open(path).map_err(|e| IngestError::io(path, e))?;
        debug!(path = %path.display(), "streaming edges from adjacency list");
        Self::from_reader(file, config)
    }
}

impl<R: Read> EdgeRows<R> {
    pub fn from_reader(reader: R, config: &EdgeListConfig) -> Result<Self> {
        let comment = config
            .comment
            .map(|c| ascii_byte(c, "comment character"))
            .transpose()?;
        let mut reader = ReaderBuilder::new()
            .has_headers(config.has_headers)
            .delimiter(ascii_byte(config.delimiter, "delimiter")?)
            .comment(comment)
            .flexible(true)
            .trim(csv::Trim::All)
            .from_reader(reader);

        let names = if config.has_headers {
            reader
                .headers()
                .map_err(csv_error)?
                .iter()
                .map(str::to_owned)
                .collect()
        } else {
            POSITIONAL_FIELDS.iter().map(|s| (*s).to_owned()).collect()
        };

        Ok(Self {
            reader,
            row: StringRecord::new(),
            names,
            finished: false,
        })
    }
}

impl<R: Read> Iterator for EdgeRows<R> {
    type Item = Result<RawInput>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }
        match self.reader.read_record(&mut self.row) {
            Ok(true) => {
                let mut fields = Map::new();
                for (name, value) in self.names.iter().zip(self.row.iter()) {
                    if !value.is_empty() {
                        fields.insert(name.clone(), Value::from(value));
                    }
                }
                Some(Ok(RawInput::Mapping(fields)))
            }
            Ok(false) => {
                self.finished = true;
                None
            }
            Err(e) => {
                self.finished = true;
                Some(Err(csv_error(e)))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mappings(input: &str, config: &EdgeListConfig) -> Vec<Map<String, Value>> {
        EdgeRows::from_reader(input.as_bytes(), config)
            .unwrap()
            .map(|r| match r.unwrap() {
                RawInput::Mapping(m) => m,
                other => panic!("expected mapping, got {other:?}"),
            })
            .collect()
    }

    #[test]
    fn positional_rows_with_optional_weight() {
        let rows = mappings("1,2,0.5\n3,4\n", &EdgeListConfig::default());
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0]["from_id"], Value::from("1"));
        assert_eq!(rows[0]["weight"], Value::from("0.5"));
        assert!(!rows[1].contains_key("weight"));
    }

    #[test]
    fn comments_and_blank_lines_are_skipped() {
        let rows = mappings("# source: test\n1,2\n\n2, 3 \n", &EdgeListConfig::default());
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1]["to_id"], Value::from("3"));
    }

    #[test]
    fn named_columns_from_header() {
        let config = EdgeListConfig {
            has_headers: true,
            ..EdgeListConfig::default()
        };
        let rows = mappings("v_from,v_to,weight\n5,6,2\n", &config);
        assert_eq!(rows[0]["v_from"], Value::from("5"));
        assert_eq!(rows[0]["v_to"], Value::from("6"));
    }

    #[test]
    fn tab_separated() {
        let config = EdgeListConfig {
            delimiter: '\t',
            ..EdgeListConfig::default()
        };
        let rows = mappings("7\t8\n", &config);
        assert_eq!(rows[0]["to_id"], Value::from("8"));
    }
}
