use serde::{Deserialize, Serialize};

use crate::error::IngestionError;

/// A row-oriented table of text cells with a header row.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RowTable {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl RowTable {
    pub fn new(headers: Vec<String>, rows: Vec<Vec<String>>) -> Self {
        Self { headers, rows }
    }

    /// Parse comma-separated text. Double-quoted fields may contain commas,
    /// newlines and `""` escapes; an unclosed quote runs to the end of the
    /// input. Rows may be shorter or longer than the header. Blank lines are
    /// skipped.
    pub fn from_csv_str(text: &str) -> Result<Self, IngestionError> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_reader(text.as_bytes());
        let mut records = Vec::new();
        for record in reader.records() {
            let record = record.map_err(|e| IngestionError::Parse { what: "csv table", message: e.to_string() })?;
            let blank = record.len() == 1 && record[0].trim().is_empty();
            if !blank {
                records.push(record.iter().map(str::to_string).collect::<Vec<_>>());
            }
        }
        let mut records = records.into_iter();
        let headers = match records.next() {
            Some(h) => h.into_iter().map(|s| s.trim_start_matches('\u{feff}').trim().to_string()).collect(),
            None => Vec::new(),
        };
        Ok(Self { headers, rows: records.collect() })
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }

    /// Cell text, or `""` when the row is shorter than the header.
    pub fn cell(&self, row: usize, col: usize) -> &str {
        self.rows[row].get(col).map(String::as_str).unwrap_or("")
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}
