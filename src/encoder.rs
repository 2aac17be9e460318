//! CSV encoding
//!
//! Writes the assembled dataset with a fixed header. Columns the records do
//! not carry are written as empty cells.

use crate::error::PrepError;
use crate::types::ResponseRecord;
use std::fs::File;
use std::io::{self, Write};
use std::path::Path;
use tracing::info;

/// Encoder for the output table
pub struct CsvEncoder<'a> {
    columns: &'a [String],
}

impl<'a> CsvEncoder<'a> {
    pub fn new(columns: &'a [String]) -> Self {
        Self { columns }
    }

    /// Encode records into any writer
    pub fn write<W: Write>(&self, records: &[ResponseRecord], sink: W) -> Result<(), PrepError> {
        let mut writer = csv::Writer::from_writer(sink);
        writer.write_record(self.columns)?;
        for record in records {
            writer.write_record(
                self.columns
                    .iter()
                    .map(|column| record.value(column).unwrap_or_default()),
            )?;
        }
        writer.flush()?;
        Ok(())
    }

    /// Encode records to a file, replacing it
    pub fn write_to_path(&self, records: &[ResponseRecord], path: &Path) -> Result<(), PrepError> {
        let file = File::create(path)?;
        self.write(records, file)?;
        info!(path = %path.display(), rows = records.len(), "wrote dataset");
        Ok(())
    }

    /// Encode records into a string
    pub fn encode_to_string(&self, records: &[ResponseRecord]) -> Result<String, PrepError> {
        let mut buffer = Vec::new();
        self.write(records, &mut buffer)?;
        String::from_utf8(buffer)
            .map_err(|e| PrepError::Io(io::Error::new(io::ErrorKind::InvalidData, e)))
    }
}
