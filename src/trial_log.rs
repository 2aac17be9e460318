//! Raw per-participant trial logs
//!
//! A log is the CSV a jsPsych session writes: one row per trial, in
//! presentation order. This module reads it and derives the per-file metadata
//! (list identifier, participant) the parser needs.

use crate::config::TrialNumberSource;
use crate::error::PrepError;
use crate::types::TrialLogRow;
use regex::Regex;
use std::io::Read;
use std::path::Path;

/// One participant's log
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TrialLog {
    /// Base file name, used for diagnostics
    pub file_name: String,
    /// List identifier from the file name; empty when the name did not match
    pub list_id: String,
    pub rows: Vec<TrialLogRow>,
}

impl TrialLog {
    /// Read a log file from disk
    pub fn read(path: &Path, filename_pattern: &Regex) -> Result<Self, PrepError> {
        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        let reader = csv::ReaderBuilder::new()
            .flexible(true)
            .from_path(path)?;
        Self::from_csv(file_name, reader, filename_pattern)
    }

    /// Read a log from any CSV source
    pub fn from_reader<R: Read>(
        file_name: impl Into<String>,
        source: R,
        filename_pattern: &Regex,
    ) -> Result<Self, PrepError> {
        let reader = csv::ReaderBuilder::new().flexible(true).from_reader(source);
        Self::from_csv(file_name.into(), reader, filename_pattern)
    }

    fn from_csv<R: Read>(
        file_name: String,
        mut reader: csv::Reader<R>,
        filename_pattern: &Regex,
    ) -> Result<Self, PrepError> {
        let rows = reader
            .deserialize::<TrialLogRow>()
            .collect::<Result<Vec<_>, _>>()?;
        let list_id = list_id_from_filename(&file_name, filename_pattern).unwrap_or_default();
        Ok(Self {
            file_name,
            list_id,
            rows,
        })
    }

    /// Subject of the first row
    pub fn participant(&self) -> Option<&str> {
        self.rows.first().and_then(|row| row.subject.as_deref())
    }
}

/// First capture group of `pattern` over a file name
pub fn list_id_from_filename(file_name: &str, pattern: &Regex) -> Option<String> {
    pattern
        .captures(file_name)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

/// Trial number from `"0.0-4.0-12.0"` style node ids: last segment, integer part
pub fn trial_from_node_id(node_id: &str) -> Option<i64> {
    let last = node_id.trim().rsplit('-').next()?;
    let integer = last.split('.').next()?;
    integer.trim().parse().ok()
}

/// Trial number from a `trial_index` cell, tolerating a `.0` float rendering
pub fn trial_from_index(trial_index: &str) -> Option<i64> {
    let trimmed = trial_index.trim();
    if let Ok(value) = trimmed.parse::<i64>() {
        return Some(value);
    }
    trimmed
        .parse::<f64>()
        .ok()
        .filter(|value| value.is_finite() && value.fract() == 0.0)
        .map(|value| value as i64)
}

/// Resolve a row's trial number according to the configured preference
pub fn resolve_trial_number(row: &TrialLogRow, source: TrialNumberSource) -> Option<i64> {
    let from_index = || row.trial_index.as_deref().and_then(trial_from_index);
    match source {
        TrialNumberSource::NodeId => row
            .internal_node_id
            .as_deref()
            .and_then(trial_from_node_id)
            .or_else(from_index),
        TrialNumberSource::TrialIndex => from_index(),
    }
}
