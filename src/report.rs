//! Run reports
//!
//! Summaries of a preparation run, serialisable for `--json` output.

use crate::assembler::{AssemblyStats, Dataset};
use crate::parser::{ParseStats, ParsedLog};
use crate::{PREP_VERSION, PRODUCER_NAME};
use chrono::Utc;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Parse outcome of one input file
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileReport {
    pub file: String,
    pub list: String,
    pub participant: String,
    pub stats: ParseStats,
}

impl From<&ParsedLog> for FileReport {
    fn from(parsed: &ParsedLog) -> Self {
        Self {
            file: parsed.file_name.clone(),
            list: parsed.list_id.clone(),
            participant: parsed.participant.clone(),
            stats: parsed.stats.clone(),
        }
    }
}

/// Summary of a whole run
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunReport {
    pub producer: String,
    pub version: String,
    pub generated_at_utc: String,
    pub catalog_lists: Vec<String>,
    pub files: Vec<FileReport>,
    pub assembly: AssemblyStats,
    /// Written file; `None` for dry runs
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<PathBuf>,
    pub rows: usize,
    pub columns: usize,
    pub trial_range: Option<(i64, i64)>,
    pub blocks: BTreeMap<u8, usize>,
    /// Question responses dropped for failed audio or catalog matching
    pub dropped_unmatched: usize,
}

impl RunReport {
    pub fn new(
        catalog_lists: Vec<String>,
        parsed: &[ParsedLog],
        dataset: &Dataset,
        columns: usize,
        output: Option<PathBuf>,
    ) -> Self {
        Self {
            producer: PRODUCER_NAME.to_string(),
            version: PREP_VERSION.to_string(),
            generated_at_utc: Utc::now().to_rfc3339(),
            catalog_lists,
            files: parsed.iter().map(FileReport::from).collect(),
            assembly: dataset.stats.clone(),
            output,
            rows: dataset.records.len(),
            columns,
            trial_range: dataset.trial_range(),
            blocks: dataset.block_distribution(),
            dropped_unmatched: parsed.iter().map(|p| p.stats.unmatched()).sum(),
        }
    }

    /// Records extracted before the trial-group filter
    pub fn extracted(&self) -> usize {
        self.files.iter().map(|f| f.stats.emitted).sum()
    }
}
