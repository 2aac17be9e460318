//! Error types for trial-prep

use std::path::PathBuf;
use thiserror::Error;

/// Errors that abort a preparation run
#[derive(Debug, Error)]
pub enum PrepError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Failed to read stimulus catalog {path}: {source}")]
    Catalog {
        path: PathBuf,
        #[source]
        source: calamine::Error,
    },

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Failed to parse configuration file: {0}")]
    ConfigFile(#[from] toml::de::Error),

    #[error("Invalid pattern {pattern:?}: {source}")]
    Pattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("No input files matching {pattern} in {dir}")]
    NoInputFiles { dir: PathBuf, pattern: String },

    #[error("{count} response rows could not be matched in {file}")]
    UnmatchedResponses { file: String, count: usize },
}

/// Reasons a single response row is skipped.
///
/// These never abort a run; the parser logs them and moves on to the next row.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RowError {
    #[error("malformed response payload: {0}")]
    MalformedPayload(String),

    #[error("response payload is not a JSON object")]
    NotAnObject,

    #[error("missing field {0:?} in response payload")]
    MissingField(String),

    #[error("no usable trial number (node id {node_id:?}, trial index {trial_index:?})")]
    NoTrialNumber {
        node_id: Option<String>,
        trial_index: Option<String>,
    },
}
