//! Pipeline configuration
//!
//! Every path, pattern and lookup table the pipeline consults lives here and is
//! passed in explicitly. All sections are optional in TOML; omitted values fall
//! back to the defaults below, which reproduce the pilot-A preparation run.

use crate::error::PrepError;
use crate::types::{ResponseRecord, OUTPUT_COLUMNS};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

/// How dropped response rows are surfaced
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum UnmatchedPolicy {
    /// Count only; individual drops are logged at debug level
    Ignore,
    /// Emit one warning per file with the drop counts
    #[default]
    Warn,
    /// Abort the run on the first file with dropped rows
    Fail,
}

/// How a catalog `QFile` cell is compared against an extracted identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MatchMode {
    /// Cell (extension stripped) must equal the identifier
    #[default]
    Exact,
    /// Cell text must contain the identifier
    Contains,
}

/// Which field supplies a response row's trial number first
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TrialNumberSource {
    /// Suffix of `internal_node_id`, falling back to `trial_index`
    #[default]
    NodeId,
    /// `trial_index` only
    TrialIndex,
}

/// Where the `Expected Answer` column comes from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum AnswerSource {
    /// A column of the matched catalog row
    CatalogColumn { column: String },
    /// A fixed table keyed by stimulus-file identifier (e.g. `"9P"`)
    LookupTable {
        #[serde(default)]
        answers: BTreeMap<String, String>,
    },
}

impl Default for AnswerSource {
    fn default() -> Self {
        AnswerSource::CatalogColumn {
            column: "Answer".to_string(),
        }
    }
}

/// Exact-value replacement applied to one output column
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Correction {
    pub column: String,
    pub from: String,
    pub to: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    /// Stimulus workbook
    pub catalog: PathBuf,
    /// Directory holding the per-participant logs
    pub input_dir: PathBuf,
    /// Glob matched against file names inside `input_dir`
    pub input_glob: String,
    /// Output CSV
    pub output: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            catalog: PathBuf::from("Stimulus_List.xlsx"),
            input_dir: PathBuf::from("data/raw"),
            input_glob: "List_*.csv".to_string(),
            output: PathBuf::from("data/processed/transformed_dprime.csv"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalogConfig {
    /// Prefix stripped from sheet names to form list identifiers
    pub sheet_prefix: String,
    pub match_mode: MatchMode,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            sheet_prefix: "List ".to_string(),
            match_mode: MatchMode::Exact,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    pub response_trial_type: String,
    pub audio_trial_type: String,
    /// Answer field of a question response payload
    pub primary_field: String,
    /// Regex over the log file name; group 1 is the list identifier
    pub filename_pattern: String,
    /// Regex over a question audio path; group 1 is the stimulus-file identifier
    pub question_pattern: String,
    /// Regex over an answer audio path; group 1 is the heard answer
    pub answer_pattern: String,
    pub trial_number: TrialNumberSource,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            response_trial_type: "survey-text".to_string(),
            audio_trial_type: "single-audio".to_string(),
            primary_field: "Q0".to_string(),
            filename_pattern: r"List_([A-Za-z0-9]+)_[A-Za-z]{2}".to_string(),
            question_pattern: r"questions/(\d+[PU])\.(?:mp3|wav|ogg|m4a)".to_string(),
            answer_pattern: r"answers/(.+?)\.(?:mp3|wav|ogg|m4a)".to_string(),
            trial_number: TrialNumberSource::NodeId,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AssemblyConfig {
    /// Inclusive upper bound of each block's renumbered trials; later trials
    /// fall into the block after the last bound
    pub block_upper_bounds: Vec<i64>,
    /// Output column order
    pub columns: Vec<String>,
    pub corrections: Vec<Correction>,
}

impl Default for AssemblyConfig {
    fn default() -> Self {
        Self {
            block_upper_bounds: vec![5, 10],
            columns: OUTPUT_COLUMNS.iter().map(|c| c.to_string()).collect(),
            corrections: vec![Correction {
                column: "Heard Answer".to_string(),
                from: "North Pole".to_string(),
                to: "The North Pole".to_string(),
            }],
        }
    }
}

/// Complete pipeline configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub unmatched: UnmatchedPolicy,
    pub paths: PathsConfig,
    pub catalog: CatalogConfig,
    pub log: LogConfig,
    pub answer_source: AnswerSource,
    pub assembly: AssemblyConfig,
}

impl PipelineConfig {
    /// Parse configuration from a TOML document
    pub fn from_toml_str(toml_str: &str) -> Result<Self, PrepError> {
        Ok(toml::from_str(toml_str)?)
    }

    /// Load configuration from a TOML file
    pub fn from_file(path: &Path) -> Result<Self, PrepError> {
        let content = fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Render the effective configuration as TOML
    pub fn to_toml_string(&self) -> Result<String, PrepError> {
        toml::to_string_pretty(self).map_err(|e| PrepError::Config(e.to_string()))
    }

    /// Validate the configuration and compile its patterns
    pub fn compile(self) -> Result<CompiledConfig, PrepError> {
        let filename_pattern = compile_pattern(&self.log.filename_pattern)?;
        let question_pattern = compile_pattern(&self.log.question_pattern)?;
        let answer_pattern = compile_pattern(&self.log.answer_pattern)?;

        let bounds = &self.assembly.block_upper_bounds;
        if bounds.is_empty() {
            return Err(PrepError::Config(
                "assembly.block_upper_bounds must not be empty".to_string(),
            ));
        }
        if bounds.windows(2).any(|w| w[0] >= w[1]) {
            return Err(PrepError::Config(format!(
                "assembly.block_upper_bounds must be strictly increasing, got {:?}",
                bounds
            )));
        }
        if self.assembly.columns.is_empty() {
            return Err(PrepError::Config(
                "assembly.columns must name at least one column".to_string(),
            ));
        }
        if let Some(correction) = self
            .assembly
            .corrections
            .iter()
            .find(|c| !ResponseRecord::is_correctable(&c.column))
        {
            return Err(PrepError::Config(format!(
                "assembly.corrections: column {:?} is not a correctable text column",
                correction.column
            )));
        }
        if self.log.primary_field.is_empty() {
            return Err(PrepError::Config(
                "log.primary_field must not be empty".to_string(),
            ));
        }

        Ok(CompiledConfig {
            config: self,
            filename_pattern,
            question_pattern,
            answer_pattern,
        })
    }
}

/// A validated configuration with its regexes compiled
#[derive(Debug, Clone)]
pub struct CompiledConfig {
    pub config: PipelineConfig,
    pub filename_pattern: Regex,
    pub question_pattern: Regex,
    pub answer_pattern: Regex,
}

impl CompiledConfig {
    /// Compiled default configuration
    pub fn default_compiled() -> Result<Self, PrepError> {
        PipelineConfig::default().compile()
    }
}

fn compile_pattern(pattern: &str) -> Result<Regex, PrepError> {
    let regex = Regex::new(pattern).map_err(|source| PrepError::Pattern {
        pattern: pattern.to_string(),
        source,
    })?;
    // Group 0 is the whole match; at least one explicit group is required
    if regex.captures_len() < 2 {
        return Err(PrepError::Config(format!(
            "pattern {:?} needs a capture group",
            pattern
        )));
    }
    Ok(regex)
}
