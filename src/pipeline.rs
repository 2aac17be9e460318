//! Pipeline orchestration
//!
//! This module provides the public API for trial-prep.
//! It runs the full pipeline from workbook and raw logs to the output table.

use crate::assembler::{Dataset, DatasetAssembler};
use crate::catalog::StimulusCatalog;
use crate::config::{CompiledConfig, PipelineConfig, UnmatchedPolicy};
use crate::encoder::CsvEncoder;
use crate::error::PrepError;
use crate::parser::{ParsedLog, TrialLogParser};
use crate::report::RunReport;
use crate::trial_log::TrialLog;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Run the whole preparation with the given configuration.
///
/// # Returns
/// A report describing what was extracted and written
///
/// # Example
/// ```ignore
/// let mut config = PipelineConfig::default();
/// config.paths.catalog = "Stimulus_List.xlsx".into();
/// config.paths.input_dir = "data/raw/pilotA".into();
/// let report = prepare_dataset(config)?;
/// println!("{} rows", report.rows);
/// ```
pub fn prepare_dataset(config: PipelineConfig) -> Result<RunReport, PrepError> {
    DatasetPipeline::new(config)?.run()
}

/// Input files in `dir` whose names match `pattern`, sorted by path
pub fn discover_inputs(dir: &Path, pattern: &str) -> Result<Vec<PathBuf>, PrepError> {
    let escaped_dir = glob::Pattern::escape(&dir.to_string_lossy());
    let full_pattern = Path::new(&escaped_dir).join(pattern);
    let full_pattern = full_pattern.to_string_lossy();

    let entries = glob::glob(&full_pattern)
        .map_err(|e| PrepError::Config(format!("invalid input glob {:?}: {}", pattern, e)))?;

    let mut files = Vec::new();
    for entry in entries {
        let path = entry.map_err(std::io::Error::from)?;
        if path.is_file() {
            files.push(path);
        }
    }
    files.sort();

    if files.is_empty() {
        return Err(PrepError::NoInputFiles {
            dir: dir.to_path_buf(),
            pattern: pattern.to_string(),
        });
    }
    Ok(files)
}

/// Configured preparation pipeline.
///
/// Pipeline stages:
/// 1. StimulusCatalog - Load the stimulus workbook
/// 2. TrialLogParser - Reconstruct responses from each log
/// 3. DatasetAssembler - Filter, renumber, assign blocks, correct
/// 4. CsvEncoder - Write the output table
pub struct DatasetPipeline {
    config: CompiledConfig,
}

impl DatasetPipeline {
    /// Validate and compile a configuration
    pub fn new(config: PipelineConfig) -> Result<Self, PrepError> {
        Ok(Self::from_compiled(config.compile()?))
    }

    pub fn from_compiled(config: CompiledConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config.config
    }

    /// Stage 1: load the stimulus catalog
    pub fn load_catalog(&self) -> Result<StimulusCatalog, PrepError> {
        let config = self.config();
        StimulusCatalog::load(&config.paths.catalog, &config.catalog)
    }

    /// Read every configured input log in path order
    pub fn read_inputs(&self) -> Result<Vec<TrialLog>, PrepError> {
        let paths = &self.config().paths;
        let files = discover_inputs(&paths.input_dir, &paths.input_glob)?;
        info!(count = files.len(), dir = %paths.input_dir.display(), "found input logs");

        files
            .iter()
            .map(|path| {
                debug!(path = %path.display(), "reading log");
                TrialLog::read(path, &self.config.filename_pattern)
            })
            .collect()
    }

    /// Stages 2 and 3 over logs already in memory
    pub fn process(
        &self,
        catalog: &StimulusCatalog,
        logs: &[TrialLog],
    ) -> Result<(Vec<ParsedLog>, Dataset), PrepError> {
        let parser = TrialLogParser::new(&self.config, catalog);

        let mut parsed = Vec::with_capacity(logs.len());
        for log in logs {
            let result = parser.parse(log);
            info!(
                file = %result.file_name,
                list = %result.list_id,
                extracted = result.records.len(),
                "parsed log"
            );
            self.surface_unmatched(&result)?;
            parsed.push(result);
        }

        let assembler = DatasetAssembler::new(&self.config().assembly);
        let dataset = assembler.assemble(parsed.iter().map(|p| p.records.clone()));
        info!(
            input = dataset.stats.input_rows,
            kept = dataset.records.len(),
            "assembled dataset"
        );

        Ok((parsed, dataset))
    }

    /// Parse and assemble without writing anything
    pub fn inspect(&self) -> Result<RunReport, PrepError> {
        let catalog = self.load_catalog()?;
        let logs = self.read_inputs()?;
        let (parsed, dataset) = self.process(&catalog, &logs)?;
        Ok(RunReport::new(
            catalog.list_ids(),
            &parsed,
            &dataset,
            self.config().assembly.columns.len(),
            None,
        ))
    }

    /// Run every stage and write the output table
    pub fn run(&self) -> Result<RunReport, PrepError> {
        let catalog = self.load_catalog()?;
        let logs = self.read_inputs()?;
        let (parsed, dataset) = self.process(&catalog, &logs)?;

        if dataset.records.is_empty() {
            warn!("no responses survived assembly; writing header only");
        }

        let config = self.config();
        let output = &config.paths.output;
        CsvEncoder::new(&config.assembly.columns).write_to_path(&dataset.records, output)?;

        Ok(RunReport::new(
            catalog.list_ids(),
            &parsed,
            &dataset,
            config.assembly.columns.len(),
            Some(output.clone()),
        ))
    }

    fn surface_unmatched(&self, parsed: &ParsedLog) -> Result<(), PrepError> {
        let unmatched = parsed.stats.unmatched();
        if unmatched == 0 {
            return Ok(());
        }

        match self.config().unmatched {
            UnmatchedPolicy::Ignore => {
                debug!(file = %parsed.file_name, unmatched, "dropped unmatched responses");
                Ok(())
            }
            UnmatchedPolicy::Warn => {
                warn!(
                    file = %parsed.file_name,
                    no_audio_pair = parsed.stats.no_audio_pair,
                    unresolved_qfile = parsed.stats.unresolved_qfile,
                    no_catalog_entry = parsed.stats.no_catalog_entry,
                    "dropped unmatched responses"
                );
                Ok(())
            }
            UnmatchedPolicy::Fail => Err(PrepError::UnmatchedResponses {
                file: parsed.file_name.clone(),
                count: unmatched,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::StimulusList;
    use crate::config::MatchMode;
    use crate::types::{CellValue, StimulusRow, TrialLogRow};
    use std::collections::BTreeMap;
    use std::fs;

    fn catalog() -> StimulusCatalog {
        let mut cells = BTreeMap::new();
        cells.insert("QFile".to_string(), CellValue::Text("3P.wav".into()));
        cells.insert("ItemNo".to_string(), CellValue::Int(3));
        let mut lists = BTreeMap::new();
        lists.insert(
            "1a".to_string(),
            StimulusList {
                rows: vec![StimulusRow::new(cells)],
            },
        );
        StimulusCatalog::from_lists(lists, MatchMode::Exact)
    }

    fn row(trial_type: &str, stimulus: Option<&str>, responses: Option<&str>, idx: i64) -> TrialLogRow {
        TrialLogRow {
            subject: Some("p01".into()),
            trial_type: Some(trial_type.into()),
            stimulus: stimulus.map(Into::into),
            responses: responses.map(Into::into),
            trial_index: Some(idx.to_string()),
            internal_node_id: None,
        }
    }

    fn sample_log() -> TrialLog {
        TrialLog {
            file_name: "List_1a_PP.csv".into(),
            list_id: "1a".into(),
            rows: vec![
                row("single-audio", Some("a/questions/3P.mp3"), None, 0),
                row("single-audio", Some("a/answers/North Pole.mp3"), None, 1),
                row("survey-text", None, Some(r#"{"Q0":"north pole"}"#), 2),
                row("survey-text", None, Some(r#"{"Q0":"again"}"#), 3),
                row("survey-text", None, Some(r#"{"Q0":"late"}"#), 57),
            ],
        }
    }

    #[test]
    fn test_process_in_memory() {
        let pipeline = DatasetPipeline::new(PipelineConfig::default()).unwrap();
        let (parsed, dataset) = pipeline.process(&catalog(), &[sample_log()]).unwrap();

        assert_eq!(parsed.len(), 1);
        assert_eq!(parsed[0].stats.emitted, 3);
        assert_eq!(dataset.records.len(), 2);
        assert_eq!(dataset.records[0].trial, 0);
        assert_eq!(dataset.records[0].block, Some(1));
        assert_eq!(dataset.records[0].heard_answer, "The North Pole");
        assert_eq!(dataset.records[1].trial, 11);
        assert_eq!(dataset.records[1].block, Some(3));
    }

    #[test]
    fn test_fail_policy_aborts_on_unmatched() {
        let mut config = PipelineConfig::default();
        config.unmatched = UnmatchedPolicy::Fail;
        let pipeline = DatasetPipeline::new(config).unwrap();

        let mut log = sample_log();
        log.rows.remove(0);
        let result = pipeline.process(&catalog(), &[log]);

        assert!(matches!(
            result,
            Err(PrepError::UnmatchedResponses { count: 3, .. })
        ));
    }

    #[test]
    fn test_discover_inputs_sorted_and_filtered() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["List_2b_PP.csv", "List_1a_PP.csv", "notes.csv"] {
            fs::write(dir.path().join(name), "subject\n").unwrap();
        }
        fs::create_dir(dir.path().join("List_dir.csv")).unwrap();

        let files = discover_inputs(dir.path(), "List_*.csv").unwrap();
        let names: Vec<String> = files
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["List_1a_PP.csv", "List_2b_PP.csv"]);
    }

    #[test]
    fn test_discover_inputs_none_found() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            discover_inputs(dir.path(), "List_*.csv"),
            Err(PrepError::NoInputFiles { .. })
        ));
    }

    #[test]
    fn test_missing_catalog_is_fatal() {
        let mut config = PipelineConfig::default();
        config.paths.catalog = PathBuf::from("/nonexistent/Stimulus_List.xlsx");
        let pipeline = DatasetPipeline::new(config).unwrap();
        assert!(matches!(
            pipeline.load_catalog(),
            Err(PrepError::Catalog { .. })
        ));
    }
}
