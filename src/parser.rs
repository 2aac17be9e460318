//! Response reconstruction
//!
//! Turns one participant's trial log into response records. Each free-text
//! response row is paired with the nearest earlier question audio and answer
//! audio rows, then joined against the stimulus catalog for the log's list.

use crate::answers::{answer_key_for, AnswerKey};
use crate::catalog::StimulusCatalog;
use crate::config::CompiledConfig;
use crate::error::RowError;
use crate::trial_log::{resolve_trial_number, TrialLog};
use crate::types::{
    catalog_columns, count_words, QuestionCondition, ResponseRecord, TrialLogRow,
};
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, warn};

/// Path segment marking a question audio stimulus
const QUESTIONS_SEGMENT: &str = "questions";

/// Path segment marking an answer audio stimulus
const ANSWERS_SEGMENT: &str = "answers";

/// Per-file parse counters
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ParseStats {
    /// All rows in the log
    pub rows: usize,
    /// Rows with the response trial type
    pub response_rows: usize,
    /// Payloads carrying more than the primary answer field
    pub demographic: usize,
    /// Rows skipped for a bad payload or trial number
    pub malformed: usize,
    /// Responses without an earlier question and answer audio row
    pub no_audio_pair: usize,
    /// Question audio paths the identifier pattern did not match
    pub unresolved_qfile: usize,
    /// Identifiers with no catalog row in the log's list
    pub no_catalog_entry: usize,
    pub emitted: usize,
}

impl ParseStats {
    /// Question responses lost to failed matching
    pub fn unmatched(&self) -> usize {
        self.no_audio_pair + self.unresolved_qfile + self.no_catalog_entry
    }
}

/// Parser output for one log
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ParsedLog {
    pub file_name: String,
    pub list_id: String,
    pub participant: String,
    pub records: Vec<ResponseRecord>,
    pub stats: ParseStats,
}

/// Result of inspecting one response payload
#[derive(Debug, PartialEq, Eq)]
enum Payload {
    Answer(String),
    Demographic,
}

/// Reconstructs response records from trial logs
pub struct TrialLogParser<'a> {
    config: &'a CompiledConfig,
    catalog: &'a StimulusCatalog,
    answers: Box<dyn AnswerKey>,
}

impl<'a> TrialLogParser<'a> {
    pub fn new(config: &'a CompiledConfig, catalog: &'a StimulusCatalog) -> Self {
        Self {
            config,
            catalog,
            answers: answer_key_for(&config.config.answer_source),
        }
    }

    /// Parse one log into response records
    pub fn parse(&self, log: &TrialLog) -> ParsedLog {
        let log_config = &self.config.config.log;
        let participant = log.participant().unwrap_or_default().to_string();
        let mut parsed = ParsedLog {
            file_name: log.file_name.clone(),
            list_id: log.list_id.clone(),
            participant,
            records: Vec::new(),
            stats: ParseStats {
                rows: log.rows.len(),
                ..Default::default()
            },
        };

        if log.list_id.is_empty() {
            warn!(file = %log.file_name, "file name does not carry a list identifier");
        }

        let mut last_question: Option<&TrialLogRow> = None;
        let mut last_answer: Option<&TrialLogRow> = None;

        for (index, row) in log.rows.iter().enumerate() {
            if row.is_trial_type(&log_config.audio_trial_type) {
                if row.stimulus_contains(QUESTIONS_SEGMENT) {
                    last_question = Some(row);
                }
                if row.stimulus_contains(ANSWERS_SEGMENT) {
                    last_answer = Some(row);
                }
                continue;
            }

            if !row.is_trial_type(&log_config.response_trial_type) {
                continue;
            }
            parsed.stats.response_rows += 1;

            let (response, trial) = match self.read_response(row) {
                Ok(Some(found)) => found,
                Ok(None) => {
                    parsed.stats.demographic += 1;
                    continue;
                }
                Err(e) => {
                    warn!(file = %log.file_name, row = index, error = %e, "skipping response row");
                    parsed.stats.malformed += 1;
                    continue;
                }
            };

            let (Some(question_row), Some(answer_row)) = (last_question, last_answer) else {
                debug!(file = %log.file_name, row = index, "no preceding question/answer audio");
                parsed.stats.no_audio_pair += 1;
                continue;
            };

            let question_path = question_row.stimulus.as_deref().unwrap_or_default();
            let Some(qfile) = first_capture(&self.config.question_pattern, question_path) else {
                debug!(file = %log.file_name, row = index, path = question_path, "unrecognised question audio path");
                parsed.stats.unresolved_qfile += 1;
                continue;
            };

            let answer_path = answer_row.stimulus.as_deref().unwrap_or_default();
            let heard_answer =
                first_capture(&self.config.answer_pattern, answer_path).unwrap_or_default();

            let Some(record) = self.build_record(
                &parsed.list_id,
                &parsed.participant,
                trial,
                qfile,
                heard_answer,
                response,
            ) else {
                debug!(file = %log.file_name, row = index, list = %parsed.list_id, "no catalog entry");
                parsed.stats.no_catalog_entry += 1;
                continue;
            };

            parsed.records.push(record);
        }

        parsed.stats.emitted = parsed.records.len();
        parsed
    }

    /// Response text and trial number of a question response row;
    /// `Ok(None)` for demographic rows
    fn read_response(&self, row: &TrialLogRow) -> Result<Option<(String, i64)>, RowError> {
        let log_config = &self.config.config.log;
        let raw = row.responses.as_deref().unwrap_or_default();

        let response = match classify_payload(raw, &log_config.primary_field)? {
            Payload::Answer(response) => response,
            Payload::Demographic => return Ok(None),
        };

        let trial = resolve_trial_number(row, log_config.trial_number).ok_or_else(|| {
            RowError::NoTrialNumber {
                node_id: row.internal_node_id.clone(),
                trial_index: row.trial_index.clone(),
            }
        })?;

        Ok(Some((response, trial)))
    }

    fn build_record(
        &self,
        list_id: &str,
        participant: &str,
        trial: i64,
        qfile: String,
        heard_answer: String,
        response: String,
    ) -> Option<ResponseRecord> {
        let stimulus = self.catalog.lookup(list_id, &qfile)?;

        let q_condition = stimulus
            .text(catalog_columns::Q_CONDITION)
            .or_else(|| QuestionCondition::from_qfile(&qfile).map(|c| c.as_str().to_string()))
            .unwrap_or_default();
        let ha_wlength = stimulus
            .text(catalog_columns::WLENGTH)
            .unwrap_or_else(|| count_words(&heard_answer).to_string());
        let expected_answer = self
            .answers
            .expected_answer(&qfile, stimulus)
            .unwrap_or_default();
        let ea_wlength = count_words(&expected_answer);

        Some(ResponseRecord {
            item_no: stimulus.text_or_empty(catalog_columns::ITEM_NO),
            participant: participant.to_string(),
            trial,
            a_condition: stimulus.text_or_empty(catalog_columns::A_CONDITION),
            plaus: stimulus.text_or_empty(catalog_columns::A_PLAUS),
            heard_answer,
            ha_wlength,
            a_number: stimulus.text_or_empty(catalog_columns::A_NUMBER),
            list: list_id.to_string(),
            q_condition,
            q_file: qfile,
            q_number: stimulus.text_or_empty(catalog_columns::Q_NUMBER),
            question: stimulus.text_or_empty(catalog_columns::QUESTION),
            expected_answer,
            ea_wlength,
            qlsa: stimulus.text_or_empty(catalog_columns::QLSA),
            response,
            block: None,
        })
    }
}

/// Decide whether a payload is a question answer or a demographic survey
fn classify_payload(raw: &str, primary_field: &str) -> Result<Payload, RowError> {
    let value: Value =
        serde_json::from_str(raw).map_err(|e| RowError::MalformedPayload(e.to_string()))?;
    let Value::Object(fields) = value else {
        return Err(RowError::NotAnObject);
    };

    let has_other_answers = fields
        .iter()
        .any(|(key, value)| key != primary_field && !value.is_null());
    if has_other_answers {
        return Ok(Payload::Demographic);
    }

    match fields.get(primary_field) {
        Some(Value::String(text)) => Ok(Payload::Answer(text.clone())),
        Some(Value::Null) => Ok(Payload::Answer(String::new())),
        Some(other) => Ok(Payload::Answer(other.to_string())),
        None => Err(RowError::MissingField(primary_field.to_string())),
    }
}

fn first_capture(pattern: &regex::Regex, text: &str) -> Option<String> {
    pattern
        .captures(text)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
        .filter(|s| !s.is_empty())
}
