//! Core types for the trial-prep pipeline
//!
//! This module defines the data structures that flow through each stage:
//! catalog rows, raw log rows, and the reconstructed response records that end
//! up as rows of the output table.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Output header, in order
pub const OUTPUT_COLUMNS: [&str; 26] = [
    "ItemNo",
    "Participant",
    "Trial",
    "ACondition",
    "Plaus",
    "Heard Answer",
    "HA Wlength",
    "Anumber",
    "List",
    "QCondition",
    "QFile",
    "Qnumber",
    "Question",
    "Expected Answer",
    "EA Wlength",
    "QLSA",
    "response",
    "Correct",
    "Incorrect",
    "Prop Heard",
    "Block",
    "Plaus HIT",
    "Plaus Incorrect",
    "NumberOfPlausibleWordsReported",
    "NumberOfPlausibleWordsNotReported",
    "Prop Expected",
];

/// Catalog column headers the parser reads
pub mod catalog_columns {
    pub const ITEM_NO: &str = "ItemNo";
    pub const A_CONDITION: &str = "ACondition";
    pub const A_PLAUS: &str = "Aplaus";
    pub const WLENGTH: &str = "Wlength";
    pub const A_NUMBER: &str = "Anumber";
    pub const Q_CONDITION: &str = "QCondition";
    pub const Q_FILE: &str = "QFile";
    pub const Q_NUMBER: &str = "Qnumber";
    pub const QUESTION: &str = "Question";
    pub const QLSA: &str = "QLSA";
}

/// One spreadsheet cell
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CellValue {
    #[default]
    Empty,
    Int(i64),
    Float(f64),
    Bool(bool),
    Text(String),
}

impl CellValue {
    pub fn is_empty(&self) -> bool {
        match self {
            CellValue::Empty => true,
            CellValue::Text(s) => s.trim().is_empty(),
            CellValue::Float(f) => f.is_nan(),
            _ => false,
        }
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellValue::Empty => Ok(()),
            CellValue::Int(i) => write!(f, "{}", i),
            CellValue::Float(v) if v.is_nan() => Ok(()),
            // Spreadsheet readers hand back whole numbers as floats
            CellValue::Float(v) if v.fract() == 0.0 && v.abs() < 1e15 => {
                write!(f, "{}", *v as i64)
            }
            CellValue::Float(v) => write!(f, "{}", v),
            CellValue::Bool(true) => f.write_str("True"),
            CellValue::Bool(false) => f.write_str("False"),
            CellValue::Text(s) => f.write_str(s),
        }
    }
}

/// One row of a stimulus list, keyed by header name
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StimulusRow {
    cells: BTreeMap<String, CellValue>,
}

impl StimulusRow {
    pub fn new(cells: BTreeMap<String, CellValue>) -> Self {
        Self { cells }
    }

    /// Raw cell for a column, if the sheet has that column
    pub fn get(&self, column: &str) -> Option<&CellValue> {
        self.cells.get(column)
    }

    /// Rendered cell text, `None` when the column is missing or the cell is blank
    pub fn text(&self, column: &str) -> Option<String> {
        self.get(column)
            .filter(|cell| !cell.is_empty())
            .map(|cell| cell.to_string())
    }

    /// Rendered cell text, empty when missing
    pub fn text_or_empty(&self, column: &str) -> String {
        self.text(column).unwrap_or_default()
    }

    pub fn is_blank(&self) -> bool {
        self.cells.values().all(CellValue::is_empty)
    }
}

/// One row of a raw per-participant log
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct TrialLogRow {
    #[serde(default)]
    pub subject: Option<String>,
    #[serde(default)]
    pub trial_type: Option<String>,
    #[serde(default)]
    pub stimulus: Option<String>,
    #[serde(default)]
    pub responses: Option<String>,
    #[serde(default)]
    pub trial_index: Option<String>,
    #[serde(default)]
    pub internal_node_id: Option<String>,
}

impl TrialLogRow {
    pub fn is_trial_type(&self, trial_type: &str) -> bool {
        self.trial_type.as_deref() == Some(trial_type)
    }

    pub fn stimulus_contains(&self, needle: &str) -> bool {
        self.stimulus
            .as_deref()
            .map_or(false, |stimulus| stimulus.contains(needle))
    }
}

/// Predictability condition encoded in a stimulus-file identifier's suffix
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum QuestionCondition {
    Predictable,
    Unpredictable,
}

impl QuestionCondition {
    /// Condition from the identifier's trailing letter (`9P`, `14U`)
    pub fn from_qfile(qfile: &str) -> Option<Self> {
        match qfile.chars().last() {
            Some('P') => Some(QuestionCondition::Predictable),
            Some('U') => Some(QuestionCondition::Unpredictable),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            QuestionCondition::Predictable => "Predictable",
            QuestionCondition::Unpredictable => "Unpredictable",
        }
    }
}

/// One participant's answer to one question, joined with its stimulus metadata
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ResponseRecord {
    pub item_no: String,
    pub participant: String,
    pub trial: i64,
    pub a_condition: String,
    pub plaus: String,
    pub heard_answer: String,
    pub ha_wlength: String,
    pub a_number: String,
    pub list: String,
    pub q_condition: String,
    pub q_file: String,
    pub q_number: String,
    pub question: String,
    pub expected_answer: String,
    pub ea_wlength: usize,
    pub qlsa: String,
    pub response: String,
    /// Assigned by the assembler
    pub block: Option<u8>,
}

impl ResponseRecord {
    /// Cell text for an output column; `None` for columns this stage leaves
    /// to the scoring step or that are unknown
    pub fn value(&self, column: &str) -> Option<String> {
        let value = match column {
            "ItemNo" => self.item_no.clone(),
            "Participant" => self.participant.clone(),
            "Trial" => self.trial.to_string(),
            "ACondition" => self.a_condition.clone(),
            "Plaus" => self.plaus.clone(),
            "Heard Answer" => self.heard_answer.clone(),
            "HA Wlength" => self.ha_wlength.clone(),
            "Anumber" => self.a_number.clone(),
            "List" => self.list.clone(),
            "QCondition" => self.q_condition.clone(),
            "QFile" => self.q_file.clone(),
            "Qnumber" => self.q_number.clone(),
            "Question" => self.question.clone(),
            "Expected Answer" => self.expected_answer.clone(),
            "EA Wlength" => self.ea_wlength.to_string(),
            "QLSA" => self.qlsa.clone(),
            "response" => self.response.clone(),
            "Block" => return self.block.map(|b| b.to_string()),
            _ => return None,
        };
        Some(value)
    }

    /// Whether `column` names a text column that corrections can rewrite
    pub fn is_correctable(column: &str) -> bool {
        Self::default().text_mut(column).is_some()
    }

    /// Mutable access to a text column, used by value corrections
    pub fn text_mut(&mut self, column: &str) -> Option<&mut String> {
        match column {
            "ItemNo" => Some(&mut self.item_no),
            "Participant" => Some(&mut self.participant),
            "ACondition" => Some(&mut self.a_condition),
            "Plaus" => Some(&mut self.plaus),
            "Heard Answer" => Some(&mut self.heard_answer),
            "HA Wlength" => Some(&mut self.ha_wlength),
            "Anumber" => Some(&mut self.a_number),
            "List" => Some(&mut self.list),
            "QCondition" => Some(&mut self.q_condition),
            "QFile" => Some(&mut self.q_file),
            "Qnumber" => Some(&mut self.q_number),
            "Question" => Some(&mut self.question),
            "Expected Answer" => Some(&mut self.expected_answer),
            "QLSA" => Some(&mut self.qlsa),
            "response" => Some(&mut self.response),
            _ => None,
        }
    }
}

/// Count of whitespace-delimited tokens; blank text counts as zero
pub fn count_words(text: &str) -> usize {
    text.split_whitespace().count()
}
