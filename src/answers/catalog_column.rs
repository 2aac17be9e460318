//! Expected answers read from the matched catalog row

use super::AnswerKey;
use crate::types::StimulusRow;

/// Reads the expected answer from one catalog column
pub struct CatalogColumnAnswers {
    column: String,
}

impl CatalogColumnAnswers {
    pub fn new(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
        }
    }
}

impl AnswerKey for CatalogColumnAnswers {
    fn expected_answer(&self, _qfile: &str, stimulus: &StimulusRow) -> Option<String> {
        stimulus.text(&self.column)
    }
}
