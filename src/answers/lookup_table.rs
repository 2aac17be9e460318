//! Expected answers from a fixed table keyed by stimulus-file identifier

use super::AnswerKey;
use crate::types::StimulusRow;
use std::collections::BTreeMap;

/// Fixed `QFile -> answer` table
pub struct LookupTableAnswers {
    answers: BTreeMap<String, String>,
}

impl LookupTableAnswers {
    pub fn new(answers: BTreeMap<String, String>) -> Self {
        Self { answers }
    }
}

impl AnswerKey for LookupTableAnswers {
    fn expected_answer(&self, qfile: &str, _stimulus: &StimulusRow) -> Option<String> {
        self.answers.get(qfile).cloned()
    }
}
