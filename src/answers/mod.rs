//! Expected-answer sources
//!
//! Two variants of the preparation run disagree on where the expected answer
//! comes from: a column of the stimulus catalog, or a fixed table keyed by
//! stimulus-file identifier. Both sit behind [`AnswerKey`].

mod catalog_column;
mod lookup_table;

pub use catalog_column::CatalogColumnAnswers;
pub use lookup_table::LookupTableAnswers;

use crate::config::AnswerSource;
use crate::types::StimulusRow;

/// Trait for expected-answer sources
pub trait AnswerKey {
    /// Expected answer for a stimulus, `None` when the source has none
    fn expected_answer(&self, qfile: &str, stimulus: &StimulusRow) -> Option<String>;
}

/// Build the answer source a configuration selects
pub fn answer_key_for(source: &AnswerSource) -> Box<dyn AnswerKey> {
    match source {
        AnswerSource::CatalogColumn { column } => Box::new(CatalogColumnAnswers::new(column)),
        AnswerSource::LookupTable { answers } => {
            Box::new(LookupTableAnswers::new(answers.clone()))
        }
    }
}
