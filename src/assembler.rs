//! Dataset assembly
//!
//! Concatenates per-file records, keeps one row per logical trial group,
//! renumbers trials, assigns blocks and applies value corrections.

use crate::config::{AssemblyConfig, Correction};
use crate::types::ResponseRecord;
use serde::Serialize;
use std::collections::BTreeMap;

/// Raw trials form groups of this many rows
const TRIAL_GROUP_SIZE: i64 = 5;

/// Offset of the representative row inside a trial group
const TRIAL_GROUP_OFFSET: i64 = 2;

/// Assembly counters
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AssemblyStats {
    /// Records received from all files
    pub input_rows: usize,
    /// Records outside the representative trial position
    pub filtered_rows: usize,
    /// Cell values rewritten by corrections
    pub corrected_values: usize,
}

/// Assembled dataset, in output order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Dataset {
    pub records: Vec<ResponseRecord>,
    pub stats: AssemblyStats,
}

impl Dataset {
    /// Smallest and largest renumbered trial
    pub fn trial_range(&self) -> Option<(i64, i64)> {
        let min = self.records.iter().map(|r| r.trial).min()?;
        let max = self.records.iter().map(|r| r.trial).max()?;
        Some((min, max))
    }

    /// Row count per block
    pub fn block_distribution(&self) -> BTreeMap<u8, usize> {
        let mut distribution = BTreeMap::new();
        for record in &self.records {
            if let Some(block) = record.block {
                *distribution.entry(block).or_insert(0) += 1;
            }
        }
        distribution
    }
}

/// Assembles per-file records into the final dataset
pub struct DatasetAssembler<'a> {
    config: &'a AssemblyConfig,
}

impl<'a> DatasetAssembler<'a> {
    pub fn new(config: &'a AssemblyConfig) -> Self {
        Self { config }
    }

    /// Run every assembly stage over the concatenated records
    pub fn assemble<I>(&self, per_file: I) -> Dataset
    where
        I: IntoIterator<Item = Vec<ResponseRecord>>,
    {
        let combined: Vec<ResponseRecord> = per_file.into_iter().flatten().collect();
        let input_rows = combined.len();

        let mut records: Vec<ResponseRecord> = combined
            .into_iter()
            .filter(|record| is_group_representative(record.trial))
            .collect();
        let filtered_rows = input_rows - records.len();

        let mut corrected_values = 0;
        for record in &mut records {
            record.trial = renumber_trial(record.trial);
            record.block = Some(assign_block(record.trial, &self.config.block_upper_bounds));
            corrected_values += apply_corrections(record, &self.config.corrections);
        }

        Dataset {
            records,
            stats: AssemblyStats {
                input_rows,
                filtered_rows,
                corrected_values,
            },
        }
    }
}

/// `(trial - 2) mod 5 == 0`
pub fn is_group_representative(trial: i64) -> bool {
    (trial - TRIAL_GROUP_OFFSET).rem_euclid(TRIAL_GROUP_SIZE) == 0
}

/// `(trial - 2) div 5`
pub fn renumber_trial(trial: i64) -> i64 {
    (trial - TRIAL_GROUP_OFFSET).div_euclid(TRIAL_GROUP_SIZE)
}

/// 1-based block: first bound the trial does not exceed, else one past the last
pub fn assign_block(trial: i64, upper_bounds: &[i64]) -> u8 {
    let index = upper_bounds
        .iter()
        .position(|bound| trial <= *bound)
        .unwrap_or(upper_bounds.len());
    u8::try_from(index + 1).unwrap_or(u8::MAX)
}

/// Apply exact-value corrections; returns how many values changed
pub fn apply_corrections(record: &mut ResponseRecord, corrections: &[Correction]) -> usize {
    let mut changed = 0;
    for correction in corrections {
        if let Some(value) = record.text_mut(&correction.column) {
            if *value == correction.from {
                *value = correction.to.clone();
                changed += 1;
            }
        }
    }
    changed
}
