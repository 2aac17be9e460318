//! trial-prep - Batch preparation of listening-experiment responses
//!
//! trial-prep turns raw jsPsych trial logs into one analysis-ready table
//! through a deterministic pipeline: stimulus catalog loading → response
//! reconstruction → dataset assembly → CSV encoding.
//!
//! ## Modules
//!
//! - **Catalog**: Load the stimulus workbook, one sheet per list
//! - **Parser**: Pair each free-text response with the audio that preceded it
//! - **Assembler**: Keep one row per trial group, renumber trials, assign blocks

pub mod answers;
pub mod assembler;
pub mod catalog;
pub mod config;
pub mod encoder;
pub mod error;
pub mod parser;
pub mod pipeline;
pub mod report;
pub mod trial_log;
pub mod types;

pub use catalog::StimulusCatalog;
pub use config::{CompiledConfig, PipelineConfig};
pub use error::PrepError;
pub use pipeline::{discover_inputs, prepare_dataset, DatasetPipeline};
pub use report::RunReport;
pub use types::{ResponseRecord, OUTPUT_COLUMNS};

/// trial-prep version embedded in reports
pub const PREP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Producer name for reports
pub const PRODUCER_NAME: &str = "trial-prep";
