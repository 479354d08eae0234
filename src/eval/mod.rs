//! Evaluation pipeline and results.
//!
//! - [`pipeline::DiffusionEvalPipeline`]: generates and scores one image per prompt
//! - [`pipeline::EvaluationConfig`]: configuration for the pipeline
//! - [`report`]: results table and run summary

pub mod pipeline;
pub mod report;

pub use pipeline::{
    DiffusionEvalPipeline, EvaluationConfig, EvaluationConfigBuilder, EvaluationOutcome,
    InferenceOutput, ScoreOutput, SeedPolicy,
};
pub use report::{EvaluationRecord, EvaluationSummary, ResultsTable};
