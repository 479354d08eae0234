//! Report types for evaluation results.
//!
//! The results table holds one [`EvaluationRecord`] per processed dataset
//! row, in processing order, and can be serialized to JSON or CSV.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::stats::Summary;

/// Column names of the results table, in order.
pub const RESULT_COLUMNS: [&str; 4] = ["model", "prompt", "image", "clip_score"];

/// Result of scoring one generated image.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationRecord {
    /// Diffusion model identifier.
    pub model: String,

    /// Prompt the image was generated from.
    pub prompt: String,

    /// Path of the generated image.
    pub image: PathBuf,

    /// CLIP score of the image against the prompt (0-100).
    pub clip_score: f64,
}

/// Append-only table of evaluation records.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResultsTable {
    rows: Vec<EvaluationRecord>,
}

impl ResultsTable {
    /// Create an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Column names.
    #[must_use]
    pub fn columns(&self) -> [&'static str; 4] {
        RESULT_COLUMNS
    }

    /// Append a record.
    pub fn add(&mut self, record: EvaluationRecord) {
        self.rows.push(record);
    }

    /// Records in insertion order.
    #[must_use]
    pub fn rows(&self) -> &[EvaluationRecord] {
        &self.rows
    }

    /// Number of records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Check if the table is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// CLIP scores in insertion order.
    #[must_use]
    pub fn clip_scores(&self) -> Vec<f64> {
        self.rows.iter().map(|r| r.clip_score).collect()
    }

    /// Write the table as pretty JSON.
    pub fn write_json(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Read a table written by [`ResultsTable::write_json`].
    pub fn read_json(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Write the table as CSV with a header row.
    pub fn write_csv(&self, path: &Path) -> Result<()> {
        let mut wtr = csv::Writer::from_path(path)?;

        wtr.write_record(RESULT_COLUMNS)?;
        for record in &self.rows {
            let image = record.image.display().to_string();
            let clip_score = format!("{:.4}", record.clip_score);
            wtr.write_record([
                record.model.as_str(),
                record.prompt.as_str(),
                image.as_str(),
                clip_score.as_str(),
            ])?;
        }

        wtr.flush()?;
        Ok(())
    }
}

/// Aggregate outcome of one evaluation run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluationSummary {
    /// Number of rows processed.
    pub rows: usize,

    /// Statistics over per-row CLIP scores.
    pub clip_score: Option<Summary>,

    /// Statistics over per-row inference latency, in milliseconds.
    pub model_latency_ms: Option<Summary>,

    /// When the run finished.
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

impl EvaluationSummary {
    /// Summarize per-row scores and latencies.
    #[must_use]
    pub fn from_runs(clip_scores: &[f64], latencies_ms: &[f64]) -> Self {
        Self {
            rows: clip_scores.len(),
            clip_score: Summary::compute(clip_scores),
            model_latency_ms: Summary::compute(latencies_ms),
            timestamp: chrono::Utc::now(),
        }
    }

    /// Mean CLIP score, if any row was scored.
    #[must_use]
    pub fn mean_clip_score(&self) -> Option<f64> {
        self.clip_score.as_ref().map(|s| s.mean)
    }
}
