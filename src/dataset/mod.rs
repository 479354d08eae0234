//! Prompt datasets: loading, transforming and publishing.
//!
//! A dataset is an ordered list of [`Row`]s. Each row maps a column name to
//! a JSON value; rows are independent of each other.
//!
//! ## Example
//!
//! ```rust,ignore
//! use t2i_eval::dataset::{publish_dataset, LocalDatasetLoader, LocalDatasetStore, PublishOptions};
//!
//! let options = PublishOptions::builder()
//!     .prompt_column("caption")
//!     .ground_truth_image_column("image")
//!     .data_limit(100)
//!     .build()?;
//!
//! let mut store = LocalDatasetStore::new("./datasets");
//! let reference = publish_dataset(&LocalDatasetLoader, &mut store, "./coco-captions", options)?;
//! ```

mod loader;
mod publish;
mod store;

use std::path::PathBuf;

use serde_json::Value;

pub use loader::{DatasetLoader, LocalDatasetLoader};
pub use publish::{
    GROUND_TRUTH_IMAGE_COLUMN, PROMPT_COLUMN, PublishOptions, PublishOptionsBuilder,
    publish_dataset,
};
pub use store::{DatasetRef, DatasetStore, LocalDatasetStore, PublishedDataset};

use crate::error::{Error, Result};

/// A single dataset row.
pub type Row = serde_json::Map<String, Value>;

/// Whole-row transform, applied to every row of a dataset.
pub type DatasetTransform = Box<dyn Fn(Row) -> Result<Row> + Send + Sync>;

/// Per-value transform for a single column.
pub type ColumnTransform = Box<dyn Fn(&Value) -> Result<Value> + Send + Sync>;

/// An in-memory dataset split.
#[derive(Debug, Clone, Default)]
pub struct Dataset {
    /// Directory used to resolve relative file references in cells.
    pub root: Option<PathBuf>,
    columns: Vec<String>,
    rows: Vec<Row>,
}

impl Dataset {
    /// Create a dataset from rows. Columns are collected in first-seen order.
    #[must_use]
    pub fn new(rows: Vec<Row>) -> Self {
        Self {
            root: None,
            columns: collect_columns(&rows),
            rows,
        }
    }

    /// Create a dataset with an explicit column list (e.g. from a CSV header).
    #[must_use]
    pub fn with_columns(columns: Vec<String>, rows: Vec<Row>) -> Self {
        Self {
            root: None,
            columns,
            rows,
        }
    }

    /// Set the directory used to resolve relative paths.
    #[must_use]
    pub fn with_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.root = Some(root.into());
        self
    }

    /// Number of rows.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Check if the dataset has no rows.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Column names.
    #[must_use]
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Whether a column exists.
    #[must_use]
    pub fn has_column(&self, name: &str) -> bool {
        self.columns.iter().any(|c| c == name)
    }

    /// Rows in order.
    #[must_use]
    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    /// Consume the dataset and return its rows.
    #[must_use]
    pub fn into_rows(self) -> Vec<Row> {
        self.rows
    }

    /// Keep only the first `n` rows.
    #[must_use]
    pub fn take(mut self, n: usize) -> Self {
        self.rows.truncate(n);
        self
    }

    /// Apply a row transform to every row, in order.
    pub fn map<F>(self, transform: F) -> Result<Self>
    where
        F: Fn(Row) -> Result<Row>,
    {
        let rows = self
            .rows
            .into_iter()
            .map(transform)
            .collect::<Result<Vec<_>>>()?;

        let columns = if rows.is_empty() {
            self.columns
        } else {
            collect_columns(&rows)
        };

        Ok(Self {
            root: self.root,
            columns,
            rows,
        })
    }

    /// Rename a column, keeping its position in every row.
    pub fn rename_column(self, from: &str, to: &str) -> Result<Self> {
        if !self.has_column(from) {
            return Err(Error::UnknownColumn(from.to_string()));
        }
        if from == to {
            return Ok(self);
        }
        if self.has_column(to) {
            return Err(Error::InvalidConfig(format!(
                "cannot rename {from:?} to {to:?}: column already exists"
            )));
        }

        let rename = |name: String| if name == from { to.to_string() } else { name };

        let columns = self.columns.into_iter().map(rename).collect();
        let rows = self
            .rows
            .into_iter()
            .map(|row| row.into_iter().map(|(k, v)| (rename(k), v)).collect())
            .collect();

        Ok(Self {
            root: self.root,
            columns,
            rows,
        })
    }
}

fn collect_columns(rows: &[Row]) -> Vec<String> {
    let mut columns: Vec<String> = Vec::new();
    for row in rows {
        for key in row.keys() {
            if !columns.iter().any(|c| c == key) {
                columns.push(key.clone());
            }
        }
    }
    columns
}

#[cfg(test)]
pub(crate) fn row(pairs: &[(&str, Value)]) -> Row {
    pairs
        .iter()
        .map(|(k, v)| ((*k).to_string(), v.clone()))
        .collect()
}
