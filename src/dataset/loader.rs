//! Dataset loading from local files.

use std::fs;
use std::path::Path;

use serde_json::Value;

use crate::dataset::{Dataset, Row};
use crate::error::{Error, Result};

/// File extensions tried, in order, for a split inside a dataset directory.
const SPLIT_EXTENSIONS: &[&str] = &["jsonl", "json", "csv"];

/// Split name assumed for a dataset given as a single file.
const SINGLE_FILE_SPLIT: &str = "train";

/// Capability to load one split of a dataset by identifier or path.
pub trait DatasetLoader {
    /// Load `split` of the dataset at `path`.
    fn load(&self, path: &str, split: &str) -> Result<Dataset>;
}

/// Loads datasets stored as JSON Lines, JSON arrays or CSV files.
///
/// `path` is either a directory holding `<split>.jsonl`, `<split>.json` or
/// `<split>.csv`, or a single such file that is treated as the `train` split.
/// The containing directory becomes the dataset root.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalDatasetLoader;

impl DatasetLoader for LocalDatasetLoader {
    fn load(&self, path: &str, split: &str) -> Result<Dataset> {
        let root = Path::new(path);

        let (file, dir) = if root.is_file() {
            if split != SINGLE_FILE_SPLIT {
                return Err(load_error(
                    path,
                    format!("single-file dataset has no split {split:?}"),
                ));
            }
            (root.to_path_buf(), root.parent().unwrap_or(Path::new(".")).to_path_buf())
        } else if root.is_dir() {
            let file = SPLIT_EXTENSIONS
                .iter()
                .map(|ext| root.join(format!("{split}.{ext}")))
                .find(|candidate| candidate.is_file())
                .ok_or_else(|| load_error(path, format!("no data file for split {split:?}")))?;
            (file, root.to_path_buf())
        } else {
            return Err(load_error(path, "path does not exist".to_string()));
        };

        let dataset = match file.extension().and_then(|s| s.to_str()) {
            Some("jsonl") => read_jsonl(&file)?,
            Some("json") => read_json(&file)?,
            Some("csv") => read_csv(&file)?,
            _ => {
                return Err(load_error(
                    path,
                    format!("unsupported data file {}", file.display()),
                ));
            }
        };

        tracing::debug!(
            dataset = %path,
            split = %split,
            rows = dataset.len(),
            "Loaded dataset split"
        );

        Ok(dataset.with_root(dir))
    }
}

fn load_error(dataset: &str, reason: String) -> Error {
    Error::DatasetLoad {
        dataset: dataset.to_string(),
        reason,
    }
}

fn into_row(value: Value, file: &Path, index: usize) -> Result<Row> {
    match value {
        Value::Object(map) => Ok(map),
        other => Err(load_error(
            &file.display().to_string(),
            format!("record {index} is not an object: {other}"),
        )),
    }
}

fn read_jsonl(file: &Path) -> Result<Dataset> {
    let content = fs::read_to_string(file)?;
    let rows = content
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(index, line)| into_row(serde_json::from_str(line)?, file, index + 1))
        .collect::<Result<Vec<_>>>()?;
    Ok(Dataset::new(rows))
}

fn read_json(file: &Path) -> Result<Dataset> {
    let content = fs::read_to_string(file)?;
    let records: Vec<Value> = serde_json::from_str(&content)?;
    let rows = records
        .into_iter()
        .enumerate()
        .map(|(index, value)| into_row(value, file, index))
        .collect::<Result<Vec<_>>>()?;
    Ok(Dataset::new(rows))
}

fn read_csv(file: &Path) -> Result<Dataset> {
    let mut reader = csv::Reader::from_path(file)?;
    let headers: Vec<String> = reader.headers()?.iter().map(str::to_string).collect();

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        let row: Row = headers
            .iter()
            .zip(record.iter())
            .map(|(name, cell)| {
                let value = if cell.is_empty() {
                    Value::Null
                } else {
                    Value::String(cell.to_string())
                };
                (name.clone(), value)
            })
            .collect();
        rows.push(row);
    }

    Ok(Dataset::with_columns(headers, rows))
}
