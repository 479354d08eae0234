//! Versioned storage for published datasets.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::dataset::Row;
use crate::error::{Error, Result};

/// Handle to one published version of a dataset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatasetRef {
    /// Dataset name.
    pub name: String,
    /// Version number, starting at 1.
    pub version: u32,
    /// Location of the stored artifact.
    pub path: PathBuf,
}

impl std::fmt::Display for DatasetRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:v{}", self.name, self.version)
    }
}

/// A published dataset artifact.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublishedDataset {
    /// Dataset name.
    pub name: String,
    /// Version number.
    pub version: u32,
    /// When this version was published.
    pub created_at: DateTime<Utc>,
    /// Rows in publication order.
    pub rows: Vec<Row>,
}

/// Capability to publish and retrieve named, versioned datasets.
pub trait DatasetStore {
    /// Publish `rows` as the next version of `name`.
    fn publish(&mut self, name: &str, rows: Vec<Row>) -> Result<DatasetRef>;

    /// Retrieve a published version.
    fn fetch(&self, reference: &DatasetRef) -> Result<PublishedDataset>;

    /// Reference to the newest version of `name`, if any was published.
    fn latest(&self, name: &str) -> Result<Option<DatasetRef>>;
}

/// Stores each version as `<root>/<name>/v<N>.json`.
#[derive(Debug, Clone)]
pub struct LocalDatasetStore {
    root: PathBuf,
}

impl LocalDatasetStore {
    /// Create a store rooted at `root`. The directory is created on first publish.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Root directory of the store.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// All published versions of `name`, ascending.
    pub fn versions(&self, name: &str) -> Result<Vec<u32>> {
        let dir = self.dataset_dir(name)?;
        if !dir.is_dir() {
            return Ok(Vec::new());
        }

        let mut versions: Vec<u32> = fs::read_dir(&dir)?
            .filter_map(|entry| entry.ok())
            .filter_map(|entry| {
                let file_name = entry.file_name();
                let file_name = file_name.to_str()?;
                file_name
                    .strip_prefix('v')?
                    .strip_suffix(".json")?
                    .parse()
                    .ok()
            })
            .collect();
        versions.sort_unstable();
        Ok(versions)
    }

    fn dataset_dir(&self, name: &str) -> Result<PathBuf> {
        validate_name(name)?;
        Ok(self.root.join(name))
    }

    fn reference(&self, name: &str, version: u32) -> Result<DatasetRef> {
        Ok(DatasetRef {
            name: name.to_string(),
            version,
            path: self.dataset_dir(name)?.join(format!("v{version}.json")),
        })
    }
}

impl DatasetStore for LocalDatasetStore {
    fn publish(&mut self, name: &str, rows: Vec<Row>) -> Result<DatasetRef> {
        let version = self.versions(name)?.last().map_or(1, |v| v + 1);
        let reference = self.reference(name, version)?;
        fs::create_dir_all(self.dataset_dir(name)?)?;

        let artifact = PublishedDataset {
            name: name.to_string(),
            version,
            created_at: Utc::now(),
            rows,
        };
        fs::write(&reference.path, serde_json::to_string_pretty(&artifact)?)?;

        tracing::info!(
            dataset = %reference,
            rows = artifact.rows.len(),
            path = %reference.path.display(),
            "Published dataset"
        );
        Ok(reference)
    }

    fn fetch(&self, reference: &DatasetRef) -> Result<PublishedDataset> {
        let content = fs::read_to_string(&reference.path).map_err(|e| Error::DatasetLoad {
            dataset: reference.to_string(),
            reason: e.to_string(),
        })?;
        Ok(serde_json::from_str(&content)?)
    }

    fn latest(&self, name: &str) -> Result<Option<DatasetRef>> {
        match self.versions(name)?.last() {
            Some(&version) => Ok(Some(self.reference(name, version)?)),
            None => Ok(None),
        }
    }
}

fn validate_name(name: &str) -> Result<()> {
    if name.is_empty() || name.contains(['/', '\\']) || name == "." || name == ".." {
        return Err(Error::InvalidConfig(format!("invalid dataset name: {name:?}")));
    }
    Ok(())
}
