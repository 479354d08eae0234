//! Dataset preparation and publication.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use rayon::prelude::*;
use serde_json::Value;

use crate::dataset::{
    ColumnTransform, DatasetLoader, DatasetRef, DatasetStore, DatasetTransform, Row,
};
use crate::encoding::{ImageSource, base64_encode_image, is_data_uri, mimetype_for_path};
use crate::error::{Error, Result};
use crate::imaging::ImageData;

/// Canonical name of the prompt column.
pub const PROMPT_COLUMN: &str = "prompt";

/// Canonical name of the ground-truth image column.
pub const GROUND_TRUTH_IMAGE_COLUMN: &str = "ground_truth_image";

const DEFAULT_SPLIT: &str = "train";

/// Options for [`publish_dataset`].
pub struct PublishOptions {
    /// Published name. Defaults to the stem of the dataset path.
    pub dataset_name: Option<String>,

    /// Column renamed to `prompt`.
    pub prompt_column: Option<String>,

    /// Column renamed to `ground_truth_image`.
    pub ground_truth_image_column: Option<String>,

    /// Split to load.
    pub split: String,

    /// Maximum number of rows to publish.
    pub data_limit: Option<usize>,

    /// Whether to return a reference to the published dataset.
    pub return_reference: bool,

    /// Row transforms, applied in order before renaming.
    pub dataset_transforms: Vec<DatasetTransform>,

    /// Value transforms keyed by (renamed) column name.
    pub column_transforms: HashMap<String, ColumnTransform>,
}

impl PublishOptions {
    /// Create a new options builder.
    #[must_use]
    pub fn builder() -> PublishOptionsBuilder {
        PublishOptionsBuilder::default()
    }
}

impl Default for PublishOptions {
    fn default() -> Self {
        Self {
            dataset_name: None,
            prompt_column: None,
            ground_truth_image_column: None,
            split: DEFAULT_SPLIT.to_string(),
            data_limit: None,
            return_reference: true,
            dataset_transforms: Vec::new(),
            column_transforms: HashMap::new(),
        }
    }
}

impl std::fmt::Debug for PublishOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut transformed: Vec<&String> = self.column_transforms.keys().collect();
        transformed.sort();
        f.debug_struct("PublishOptions")
            .field("dataset_name", &self.dataset_name)
            .field("prompt_column", &self.prompt_column)
            .field("ground_truth_image_column", &self.ground_truth_image_column)
            .field("split", &self.split)
            .field("data_limit", &self.data_limit)
            .field("return_reference", &self.return_reference)
            .field("dataset_transforms", &self.dataset_transforms.len())
            .field("column_transforms", &transformed)
            .finish()
    }
}

/// Builder for [`PublishOptions`].
#[derive(Default)]
pub struct PublishOptionsBuilder {
    options: PublishOptions,
}

impl PublishOptionsBuilder {
    /// Set the published dataset name.
    #[must_use]
    pub fn dataset_name(mut self, name: impl Into<String>) -> Self {
        self.options.dataset_name = Some(name.into());
        self
    }

    /// Set the column holding prompts.
    #[must_use]
    pub fn prompt_column(mut self, name: impl Into<String>) -> Self {
        self.options.prompt_column = Some(name.into());
        self
    }

    /// Set the column holding ground-truth images.
    #[must_use]
    pub fn ground_truth_image_column(mut self, name: impl Into<String>) -> Self {
        self.options.ground_truth_image_column = Some(name.into());
        self
    }

    /// Set the split to load.
    #[must_use]
    pub fn split(mut self, split: impl Into<String>) -> Self {
        self.options.split = split.into();
        self
    }

    /// Limit the number of published rows.
    #[must_use]
    pub fn data_limit(mut self, limit: usize) -> Self {
        self.options.data_limit = Some(limit);
        self
    }

    /// Whether to return a reference after publishing.
    #[must_use]
    pub fn return_reference(mut self, enabled: bool) -> Self {
        self.options.return_reference = enabled;
        self
    }

    /// Append a row transform.
    #[must_use]
    pub fn dataset_transform<F>(mut self, transform: F) -> Self
    where
        F: Fn(Row) -> Result<Row> + Send + Sync + 'static,
    {
        self.options.dataset_transforms.push(Box::new(transform));
        self
    }

    /// Set the value transform for a column.
    #[must_use]
    pub fn column_transform<F>(mut self, column: impl Into<String>, transform: F) -> Self
    where
        F: Fn(&Value) -> Result<Value> + Send + Sync + 'static,
    {
        self.options
            .column_transforms
            .insert(column.into(), Box::new(transform));
        self
    }

    /// Validate and build the options.
    pub fn build(self) -> Result<PublishOptions> {
        let options = self.options;
        if options.split.trim().is_empty() {
            return Err(Error::InvalidConfig("split must not be empty".to_string()));
        }
        if let Some(name) = &options.dataset_name {
            if name.trim().is_empty() {
                return Err(Error::InvalidConfig(
                    "dataset_name must not be empty".to_string(),
                ));
            }
        }
        for column in [&options.prompt_column, &options.ground_truth_image_column]
            .into_iter()
            .flatten()
        {
            if column.is_empty() {
                return Err(Error::InvalidConfig("column names must not be empty".to_string()));
            }
        }
        Ok(options)
    }
}

/// Load, transform and publish a dataset.
///
/// Steps, in order: load the split, truncate to `data_limit`, run the row
/// transforms, rename the prompt and ground-truth columns, run the column
/// transforms, publish. The `ground_truth_image` column is always
/// base64-encoded; the built-in encoder replaces any user transform for it.
///
/// Returns the reference of the published version when
/// `options.return_reference` is set.
pub fn publish_dataset<L, S>(
    loader: &L,
    store: &mut S,
    dataset_path: &str,
    options: PublishOptions,
) -> Result<Option<DatasetRef>>
where
    L: DatasetLoader + ?Sized,
    S: DatasetStore + ?Sized,
{
    let PublishOptions {
        dataset_name,
        prompt_column,
        ground_truth_image_column,
        split,
        data_limit,
        return_reference,
        dataset_transforms,
        mut column_transforms,
    } = options;

    let name = match dataset_name {
        Some(name) => name,
        None => dataset_stem(dataset_path)?,
    };

    let mut dataset = loader.load(dataset_path, &split)?;

    if let Some(limit) = data_limit {
        if limit < dataset.len() {
            dataset = dataset.take(limit);
        }
    }

    for transform in &dataset_transforms {
        dataset = dataset.map(transform)?;
    }

    if let Some(column) = prompt_column {
        dataset = dataset.rename_column(&column, PROMPT_COLUMN)?;
    }
    if let Some(column) = ground_truth_image_column {
        dataset = dataset.rename_column(&column, GROUND_TRUTH_IMAGE_COLUMN)?;
    }

    column_transforms.insert(
        GROUND_TRUTH_IMAGE_COLUMN.to_string(),
        ground_truth_encoder(dataset.root.clone()),
    );

    tracing::info!(
        dataset = %name,
        split = %split,
        rows = dataset.len(),
        columns = ?dataset.columns(),
        "Encoding dataset rows"
    );

    let rows = dataset
        .into_rows()
        .into_par_iter()
        .map(|row| apply_column_transforms(row, &column_transforms))
        .collect::<Result<Vec<_>>>()?;

    let reference = store.publish(&name, rows)?;
    Ok(return_reference.then_some(reference))
}

fn dataset_stem(dataset_path: &str) -> Result<String> {
    Path::new(dataset_path)
        .file_stem()
        .and_then(|s| s.to_str())
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .ok_or_else(|| {
            Error::InvalidConfig(format!("cannot derive a dataset name from {dataset_path:?}"))
        })
}

fn apply_column_transforms(
    mut row: Row,
    transforms: &HashMap<String, ColumnTransform>,
) -> Result<Row> {
    for (key, value) in &mut row {
        if let Some(transform) = transforms.get(key) {
            let transformed = transform(&*value)?;
            *value = transformed;
        }
    }
    Ok(row)
}

/// Encodes a ground-truth cell as a data URI.
///
/// Cells hold an image path (relative paths resolve against `root`) or an
/// already encoded data URI, which is kept as-is. Files whose extension has
/// no known mimetype are decoded and re-encoded as PNG.
fn ground_truth_encoder(root: Option<PathBuf>) -> ColumnTransform {
    Box::new(move |value: &Value| {
        let Value::String(cell) = value else {
            return Err(Error::InvalidCell {
                column: GROUND_TRUTH_IMAGE_COLUMN.to_string(),
                reason: format!("expected an image path, got {value}"),
            });
        };
        if is_data_uri(cell) {
            return Ok(value.clone());
        }

        let path = Path::new(cell);
        let path = match &root {
            Some(root) if path.is_relative() => root.join(path),
            _ => path.to_path_buf(),
        };
        let uri = if mimetype_for_path(&path).is_ok() {
            base64_encode_image(ImageSource::Path(&path), None)?
        } else {
            let image = image::open(&path).map_err(|e| Error::ImageLoad {
                path: path.clone(),
                reason: e.to_string(),
            })?;
            base64_encode_image(ImageSource::Image(&ImageData::from(image)), None)?
        };
        Ok(Value::String(uri))
    })
}
