//! Error types for t2i-eval operations.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for t2i-eval operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while preparing data, running models or logging results.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// A pretrained model could not be resolved or loaded.
    #[error("Model load failed: {model}: {reason}")]
    ModelLoad {
        /// Model identifier or path.
        model: String,
        /// Reason for the failure.
        reason: String,
    },

    /// A dataset could not be resolved or read.
    #[error("Dataset load failed: {dataset}: {reason}")]
    DatasetLoad {
        /// Dataset identifier or path.
        dataset: String,
        /// Reason for the failure.
        reason: String,
    },

    /// The requested device is not available.
    #[error("Device error: {0}")]
    Device(String),

    /// No mimetype is known for the file extension.
    #[error("Unsupported image extension: {0:?}")]
    UnsupportedExtension(String),

    /// Failed to load an image file.
    #[error("Image load failed: {path}: {reason}")]
    ImageLoad {
        /// Path to the image that failed to load.
        path: PathBuf,
        /// Reason for the failure.
        reason: String,
    },

    /// Image encoding or decoding error.
    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    /// Malformed base64 payload.
    #[error("Base64 decode error: {0}")]
    Base64(#[from] base64::DecodeError),

    /// Pixel buffer length does not match the declared dimensions.
    #[error("Dimension mismatch: expected {expected} bytes, got {actual}")]
    DimensionMismatch {
        /// Expected buffer length.
        expected: usize,
        /// Actual buffer length.
        actual: usize,
    },

    /// A referenced column does not exist in the dataset.
    #[error("Unknown column: {0}")]
    UnknownColumn(String),

    /// A cell holds a value the operation cannot use.
    #[error("Invalid value in column {column}: {reason}")]
    InvalidCell {
        /// Column name.
        column: String,
        /// Reason the value was rejected.
        reason: String,
    },

    /// Configuration failed validation.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Error reported by a model backend during inference.
    #[error("Inference error ({model}): {message}")]
    Inference {
        /// Model identifier.
        model: String,
        /// Error message from the backend.
        message: String,
    },

    /// Failed to calculate a metric.
    #[error("Metric calculation failed: {metric}: {reason}")]
    MetricCalculation {
        /// Name of the metric that failed.
        metric: String,
        /// Reason for the failure.
        reason: String,
    },

    /// Experiment tracking error.
    #[error("Tracking error: {0}")]
    Tracking(String),

    /// Operation not allowed in the current pipeline state.
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// I/O error wrapper.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// CSV error.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}
