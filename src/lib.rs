//! # t2i-eval
//!
//! Evaluation harness for text-to-image diffusion models.
//!
//! Model runtimes are plugged in through the traits in [`models`]; this
//! library handles prompt datasets, image generation bookkeeping, CLIP
//! scoring, call tracing and experiment tracking.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use t2i_eval::{
//!     DiffusionEvalPipeline, EvaluationConfig, InitParams, LocalTracker, TrackingSession,
//! };
//!
//! let config = EvaluationConfig::builder()
//!     .diffusion_model("stable-diffusion-v1-5/stable-diffusion-v1-5")
//!     .build()?;
//!
//! let mut pipeline = DiffusionEvalPipeline::new(config, &my_loader)?;
//! let tracker = LocalTracker::new("./runs");
//! let mut session = TrackingSession::new(&tracker, InitParams::default());
//! let outcome = pipeline.run(&rows, &mut session)?;
//! session.finish()?;
//! ```
//!
//! ## Modules
//!
//! - [`error`]: Error types for the library
//! - [`encoding`]: Base64 data-URI encoding of images
//! - [`dataset`]: Dataset loading, transformation and publishing
//! - [`models`]: Seams to model runtimes
//! - [`metrics`]: CLIP score
//! - [`eval`]: Evaluation pipeline and results table
//! - [`judge`]: Object-detection judge for spatial relationships
//! - [`trace`]: Call tracing
//! - [`tracking`]: Experiment tracking
//! - [`stats`]: Descriptive statistics

pub mod dataset;
pub mod encoding;
pub mod error;
pub mod eval;
pub mod imaging;
pub mod judge;
pub mod metrics;
pub mod models;
pub mod stats;
pub mod trace;
pub mod tracking;

// Re-export commonly used types
pub use dataset::{Dataset, DatasetRef, PublishOptions, Row, publish_dataset};
pub use encoding::{ImageSource, base64_encode_image};
pub use error::{Error, Result};
pub use eval::{
    DiffusionEvalPipeline, EvaluationConfig, EvaluationRecord, EvaluationSummary, ResultsTable,
    SeedPolicy,
};
pub use imaging::ImageData;
pub use judge::{BoundingBox, CartesianCoordinate2D, DetrSpatialRelationshipJudge, JudgeConfig};
pub use models::{ClipModel, ModelLoader, ModelSpec, ObjectDetector, TextToImageModel};
pub use stats::Summary;
pub use trace::TraceRecorder;
pub use tracking::{ExperimentTracker, InitParams, LocalTracker, TrackerRun, TrackingSession};
