//! Scoring functions for generated images.
//!
//! - **CLIP score**: prompt/image agreement, `100 * cos(image, text)` clamped
//!   at zero (higher is better, range 0-100)

pub mod clip;

pub use clip::{CLIP_SCORE_MAX, clip_score, clip_score_from_embeddings};
