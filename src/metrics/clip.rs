//! CLIP score.

use image::RgbImage;

use crate::error::{Error, Result};
use crate::models::ClipModel;

/// Upper bound of the CLIP score.
pub const CLIP_SCORE_MAX: f64 = 100.0;

const METRIC: &str = "clip_score";

/// Compute the CLIP score of `image` against `prompt`.
pub fn clip_score(model: &dyn ClipModel, image: &RgbImage, prompt: &str) -> Result<f64> {
    let image_embedding = model.image_embedding(image)?;
    let text_embedding = model.text_embedding(prompt)?;
    clip_score_from_embeddings(&image_embedding, &text_embedding)
}

/// CLIP score from precomputed embeddings: `max(100 * cos(a, b), 0)`.
pub fn clip_score_from_embeddings(image: &[f32], text: &[f32]) -> Result<f64> {
    if image.len() != text.len() {
        return Err(Error::MetricCalculation {
            metric: METRIC.to_string(),
            reason: format!(
                "embedding size mismatch: image {} vs text {}",
                image.len(),
                text.len()
            ),
        });
    }

    let mut dot = 0.0f64;
    let mut image_norm = 0.0f64;
    let mut text_norm = 0.0f64;
    for (a, b) in image.iter().zip(text) {
        let (a, b) = (f64::from(*a), f64::from(*b));
        dot += a * b;
        image_norm += a * a;
        text_norm += b * b;
    }

    if image_norm == 0.0 || text_norm == 0.0 {
        return Err(Error::MetricCalculation {
            metric: METRIC.to_string(),
            reason: "zero-norm embedding".to_string(),
        });
    }

    let cosine = dot / (image_norm.sqrt() * text_norm.sqrt());
    Ok((CLIP_SCORE_MAX * cosine).clamp(0.0, CLIP_SCORE_MAX))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identical_embeddings() {
        let score = clip_score_from_embeddings(&[0.3, 0.4], &[0.3, 0.4]).unwrap();
        assert!((score - 100.0).abs() < 1e-9);
    }

    #[test]
    fn test_scale_invariant() {
        let a = clip_score_from_embeddings(&[1.0, 2.0, 3.0], &[3.0, 2.0, 1.0]).unwrap();
        let b = clip_score_from_embeddings(&[10.0, 20.0, 30.0], &[3.0, 2.0, 1.0]).unwrap();
        assert!((a - b).abs() < 1e-9);
        assert!((a - 100.0 * 10.0 / 14.0).abs() < 1e-6);
    }

    #[test]
    fn test_negative_similarity_clamped() {
        let score = clip_score_from_embeddings(&[1.0, 0.0], &[-1.0, 0.0]).unwrap();
        assert_eq!(score, 0.0);
    }

    #[test]
    fn test_size_mismatch() {
        assert!(matches!(
            clip_score_from_embeddings(&[1.0], &[1.0, 2.0]),
            Err(Error::MetricCalculation { .. })
        ));
    }

    #[test]
    fn test_zero_norm() {
        assert!(clip_score_from_embeddings(&[0.0, 0.0], &[1.0, 2.0]).is_err());
    }
}
