//! DETR-based spatial relationship judge.

use serde::{Deserialize, Serialize};

use crate::encoding::decode_data_uri;
use crate::error::{Error, Result};
use crate::judge::BoundingBox;
use crate::models::{ModelLoader, ModelSpec, ObjectDetector};

/// Default detector checkpoint.
pub const DEFAULT_DETR_MODEL: &str = "facebook/detr-resnet-50";

/// Revision of [`DEFAULT_DETR_MODEL`] without the timm backbone.
pub const DEFAULT_DETR_REVISION: &str = "no_timm";

/// Minimum detection confidence kept by the judge.
pub const DEFAULT_DETECTION_THRESHOLD: f64 = 0.9;

/// Configuration for [`DetrSpatialRelationshipJudge`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JudgeConfig {
    pub model_address: String,
    pub revision: Option<String>,
    pub threshold: f64,
}

impl Default for JudgeConfig {
    fn default() -> Self {
        Self {
            model_address: DEFAULT_DETR_MODEL.to_string(),
            revision: Some(DEFAULT_DETR_REVISION.to_string()),
            threshold: DEFAULT_DETECTION_THRESHOLD,
        }
    }
}

impl JudgeConfig {
    /// Override the detection threshold.
    #[must_use]
    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.threshold = threshold;
        self
    }

    fn validate(&self) -> Result<()> {
        if self.model_address.trim().is_empty() {
            return Err(Error::InvalidConfig("model_address must not be empty".to_string()));
        }
        if !(0.0..=1.0).contains(&self.threshold) {
            return Err(Error::InvalidConfig(format!(
                "threshold must be in [0, 1], got {}",
                self.threshold
            )));
        }
        Ok(())
    }

    fn model_spec(&self) -> ModelSpec {
        let spec = ModelSpec::new(&self.model_address);
        match &self.revision {
            Some(rev) => spec.with_revision(rev),
            None => spec,
        }
    }
}

/// Detects objects in base64-encoded images with a pretrained DETR model.
pub struct DetrSpatialRelationshipJudge {
    config: JudgeConfig,
    detector: Box<dyn ObjectDetector>,
}

impl DetrSpatialRelationshipJudge {
    /// Load the detector. Load failures are returned, not retried.
    pub fn new(loader: &dyn ModelLoader, config: JudgeConfig) -> Result<Self> {
        config.validate()?;
        let spec = config.model_spec();
        let detector = loader.load_detector(&spec)?;
        tracing::info!(model = %spec, threshold = config.threshold, "Loaded object detector");
        Ok(Self { config, detector })
    }

    /// Wrap an already loaded detector.
    pub fn from_detector(detector: Box<dyn ObjectDetector>, config: JudgeConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config, detector })
    }

    #[must_use]
    pub fn config(&self) -> &JudgeConfig {
        &self.config
    }

    /// Detect objects in `image`, a string of the form `<anything>;base64,<payload>`.
    ///
    /// Only detections scoring at least the configured threshold are returned,
    /// in detector order. Ids missing from the detector vocabulary are
    /// labeled `LABEL_<id>`.
    pub fn predict(&self, image: &str) -> Result<Vec<BoundingBox>> {
        let bytes = decode_data_uri(image)?;
        let decoded = image::load_from_memory(&bytes)?.to_rgb8();

        let detections = self.detector.detect(&decoded, self.config.threshold)?;

        let boxes: Vec<BoundingBox> = detections
            .into_iter()
            .filter(|d| d.score >= self.config.threshold)
            .map(|d| {
                let [xmin, ymin, xmax, ymax] = d.bbox;
                let label = self
                    .detector
                    .label_for(d.label_id)
                    .unwrap_or_else(|| format!("LABEL_{}", d.label_id));
                BoundingBox::from_corners(xmin, ymin, xmax, ymax, label, d.score)
            })
            .collect();

        tracing::debug!(
            width = decoded.width(),
            height = decoded.height(),
            boxes = boxes.len(),
            "Judged image"
        );
        Ok(boxes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoding::{ImageSource, base64_encode_image};
    use crate::imaging::ImageData;
    use crate::models::{ClipModel, Detection, Dtype, TextToImageModel};
    use image::RgbImage;

    /// Reports every detection regardless of threshold.
    struct FixedDetector;

    impl ObjectDetector for FixedDetector {
        fn detect(&self, image: &RgbImage, _threshold: f64) -> Result<Vec<Detection>> {
            let (w, h) = (f64::from(image.width()), f64::from(image.height()));
            Ok(vec![
                Detection {
                    label_id: 17,
                    score: 0.99,
                    bbox: [0.0, 0.0, w / 2.0, h / 2.0],
                },
                Detection {
                    label_id: 18,
                    score: 0.5,
                    bbox: [1.0, 1.0, 2.0, 2.0],
                },
                Detection {
                    label_id: 999,
                    score: 0.9,
                    bbox: [w, h, w / 2.0, h / 2.0],
                },
            ])
        }

        fn label_for(&self, label_id: usize) -> Option<String> {
            match label_id {
                17 => Some("cat".to_string()),
                18 => Some("dog".to_string()),
                _ => None,
            }
        }
    }

    struct DetectorOnlyLoader {
        fail: bool,
    }

    impl ModelLoader for DetectorOnlyLoader {
        fn load_text_to_image(
            &self,
            spec: &ModelSpec,
            _: Dtype,
        ) -> Result<Box<dyn TextToImageModel>> {
            Err(unsupported(spec))
        }

        fn load_clip(&self, spec: &ModelSpec) -> Result<Box<dyn ClipModel>> {
            Err(unsupported(spec))
        }

        fn load_detector(&self, spec: &ModelSpec) -> Result<Box<dyn ObjectDetector>> {
            assert_eq!(spec.to_string(), "facebook/detr-resnet-50@no_timm");
            if self.fail {
                return Err(Error::ModelLoad {
                    model: spec.to_string(),
                    reason: "offline".into(),
                });
            }
            Ok(Box::new(FixedDetector))
        }
    }

    fn unsupported(spec: &ModelSpec) -> Error {
        Error::ModelLoad {
            model: spec.to_string(),
            reason: "unsupported".into(),
        }
    }

    fn encoded_image() -> String {
        let image = ImageData::Decoded(RgbImage::from_pixel(64, 32, image::Rgb([0, 128, 255])));
        base64_encode_image(ImageSource::Image(&image), None).unwrap()
    }

    fn judge() -> DetrSpatialRelationshipJudge {
        let loader = DetectorOnlyLoader { fail: false };
        DetrSpatialRelationshipJudge::new(&loader, JudgeConfig::default()).unwrap()
    }

    #[test]
    fn test_predict_filters_and_labels() {
        let boxes = judge().predict(&encoded_image()).unwrap();

        assert_eq!(boxes.len(), 2);
        assert_eq!(boxes[0].label(), "cat");
        assert_eq!(boxes[0].max().x, 32.0);
        assert_eq!(boxes[1].label(), "LABEL_999");
        for b in &boxes {
            assert!(b.score() >= DEFAULT_DETECTION_THRESHOLD);
            assert!(b.min().x <= b.center().x && b.center().x <= b.max().x);
            assert!(b.min().y <= b.center().y && b.center().y <= b.max().y);
        }
    }

    #[test]
    fn test_predict_deterministic() {
        let judge = judge();
        let image = encoded_image();
        assert_eq!(judge.predict(&image).unwrap(), judge.predict(&image).unwrap());
    }

    #[test]
    fn test_predict_accepts_bare_payload() {
        let uri = encoded_image();
        let payload = uri.split(";base64,").last().unwrap();
        assert_eq!(judge().predict(payload).unwrap().len(), 2);
    }

    #[test]
    fn test_malformed_base64() {
        let err = judge().predict("data:image/png;base64,!!not-base64!!");
        assert!(matches!(err, Err(Error::Base64(_))));
    }

    #[test]
    fn test_undecodable_image() {
        let err = judge().predict("data:image/png;base64,aGVsbG8=");
        assert!(matches!(err, Err(Error::Image(_))));
    }

    #[test]
    fn test_load_failure_is_fatal() {
        let loader = DetectorOnlyLoader { fail: true };
        let result = DetrSpatialRelationshipJudge::new(&loader, JudgeConfig::default());
        assert!(matches!(result, Err(Error::ModelLoad { .. })));
    }

    #[test]
    fn test_invalid_threshold() {
        let config = JudgeConfig::default().with_threshold(1.5);
        let result = DetrSpatialRelationshipJudge::from_detector(Box::new(FixedDetector), config);
        assert!(result.is_err());
    }
}
