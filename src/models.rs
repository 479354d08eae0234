//! Seams to pretrained model runtimes.
//!
//! The harness never runs tensors itself. Backends (candle, ONNX Runtime,
//! a Python bridge, ...) implement these traits and are handed to the
//! pipeline and judges through a [`ModelLoader`].

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::Result;
use crate::imaging::ImageData;
use image::RgbImage;

/// Identifies a pretrained model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelSpec {
    /// Hub identifier or local path.
    pub name_or_path: String,
    /// Optional revision (branch, tag or commit).
    pub revision: Option<String>,
}

impl ModelSpec {
    /// Create a spec for the default revision.
    #[must_use]
    pub fn new(name_or_path: impl Into<String>) -> Self {
        Self {
            name_or_path: name_or_path.into(),
            revision: None,
        }
    }

    /// Pin a revision.
    #[must_use]
    pub fn with_revision(mut self, revision: impl Into<String>) -> Self {
        self.revision = Some(revision.into());
        self
    }
}

impl std::fmt::Display for ModelSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.revision {
            Some(rev) => write!(f, "{}@{}", self.name_or_path, rev),
            None => write!(f, "{}", self.name_or_path),
        }
    }
}

/// Floating point precision for model weights.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dtype {
    /// 16-bit IEEE float.
    #[default]
    Float16,
    /// 16-bit brain float.
    Bfloat16,
    /// 32-bit float.
    Float32,
}

impl std::fmt::Display for Dtype {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Float16 => write!(f, "float16"),
            Self::Bfloat16 => write!(f, "bfloat16"),
            Self::Float32 => write!(f, "float32"),
        }
    }
}

/// Compute device for model execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Device {
    /// Host CPU.
    Cpu,
    /// CUDA accelerator.
    Cuda,
}

impl std::fmt::Display for Device {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Cpu => write!(f, "cpu"),
            Self::Cuda => write!(f, "cuda"),
        }
    }
}

/// Request for a single text-to-image generation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationRequest {
    /// Text prompt.
    pub prompt: String,
    /// Images to generate for the prompt.
    pub num_images_per_prompt: usize,
    /// Seed for the random generator.
    pub seed: u64,
}

/// A loaded text-to-image pipeline.
pub trait TextToImageModel: Send {
    /// Configuration of the loaded pipeline, recorded with evaluation results.
    fn config(&self) -> Value;

    /// Offload submodules to the CPU, moving them to the accelerator on demand.
    fn enable_model_cpu_offload(&mut self) -> Result<()>;

    /// Move the whole pipeline to `device`.
    fn to_device(&mut self, device: Device) -> Result<()>;

    /// Generate images; the first one is used by the evaluation pipeline.
    fn generate(&mut self, request: &GenerationRequest) -> Result<Vec<ImageData>>;
}

/// A loaded CLIP-style dual encoder.
pub trait ClipModel: Send {
    /// Embed an image.
    fn image_embedding(&self, image: &RgbImage) -> Result<Vec<f32>>;

    /// Embed a text.
    fn text_embedding(&self, text: &str) -> Result<Vec<f32>>;
}

/// A raw detection as produced by an object detector's post-processing.
#[derive(Debug, Clone, PartialEq)]
pub struct Detection {
    /// Class id in the detector's vocabulary.
    pub label_id: usize,
    /// Confidence in `[0, 1]`.
    pub score: f64,
    /// `[xmin, ymin, xmax, ymax]` in pixels.
    pub bbox: [f64; 4],
}

/// A loaded object detector with its post-processing.
pub trait ObjectDetector: Send + Sync {
    /// Detect objects with confidence above `threshold`, boxes scaled to the image size.
    fn detect(&self, image: &RgbImage, threshold: f64) -> Result<Vec<Detection>>;

    /// Human-readable name for a class id.
    fn label_for(&self, label_id: usize) -> Option<String>;
}

/// Capability to load pretrained models.
pub trait ModelLoader {
    /// Load a text-to-image pipeline with weights in `dtype`.
    fn load_text_to_image(&self, spec: &ModelSpec, dtype: Dtype)
    -> Result<Box<dyn TextToImageModel>>;

    /// Load a CLIP model.
    fn load_clip(&self, spec: &ModelSpec) -> Result<Box<dyn ClipModel>>;

    /// Load an object detector.
    fn load_detector(&self, spec: &ModelSpec) -> Result<Box<dyn ObjectDetector>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_model_spec_display() {
        assert_eq!(
            ModelSpec::new("facebook/detr-resnet-50").to_string(),
            "facebook/detr-resnet-50"
        );
        assert_eq!(
            ModelSpec::new("facebook/detr-resnet-50")
                .with_revision("no_timm")
                .to_string(),
            "facebook/detr-resnet-50@no_timm"
        );
    }

    #[test]
    fn test_dtype_serde() {
        assert_eq!(serde_json::to_string(&Dtype::Float16).unwrap(), "\"float16\"");
        let dtype: Dtype = serde_json::from_str("\"bfloat16\"").unwrap();
        assert_eq!(dtype, Dtype::Bfloat16);
        assert_eq!(Dtype::default().to_string(), "float16");
    }
}
