//! Text-to-image evaluation pipeline.
//!
//! [`DiffusionEvalPipeline`] generates one image per prompt with a
//! text-to-image model, scores it against the prompt with a CLIP model and
//! collects the results in a [`ResultsTable`]. Model runtimes are provided
//! through a [`ModelLoader`].
//!
//! # Example
//!
//! ```rust,ignore
//! use t2i_eval::eval::{DiffusionEvalPipeline, EvaluationConfig};
//! use t2i_eval::tracking::{InitParams, LocalTracker, TrackingSession};
//!
//! let config = EvaluationConfig::builder()
//!     .diffusion_model("stable-diffusion-v1-5/stable-diffusion-v1-5")
//!     .enable_cpu_offload(true)
//!     .build()?;
//!
//! let mut pipeline = DiffusionEvalPipeline::new(config, &loader)?;
//! let tracker = LocalTracker::new("./runs");
//! let mut session = TrackingSession::new(&tracker, InitParams::default());
//!
//! let outcome = pipeline.run(&rows, &mut session)?;
//! println!("mean CLIP score: {:?}", outcome.summary.mean_clip_score());
//! ```

use std::path::{Path, PathBuf};

use image::{ImageFormat, RgbImage};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

use crate::dataset::{PROMPT_COLUMN, Row};
use crate::error::{Error, Result};
use crate::eval::report::{EvaluationRecord, EvaluationSummary, ResultsTable};
use crate::metrics::clip_score;
use crate::models::{
    ClipModel, Device, Dtype, GenerationRequest, ModelLoader, ModelSpec, TextToImageModel,
};
use crate::trace::TraceRecorder;
use crate::tracking::TrackingSession;

/// Default CLIP model used for scoring.
pub const DEFAULT_CLIP_MODEL: &str = "openai/clip-vit-base-patch16";

/// Default generation seed.
pub const DEFAULT_SEED: u64 = 42;

/// Default directory for generated images.
pub const DEFAULT_OUTPUT_DIR: &str = "./generated_images";

/// Key the results table is logged under.
pub const EVALUATION_TABLE_KEY: &str = "Evaluation";

/// How the generation seed is chosen for each call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SeedPolicy {
    /// Every call uses the configured seed.
    #[default]
    Fixed,
    /// Call `i` (0-based) uses `seed + i`.
    PerCall,
}

impl SeedPolicy {
    /// Seed for the `call_index`-th generation.
    #[must_use]
    pub fn seed_for(self, seed: u64, call_index: u64) -> u64 {
        match self {
            Self::Fixed => seed,
            Self::PerCall => seed.wrapping_add(call_index),
        }
    }
}

fn default_clip_model() -> ModelSpec {
    ModelSpec::new(DEFAULT_CLIP_MODEL)
}

fn default_seed() -> u64 {
    DEFAULT_SEED
}

fn default_output_dir() -> PathBuf {
    PathBuf::from(DEFAULT_OUTPUT_DIR)
}

/// Configuration of a [`DiffusionEvalPipeline`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationConfig {
    /// Text-to-image model under evaluation.
    pub diffusion_model: ModelSpec,

    /// CLIP model used for scoring.
    #[serde(default = "default_clip_model")]
    pub clip_model: ModelSpec,

    /// Weight precision for the diffusion model.
    #[serde(default)]
    pub dtype: Dtype,

    /// Generation seed.
    #[serde(default = "default_seed")]
    pub seed: u64,

    /// Offload submodules to the CPU instead of moving the model to CUDA.
    #[serde(default)]
    pub enable_cpu_offload: bool,

    /// Seed selection per call.
    #[serde(default)]
    pub seed_policy: SeedPolicy,

    /// Directory generated images are written to.
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
}

impl EvaluationConfig {
    /// Create a new configuration builder.
    #[must_use]
    pub fn builder() -> EvaluationConfigBuilder {
        EvaluationConfigBuilder::default()
    }

    /// Load a configuration from a JSON file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.diffusion_model.name_or_path.trim().is_empty() {
            return Err(Error::InvalidConfig("diffusion model is required".to_string()));
        }
        if self.clip_model.name_or_path.trim().is_empty() {
            return Err(Error::InvalidConfig("clip model must not be empty".to_string()));
        }
        if self.output_dir.as_os_str().is_empty() {
            return Err(Error::InvalidConfig("output_dir must not be empty".to_string()));
        }
        Ok(())
    }

    /// Configuration values recorded with the results.
    #[must_use]
    pub fn snapshot(&self, pipeline_config: Value) -> Map<String, Value> {
        let mut map = Map::new();
        map.insert("diffusion_pipeline".to_string(), pipeline_config);
        map.insert(
            "diffusion_model_name_or_path".to_string(),
            json!(self.diffusion_model.to_string()),
        );
        map.insert(
            "clip_model_name_or_path".to_string(),
            json!(self.clip_model.to_string()),
        );
        map.insert("torch_dtype".to_string(), json!(self.dtype.to_string()));
        map.insert("enable_cpu_offload".to_string(), json!(self.enable_cpu_offload));
        map.insert("seed".to_string(), json!(self.seed));
        map.insert("seed_policy".to_string(), json!(self.seed_policy));
        map
    }
}

/// Builder for [`EvaluationConfig`].
#[derive(Debug, Default)]
pub struct EvaluationConfigBuilder {
    diffusion_model: Option<ModelSpec>,
    clip_model: Option<ModelSpec>,
    dtype: Option<Dtype>,
    seed: Option<u64>,
    enable_cpu_offload: bool,
    seed_policy: Option<SeedPolicy>,
    output_dir: Option<PathBuf>,
}

impl EvaluationConfigBuilder {
    /// Set the diffusion model by name or path.
    #[must_use]
    pub fn diffusion_model(mut self, name_or_path: impl Into<String>) -> Self {
        self.diffusion_model = Some(ModelSpec::new(name_or_path));
        self
    }

    /// Set the diffusion model with a pinned revision.
    #[must_use]
    pub fn diffusion_model_spec(mut self, spec: ModelSpec) -> Self {
        self.diffusion_model = Some(spec);
        self
    }

    /// Set the CLIP model by name or path.
    #[must_use]
    pub fn clip_model(mut self, name_or_path: impl Into<String>) -> Self {
        self.clip_model = Some(ModelSpec::new(name_or_path));
        self
    }

    #[must_use]
    pub fn dtype(mut self, dtype: Dtype) -> Self {
        self.dtype = Some(dtype);
        self
    }

    #[must_use]
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    #[must_use]
    pub fn enable_cpu_offload(mut self, enabled: bool) -> Self {
        self.enable_cpu_offload = enabled;
        self
    }

    #[must_use]
    pub fn seed_policy(mut self, policy: SeedPolicy) -> Self {
        self.seed_policy = Some(policy);
        self
    }

    /// Set the directory generated images are written to.
    #[must_use]
    pub fn output_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.output_dir = Some(path.into());
        self
    }

    /// Build the configuration.
    ///
    /// Fails with [`Error::InvalidConfig`] if no diffusion model is set.
    pub fn build(self) -> Result<EvaluationConfig> {
        let diffusion_model = self
            .diffusion_model
            .ok_or_else(|| Error::InvalidConfig("diffusion model is required".to_string()))?;

        let config = EvaluationConfig {
            diffusion_model,
            clip_model: self.clip_model.unwrap_or_else(default_clip_model),
            dtype: self.dtype.unwrap_or_default(),
            seed: self.seed.unwrap_or(DEFAULT_SEED),
            enable_cpu_offload: self.enable_cpu_offload,
            seed_policy: self.seed_policy.unwrap_or_default(),
            output_dir: self.output_dir.unwrap_or_else(default_output_dir),
        };
        config.validate()?;
        Ok(config)
    }
}

/// Output of [`DiffusionEvalPipeline::infer`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InferenceOutput {
    /// Path of the saved image.
    pub image_path: PathBuf,
}

/// Output of [`DiffusionEvalPipeline::score`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoreOutput {
    pub clip_score: f64,
}

/// Result of [`DiffusionEvalPipeline::run`].
#[derive(Debug)]
pub struct EvaluationOutcome {
    pub summary: EvaluationSummary,
    /// Traced `infer` and `score` calls.
    pub trace: TraceRecorder,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PipelineState {
    Ready,
    Running,
    Summarized,
}

/// Evaluation pipeline for one text-to-image model.
pub struct DiffusionEvalPipeline {
    config: EvaluationConfig,
    model: Box<dyn TextToImageModel>,
    clip: Box<dyn ClipModel>,
    counter: u64,
    table: ResultsTable,
    config_snapshot: Map<String, Value>,
    state: PipelineState,
}

impl DiffusionEvalPipeline {
    /// Load the models and prepare the output directory.
    pub fn new(config: EvaluationConfig, loader: &dyn ModelLoader) -> Result<Self> {
        std::fs::create_dir_all(&config.output_dir)?;

        let mut model = loader.load_text_to_image(&config.diffusion_model, config.dtype)?;
        if config.enable_cpu_offload {
            model
                .enable_model_cpu_offload()
                .map_err(|e| Error::Device(format!("cpu offload failed: {e}")))?;
        } else {
            model
                .to_device(Device::Cuda)
                .map_err(|e| Error::Device(format!("moving model to {}: {e}", Device::Cuda)))?;
        }

        let clip = loader.load_clip(&config.clip_model)?;
        let config_snapshot = config.snapshot(model.config());

        tracing::info!(
            model = %config.diffusion_model,
            clip = %config.clip_model,
            dtype = %config.dtype,
            output_dir = %config.output_dir.display(),
            "Evaluation pipeline ready"
        );

        Ok(Self {
            config,
            model,
            clip,
            counter: 1,
            table: ResultsTable::new(),
            config_snapshot,
            state: PipelineState::Ready,
        })
    }

    #[must_use]
    pub fn config(&self) -> &EvaluationConfig {
        &self.config
    }

    /// Configuration values logged with the results.
    #[must_use]
    pub fn config_snapshot(&self) -> &Map<String, Value> {
        &self.config_snapshot
    }

    /// Results collected so far.
    #[must_use]
    pub fn table(&self) -> &ResultsTable {
        &self.table
    }

    /// Number the next generated image will get.
    #[must_use]
    pub fn counter(&self) -> u64 {
        self.counter
    }

    #[must_use]
    pub fn output_dir(&self) -> &Path {
        &self.config.output_dir
    }

    fn ensure_not_summarized(&self) -> Result<()> {
        if self.state == PipelineState::Summarized {
            return Err(Error::InvalidState(
                "pipeline results were already logged".to_string(),
            ));
        }
        Ok(())
    }

    /// Generate an image for `prompt` and save it as `<output_dir>/<counter>.png`.
    ///
    /// The counter advances even if generation fails.
    pub fn infer(&mut self, prompt: &str) -> Result<InferenceOutput> {
        self.ensure_not_summarized()?;

        let image_path = self.config.output_dir.join(format!("{}.png", self.counter));
        let call_index = self.counter - 1;
        self.counter += 1;

        let request = GenerationRequest {
            prompt: prompt.to_string(),
            num_images_per_prompt: 1,
            seed: self.config.seed_policy.seed_for(self.config.seed, call_index),
        };
        let image = self
            .model
            .generate(&request)?
            .into_iter()
            .next()
            .ok_or_else(|| Error::Inference {
                model: self.config.diffusion_model.to_string(),
                message: "model returned no images".to_string(),
            })?;

        image
            .to_rgb_image()?
            .save_with_format(&image_path, ImageFormat::Png)?;

        tracing::debug!(path = %image_path.display(), seed = request.seed, "Generated image");
        Ok(InferenceOutput { image_path })
    }

    /// Score a generated image against its prompt and append the result.
    pub fn score(&mut self, prompt: &str, output: &InferenceOutput) -> Result<ScoreOutput> {
        self.ensure_not_summarized()?;

        let image = load_rgb(&output.image_path)?;
        let clip_score = clip_score(self.clip.as_ref(), &image, prompt)?;

        self.table.add(EvaluationRecord {
            model: self.config.diffusion_model.name_or_path.clone(),
            prompt: prompt.to_string(),
            image: output.image_path.clone(),
            clip_score,
        });

        tracing::debug!(clip_score, "Scored image");
        Ok(ScoreOutput { clip_score })
    }

    /// Run `infer` and `score` on every row, in order.
    ///
    /// Stops at the first error; rows processed before it stay in the table.
    pub fn evaluate(
        &mut self,
        rows: &[Row],
        trace: &mut TraceRecorder,
    ) -> Result<EvaluationSummary> {
        self.ensure_not_summarized()?;
        self.state = PipelineState::Running;

        tracing::info!(rows = rows.len(), "Evaluating");

        let mut clip_scores = Vec::with_capacity(rows.len());
        let mut latencies_ms = Vec::with_capacity(rows.len());

        for row in rows {
            let prompt = prompt_of(row)?;

            let output = trace.record("infer", json!({ "prompt": prompt }), || self.infer(prompt))?;
            if let Some(call) = trace.calls().last() {
                latencies_ms.push(call.duration.as_secs_f64() * 1000.0);
            }

            let mut inputs = Map::new();
            inputs.insert("prompt".to_string(), Value::String(prompt.to_string()));
            inputs.insert("model_output".to_string(), serde_json::to_value(&output)?);
            let inputs = Value::Object(inputs);
            let score = trace.record("score", inputs, || self.score(prompt, &output))?;
            clip_scores.push(score.clip_score);
        }

        let summary = EvaluationSummary::from_runs(&clip_scores, &latencies_ms);
        tracing::info!(
            rows = summary.rows,
            mean_clip_score = summary.mean_clip_score().unwrap_or(0.0),
            "Evaluation finished"
        );
        Ok(summary)
    }

    /// Log the configuration and results table to the session's run.
    ///
    /// Each call logs the table again.
    pub fn log_summary(&mut self, session: &mut TrackingSession<'_>) -> Result<()> {
        let run = session.run_or_init()?;
        run.update_config(&self.config_snapshot)?;
        run.log_table(EVALUATION_TABLE_KEY, &self.table)?;

        tracing::info!(run = %run.id(), rows = self.table.len(), "Logged evaluation results");
        self.state = PipelineState::Summarized;
        Ok(())
    }

    /// Evaluate `rows` with the configuration as trace attributes, then log the results.
    pub fn run(
        &mut self,
        rows: &[Row],
        session: &mut TrackingSession<'_>,
    ) -> Result<EvaluationOutcome> {
        let mut trace = TraceRecorder::with_attributes(Value::Object(self.config_snapshot.clone()));
        let summary = self.evaluate(rows, &mut trace)?;
        self.log_summary(session)?;
        Ok(EvaluationOutcome { summary, trace })
    }
}

fn prompt_of(row: &Row) -> Result<&str> {
    match row.get(PROMPT_COLUMN) {
        None => Err(Error::UnknownColumn(PROMPT_COLUMN.to_string())),
        Some(Value::String(prompt)) => Ok(prompt.as_str()),
        Some(other) => Err(Error::InvalidCell {
            column: PROMPT_COLUMN.to_string(),
            reason: format!("expected a string, got {other}"),
        }),
    }
}

fn load_rgb(path: &Path) -> Result<RgbImage> {
    let image = image::open(path).map_err(|e| Error::ImageLoad {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;
    Ok(image.to_rgb8())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::row;
    use crate::imaging::ImageData;
    use crate::models::ObjectDetector;
    use crate::tracking::{InitParams, LocalTracker, list_runs, read_history};
    use std::sync::{Arc, Mutex};

    #[derive(Default)]
    struct Calls {
        seeds: Vec<u64>,
        offloaded: bool,
        device: Option<Device>,
    }

    struct FakeModel {
        calls: Arc<Mutex<Calls>>,
        fail_on: Option<String>,
        fail_device: bool,
    }

    impl TextToImageModel for FakeModel {
        fn config(&self) -> Value {
            json!({"scheduler": "pndm"})
        }

        fn enable_model_cpu_offload(&mut self) -> Result<()> {
            self.calls.lock().unwrap().offloaded = true;
            Ok(())
        }

        fn to_device(&mut self, device: Device) -> Result<()> {
            if self.fail_device {
                return Err(Error::Inference {
                    model: "fake".into(),
                    message: "no cuda".into(),
                });
            }
            self.calls.lock().unwrap().device = Some(device);
            Ok(())
        }

        fn generate(&mut self, request: &GenerationRequest) -> Result<Vec<ImageData>> {
            if self.fail_on.as_deref() == Some(request.prompt.as_str()) {
                return Err(Error::Inference {
                    model: "fake".into(),
                    message: "out of memory".into(),
                });
            }
            self.calls.lock().unwrap().seeds.push(request.seed);
            let shade = (request.prompt.len() * 10 % 256) as u8;
            Ok(vec![RgbImage::from_pixel(8, 8, image::Rgb([shade, 0, 0])).into()])
        }
    }

    struct FakeClip;

    impl ClipModel for FakeClip {
        fn image_embedding(&self, _image: &RgbImage) -> Result<Vec<f32>> {
            Ok(vec![1.0, 0.0])
        }

        fn text_embedding(&self, _text: &str) -> Result<Vec<f32>> {
            Ok(vec![0.6, 0.8])
        }
    }

    struct FakeLoader {
        calls: Arc<Mutex<Calls>>,
        fail_on: Option<String>,
        fail_device: bool,
    }

    impl FakeLoader {
        fn new() -> Self {
            Self {
                calls: Arc::default(),
                fail_on: None,
                fail_device: false,
            }
        }
    }

    impl ModelLoader for FakeLoader {
        fn load_text_to_image(
            &self,
            _spec: &ModelSpec,
            _dtype: Dtype,
        ) -> Result<Box<dyn TextToImageModel>> {
            Ok(Box::new(FakeModel {
                calls: Arc::clone(&self.calls),
                fail_on: self.fail_on.clone(),
                fail_device: self.fail_device,
            }))
        }

        fn load_clip(&self, _spec: &ModelSpec) -> Result<Box<dyn ClipModel>> {
            Ok(Box::new(FakeClip))
        }

        fn load_detector(&self, spec: &ModelSpec) -> Result<Box<dyn ObjectDetector>> {
            Err(Error::ModelLoad {
                model: spec.to_string(),
                reason: "not available".into(),
            })
        }
    }

    fn config(dir: &Path) -> EvaluationConfigBuilder {
        EvaluationConfig::builder()
            .diffusion_model("fake/sd")
            .output_dir(dir.join("images"))
    }

    fn prompts(prompts: &[&str]) -> Vec<Row> {
        prompts.iter().map(|p| row(&[("prompt", json!(p))])).collect()
    }

    #[test]
    fn test_builder_defaults() {
        let config = EvaluationConfig::builder().diffusion_model("m").build().unwrap();
        assert_eq!(config.clip_model.name_or_path, DEFAULT_CLIP_MODEL);
        assert_eq!(config.dtype, Dtype::Float16);
        assert_eq!(config.seed, 42);
        assert!(!config.enable_cpu_offload);
        assert_eq!(config.seed_policy, SeedPolicy::Fixed);
        assert_eq!(config.output_dir, PathBuf::from(DEFAULT_OUTPUT_DIR));

        assert!(matches!(
            EvaluationConfig::builder().build(),
            Err(Error::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_config_load_applies_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("eval.json");
        std::fs::write(
            &path,
            r#"{"diffusion_model": {"name_or_path": "m", "revision": null}, "seed": 7}"#,
        )
        .unwrap();

        let config = EvaluationConfig::load(&path).unwrap();
        assert_eq!(config.seed, 7);
        assert_eq!(config.clip_model.name_or_path, DEFAULT_CLIP_MODEL);
    }

    #[test]
    fn test_seed_policy() {
        assert_eq!(SeedPolicy::Fixed.seed_for(42, 3), 42);
        assert_eq!(SeedPolicy::PerCall.seed_for(42, 3), 45);
    }

    #[test]
    fn test_device_placement() {
        let dir = tempfile::tempdir().unwrap();

        let loader = FakeLoader::new();
        DiffusionEvalPipeline::new(config(dir.path()).build().unwrap(), &loader).unwrap();
        assert_eq!(loader.calls.lock().unwrap().device, Some(Device::Cuda));

        let loader = FakeLoader::new();
        let offload = config(dir.path()).enable_cpu_offload(true).build().unwrap();
        DiffusionEvalPipeline::new(offload, &loader).unwrap();
        let calls = loader.calls.lock().unwrap();
        assert!(calls.offloaded);
        assert_eq!(calls.device, None);
    }

    #[test]
    fn test_device_failure() {
        let dir = tempfile::tempdir().unwrap();
        let mut loader = FakeLoader::new();
        loader.fail_device = true;
        let result = DiffusionEvalPipeline::new(config(dir.path()).build().unwrap(), &loader);
        assert!(matches!(result, Err(Error::Device(_))));
    }

    #[test]
    fn test_infer_numbers_images() {
        let dir = tempfile::tempdir().unwrap();
        let loader = FakeLoader::new();
        let mut pipeline =
            DiffusionEvalPipeline::new(config(dir.path()).build().unwrap(), &loader).unwrap();

        assert_eq!(pipeline.counter(), 1);
        let first = pipeline.infer("a").unwrap();
        let second = pipeline.infer("b").unwrap();

        assert_eq!(first.image_path, dir.path().join("images/1.png"));
        assert_eq!(second.image_path, dir.path().join("images/2.png"));
        assert!(second.image_path.is_file());
        assert_eq!(pipeline.counter(), 3);
        assert_eq!(loader.calls.lock().unwrap().seeds, vec![42, 42]);
    }

    #[test]
    fn test_per_call_seeds() {
        let dir = tempfile::tempdir().unwrap();
        let loader = FakeLoader::new();
        let config = config(dir.path()).seed(10).seed_policy(SeedPolicy::PerCall).build().unwrap();
        let mut pipeline = DiffusionEvalPipeline::new(config, &loader).unwrap();

        pipeline.infer("a").unwrap();
        pipeline.infer("b").unwrap();
        assert_eq!(loader.calls.lock().unwrap().seeds, vec![10, 11]);
    }

    #[test]
    fn test_score_appends_row() {
        let dir = tempfile::tempdir().unwrap();
        let loader = FakeLoader::new();
        let mut pipeline =
            DiffusionEvalPipeline::new(config(dir.path()).build().unwrap(), &loader).unwrap();

        let output = pipeline.infer("a red cube").unwrap();
        let score = pipeline.score("a red cube", &output).unwrap();

        assert!((score.clip_score - 60.0).abs() < 1e-4);
        let record = &pipeline.table().rows()[0];
        assert_eq!(record.model, "fake/sd");
        assert_eq!(record.prompt, "a red cube");
        assert_eq!(record.image, output.image_path);
    }

    #[test]
    fn test_score_missing_image() {
        let dir = tempfile::tempdir().unwrap();
        let loader = FakeLoader::new();
        let mut pipeline =
            DiffusionEvalPipeline::new(config(dir.path()).build().unwrap(), &loader).unwrap();

        let output = InferenceOutput {
            image_path: dir.path().join("missing.png"),
        };
        assert!(matches!(pipeline.score("x", &output), Err(Error::ImageLoad { .. })));
        assert!(pipeline.table().is_empty());
    }

    #[test]
    fn test_evaluate_traces_calls() {
        let dir = tempfile::tempdir().unwrap();
        let loader = FakeLoader::new();
        let mut pipeline =
            DiffusionEvalPipeline::new(config(dir.path()).build().unwrap(), &loader).unwrap();

        let mut trace = TraceRecorder::new();
        let summary = pipeline.evaluate(&prompts(&["a", "b", "c"]), &mut trace).unwrap();

        assert_eq!(summary.rows, 3);
        assert_eq!(summary.model_latency_ms.as_ref().unwrap().count, 3);
        assert_eq!(trace.calls_for("infer").count(), 3);
        assert_eq!(trace.calls_for("score").count(), 3);
        assert_eq!(trace.calls()[0].inputs["prompt"], "a");
        assert_eq!(
            pipeline.table().rows().iter().map(|r| r.prompt.as_str()).collect::<Vec<_>>(),
            ["a", "b", "c"]
        );
    }

    #[test]
    fn test_score_trace_records_model_output() {
        let dir = tempfile::tempdir().unwrap();
        let loader = FakeLoader::new();
        let config = config(dir.path()).build().unwrap();
        let mut pipeline = DiffusionEvalPipeline::new(config, &loader).unwrap();

        let mut trace = TraceRecorder::new();
        pipeline.evaluate(&prompts(&["a"]), &mut trace).unwrap();

        let score_call = trace.calls_for("score").next().unwrap();
        assert_eq!(score_call.inputs["prompt"], "a");
        let expected = dir.path().join("images/1.png");
        assert_eq!(
            score_call.inputs["model_output"]["image_path"],
            json!(expected.to_str().unwrap())
        );
    }

    #[cfg(unix)]
    #[test]
    fn test_non_utf8_output_dir_is_an_error() {
        use std::ffi::OsStr;
        use std::os::unix::ffi::OsStrExt;

        let dir = tempfile::tempdir().unwrap();
        let output_dir = dir.path().join(OsStr::from_bytes(b"images-\xff"));
        let loader = FakeLoader::new();
        let config = EvaluationConfig::builder()
            .diffusion_model("fake/sd")
            .output_dir(output_dir)
            .build()
            .unwrap();
        let mut pipeline = DiffusionEvalPipeline::new(config, &loader).unwrap();

        let mut trace = TraceRecorder::new();
        let result = pipeline.evaluate(&prompts(&["a"]), &mut trace);
        assert!(matches!(result, Err(Error::Json(_))));
        assert!(pipeline.table().is_empty());
    }

    #[test]
    fn test_evaluate_fails_fast() {
        let dir = tempfile::tempdir().unwrap();
        let mut loader = FakeLoader::new();
        loader.fail_on = Some("b".to_string());
        let mut pipeline =
            DiffusionEvalPipeline::new(config(dir.path()).build().unwrap(), &loader).unwrap();

        let mut trace = TraceRecorder::new();
        let result = pipeline.evaluate(&prompts(&["a", "b", "c"]), &mut trace);

        assert!(matches!(result, Err(Error::Inference { .. })));
        assert_eq!(pipeline.table().len(), 1);
        assert_eq!(pipeline.counter(), 3);
        assert!(trace.calls().last().unwrap().error.is_some());
    }

    #[test]
    fn test_evaluate_requires_prompt() {
        let dir = tempfile::tempdir().unwrap();
        let loader = FakeLoader::new();
        let mut pipeline =
            DiffusionEvalPipeline::new(config(dir.path()).build().unwrap(), &loader).unwrap();
        let mut trace = TraceRecorder::new();

        let rows = vec![row(&[("caption", json!("a"))])];
        assert!(matches!(
            pipeline.evaluate(&rows, &mut trace),
            Err(Error::UnknownColumn(c)) if c == "prompt"
        ));

        let rows = vec![row(&[("prompt", json!(3))])];
        assert!(matches!(
            pipeline.evaluate(&rows, &mut trace),
            Err(Error::InvalidCell { .. })
        ));
    }

    #[test]
    fn test_run_logs_table() {
        let dir = tempfile::tempdir().unwrap();
        let loader = FakeLoader::new();
        let mut pipeline =
            DiffusionEvalPipeline::new(config(dir.path()).build().unwrap(), &loader).unwrap();

        let tracker = LocalTracker::new(dir.path().join("runs"));
        let mut session = TrackingSession::new(&tracker, InitParams::new("t2i").with_name("eval"));
        let outcome = pipeline.run(&prompts(&["a", "b"]), &mut session).unwrap();

        assert_eq!(outcome.summary.rows, 2);
        assert_eq!(outcome.trace.calls()[0].attributes["seed"], 42);

        let runs = list_runs(&dir.path().join("runs"), "t2i").unwrap();
        let history = read_history(&runs[0].dir).unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].key, EVALUATION_TABLE_KEY);
        assert_eq!(history[0].rows, 2);

        let logged_config: Value = serde_json::from_str(
            &std::fs::read_to_string(runs[0].dir.join("config.json")).unwrap(),
        )
        .unwrap();
        assert_eq!(logged_config["diffusion_pipeline"]["scheduler"], "pndm");
        assert_eq!(logged_config["torch_dtype"], "float16");

        // Logged pipelines refuse further evaluation.
        let mut trace = TraceRecorder::new();
        assert!(matches!(
            pipeline.evaluate(&prompts(&["c"]), &mut trace),
            Err(Error::InvalidState(_))
        ));
    }

    #[test]
    fn test_log_summary_twice_double_logs() {
        let dir = tempfile::tempdir().unwrap();
        let loader = FakeLoader::new();
        let mut pipeline =
            DiffusionEvalPipeline::new(config(dir.path()).build().unwrap(), &loader).unwrap();
        let tracker = LocalTracker::new(dir.path().join("runs"));
        let mut session = TrackingSession::new(&tracker, InitParams::new("t2i").with_name("twice"));

        pipeline.log_summary(&mut session).unwrap();
        pipeline.log_summary(&mut session).unwrap();

        let history = read_history(&dir.path().join("runs/t2i/twice")).unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].rows, 0);
    }
}
