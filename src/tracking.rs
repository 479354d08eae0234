//! Experiment tracking.
//!
//! A [`TrackingSession`] is the explicit handle to one tracked run. It is
//! created once per evaluation, initializes its run lazily on first use and
//! is passed to everything that logs.
//!
//! [`LocalTracker`] keeps runs on disk:
//!
//! ```text
//! <root>/<project>/<run-id>/
//!     run.json          run metadata
//!     config.json       merged configuration
//!     history.jsonl     one line per logged table
//!     <key>-<step>.json / .csv
//! ```

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{Error, Result};
use crate::eval::report::ResultsTable;

/// Project used when none is given.
pub const DEFAULT_PROJECT: &str = "t2i_eval";

/// Parameters for starting a tracked run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InitParams {
    /// Project the run belongs to.
    pub project: String,
    /// Run name; a timestamp-based id is generated when absent.
    pub name: Option<String>,
    /// Team or user owning the project.
    pub entity: Option<String>,
    /// Free-form job type, e.g. "evaluation".
    pub job_type: Option<String>,
    /// Tags attached to the run.
    #[serde(default)]
    pub tags: Vec<String>,
    /// Initial configuration.
    #[serde(default)]
    pub config: Map<String, Value>,
}

impl Default for InitParams {
    fn default() -> Self {
        Self::new(DEFAULT_PROJECT)
    }
}

impl InitParams {
    #[must_use]
    pub fn new(project: impl Into<String>) -> Self {
        Self {
            project: project.into(),
            name: None,
            entity: None,
            job_type: None,
            tags: Vec::new(),
            config: Map::new(),
        }
    }

    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    #[must_use]
    pub fn with_entity(mut self, entity: impl Into<String>) -> Self {
        self.entity = Some(entity.into());
        self
    }

    #[must_use]
    pub fn with_job_type(mut self, job_type: impl Into<String>) -> Self {
        self.job_type = Some(job_type.into());
        self
    }

    #[must_use]
    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }

    #[must_use]
    pub fn with_config(mut self, key: impl Into<String>, value: Value) -> Self {
        self.config.insert(key.into(), value);
        self
    }
}

/// An active tracked run.
pub trait TrackerRun {
    /// Run identifier.
    fn id(&self) -> &str;

    /// Merge `config` into the run configuration.
    fn update_config(&mut self, config: &Map<String, Value>) -> Result<()>;

    /// Log a results table under `key`. Every call is a new log entry.
    fn log_table(&mut self, key: &str, table: &ResultsTable) -> Result<()>;

    /// Mark the run finished.
    fn finish(&mut self) -> Result<()>;
}

/// Backend that starts tracked runs.
pub trait ExperimentTracker {
    fn init(&self, params: &InitParams) -> Result<Box<dyn TrackerRun>>;
}

/// Explicit handle to the tracked run of one evaluation.
pub struct TrackingSession<'a> {
    tracker: &'a dyn ExperimentTracker,
    params: InitParams,
    run: Option<Box<dyn TrackerRun>>,
}

impl<'a> TrackingSession<'a> {
    /// Create a session whose run is started on first use.
    #[must_use]
    pub fn new(tracker: &'a dyn ExperimentTracker, params: InitParams) -> Self {
        Self {
            tracker,
            params,
            run: None,
        }
    }

    /// Attach an already started run.
    #[must_use]
    pub fn with_run(mut self, run: Box<dyn TrackerRun>) -> Self {
        self.run = Some(run);
        self
    }

    /// Whether a run has been started.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.run.is_some()
    }

    /// Id of the active run.
    #[must_use]
    pub fn run_id(&self) -> Option<&str> {
        self.run.as_ref().map(|run| run.id())
    }

    /// Parameters used to start the run.
    #[must_use]
    pub fn params(&self) -> &InitParams {
        &self.params
    }

    /// The active run, started now if none is active.
    pub fn run_or_init(&mut self) -> Result<&mut dyn TrackerRun> {
        let run = match self.run.take() {
            Some(run) => run,
            None => {
                let run = self.tracker.init(&self.params)?;
                tracing::info!(
                    project = %self.params.project,
                    run = %run.id(),
                    "Started tracked run"
                );
                run
            }
        };
        Ok(self.run.insert(run).as_mut())
    }

    /// Finish the active run, if any.
    pub fn finish(mut self) -> Result<()> {
        if let Some(run) = self.run.as_mut() {
            run.finish()?;
            tracing::info!(run = %run.id(), "Finished tracked run");
        }
        Ok(())
    }
}

/// Metadata of a run kept by [`LocalTracker`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunInfo {
    pub id: String,
    pub project: String,
    pub name: Option<String>,
    pub entity: Option<String>,
    pub job_type: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    /// Run directory; not stored.
    #[serde(skip)]
    pub dir: PathBuf,
}

/// One line of a run's `history.jsonl`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub step: u64,
    pub key: String,
    pub rows: usize,
    pub file: String,
    pub logged_at: DateTime<Utc>,
}

/// File-based tracker.
#[derive(Debug, Clone)]
pub struct LocalTracker {
    root: PathBuf,
}

impl LocalTracker {
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn unique_run_dir(&self, project_dir: &Path, base: &str) -> PathBuf {
        let mut candidate = project_dir.join(base);
        let mut suffix = 1;
        while candidate.exists() {
            candidate = project_dir.join(format!("{base}-{suffix}"));
            suffix += 1;
        }
        candidate
    }
}

impl ExperimentTracker for LocalTracker {
    fn init(&self, params: &InitParams) -> Result<Box<dyn TrackerRun>> {
        validate_component("project", &params.project)?;
        if let Some(name) = &params.name {
            validate_component("run name", name)?;
        }

        let started_at = Utc::now();
        let project_dir = self.root.join(&params.project);
        fs::create_dir_all(&project_dir)?;

        let base = params
            .name
            .clone()
            .unwrap_or_else(|| format!("run-{}", started_at.format("%Y%m%d-%H%M%S")));
        let dir = self.unique_run_dir(&project_dir, &base);
        fs::create_dir(&dir)?;

        let id = dir
            .file_name()
            .and_then(|s| s.to_str())
            .unwrap_or(&base)
            .to_string();

        let info = RunInfo {
            id,
            project: params.project.clone(),
            name: params.name.clone(),
            entity: params.entity.clone(),
            job_type: params.job_type.clone(),
            tags: params.tags.clone(),
            started_at,
            finished_at: None,
            dir: dir.clone(),
        };

        let run = LocalRun {
            info,
            config: params.config.clone(),
            step: 0,
        };
        run.write_info()?;
        run.write_config()?;
        Ok(Box::new(run))
    }
}

struct LocalRun {
    info: RunInfo,
    config: Map<String, Value>,
    step: u64,
}

impl LocalRun {
    fn write_info(&self) -> Result<()> {
        let json = serde_json::to_string_pretty(&self.info)?;
        fs::write(self.info.dir.join("run.json"), json)?;
        Ok(())
    }

    fn write_config(&self) -> Result<()> {
        let json = serde_json::to_string_pretty(&self.config)?;
        fs::write(self.info.dir.join("config.json"), json)?;
        Ok(())
    }
}

impl TrackerRun for LocalRun {
    fn id(&self) -> &str {
        &self.info.id
    }

    fn update_config(&mut self, config: &Map<String, Value>) -> Result<()> {
        for (key, value) in config {
            self.config.insert(key.clone(), value.clone());
        }
        self.write_config()
    }

    fn log_table(&mut self, key: &str, table: &ResultsTable) -> Result<()> {
        validate_component("table key", key)?;
        if self.info.finished_at.is_some() {
            return Err(Error::Tracking(format!("run {} is finished", self.info.id)));
        }

        let stem = format!("{key}-{}", self.step);
        table.write_json(&self.info.dir.join(format!("{stem}.json")))?;
        table.write_csv(&self.info.dir.join(format!("{stem}.csv")))?;

        let entry = HistoryEntry {
            step: self.step,
            key: key.to_string(),
            rows: table.len(),
            file: format!("{stem}.json"),
            logged_at: Utc::now(),
        };
        let mut history = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.info.dir.join("history.jsonl"))?;
        serde_json::to_writer(&mut history, &entry)?;
        history.write_all(b"\n")?;

        tracing::debug!(
            run = %self.info.id,
            key = %key,
            step = self.step,
            rows = table.len(),
            "Logged table"
        );
        self.step += 1;
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        self.info.finished_at = Some(Utc::now());
        self.write_info()
    }
}

/// List runs of `project` under `root`, oldest first.
pub fn list_runs(root: &Path, project: &str) -> Result<Vec<RunInfo>> {
    let project_dir = root.join(project);
    if !project_dir.is_dir() {
        return Ok(Vec::new());
    }

    let mut runs = Vec::new();
    for entry in fs::read_dir(&project_dir)? {
        let dir = entry?.path();
        let info_path = dir.join("run.json");
        if !info_path.is_file() {
            continue;
        }
        let mut info: RunInfo = serde_json::from_str(&fs::read_to_string(&info_path)?)?;
        info.dir = dir;
        runs.push(info);
    }
    runs.sort_by(|a, b| a.started_at.cmp(&b.started_at).then_with(|| a.id.cmp(&b.id)));
    Ok(runs)
}

/// Read the log history of a run directory.
pub fn read_history(run_dir: &Path) -> Result<Vec<HistoryEntry>> {
    let path = run_dir.join("history.jsonl");
    if !path.is_file() {
        return Ok(Vec::new());
    }
    fs::read_to_string(&path)?
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| Ok(serde_json::from_str(line)?))
        .collect()
}

fn validate_component(what: &str, value: &str) -> Result<()> {
    if value.is_empty() || value.contains(['/', '\\']) || value == "." || value == ".." {
        return Err(Error::Tracking(format!("invalid {what}: {value:?}")));
    }
    Ok(())
}
