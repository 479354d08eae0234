//! Call tracing for evaluation operations.
//!
//! [`TraceRecorder::record`] wraps a single call: it runs the call inside a
//! `tracing` span and keeps its inputs, output (or error), attributes,
//! start time and duration.
//!
//! ```rust,ignore
//! let mut trace = TraceRecorder::with_attributes(json!({"seed": 42}));
//! let output = trace.record("infer", json!({"prompt": prompt}), || pipeline.infer(prompt))?;
//! ```

use std::io::Write;
use std::path::Path;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::Result;

/// One traced call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallRecord {
    /// Operation name.
    pub op: String,
    /// Call inputs.
    pub inputs: Value,
    /// Serialized output, if the call succeeded.
    pub output: Option<Value>,
    /// Error message, if the call failed.
    pub error: Option<String>,
    /// Attributes attached by the recorder.
    pub attributes: Value,
    /// When the call started.
    pub started_at: DateTime<Utc>,
    /// Wall-clock duration.
    #[serde(with = "duration_millis")]
    pub duration: Duration,
}

/// Records traced calls in order.
#[derive(Debug, Default)]
pub struct TraceRecorder {
    attributes: Value,
    calls: Vec<CallRecord>,
}

impl TraceRecorder {
    /// Create a recorder without attributes.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a recorder that attaches `attributes` to every call.
    #[must_use]
    pub fn with_attributes(attributes: Value) -> Self {
        Self {
            attributes,
            calls: Vec::new(),
        }
    }

    /// Run `f` as the traced operation `op`, returning its result unchanged.
    pub fn record<T, F>(&mut self, op: &str, inputs: Value, f: F) -> Result<T>
    where
        T: Serialize,
        F: FnOnce() -> Result<T>,
    {
        let span = tracing::info_span!("traced_op", operation = op);
        let _enter = span.enter();

        let started_at = Utc::now();
        let start = Instant::now();
        let result = f();
        let duration = start.elapsed();

        let (output, error) = match &result {
            Ok(value) => (serde_json::to_value(value).ok(), None),
            Err(e) => (None, Some(e.to_string())),
        };

        tracing::debug!(
            duration_ms = duration.as_millis() as u64,
            ok = error.is_none(),
            "Traced call finished"
        );

        self.calls.push(CallRecord {
            op: op.to_string(),
            inputs,
            output,
            error,
            attributes: self.attributes.clone(),
            started_at,
            duration,
        });

        result
    }

    /// Recorded calls, in call order.
    #[must_use]
    pub fn calls(&self) -> &[CallRecord] {
        &self.calls
    }

    /// Recorded calls of one operation.
    pub fn calls_for<'a>(&'a self, op: &'a str) -> impl Iterator<Item = &'a CallRecord> + 'a {
        self.calls.iter().filter(move |c| c.op == op)
    }

    /// Write all calls as JSON Lines.
    pub fn write_jsonl(&self, path: impl AsRef<Path>) -> Result<()> {
        let mut file = std::io::BufWriter::new(std::fs::File::create(path.as_ref())?);
        for call in &self.calls {
            serde_json::to_writer(&mut file, call)?;
            file.write_all(b"\n")?;
        }
        file.flush()?;
        Ok(())
    }
}

mod duration_millis {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        duration.as_millis().serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use serde_json::json;

    #[test]
    fn test_record_success() {
        let mut trace = TraceRecorder::with_attributes(json!({"seed": 42}));
        let value = trace.record("double", json!({"x": 2}), || Ok(4)).unwrap();

        assert_eq!(value, 4);
        let call = &trace.calls()[0];
        assert_eq!(call.op, "double");
        assert_eq!(call.inputs, json!({"x": 2}));
        assert_eq!(call.output, Some(json!(4)));
        assert_eq!(call.attributes["seed"], 42);
        assert!(call.error.is_none());
    }

    #[test]
    fn test_record_error_passthrough() {
        let mut trace = TraceRecorder::new();
        let result: Result<u32> =
            trace.record("fail", Value::Null, || Err(Error::InvalidState("boom".into())));

        assert!(matches!(result, Err(Error::InvalidState(_))));
        assert_eq!(trace.calls().len(), 1);
        assert!(trace.calls()[0].error.as_deref().unwrap().contains("boom"));
        assert!(trace.calls()[0].output.is_none());
    }

    #[test]
    fn test_calls_for_and_jsonl() {
        let mut trace = TraceRecorder::new();
        trace.record("a", Value::Null, || Ok(1)).unwrap();
        trace.record("b", Value::Null, || Ok(2)).unwrap();
        trace.record("a", Value::Null, || Ok(3)).unwrap();
        assert_eq!(trace.calls_for("a").count(), 2);

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("trace.jsonl");
        trace.write_jsonl(&path).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        let records: Vec<CallRecord> = content
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect();
        assert_eq!(records.len(), 3);
        assert_eq!(records[2].output, Some(json!(3)));
    }
}
