//! # Metrics Exchange Protocol
//!
//! After it finishes, a worker process describes its own resource usage in a
//! `RunMetrics` record and writes it as JSON to the path it was handed through
//! `--metrics-output=<path>`. The launcher reads the file back once the child
//! has exited and then deletes it.
//!
//! The format is field-named so either side can grow new fields: unknown
//! fields are ignored and missing ones decode to zero. Durations travel as
//! integer nanoseconds.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::time::{Duration, Instant};

/// Command-line flag a worker accepts for the metrics output path
pub const METRICS_OUTPUT_FLAG: &str = "--metrics-output";

/// Self-reported resource counters of one worker run
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunMetrics {
    /// Time the worker measured for its own workload
    #[serde(with = "crate::utils::duration_nanos")]
    pub duration: Duration,

    /// Total bytes allocated over the run
    pub memory_allocated: u64,

    /// Live heap size at sampling time
    pub heap_allocated: u64,

    /// Completed collection cycles
    pub num_gc: u32,

    /// Cumulative collector pause time
    pub pause_time_ns: u64,

    /// Concurrent tasks alive when the sample was taken
    #[serde(alias = "goroutines")]
    pub concurrent_tasks: u64,

    #[serde(skip_serializing_if = "is_zero")]
    pub tasks_completed: u64,

    #[serde(skip_serializing_if = "is_zero")]
    pub files_processed: u64,

    /// Task-specific counters such as matches found or imports parsed
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub custom: BTreeMap<String, serde_json::Value>,
}

fn is_zero(value: &u64) -> bool {
    *value == 0
}

impl RunMetrics {
    /// Serialize the metrics to `path`, replacing any previous content
    pub fn write_to_file(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self).context("Failed to encode run metrics")?;
        std::fs::write(path, json)
            .with_context(|| format!("Failed to write run metrics to {:?}", path))?;
        Ok(())
    }

    /// Read metrics a worker left at `path`
    ///
    /// Callers on the orchestrator side treat any error here as a warning.
    pub fn read_from_file(path: &Path) -> Result<Self> {
        let data = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read run metrics from {:?}", path))?;
        Self::from_json(&data).with_context(|| format!("Malformed run metrics in {:?}", path))
    }

    pub fn from_json(data: &str) -> Result<Self> {
        Ok(serde_json::from_str(data)?)
    }

    /// Record a task-specific counter
    pub fn set_counter(&mut self, name: &str, value: impl Into<serde_json::Value>) {
        self.custom.insert(name.to_string(), value.into());
    }
}

/// Worker-side helper that turns observed counters into a `RunMetrics`
///
/// A worker creates one at startup, feeds it whatever its runtime exposes,
/// and calls [`MetricsRecorder::finish`] just before exiting.
pub struct MetricsRecorder {
    start_time: Instant,
    metrics: RunMetrics,
}

impl MetricsRecorder {
    pub fn start() -> Self {
        Self {
            start_time: Instant::now(),
            metrics: RunMetrics::default(),
        }
    }

    pub fn record_allocation(&mut self, bytes: u64) {
        self.metrics.memory_allocated += bytes;
    }

    pub fn record_collection(&mut self, pause: Duration) {
        self.metrics.num_gc += 1;
        self.metrics.pause_time_ns += pause.as_nanos() as u64;
    }

    pub fn record_task_completed(&mut self) {
        self.metrics.tasks_completed += 1;
    }

    pub fn record_file_processed(&mut self) {
        self.metrics.files_processed += 1;
    }

    pub fn metrics_mut(&mut self) -> &mut RunMetrics {
        &mut self.metrics
    }

    /// Stamp the elapsed time and the final sampled gauges
    pub fn finish(mut self, heap_allocated: u64, concurrent_tasks: u64) -> RunMetrics {
        self.metrics.duration = self.start_time.elapsed();
        self.metrics.heap_allocated = heap_allocated;
        self.metrics.concurrent_tasks = concurrent_tasks;
        self.metrics
    }
}

/// Extract the metrics path from a worker's argument list
///
/// Accepts both `--metrics-output=<path>` and `--metrics-output <path>`.
pub fn metrics_output_arg<I, S>(args: I) -> Option<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let prefix = format!("{}=", METRICS_OUTPUT_FLAG);
    let mut iter = args.into_iter();
    while let Some(arg) = iter.next() {
        let arg = arg.as_ref();
        if let Some(path) = arg.strip_prefix(&prefix) {
            return Some(path.to_string());
        }
        if arg == METRICS_OUTPUT_FLAG {
            return iter.next().map(|p| p.as_ref().to_string());
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    #[test]
    fn test_missing_fields_decode_to_zero() {
        let metrics = RunMetrics::from_json(r#"{"num_gc": 3}"#).unwrap();
        assert_eq!(metrics.num_gc, 3);
        assert_eq!(metrics.memory_allocated, 0);
        assert_eq!(metrics.duration, Duration::ZERO);
        assert!(metrics.custom.is_empty());
    }

    #[test]
    fn test_unknown_fields_are_ignored() {
        let metrics =
            RunMetrics::from_json(r#"{"memory_allocated": 1024, "future_field": [1, 2]}"#)
                .unwrap();
        assert_eq!(metrics.memory_allocated, 1024);
    }

    #[test]
    fn test_goroutines_key_decodes_as_concurrent_tasks() {
        let metrics = RunMetrics::from_json(r#"{"goroutines": 12, "num_gc": 1}"#).unwrap();
        assert_eq!(metrics.concurrent_tasks, 12);
        assert_eq!(metrics.num_gc, 1);
    }

    #[test]
    fn test_duration_travels_as_nanoseconds() {
        let metrics = RunMetrics {
            duration: Duration::from_millis(15),
            ..Default::default()
        };
        let json: serde_json::Value = serde_json::to_value(&metrics).unwrap();
        assert_eq!(json["duration"], serde_json::json!(15_000_000u64));
    }

    #[test]
    fn test_file_round_trip_with_custom_counters() {
        let file = NamedTempFile::new().unwrap();
        let mut metrics = RunMetrics {
            duration: Duration::from_micros(2500),
            memory_allocated: 8 * 1024 * 1024,
            heap_allocated: 512 * 1024,
            num_gc: 7,
            pause_time_ns: 120_000,
            concurrent_tasks: 4,
            files_processed: 12,
            ..Default::default()
        };
        metrics.set_counter("total_imports", 42);

        metrics.write_to_file(file.path()).unwrap();
        let loaded = RunMetrics::read_from_file(file.path()).unwrap();
        assert_eq!(loaded, metrics);
    }

    #[test]
    fn test_unreadable_file_is_an_error() {
        let file = NamedTempFile::new().unwrap();
        std::fs::write(file.path(), "{ truncated").unwrap();
        assert!(RunMetrics::read_from_file(file.path()).is_err());
        assert!(RunMetrics::read_from_file(Path::new("/nonexistent/metrics.json")).is_err());
    }

    #[test]
    fn test_recorder_accumulates() {
        let mut recorder = MetricsRecorder::start();
        recorder.record_allocation(100);
        recorder.record_allocation(28);
        recorder.record_collection(Duration::from_nanos(500));
        recorder.record_collection(Duration::from_nanos(250));
        recorder.record_file_processed();

        let metrics = recorder.finish(64, 2);
        assert_eq!(metrics.memory_allocated, 128);
        assert_eq!(metrics.num_gc, 2);
        assert_eq!(metrics.pause_time_ns, 750);
        assert_eq!(metrics.files_processed, 1);
        assert_eq!(metrics.heap_allocated, 64);
        assert_eq!(metrics.concurrent_tasks, 2);
    }

    #[test]
    fn test_metrics_output_arg_forms() {
        assert_eq!(
            metrics_output_arg(["--rounds=3", "--metrics-output=/tmp/m.json"]),
            Some("/tmp/m.json".to_string())
        );
        assert_eq!(
            metrics_output_arg(["--metrics-output", "/tmp/n.json"]),
            Some("/tmp/n.json".to_string())
        );
        assert_eq!(metrics_output_arg(["--rounds=3"]), None);
    }
}
