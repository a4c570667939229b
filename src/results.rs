use crate::{config::RuntimeConfiguration, error::HarnessError, metrics::RunMetrics};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

/// Outcome of one matrix cell
///
/// `duration` is always the parent's wall-clock measurement. The resource
/// fields come from the worker's metrics file when one was delivered and are
/// zero otherwise. A non-empty `error` marks the cell as failed; its resource
/// fields are best-effort and rankings skip it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BenchmarkResult {
    pub config: RuntimeConfiguration,

    /// Workload that ran in this cell; empty in files written before the
    /// field existed
    #[serde(default)]
    pub task: String,

    #[serde(with = "crate::utils::duration_nanos")]
    pub duration: Duration,

    #[serde(default)]
    pub memory_allocated: u64,

    #[serde(default)]
    pub num_gc: u32,

    #[serde(default)]
    pub pause_time_ns: u64,

    /// Process exit code, `None` when the worker never produced one
    #[serde(default)]
    pub exit_code: Option<i32>,

    #[serde(default)]
    pub error: String,

    /// Whether the resource fields came from the worker itself
    #[serde(default)]
    pub metrics_reported: bool,
}

impl BenchmarkResult {
    /// Start a result for a cell before anything has been measured
    pub fn new(task: &str, config: RuntimeConfiguration) -> Self {
        Self {
            config,
            task: task.to_string(),
            duration: Duration::ZERO,
            memory_allocated: 0,
            num_gc: 0,
            pause_time_ns: 0,
            exit_code: None,
            error: String::new(),
            metrics_reported: false,
        }
    }

    pub fn is_success(&self) -> bool {
        self.error.is_empty()
    }

    /// Copy the worker-reported resource counters as one unit
    ///
    /// Duration is left alone: the parent's measurement includes process
    /// startup, the worker's does not.
    pub fn apply_metrics(&mut self, metrics: &RunMetrics) {
        self.memory_allocated = metrics.memory_allocated;
        self.num_gc = metrics.num_gc;
        self.pause_time_ns = metrics.pause_time_ns;
        self.metrics_reported = true;
    }

    /// Record a launch failure
    pub fn fail(&mut self, error: impl Into<String>, exit_code: Option<i32>) {
        self.error = error.into();
        self.exit_code = exit_code;
    }
}

/// System information for reproducibility
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemInfo {
    pub os: String,
    pub architecture: String,
    pub cpu_cores: usize,
    pub harness_version: String,
}

impl Default for SystemInfo {
    fn default() -> Self {
        Self {
            os: std::env::consts::OS.to_string(),
            architecture: std::env::consts::ARCH.to_string(),
            cpu_cores: num_cpus::get(),
            harness_version: crate::VERSION.to_string(),
        }
    }
}

/// Metadata written alongside the results
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunMetadata {
    pub version: String,
    pub timestamp: chrono::DateTime<chrono::Utc>,
    pub total_runs: usize,
    /// Configurations per task in this run
    pub matrix_size: usize,
    pub tasks: Vec<String>,
    pub system_info: SystemInfo,
}

/// Persisted result set: the only interface between a benchmark run and a
/// later report run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultSet {
    pub metadata: RunMetadata,
    pub results: Vec<BenchmarkResult>,
}

impl ResultSet {
    pub fn new(results: Vec<BenchmarkResult>, tasks: Vec<String>, matrix_size: usize) -> Self {
        Self {
            metadata: RunMetadata {
                version: crate::VERSION.to_string(),
                timestamp: chrono::Utc::now(),
                total_runs: results.len(),
                matrix_size,
                tasks,
                system_info: SystemInfo::default(),
            },
            results,
        }
    }

    /// Load a result set written by [`ResultsManager::finalize`] or a bare
    /// JSON array of results
    pub fn load(path: &Path) -> Result<Self, HarnessError> {
        let invalid = |reason: String| HarnessError::InvalidResults {
            path: path.to_path_buf(),
            reason,
        };

        let data = std::fs::read_to_string(path).map_err(|e| invalid(e.to_string()))?;
        let value: serde_json::Value =
            serde_json::from_str(&data).map_err(|e| invalid(e.to_string()))?;

        // Older result files are a bare array of results.
        if value.is_array() {
            let results: Vec<BenchmarkResult> =
                serde_json::from_value(value).map_err(|e| invalid(e.to_string()))?;
            debug!("Loaded bare result array from {:?}", path);
            return Ok(ResultSet::new(results, Vec::new(), 0));
        }

        serde_json::from_value(value).map_err(|e| invalid(e.to_string()))
    }
}

/// Results manager: accumulates cells in matrix order and persists them once
pub struct ResultsManager {
    output_file: PathBuf,
    results: Vec<BenchmarkResult>,
    tasks: Vec<String>,
    matrix_size: usize,
}

impl ResultsManager {
    pub fn new(output_file: &Path, tasks: Vec<String>, matrix_size: usize) -> Self {
        Self {
            output_file: output_file.to_path_buf(),
            results: Vec::new(),
            tasks,
            matrix_size,
        }
    }

    pub fn add_result(&mut self, result: BenchmarkResult) {
        debug!(
            "Adding result for {} / {}",
            result.task, result.config.name
        );
        self.results.push(result);
    }

    pub fn results(&self) -> &[BenchmarkResult] {
        &self.results
    }

    /// Write the accumulated results; any I/O failure here is fatal
    pub fn finalize(&self) -> Result<ResultSet> {
        info!("Finalizing benchmark results");

        let set = ResultSet::new(self.results.clone(), self.tasks.clone(), self.matrix_size);
        let json = serde_json::to_string_pretty(&set).context("Failed to encode result set")?;
        std::fs::write(&self.output_file, json)
            .with_context(|| format!("Failed to write results to {:?}", self.output_file))?;

        info!("Results written to: {:?}", self.output_file);
        Ok(set)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    fn sample_results() -> Vec<BenchmarkResult> {
        let mut ok = BenchmarkResult::new("code-gen", RuntimeConfiguration::new("gc-50", 0, 0, 50));
        ok.duration = Duration::from_nanos(1_234_567_891);
        ok.apply_metrics(&RunMetrics {
            memory_allocated: 77 * 1024 * 1024,
            num_gc: 12,
            pause_time_ns: 98_765,
            ..Default::default()
        });
        ok.exit_code = Some(0);

        let mut failed = BenchmarkResult::new(
            "code-gen",
            RuntimeConfiguration::new("constrained", 2, 256, 50),
        );
        failed.duration = Duration::from_millis(3);
        failed.fail("exit status: 1", Some(1));

        vec![ok, failed]
    }

    #[test]
    fn test_apply_metrics_leaves_duration() {
        let mut result = BenchmarkResult::new("t", RuntimeConfiguration::new("default", 0, 0, 100));
        result.duration = Duration::from_secs(2);
        result.apply_metrics(&RunMetrics {
            duration: Duration::from_secs(1),
            num_gc: 4,
            ..Default::default()
        });
        assert_eq!(result.duration, Duration::from_secs(2));
        assert_eq!(result.num_gc, 4);
        assert!(result.metrics_reported);
    }

    #[test]
    fn test_persisted_round_trip_is_lossless() {
        let file = NamedTempFile::new().unwrap();
        let manager = {
            let mut m = ResultsManager::new(file.path(), vec!["code-gen".to_string()], 2);
            for r in sample_results() {
                m.add_result(r);
            }
            m
        };
        let written = manager.finalize().unwrap();

        let loaded = ResultSet::load(file.path()).unwrap();
        assert_eq!(loaded, written);
        assert_eq!(loaded.results, sample_results());
        assert_eq!(loaded.metadata.total_runs, 2);
    }

    #[test]
    fn test_load_bare_array() {
        let file = NamedTempFile::new().unwrap();
        std::fs::write(
            file.path(),
            serde_json::to_string(&sample_results()).unwrap(),
        )
        .unwrap();

        let loaded = ResultSet::load(file.path()).unwrap();
        assert_eq!(loaded.results, sample_results());
        assert!(loaded.metadata.tasks.is_empty());
    }

    #[test]
    fn test_load_rejects_missing_and_corrupt_files() {
        assert!(matches!(
            ResultSet::load(Path::new("/nonexistent/results.json")),
            Err(HarnessError::InvalidResults { .. })
        ));

        let file = NamedTempFile::new().unwrap();
        std::fs::write(file.path(), "{\"metadata\": 3}").unwrap();
        assert!(ResultSet::load(file.path()).is_err());
    }

    #[test]
    fn test_load_error_names_the_missing_field() {
        let file = NamedTempFile::new().unwrap();
        let mut envelope =
            serde_json::to_value(ResultSet::new(sample_results(), vec![], 2)).unwrap();
        let result = envelope["results"][0].as_object_mut().unwrap();
        result.remove("duration");
        std::fs::write(file.path(), envelope.to_string()).unwrap();

        let err = ResultSet::load(file.path()).unwrap_err();
        assert!(matches!(err, HarnessError::InvalidResults { .. }));
        assert!(err.to_string().contains("duration"), "{}", err);

        let bare = serde_json::Value::Array(vec![envelope["results"][0].clone()]);
        std::fs::write(file.path(), bare.to_string()).unwrap();
        let err = ResultSet::load(file.path()).unwrap_err();
        assert!(err.to_string().contains("duration"), "{}", err);
    }

    #[test]
    fn test_finalize_into_missing_directory_fails() {
        let manager = ResultsManager::new(Path::new("/nonexistent/dir/results.json"), vec![], 0);
        assert!(manager.finalize().is_err());
    }

    #[test]
    fn test_system_info_default() {
        let info = SystemInfo::default();
        assert!(!info.os.is_empty());
        assert!(info.cpu_cores > 0);
    }
}
