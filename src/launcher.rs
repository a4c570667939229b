//! # Worker Process Launcher
//!
//! Runs one matrix cell: a single worker process under a single runtime
//! configuration, producing exactly one `BenchmarkResult`.
//!
//! ## Launch Lifecycle
//!
//! 1. **Handoff**: reserve a uniquely named metrics file, removed again when
//!    the launch ends no matter how it ends
//! 2. **Environment**: the parent's environment plus overrides for the
//!    configuration's non-default knobs
//! 3. **Arguments**: the task's arguments plus `--metrics-output=<path>`, on a
//!    per-launch copy
//! 4. **Execution**: spawn, share the parent's stdout/stderr, wait, and time
//!    the whole thing from the parent's side
//! 5. **Collection**: read the worker's self-reported counters back
//!
//! ## Failure Isolation
//!
//! Nothing in here returns an error to the caller. Spawn failures, non-zero
//! exits, signals and timeouts all end up in `BenchmarkResult::error`, and a
//! missing or corrupt metrics file only produces a warning.

use crate::{
    config::{EnvOverrideNames, RuntimeConfiguration},
    metrics::{RunMetrics, METRICS_OUTPUT_FLAG},
    results::BenchmarkResult,
    task::WorkerTask,
    utils::{format_duration, generate_run_id},
};
use anyhow::{anyhow, Context, Result};
use std::ffi::OsString;
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use std::time::{Duration, Instant};
use tokio::process::Command;
use tracing::{debug, warn};

/// Where a worker's stdout/stderr go
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerOutput {
    /// Share the harness's own streams so worker diagnostics stay visible
    Inherit,
    /// Discard worker output
    Silent,
}

impl WorkerOutput {
    fn stdio(self) -> Stdio {
        match self {
            WorkerOutput::Inherit => Stdio::inherit(),
            WorkerOutput::Silent => Stdio::null(),
        }
    }
}

/// Launcher settings shared by every cell of a run
#[derive(Debug, Clone)]
pub struct LauncherConfig {
    /// Environment variable names the worker runtime reads its knobs from
    pub env_names: EnvOverrideNames,

    /// Deadline for a single worker; `None` waits indefinitely
    pub timeout: Option<Duration>,

    pub worker_output: WorkerOutput,

    /// Directory that receives the transient metrics handoff files
    pub metrics_dir: PathBuf,
}

impl Default for LauncherConfig {
    fn default() -> Self {
        Self {
            env_names: EnvOverrideNames::default(),
            timeout: None,
            worker_output: WorkerOutput::Inherit,
            metrics_dir: std::env::temp_dir(),
        }
    }
}

/// Exclusively owned metrics handoff file, deleted on drop
pub struct MetricsHandoff {
    path: PathBuf,
}

impl MetricsHandoff {
    /// Create a fresh, empty handoff file inside `dir`
    pub fn allocate(dir: &Path) -> Result<Self> {
        let path = dir.join(format!("worker-metrics-{}.json", generate_run_id()));
        OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .with_context(|| format!("Failed to create metrics file {:?}", path))?;
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for MetricsHandoff {
    fn drop(&mut self) {
        match std::fs::remove_file(&self.path) {
            Ok(()) => debug!("Removed metrics file {:?}", self.path),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!("Failed to remove metrics file {:?}: {}", self.path, e),
        }
    }
}

/// Child environment for `config`: `parent` followed by the overrides
///
/// All-default configurations get `parent` back unchanged.
pub fn compose_environment<I>(
    parent: I,
    config: &RuntimeConfiguration,
    names: &EnvOverrideNames,
) -> Vec<(OsString, OsString)>
where
    I: IntoIterator<Item = (OsString, OsString)>,
{
    let mut env: Vec<(OsString, OsString)> = parent.into_iter().collect();
    env.extend(
        config
            .env_overrides(names)
            .into_iter()
            .map(|(key, value)| (OsString::from(key), OsString::from(value))),
    );
    env
}

/// Per-launch argument list: the task's arguments plus the metrics flag
///
/// The path is appended as raw OS bytes so a non-UTF-8 metrics directory
/// still reaches the worker intact.
pub fn worker_args(task: &WorkerTask, metrics_path: &Path) -> Vec<OsString> {
    let mut args: Vec<OsString> = task.args.iter().map(OsString::from).collect();
    let mut flag = OsString::from(format!("{}=", METRICS_OUTPUT_FLAG));
    flag.push(metrics_path.as_os_str());
    args.push(flag);
    args
}

/// Runs single matrix cells
pub struct WorkerLauncher {
    config: LauncherConfig,
}

impl WorkerLauncher {
    pub fn new(config: LauncherConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &LauncherConfig {
        &self.config
    }

    /// Benchmark `task` under `runtime` and report the outcome
    pub async fn launch(
        &self,
        task: &WorkerTask,
        runtime: &RuntimeConfiguration,
    ) -> BenchmarkResult {
        let mut result = BenchmarkResult::new(&task.name, runtime.clone());

        let handoff = match MetricsHandoff::allocate(&self.config.metrics_dir) {
            Ok(handoff) => handoff,
            Err(e) => {
                result.fail(format!("{:#}", e), None);
                return result;
            }
        };

        let env = compose_environment(std::env::vars_os(), runtime, &self.config.env_names);
        let args = worker_args(task, handoff.path());
        debug!(
            "Launching {} {:?} with overrides {:?}",
            task.command,
            args,
            runtime.env_overrides(&self.config.env_names)
        );

        let mut cmd = Command::new(&task.command);
        cmd.args(&args)
            .env_clear()
            .envs(env)
            .stdin(Stdio::null())
            .stdout(self.config.worker_output.stdio())
            .stderr(self.config.worker_output.stdio())
            .kill_on_drop(true);

        let start_time = Instant::now();
        let outcome = self.run_to_completion(&mut cmd, task).await;
        result.duration = start_time.elapsed();

        match outcome {
            Ok(status) if status.success() => result.exit_code = status.code(),
            Ok(status) => result.fail(format!("worker {}", status), status.code()),
            Err(e) => result.fail(format!("{:#}", e), None),
        }

        match RunMetrics::read_from_file(handoff.path()) {
            Ok(metrics) => result.apply_metrics(&metrics),
            Err(e) => warn!(
                "Could not read worker metrics for {} / {}: {:#}",
                task.name, runtime.name, e
            ),
        }

        result
    }

    /// Spawn the prepared command and wait for it, honoring the deadline
    async fn run_to_completion(
        &self,
        cmd: &mut Command,
        task: &WorkerTask,
    ) -> Result<ExitStatus> {
        let mut child = cmd
            .spawn()
            .with_context(|| format!("Failed to spawn worker '{}'", task.command))?;

        let Some(limit) = self.config.timeout else {
            return Ok(child.wait().await?);
        };

        match tokio::time::timeout(limit, child.wait()).await {
            Ok(status) => Ok(status?),
            Err(_) => {
                if let Err(e) = child.kill().await {
                    warn!("Failed to kill timed out worker {}: {}", task.name, e);
                }
                Err(anyhow!("worker timed out after {}", format_duration(limit)))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parent_env() -> Vec<(OsString, OsString)> {
        vec![
            (OsString::from("PATH"), OsString::from("/usr/bin")),
            (OsString::from("HOME"), OsString::from("/home/bench")),
        ]
    }

    #[test]
    fn test_baseline_environment_is_unchanged() {
        let cfg = RuntimeConfiguration::new("default", 0, 0, 100);
        let env = compose_environment(parent_env(), &cfg, &EnvOverrideNames::default());
        assert_eq!(env, parent_env());
    }

    #[test]
    fn test_memory_only_appends_one_variable() {
        let cfg = RuntimeConfiguration::new("memlimit-256", 0, 256, 100);
        let env = compose_environment(parent_env(), &cfg, &EnvOverrideNames::default());
        assert_eq!(env.len(), parent_env().len() + 1);
        assert_eq!(&env[..2], &parent_env()[..]);
        assert_eq!(
            env[2],
            (OsString::from("GOMEMLIMIT"), OsString::from("256MiB"))
        );
    }

    #[test]
    fn test_worker_args_do_not_touch_task() {
        let task = WorkerTask::new("t", "worker", &["--files=10"], "");
        let args = worker_args(&task, Path::new("/tmp/m.json"));
        assert_eq!(
            args,
            vec![
                OsString::from("--files=10"),
                OsString::from("--metrics-output=/tmp/m.json")
            ]
        );
        assert_eq!(task.args, vec!["--files=10"]);
    }

    #[cfg(unix)]
    #[test]
    fn test_worker_args_keep_non_utf8_metrics_path() {
        use std::os::unix::ffi::{OsStrExt, OsStringExt};

        let dir = Path::new(std::ffi::OsStr::from_bytes(b"/tmp/metrics-\xff"));
        let path = dir.join("m.json");
        let args = worker_args(&WorkerTask::new("t", "worker", &[], ""), &path);

        assert_eq!(args.len(), 1);
        assert_eq!(
            args[0].clone().into_vec(),
            b"--metrics-output=/tmp/metrics-\xff/m.json".to_vec()
        );
    }

    #[test]
    fn test_handoff_is_unique_and_removed_on_drop() {
        let dir = tempfile::tempdir().unwrap();
        let first = MetricsHandoff::allocate(dir.path()).unwrap();
        let second = MetricsHandoff::allocate(dir.path()).unwrap();
        assert_ne!(first.path(), second.path());

        let path = first.path().to_path_buf();
        assert!(path.exists());
        drop(first);
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_spawn_failure_is_recorded() {
        let dir = tempfile::tempdir().unwrap();
        let launcher = WorkerLauncher::new(LauncherConfig {
            metrics_dir: dir.path().to_path_buf(),
            worker_output: WorkerOutput::Silent,
            ..Default::default()
        });
        let task = WorkerTask::new("missing", "/nonexistent/worker-binary", &[], "");
        let result = launcher
            .launch(&task, &RuntimeConfiguration::new("default", 0, 0, 100))
            .await;

        assert!(!result.is_success());
        assert!(result.error.contains("Failed to spawn"));
        assert_eq!(result.exit_code, None);
        assert_eq!(result.memory_allocated, 0);
        assert!(!result.metrics_reported);
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_reported_metrics_are_applied() {
        let dir = tempfile::tempdir().unwrap();
        let launcher = WorkerLauncher::new(LauncherConfig {
            metrics_dir: dir.path().to_path_buf(),
            worker_output: WorkerOutput::Silent,
            ..Default::default()
        });
        let script = r#"p="${1#--metrics-output=}"
printf '{"duration": 1, "memory_allocated": 2048, "num_gc": %s, "pause_time_ns": 90}' \
    "${GOMAXPROCS:-0}" > "$p""#;
        let task = WorkerTask::new("scripted", "sh", &["-c", script, "sh"], "");
        let result = launcher
            .launch(&task, &RuntimeConfiguration::new("maxprocs-4", 4, 0, 100))
            .await;

        assert!(result.is_success(), "{}", result.error);
        assert_eq!(result.exit_code, Some(0));
        assert_eq!(result.memory_allocated, 2048);
        assert_eq!(result.num_gc, 4);
        assert_eq!(result.pause_time_ns, 90);
        assert!(result.duration > Duration::from_nanos(1));
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_timeout_kills_worker() {
        let launcher = WorkerLauncher::new(LauncherConfig {
            timeout: Some(Duration::from_millis(100)),
            worker_output: WorkerOutput::Silent,
            ..Default::default()
        });
        let task = WorkerTask::new("hang", "sh", &["-c", "sleep 10", "sh"], "");
        let result = launcher
            .launch(&task, &RuntimeConfiguration::new("default", 0, 0, 100))
            .await;

        assert!(result.error.contains("timed out"));
        assert_eq!(result.exit_code, None);
        assert!(result.duration < Duration::from_secs(5));
    }
}
