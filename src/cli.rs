use crate::{
    benchmark::DriverConfig,
    config::EnvOverrideNames,
    launcher::{LauncherConfig, WorkerOutput},
    report::ReportOptions,
    task::{default_tasks, load_tasks_file, WorkerTask},
};
use anyhow::Result;
use clap::{ArgAction, Args, Parser};
use std::path::PathBuf;
use std::time::Duration;

/// Logging switches shared by every binary
#[derive(Args, Debug, Clone, Default)]
pub struct LoggingArgs {
    /// Increase log verbosity (-v debug, -vv trace)
    #[clap(short = 'v', long, action = ArgAction::Count, help_heading = "Logging")]
    pub verbose: u8,

    /// Only log warnings and errors
    #[clap(short = 'q', long, default_value_t = false, help_heading = "Logging")]
    pub quiet: bool,

    /// Also write logs (without colors) to this file
    #[clap(long, help_heading = "Logging")]
    pub log_file: Option<PathBuf>,
}

/// Runtime Tuning Benchmark - run every workload under every runtime configuration
#[derive(Parser, Debug, Clone, Default)]
#[clap(version, about, long_about = None)]
pub struct RunArgs {
    /// Task to run: a task name or "all"
    #[clap(short = 't', long, default_value = crate::task::ALL_TASKS, help_heading = "Core Options")]
    pub task: String,

    /// Output file for the persisted result set (JSON)
    #[clap(short = 'o', long, default_value = crate::defaults::RESULTS_FILE, help_heading = "Core Options")]
    pub output_file: PathBuf,

    /// Also render the report right after the run
    #[clap(long, help_heading = "Core Options")]
    pub report: Option<PathBuf>,

    /// Directory holding the built-in worker executables
    #[clap(long, default_value = crate::defaults::WORKER_DIR, help_heading = "Workers")]
    pub worker_dir: PathBuf,

    /// Fixture tree the built-in workers operate on
    #[clap(long, default_value = crate::defaults::FIXTURES_DIR, help_heading = "Workers")]
    pub fixtures_dir: PathBuf,

    /// JSON list of tasks replacing the built-in set
    #[clap(long, help_heading = "Workers")]
    pub tasks_file: Option<PathBuf>,

    /// Kill a worker that runs longer than this (e.g. "30s", "5m"); no limit by default
    #[clap(long, value_parser = parse_duration, help_heading = "Workers")]
    pub timeout: Option<Duration>,

    /// Discard worker stdout/stderr instead of passing it through
    #[clap(long, default_value_t = false, help_heading = "Workers")]
    pub quiet_workers: bool,

    /// Directory for transient metrics handoff files (system temp dir by default)
    #[clap(long, help_heading = "Workers")]
    pub metrics_dir: Option<PathBuf>,

    /// Environment variable carrying the parallelism hint
    #[clap(long, default_value = crate::defaults::PARALLELISM_VAR, help_heading = "Runtime Knobs")]
    pub parallelism_var: String,

    /// Environment variable carrying the memory ceiling
    #[clap(long, default_value = crate::defaults::MEMORY_LIMIT_VAR, help_heading = "Runtime Knobs")]
    pub memory_limit_var: String,

    /// Environment variable carrying the collector percentage
    #[clap(long, default_value = crate::defaults::GC_PERCENT_VAR, help_heading = "Runtime Knobs")]
    pub gc_var: String,

    #[clap(flatten)]
    pub logging: LoggingArgs,
}

impl RunArgs {
    /// Task list before filtering: the tasks file when given, else the built-in set
    pub fn load_tasks(&self) -> Result<Vec<WorkerTask>> {
        match &self.tasks_file {
            Some(path) => Ok(load_tasks_file(path)?),
            None => Ok(default_tasks(&self.worker_dir, &self.fixtures_dir)),
        }
    }

    pub fn env_names(&self) -> EnvOverrideNames {
        EnvOverrideNames {
            parallelism: self.parallelism_var.clone(),
            memory_limit: self.memory_limit_var.clone(),
            gc_percent: self.gc_var.clone(),
        }
    }
}

impl From<&RunArgs> for DriverConfig {
    fn from(args: &RunArgs) -> Self {
        Self {
            launcher: LauncherConfig {
                env_names: args.env_names(),
                timeout: args.timeout,
                worker_output: if args.quiet_workers {
                    WorkerOutput::Silent
                } else {
                    WorkerOutput::Inherit
                },
                metrics_dir: args
                    .metrics_dir
                    .clone()
                    .unwrap_or_else(std::env::temp_dir),
            },
            show_progress: !args.logging.quiet,
        }
    }
}

/// Runtime Tuning Report - render a comparative report from a persisted result set
#[derive(Parser, Debug, Clone, Default)]
#[clap(version, about, long_about = None)]
pub struct ReportArgs {
    /// Persisted result set written by tuning-bench
    #[clap(short = 'i', long, default_value = crate::defaults::RESULTS_FILE)]
    pub input: PathBuf,

    /// Markdown report output
    #[clap(short = 'o', long, default_value = crate::defaults::REPORT_FILE)]
    pub output: PathBuf,

    /// Also write the report data as JSON
    #[clap(long)]
    pub json: Option<PathBuf>,

    /// Entries per best/worst table
    #[clap(long, default_value_t = crate::defaults::TOP_N)]
    pub top_n: usize,

    /// Results per task block for result files without task names
    #[clap(long)]
    pub block_size: Option<usize>,

    /// Print the rendered report to stdout
    #[clap(long, default_value_t = false)]
    pub print: bool,

    #[clap(flatten)]
    pub logging: LoggingArgs,
}

impl ReportArgs {
    /// Report options, falling back to what the result set recorded
    pub fn report_options(
        &self,
        recorded_tasks: &[String],
        recorded_matrix: usize,
    ) -> ReportOptions {
        let mut options = ReportOptions {
            top_n: self.top_n,
            ..Default::default()
        };
        if let Some(size) = self.block_size {
            options.block_size = size;
        } else if recorded_matrix > 0 {
            options.block_size = recorded_matrix;
        }
        if !recorded_tasks.is_empty() {
            options.task_order = recorded_tasks.to_vec();
        }
        options
    }
}

/// Runtime Tuning Probe - synthetic worker that honours the runtime knobs
#[derive(Parser, Debug, Clone)]
#[clap(version, about, long_about = None)]
pub struct ProbeArgs {
    /// Work items to push through the thread pool
    #[clap(long, default_value_t = 64)]
    pub rounds: usize,

    /// Garbage produced per work item, in KiB
    #[clap(long, default_value_t = 256)]
    pub chunk_kb: usize,

    /// Exit with this status after reporting (0 = success)
    #[clap(long, default_value_t = 0)]
    pub exit_code: i32,

    /// Do not write the metrics file even when a path is given
    #[clap(long, default_value_t = false)]
    pub skip_metrics: bool,

    /// Where to write the metrics exchange file
    #[clap(long)]
    pub metrics_output: Option<PathBuf>,
}

/// Parse duration from string (e.g., "10s", "5m", "1h", "500ms")
pub fn parse_duration(s: &str) -> Result<Duration, String> {
    let s = s.trim();

    if s.is_empty() {
        return Err("Duration cannot be empty".to_string());
    }

    let (num_str, unit) = if let Some(stripped) = s.strip_suffix("ms") {
        (stripped, "ms")
    } else if let Some(stripped) = s.strip_suffix('s') {
        (stripped, "s")
    } else if let Some(stripped) = s.strip_suffix('m') {
        (stripped, "m")
    } else if let Some(stripped) = s.strip_suffix('h') {
        (stripped, "h")
    } else {
        (s, "s") // Default to seconds
    };

    let num: f64 = num_str
        .parse()
        .map_err(|_| format!("Invalid number in duration: {}", num_str))?;
    if !num.is_finite() || num <= 0.0 {
        return Err(format!("Duration must be positive: {}", s));
    }

    let duration = match unit {
        "ms" => Duration::from_secs_f64(num / 1000.0),
        "s" => Duration::from_secs_f64(num),
        "m" => Duration::from_secs_f64(num * 60.0),
        "h" => Duration::from_secs_f64(num * 3600.0),
        _ => return Err(format!("Invalid duration unit: {}", unit)),
    };

    Ok(duration)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_duration() {
        assert_eq!(parse_duration("10s").unwrap(), Duration::from_secs(10));
        assert_eq!(parse_duration("5m").unwrap(), Duration::from_secs(300));
        assert_eq!(parse_duration("1h").unwrap(), Duration::from_secs(3600));
        assert_eq!(parse_duration("500ms").unwrap(), Duration::from_millis(500));
        assert_eq!(parse_duration("10").unwrap(), Duration::from_secs(10));

        assert!(parse_duration("").is_err());
        assert!(parse_duration("invalid").is_err());
        assert!(parse_duration("0s").is_err());
    }

    #[test]
    fn test_run_args_defaults() {
        let args = RunArgs::parse_from(["tuning-bench"]);
        assert_eq!(args.task, "all");
        assert_eq!(args.output_file, PathBuf::from("benchmark_results.json"));
        assert_eq!(args.timeout, None);
        assert_eq!(args.env_names(), EnvOverrideNames::default());
        assert_eq!(args.load_tasks().unwrap().len(), 4);

        let config = DriverConfig::from(&args);
        assert_eq!(config.launcher.worker_output, WorkerOutput::Inherit);
        assert!(config.show_progress);
    }

    #[test]
    fn test_run_args_overrides() {
        let args = RunArgs::parse_from([
            "tuning-bench",
            "-t",
            "refactor",
            "--timeout",
            "90s",
            "--quiet-workers",
            "--gc-var",
            "GC_PCT",
            "-vv",
        ]);
        assert_eq!(args.task, "refactor");
        assert_eq!(args.logging.verbose, 2);

        let config = DriverConfig::from(&args);
        assert_eq!(config.launcher.timeout, Some(Duration::from_secs(90)));
        assert_eq!(config.launcher.worker_output, WorkerOutput::Silent);
        assert_eq!(config.launcher.env_names.gc_percent, "GC_PCT");
    }

    #[test]
    fn test_report_options_use_recorded_shape() {
        let args = ReportArgs::parse_from(["tuning-report", "--top-n", "2"]);
        let options = args.report_options(&["a".to_string()], 5);
        assert_eq!(options.top_n, 2);
        assert_eq!(options.block_size, 5);
        assert_eq!(options.task_order, vec!["a"]);

        let explicit = ReportArgs::parse_from(["tuning-report", "--block-size", "3"]);
        let options = explicit.report_options(&[], 0);
        assert_eq!(options.block_size, 3);
        assert_eq!(options.task_order.len(), 4);
    }

    #[test]
    fn test_probe_args_accept_both_metrics_forms() {
        let joined = ProbeArgs::parse_from(["tuning-probe", "--metrics-output=/tmp/m.json"]);
        assert_eq!(joined.metrics_output, Some(PathBuf::from("/tmp/m.json")));
        assert_eq!(joined.rounds, 64);
        assert_eq!(joined.exit_code, 0);

        let split = ProbeArgs::parse_from([
            "tuning-probe",
            "--rounds",
            "8",
            "--metrics-output",
            "/tmp/m.json",
        ]);
        assert_eq!(split.metrics_output, joined.metrics_output);
        assert_eq!(split.rounds, 8);
    }
}
