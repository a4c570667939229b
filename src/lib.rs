//! # Runtime Tuning Benchmark Library
//!
//! A harness that measures how runtime scheduler and garbage-collector knobs
//! affect a set of worker workloads. Every workload runs as its own process
//! under every configuration of a fixed tuning matrix; the knobs reach the
//! worker through its environment and the worker reports its own resource
//! counters back through a small JSON file.
//!
//! ## Architecture Overview
//!
//! - `metrics`: the metrics exchange record and its file contract
//! - `launcher`: runs one (task, configuration) cell as a child process
//! - `benchmark`: drives the full task × configuration matrix
//! - `results`: per-cell results and the persisted result set
//! - `report`: summary statistics, rankings, recommendations and rendering
//! - `config` / `task`: the tuning matrix and the workload definitions
//! - `probe`: the model behind the bundled synthetic worker
//! - `cli`, `logging`, `error`, `utils`: the ambient plumbing
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use tuning_bench::{
//!     config::default_matrix, BenchmarkRunner, DriverConfig, Report, ReportOptions, WorkerTask,
//! };
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> anyhow::Result<()> {
//!     let task = WorkerTask::new("search", "./workers/file-searcher", &["--dir=./testdata"], "");
//!     let runner = BenchmarkRunner::new(vec![task], default_matrix(), DriverConfig::default())?;
//!
//!     let results = runner.run(None).await;
//!     let report = Report::build(&results, &ReportOptions::default());
//!     println!("{}", report.render_markdown());
//!     Ok(())
//! }
//! ```

/// Matrix driver: iterates tasks × configurations through the launcher
pub mod benchmark;

/// Command-line interface and configuration
pub mod cli;

/// Runtime configurations and the environment overrides they produce
pub mod config;

pub mod error;

/// Child process launching, environment composition and metrics handoff
pub mod launcher;

pub mod logging;

/// Metrics exchange protocol between worker processes and the harness
pub mod metrics;

/// Knob parsing and collector model behind the `tuning-probe` worker
pub mod probe;

/// Aggregation, ranking and report rendering
pub mod report;

/// Per-cell results and the persisted result set
pub mod results;

pub mod task;

pub mod utils;

pub use benchmark::{BenchmarkRunner, DriverConfig};
pub use config::RuntimeConfiguration;
pub use error::HarnessError;
pub use launcher::{LauncherConfig, WorkerLauncher};
pub use metrics::RunMetrics;
pub use report::{Report, ReportOptions};
pub use results::{BenchmarkResult, ResultSet, ResultsManager};
pub use task::WorkerTask;

/// The current version of the harness
///
/// Recorded in every persisted result set.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default configuration values
pub mod defaults {
    /// Persisted result set written by a benchmark run
    pub const RESULTS_FILE: &str = "benchmark_results.json";

    /// Markdown report written by the reporter
    pub const REPORT_FILE: &str = "BENCHMARK_REPORT.md";

    /// Where the built-in worker executables live
    pub const WORKER_DIR: &str = "workers";

    /// Fixture tree the built-in workers read
    pub const FIXTURES_DIR: &str = "testdata";

    /// Entries per best/worst table in the report
    pub const TOP_N: usize = 4;

    /// Number of configurations in the default matrix
    pub const MATRIX_SIZE: usize = 13;

    /// Environment variable the worker runtime reads its thread limit from
    pub const PARALLELISM_VAR: &str = "GOMAXPROCS";

    /// Environment variable the worker runtime reads its soft memory limit from
    pub const MEMORY_LIMIT_VAR: &str = "GOMEMLIMIT";

    /// Environment variable the worker runtime reads its collector percentage from
    pub const GC_PERCENT_VAR: &str = "GOGC";
}
