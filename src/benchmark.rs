//! # Benchmark Matrix Driver
//!
//! Walks the full cross product of tasks and runtime configurations and hands
//! every cell to the `WorkerLauncher`.
//!
//! ## Ordering
//!
//! Tasks are visited in their defined order, and for each task every
//! configuration in matrix order. Reports that cannot rely on the per-result
//! task field fall back to slicing the flat result list into one block per
//! task, so this order is part of the output contract.
//!
//! ## Concurrency
//!
//! Cells run strictly one after another. Any parallelism belongs inside the
//! worker; two workers running side by side would compete for the very CPU
//! and memory budget the configuration is supposed to pin down.

use crate::{
    config::RuntimeConfiguration,
    error::HarnessError,
    launcher::{LauncherConfig, WorkerLauncher},
    results::{BenchmarkResult, ResultsManager},
    task::{filter_tasks, WorkerTask},
    utils::{create_progress_indicator, format_duration, format_megabytes},
};
use colored::*;
use tracing::{info, warn};

/// Settings for one matrix run
///
/// The orchestrator's own posture is decided here and handed to the runner,
/// never picked up from ambient process state.
#[derive(Debug, Clone, Default)]
pub struct DriverConfig {
    pub launcher: LauncherConfig,

    /// Print a progress line for every finished cell
    pub show_progress: bool,
}

/// Runs the benchmark matrix
pub struct BenchmarkRunner {
    tasks: Vec<WorkerTask>,
    matrix: Vec<RuntimeConfiguration>,
    launcher: WorkerLauncher,
    show_progress: bool,
}

impl BenchmarkRunner {
    /// Create a runner for `tasks` × `matrix`
    ///
    /// ## Returns
    /// - `Ok(BenchmarkRunner)`: ready to run
    /// - `Err(HarnessError::EmptyMatrix)`: no tasks or no configurations
    pub fn new(
        tasks: Vec<WorkerTask>,
        matrix: Vec<RuntimeConfiguration>,
        config: DriverConfig,
    ) -> Result<Self, HarnessError> {
        if tasks.is_empty() {
            return Err(HarnessError::EmptyMatrix("no tasks selected"));
        }
        if matrix.is_empty() {
            return Err(HarnessError::EmptyMatrix("no runtime configurations"));
        }

        Ok(Self {
            tasks,
            matrix,
            launcher: WorkerLauncher::new(config.launcher),
            show_progress: config.show_progress,
        })
    }

    /// Create a runner restricted to the task named `selection` ("all" keeps
    /// every task); an unknown name fails before anything is launched
    pub fn with_selection(
        tasks: Vec<WorkerTask>,
        selection: &str,
        matrix: Vec<RuntimeConfiguration>,
        config: DriverConfig,
    ) -> Result<Self, HarnessError> {
        let tasks = filter_tasks(tasks, selection)?;
        Self::new(tasks, matrix, config)
    }

    pub fn tasks(&self) -> &[WorkerTask] {
        &self.tasks
    }

    pub fn matrix(&self) -> &[RuntimeConfiguration] {
        &self.matrix
    }

    /// Number of cells a full run produces
    pub fn total_cells(&self) -> usize {
        self.tasks.len() * self.matrix.len()
    }

    /// Run every cell in order and return one result per cell
    ///
    /// Individual launch failures are part of the returned data; this never
    /// stops early. When a results manager is supplied every result is also
    /// handed to it as soon as the cell finishes.
    pub async fn run(
        &self,
        mut results_manager: Option<&mut ResultsManager>,
    ) -> Vec<BenchmarkResult> {
        let total = self.total_cells();
        let mut results = Vec::with_capacity(total);

        info!(
            "Running {} tasks x {} configurations ({} cells)",
            self.tasks.len(),
            self.matrix.len(),
            total
        );

        for task in &self.tasks {
            if self.show_progress {
                println!();
                println!("{}", format!("=== Running Task: {} ===", task.name).bold());
                if !task.description.is_empty() {
                    println!("Description: {}", task.description);
                }
                println!();
            }

            for runtime in &self.matrix {
                info!("Testing configuration: {}", runtime);
                let result = self.launcher.launch(task, runtime).await;

                if result.is_success() {
                    info!(
                        "{} / {} finished in {}",
                        task.name,
                        runtime.name,
                        format_duration(result.duration)
                    );
                } else {
                    warn!("{} / {} failed: {}", task.name, runtime.name, result.error);
                }

                results.push(result.clone());
                if self.show_progress {
                    print_progress(results.len(), total, &result);
                }
                if let Some(manager) = results_manager.as_deref_mut() {
                    manager.add_result(result);
                }
            }
        }

        results
    }
}

fn print_progress(done: usize, total: usize, result: &BenchmarkResult) {
    let bar = create_progress_indicator(done, total, 20);
    if result.is_success() {
        println!(
            "{} {:>3}/{} {:<14} Duration: {}, Memory: {} MB, GC runs: {}",
            bar,
            done,
            total,
            result.config.name,
            format_duration(result.duration),
            format_megabytes(result.memory_allocated),
            result.num_gc
        );
    } else {
        println!(
            "{} {:>3}/{} {:<14} {}",
            bar,
            done,
            total,
            result.config.name,
            format!("ERROR: {}", result.error).red()
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::launcher::WorkerOutput;

    fn quiet_config() -> DriverConfig {
        DriverConfig {
            launcher: LauncherConfig {
                worker_output: WorkerOutput::Silent,
                ..Default::default()
            },
            show_progress: false,
        }
    }

    fn small_matrix() -> Vec<RuntimeConfiguration> {
        vec![
            RuntimeConfiguration::new("default", 0, 0, 100),
            RuntimeConfiguration::new("maxprocs-2", 2, 0, 100),
            RuntimeConfiguration::new("gc-off", 0, 0, -1),
        ]
    }

    #[test]
    fn test_runner_rejects_empty_inputs() {
        assert!(matches!(
            BenchmarkRunner::new(vec![], small_matrix(), quiet_config()),
            Err(HarnessError::EmptyMatrix(_))
        ));
        let task = WorkerTask::new("t", "true", &[], "");
        assert!(BenchmarkRunner::new(vec![task], vec![], quiet_config()).is_err());
    }

    #[test]
    fn test_unknown_selection_fails_before_running() {
        let task = WorkerTask::new("t", "true", &[], "");
        let err = BenchmarkRunner::with_selection(vec![task], "other", small_matrix(), quiet_config())
            .err()
            .unwrap();
        assert!(matches!(err, HarnessError::UnknownTask { .. }));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_every_cell_produces_one_result_in_order() {
        let tasks = vec![
            WorkerTask::new("first", "sh", &["-c", "exit 0", "sh"], ""),
            WorkerTask::new("second", "sh", &["-c", "exit 0", "sh"], ""),
        ];
        let runner = BenchmarkRunner::new(tasks, small_matrix(), quiet_config()).unwrap();
        let dir = tempfile::tempdir().unwrap();
        let mut manager = ResultsManager::new(&dir.path().join("r.json"), vec![], 3);

        let results = runner.run(Some(&mut manager)).await;

        assert_eq!(results.len(), runner.total_cells());
        assert_eq!(results.len(), 2 * 3);
        assert_eq!(manager.results(), &results[..]);

        let cells: Vec<_> = results
            .iter()
            .map(|r| (r.task.as_str(), r.config.name.as_str()))
            .collect();
        assert_eq!(
            cells,
            vec![
                ("first", "default"),
                ("first", "maxprocs-2"),
                ("first", "gc-off"),
                ("second", "default"),
                ("second", "maxprocs-2"),
                ("second", "gc-off"),
            ]
        );
    }
}
