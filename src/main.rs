//! # Runtime Tuning Benchmark - Main Entry Point
//!
//! Runs every selected workload under every configuration of the tuning
//! matrix, persists the result set and prints the best configurations.
//!
//! ## Execution Steps
//!
//! 1. **Initialize logging**: colorized tracing output, optional log file
//! 2. **Parse arguments**: task selection, worker locations, knob names
//! 3. **Build the runner**: an unknown task name stops here, before any launch
//! 4. **Run the matrix**: one child process per cell, strictly sequential
//! 5. **Persist**: write the result set (and optionally the report)
//!
//! ## Error Handling
//!
//! Per-cell failures are recorded in the results and never stop the run.
//! Configuration errors and failures to write the output abort with a
//! non-zero exit status.
//!
//! ## Runtime
//!
//! The harness runs on a current-thread Tokio runtime. It only ever waits on
//! one child at a time, and keeping its own footprint to a single thread
//! leaves the machine to the worker being measured.

use anyhow::Result;
use clap::Parser;
use tracing::info;
use tuning_bench::{
    cli::RunArgs,
    config::default_matrix,
    logging::init_logging,
    report::{BestConfigurations, Report},
    utils::{format_duration, format_megabytes},
    BenchmarkRunner, DriverConfig, ResultsManager,
};

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let args = RunArgs::parse();
    let _log_guard = init_logging(
        args.logging.verbose,
        args.logging.quiet,
        args.logging.log_file.as_deref(),
    )?;

    info!("Starting Runtime Tuning Benchmark");
    info!("Configuration: {:?}", args);

    let tasks = args.load_tasks()?;
    let runner = BenchmarkRunner::with_selection(
        tasks,
        &args.task,
        default_matrix(),
        DriverConfig::from(&args),
    )?;

    let task_names = runner.tasks().iter().map(|t| t.name.clone()).collect();
    let mut results_manager =
        ResultsManager::new(&args.output_file, task_names, runner.matrix().len());

    let results = runner.run(Some(&mut results_manager)).await;
    let result_set = results_manager.finalize()?;

    println!("\nResults saved to: {}", args.output_file.display());
    print_best_configurations(&BestConfigurations::from_results(&results));

    if let Some(path) = &args.report {
        let mut options = tuning_bench::ReportOptions {
            block_size: result_set.metadata.matrix_size,
            task_order: result_set.metadata.tasks.clone(),
            ..Default::default()
        };
        for task in runner.tasks() {
            options
                .descriptions
                .insert(task.name.clone(), task.description.clone());
        }
        Report::build(&result_set.results, &options).write_markdown_file(path)?;
        println!("Report written to: {}", path.display());
    }

    info!("Runtime Tuning Benchmark completed");
    Ok(())
}

fn print_best_configurations(best: &BestConfigurations) {
    println!("\n=== Summary ===");
    match &best.fastest {
        Some((name, duration)) => {
            println!("Fastest execution: {} ({})", name, format_duration(*duration))
        }
        None => println!("Fastest execution: no successful runs"),
    }
    match &best.lowest_memory {
        Some((name, bytes)) => println!("Lowest memory: {} ({} MB)", name, format_megabytes(*bytes)),
        None => println!("Lowest memory: no successful runs"),
    }
    match &best.fewest_gc {
        Some((name, gc)) => println!("Fewest GC runs: {} ({} runs)", name, gc),
        None => println!("Fewest GC runs: no successful runs"),
    }
}
