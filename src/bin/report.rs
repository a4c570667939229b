//! # Runtime Tuning Report
//!
//! Reads a persisted result set and renders the comparative report. Runs
//! independently of the benchmark so a report can be regenerated without
//! launching a single worker.

use anyhow::Result;
use clap::Parser;
use tracing::info;
use tuning_bench::{cli::ReportArgs, logging::init_logging, Report, ResultSet};

fn main() -> Result<()> {
    let args = ReportArgs::parse();
    let _log_guard = init_logging(
        args.logging.verbose,
        args.logging.quiet,
        args.logging.log_file.as_deref(),
    )?;

    let result_set = ResultSet::load(&args.input)?;
    info!(
        "Loaded {} results from {:?}",
        result_set.results.len(),
        args.input
    );

    let options = args.report_options(&result_set.metadata.tasks, result_set.metadata.matrix_size);
    let report = Report::build(&result_set.results, &options);

    report.write_markdown_file(&args.output)?;
    if let Some(path) = &args.json {
        report.write_json_file(path)?;
    }

    println!("Report generated successfully: {}", args.output.display());
    if args.print {
        println!("\n{}", report.render_markdown());
    }
    Ok(())
}
