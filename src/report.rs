//! # Result Aggregator & Reporter
//!
//! Turns a flat, ordered list of `BenchmarkResult`s into a comparative report.
//! The report is built as plain data first (`Report`, serializable as JSON)
//! and rendered to Markdown as a separate step.
//!
//! ## Report Sections
//!
//! - **Executive summary**: success/failure counts and means over successes
//! - **Per-task breakdowns**: best and worst configurations ranked separately
//!   by duration, memory allocated and collection cycles
//! - **Recommendations**: the best tested setting per tunable knob plus
//!   standing guidance
//! - **Raw data**: one row per result with a pass/fail marker
//!
//! ## Ranking Rules
//!
//! Only successful results are ranked. Sorting is stable, so equal values keep
//! their matrix order and ranking the same input twice gives the same answer.
//!
//! ## Task Attribution
//!
//! Results carry their task name. Results from files that predate that field
//! are attributed by position: the flat list is cut into fixed-size blocks,
//! one per matrix pass, and blocks are assigned to tasks round-robin.

use crate::{
    config::{RuntimeConfiguration, GC_PREFIX, MEMORY_LIMIT_PREFIX, PARALLELISM_PREFIX},
    results::BenchmarkResult,
    task::{default_descriptions, DEFAULT_TASK_NAMES},
    utils::{bytes_to_megabytes, format_duration, format_megabytes, mean, mean_duration},
};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::Write;
use std::path::Path;
use std::time::Duration;

/// Knobs controlling report construction
#[derive(Debug, Clone)]
pub struct ReportOptions {
    /// Entries in each best/worst table
    pub top_n: usize,

    /// Results per positional block when a result carries no task name
    pub block_size: usize,

    /// Task names assigned round-robin to positional blocks
    pub task_order: Vec<String>,

    /// Shown under each task heading when present
    pub descriptions: BTreeMap<String, String>,
}

impl Default for ReportOptions {
    fn default() -> Self {
        Self {
            top_n: crate::defaults::TOP_N,
            block_size: crate::defaults::MATRIX_SIZE,
            task_order: DEFAULT_TASK_NAMES.iter().map(|s| s.to_string()).collect(),
            descriptions: default_descriptions(),
        }
    }
}

/// Metric a ranking is ordered by (ascending: lower is better)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RankDimension {
    Duration,
    Memory,
    GcCount,
}

impl RankDimension {
    pub const ALL: [RankDimension; 3] = [
        RankDimension::Duration,
        RankDimension::Memory,
        RankDimension::GcCount,
    ];

    fn key(self, result: &BenchmarkResult) -> u128 {
        match self {
            RankDimension::Duration => result.duration.as_nanos(),
            RankDimension::Memory => result.memory_allocated as u128,
            RankDimension::GcCount => result.num_gc as u128,
        }
    }

    fn best_title(self) -> &'static str {
        match self {
            RankDimension::Duration => "Fastest Configurations",
            RankDimension::Memory => "Lowest Memory Usage",
            RankDimension::GcCount => "Fewest Collection Cycles",
        }
    }

    fn worst_title(self) -> &'static str {
        match self {
            RankDimension::Duration => "Slowest Configurations",
            RankDimension::Memory => "Highest Memory Usage",
            RankDimension::GcCount => "Most Collection Cycles",
        }
    }
}

/// Successful results ordered by `dimension`, ties kept in input order
pub fn rank(results: &[BenchmarkResult], dimension: RankDimension) -> Vec<&BenchmarkResult> {
    let mut ranked: Vec<&BenchmarkResult> = results.iter().filter(|r| r.is_success()).collect();
    ranked.sort_by_key(|r| dimension.key(r));
    ranked
}

/// Executive summary over the whole result set
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Summary {
    pub total_runs: usize,
    pub successful_runs: usize,
    pub failed_runs: usize,
    #[serde(default)]
    pub mean_duration_ns: Option<u64>,
    #[serde(default)]
    pub mean_memory_allocated: Option<f64>,
    #[serde(default)]
    pub mean_gc_count: Option<f64>,
}

impl Summary {
    pub fn from_results(results: &[BenchmarkResult]) -> Self {
        let successes: Vec<&BenchmarkResult> = results.iter().filter(|r| r.is_success()).collect();

        let durations: Vec<Duration> = successes.iter().map(|r| r.duration).collect();
        let memory: Vec<f64> = successes.iter().map(|r| r.memory_allocated as f64).collect();
        let gc: Vec<f64> = successes.iter().map(|r| r.num_gc as f64).collect();

        Self {
            total_runs: results.len(),
            successful_runs: successes.len(),
            failed_runs: results.len() - successes.len(),
            mean_duration_ns: mean_duration(&durations).map(|d| d.as_nanos() as u64),
            mean_memory_allocated: mean(&memory),
            mean_gc_count: mean(&gc),
        }
    }
}

/// One line of a ranked table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedEntry {
    pub rank: usize,
    pub config_name: String,
    #[serde(with = "crate::utils::duration_nanos")]
    pub duration: Duration,
    pub memory_allocated: u64,
    pub num_gc: u32,
}

impl RankedEntry {
    fn new(rank: usize, result: &BenchmarkResult) -> Self {
        Self {
            rank,
            config_name: result.config.name.clone(),
            duration: result.duration,
            memory_allocated: result.memory_allocated,
            num_gc: result.num_gc,
        }
    }
}

/// Best and worst entries along one dimension
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ranking {
    pub dimension: RankDimension,
    pub best: Vec<RankedEntry>,
    /// Worst first: rank 1 is the single worst result
    pub worst: Vec<RankedEntry>,
}

impl Ranking {
    pub fn build(results: &[BenchmarkResult], dimension: RankDimension, top_n: usize) -> Self {
        let ranked = rank(results, dimension);

        let best = ranked
            .iter()
            .take(top_n)
            .enumerate()
            .map(|(i, r)| RankedEntry::new(i + 1, r))
            .collect();
        let worst = ranked
            .iter()
            .rev()
            .take(top_n)
            .enumerate()
            .map(|(i, r)| RankedEntry::new(i + 1, r))
            .collect();

        Self {
            dimension,
            best,
            worst,
        }
    }
}

/// Rankings for the results of one task
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskBreakdown {
    pub task: String,
    #[serde(default)]
    pub description: String,
    pub total_runs: usize,
    pub successful_runs: usize,
    pub rankings: Vec<Ranking>,
}

/// Results grouped per task, groups in order of first appearance
pub fn group_by_task(
    results: &[BenchmarkResult],
    options: &ReportOptions,
) -> Vec<(String, Vec<BenchmarkResult>)> {
    let mut groups: Vec<(String, Vec<BenchmarkResult>)> = Vec::new();

    for (index, result) in results.iter().enumerate() {
        let task = if result.task.is_empty() {
            positional_task(index, options)
        } else {
            result.task.clone()
        };

        match groups.iter_mut().find(|(name, _)| *name == task) {
            Some((_, group)) => group.push(result.clone()),
            None => groups.push((task, vec![result.clone()])),
        }
    }

    groups
}

fn positional_task(index: usize, options: &ReportOptions) -> String {
    if options.block_size == 0 {
        return "All Tasks".to_string();
    }
    let block = index / options.block_size;
    if options.task_order.is_empty() {
        return format!("Task {}", block + 1);
    }
    options.task_order[block % options.task_order.len()].clone()
}

/// Tunable knob a recommendation is about
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TunableDimension {
    Parallelism,
    MemoryLimit,
    Collector,
}

impl TunableDimension {
    pub const ALL: [TunableDimension; 3] = [
        TunableDimension::Parallelism,
        TunableDimension::MemoryLimit,
        TunableDimension::Collector,
    ];

    fn prefix(self) -> &'static str {
        match self {
            TunableDimension::Parallelism => PARALLELISM_PREFIX,
            TunableDimension::MemoryLimit => MEMORY_LIMIT_PREFIX,
            TunableDimension::Collector => GC_PREFIX,
        }
    }

    /// Metric the best setting of this knob is judged by
    pub fn judged_by(self) -> RankDimension {
        match self {
            TunableDimension::Parallelism => RankDimension::Duration,
            TunableDimension::MemoryLimit => RankDimension::Memory,
            TunableDimension::Collector => RankDimension::Duration,
        }
    }

    fn title(self) -> &'static str {
        match self {
            TunableDimension::Parallelism => "Parallelism Hint",
            TunableDimension::MemoryLimit => "Memory Ceiling",
            TunableDimension::Collector => "Collector Aggressiveness",
        }
    }

    fn setting(self, config: &RuntimeConfiguration) -> String {
        match self {
            TunableDimension::Parallelism => format!("{} threads", config.parallelism_label()),
            TunableDimension::MemoryLimit => format!("{}MiB", config.memory_limit_mb),
            TunableDimension::Collector => format!("gc percent {}", config.gc_label()),
        }
    }

    fn guidance(self) -> &'static [&'static str] {
        match self {
            TunableDimension::Parallelism => &[
                "More threads generally help CPU-bound workloads",
                "Returns diminish once the thread count exceeds the useful parallelism of the workload",
            ],
            TunableDimension::MemoryLimit => &[
                "A memory ceiling makes the collector more aggressive as the heap approaches it",
                "Set it a little below the container or host limit to avoid out-of-memory kills",
            ],
            TunableDimension::Collector => &[
                "Lower percentages collect more often and keep the heap smaller",
                "Higher percentages collect less often at the cost of a larger heap",
                "The default of 100 is a balanced starting point for most workloads",
            ],
        }
    }
}

/// Empirically best setting of one knob
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecommendedSetting {
    pub config_name: String,
    pub setting: String,
    #[serde(with = "crate::utils::duration_nanos")]
    pub duration: Duration,
    pub memory_allocated: u64,
    pub num_gc: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    pub dimension: TunableDimension,
    /// `None` when no successful result varied this knob
    pub best: Option<RecommendedSetting>,
    pub guidance: Vec<String>,
}

impl Recommendation {
    pub fn build(results: &[BenchmarkResult], dimension: TunableDimension) -> Self {
        let candidates: Vec<BenchmarkResult> = results
            .iter()
            .filter(|r| r.config.name.starts_with(dimension.prefix()))
            .cloned()
            .collect();

        let best = rank(&candidates, dimension.judged_by())
            .first()
            .map(|r| RecommendedSetting {
                config_name: r.config.name.clone(),
                setting: dimension.setting(&r.config),
                duration: r.duration,
                memory_allocated: r.memory_allocated,
                num_gc: r.num_gc,
            });

        Self {
            dimension,
            best,
            guidance: dimension.guidance().iter().map(|s| s.to_string()).collect(),
        }
    }
}

/// One line of the raw data table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataRow {
    pub task: String,
    pub config: RuntimeConfiguration,
    #[serde(with = "crate::utils::duration_nanos")]
    pub duration: Duration,
    pub memory_allocated: u64,
    pub num_gc: u32,
    pub pause_time_ns: u64,
    pub exit_code: Option<i32>,
    pub passed: bool,
    pub error: String,
}

/// Fastest, leanest and least-collected configurations of a run
#[derive(Debug, Clone, PartialEq)]
pub struct BestConfigurations {
    pub fastest: Option<(String, Duration)>,
    pub lowest_memory: Option<(String, u64)>,
    pub fewest_gc: Option<(String, u32)>,
}

impl BestConfigurations {
    pub fn from_results(results: &[BenchmarkResult]) -> Self {
        Self {
            fastest: rank(results, RankDimension::Duration)
                .first()
                .map(|r| (r.config.name.clone(), r.duration)),
            lowest_memory: rank(results, RankDimension::Memory)
                .first()
                .map(|r| (r.config.name.clone(), r.memory_allocated)),
            fewest_gc: rank(results, RankDimension::GcCount)
                .first()
                .map(|r| (r.config.name.clone(), r.num_gc)),
        }
    }
}

/// The complete comparative report
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Report {
    pub generated_at: chrono::DateTime<chrono::Utc>,
    pub summary: Summary,
    pub tasks: Vec<TaskBreakdown>,
    pub recommendations: Vec<Recommendation>,
    pub rows: Vec<DataRow>,
}

impl Report {
    pub fn build(results: &[BenchmarkResult], options: &ReportOptions) -> Self {
        let tasks = group_by_task(results, options)
            .into_iter()
            .map(|(task, group)| TaskBreakdown {
                description: options.descriptions.get(&task).cloned().unwrap_or_default(),
                total_runs: group.len(),
                successful_runs: group.iter().filter(|r| r.is_success()).count(),
                rankings: RankDimension::ALL
                    .iter()
                    .map(|&d| Ranking::build(&group, d, options.top_n))
                    .collect(),
                task,
            })
            .collect();

        let rows = results
            .iter()
            .enumerate()
            .map(|(index, r)| DataRow {
                task: if r.task.is_empty() {
                    positional_task(index, options)
                } else {
                    r.task.clone()
                },
                config: r.config.clone(),
                duration: r.duration,
                memory_allocated: r.memory_allocated,
                num_gc: r.num_gc,
                pause_time_ns: r.pause_time_ns,
                exit_code: r.exit_code,
                passed: r.is_success(),
                error: r.error.clone(),
            })
            .collect();

        Self {
            generated_at: chrono::Utc::now(),
            summary: Summary::from_results(results),
            tasks,
            recommendations: TunableDimension::ALL
                .iter()
                .map(|&d| Recommendation::build(results, d))
                .collect(),
            rows,
        }
    }

    /// Render the report as a Markdown document
    pub fn render_markdown(&self) -> String {
        let mut out = String::new();
        // Writing into a String cannot fail.
        let _ = self.write_markdown(&mut out);
        out
    }

    fn write_markdown(&self, out: &mut String) -> std::fmt::Result {
        writeln!(out, "# Runtime Tuning Benchmark Report\n")?;
        writeln!(
            out,
            "Generated: {}\n",
            self.generated_at.format("%a, %d %b %Y %H:%M:%S UTC")
        )?;
        writeln!(out, "- **Tasks**: {}", self.tasks.len())?;
        writeln!(out, "- **Benchmark Runs**: {}\n", self.summary.total_runs)?;

        writeln!(out, "## Tunable Runtime Knobs\n")?;
        writeln!(
            out,
            "- **Parallelism hint**: maximum OS threads the worker runtime may run at once (default: all cores)"
        )?;
        writeln!(
            out,
            "- **Memory ceiling**: soft heap limit; the collector works harder as the heap approaches it (default: none)"
        )?;
        writeln!(
            out,
            "- **Collector aggressiveness**: heap growth percentage that triggers a collection; negative disables collection (default: 100)\n"
        )?;

        writeln!(out, "## Executive Summary\n")?;
        write_summary(out, &self.summary)?;
        writeln!(out)?;

        if self.tasks.is_empty() {
            writeln!(out, "## Per-Task Analysis\n")?;
            writeln!(out, "No data available for per-task analysis.\n")?;
        }
        for task in &self.tasks {
            writeln!(out, "## Task: {}\n", task.task)?;
            if !task.description.is_empty() {
                writeln!(out, "{}\n", task.description)?;
            }
            writeln!(
                out,
                "{} of {} runs succeeded.\n",
                task.successful_runs, task.total_runs
            )?;
            for ranking in &task.rankings {
                write_ranking(out, ranking)?;
            }
        }

        writeln!(out, "## Recommendations\n")?;
        for recommendation in &self.recommendations {
            write_recommendation(out, recommendation)?;
        }

        writeln!(out, "## Complete Results\n")?;
        write_data_table(out, &self.rows)?;
        Ok(())
    }

    /// Write the Markdown rendering to `path`
    pub fn write_markdown_file(&self, path: &Path) -> Result<()> {
        std::fs::write(path, self.render_markdown())
            .with_context(|| format!("Failed to write report to {:?}", path))
    }

    /// Write the report data as JSON to `path`
    pub fn write_json_file(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self).context("Failed to encode report")?;
        std::fs::write(path, json)
            .with_context(|| format!("Failed to write report data to {:?}", path))
    }
}

fn write_summary(out: &mut String, summary: &Summary) -> std::fmt::Result {
    if summary.total_runs == 0 {
        writeln!(out, "No results available.\n")?;
    }
    writeln!(out, "- **Total Runs**: {}", summary.total_runs)?;
    writeln!(out, "- **Successful Runs**: {}", summary.successful_runs)?;
    writeln!(out, "- **Failed Runs**: {}", summary.failed_runs)?;

    if let Some(ns) = summary.mean_duration_ns {
        writeln!(
            out,
            "- **Average Duration**: {}",
            format_duration(Duration::from_nanos(ns))
        )?;
    }
    if let Some(memory) = summary.mean_memory_allocated {
        writeln!(out, "- **Average Memory**: {:.2} MB", bytes_to_megabytes(memory))?;
    }
    if let Some(gc) = summary.mean_gc_count {
        writeln!(out, "- **Average GC Runs**: {:.1}", gc)?;
    }
    Ok(())
}

fn write_ranking(out: &mut String, ranking: &Ranking) -> std::fmt::Result {
    for (title, entries) in [
        (ranking.dimension.best_title(), &ranking.best),
        (ranking.dimension.worst_title(), &ranking.worst),
    ] {
        writeln!(out, "### {}\n", title)?;
        if entries.is_empty() {
            writeln!(out, "No data\n")?;
            continue;
        }
        writeln!(out, "| Rank | Configuration | Duration | Memory (MB) | GC Runs |")?;
        writeln!(out, "|------|---------------|----------|-------------|---------|")?;
        for entry in entries {
            writeln!(
                out,
                "| {} | {} | {} | {} | {} |",
                entry.rank,
                entry.config_name,
                format_duration(entry.duration),
                format_megabytes(entry.memory_allocated),
                entry.num_gc
            )?;
        }
        writeln!(out)?;
    }
    Ok(())
}

fn write_recommendation(out: &mut String, recommendation: &Recommendation) -> std::fmt::Result {
    writeln!(out, "### {}\n", recommendation.dimension.title())?;
    match &recommendation.best {
        Some(best) => writeln!(
            out,
            "- **Best tested setting**: {} via `{}` (Duration: {}, Memory: {} MB, GC runs: {})",
            best.setting,
            best.config_name,
            format_duration(best.duration),
            format_megabytes(best.memory_allocated),
            best.num_gc
        )?,
        None => writeln!(
            out,
            "- Insufficient data to analyze the {} impact.",
            recommendation.dimension.title().to_lowercase()
        )?,
    }
    for line in &recommendation.guidance {
        writeln!(out, "- {}", line)?;
    }
    writeln!(out)
}

fn write_data_table(out: &mut String, rows: &[DataRow]) -> std::fmt::Result {
    if rows.is_empty() {
        return writeln!(out, "No data");
    }
    writeln!(
        out,
        "| Task | Configuration | Parallelism | Memory Limit | GC % | Duration | Memory (MB) | GC Runs | Status |"
    )?;
    writeln!(
        out,
        "|------|---------------|-------------|--------------|------|----------|-------------|---------|--------|"
    )?;
    for row in rows {
        writeln!(
            out,
            "| {} | {} | {} | {} | {} | {} | {} | {} | {} |",
            row.task,
            row.config.name,
            row.config.parallelism_label(),
            row.config.memory_limit_label(),
            row.config.gc_label(),
            format_duration(row.duration),
            format_megabytes(row.memory_allocated),
            row.num_gc,
            if row.passed { "✓" } else { "✗" }
        )?;
    }
    Ok(())
}
