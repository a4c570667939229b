//! # Runtime Tuning Probe
//!
//! A synthetic worker for exercising the harness end to end. It pushes a
//! number of work items through a thread pool sized by the parallelism knob,
//! keeps the buffers they return as garbage and lets the simulated collector
//! decide when to drop them. Real allocation volume comes from a counting
//! global allocator; collection counts come from the collector model and are
//! therefore stable for a given configuration.

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use crossbeam::channel;
use std::alloc::{GlobalAlloc, Layout, System};
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread;
use std::time::Instant;
use tracing::{debug, info};
use tuning_bench::{
    cli::ProbeArgs,
    config::EnvOverrideNames,
    logging::init_logging,
    metrics::MetricsRecorder,
    probe::{ProbeSettings, SimulatedCollector},
};

static ALLOCATED_BYTES: AtomicU64 = AtomicU64::new(0);
static LIVE_BYTES: AtomicU64 = AtomicU64::new(0);

/// Global allocator wrapper that counts allocated and live bytes.
struct CountingAlloc;

// SAFETY: Delegates all allocation/deallocation to the System allocator and
// only touches atomics besides.
unsafe impl GlobalAlloc for CountingAlloc {
    unsafe fn alloc(&self, layout: Layout) -> *mut u8 {
        // SAFETY: Forwarding to System allocator with the same layout.
        let ptr = unsafe { System.alloc(layout) };
        if !ptr.is_null() {
            ALLOCATED_BYTES.fetch_add(layout.size() as u64, Ordering::Relaxed);
            LIVE_BYTES.fetch_add(layout.size() as u64, Ordering::Relaxed);
        }
        ptr
    }

    unsafe fn dealloc(&self, ptr: *mut u8, layout: Layout) {
        // SAFETY: ptr was allocated by System.alloc with the same layout.
        unsafe { System.dealloc(ptr, layout) };
        LIVE_BYTES.fetch_sub(layout.size() as u64, Ordering::Relaxed);
    }
}

#[global_allocator]
static ALLOCATOR: CountingAlloc = CountingAlloc;

/// One work item: build a chunk with a job-dependent pattern
fn fill_chunk(job: usize, size: usize) -> Vec<u8> {
    let mut chunk = vec![0u8; size];
    for (i, byte) in chunk.iter_mut().enumerate() {
        *byte = (job.wrapping_mul(31).wrapping_add(i) % 251) as u8;
    }
    chunk
}

fn main() -> Result<()> {
    let args = ProbeArgs::parse();
    let _log_guard = init_logging(0, false, None)?;

    let settings = ProbeSettings::from_env(&EnvOverrideNames::default());
    let threads = settings.worker_threads();
    let chunk_size = args.chunk_kb.max(1) * 1024;
    debug!("Probe settings: {:?}, {} threads", settings, threads);

    let allocated_at_start = ALLOCATED_BYTES.load(Ordering::Relaxed);
    let mut recorder = MetricsRecorder::start();
    let mut collector = SimulatedCollector::new(&settings, chunk_size as u64);

    let (job_tx, job_rx) = channel::unbounded::<usize>();
    let (done_tx, done_rx) = channel::unbounded::<Vec<u8>>();

    let workers: Vec<_> = (0..threads)
        .map(|_| {
            let jobs = job_rx.clone();
            let done = done_tx.clone();
            thread::spawn(move || {
                for job in jobs {
                    if done.send(fill_chunk(job, chunk_size)).is_err() {
                        break;
                    }
                }
            })
        })
        .collect();
    drop(done_tx);

    for job in 0..args.rounds {
        job_tx.send(job).context("Thread pool stopped accepting work")?;
    }
    drop(job_tx);

    let mut garbage: Vec<Vec<u8>> = Vec::new();
    let mut checksum: u64 = 0;
    for chunk in done_rx {
        checksum = chunk
            .iter()
            .fold(checksum, |sum, byte| sum.wrapping_add(*byte as u64));
        recorder.record_task_completed();
        garbage.push(chunk);

        if collector.allocate(chunk_size as u64) {
            let pause = Instant::now();
            garbage.clear();
            collector.collect();
            recorder.record_collection(pause.elapsed());
        }
    }

    for worker in workers {
        worker
            .join()
            .map_err(|_| anyhow!("Probe worker thread panicked"))?;
    }

    recorder.record_allocation(ALLOCATED_BYTES.load(Ordering::Relaxed) - allocated_at_start);
    recorder.metrics_mut().set_counter("checksum", checksum);
    recorder.metrics_mut().set_counter("rounds", args.rounds as u64);
    let metrics = recorder.finish(LIVE_BYTES.load(Ordering::Relaxed), threads as u64);

    info!(
        "Probe finished: {} rounds, {} collections, {} bytes allocated",
        args.rounds, metrics.num_gc, metrics.memory_allocated
    );

    if !args.skip_metrics {
        if let Some(path) = &args.metrics_output {
            metrics.write_to_file(path)?;
        }
    }

    if args.exit_code != 0 {
        std::process::exit(args.exit_code);
    }
    Ok(())
}
