//! Settings and collector model for the `tuning-probe` worker
//!
//! The probe stands in for a real worker: it reads the same three knobs the
//! harness sets and models a pacing collector over the garbage its workload
//! produces. Collection decisions depend only on the allocation sequence and
//! the knobs, so a given configuration always reports the same collection
//! count.

use crate::config::{EnvOverrideNames, DEFAULT_GC_PERCENT};

/// Smallest heap goal at the default collector percentage
pub const MIN_HEAP_GOAL: u64 = 4 * 1024 * 1024;

/// Knob values as the probe sees them in its environment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeSettings {
    /// Worker threads; 0 means "use every core"
    pub parallelism: usize,
    /// Soft memory ceiling in bytes
    pub memory_limit: Option<u64>,
    /// Collector percentage; negative disables pacing
    pub gc_percent: i32,
}

impl Default for ProbeSettings {
    fn default() -> Self {
        Self {
            parallelism: 0,
            memory_limit: None,
            gc_percent: DEFAULT_GC_PERCENT,
        }
    }
}

impl ProbeSettings {
    /// Read the knobs from the process environment
    pub fn from_env(names: &EnvOverrideNames) -> Self {
        Self::from_lookup(names, |key| std::env::var(key).ok())
    }

    /// Read the knobs through `lookup`; unparsable values fall back to defaults
    pub fn from_lookup<F>(names: &EnvOverrideNames, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut settings = Self::default();

        if let Some(value) = lookup(&names.parallelism) {
            settings.parallelism = value.trim().parse().unwrap_or(0);
        }
        if let Some(value) = lookup(&names.memory_limit) {
            settings.memory_limit = parse_memory_limit(&value);
        }
        if let Some(value) = lookup(&names.gc_percent) {
            let value = value.trim();
            settings.gc_percent = if value.eq_ignore_ascii_case("off") {
                -1
            } else {
                value.parse().unwrap_or(DEFAULT_GC_PERCENT)
            };
        }

        settings
    }

    /// Thread count to actually run with
    pub fn worker_threads(&self) -> usize {
        if self.parallelism > 0 {
            self.parallelism
        } else {
            num_cpus::get().max(1)
        }
    }
}

/// Parse a memory limit such as `256MiB`, `1GiB`, `512KiB` or plain bytes
pub fn parse_memory_limit(value: &str) -> Option<u64> {
    let value = value.trim();
    let units: [(&str, u64); 5] = [
        ("TiB", 1 << 40),
        ("GiB", 1 << 30),
        ("MiB", 1 << 20),
        ("KiB", 1 << 10),
        ("B", 1),
    ];

    let (digits, scale) = units
        .iter()
        .find_map(|(suffix, scale)| value.strip_suffix(suffix).map(|d| (d, *scale)))
        .unwrap_or((value, 1));

    let amount: u64 = digits.trim().parse().ok()?;
    amount.checked_mul(scale).filter(|bytes| *bytes > 0)
}

/// Pacing collector over a simulated heap
///
/// Live bytes grow with every allocation. A collection is due when live
/// bytes pass the heap goal, which is the live size after the previous
/// collection grown by the collector percentage, or when they pass the
/// memory ceiling. With a negative percentage only the ceiling applies.
#[derive(Debug, Clone)]
pub struct SimulatedCollector {
    gc_percent: i32,
    memory_limit: Option<u64>,
    retained: u64,
    live: u64,
    goal: Option<u64>,
}

impl SimulatedCollector {
    /// `retained` is the live size that survives every collection
    pub fn new(settings: &ProbeSettings, retained: u64) -> Self {
        let mut collector = Self {
            gc_percent: settings.gc_percent,
            memory_limit: settings.memory_limit,
            retained,
            live: retained,
            goal: None,
        };
        collector.goal = collector.next_goal();
        collector
    }

    fn next_goal(&self) -> Option<u64> {
        if self.gc_percent < 0 {
            return None;
        }
        let percent = self.gc_percent as u64;
        let floor = MIN_HEAP_GOAL * percent / 100;
        let grown = self.retained + self.retained * percent / 100;
        Some(floor.max(grown).max(1))
    }

    /// Account for `bytes` of new garbage; returns true when a collection is due
    pub fn allocate(&mut self, bytes: u64) -> bool {
        self.live += bytes;
        let over_goal = self.goal.is_some_and(|goal| self.live > goal);
        let over_limit = self.memory_limit.is_some_and(|limit| self.live > limit);
        over_goal || over_limit
    }

    /// Reset the heap to its retained size after a collection
    pub fn collect(&mut self) {
        self.live = self.retained;
        self.goal = self.next_goal();
    }

    pub fn live_bytes(&self) -> u64 {
        self.live
    }

    pub fn heap_goal(&self) -> Option<u64> {
        self.goal
    }
}
