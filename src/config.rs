//! # Runtime Configuration Matrix
//!
//! A `RuntimeConfiguration` is one point in the tuning matrix: a label plus
//! the three knobs the harness can turn on a worker runtime (parallelism hint,
//! soft memory ceiling and collector aggressiveness). The default matrix is a
//! fixed, ordered list known at build time. Order matters: reports that have
//! to infer task boundaries from position assume one block per task.
//!
//! ## Environment Overrides
//!
//! Knobs reach the worker only through its process environment, and only when
//! they differ from the runtime default. A configuration with every field at
//! its default launches the worker with the parent's environment untouched.

use serde::{Deserialize, Serialize};

/// Name prefix shared by configurations that vary only the parallelism hint
pub const PARALLELISM_PREFIX: &str = "maxprocs-";

/// Name prefix shared by configurations that vary only the memory ceiling
pub const MEMORY_LIMIT_PREFIX: &str = "memlimit-";

/// Name prefix shared by configurations that vary only the collector percentage
pub const GC_PREFIX: &str = "gc-";

/// Collector percentage the worker runtime uses when nothing is set
pub const DEFAULT_GC_PERCENT: i32 = 100;

/// One point in the tuning matrix
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuntimeConfiguration {
    /// Unique label, also used for recommendation grouping by prefix
    pub name: String,

    /// Maximum OS threads for the worker (0 = runtime default)
    pub parallelism: u32,

    /// Soft memory ceiling in mebibytes (0 = no limit)
    pub memory_limit_mb: u64,

    /// Heap growth percentage before a collection cycle
    ///
    /// 100 is the runtime default, any negative value disables the collector.
    pub gc_percent: i32,
}

impl RuntimeConfiguration {
    pub fn new(name: &str, parallelism: u32, memory_limit_mb: u64, gc_percent: i32) -> Self {
        Self {
            name: name.to_string(),
            parallelism,
            memory_limit_mb,
            gc_percent,
        }
    }

    /// True when the configuration leaves every knob at the runtime default
    pub fn is_baseline(&self) -> bool {
        self.parallelism == 0
            && self.memory_limit_mb == 0
            && self.gc_percent == DEFAULT_GC_PERCENT
    }

    /// True when the collector is switched off entirely
    pub fn gc_disabled(&self) -> bool {
        self.gc_percent < 0
    }

    /// Environment variables the worker needs for this configuration
    ///
    /// Only non-default fields produce a variable. The memory ceiling is
    /// expressed as an integer followed by the `MiB` unit marker.
    pub fn env_overrides(&self, names: &EnvOverrideNames) -> Vec<(String, String)> {
        let mut overrides = Vec::new();

        if self.parallelism > 0 {
            overrides.push((names.parallelism.clone(), self.parallelism.to_string()));
        }
        if self.memory_limit_mb > 0 {
            overrides.push((
                names.memory_limit.clone(),
                format!("{}MiB", self.memory_limit_mb),
            ));
        }
        if self.gc_percent != DEFAULT_GC_PERCENT {
            overrides.push((names.gc_percent.clone(), self.gc_percent.to_string()));
        }

        overrides
    }

    /// Human readable parallelism column ("default" when unset)
    pub fn parallelism_label(&self) -> String {
        if self.parallelism > 0 {
            self.parallelism.to_string()
        } else {
            "default".to_string()
        }
    }

    /// Human readable memory ceiling column ("-" when unset)
    pub fn memory_limit_label(&self) -> String {
        if self.memory_limit_mb > 0 {
            format!("{}MB", self.memory_limit_mb)
        } else {
            "-".to_string()
        }
    }

    /// Human readable collector column ("off" when disabled)
    pub fn gc_label(&self) -> String {
        if self.gc_disabled() {
            "off".to_string()
        } else {
            self.gc_percent.to_string()
        }
    }
}

impl std::fmt::Display for RuntimeConfiguration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} (parallelism: {}, memory limit: {}, gc: {})",
            self.name,
            self.parallelism_label(),
            self.memory_limit_label(),
            self.gc_label()
        )
    }
}

/// Names of the environment variables the worker runtime reads its knobs from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvOverrideNames {
    pub parallelism: String,
    pub memory_limit: String,
    pub gc_percent: String,
}

impl Default for EnvOverrideNames {
    fn default() -> Self {
        Self {
            parallelism: crate::defaults::PARALLELISM_VAR.to_string(),
            memory_limit: crate::defaults::MEMORY_LIMIT_VAR.to_string(),
            gc_percent: crate::defaults::GC_PERCENT_VAR.to_string(),
        }
    }
}

/// The fixed, ordered configuration matrix
pub fn default_matrix() -> Vec<RuntimeConfiguration> {
    vec![
        RuntimeConfiguration::new("default", 0, 0, 100),
        RuntimeConfiguration::new("maxprocs-1", 1, 0, 100),
        RuntimeConfiguration::new("maxprocs-2", 2, 0, 100),
        RuntimeConfiguration::new("maxprocs-4", 4, 0, 100),
        RuntimeConfiguration::new("maxprocs-8", 8, 0, 100),
        RuntimeConfiguration::new("memlimit-256", 0, 256, 100),
        RuntimeConfiguration::new("memlimit-512", 0, 512, 100),
        RuntimeConfiguration::new("memlimit-1024", 0, 1024, 100),
        RuntimeConfiguration::new("gc-50", 0, 0, 50),
        RuntimeConfiguration::new("gc-200", 0, 0, 200),
        RuntimeConfiguration::new("gc-off", 0, 0, -1),
        RuntimeConfiguration::new("constrained", 2, 256, 50),
        RuntimeConfiguration::new("performance", 8, 2048, 200),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_default_matrix_names_are_unique() {
        let matrix = default_matrix();
        let names: HashSet<_> = matrix.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names.len(), matrix.len());
        assert_eq!(matrix.len(), crate::defaults::MATRIX_SIZE);
        assert_eq!(matrix[0].name, "default");
        assert!(matrix[0].is_baseline());
    }

    #[test]
    fn test_baseline_has_no_overrides() {
        let cfg = RuntimeConfiguration::new("default", 0, 0, 100);
        assert!(cfg.env_overrides(&EnvOverrideNames::default()).is_empty());
    }

    #[test]
    fn test_memory_limit_override_uses_mebibytes() {
        let cfg = RuntimeConfiguration::new("memlimit-512", 0, 512, 100);
        let overrides = cfg.env_overrides(&EnvOverrideNames::default());
        assert_eq!(
            overrides,
            vec![("GOMEMLIMIT".to_string(), "512MiB".to_string())]
        );
    }

    #[test]
    fn test_combined_overrides_follow_field_order() {
        let cfg = RuntimeConfiguration::new("constrained", 2, 256, 50);
        let names = EnvOverrideNames {
            parallelism: "THREADS".to_string(),
            memory_limit: "HEAP_CAP".to_string(),
            gc_percent: "GC_PCT".to_string(),
        };
        let keys: Vec<_> = cfg
            .env_overrides(&names)
            .into_iter()
            .map(|(k, _)| k)
            .collect();
        assert_eq!(keys, vec!["THREADS", "HEAP_CAP", "GC_PCT"]);
    }

    #[test]
    fn test_disabled_collector() {
        let cfg = RuntimeConfiguration::new("gc-off", 0, 0, -1);
        assert!(cfg.gc_disabled());
        assert_eq!(cfg.gc_label(), "off");
        assert_eq!(
            cfg.env_overrides(&EnvOverrideNames::default()),
            vec![("GOGC".to_string(), "-1".to_string())]
        );
    }

    #[test]
    fn test_labels() {
        let cfg = RuntimeConfiguration::new("performance", 8, 2048, 200);
        assert_eq!(cfg.parallelism_label(), "8");
        assert_eq!(cfg.memory_limit_label(), "2048MB");
        let baseline = RuntimeConfiguration::new("default", 0, 0, 100);
        assert_eq!(baseline.parallelism_label(), "default");
        assert_eq!(baseline.memory_limit_label(), "-");
    }
}
