//! # Fatal Error Taxonomy
//!
//! Only configuration problems and final-write failures halt the harness.
//! Everything that can go wrong inside a single matrix cell is recorded as
//! data on its `BenchmarkResult` instead, so it never shows up here.

use std::path::PathBuf;
use thiserror::Error;

/// Configuration errors detected before any worker is launched.
#[derive(Debug, Error)]
pub enum HarnessError {
    /// A task filter named a workload that is not part of the task list.
    #[error("Unknown task: {name} (known tasks: {known})")]
    UnknownTask { name: String, known: String },

    /// A persisted result set could not be read or parsed.
    #[error("Invalid results file {path:?}: {reason}")]
    InvalidResults { path: PathBuf, reason: String },

    /// A user-supplied task list could not be read or parsed.
    #[error("Invalid tasks file {path:?}: {reason}")]
    InvalidTasks { path: PathBuf, reason: String },

    /// The task list or configuration matrix ended up empty.
    #[error("Nothing to benchmark: {0}")]
    EmptyMatrix(&'static str),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_task_message_lists_known_tasks() {
        let err = HarnessError::UnknownTask {
            name: "compile".to_string(),
            known: "code-gen, file-search".to_string(),
        };
        let message = err.to_string();
        assert!(message.contains("compile"));
        assert!(message.contains("code-gen, file-search"));
    }
}
