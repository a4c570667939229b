//! # Worker Tasks
//!
//! A `WorkerTask` names one benchmarked workload and the external command
//! that runs it. The harness never looks inside a worker; it only relies on
//! the worker CLI contract (accept `--metrics-output=<path>`, write metrics
//! there on success).
//!
//! The built-in set holds the four synthetic coding workloads. A JSON tasks
//! file can replace it entirely, which is how the integration tests and
//! alternative worker builds are plugged in.

use crate::error::HarnessError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// Selection value that keeps every task
pub const ALL_TASKS: &str = "all";

/// One benchmarked workload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerTask {
    pub name: String,
    pub command: String,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default)]
    pub description: String,
}

impl WorkerTask {
    pub fn new(name: &str, command: &str, args: &[&str], description: &str) -> Self {
        Self {
            name: name.to_string(),
            command: command.to_string(),
            args: args.iter().map(|a| a.to_string()).collect(),
            description: description.to_string(),
        }
    }
}

/// Task names of the built-in set, in matrix order
pub const DEFAULT_TASK_NAMES: [&str; 4] = ["code-gen", "file-search", "refactor", "ast-parser"];

/// The four built-in workloads
///
/// Worker executables are resolved inside `worker_dir`; the workloads that
/// read source files are pointed at `fixtures_dir`.
pub fn default_tasks(worker_dir: &Path, fixtures_dir: &Path) -> Vec<WorkerTask> {
    let worker = |bin: &str| worker_dir.join(bin).to_string_lossy().into_owned();
    let fixtures = fixtures_dir.to_string_lossy();

    vec![
        WorkerTask {
            name: DEFAULT_TASK_NAMES[0].to_string(),
            command: worker("code-generator"),
            args: vec!["--files=10".to_string(), "--lines=100".to_string()],
            description: "Generate 10 source files with 100 lines each".to_string(),
        },
        WorkerTask {
            name: DEFAULT_TASK_NAMES[1].to_string(),
            command: worker("file-searcher"),
            args: vec!["--pattern=func".to_string(), format!("--dir={}", fixtures)],
            description: "Search for 'func' pattern in the fixture tree".to_string(),
        },
        WorkerTask {
            name: DEFAULT_TASK_NAMES[2].to_string(),
            command: worker("refactor"),
            args: vec![
                format!("--target={}", fixtures),
                "--operation=rename".to_string(),
            ],
            description: "Rename identifiers across multiple files".to_string(),
        },
        WorkerTask {
            name: DEFAULT_TASK_NAMES[3].to_string(),
            command: worker("ast-parser"),
            args: vec![format!("--target={}", fixtures)],
            description: "Parse source files and extract syntax tree information (memory-intensive)"
                .to_string(),
        },
    ]
}

/// Descriptions of the built-in workloads, keyed by task name
pub fn default_descriptions() -> BTreeMap<String, String> {
    default_tasks(Path::new(""), Path::new(""))
        .into_iter()
        .map(|task| (task.name, task.description))
        .collect()
}

/// Load a task list from a JSON array of `WorkerTask`
pub fn load_tasks_file(path: &Path) -> Result<Vec<WorkerTask>, HarnessError> {
    let invalid = |reason: String| HarnessError::InvalidTasks {
        path: path.to_path_buf(),
        reason,
    };

    let data = std::fs::read_to_string(path).map_err(|e| invalid(e.to_string()))?;
    let tasks: Vec<WorkerTask> = serde_json::from_str(&data).map_err(|e| invalid(e.to_string()))?;

    if tasks.is_empty() {
        return Err(invalid("task list is empty".to_string()));
    }
    Ok(tasks)
}

/// Keep only the task named `selection`, or everything for [`ALL_TASKS`]
///
/// A name that matches nothing is a configuration error: no matrix runs.
pub fn filter_tasks(
    tasks: Vec<WorkerTask>,
    selection: &str,
) -> Result<Vec<WorkerTask>, HarnessError> {
    if selection == ALL_TASKS {
        return Ok(tasks);
    }

    let known = tasks
        .iter()
        .map(|t| t.name.as_str())
        .collect::<Vec<_>>()
        .join(", ");
    let filtered: Vec<WorkerTask> = tasks.into_iter().filter(|t| t.name == selection).collect();

    if filtered.is_empty() {
        return Err(HarnessError::UnknownTask {
            name: selection.to_string(),
            known,
        });
    }
    Ok(filtered)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::path::PathBuf;
    use tempfile::NamedTempFile;

    fn builtin() -> Vec<WorkerTask> {
        default_tasks(&PathBuf::from("/opt/workers"), &PathBuf::from("fixtures"))
    }

    #[test]
    fn test_default_tasks_order_and_paths() {
        let tasks = builtin();
        let names: Vec<_> = tasks.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, DEFAULT_TASK_NAMES);
        assert_eq!(tasks[0].command, "/opt/workers/code-generator");
        assert!(tasks[1].args.contains(&"--dir=fixtures".to_string()));
    }

    #[test]
    fn test_filter_all_keeps_everything() {
        assert_eq!(filter_tasks(builtin(), ALL_TASKS).unwrap().len(), 4);
    }

    #[test]
    fn test_filter_single_task() {
        let tasks = filter_tasks(builtin(), "refactor").unwrap();
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].name, "refactor");
    }

    #[test]
    fn test_filter_unknown_task_is_fatal() {
        let err = filter_tasks(builtin(), "compile").unwrap_err();
        assert!(matches!(err, HarnessError::UnknownTask { ref name, .. } if name == "compile"));
    }

    #[test]
    fn test_load_tasks_file() {
        let mut file = NamedTempFile::new().unwrap();
        write!(
            file,
            r#"[{{"name": "echo", "command": "sh", "args": ["-c", "exit 0"]}}]"#
        )
        .unwrap();

        let tasks = load_tasks_file(file.path()).unwrap();
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].args, vec!["-c", "exit 0"]);
        assert!(tasks[0].description.is_empty());
    }

    #[test]
    fn test_load_tasks_file_rejects_empty_and_garbage() {
        let mut empty = NamedTempFile::new().unwrap();
        write!(empty, "[]").unwrap();
        assert!(matches!(
            load_tasks_file(empty.path()),
            Err(HarnessError::InvalidTasks { .. })
        ));

        let mut garbage = NamedTempFile::new().unwrap();
        write!(garbage, "not json").unwrap();
        assert!(load_tasks_file(garbage.path()).is_err());
    }

    #[test]
    fn test_default_descriptions_cover_every_builtin_task() {
        let descriptions = default_descriptions();
        assert_eq!(descriptions.len(), DEFAULT_TASK_NAMES.len());
        assert!(DEFAULT_TASK_NAMES
            .iter()
            .all(|name| !descriptions[*name].is_empty()));
    }
}
