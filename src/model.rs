//! Pipeline document data model.
//!
//! `TaskSpec`/`Pipeline` mirror the external YAML/JSON pipeline document
//! almost field-for-field; `Context`, `TaskMetrics` and `RunSummary` are
//! the engine's in-memory bookkeeping types.

use std::collections::HashMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Mutable string→value mapping shared across a run.
///
/// Keys are seeded by the caller before `run()` and augmented after each
/// successful task; there is no external mutation once execution starts.
pub type Context = HashMap<String, Value>;

fn is_false(b: &bool) -> bool {
    !*b
}

/// One node of the pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskSpec {
    pub name: String,
    pub task: String,
    #[serde(default)]
    pub params: HashMap<String, Value>,
    #[serde(default)]
    pub depends_on: Vec<String>,
    #[serde(default)]
    pub retries: u32,
    #[serde(default)]
    pub retry_delay: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<f64>,
    #[serde(default, skip_serializing_if = "is_false")]
    pub ignore_failure: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    pub skip_downstream_on_failure: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub run_if: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub run_unless: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub branch: Option<String>,
    #[serde(default)]
    pub env: HashMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rate_limit: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rate_limit_key: Option<String>,
}

impl TaskSpec {
    /// `1 + retries`.
    pub fn max_attempts(&self) -> u32 {
        1 + self.retries
    }

    /// Key grouping this task with others under one rate limiter:
    /// `rate_limit_key`, falling back to the task name.
    pub fn rate_limit_key(&self) -> Option<&str> {
        self.rate_limit
            .map(|_| self.rate_limit_key.as_deref().unwrap_or(self.name.as_str()))
    }
}

/// An ordered list of `TaskSpec`s plus an optional branch table.
/// Must be non-empty — enforced by the graph builder, not at
/// deserialization time, so callers get the exact
/// `ValidationError::EmptyPipeline` message.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Pipeline {
    #[serde(default)]
    pub branches: HashMap<String, String>,
    pub tasks: Vec<TaskSpec>,
}

/// Terminal status of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Success,
    FailedIgnored,
    FailedAbort,
    Skipped,
}

/// Per-task record accumulated into the `RunSummary`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskMetrics {
    pub name: String,
    pub attempts: u32,
    pub status: TaskStatus,
    pub duration_secs: f64,
    pub error: Option<String>,
}

impl TaskMetrics {
    pub fn skipped(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            attempts: 0,
            status: TaskStatus::Skipped,
            duration_secs: 0.0,
            error: None,
        }
    }

    pub fn success(name: impl Into<String>, attempts: u32, duration: Duration) -> Self {
        Self {
            name: name.into(),
            attempts,
            status: TaskStatus::Success,
            duration_secs: duration.as_secs_f64(),
            error: None,
        }
    }

    pub fn failed(
        name: impl Into<String>,
        attempts: u32,
        duration: Duration,
        ignored: bool,
        error: String,
    ) -> Self {
        Self {
            name: name.into(),
            attempts,
            status: if ignored {
                TaskStatus::FailedIgnored
            } else {
                TaskStatus::FailedAbort
            },
            duration_secs: duration.as_secs_f64(),
            error: Some(error),
        }
    }
}

/// Ordered collection of `TaskMetrics`, one entry per task, in the
/// order tasks first left `pending`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunSummary {
    pub tasks: Vec<TaskMetrics>,
}

impl RunSummary {
    pub fn push(&mut self, metrics: TaskMetrics) {
        self.tasks.push(metrics);
    }

    pub fn get(&self, name: &str) -> Option<&TaskMetrics> {
        self.tasks.iter().find(|t| t.name == name)
    }

    pub fn failed_ignored_names(&self) -> Vec<&str> {
        self.tasks
            .iter()
            .filter(|t| t.status == TaskStatus::FailedIgnored)
            .map(|t| t.name.as_str())
            .collect()
    }

    pub fn any_aborted(&self) -> bool {
        self.tasks.iter().any(|t| t.status == TaskStatus::FailedAbort)
    }

    pub fn to_json(&self) -> Value {
        serde_json::json!({ "tasks": self.tasks })
    }
}
