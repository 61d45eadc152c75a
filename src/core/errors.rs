use thiserror::Error;

/// Errors raised while building and validating the dependency graph.
/// All are fatal; no task runs.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("pipeline must contain at least one task")]
    EmptyPipeline,

    #[error("duplicate task name: {0}")]
    DuplicateName(String),

    #[error("task '{task}' references unknown registry key '{key}'")]
    UnknownTask { task: String, key: String },

    #[error("task '{task}' depends on unknown task '{dependency}'")]
    UnknownDependency { task: String, dependency: String },

    #[error("task '{task}' references unknown branch key '{branch}'")]
    UnknownBranch { task: String, branch: String },

    #[error("cycle detected in pipeline dependency graph")]
    CycleDetected,
}

/// Errors surfaced once a validated pipeline is actually run.
///
/// Template errors and timeouts are retryable in the sense that the
/// executor decides whether to retry before wrapping a failure in one
/// of these; `Aborted` is the pipeline-level error raised once a
/// `failed_abort` task's layer has fully drained.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("template error in {task}: {cause}")]
    Template { task: String, cause: String },

    #[error("task '{task}' timed out after {secs}s")]
    Timeout { task: String, secs: f64 },

    #[error("task '{task}' failed: {cause}")]
    TaskFailed { task: String, cause: String },

    #[error("pipeline aborted: task '{task}' failed permanently")]
    Aborted { task: String },
}

impl PipelineError {
    /// Human-readable `Type: message` form used for `TaskMetrics.error`.
    pub fn display_for_metrics(&self) -> String {
        match self {
            PipelineError::Template { cause, .. } => format!("TemplateError: {cause}"),
            PipelineError::Timeout { secs, .. } => {
                format!("TimeoutError: timed out after {secs}s")
            }
            PipelineError::TaskFailed { cause, .. } => format!("TaskError: {cause}"),
            PipelineError::Aborted { task } => format!("AbortedError: {task}"),
            PipelineError::Validation(e) => format!("ValidationError: {e}"),
        }
    }
}
