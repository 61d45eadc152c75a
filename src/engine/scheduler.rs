//! Layered scheduler and top-level engine entry point.
//!
//! Builds and validates the graph, partitions it into concurrency
//! layers, and runs each layer's tasks concurrently via a `JoinSet`,
//! waiting for every task in a layer before starting the next — the
//! "barrier after every layer" model.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use tokio::sync::Mutex;
use tokio::task::JoinSet;

use crate::builtins::register_builtins;
use crate::core::config::EngineConfig;
use crate::core::errors::PipelineError;
use crate::engine::executor::TaskRunner;
use crate::graph::DependencyGraph;
use crate::model::{Context, Pipeline, RunSummary, TaskSpec, TaskStatus};
use crate::ratelimit::RateLimiters;
use crate::registry::TaskRegistry;
use crate::template::TemplateEngine;

/// Owns one pipeline run: a validated graph plus the shared engine
/// components an execution needs. Graph and registry snapshots are
/// captured at construction.
pub struct Engine {
    registry: Arc<TaskRegistry>,
    template: Arc<TemplateEngine>,
    config: EngineConfig,
}

impl Engine {
    pub fn new(registry: TaskRegistry, config: EngineConfig) -> Self {
        Self {
            registry: Arc::new(registry),
            template: Arc::new(TemplateEngine::new()),
            config,
        }
    }

    /// An engine preloaded with the built-in task library,
    /// convenient for the demo binary and for tests.
    pub fn with_builtins(config: EngineConfig) -> Self {
        let mut registry = TaskRegistry::new();
        register_builtins(&mut registry);
        Self::new(registry, config)
    }

    pub fn registry(&self) -> &TaskRegistry {
        &self.registry
    }

    /// Validates `pipeline` and returns its dependency graph without
    /// running anything (used by a CLI collaborator's `describe`/`dot`
    /// subcommands).
    pub fn validate(&self, pipeline: &Pipeline) -> Result<DependencyGraph, PipelineError> {
        DependencyGraph::build(pipeline, &self.registry).map_err(PipelineError::from)
    }

    /// Runs the full pipeline to completion (or to its first abort).
    pub async fn run(
        &self,
        pipeline: &Pipeline,
        seed_context: Context,
    ) -> Result<(Context, RunSummary), PipelineError> {
        let graph = self.validate(pipeline)?;
        let layers = graph.layers();

        let by_name: HashMap<&str, &TaskSpec> =
            pipeline.tasks.iter().map(|t| (t.name.as_str(), t)).collect();

        let context = Arc::new(Mutex::new(seed_context));
        let rate_limiters = Arc::new(RateLimiters::new());
        let mut summary = RunSummary::default();
        let mut statuses: HashMap<String, TaskStatus> = HashMap::new();
        let mut cascade_skip: HashSet<String> = HashSet::new();

        for layer in layers {
            let mut joins = JoinSet::new();

            for name in &layer {
                let task = (*by_name[name.as_str()]).clone();
                let upstream_skip = task.depends_on.iter().any(|d| cascade_skip.contains(d));

                let registry = Arc::clone(&self.registry);
                let template = Arc::clone(&self.template);
                let rate_limiters = Arc::clone(&rate_limiters);
                let context = Arc::clone(&context);
                let branches = pipeline.branches.clone();
                let config = self.config.clone();

                joins.spawn(async move {
                    let runner = TaskRunner {
                        registry: &registry,
                        template: &template,
                        rate_limiters: &rate_limiters,
                        context: &context,
                        branches: &branches,
                        config: &config,
                    };
                    runner.run_task(&task, upstream_skip).await
                });
            }

            let mut layer_outcomes = Vec::with_capacity(layer.len());
            while let Some(joined) = joins.join_next().await {
                let outcome = joined.expect("task executor panicked");
                layer_outcomes.push(outcome);
            }

            let mut aborted_task = None;
            for mut outcome in layer_outcomes {
                if outcome.aborted && self.config.ignore_failures {
                    outcome.aborted = false;
                    outcome.metrics.status = TaskStatus::FailedIgnored;
                } else if outcome.aborted && aborted_task.is_none() {
                    aborted_task = Some(outcome.metrics.name.clone());
                }

                statuses.insert(outcome.metrics.name.clone(), outcome.metrics.status);
                if outcome.cascades_skip {
                    cascade_skip.insert(outcome.metrics.name.clone());
                }
                summary.push(outcome.metrics);
            }

            if let Some(task) = aborted_task {
                return Err(PipelineError::Aborted { task });
            }
        }

        log_run_completion(&summary);

        let final_context = context.lock().await.clone();
        Ok((final_context, summary))
    }
}

fn log_run_completion(summary: &RunSummary) {
    let ignored = summary.failed_ignored_names();
    if !ignored.is_empty() {
        tracing::warn!(tasks = ?ignored, "pipeline completed with ignored failures");
    }
    if !summary.any_aborted() {
        tracing::info!("Pipeline completed successfully");
    }
}
