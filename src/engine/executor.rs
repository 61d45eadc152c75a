//! Per-task lifecycle state machine:
//! `pending -> gating -> rendering -> attempting -> terminal status`.
//!
//! One `run_task` call owns a single task's full lifecycle. Context
//! reads/writes take the shared mutex only for the duration of a
//! read-modify-write, never across an `.await`, per the concurrency
//! model.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use tokio::sync::Mutex;

use crate::core::config::EngineConfig;
use crate::core::errors::PipelineError;
use crate::model::{Context, TaskMetrics, TaskSpec};
use crate::ratelimit::RateLimiters;
use crate::registry::{Params, TaskRegistry};
use crate::template::TemplateEngine;

/// What `run_task` decided, beyond the `TaskMetrics` it always returns:
/// whether this task's outcome should cascade a skip to its dependents.
pub struct TaskOutcome {
    pub metrics: TaskMetrics,
    pub cascades_skip: bool,
    /// Set when this task ended in `failed_abort` — the scheduler uses
    /// it to build the pipeline-level `Aborted` error.
    pub aborted: bool,
}

pub struct TaskRunner<'a> {
    pub registry: &'a TaskRegistry,
    pub template: &'a TemplateEngine,
    pub rate_limiters: &'a RateLimiters,
    pub context: &'a Mutex<Context>,
    pub branches: &'a HashMap<String, String>,
    pub config: &'a EngineConfig,
}

impl<'a> TaskRunner<'a> {
    /// Runs one task through its full lifecycle.
    ///
    /// `upstream_skip` is decided by the scheduler before this call:
    /// true when a dependency's skip must cascade here regardless of
    /// this task's own gating.
    pub async fn run_task(&self, task: &TaskSpec, upstream_skip: bool) -> TaskOutcome {
        if upstream_skip {
            self.bind(&task.name, None).await;
            tracing::info!(task = %task.name, "skipped (upstream)");
            return TaskOutcome {
                metrics: TaskMetrics::skipped(task.name.clone()),
                cascades_skip: true,
                aborted: false,
            };
        }

        let snapshot = self.context.lock().await.clone();

        match self.evaluate_gates(task, &snapshot) {
            Ok(GateResult::Skip) => {
                self.bind(&task.name, None).await;
                tracing::info!(task = %task.name, "skipped (gated)");
                return TaskOutcome {
                    metrics: TaskMetrics::skipped(task.name.clone()),
                    cascades_skip: task.skip_downstream_on_failure,
                    aborted: false,
                };
            }
            Ok(GateResult::Proceed) => {}
            Err(cause) => {
                return self.terminal_failure(
                    task,
                    0,
                    Duration::ZERO,
                    PipelineError::Template {
                        task: task.name.clone(),
                        cause,
                    },
                )
                .await;
            }
        }

        let rendered_params = match self.template.render_params(&task.params, &snapshot) {
            Ok(p) => p,
            Err(cause) => {
                return self
                    .terminal_failure(
                        task,
                        0,
                        Duration::ZERO,
                        PipelineError::Template {
                            task: task.name.clone(),
                            cause,
                        },
                    )
                    .await;
            }
        };

        let rendered_env = match self.render_env(task, &snapshot) {
            Ok(env) => env,
            Err(cause) => {
                return self
                    .terminal_failure(
                        task,
                        0,
                        Duration::ZERO,
                        PipelineError::Template {
                            task: task.name.clone(),
                            cause,
                        },
                    )
                    .await;
            }
        };

        self.attempt_loop(task, rendered_params, rendered_env).await
    }

    fn render_env(
        &self,
        task: &TaskSpec,
        context: &Context,
    ) -> Result<HashMap<String, String>, String> {
        let mut rendered = HashMap::with_capacity(task.env.len());
        for (k, v) in &task.env {
            rendered.insert(k.clone(), self.template.render(v, context)?);
        }
        Ok(rendered)
    }

    fn evaluate_gates(&self, task: &TaskSpec, context: &Context) -> Result<GateResult, String> {
        if let Some(branch) = &task.branch {
            let expr = self
                .branches
                .get(branch)
                .expect("branch key validated at graph build time");
            if !self.template.eval_bool(expr, context)? {
                return Ok(GateResult::Skip);
            }
        }
        if let Some(expr) = &task.run_if {
            if !self.template.eval_bool(expr, context)? {
                return Ok(GateResult::Skip);
            }
        }
        if let Some(expr) = &task.run_unless {
            if self.template.eval_bool(expr, context)? {
                return Ok(GateResult::Skip);
            }
        }
        Ok(GateResult::Proceed)
    }

    async fn attempt_loop(
        &self,
        task: &TaskSpec,
        rendered_params: Params,
        rendered_env: HashMap<String, String>,
    ) -> TaskOutcome {
        let max_attempts = task.max_attempts();
        let start = Instant::now();

        for attempt in 1..=max_attempts {
            if let (Some(key), Some(rate)) = (task.rate_limit_key(), task.rate_limit) {
                self.rate_limiters.acquire(key, rate).await;
            }

            let saved_env = apply_env_overlay(&rendered_env);
            let outcome = self.invoke(task, rendered_params.clone()).await;
            restore_env_overlay(saved_env);

            match outcome {
                Ok(output) => {
                    self.bind(&task.name, output).await;
                    let duration = start.elapsed();
                    tracing::info!(
                        task = %task.name,
                        attempt,
                        max_attempts,
                        "task succeeded"
                    );
                    return TaskOutcome {
                        metrics: TaskMetrics::success(task.name.clone(), attempt, duration),
                        cascades_skip: false,
                        aborted: false,
                    };
                }
                Err(error) => {
                    if attempt < max_attempts {
                        tracing::warn!(
                            task = %task.name,
                            attempt,
                            max_attempts,
                            cause = %error,
                            delay_secs = task.retry_delay,
                            "attempt failed, retrying"
                        );
                        tokio::time::sleep(Duration::from_secs_f64(task.retry_delay)).await;
                        continue;
                    }
                    return self.terminal_failure(task, attempt, start.elapsed(), error).await;
                }
            }
        }
        unreachable!("attempt loop always returns by its final iteration")
    }

    async fn invoke(
        &self,
        task: &TaskSpec,
        params: Params,
    ) -> Result<Option<serde_json::Value>, PipelineError> {
        let entry = self
            .registry
            .get(&task.task)
            .expect("task registry key validated at graph build time");

        let call = crate::registry::invoke(entry, params);
        let result = match task.timeout.or(self.config.default_timeout.map(|d| d.as_secs_f64())) {
            Some(secs) => match tokio::time::timeout(Duration::from_secs_f64(secs), call).await {
                Ok(inner) => inner,
                Err(_) => {
                    return Err(PipelineError::Timeout {
                        task: task.name.clone(),
                        secs,
                    })
                }
            },
            None => call.await,
        };

        result.map_err(|cause| PipelineError::TaskFailed {
            task: task.name.clone(),
            cause,
        })
    }

    async fn terminal_failure(
        &self,
        task: &TaskSpec,
        attempts: u32,
        duration: Duration,
        error: PipelineError,
    ) -> TaskOutcome {
        let message = error.display_for_metrics();
        if task.ignore_failure {
            tracing::warn!(task = %task.name, cause = %message, "task failed, ignoring");
            self.bind(&task.name, None).await;
            TaskOutcome {
                metrics: TaskMetrics::failed(task.name.clone(), attempts, duration, true, message),
                cascades_skip: task.skip_downstream_on_failure,
                aborted: false,
            }
        } else {
            tracing::error!(task = %task.name, cause = %message, "task failed permanently");
            TaskOutcome {
                metrics: TaskMetrics::failed(task.name.clone(), attempts, duration, false, message),
                cascades_skip: task.skip_downstream_on_failure,
                aborted: true,
            }
        }
    }

    async fn bind(&self, name: &str, output: Option<serde_json::Value>) {
        let mut context = self.context.lock().await;
        match output {
            Some(serde_json::Value::Object(map)) => {
                for (k, v) in map {
                    if context.contains_key(&k) {
                        tracing::warn!(key = %k, "context key overwritten");
                    }
                    context.insert(k, v);
                }
            }
            Some(value) => {
                if context.contains_key(name) {
                    tracing::warn!(key = %name, "context key overwritten");
                }
                context.insert(name.to_string(), value);
            }
            None => {
                context.insert(name.to_string(), serde_json::Value::Null);
            }
        }
    }
}

enum GateResult {
    Skip,
    Proceed,
}

fn apply_env_overlay(overlay: &HashMap<String, String>) -> Vec<(String, Option<String>)> {
    let mut saved = Vec::with_capacity(overlay.len());
    for (k, v) in overlay {
        saved.push((k.clone(), std::env::var(k).ok()));
        std::env::set_var(k, v);
    }
    saved
}

fn restore_env_overlay(saved: Vec<(String, Option<String>)>) {
    for (k, prior) in saved {
        match prior {
            Some(v) => std::env::set_var(&k, v),
            None => std::env::remove_var(&k),
        }
    }
}
