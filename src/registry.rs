//! Task registry: name → callable mapping.
//!
//! A registry entry carries the callable plus whether it is async, so
//! the executor can dispatch sync callables onto the blocking worker
//! pool and async callables onto the cooperative scheduler while
//! awaiting both uniformly.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use serde_json::Value;

/// Rendered params passed to a task callable.
pub type Params = HashMap<String, Value>;

/// What a task callable may hand back: nothing, a single scalar, or a
/// mapping merged into context.
pub type TaskOutput = Option<Value>;

/// Error raised by a callable body, before the executor wraps it in a
/// `PipelineError::TaskFailed`.
pub type TaskError = String;

type BoxFuture<T> = Pin<Box<dyn Future<Output = T> + Send>>;

/// A registered task callable.
#[derive(Clone)]
pub enum TaskCallable {
    /// Runs on the blocking worker pool (`tokio::task::spawn_blocking`).
    Sync(Arc<dyn Fn(Params) -> Result<TaskOutput, TaskError> + Send + Sync>),
    /// Runs cooperatively on the async scheduler.
    Async(Arc<dyn Fn(Params) -> BoxFuture<Result<TaskOutput, TaskError>> + Send + Sync>),
}

impl TaskCallable {
    pub fn is_async(&self) -> bool {
        matches!(self, TaskCallable::Async(_))
    }
}

/// One entry in the task registry: the callable plus its source module.
#[derive(Clone)]
pub struct RegistryEntry {
    pub callable: TaskCallable,
    pub source_module: &'static str,
}

impl RegistryEntry {
    pub fn is_async(&self) -> bool {
        self.callable.is_async()
    }
}

/// Name → callable mapping consulted by the graph validator (task
/// existence) and the executor (dispatch).
#[derive(Clone, Default)]
pub struct TaskRegistry {
    entries: HashMap<String, RegistryEntry>,
}

impl TaskRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_sync<F>(&mut self, name: impl Into<String>, source_module: &'static str, f: F)
    where
        F: Fn(Params) -> Result<TaskOutput, TaskError> + Send + Sync + 'static,
    {
        self.entries.insert(
            name.into(),
            RegistryEntry {
                callable: TaskCallable::Sync(Arc::new(f)),
                source_module,
            },
        );
    }

    pub fn register_async<F, Fut>(
        &mut self,
        name: impl Into<String>,
        source_module: &'static str,
        f: F,
    ) where
        F: Fn(Params) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<TaskOutput, TaskError>> + Send + 'static,
    {
        self.entries.insert(
            name.into(),
            RegistryEntry {
                callable: TaskCallable::Async(Arc::new(move |params| Box::pin(f(params)))),
                source_module,
            },
        );
    }

    pub fn get(&self, name: &str) -> Option<&RegistryEntry> {
        self.entries.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(|s| s.as_str())
    }
}

/// Dispatches a registry entry: sync callables run on the blocking
/// worker pool, async callables run cooperatively. Both are awaited
/// uniformly by the caller.
pub async fn invoke(entry: &RegistryEntry, params: Params) -> Result<TaskOutput, TaskError> {
    match &entry.callable {
        TaskCallable::Sync(f) => {
            let f = Arc::clone(f);
            match tokio::task::spawn_blocking(move || f(params)).await {
                Ok(result) => result,
                Err(join_err) => Err(join_err.to_string()),
            }
        }
        TaskCallable::Async(f) => f(params).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_and_lookup_sync() {
        let mut registry = TaskRegistry::new();
        registry.register_sync("noop", "test", |_params| Ok(None));
        assert!(registry.contains("noop"));
        assert!(!registry.get("noop").unwrap().is_async());
        assert!(registry.get("missing").is_none());
    }

    #[tokio::test]
    async fn invoke_dispatches_sync_entries_via_blocking_pool() {
        let mut registry = TaskRegistry::new();
        registry.register_sync("double", "test", |params| {
            let n = params.get("n").and_then(Value::as_i64).unwrap_or(0);
            Ok(Some(Value::from(n * 2)))
        });
        let mut params = Params::new();
        params.insert("n".to_string(), Value::from(21));
        let entry = registry.get("double").unwrap();
        let out = invoke(entry, params).await.unwrap();
        assert_eq!(out, Some(Value::from(42)));
    }

    #[tokio::test]
    async fn register_and_invoke_async() {
        let mut registry = TaskRegistry::new();
        registry.register_async("wait", "test", |params| async move {
            Ok(params.get("value").cloned())
        });

        let entry = registry.get("wait").unwrap();
        assert!(entry.is_async());
        let TaskCallable::Async(f) = &entry.callable else {
            panic!("expected async callable");
        };
        let mut params = Params::new();
        params.insert("value".to_string(), Value::from(42));
        let out = f(params).await.unwrap();
        assert_eq!(out, Some(Value::from(42)));
    }
}
