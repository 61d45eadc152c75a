//! Built-in tasks: a small library of generically useful callables
//! (printing, file read/write, data shaping, flaky-task simulators for
//! exercising retries). Kept intentionally small and dependency-free
//! beyond `std`/`rand` — these exist so the engine is runnable and
//! testable without an external task registry.

use std::fs;
use std::path::Path;
use std::time::Duration;

use rand::Rng;
use serde_json::{json, Value};

use crate::registry::{Params, TaskRegistry};

/// Registers every built-in task under its original name.
pub fn register_builtins(registry: &mut TaskRegistry) {
    registry.register_sync("print_message", "novapipe::builtins", print_message);
    registry.register_async("async_wait_and_print", "novapipe::builtins", |params| async move {
        async_wait_and_print(params).await
    });
    registry.register_sync("maybe_fail", "novapipe::builtins", maybe_fail);
    registry.register_sync("create_temp_dir", "novapipe::builtins", create_temp_dir);
    registry.register_sync("write_text_file", "novapipe::builtins", write_text_file);
    registry.register_sync("count_file_lines", "novapipe::builtins", count_file_lines);
    registry.register_sync("return_value", "novapipe::builtins", return_value);
    registry.register_sync("wrap_text", "novapipe::builtins", wrap_text);
    registry.register_sync("echo", "novapipe::builtins", echo);
    registry.register_sync("analyze_data", "novapipe::builtins", analyze_data);
    registry.register_sync("identity", "novapipe::builtins", identity);
    registry.register_sync("always_fail", "novapipe::builtins", always_fail);
}

fn str_param(params: &Params, key: &str) -> String {
    params
        .get(key)
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or_default()
}

fn print_message(params: Params) -> Result<Option<Value>, String> {
    println!("{}", str_param(&params, "message"));
    Ok(None)
}

async fn async_wait_and_print(params: Params) -> Result<Option<Value>, String> {
    let seconds = params
        .get("seconds")
        .and_then(Value::as_f64)
        .unwrap_or(1.0);
    tokio::time::sleep(Duration::from_secs_f64(seconds)).await;
    println!("{}", str_param(&params, "message"));
    Ok(None)
}

fn maybe_fail(params: Params) -> Result<Option<Value>, String> {
    let attempt_id = params.get("attempt_id").cloned();
    if rand::rng().random::<f64>() < 0.5 {
        return Err(format!("Simulated failure for attempt_id={attempt_id:?}"));
    }
    println!("maybe_fail succeeded (attempt_id={attempt_id:?})");
    Ok(None)
}

fn create_temp_dir(params: Params) -> Result<Option<Value>, String> {
    let base = params.get("base").and_then(Value::as_str);
    if let Some(base) = base {
        if !Path::new(base).is_dir() {
            return Err(format!("Base directory {base:?} does not exist."));
        }
    }
    let mut dir = std::env::temp_dir();
    if let Some(base) = base {
        dir = Path::new(base).to_path_buf();
    }
    let unique = format!("novapipe_{}", uuid_like());
    let tmpdir = dir.join(unique);
    fs::create_dir_all(&tmpdir).map_err(|e| e.to_string())?;
    Ok(Some(Value::String(tmpdir.to_string_lossy().into_owned())))
}

fn write_text_file(params: Params) -> Result<Option<Value>, String> {
    let path = params
        .get("path")
        .and_then(Value::as_str)
        .ok_or_else(|| "Missing 'path' in params for write_text_file.".to_string())?;
    let content = str_param(&params, "content");
    if let Some(parent) = Path::new(path).parent() {
        fs::create_dir_all(parent).map_err(|e| e.to_string())?;
    }
    fs::write(path, content).map_err(|e| e.to_string())?;
    Ok(Some(Value::String(path.to_string())))
}

fn count_file_lines(params: Params) -> Result<Option<Value>, String> {
    let path = params
        .get("path")
        .and_then(Value::as_str)
        .filter(|p| Path::new(p).is_file())
        .ok_or_else(|| format!("File not found: {:?}", params.get("path")))?;
    let content = fs::read_to_string(path).map_err(|e| e.to_string())?;
    Ok(Some(Value::from(content.lines().count())))
}

fn return_value(params: Params) -> Result<Option<Value>, String> {
    Ok(params.get("value").cloned())
}

fn wrap_text(params: Params) -> Result<Option<Value>, String> {
    let input = str_param(&params, "input");
    Ok(Some(Value::String(format!("WRAPPED: {input:?}"))))
}

fn echo(params: Params) -> Result<Option<Value>, String> {
    let message = params.get("message").cloned().unwrap_or(Value::Null);
    println!("{message}");
    Ok(Some(message))
}

fn analyze_data(_params: Params) -> Result<Option<Value>, String> {
    Ok(Some(json!({
        "row_count": 123,
        "column_count": 10,
        "output_path": "/tmp/novapipe_out.csv",
    })))
}

fn identity(params: Params) -> Result<Option<Value>, String> {
    Ok(params.get("value").cloned())
}

fn always_fail(params: Params) -> Result<Option<Value>, String> {
    let cause = str_param(&params, "message");
    if cause.is_empty() {
        Err("task configured to always fail".to_string())
    } else {
        Err(cause)
    }
}

fn uuid_like() -> String {
    let mut rng = rand::rng();
    (0..16).map(|_| format!("{:x}", rng.random_range(0..16))).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::TaskRegistry;

    fn registry() -> TaskRegistry {
        let mut r = TaskRegistry::new();
        register_builtins(&mut r);
        r
    }

    #[test]
    fn all_builtins_are_registered() {
        let r = registry();
        for name in [
            "print_message",
            "async_wait_and_print",
            "maybe_fail",
            "create_temp_dir",
            "write_text_file",
            "count_file_lines",
            "return_value",
            "wrap_text",
            "echo",
            "analyze_data",
            "identity",
            "always_fail",
        ] {
            assert!(r.contains(name), "missing builtin: {name}");
        }
    }

    #[test]
    fn return_value_echoes_the_value_param() {
        let mut params = Params::new();
        params.insert("value".to_string(), Value::from("hello"));
        assert_eq!(return_value(params).unwrap(), Some(Value::from("hello")));
    }

    #[test]
    fn wrap_text_wraps_the_input() {
        let mut params = Params::new();
        params.insert("input".to_string(), Value::from("hello"));
        let out = wrap_text(params).unwrap().unwrap();
        assert_eq!(out, Value::from("WRAPPED: \"hello\""));
    }

    #[test]
    fn echo_returns_message_unchanged() {
        let mut params = Params::new();
        params.insert("message".to_string(), Value::from("hi there"));
        assert_eq!(echo(params).unwrap(), Some(Value::from("hi there")));
    }

    #[test]
    fn analyze_data_returns_multi_key_mapping() {
        let out = analyze_data(Params::new()).unwrap().unwrap();
        assert_eq!(out["row_count"], 123);
        assert_eq!(out["column_count"], 10);
    }

    #[test]
    fn always_fail_errors_with_message_when_provided() {
        let mut params = Params::new();
        params.insert("message".to_string(), Value::from("boom"));
        assert_eq!(always_fail(params).unwrap_err(), "boom");
    }

    #[test]
    fn always_fail_errors_with_default_when_no_message() {
        let err = always_fail(Params::new()).unwrap_err();
        assert_eq!(err, "task configured to always fail");
    }

    #[test]
    fn identity_returns_value_param_unchanged() {
        let mut params = Params::new();
        params.insert("value".to_string(), json!({"a": 1}));
        assert_eq!(identity(params).unwrap(), Some(json!({"a": 1})));
    }

    #[test]
    fn write_text_file_then_count_file_lines_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.txt");
        let mut params = Params::new();
        params.insert(
            "path".to_string(),
            Value::String(path.to_string_lossy().into_owned()),
        );
        params.insert("content".to_string(), Value::from("a\nb\nc\n"));
        write_text_file(params).unwrap();

        let mut count_params = Params::new();
        count_params.insert(
            "path".to_string(),
            Value::String(path.to_string_lossy().into_owned()),
        );
        assert_eq!(count_file_lines(count_params).unwrap(), Some(Value::from(3)));
    }

    #[test]
    fn count_file_lines_errors_on_missing_file() {
        let mut params = Params::new();
        params.insert("path".to_string(), Value::from("/nonexistent/path.txt"));
        assert!(count_file_lines(params).is_err());
    }

    #[tokio::test]
    async fn async_wait_and_print_resolves() {
        let mut params = Params::new();
        params.insert("seconds".to_string(), Value::from(0.0));
        params.insert("message".to_string(), Value::from("done"));
        assert!(async_wait_and_print(params).await.is_ok());
    }
}
