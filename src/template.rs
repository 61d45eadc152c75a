//! Template engine adapter.
//!
//! Backed by `minijinja` configured for strict-undefined semantics.
//! `render`/`eval_bool` are shared by `params`, `run_if`, `run_unless`,
//! `branches` and `env` rendering.

use std::collections::HashMap;

use minijinja::value::Value as JinjaValue;
use minijinja::{Environment, UndefinedBehavior};
use serde_json::Value;

use crate::model::Context;

/// Truthy spellings accepted by gating expressions.
const TRUTHY: [&str; 3] = ["true", "1", "yes"];

pub struct TemplateEngine {
    env: Environment<'static>,
}

impl Default for TemplateEngine {
    fn default() -> Self {
        let mut env = Environment::new();
        env.set_undefined_behavior(UndefinedBehavior::Strict);
        Self { env }
    }
}

impl TemplateEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Renders a single template string against `context`. Strings with
    /// no `{{ ... }}` expression pass through unchanged.
    pub fn render(&self, text: &str, context: &Context) -> Result<String, String> {
        let ctx_value = context_to_jinja(context);
        self.env
            .render_str(text, ctx_value)
            .map_err(|e| e.to_string())
    }

    /// Renders `text`, then applies gating truthiness: trim, lowercase,
    /// compare against `{"true", "1", "yes"}`.
    pub fn eval_bool(&self, text: &str, context: &Context) -> Result<bool, String> {
        let rendered = self.render(text, context)?;
        Ok(TRUTHY.contains(&rendered.trim().to_lowercase().as_str()))
    }

    /// Recursively renders a raw params tree: strings are rendered,
    /// mappings/sequences recurse, other scalars pass through
    /// unchanged.
    pub fn render_value(&self, value: &Value, context: &Context) -> Result<Value, String> {
        match value {
            Value::String(s) => Ok(Value::String(self.render(s, context)?)),
            Value::Array(items) => {
                let mut out = Vec::with_capacity(items.len());
                for item in items {
                    out.push(self.render_value(item, context)?);
                }
                Ok(Value::Array(out))
            }
            Value::Object(map) => {
                let mut out = serde_json::Map::with_capacity(map.len());
                for (k, v) in map {
                    out.insert(k.clone(), self.render_value(v, context)?);
                }
                Ok(Value::Object(out))
            }
            other => Ok(other.clone()),
        }
    }

    pub fn render_params(
        &self,
        params: &HashMap<String, Value>,
        context: &Context,
    ) -> Result<HashMap<String, Value>, String> {
        let mut out = HashMap::with_capacity(params.len());
        for (k, v) in params {
            out.insert(k.clone(), self.render_value(v, context)?);
        }
        Ok(out)
    }
}

fn context_to_jinja(context: &Context) -> JinjaValue {
    let map: HashMap<&str, &Value> = context.iter().map(|(k, v)| (k.as_str(), v)).collect();
    JinjaValue::from_serialize(&map)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn ctx(pairs: &[(&str, Value)]) -> Context {
        pairs.iter().map(|(k, v)| (k.to_string(), v.clone())).collect()
    }

    #[test]
    fn render_passes_through_plain_text() {
        let engine = TemplateEngine::new();
        let out = engine.render("hello world", &Context::new()).unwrap();
        assert_eq!(out, "hello world");
    }

    #[test]
    fn render_substitutes_context_values() {
        let engine = TemplateEngine::new();
        let context = ctx(&[("one", json!("hello"))]);
        let out = engine.render("wrapped: {{ one }}", &context).unwrap();
        assert_eq!(out, "wrapped: hello");
    }

    #[test]
    fn render_errors_on_undefined_reference() {
        let engine = TemplateEngine::new();
        let err = engine.render("{{ missing }}", &Context::new());
        assert!(err.is_err());
    }

    #[test]
    fn eval_bool_accepts_truthy_spellings() {
        let engine = TemplateEngine::new();
        for (literal, expected) in [
            ("true", true),
            ("True", true),
            ("1", true),
            ("yes", true),
            ("YES", true),
            ("false", false),
            ("0", false),
            ("no", false),
            ("", false),
        ] {
            let out = engine.eval_bool(literal, &Context::new()).unwrap();
            assert_eq!(out, expected, "literal={literal}");
        }
    }

    #[test]
    fn eval_bool_supports_comparison_expressions() {
        let engine = TemplateEngine::new();
        let context = ctx(&[("env", json!("dev"))]);
        assert!(engine
            .eval_bool("{{ env == 'dev' }}", &context)
            .unwrap());
        assert!(!engine
            .eval_bool("{{ env == 'prod' }}", &context)
            .unwrap());
    }

    #[test]
    fn render_value_recurses_into_mappings_and_sequences() {
        let engine = TemplateEngine::new();
        let context = ctx(&[("name", json!("nova"))]);
        let value = json!({
            "greeting": "hi {{ name }}",
            "tags": ["{{ name }}", "static"],
            "count": 3,
        });
        let rendered = engine.render_value(&value, &context).unwrap();
        assert_eq!(rendered["greeting"], "hi nova");
        assert_eq!(rendered["tags"][0], "nova");
        assert_eq!(rendered["tags"][1], "static");
        assert_eq!(rendered["count"], 3);
    }

    #[test]
    fn render_params_renders_every_string_leaf() {
        let engine = TemplateEngine::new();
        let context = ctx(&[("one", json!("hello"))]);
        let mut params = HashMap::new();
        params.insert("input".to_string(), json!("{{ one }}"));
        let rendered = engine.render_params(&params, &context).unwrap();
        assert_eq!(rendered["input"], "hello");
    }

    #[test]
    fn length_builtin_filter_is_available() {
        let engine = TemplateEngine::new();
        let context = ctx(&[("items", json!([1, 2, 3]))]);
        let out = engine.render("{{ items | length }}", &context).unwrap();
        assert_eq!(out, "3");
    }
}
