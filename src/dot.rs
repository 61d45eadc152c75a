//! DOT graph export.
//!
//! Built on `petgraph::dot::Dot`, rendering each task as a node and
//! each dependency edge left-to-right for dependency visualization.

use std::collections::HashMap;

use petgraph::dot::{Config, Dot};

use crate::graph::DependencyGraph;
use crate::model::Pipeline;

/// Renders `graph` as a left-to-right DOT document, with nodes labeled
/// `"<name>\n(<task>)"` and edges flowing from dependency to dependent.
pub fn export(graph: &DependencyGraph, pipeline: &Pipeline) -> String {
    let task_kind: HashMap<&str, &str> = pipeline
        .tasks
        .iter()
        .map(|t| (t.name.as_str(), t.task.as_str()))
        .collect();

    let labeled = graph.inner().map(
        |_, name| format!("{name}\n({})", task_kind.get(name.as_str()).copied().unwrap_or("?")),
        |_, ()| (),
    );

    let rendered = format!("{:?}", Dot::with_config(&labeled, &[Config::EdgeNoLabel]));
    inject_rankdir_lr(&rendered)
}

fn inject_rankdir_lr(dot: &str) -> String {
    match dot.find('{') {
        Some(pos) => {
            let mut out = String::with_capacity(dot.len() + 24);
            out.push_str(&dot[..=pos]);
            out.push_str("\n    rankdir=LR;");
            out.push_str(&dot[pos + 1..]);
            out
        }
        None => dot.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::TaskRegistry;
    use std::collections::HashMap as Map;

    use crate::model::TaskSpec;

    fn registry() -> TaskRegistry {
        let mut r = TaskRegistry::new();
        r.register_sync("noop", "test", |_| Ok(None));
        r
    }

    fn task(name: &str, kind: &str, deps: &[&str]) -> TaskSpec {
        TaskSpec {
            name: name.to_string(),
            task: kind.to_string(),
            params: Map::new(),
            depends_on: deps.iter().map(|s| s.to_string()).collect(),
            retries: 0,
            retry_delay: 0.0,
            timeout: None,
            ignore_failure: false,
            skip_downstream_on_failure: false,
            run_if: None,
            run_unless: None,
            branch: None,
            env: Map::new(),
            rate_limit: None,
            rate_limit_key: None,
        }
    }

    #[test]
    fn export_includes_labels_and_left_to_right_orientation() {
        let pipeline = Pipeline {
            branches: Map::new(),
            tasks: vec![task("a", "noop", &[]), task("b", "noop", &["a"])],
        };
        let graph = DependencyGraph::build(&pipeline, &registry()).unwrap();
        let dot = export(&graph, &pipeline);

        assert!(dot.contains("rankdir=LR"));
        assert!(dot.contains("a\\n(noop)") || dot.contains("a\n(noop)"));
        assert!(dot.starts_with("digraph"));
    }
}
