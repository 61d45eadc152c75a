// Dependency graph module
// petgraph-based DAG construction, validation and layering

pub mod runtime;

pub use runtime::DependencyGraph;
