//! Minimal demo binary for the NovaPipe engine.
//!
//! Loads a pipeline document, seeds the context from `--var` flags,
//! runs it to completion, and prints the run summary as JSON. The full
//! command-line front end (subcommands, plugin discovery, scaffolding)
//! is an external collaborator this crate does not implement.

use std::path::PathBuf;

use clap::Parser;
use novapipe::{Context, Engine, EngineConfig, Pipeline};
use serde_json::Value;

#[derive(Parser, Debug)]
#[command(name = "novapipe", about = "Run a NovaPipe pipeline document")]
struct Cli {
    /// Path to a YAML or JSON pipeline document.
    pipeline: PathBuf,

    /// Seeds the context with KEY=VALUE before the run. VALUE is
    /// parsed as JSON when possible, otherwise kept as a string.
    #[arg(long = "var", value_name = "KEY=VALUE")]
    vars: Vec<String>,

    /// Print the dependency graph as DOT and exit without running.
    #[arg(long)]
    dot: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    novapipe::logging::init();

    let cli = Cli::parse();
    let document = std::fs::read_to_string(&cli.pipeline)?;
    let pipeline: Pipeline = serde_yaml::from_str(&document)?;

    let config = EngineConfig::from_env();
    let engine = Engine::with_builtins(config);

    if cli.dot {
        let graph = engine.validate(&pipeline)?;
        println!("{}", novapipe::dot::export(&graph, &pipeline));
        return Ok(());
    }

    let seed = parse_vars(&cli.vars)?;

    match engine.run(&pipeline, seed).await {
        Ok((_, summary)) => {
            println!("{}", serde_json::to_string_pretty(&summary.to_json())?);
            Ok(())
        }
        Err(error) => {
            eprintln!("novapipe: {error}");
            std::process::exit(1);
        }
    }
}

fn parse_vars(vars: &[String]) -> anyhow::Result<Context> {
    let mut context = Context::new();
    for var in vars {
        let (key, raw) = var
            .split_once('=')
            .ok_or_else(|| anyhow::anyhow!("--var must be KEY=VALUE, got {var:?}"))?;
        let value = serde_json::from_str::<Value>(raw).unwrap_or_else(|_| Value::String(raw.to_string()));
        context.insert(key.to_string(), value);
    }
    Ok(context)
}
