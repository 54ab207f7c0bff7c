//! Roundtable CLI
//!
//! Thin delivery surface over the coordination engine: loads a routing
//! table and an optional scripted-specialist scenario from JSON, runs one
//! request through the coordinator, prints the final answer.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use roundtable_core::coordinator::{ConflictRule, Coordinator, CoordinatorConfig};
use roundtable_core::routing::{RoutingConfig, RoutingTable};
use roundtable_core::specialists::{ScriptedReply, ScriptedSpecialist, SpecialistRegistry};
use serde::Deserialize;

#[derive(Parser)]
#[command(name = "roundtable", about = "Multi-round coordinator/specialist delegation")]
struct Cli {
    /// The request to coordinate
    request: String,

    /// Path to the routing table JSON
    #[arg(long)]
    routing: PathBuf,

    /// Path to a scenario JSON with scripted specialist replies. Without
    /// one, every routed specialist answers with a placeholder reply.
    #[arg(long)]
    scenario: Option<PathBuf>,

    /// Round ceiling
    #[arg(long, default_value_t = 3)]
    rounds: u32,

    /// Per-specialist timeout in milliseconds
    #[arg(long, default_value_t = 30_000)]
    timeout_ms: u64,

    /// Print the event log after the answer
    #[arg(long)]
    verbose: bool,
}

/// Scenario file: scripted replies per specialist plus review tuning
#[derive(Debug, Default, Deserialize)]
struct Scenario {
    #[serde(default)]
    specialists: HashMap<String, Vec<ScriptedReply>>,
    #[serde(default)]
    conflict_rules: Vec<ConflictRule>,
    #[serde(default)]
    constraints: Vec<String>,
}

fn load_scenario(path: Option<&PathBuf>) -> Result<Scenario> {
    match path {
        Some(path) => {
            let raw = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read scenario {}", path.display()))?;
            serde_json::from_str(&raw)
                .with_context(|| format!("Failed to parse scenario {}", path.display()))
        }
        None => Ok(Scenario::default()),
    }
}

/// Register scripted specialists: scenario entries first, then a
/// placeholder for every routed specialist the scenario leaves out
fn build_registry(routing: &RoutingTable, scenario: &Scenario) -> SpecialistRegistry {
    let mut registry = SpecialistRegistry::new();
    for (id, script) in &scenario.specialists {
        registry.register(id.clone(), Arc::new(ScriptedSpecialist::new(script.clone())));
    }
    for id in routing.all_specialists() {
        if !registry.contains(&id) {
            registry.register(
                id.clone(),
                Arc::new(ScriptedSpecialist::replying(format!(
                    "Placeholder reply from {} covering the requested topics in outline form.",
                    id
                ))),
            );
        }
    }
    registry
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let cli = Cli::parse();

    let raw = std::fs::read_to_string(&cli.routing)
        .with_context(|| format!("Failed to read routing table {}", cli.routing.display()))?;
    let routing = RoutingTable::new(RoutingConfig::from_json(&raw)?)?;

    let scenario = load_scenario(cli.scenario.as_ref())?;
    let registry = build_registry(&routing, &scenario);

    let config = CoordinatorConfig {
        round_ceiling: cli.rounds,
        specialist_timeout_ms: cli.timeout_ms,
        conflict_rules: scenario.conflict_rules.clone(),
        constraints: scenario.constraints.clone(),
        ..CoordinatorConfig::default()
    };

    let mut coordinator = Coordinator::new(config, routing, registry)?;
    let outcome = coordinator.run(&cli.request).await?;

    println!("{}", outcome.answer.text);

    if cli.verbose {
        eprintln!(
            "rounds: {}, invocations: {}, caveats: {}",
            outcome.answer.rounds_used,
            outcome.answer.invocations,
            outcome.answer.caveats.len()
        );
        for event in &outcome.events {
            eprintln!("{}", serde_json::to_string(event)?);
        }
    }

    Ok(())
}
