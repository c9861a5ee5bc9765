//! Shared wiring between the plan and apply commands.

use std::sync::Arc;
use stratus_cloud::{MemoryProvider, Provider};
use stratus_core::Specification;
use stratus_engine::{Executor, Graph, topology};

/// Construct the provider backend by name.
///
/// Real cloud backends plug in here as separate crates; the built-in
/// `memory` provider covers tests and local dry runs.
pub fn make_provider(name: &str) -> anyhow::Result<Arc<dyn Provider>> {
    match name {
        "memory" => Ok(Arc::new(MemoryProvider::with_defaults())),
        other => anyhow::bail!("unknown provider '{other}' (available: memory)"),
    }
}

/// Resolve the zone fact, expand per-zone groups, and build the graph.
pub async fn build_graph(
    spec: &Specification,
    executor: &Executor,
) -> stratus_engine::Result<Graph> {
    let expanded = match &spec.topology {
        Some(policy) => {
            let zones = executor
                .facts()
                .resolve_string_list(&policy.zones_fact)
                .await?;
            topology::expand(spec, &zones)?
        }
        None => spec.clone(),
    };
    Graph::build(&expanded)
}
