use crate::commands::common;
use colored::Colorize;
use std::path::Path;
use std::sync::Arc;
use stratus_cloud::{ActionKind, EnvSecretStore, Plan, SecretStore, StateManager};
use stratus_engine::Executor;

pub async fn handle(spec_path: &Path, provider_name: &str) -> anyhow::Result<i32> {
    let spec = match stratus_core::load_spec(spec_path) {
        Ok(spec) => spec,
        Err(e) => {
            eprintln!("{}", "✗ invalid specification".red().bold());
            eprintln!("  {e}");
            return Ok(1);
        }
    };

    let provider = common::make_provider(provider_name)?;
    let secrets: Arc<dyn SecretStore> = Arc::new(EnvSecretStore::new());
    let executor = Executor::new(provider, secrets);

    let graph = match common::build_graph(&spec, &executor).await {
        Ok(graph) => graph,
        Err(e) => {
            eprintln!("{}", "✗ planning failed".red().bold());
            eprintln!("  {e}");
            return Ok(1);
        }
    };

    let manager = StateManager::new(std::env::current_dir()?);
    let state = manager.load().await?;

    let plan = match executor.plan(&graph, &state).await {
        Ok(plan) => plan,
        Err(e) => {
            eprintln!("{}", "✗ planning failed".red().bold());
            eprintln!("  {e}");
            return Ok(1);
        }
    };

    println!("Planned actions for {}:", spec.name.cyan());
    println!();
    print_plan(&plan);
    println!();
    println!("{}", plan.summary());

    Ok(0)
}

pub fn print_plan(plan: &Plan) {
    for action in &plan.actions {
        let line = format!(
            "{} ({}){}",
            action.node_id,
            action.resource_type,
            action
                .reason
                .as_ref()
                .map(|r| format!(" — {r}"))
                .unwrap_or_default()
        );
        match action.kind {
            ActionKind::Create => println!("  {} {}", "+".green(), line),
            ActionKind::Update => println!("  {} {}", "~".yellow(), line),
            ActionKind::Replace => println!("  {} {}", "-/+".red(), line),
            ActionKind::Delete => println!("  {} {}", "-".red(), line),
            ActionKind::NoOp => println!("    {line}"),
        }
    }
}
