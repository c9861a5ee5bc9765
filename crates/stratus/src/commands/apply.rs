use crate::commands::{common, plan::print_plan};
use colored::Colorize;
use std::path::Path;
use std::sync::Arc;
use stratus_cloud::{ApplyReport, EnvSecretStore, NodeState, SecretStore, StateManager};
use stratus_engine::{Executor, ExecutorOptions};
use tokio_util::sync::CancellationToken;

pub async fn handle(
    spec_path: &Path,
    provider_name: &str,
    parallelism: usize,
    yes: bool,
) -> anyhow::Result<i32> {
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
            eprintln!("{}", "✗ validation failed".red().bold());
            eprintln!("  {e}");
            return Ok(1);
        }
    };

    let manager = StateManager::new(std::env::current_dir()?);
    let mut state = manager.load().await?;

    let plan = match executor.plan(&graph, &state).await {
        Ok(plan) => plan,
        Err(e) => {
            eprintln!("{}", "✗ planning failed".red().bold());
            eprintln!("  {e}");
            return Ok(1);
        }
    };

    print_plan(&plan);
    println!();
    println!("{}", plan.summary());

    if !plan.has_changes {
        println!("{}", "Nothing to do.".green());
        return Ok(0);
    }
    if !yes {
        println!();
        println!("{}", "Run again with --yes to apply these changes.".yellow());
        return Ok(0);
    }

    let lock = manager.acquire_lock().await?;

    // Interrupt finishes in-flight nodes, then blocks the rest
    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::warn!("interrupt received, finishing in-flight nodes");
                cancel.cancel();
            }
        });
    }

    let options = ExecutorOptions { parallelism };
    println!();
    println!("{}", "Applying...".blue().bold());
    let result = executor.apply(&graph, &mut state, &options, &cancel).await;

    // Whatever happened, persist what landed before reporting
    manager.save(&state).await?;
    lock.release().await?;

    match result {
        Ok(report) => {
            print_report(&report);
            if report.is_clean() {
                Ok(0)
            } else if report.is_partial() {
                Ok(2)
            } else {
                Ok(1)
            }
        }
        Err(e) => {
            eprintln!("{}", "✗ apply failed".red().bold());
            eprintln!("  {e}");
            Ok(1)
        }
    }
}

fn print_report(report: &ApplyReport) {
    println!();
    for outcome in &report.outcomes {
        match outcome.state {
            NodeState::Applied => {
                let action = outcome
                    .action
                    .map(|a| a.to_string())
                    .unwrap_or_else(|| "applied".to_string());
                println!(
                    "  {} {} ({}, {})",
                    "✓".green(),
                    outcome.node_id.cyan(),
                    outcome.resource_type,
                    action
                );
                let mut outputs: Vec<_> = outcome.outputs.iter().collect();
                outputs.sort_by_key(|(name, _)| name.as_str());
                for (name, value) in outputs {
                    println!("      {name} = {value}");
                }
            }
            NodeState::Failed => {
                println!(
                    "  {} {} ({})",
                    "✗".red(),
                    outcome.node_id.cyan(),
                    outcome.resource_type
                );
                if let Some(error) = &outcome.error {
                    println!("      {}", error.red());
                }
            }
            _ => {
                println!(
                    "  {} {} ({}, {})",
                    "-".yellow(),
                    outcome.node_id.cyan(),
                    outcome.resource_type,
                    outcome.state
                );
            }
        }
    }
    println!();
    if report.cancelled {
        println!("{}", "Run cancelled.".yellow().bold());
    }
    println!("{}", report.summary());
}
