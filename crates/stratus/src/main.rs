mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "stratus")]
#[command(version)]
#[command(about = "Declarative cloud topology provisioning", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate a specification and print a summary
    Validate {
        /// Specification file (.json, .yaml or .yml)
        spec: PathBuf,
    },
    /// Show the actions an apply would take, without applying
    Plan {
        /// Specification file (.json, .yaml or .yml)
        spec: PathBuf,
        /// Provider backend
        #[arg(long, env = "STRATUS_PROVIDER", default_value = "memory")]
        provider: String,
    },
    /// Apply the specification against the provider
    Apply {
        /// Specification file (.json, .yaml or .yml)
        spec: PathBuf,
        /// Provider backend
        #[arg(long, env = "STRATUS_PROVIDER", default_value = "memory")]
        provider: String,
        /// Worker limit for intra-level parallelism
        #[arg(long, default_value_t = 4)]
        parallelism: usize,
        /// Apply without the confirmation gate
        #[arg(short, long)]
        yes: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let code = match cli.command {
        Commands::Validate { spec } => commands::validate::handle(&spec).await?,
        Commands::Plan { spec, provider } => commands::plan::handle(&spec, &provider).await?,
        Commands::Apply {
            spec,
            provider,
            parallelism,
            yes,
        } => commands::apply::handle(&spec, &provider, parallelism, yes).await?,
    };
    std::process::exit(code);
}
