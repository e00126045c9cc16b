mod cli;
mod commands;
mod monitor;
mod shared;
mod stream;

use clap::Parser;
use cli::{Cli, Commands};
use shared::error::RalphError;
use tracing_subscriber::EnvFilter;

fn init_tracing() {
    let filter = EnvFilter::try_from_env("RALPH_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

#[tokio::main]
async fn main() {
    init_tracing();
    let cli = Cli::parse();

    let result = match cli.command {
        Some(Commands::Run(args)) => commands::run::execute(args).await,
        Some(Commands::Spec(args)) => commands::spec::execute(args).await,
        None => commands::run::execute(cli.run_args).await,
    };

    if let Err(e) = result {
        match e {
            RalphError::Interrupted => {
                std::process::exit(130); // Standard exit code for Ctrl+C
            }
            _ => {
                eprintln!("Error: {}", e);
                std::process::exit(1);
            }
        }
    }
}
