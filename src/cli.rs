use clap::{Parser, Subcommand};

use crate::commands::run::RunArgs;
use crate::commands::spec::SpecArgs;

#[derive(Parser, Debug)]
#[command(name = "ralph-monitor")]
#[command(version)]
#[command(about = "Run claude in a monitored loop until the completion promise is found")]
#[command(args_conflicts_with_subcommands = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// When no subcommand is given, all args are RunArgs
    #[command(flatten)]
    pub run_args: RunArgs,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run claude in a monitored loop until the completion promise is found
    Run(RunArgs),

    /// Generate a spec document, optionally reviewing and refining it
    Spec(SpecArgs),
}
