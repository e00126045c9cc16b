use clap::Args;
use std::path::PathBuf;

#[derive(Args, Debug)]
pub struct SpecArgs {
    /// What the spec should describe
    pub description: String,

    /// Working directory for claude and the spec file
    #[arg(long)]
    pub cwd: Option<PathBuf>,

    /// Run claude without its terminal UI, using an embedded prompt
    #[arg(long)]
    pub headless: bool,

    /// Review and refine the generated spec until it passes
    #[arg(long)]
    pub autonomous: bool,

    /// Review attempts before giving up (autonomous mode) [default: 3]
    #[arg(long, value_name = "N")]
    pub max_attempts: Option<u32>,

    /// Model passed to claude
    #[arg(long)]
    pub model: Option<String>,

    /// Seconds without agent activity before an attempt is killed [default: 300]
    #[arg(long, value_name = "SECS")]
    pub timeout_idle: Option<u64>,

    /// Path to config file (default: .ralph.toml)
    #[arg(short, long, default_value = ".ralph.toml")]
    pub config: PathBuf,
}
