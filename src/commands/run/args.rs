use clap::Args;
use std::path::PathBuf;

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Number of monitored iterations to run
    #[arg(short = 'n', long, default_value = "1")]
    pub iterations: u32,

    /// Prompt to send to claude (takes priority over --prompt-file)
    #[arg(short, long)]
    pub prompt: Option<String>,

    /// Read the prompt from a file (relative to --cwd)
    #[arg(long)]
    pub prompt_file: Option<PathBuf>,

    /// Working directory for claude
    #[arg(long)]
    pub cwd: Option<PathBuf>,

    /// Seconds without agent activity before the process is killed [default: 120]
    #[arg(long, value_name = "SECS")]
    pub timeout_idle: Option<u64>,

    /// Save the raw event stream as JSONL (default path: <runs_dir>/<timestamp>.jsonl)
    #[arg(long, value_name = "PATH", num_args = 0..=1)]
    pub save_jsonl: Option<Option<PathBuf>>,

    /// Only print the per-iteration summary
    #[arg(short, long)]
    pub quiet: bool,

    /// Feature title; creates feat/<slug> when on main/master
    #[arg(long)]
    pub title: Option<String>,

    /// Model passed to claude
    #[arg(long)]
    pub model: Option<String>,

    /// Path to config file (default: .ralph.toml)
    #[arg(short, long, default_value = ".ralph.toml")]
    pub config: PathBuf,
}
