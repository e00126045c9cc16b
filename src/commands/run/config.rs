use std::path::{Path, PathBuf};
use std::time::Duration;

use super::args::RunArgs;
use super::prompt::resolve_prompt;
use crate::shared::error::{RalphError, Result};
use crate::shared::file_config::FileConfig;

/// Where the raw event stream goes, if anywhere.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JsonlTarget {
    /// Timestamp-named file inside the runs directory.
    RunsDir(PathBuf),
    File(PathBuf),
}

#[derive(Debug, Clone)]
pub struct Config {
    pub prompt: String,
    pub iterations: u32,
    pub cwd: PathBuf,
    pub idle_timeout: Duration,
    pub completion_promise: String,
    pub save_jsonl: Option<JsonlTarget>,
    pub quiet: bool,
    pub title: Option<String>,
    pub model: Option<String>,
}

impl Config {
    /// Merge CLI flags over `.ralph.toml` over built-in defaults.
    ///
    /// Fails before anything is spawned if a requested prompt file is missing.
    pub fn build(args: RunArgs) -> Result<Self> {
        let cwd = absolute_cwd(args.cwd.as_deref())?;
        let config_path = if args.config.is_absolute() {
            args.config.clone()
        } else {
            cwd.join(&args.config)
        };
        let file_config = FileConfig::load_from_path(&config_path)?;
        Self::merge(args, cwd, file_config)
    }

    fn merge(args: RunArgs, cwd: PathBuf, file_config: FileConfig) -> Result<Self> {
        if args.iterations == 0 {
            return Err(RalphError::Config("--iterations must be at least 1".into()));
        }

        let completion_promise = file_config.run.completion_promise.clone();
        let raw_prompt = resolve_prompt(
            args.prompt.as_deref(),
            args.prompt_file.as_deref(),
            &cwd,
            &completion_promise,
        )?;
        let prompt = file_config.wrap_user_prompt(&raw_prompt);

        let idle_timeout_secs = args
            .timeout_idle
            .unwrap_or(file_config.run.idle_timeout_secs);
        if idle_timeout_secs == 0 {
            return Err(RalphError::Config("--timeout-idle must be positive".into()));
        }

        let save_jsonl = args.save_jsonl.map(|path| match path {
            Some(path) if path.is_absolute() => JsonlTarget::File(path),
            Some(path) => JsonlTarget::File(cwd.join(path)),
            None => JsonlTarget::RunsDir(cwd.join(&file_config.run.runs_dir)),
        });

        Ok(Self {
            prompt,
            iterations: args.iterations,
            idle_timeout: Duration::from_secs(idle_timeout_secs),
            completion_promise,
            save_jsonl,
            quiet: args.quiet,
            title: args.title,
            model: args.model.or(file_config.run.model),
            cwd,
        })
    }
}

pub(crate) fn absolute_cwd(cwd: Option<&Path>) -> Result<PathBuf> {
    let current = std::env::current_dir()?;
    let cwd = match cwd {
        Some(dir) if dir.is_absolute() => dir.to_path_buf(),
        Some(dir) => current.join(dir),
        None => current,
    };
    if !cwd.is_dir() {
        return Err(RalphError::Config(format!(
            "Working directory does not exist: {}",
            cwd.display()
        )));
    }
    Ok(cwd)
}
