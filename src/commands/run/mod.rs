mod args;
mod config;
mod presenter;
mod prompt;
mod render;

pub use args::RunArgs;
pub(crate) use config::absolute_cwd;

use std::sync::Arc;

use crossterm::style::Stylize;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::monitor::{RunError, RunOutcome, SessionConfig, run_session};
use crate::shared::error::{RalphError, Result};
use crate::shared::git;
use crate::shared::jsonl_log::JsonlLogger;
use crate::stream::AgentCommand;

use config::{Config, JsonlTarget};
use presenter::{Presenter, final_status};
use prompt::contains_promise;

/// What the loop does after an iteration.
#[derive(Debug)]
enum Step {
    Continue,
    Complete,
    Stop(RalphError),
}

fn next_step(outcome: &RunOutcome, completion_promise: &str) -> Step {
    if outcome.interrupted {
        return Step::Stop(RalphError::Interrupted);
    }
    if outcome.exit.is_none()
        && let Some(RunError::Spawn(message)) = outcome.state.error()
    {
        return Step::Stop(RalphError::Spawn(message.clone()));
    }
    if outcome
        .state
        .result()
        .is_some_and(|text| contains_promise(text, completion_promise))
    {
        return Step::Complete;
    }
    Step::Continue
}

fn open_raw_log(target: Option<&JsonlTarget>) -> Result<Option<Arc<JsonlLogger>>> {
    let logger = match target {
        None => return Ok(None),
        Some(JsonlTarget::RunsDir(dir)) => JsonlLogger::new(dir, None)?,
        Some(JsonlTarget::File(path)) => JsonlLogger::at_path(path.clone())?,
    };
    info!(path = %logger.filepath().display(), "saving raw event stream");
    Ok(Some(Arc::new(logger)))
}

fn report_branch(result: &git::GitBranchResult) {
    match result {
        git::GitBranchResult {
            error: Some(error), ..
        } => eprintln!("{} {}", "warning:".yellow().bold(), error),
        git::GitBranchResult {
            created: true,
            branch_name: Some(branch),
            ..
        } => println!("{} {}", "Created branch".dark_grey(), branch.as_str().cyan()),
        git::GitBranchResult {
            branch_name: Some(branch),
            ..
        } => println!("{} {}", "Switched to branch".dark_grey(), branch.as_str().cyan()),
        _ => {}
    }
}

pub async fn execute(args: RunArgs) -> Result<()> {
    let config = Config::build(args)?;

    // Ctrl+C: stop the current agent, then leave the loop
    let shutdown = CancellationToken::new();
    {
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            if signal::ctrl_c().await.is_ok() {
                shutdown.cancel();
            }
        });
    }

    if let Some(ref title) = config.title {
        let result = git::create_feature_branch(&config.cwd, title).await;
        report_branch(&result);
    }

    let raw_log = open_raw_log(config.save_jsonl.as_ref())?;
    let session_config = SessionConfig {
        idle_timeout: config.idle_timeout,
        raw_log: raw_log.clone(),
    };
    let command = AgentCommand::headless(
        &config.prompt,
        config.model.as_deref(),
        Some(config.cwd.clone()),
    )?;

    let mut found_promise = false;
    let mut iterations_run = 0;
    let mut result = Ok(());

    for iteration in 1..=config.iterations {
        if shutdown.is_cancelled() {
            result = Err(RalphError::Interrupted);
            break;
        }

        info!(iteration, total = config.iterations, "starting iteration");
        let mut presenter = Presenter::new(iteration, config.iterations, config.quiet);
        let outcome = run_session(&command, &session_config, &shutdown, &mut presenter).await;
        presenter.finish(&outcome);
        iterations_run = iteration;

        match next_step(&outcome, &config.completion_promise) {
            Step::Continue => {
                if let Some(error) = outcome.state.error() {
                    warn!(iteration, %error, "iteration failed, continuing");
                }
            }
            Step::Complete => {
                found_promise = true;
                break;
            }
            Step::Stop(e) => {
                result = Err(e);
                break;
            }
        }
    }

    if let Some(log) = raw_log {
        log.close();
        println!(
            "{} {}",
            "Event log:".dark_grey(),
            log.filepath().display()
        );
    }

    if result.is_ok() {
        println!();
        println!(
            "{}",
            final_status(found_promise, iterations_run, &config.completion_promise)
        );
    }
    result
}
