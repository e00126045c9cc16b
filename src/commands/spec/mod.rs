mod args;
mod controller;
mod launcher;
mod prompts;
mod review;

pub use args::SpecArgs;

use std::path::PathBuf;
use std::time::Duration;

use crossterm::style::Stylize;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::commands::run::absolute_cwd;
use crate::shared::error::{RalphError, Result};
use crate::shared::file_config::FileConfig;
use crate::shared::icons;

use controller::{SpecController, SpecOptions, SpecResult};
use launcher::ClaudeLauncher;

/// Everything `spec` needs after merging flags over `.ralph.toml`.
#[derive(Debug)]
struct Settings {
    options: SpecOptions,
    cwd: PathBuf,
    model: Option<String>,
    idle_timeout: Duration,
}

impl Settings {
    fn merge(args: SpecArgs, cwd: PathBuf, file_config: FileConfig) -> Result<Self> {
        let spec = file_config.spec;

        let max_attempts = args.max_attempts.unwrap_or(spec.max_attempts);
        if max_attempts == 0 {
            return Err(RalphError::Config("--max-attempts must be at least 1".into()));
        }
        let idle_timeout_secs = args.timeout_idle.unwrap_or(spec.idle_timeout_secs);
        if idle_timeout_secs == 0 {
            return Err(RalphError::Config("--timeout-idle must be positive".into()));
        }
        if args.description.trim().is_empty() {
            return Err(RalphError::Config("Spec description must not be empty".into()));
        }

        let spec_path = if spec.file.is_absolute() {
            spec.file
        } else {
            cwd.join(spec.file)
        };

        Ok(Self {
            options: SpecOptions {
                description: args.description,
                spec_path,
                headless: args.headless,
                autonomous: args.autonomous,
                max_attempts,
            },
            model: args.model.or(spec.model),
            idle_timeout: Duration::from_secs(idle_timeout_secs),
            cwd,
        })
    }
}

fn print_result(result: &SpecResult) {
    for record in &result.history {
        let (icon, verdict) = if record.success {
            (icons::status_check().green().bold(), "PASS".green())
        } else {
            (icons::status_fail().red().bold(), "FAIL".red())
        };
        let issues = record.outcome.as_ref().map_or(0, |o| {
            o.format_issues.len() + o.content_concerns.len()
        });
        println!(
            "{} Review {}: {} {}",
            icon,
            record.attempt_number,
            verdict,
            format!("({} issues)", issues).dark_grey()
        );
    }

    if result.success {
        let note = if result.review_passed {
            format!(" after {} review(s)", result.attempts)
        } else {
            String::new()
        };
        println!(
            "{} {} {}{}",
            icons::status_check().green().bold(),
            "Spec written:".green().bold(),
            result.spec_path.display(),
            note
        );
    }
}

/// Turn an unsuccessful result into the error `main` reports.
fn failure(result: &SpecResult, max_attempts: u32) -> RalphError {
    if !result.review_passed && result.attempts >= max_attempts {
        return RalphError::MaxAttempts(max_attempts);
    }
    RalphError::SpecFailed(
        result
            .error
            .clone()
            .unwrap_or_else(|| "Spec generation failed".into()),
    )
}

pub async fn execute(args: SpecArgs) -> Result<()> {
    let cwd = absolute_cwd(args.cwd.as_deref())?;
    let config_path = if args.config.is_absolute() {
        args.config.clone()
    } else {
        cwd.join(&args.config)
    };
    let file_config = FileConfig::load_from_path(&config_path)?;
    let settings = Settings::merge(args, cwd, file_config)?;

    let shutdown = CancellationToken::new();
    {
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            if signal::ctrl_c().await.is_ok() {
                shutdown.cancel();
            }
        });
    }

    info!(
        spec = %settings.options.spec_path.display(),
        autonomous = settings.options.autonomous,
        "generating spec"
    );
    let mut launcher = ClaudeLauncher::new(
        settings.cwd.clone(),
        settings.model.clone(),
        settings.idle_timeout,
        shutdown,
    );
    let result = SpecController::new(&settings.options, &mut launcher)
        .run()
        .await?;

    print_result(&result);
    if result.success {
        Ok(())
    } else {
        Err(failure(&result, settings.options.max_attempts))
    }
}
