use std::path::PathBuf;

use tracing::{info, warn};

use super::launcher::{AttemptKind, AttemptLauncher, AttemptOutput, AttemptRequest};
use super::prompts;
use super::review::{ReviewOutcome, parse_review};
use crate::shared::error::{RalphError, Result};
use crate::stream::reader::IoMode;

#[derive(Debug, Clone)]
pub struct SpecOptions {
    pub description: String,
    /// Absolute path of the spec file the agent is asked to write.
    pub spec_path: PathBuf,
    pub headless: bool,
    pub autonomous: bool,
    pub max_attempts: u32,
}

/// One review in the autonomous loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttemptRecord {
    pub attempt_number: u32,
    pub outcome: Option<ReviewOutcome>,
    pub success: bool,
}

#[derive(Debug, Clone)]
pub struct SpecResult {
    pub success: bool,
    pub review_passed: bool,
    /// Number of reviews run; always `history.len()`.
    pub attempts: u32,
    pub spec_path: PathBuf,
    pub error: Option<String>,
    pub history: Vec<AttemptRecord>,
}

impl SpecResult {
    fn finish(options: &SpecOptions, history: Vec<AttemptRecord>, error: Option<String>) -> Self {
        let review_passed = history.last().is_some_and(|r| r.success);
        Self {
            success: error.is_none(),
            review_passed,
            attempts: history.len() as u32,
            spec_path: options.spec_path.clone(),
            error,
            history,
        }
    }
}

/// Drives generate, then (autonomous only) review and refine until a review
/// passes or `max_attempts` reviews have failed.
///
/// Launch failures become a failed result with a reason; only an operator
/// interrupt is returned as `Err`.
pub(crate) struct SpecController<'a, L> {
    options: &'a SpecOptions,
    launcher: &'a mut L,
    history: Vec<AttemptRecord>,
}

impl<'a, L: AttemptLauncher> SpecController<'a, L> {
    pub fn new(options: &'a SpecOptions, launcher: &'a mut L) -> Self {
        Self {
            options,
            launcher,
            history: Vec::new(),
        }
    }

    pub async fn run(mut self) -> Result<SpecResult> {
        match self.drive().await {
            Ok(()) => Ok(SpecResult::finish(self.options, self.history, None)),
            Err(RalphError::Interrupted) => Err(RalphError::Interrupted),
            Err(e) => {
                warn!("spec generation failed: {}", e);
                Ok(SpecResult::finish(
                    self.options,
                    self.history,
                    Some(e.to_string()),
                ))
            }
        }
    }

    async fn attempt(
        &mut self,
        kind: AttemptKind,
        prompt: String,
        mode: IoMode,
    ) -> Result<AttemptOutput> {
        let request = AttemptRequest { kind, prompt, mode };
        let output = self.launcher.launch(&request).await?;
        if !output.exit.success() {
            warn!(?kind, exit = ?output.exit, "attempt exited unsuccessfully");
        }
        Ok(output)
    }

    async fn drive(&mut self) -> Result<()> {
        let options = self.options;

        // Autonomous runs never hand the terminal to the agent.
        let (prompt, mode) = if options.headless || options.autonomous {
            (
                prompts::headless_generation(&options.description, &options.spec_path),
                IoMode::Headless,
            )
        } else {
            (
                prompts::interactive_generation(&options.description),
                IoMode::Interactive,
            )
        };

        self.attempt(AttemptKind::Generate, prompt, mode).await?;
        if !options.spec_path.exists() {
            return Err(RalphError::MissingFile(format!(
                "Spec file {} was not created",
                options.spec_path.display()
            )));
        }

        if !options.autonomous {
            return Ok(());
        }

        let mut attempt_number = 1;
        loop {
            info!(attempt_number, max = options.max_attempts, "reviewing spec");
            let review = self
                .attempt(
                    AttemptKind::Review,
                    prompts::review(&options.spec_path),
                    IoMode::Headless,
                )
                .await?;
            let outcome = parse_review(&review.text);
            let passed = outcome.passed();
            self.history.push(AttemptRecord {
                attempt_number,
                outcome: Some(outcome.clone()),
                success: passed,
            });

            if passed {
                info!(attempt_number, "spec review passed");
                return Ok(());
            }
            if attempt_number >= options.max_attempts {
                return Err(RalphError::MaxAttempts(options.max_attempts));
            }

            info!(attempt_number, "spec review failed, refining");
            self.attempt(
                AttemptKind::Refine,
                prompts::refine(&options.spec_path, &outcome),
                IoMode::Headless,
            )
            .await?;
            attempt_number += 1;
        }
    }
}
