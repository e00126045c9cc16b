use std::path::PathBuf;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::shared::error::{RalphError, Result};
use crate::stream::reader::IoMode;
use crate::stream::{AgentCommand, ExitReport, IdleWatchdog, StreamEvent, StreamItem, StreamReader};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptKind {
    Generate,
    Review,
    Refine,
}

#[derive(Debug, Clone)]
pub struct AttemptRequest {
    pub kind: AttemptKind,
    pub prompt: String,
    pub mode: IoMode,
}

#[derive(Debug, Clone)]
pub struct AttemptOutput {
    pub exit: ExitReport,
    /// The agent's final answer, or its visible messages if it gave none.
    pub text: String,
}

/// Runs one agent process to completion.
///
/// Implementations must run attempts strictly one at a time.
pub(crate) trait AttemptLauncher {
    async fn launch(&mut self, request: &AttemptRequest) -> Result<AttemptOutput>;
}

/// Collects what the agent answered. Extended-thinking text never lands here.
#[derive(Debug, Default)]
struct Transcript {
    said: Vec<String>,
    result: Option<String>,
}

impl Transcript {
    fn push(&mut self, event: &StreamEvent) {
        match event {
            StreamEvent::Thought {
                text,
                reasoning: false,
                ..
            } => self.said.push(text.clone()),
            StreamEvent::Result {
                text: Some(text), ..
            } if !text.trim().is_empty() => self.result = Some(text.clone()),
            _ => {}
        }
    }

    fn into_text(self) -> String {
        self.result.unwrap_or_else(|| self.said.join("\n"))
    }
}

/// Launches the real claude CLI.
pub struct ClaudeLauncher {
    cwd: PathBuf,
    model: Option<String>,
    idle_timeout: Duration,
    shutdown: CancellationToken,
}

impl ClaudeLauncher {
    pub fn new(
        cwd: PathBuf,
        model: Option<String>,
        idle_timeout: Duration,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            cwd,
            model,
            idle_timeout,
            shutdown,
        }
    }
}

impl AttemptLauncher for ClaudeLauncher {
    async fn launch(&mut self, request: &AttemptRequest) -> Result<AttemptOutput> {
        let command = match request.mode {
            IoMode::Headless => AgentCommand::headless(
                &request.prompt,
                self.model.as_deref(),
                Some(self.cwd.clone()),
            )?,
            IoMode::Interactive => AgentCommand::interactive(
                &request.prompt,
                self.model.as_deref(),
                Some(self.cwd.clone()),
            ),
        };

        info!(kind = ?request.kind, mode = ?request.mode, "launching attempt");
        let mut handle = StreamReader::new().start(&command).await?;

        // An interactive session produces no events to watch.
        let watchdog = (request.mode == IoMode::Headless)
            .then(|| IdleWatchdog::arm(self.idle_timeout, handle.terminator()));

        let mut transcript = Transcript::default();
        let mut interrupted = false;

        let exit = loop {
            tokio::select! {
                biased;

                _ = self.shutdown.cancelled(), if !interrupted => {
                    interrupted = true;
                    handle.terminate();
                }

                item = handle.next() => match item {
                    Some(StreamItem::Event(event)) => {
                        if let Some(ref watchdog) = watchdog {
                            watchdog.touch();
                        }
                        transcript.push(&event);
                    }
                    Some(StreamItem::Exited(report)) => break report,
                    None => break ExitReport { code: None, terminated: false },
                },
            }
        };

        let timed_out = watchdog.as_ref().is_some_and(|w| {
            w.disarm();
            w.fired()
        });
        if interrupted {
            return Err(RalphError::Interrupted);
        }
        if timed_out {
            return Err(RalphError::IdleTimeout {
                secs: self.idle_timeout.as_secs(),
            });
        }

        debug!(kind = ?request.kind, ?exit, "attempt finished");
        Ok(AttemptOutput {
            exit,
            text: transcript.into_text(),
        })
    }
}
