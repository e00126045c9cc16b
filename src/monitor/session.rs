use std::sync::Arc;
use std::time::Duration;

use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::state::{RunError, RunState};
use crate::shared::error::RalphError;
use crate::shared::jsonl_log::JsonlLogger;
use crate::stream::{AgentCommand, ExitReport, IdleWatchdog, StreamEvent, StreamItem, StreamReader};

const TICK_INTERVAL: Duration = Duration::from_millis(250);

/// Read-only view of a session as it progresses.
pub trait RunObserver {
    fn on_event(&mut self, _state: &RunState, _event: &StreamEvent) {}
    fn on_tick(&mut self, _state: &RunState) {}
}

#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub idle_timeout: Duration,
    pub raw_log: Option<Arc<JsonlLogger>>,
}

/// Everything known about a session once its stream has ended.
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub state: RunState,
    /// `None` when the process never started.
    pub exit: Option<ExitReport>,
    pub idle_timed_out: bool,
    pub interrupted: bool,
}

impl RunOutcome {
    pub fn succeeded(&self) -> bool {
        self.state.error().is_none() && self.exit.is_some_and(|e| e.success())
    }
}

/// Monitor one agent process from spawn to exit.
///
/// A spawn failure is not an `Err`: it is recorded on the returned state so the
/// caller can render it like any other run failure. `shutdown` terminates the
/// child and marks the outcome as interrupted.
pub async fn run_session<O: RunObserver>(
    command: &AgentCommand,
    config: &SessionConfig,
    shutdown: &CancellationToken,
    observer: &mut O,
) -> RunOutcome {
    let mut state = RunState::new();

    let mut reader = StreamReader::new();
    if let Some(ref log) = config.raw_log {
        reader = reader.with_raw_log(log.clone());
    }

    let mut handle = match reader.start(command).await {
        Ok(handle) => handle,
        Err(e) => {
            let message = match e {
                RalphError::Spawn(message) => message,
                other => other.to_string(),
            };
            state.record_error(RunError::Spawn(message));
            state.finish();
            return RunOutcome {
                state,
                exit: None,
                idle_timed_out: false,
                interrupted: false,
            };
        }
    };

    let watchdog = IdleWatchdog::arm(config.idle_timeout, handle.terminator());
    let started = Instant::now();
    let mut ticker = tokio::time::interval(TICK_INTERVAL);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut interrupted = false;

    let exit = loop {
        tokio::select! {
            biased;

            _ = shutdown.cancelled(), if !interrupted => {
                interrupted = true;
                info!("interrupt received, stopping agent");
                handle.terminate();
            }

            item = handle.next() => {
                match item {
                    Some(StreamItem::Event(event)) => {
                        watchdog.touch();
                        state.apply(&event);
                        observer.on_event(&state, &event);
                    }
                    Some(StreamItem::Exited(report)) => break Some(report),
                    None => {
                        warn!("agent stream closed without an exit status");
                        break None;
                    }
                }
            }

            _ = ticker.tick() => {
                state.tick(started.elapsed().as_millis() as u64);
                observer.on_tick(&state);
            }
        }
    };

    watchdog.disarm();
    state.tick(started.elapsed().as_millis() as u64);

    let idle_timed_out = watchdog.fired();
    if idle_timed_out {
        state.record_error(RunError::IdleTimeout {
            timeout_ms: config.idle_timeout.as_millis() as u64,
        });
    }
    state.finish();
    observer.on_tick(&state);

    debug!(
        ?exit,
        idle_timed_out,
        interrupted,
        completed = state.stats().tools_completed,
        "session finished"
    );

    RunOutcome {
        state,
        exit,
        idle_timed_out,
        interrupted,
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::monitor::state::Phase;
    use crate::stream::reader::IoMode;

    struct NoopObserver;

    impl RunObserver for NoopObserver {}

    fn shell(script: &str) -> AgentCommand {
        AgentCommand {
            program: "sh".into(),
            args: vec!["-c".into(), script.into()],
            cwd: None,
            mode: IoMode::Headless,
            stdin_payload: String::new(),
        }
    }

    fn config(idle_timeout: Duration) -> SessionConfig {
        SessionConfig {
            idle_timeout,
            raw_log: None,
        }
    }

    #[derive(Default)]
    struct Recorder {
        phases: Vec<Phase>,
        ticks: usize,
    }

    impl RunObserver for Recorder {
        fn on_event(&mut self, state: &RunState, _event: &StreamEvent) {
            self.phases.push(state.phase());
        }

        fn on_tick(&mut self, _state: &RunState) {
            self.ticks += 1;
        }
    }

    #[tokio::test]
    async fn test_session_folds_stream_into_state() {
        let script = r#"
echo '{"type":"assistant","message":{"content":[{"type":"text","text":"Reading the code"},{"type":"tool_use","id":"t1","name":"Read","input":{"file_path":"a.rs"}}]}}'
echo '{"type":"user","message":{"content":[{"type":"tool_result","tool_use_id":"t1"}]}}'
echo '{"type":"result","result":"<promise>COMPLETE</promise>","is_error":false}'
"#;
        let mut recorder = Recorder::default();
        let outcome = run_session(
            &shell(script),
            &config(Duration::from_secs(10)),
            &CancellationToken::new(),
            &mut recorder,
        )
        .await;

        assert!(outcome.succeeded());
        assert_eq!(outcome.state.phase(), Phase::Done);
        assert_eq!(outcome.state.task_text(), Some("Reading the code"));
        assert_eq!(outcome.state.stats().reads, 1);
        assert_eq!(outcome.state.result(), Some("<promise>COMPLETE</promise>"));
        assert_eq!(
            recorder.phases,
            vec![Phase::Thinking, Phase::Reading, Phase::Thinking, Phase::Thinking]
        );
        assert!(recorder.ticks >= 1);
    }

    #[tokio::test]
    async fn test_idle_timeout_terminates_silent_agent() {
        let outcome = run_session(
            &shell("sleep 30"),
            &config(Duration::from_millis(200)),
            &CancellationToken::new(),
            &mut NoopObserver,
        )
        .await;

        assert!(outcome.idle_timed_out);
        assert!(outcome.exit.is_some_and(|e| e.terminated));
        assert_eq!(
            outcome.state.error(),
            Some(&RunError::IdleTimeout { timeout_ms: 200 })
        );
        assert_eq!(outcome.state.phase(), Phase::Done);
    }

    #[tokio::test]
    async fn test_fatal_event_keeps_partial_progress() {
        let script = r#"
echo '{"type":"assistant","message":{"content":[{"type":"tool_use","id":"t1","name":"Bash","input":{}}]}}'
echo '{"type":"user","message":{"content":[{"type":"tool_result","tool_use_id":"t1"}]}}'
echo '{"type":"error","message":"Overloaded"}'
exit 1
"#;
        let outcome = run_session(
            &shell(script),
            &config(Duration::from_secs(10)),
            &CancellationToken::new(),
            &mut NoopObserver,
        )
        .await;

        assert!(!outcome.succeeded());
        assert_eq!(outcome.exit.and_then(|e| e.code), Some(1));
        assert_eq!(outcome.state.error(), Some(&RunError::Fatal("Overloaded".into())));
        assert_eq!(outcome.state.tool_groups().len(), 1);
    }

    #[tokio::test]
    async fn test_shutdown_interrupts_session() {
        let shutdown = CancellationToken::new();
        let trigger = shutdown.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            trigger.cancel();
        });

        let outcome = run_session(
            &shell("sleep 30"),
            &config(Duration::from_secs(60)),
            &shutdown,
            &mut NoopObserver,
        )
        .await;

        assert!(outcome.interrupted);
        assert!(!outcome.idle_timed_out);
        assert!(outcome.state.error().is_none());
    }

    #[tokio::test]
    async fn test_spawn_failure_is_recorded_on_state() {
        let mut command = shell("");
        command.program = "definitely-not-a-real-agent-binary".into();

        let outcome = run_session(
            &command,
            &config(Duration::from_secs(1)),
            &CancellationToken::new(),
            &mut NoopObserver,
        )
        .await;

        assert!(outcome.exit.is_none());
        assert!(matches!(outcome.state.error(), Some(RunError::Spawn(_))));
        assert_eq!(outcome.state.phase(), Phase::Done);
    }
}
