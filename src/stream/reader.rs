use serde::Serialize;
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use chrono::Utc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdout, Command};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::events::{EventDecoder, StreamEvent};
use crate::shared::error::{RalphError, Result};
use crate::shared::jsonl_log::JsonlLogger;

/// Graceful shutdown timeout: wait this long after SIGTERM before SIGKILL.
const GRACEFUL_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

/// The agent sometimes keeps running after closing stdout.
const PROCESS_EXIT_TIMEOUT: Duration = Duration::from_secs(30);

const CHANNEL_CAPACITY: usize = 256;

// ---------------------------------------------------------------------------
// Process management helpers
// ---------------------------------------------------------------------------

/// Send a signal to an entire process group (-pgid).
///
/// Children are spawned with `process_group(0)`, so their PGID equals their PID
/// and sub-processes started by the agent are reached too.
#[cfg(unix)]
fn signal_process_group(pid: u32, signal: libc::c_int) {
    unsafe {
        libc::kill(-(pid as i32), signal);
    }
}

/// SIGTERM → wait → SIGKILL.
#[cfg(unix)]
async fn graceful_shutdown(child: &mut Child, pid: Option<u32>) {
    if let Some(pid) = pid {
        signal_process_group(pid, libc::SIGTERM);
    }

    if tokio::time::timeout(GRACEFUL_SHUTDOWN_TIMEOUT, child.wait())
        .await
        .is_err()
    {
        if let Some(pid) = pid {
            signal_process_group(pid, libc::SIGKILL);
        }
        child.kill().await.ok();
    }
}

#[cfg(not(unix))]
async fn graceful_shutdown(child: &mut Child, _pid: Option<u32>) {
    child.kill().await.ok();
}

// ---------------------------------------------------------------------------
// stdin protocol structs (stream-json)
// ---------------------------------------------------------------------------

#[derive(Serialize)]
struct StdinControlRequest<'a> {
    #[serde(rename = "type")]
    msg_type: &'a str,
    request_id: &'a str,
    request: StdinInitPayload<'a>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct StdinInitPayload<'a> {
    subtype: &'a str,
    hooks: Option<()>,
}

#[derive(Serialize)]
struct StdinUserMessage<'a> {
    #[serde(rename = "type")]
    msg_type: &'a str,
    session_id: &'a str,
    message: StdinMessageContent<'a>,
    parent_tool_use_id: Option<()>,
}

#[derive(Serialize)]
struct StdinMessageContent<'a> {
    role: &'a str,
    content: Vec<StdinTextBlock<'a>>,
}

#[derive(Serialize)]
struct StdinTextBlock<'a> {
    #[serde(rename = "type")]
    block_type: &'a str,
    text: &'a str,
}

/// Encode the initialize request plus one user message, newline-delimited.
fn stream_json_payload(prompt: &str) -> Result<String> {
    let init = StdinControlRequest {
        msg_type: "control_request",
        request_id: "init-1",
        request: StdinInitPayload {
            subtype: "initialize",
            hooks: None,
        },
    };
    let user = StdinUserMessage {
        msg_type: "user",
        session_id: "",
        message: StdinMessageContent {
            role: "user",
            content: vec![StdinTextBlock {
                block_type: "text",
                text: prompt,
            }],
        },
        parent_tool_use_id: None,
    };
    Ok(format!(
        "{}\n{}\n",
        serde_json::to_string(&init)?,
        serde_json::to_string(&user)?
    ))
}

// ---------------------------------------------------------------------------
// AgentCommand
// ---------------------------------------------------------------------------

/// How the child's stdio is wired.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IoMode {
    /// stdin piped, stdout/stderr inherited; the operator watches the agent directly.
    Interactive,
    /// Everything piped; stdout is decoded as stream-json events.
    Headless,
}

/// Description of one agent process to spawn.
#[derive(Debug, Clone)]
pub struct AgentCommand {
    pub program: String,
    pub args: Vec<String>,
    pub cwd: Option<PathBuf>,
    pub mode: IoMode,
    /// Bytes written to stdin before it is closed.
    pub stdin_payload: String,
}

impl AgentCommand {
    /// Claude CLI in print mode speaking stream-json on both stdin and stdout.
    pub fn headless(prompt: &str, model: Option<&str>, cwd: Option<PathBuf>) -> Result<Self> {
        let mut args: Vec<String> = [
            "-p",
            "--output-format",
            "stream-json",
            "--input-format",
            "stream-json",
            "--verbose",
            "--dangerously-skip-permissions",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect();
        if let Some(model) = model {
            args.push("--model".into());
            args.push(model.to_string());
        }

        Ok(Self {
            program: "claude".into(),
            args,
            cwd,
            mode: IoMode::Headless,
            stdin_payload: stream_json_payload(prompt)?,
        })
    }

    /// Claude CLI with its own terminal UI; the instruction is typed in through stdin.
    pub fn interactive(prompt: &str, model: Option<&str>, cwd: Option<PathBuf>) -> Self {
        let mut args = vec!["--dangerously-skip-permissions".to_string()];
        if let Some(model) = model {
            args.push("--model".into());
            args.push(model.to_string());
        }

        Self {
            program: "claude".into(),
            args,
            cwd,
            mode: IoMode::Interactive,
            stdin_payload: format!("{prompt}\n"),
        }
    }
}

// ---------------------------------------------------------------------------
// Stream items and termination
// ---------------------------------------------------------------------------

/// How the child process ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExitReport {
    /// `None` when the process was killed by a signal.
    pub code: Option<i32>,
    /// True when the end was caused by [`StreamTerminator::terminate`].
    pub terminated: bool,
}

impl ExitReport {
    pub fn success(&self) -> bool {
        self.code == Some(0) && !self.terminated
    }
}

/// Items delivered by a [`StreamHandle`], in arrival order.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamItem {
    Event(StreamEvent),
    /// Always the last item of a stream.
    Exited(ExitReport),
}

/// Cloneable kill switch for one stream, shared with the idle watchdog.
#[derive(Debug, Clone, Default)]
pub struct StreamTerminator {
    token: CancellationToken,
    requested: Arc<AtomicBool>,
}

impl StreamTerminator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request termination. Returns true only for the call that actually
    /// initiated it; later calls are no-ops.
    pub fn terminate(&self) -> bool {
        let first = !self.requested.swap(true, Ordering::SeqCst);
        self.token.cancel();
        first
    }

    #[cfg(test)]
    pub fn is_terminated(&self) -> bool {
        self.requested.load(Ordering::SeqCst)
    }

    pub async fn terminated(&self) {
        self.token.cancelled().await;
    }
}

/// A running agent process and the lazy, finite sequence of its events.
pub struct StreamHandle {
    rx: mpsc::Receiver<StreamItem>,
    terminator: StreamTerminator,
    pid: Option<u32>,
}

impl StreamHandle {
    /// Next item, or `None` once the `Exited` item has been consumed.
    pub async fn next(&mut self) -> Option<StreamItem> {
        self.rx.recv().await
    }

    pub fn terminate(&self) -> bool {
        let first = self.terminator.terminate();
        if first {
            info!(pid = ?self.pid, "terminating agent process");
        }
        first
    }

    pub fn terminator(&self) -> StreamTerminator {
        self.terminator.clone()
    }
}

// ---------------------------------------------------------------------------
// StreamReader
// ---------------------------------------------------------------------------

/// Spawns agent processes and turns their stdout into [`StreamItem`]s.
#[derive(Debug, Clone, Default)]
pub struct StreamReader {
    raw_log: Option<Arc<JsonlLogger>>,
}

impl StreamReader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy every raw stdout line into `logger` before decoding.
    pub fn with_raw_log(mut self, logger: Arc<JsonlLogger>) -> Self {
        self.raw_log = Some(logger);
        self
    }

    /// Spawn one child process and start forwarding its events.
    pub async fn start(&self, command: &AgentCommand) -> Result<StreamHandle> {
        let mut cmd = Command::new(&command.program);
        cmd.args(&command.args);
        cmd.stdin(Stdio::piped());
        match command.mode {
            IoMode::Headless => {
                cmd.stdout(Stdio::piped());
                cmd.stderr(Stdio::piped());
            }
            IoMode::Interactive => {
                cmd.stdout(Stdio::inherit());
                cmd.stderr(Stdio::inherit());
            }
        }
        cmd.kill_on_drop(true);

        if let Some(ref dir) = command.cwd {
            cmd.current_dir(dir);
        }

        // Keep terminal SIGINT away from the child; we decide when it dies.
        #[cfg(unix)]
        cmd.process_group(0);

        let mut child = cmd
            .spawn()
            .map_err(|e| RalphError::Spawn(format!("{}: {}", command.program, e)))?;
        let pid = child.id();
        info!(program = %command.program, ?pid, mode = ?command.mode, "spawned agent process");

        if let Some(mut stdin) = child.stdin.take() {
            // A child that exits before reading its input is not a spawn failure.
            if let Err(e) = write_and_close(&mut stdin, &command.stdin_payload).await {
                warn!("failed to write agent stdin: {}", e);
            }
        }

        // stderr is drained so a chatty child never blocks on a full pipe.
        if let Some(stderr) = child.stderr.take() {
            tokio::spawn(async move {
                let mut lines = BufReader::new(stderr).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    debug!(target: "agent_stderr", "{}", line);
                }
            });
        }

        let stdout = child.stdout.take();
        let terminator = StreamTerminator::new();
        let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);

        tokio::spawn(pump(
            child,
            pid,
            stdout,
            tx,
            terminator.clone(),
            self.raw_log.clone(),
        ));

        Ok(StreamHandle {
            rx,
            terminator,
            pid,
        })
    }
}

async fn write_and_close(
    stdin: &mut tokio::process::ChildStdin,
    payload: &str,
) -> std::io::Result<()> {
    stdin.write_all(payload.as_bytes()).await?;
    stdin.flush().await?;
    stdin.shutdown().await
}

/// Reader task: forwards decoded events, then exactly one `Exited` item.
async fn pump(
    mut child: Child,
    pid: Option<u32>,
    stdout: Option<ChildStdout>,
    tx: mpsc::Sender<StreamItem>,
    terminator: StreamTerminator,
    raw_log: Option<Arc<JsonlLogger>>,
) {
    // Interactive children own the terminal; they run until they exit or are terminated.
    let Some(stdout) = stdout else {
        tokio::select! {
            biased;

            _ = terminator.terminated() => {
                graceful_shutdown(&mut child, pid).await;
                send_exit(&tx, &mut child, true).await;
            }

            status = child.wait() => {
                let code = status
                    .map_err(|e| warn!("failed to wait for agent process: {}", e))
                    .ok()
                    .and_then(|s| s.code());
                let _ = tx
                    .send(StreamItem::Exited(ExitReport {
                        code,
                        terminated: false,
                    }))
                    .await;
            }
        }
        return;
    };

    let mut decoder = EventDecoder::new();
    let mut dropped_lines = 0u64;
    let mut reader = BufReader::new(stdout);
    let mut buf = Vec::new();

    loop {
        buf.clear();
        tokio::select! {
            biased;

            _ = terminator.terminated() => {
                graceful_shutdown(&mut child, pid).await;
                send_exit(&tx, &mut child, true).await;
                return;
            }

            read = reader.read_until(b'\n', &mut buf) => {
                match read {
                    Ok(0) => break,
                    Ok(_) => {
                        let Some(line) = line_text(&buf) else {
                            dropped_lines += 1;
                            debug!(bytes = buf.len(), "dropping non-UTF-8 stream line");
                            continue;
                        };
                        if let Some(ref log) = raw_log {
                            log.log(line);
                        }
                        match decoder.decode_line(line, Utc::now()) {
                            Some(events) => {
                                for event in events {
                                    // Receiver gone: nobody is listening, keep draining.
                                    let _ = tx.send(StreamItem::Event(event)).await;
                                }
                            }
                            None => {
                                dropped_lines += 1;
                                let preview: String = line.chars().take(200).collect();
                                debug!("dropping malformed stream line: {}", preview);
                            }
                        }
                    }
                    Err(e) => {
                        warn!("error reading agent stdout: {}", e);
                        break;
                    }
                }
            }
        }
    }

    if dropped_lines > 0 {
        debug!(dropped_lines, "stream finished with malformed lines skipped");
    }

    tokio::select! {
        biased;

        _ = terminator.terminated() => {
            graceful_shutdown(&mut child, pid).await;
            send_exit(&tx, &mut child, true).await;
        }

        status = tokio::time::timeout(PROCESS_EXIT_TIMEOUT, child.wait()) => {
            let code = match status {
                Ok(Ok(status)) => status.code(),
                Ok(Err(e)) => {
                    warn!("failed to wait for agent process: {}", e);
                    None
                }
                Err(_elapsed) => {
                    warn!("agent did not exit within {:?} after closing stdout", PROCESS_EXIT_TIMEOUT);
                    graceful_shutdown(&mut child, pid).await;
                    None
                }
            };
            let _ = tx
                .send(StreamItem::Exited(ExitReport {
                    code,
                    terminated: false,
                }))
                .await;
        }
    }
}

/// One raw stdout line without its terminator, or `None` if it is not UTF-8.
fn line_text(buf: &[u8]) -> Option<&str> {
    let line = std::str::from_utf8(buf).ok()?;
    Some(line.trim_end_matches(['\n', '\r']))
}

async fn send_exit(tx: &mpsc::Sender<StreamItem>, child: &mut Child, terminated: bool) {
    let code = child.try_wait().ok().flatten().and_then(|s| s.code());
    let _ = tx
        .send(StreamItem::Exited(ExitReport { code, terminated }))
        .await;
}
