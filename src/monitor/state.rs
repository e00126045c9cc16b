use chrono::{DateTime, Utc};
use std::fmt;

use crate::stream::{StreamEvent, ToolCategory};

/// Current high-level activity of a monitored run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Phase {
    #[default]
    Idle,
    Reading,
    Editing,
    Running,
    Thinking,
    Done,
}

impl Phase {
    fn for_category(category: ToolCategory) -> Self {
        match category {
            ToolCategory::Read => Self::Reading,
            ToolCategory::Write => Self::Editing,
            ToolCategory::Command => Self::Running,
            ToolCategory::Meta => Self::Thinking,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ActiveTool {
    pub id: String,
    pub name: String,
    pub category: ToolCategory,
    pub start_time: DateTime<Utc>,
    pub input: serde_json::Value,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletedTool {
    pub id: String,
    pub name: String,
    pub category: ToolCategory,
    pub duration_ms: u64,
    pub is_error: bool,
}

/// Consecutive completed tools of one category.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolGroup {
    pub category: ToolCategory,
    pub tools: Vec<CompletedTool>,
    pub total_duration_ms: u64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Stats {
    pub tools_started: u64,
    pub tools_completed: u64,
    pub tools_errored: u64,
    pub reads: u64,
    pub writes: u64,
    pub commands: u64,
    pub meta_ops: u64,
}

/// Terminal failure of a run, shown next to whatever progress was made.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunError {
    /// Reported by the agent itself.
    Fatal(String),
    IdleTimeout { timeout_ms: u64 },
    Spawn(String),
}

impl fmt::Display for RunError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Fatal(message) => write!(f, "{}", message),
            Self::IdleTimeout { timeout_ms } => write!(
                f,
                "No activity for {}s, process terminated",
                timeout_ms / 1000
            ),
            Self::Spawn(message) => write!(f, "Failed to start agent: {}", message),
        }
    }
}

/// Operator-facing state of one monitored run.
///
/// Single writer: only [`RunState::apply`], [`RunState::finish`],
/// [`RunState::record_error`] and [`RunState::tick`] mutate it. Once the run
/// has ended or an error is recorded, further events are ignored.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunState {
    phase: Phase,
    task_text: Option<String>,
    /// Ordered by start; the last entry is the most recently started.
    active_tools: Vec<ActiveTool>,
    tool_groups: Vec<ToolGroup>,
    stats: Stats,
    elapsed_ms: u64,
    result: Option<String>,
    error: Option<RunError>,
    seen_event: bool,
    ended: bool,
}

impl RunState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn task_text(&self) -> Option<&str> {
        self.task_text.as_deref()
    }

    pub fn active_tools(&self) -> &[ActiveTool] {
        &self.active_tools
    }

    pub fn tool_groups(&self) -> &[ToolGroup] {
        &self.tool_groups
    }

    pub fn stats(&self) -> &Stats {
        &self.stats
    }

    pub fn elapsed_ms(&self) -> u64 {
        self.elapsed_ms
    }

    pub fn result(&self) -> Option<&str> {
        self.result.as_deref()
    }

    pub fn error(&self) -> Option<&RunError> {
        self.error.as_ref()
    }

    pub fn is_ended(&self) -> bool {
        self.ended
    }

    fn is_frozen(&self) -> bool {
        self.ended || self.error.is_some()
    }

    /// Fold one event into the state.
    pub fn apply(&mut self, event: &StreamEvent) {
        if self.is_frozen() {
            return;
        }
        self.seen_event = true;

        // No wildcard arm: a new event kind must be handled here.
        match event {
            StreamEvent::ToolStart {
                tool_use_id,
                name,
                category,
                input,
                timestamp,
            } => {
                self.stats.tools_started += 1;
                match category {
                    ToolCategory::Read => self.stats.reads += 1,
                    ToolCategory::Write => self.stats.writes += 1,
                    ToolCategory::Command => self.stats.commands += 1,
                    ToolCategory::Meta => self.stats.meta_ops += 1,
                }
                // A repeated id restarts the tool rather than duplicating it.
                self.active_tools.retain(|t| t.id != *tool_use_id);
                self.active_tools.push(ActiveTool {
                    id: tool_use_id.clone(),
                    name: name.clone(),
                    category: *category,
                    start_time: *timestamp,
                    input: input.clone(),
                });
            }
            StreamEvent::ToolComplete {
                tool_use_id,
                duration_ms,
                is_error,
                ..
            } => {
                let started = self
                    .active_tools
                    .iter()
                    .position(|t| t.id == *tool_use_id)
                    .map(|idx| self.active_tools.remove(idx));
                let (name, category) = match started {
                    Some(tool) => (tool.name, tool.category),
                    None => ("unknown".to_string(), ToolCategory::Meta),
                };

                self.stats.tools_completed += 1;
                if *is_error {
                    self.stats.tools_errored += 1;
                }
                self.push_completed(CompletedTool {
                    id: tool_use_id.clone(),
                    name,
                    category,
                    duration_ms: *duration_ms,
                    is_error: *is_error,
                });
            }
            StreamEvent::Thought { text, .. } => {
                self.task_text = Some(text.clone());
            }
            StreamEvent::Result { text, .. } => {
                self.result = text.clone();
            }
            StreamEvent::Fatal { message, .. } => {
                self.error = Some(RunError::Fatal(message.clone()));
            }
        }

        self.phase = self.derive_phase();
    }

    fn push_completed(&mut self, tool: CompletedTool) {
        if let Some(last) = self.tool_groups.last_mut()
            && last.category == tool.category
        {
            last.total_duration_ms += tool.duration_ms;
            last.tools.push(tool);
            return;
        }
        self.tool_groups.push(ToolGroup {
            category: tool.category,
            total_duration_ms: tool.duration_ms,
            tools: vec![tool],
        });
    }

    fn derive_phase(&self) -> Phase {
        if self.ended {
            return Phase::Done;
        }
        match self.active_tools.last() {
            Some(tool) => Phase::for_category(tool.category),
            None if self.seen_event => Phase::Thinking,
            None => Phase::Idle,
        }
    }

    /// Record a lifecycle failure (spawn, idle timeout). The first error wins.
    pub fn record_error(&mut self, error: RunError) {
        if self.error.is_none() {
            self.error = Some(error);
        }
    }

    /// Mark the stream as ended. Tools still in flight are dropped.
    pub fn finish(&mut self) {
        self.ended = true;
        self.active_tools.clear();
        self.phase = self.derive_phase();
    }

    /// Advance the wall clock. Independent of event arrival.
    pub fn tick(&mut self, elapsed_ms: u64) {
        if !self.ended {
            self.elapsed_ms = elapsed_ms;
        }
    }
}
