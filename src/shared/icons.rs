use crate::monitor::Phase;
use crate::stream::ToolCategory;

/// Status-line icon for a phase
pub fn phase_icon(phase: Phase) -> &'static str {
    match phase {
        Phase::Idle => "○",
        Phase::Reading => "◐",
        Phase::Editing => "✎",
        Phase::Running => "⚡",
        Phase::Thinking => "●",
        Phase::Done => "✓",
    }
}

/// Status-line label for a phase
pub fn phase_label(phase: Phase) -> &'static str {
    match phase {
        Phase::Idle => "Waiting",
        Phase::Reading => "Reading",
        Phase::Editing => "Editing",
        Phase::Running => "Running",
        Phase::Thinking => "Thinking",
        Phase::Done => "Done",
    }
}

/// Verb used for tool lines and group summaries
pub fn category_verb(category: ToolCategory) -> &'static str {
    match category {
        ToolCategory::Read => "Reading",
        ToolCategory::Write => "Editing",
        ToolCategory::Command => "Running",
        ToolCategory::Meta => "Processing",
    }
}

/// Check mark for completion status
pub fn status_check() -> &'static str {
    "✓"
}

/// Cross mark for failure status
pub fn status_fail() -> &'static str {
    "✗"
}

/// Marker for a tool still in flight
pub fn status_active() -> &'static str {
    "…"
}

/// Marker in front of the current task text
pub fn task_marker() -> &'static str {
    "▶"
}
