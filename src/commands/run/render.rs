//! Plain-text rendering of a [`RunState`] snapshot.

use crossterm::style::Stylize;

use crate::monitor::{ActiveTool, CompletedTool, Phase, RunState, ToolGroup};
use crate::shared::icons;
use crate::stream::ToolCategory;

const HEADER_MIN_WIDTH: usize = 50;
pub const TASK_MAX_LEN: usize = 60;
const TARGET_MAX_LEN: usize = 40;

/// `m:ss`, or `h:mm:ss` from one hour on.
pub fn format_elapsed_time(total_secs: u64) -> String {
    let hours = total_secs / 3600;
    let minutes = (total_secs % 3600) / 60;
    let seconds = total_secs % 60;
    if hours > 0 {
        format!("{}:{:02}:{:02}", hours, minutes, seconds)
    } else {
        format!("{}:{:02}", minutes, seconds)
    }
}

/// Milliseconds as seconds with one decimal, e.g. `0.8s`.
pub fn format_duration(ms: u64) -> String {
    format!("{:.1}s", ms as f64 / 1000.0)
}

/// Cut `text` to at most `max_len` characters, ending in `...` when cut.
pub fn truncate_text(text: &str, max_len: usize) -> String {
    let text = text.replace(['\n', '\r'], " ");
    if text.chars().count() <= max_len {
        return text;
    }
    let kept: String = text.chars().take(max_len.saturating_sub(3)).collect();
    format!("{}...", kept.trim_end())
}

pub fn header_line(iteration: u32, total: u32, elapsed_ms: u64) -> String {
    let label = format!("Iteration {}/{}", iteration, total);
    let elapsed = format!("{} elapsed", format_elapsed_time(elapsed_ms / 1000));
    let content_len = label.chars().count() + elapsed.chars().count() + 6;
    let dashes = "─".repeat(HEADER_MIN_WIDTH.saturating_sub(content_len).max(4));
    format!(
        "{}{} {}{}",
        "┌─ ".cyan(),
        label.white().bold(),
        format!("{} ", dashes).cyan(),
        elapsed.dark_grey()
    )
}

pub fn task_line(text: &str) -> String {
    format!(
        "{}{} \"{}\"",
        "│ ".cyan(),
        icons::task_marker().cyan(),
        truncate_text(text, TASK_MAX_LEN)
    )
}

pub fn status_line(phase: Phase) -> String {
    let label = icons::phase_label(phase);
    let label = if phase == Phase::Done {
        label.to_string()
    } else {
        format!("{}...", label)
    };
    format!("{}{} {}", "└─ ".cyan(), icons::phase_icon(phase), label)
}

pub fn error_line(message: &str) -> String {
    format!(
        "{}{}",
        "│ ".cyan(),
        format!("{} Error: {}", icons::status_fail(), message).red()
    )
}

fn unit_noun(category: ToolCategory, count: usize) -> &'static str {
    match (category, count == 1) {
        (ToolCategory::Read | ToolCategory::Write, true) => "file",
        (ToolCategory::Read | ToolCategory::Write, false) => "files",
        (ToolCategory::Command, true) => "command",
        (ToolCategory::Command, false) => "commands",
        (ToolCategory::Meta, true) => "operation",
        (ToolCategory::Meta, false) => "operations",
    }
}

/// `Reading (Read)` for a single tool, `Reading 2 files` for a group.
pub fn group_summary(group: &ToolGroup) -> String {
    let verb = icons::category_verb(group.category);
    match group.tools.as_slice() {
        [single] => format!("{} ({})", verb, single.name),
        tools => format!(
            "{} {} {}",
            verb,
            tools.len(),
            unit_noun(group.category, tools.len())
        ),
    }
}

pub fn group_line(group: &ToolGroup) -> String {
    let failed = group.tools.iter().any(|t| t.is_error);
    let icon = if failed {
        icons::status_fail().red()
    } else {
        icons::status_check().green()
    };
    format!(
        "{}{} {} ({})",
        "│ ".cyan(),
        icon,
        group_summary(group),
        format_duration(group.total_duration_ms)
    )
}

pub fn completed_tool_line(tool: &CompletedTool) -> String {
    let icon = if tool.is_error {
        icons::status_fail().red()
    } else {
        icons::status_check().green()
    };
    format!(
        "{}{} {} ({}) ({})",
        "│ ".cyan(),
        icon,
        icons::category_verb(tool.category),
        tool.name,
        format_duration(tool.duration_ms)
    )
}

/// What a tool is working on: file name, command or pattern.
pub fn tool_target(tool: &ActiveTool) -> String {
    let input = &tool.input;
    let field = |key: &str| input.get(key).and_then(|v| v.as_str());

    if let Some(path) = field("file_path").or_else(|| field("notebook_path")).or_else(|| field("path")) {
        let name = path.rsplit('/').next().unwrap_or(path);
        return truncate_text(name, TARGET_MAX_LEN);
    }
    if let Some(text) = field("command")
        .or_else(|| field("pattern"))
        .or_else(|| field("url"))
        .or_else(|| field("query"))
        .or_else(|| field("description"))
    {
        return truncate_text(text, TARGET_MAX_LEN);
    }
    tool.name.clone()
}

pub fn active_tool_line(tool: &ActiveTool) -> String {
    let verb = icons::category_verb(tool.category);
    format!(
        "{}{} {} ({})",
        "│ ".cyan(),
        icons::status_active().yellow(),
        verb,
        tool_target(tool)
    )
}

/// Full snapshot of one iteration, top to bottom.
pub fn render_frame(state: &RunState, iteration: u32, total: u32) -> Vec<String> {
    let mut lines = vec![header_line(iteration, total, state.elapsed_ms())];
    if let Some(text) = state.task_text() {
        lines.push(task_line(text));
    }
    lines.push("│".cyan().to_string());
    lines.extend(state.tool_groups().iter().map(group_line));
    lines.extend(state.active_tools().iter().map(active_tool_line));
    if let Some(error) = state.error() {
        lines.push(error_line(&error.to_string()));
    }
    lines.push("│".cyan().to_string());
    lines.push(status_line(state.phase()));
    lines
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stream::StreamEvent;
    use chrono::Utc;

    fn start(id: &str, name: &str, input: serde_json::Value) -> StreamEvent {
        StreamEvent::ToolStart {
            tool_use_id: id.into(),
            name: name.into(),
            category: ToolCategory::from_tool_name(name),
            input,
            timestamp: Utc::now(),
        }
    }

    fn complete(id: &str, duration_ms: u64) -> StreamEvent {
        StreamEvent::ToolComplete {
            tool_use_id: id.into(),
            duration_ms,
            is_error: false,
            timestamp: Utc::now(),
        }
    }

    fn frame(state: &RunState) -> String {
        render_frame(state, 2, 10).join("\n")
    }

    #[test]
    fn test_format_elapsed_time() {
        assert_eq!(format_elapsed_time(0), "0:00");
        assert_eq!(format_elapsed_time(42), "0:42");
        assert_eq!(format_elapsed_time(134), "2:14");
        assert_eq!(format_elapsed_time(3600), "1:00:00");
        assert_eq!(format_elapsed_time(3725), "1:02:05");
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(800), "0.8s");
        assert_eq!(format_duration(1200), "1.2s");
        assert_eq!(format_duration(0), "0.0s");
        assert_eq!(format_duration(15_000), "15.0s");
    }

    #[test]
    fn test_truncate_text() {
        assert_eq!(truncate_text("short", 60), "short");
        let long = "a".repeat(100);
        let cut = truncate_text(&long, 60);
        assert_eq!(cut.chars().count(), 60);
        assert!(cut.ends_with("..."));
        assert_eq!(truncate_text("line one\nline two", 60), "line one line two");
    }

    #[test]
    fn test_header_has_minimum_dashes() {
        let header = header_line(123, 456, 3_600_000);
        assert!(header.contains("Iteration 123/456"));
        assert!(header.contains("────"));
        assert!(header.contains("1:00:00 elapsed"));
    }

    #[test]
    fn test_empty_frame_is_waiting() {
        let out = frame(&RunState::new());
        assert!(out.contains("Iteration 2/10"));
        assert!(out.contains("┌─"));
        assert!(out.contains("└─"));
        assert!(out.contains("Waiting..."));
        assert!(!out.contains("▶"));
        assert!(!out.contains("Error:"));
    }

    #[test]
    fn test_frame_groups_and_active_tools() {
        let mut state = RunState::new();
        for event in [
            StreamEvent::Thought {
                text: "Adding authentication middleware".into(),
                reasoning: false,
                timestamp: Utc::now(),
            },
            start("1", "Read", serde_json::json!({"file_path": "/src/a.ts"})),
            complete("1", 500),
            start("2", "Glob", serde_json::json!({"pattern": "**/*.ts"})),
            complete("2", 300),
            start("3", "Edit", serde_json::json!({"file_path": "/src/index.ts"})),
        ] {
            state.apply(&event);
        }
        state.tick(42_000);

        let out = frame(&state);
        assert!(out.contains("▶"));
        assert!(out.contains("Adding authentication middleware"));
        assert!(out.contains("Reading 2 files (0.8s)"));
        assert!(out.contains("Editing (index.ts)"));
        assert!(out.contains("0:42 elapsed"));
        assert!(out.contains("Editing..."));
    }

    #[test]
    fn test_single_tool_group_names_the_tool() {
        let mut state = RunState::new();
        state.apply(&start("1", "Bash", serde_json::json!({"command": "cargo test"})));
        state.apply(&complete("1", 1500));
        let out = frame(&state);
        assert!(out.contains("Running (Bash) (1.5s)"));
        assert!(out.contains("Thinking..."));
    }

    #[test]
    fn test_error_rendered_with_partial_progress() {
        let mut state = RunState::new();
        state.apply(&start("1", "Read", serde_json::json!({})));
        state.apply(&complete("1", 800));
        state.apply(&StreamEvent::Fatal {
            message: "Connection timed out".into(),
            timestamp: Utc::now(),
        });
        state.finish();

        let out = frame(&state);
        assert!(out.contains("✗ Error: Connection timed out"));
        assert!(out.contains("Reading (Read) (0.8s)"));
        assert!(out.contains("✓ Done"));
    }

    #[test]
    fn test_tool_target_fallbacks() {
        let tool = |name: &str, input: serde_json::Value| ActiveTool {
            id: "x".into(),
            name: name.into(),
            category: ToolCategory::from_tool_name(name),
            start_time: Utc::now(),
            input,
        };
        assert_eq!(tool_target(&tool("Read", serde_json::json!({"file_path": "/a/b/c.rs"}))), "c.rs");
        assert_eq!(tool_target(&tool("Grep", serde_json::json!({"pattern": "fn main"}))), "fn main");
        assert_eq!(tool_target(&tool("TodoWrite", serde_json::json!({}))), "TodoWrite");
    }
}
