use crossterm::style::Stylize;
use std::io::Write;

use super::render::{
    active_tool_line, completed_tool_line, format_elapsed_time, header_line, render_frame,
    task_line,
};
use crate::monitor::{RunObserver, RunOutcome, RunState};
use crate::shared::icons;
use crate::stream::StreamEvent;

/// Streams a live view of one iteration to stdout.
///
/// Lines are appended as events arrive; the grouped snapshot and the status
/// line are printed once the iteration ends. In quiet mode only the summary
/// line is printed.
pub struct Presenter {
    iteration: u32,
    total: u32,
    quiet: bool,
    header_printed: bool,
}

impl Presenter {
    pub fn new(iteration: u32, total: u32, quiet: bool) -> Self {
        Self {
            iteration,
            total,
            quiet,
            header_printed: false,
        }
    }

    fn emit(&self, line: &str) {
        let mut stdout = std::io::stdout().lock();
        let _ = writeln!(stdout, "{}", line);
        let _ = stdout.flush();
    }

    fn ensure_header(&mut self, state: &RunState) {
        if !self.header_printed {
            self.header_printed = true;
            self.emit(&header_line(self.iteration, self.total, state.elapsed_ms()));
        }
    }

    fn event_line(state: &RunState, event: &StreamEvent) -> Option<String> {
        match event {
            StreamEvent::Thought { text, .. } => Some(task_line(text)),
            StreamEvent::ToolStart { tool_use_id, .. } => state
                .active_tools()
                .iter()
                .find(|t| t.id == *tool_use_id)
                .map(active_tool_line),
            StreamEvent::ToolComplete { tool_use_id, .. } => state
                .tool_groups()
                .last()
                .and_then(|g| g.tools.iter().rev().find(|t| t.id == *tool_use_id))
                .map(completed_tool_line),
            // Errors are shown once, in the final frame.
            StreamEvent::Fatal { .. } | StreamEvent::Result { .. } => None,
        }
    }

    /// Print the end-of-iteration view.
    pub fn finish(&mut self, outcome: &RunOutcome) {
        if !self.quiet {
            self.ensure_header(&outcome.state);
            self.emit(&"│".cyan().to_string());
            // Header and task line were already printed live.
            for line in render_frame(&outcome.state, self.iteration, self.total)
                .into_iter()
                .skip(1)
                .filter(|l| !l.contains(icons::task_marker()))
            {
                self.emit(&line);
            }
        }
        self.emit(&summary_line(outcome, self.iteration, self.total));
    }
}

impl RunObserver for Presenter {
    fn on_event(&mut self, state: &RunState, event: &StreamEvent) {
        if self.quiet {
            return;
        }
        self.ensure_header(state);
        if let Some(line) = Self::event_line(state, event) {
            self.emit(&line);
        }
    }

    fn on_tick(&mut self, state: &RunState) {
        if !self.quiet && state.elapsed_ms() > 0 {
            self.ensure_header(state);
        }
    }
}

/// One-line result of an iteration.
pub fn summary_line(outcome: &RunOutcome, iteration: u32, total: u32) -> String {
    let state = &outcome.state;
    let stats = state.stats();
    let elapsed = format_elapsed_time(state.elapsed_ms() / 1000);
    let counts = format!(
        "{} tools, {} errors",
        stats.tools_completed, stats.tools_errored
    );

    if outcome.interrupted {
        return format!(
            "{} Iteration {}/{} interrupted after {} ({})",
            "■".yellow().bold(),
            iteration,
            total,
            elapsed,
            counts
        );
    }
    match state.error() {
        Some(error) => format!(
            "{} Iteration {}/{} failed after {}: {} ({})",
            icons::status_fail().red().bold(),
            iteration,
            total,
            elapsed,
            error,
            counts
        ),
        None => {
            let code = outcome
                .exit
                .and_then(|e| e.code)
                .map(|c| format!(", exit {}", c))
                .unwrap_or_default();
            let icon = if outcome.succeeded() {
                icons::status_check().green().bold()
            } else {
                icons::status_fail().yellow().bold()
            };
            format!(
                "{} Iteration {}/{} finished in {} ({}{})",
                icon,
                iteration,
                total,
                elapsed,
                counts,
                code
            )
        }
    }
}

/// Printed after the last iteration.
pub fn final_status(found_promise: bool, iterations_run: u32, promise: &str) -> String {
    if found_promise {
        format!(
            "{} {} {}",
            icons::status_check().green().bold(),
            "COMPLETED".green().bold(),
            format!(
                "- <promise>{}</promise> after {} iteration(s)",
                promise, iterations_run
            )
            .dark_grey()
        )
    } else {
        format!(
            "{} {} {}",
            icons::status_fail().yellow().bold(),
            "STOPPED".yellow().bold(),
            format!("- {} iteration(s) run, promise not found", iterations_run).dark_grey()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::monitor::RunError;
    use crate::stream::ExitReport;

    fn outcome(state: RunState, code: Option<i32>) -> RunOutcome {
        RunOutcome {
            state,
            exit: Some(ExitReport {
                code,
                terminated: false,
            }),
            idle_timed_out: false,
            interrupted: false,
        }
    }

    #[test]
    fn test_summary_success() {
        let mut state = RunState::new();
        state.tick(65_000);
        state.finish();
        let line = summary_line(&outcome(state, Some(0)), 1, 3);
        assert!(line.contains("Iteration 1/3 finished in 1:05"));
        assert!(line.contains("0 tools, 0 errors, exit 0"));
    }

    #[test]
    fn test_summary_nonzero_exit() {
        let mut state = RunState::new();
        state.finish();
        let line = summary_line(&outcome(state, Some(2)), 1, 1);
        assert!(line.contains(icons::status_fail()));
        assert!(line.contains("exit 2"));
    }

    #[test]
    fn test_summary_failure_shows_error() {
        let mut state = RunState::new();
        state.record_error(RunError::IdleTimeout { timeout_ms: 120_000 });
        state.finish();
        let line = summary_line(&outcome(state, None), 2, 2);
        assert!(line.contains("Iteration 2/2 failed"));
        assert!(line.contains("No activity for 120s"));
    }

    #[test]
    fn test_summary_interrupted() {
        let mut state = RunState::new();
        state.finish();
        let mut interrupted = outcome(state, None);
        interrupted.interrupted = true;
        assert!(summary_line(&interrupted, 1, 1).contains("interrupted"));
    }

    #[test]
    fn test_final_status() {
        assert!(final_status(true, 2, "COMPLETE").contains("<promise>COMPLETE</promise>"));
        assert!(final_status(false, 5, "COMPLETE").contains("promise not found"));
    }
}
