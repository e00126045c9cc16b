use std::path::Path;

use crate::shared::error::{RalphError, Result};

/// Prompt used when neither `--prompt` nor `--prompt-file` is given.
///
/// `{promise}` is replaced with the configured completion promise.
pub const DEFAULT_PROMPT: &str = r#"You are Ralph, an autonomous coding agent working through a product backlog.

1. Read PRD.md for the list of tasks and progress.txt for what earlier iterations did.
2. Pick the single highest-priority task that is not done yet.
3. Work on ONE task per iteration. Do not start a second task.
4. Verify your change (build, tests, lint) before moving on.
5. Append a short note of what you did and what is left to progress.txt.
6. Commit your work with a descriptive message.

When every task in PRD.md is complete and verified, end your response with:
<promise>{promise}</promise>

Only emit the promise when it is true."#;

/// Pick the prompt text: `--prompt`, then `--prompt-file` (relative to `cwd`),
/// then [`DEFAULT_PROMPT`].
pub fn resolve_prompt(
    prompt: Option<&str>,
    prompt_file: Option<&Path>,
    cwd: &Path,
    completion_promise: &str,
) -> Result<String> {
    if let Some(prompt) = prompt {
        return Ok(prompt.to_string());
    }

    if let Some(file) = prompt_file {
        let path = if file.is_absolute() {
            file.to_path_buf()
        } else {
            cwd.join(file)
        };
        if !path.is_file() {
            return Err(RalphError::MissingFile(format!(
                "Prompt file not found: {}",
                path.display()
            )));
        }
        return Ok(std::fs::read_to_string(&path)?);
    }

    Ok(DEFAULT_PROMPT.replace("{promise}", completion_promise))
}

/// True if any `<promise>...</promise>` block in `text` holds exactly `promise`
/// (surrounding whitespace ignored).
#[must_use]
pub fn contains_promise(text: &str, promise: &str) -> bool {
    text.split("<promise>")
        .skip(1)
        .filter_map(|tail| tail.split_once("</promise>"))
        .any(|(inner, _)| inner.trim() == promise)
}
