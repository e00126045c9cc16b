use std::path::Path;

use super::review::ReviewOutcome;

/// Skill invocation typed into an interactive claude session.
pub fn interactive_generation(description: &str) -> String {
    format!("/create-spec {}", description)
}

/// Self-contained generation prompt for headless runs.
pub fn headless_generation(description: &str, spec_file: &Path) -> String {
    format!(
        r#"Create a specification document for the following project and write it to {file}.

Project description:
{description}

Requirements for {file}:
- Start with a short overview of the goal and the constraints.
- Break the work into small, independently verifiable tasks.
- Write every task as a markdown checkbox: "- [ ] Task description".
- Order tasks so prerequisites come first.
- Give each task clear acceptance criteria.

Do not ask questions. Make reasonable assumptions and note them in the document."#,
        file = spec_file.display(),
        description = description,
    )
}

/// Review prompt. The reviewer must print `SPEC Review: PASS` or `SPEC Review: FAIL`.
pub fn review(spec_file: &Path) -> String {
    format!(
        r#"/review-spec {file}

Review {file} for format and content problems. Do not modify the file.

Start your answer with exactly one line:
SPEC Review: PASS
or
SPEC Review: FAIL

On FAIL, list the problems under these headings:
## Format Issues
## Content Concerns
## Recommendations"#,
        file = spec_file.display(),
    )
}

/// Refinement prompt carrying the reviewer's findings verbatim.
pub fn refine(spec_file: &Path, review: &ReviewOutcome) -> String {
    let mut prompt = format!(
        "Update {} to address the review feedback below. Edit the file in place and keep \
         everything that was not criticised.\n",
        spec_file.display()
    );
    for (label, items) in [
        ("Format issues found:", &review.format_issues),
        ("Content concerns:", &review.content_concerns),
        ("Recommendations:", &review.recommendations),
    ] {
        prompt.push('\n');
        prompt.push_str(label);
        prompt.push('\n');
        if items.is_empty() {
            prompt.push_str("- (none)\n");
        }
        for item in items {
            prompt.push_str("- ");
            prompt.push_str(item);
            prompt.push('\n');
        }
    }
    prompt
}
