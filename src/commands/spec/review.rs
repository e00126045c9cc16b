//! Best-effort reading of free-text reviewer output.
//!
//! The contract is small: a `PASS`/`FAIL` marker (preferably on a line with
//! `Review:`), and optional `Format Issues`, `Content Concerns` and
//! `Recommendations` headings whose list items are collected. Anything else
//! is ignored.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Pass,
    Fail,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReviewOutcome {
    pub verdict: Verdict,
    pub format_issues: Vec<String>,
    pub content_concerns: Vec<String>,
    pub recommendations: Vec<String>,
}

impl ReviewOutcome {
    pub fn passed(&self) -> bool {
        self.verdict == Verdict::Pass
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Section {
    FormatIssues,
    ContentConcerns,
    Recommendations,
}

impl Section {
    fn from_heading(title: &str) -> Option<Self> {
        let title = title.to_lowercase();
        if title.contains("format issues") {
            Some(Self::FormatIssues)
        } else if title.contains("content concerns") {
            Some(Self::ContentConcerns)
        } else if title.contains("recommendations") {
            Some(Self::Recommendations)
        } else {
            None
        }
    }
}

/// Parse a review. A text without any marker is a failing review.
pub fn parse_review(text: &str) -> ReviewOutcome {
    let mut outcome = ReviewOutcome {
        verdict: parse_verdict(text).unwrap_or(Verdict::Fail),
        format_issues: Vec::new(),
        content_concerns: Vec::new(),
        recommendations: Vec::new(),
    };

    // (section, heading level)
    let mut current: Option<(Section, usize)> = None;

    for line in text.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        if let Some((level, title)) = heading(trimmed) {
            if let Some(section) = Section::from_heading(title) {
                current = Some((section, level));
            } else if current.is_some_and(|(_, open_level)| level <= open_level) {
                current = None;
            }
            continue;
        }

        let Some((section, _)) = current else {
            continue;
        };
        let item = strip_list_marker(trimmed);
        if item.is_empty() {
            continue;
        }
        let target = match section {
            Section::FormatIssues => &mut outcome.format_issues,
            Section::ContentConcerns => &mut outcome.content_concerns,
            Section::Recommendations => &mut outcome.recommendations,
        };
        target.push(item.to_string());
    }

    outcome
}

fn parse_verdict(text: &str) -> Option<Verdict> {
    text.lines()
        .filter(|line| line.to_lowercase().contains("review:"))
        .find_map(first_marker)
        .or_else(|| text.lines().find_map(first_marker))
}

/// First whole-word, upper-case `PASS` or `FAIL` in `line`.
fn first_marker(line: &str) -> Option<Verdict> {
    line.split(|c: char| !c.is_ascii_alphanumeric())
        .find_map(|word| match word {
            "PASS" => Some(Verdict::Pass),
            "FAIL" => Some(Verdict::Fail),
            _ => None,
        })
}

/// `## Title` → `(2, "Title")`
fn heading(line: &str) -> Option<(usize, &str)> {
    let level = line.chars().take_while(|&c| c == '#').count();
    if level == 0 {
        return None;
    }
    let rest = &line[level..];
    if !rest.is_empty() && !rest.starts_with(' ') {
        return None;
    }
    Some((level, rest.trim()))
}

fn strip_list_marker(line: &str) -> &str {
    for bullet in ["- ", "* ", "+ "] {
        if let Some(rest) = line.strip_prefix(bullet) {
            return rest.trim();
        }
    }
    let digits = line.chars().take_while(char::is_ascii_digit).count();
    if digits > 0 {
        let rest = &line[digits..];
        if let Some(rest) = rest.strip_prefix(". ").or_else(|| rest.strip_prefix(") ")) {
            return rest.trim();
        }
    }
    line
}
