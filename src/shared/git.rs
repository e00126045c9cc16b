use std::path::Path;

use tokio::process::Command;
use tracing::{debug, info};

use crate::shared::error::{RalphError, Result};

const MAX_SLUG_LEN: usize = 50;

/// Create a `git` command pre-configured to never block on interactive prompts.
pub(crate) fn git_command(cwd: &Path) -> Command {
    let mut cmd = Command::new("git");
    cmd.env("GIT_TERMINAL_PROMPT", "0");
    cmd.env("GIT_EDITOR", "true");
    cmd.env("GIT_PAGER", "cat");
    cmd.current_dir(cwd);
    cmd
}

/// Outcome of [`create_feature_branch`].
///
/// `created` is true only for a freshly created branch; checking out an
/// existing one reports its name with `created == false`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GitBranchResult {
    pub created: bool,
    pub branch_name: Option<String>,
    pub error: Option<String>,
}

/// Name of the checked-out branch, or `None` outside a repository.
pub async fn current_branch(cwd: &Path) -> Option<String> {
    git_command(cwd)
        .args(["rev-parse", "--abbrev-ref", "HEAD"])
        .output()
        .await
        .ok()
        .and_then(|o| {
            if o.status.success() {
                Some(String::from_utf8_lossy(&o.stdout).trim().to_string())
            } else {
                None
            }
        })
}

pub async fn is_on_main_branch(cwd: &Path) -> bool {
    matches!(current_branch(cwd).await.as_deref(), Some("main" | "master"))
}

pub async fn branch_exists(cwd: &Path, branch: &str) -> bool {
    git_command(cwd)
        .args(["rev-parse", "--verify", "--quiet", branch])
        .output()
        .await
        .is_ok_and(|o| o.status.success())
}

/// Turn a human title into a branch-safe slug.
///
/// `"Feature: Add OAuth 2.0!"` becomes `"feature-add-oauth-20"`.
pub fn slugify_title(title: &str) -> String {
    let mut slug = String::with_capacity(title.len());
    let mut pending_dash = false;

    for c in title.to_lowercase().chars() {
        if c.is_whitespace() || c == '-' {
            pending_dash = true;
        } else if c.is_ascii_lowercase() || c.is_ascii_digit() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.push(c);
        }
    }

    // Slug is pure ASCII here, so byte truncation is safe.
    slug.truncate(MAX_SLUG_LEN);
    slug.trim_end_matches('-').to_string()
}

/// Switch to `feat/<slug>` when on `main`/`master`, creating it if needed.
///
/// Does nothing on any other branch. Git failures are reported in the result
/// rather than as an `Err`, so a run can continue without a branch.
pub async fn create_feature_branch(cwd: &Path, title: &str) -> GitBranchResult {
    if !is_on_main_branch(cwd).await {
        debug!("not on main branch, leaving branch unchanged");
        return GitBranchResult::default();
    }

    let slug = slugify_title(title);
    if slug.is_empty() {
        return GitBranchResult {
            error: Some("Could not generate branch name from title".to_string()),
            ..Default::default()
        };
    }

    let branch = format!("feat/{slug}");

    if branch_exists(cwd, &branch).await {
        return match checkout(cwd, &["checkout", &branch]).await {
            Ok(()) => {
                info!(%branch, "checked out existing feature branch");
                GitBranchResult {
                    created: false,
                    branch_name: Some(branch),
                    error: None,
                }
            }
            Err(e) => {
                debug!("checkout failed: {}", e);
                GitBranchResult {
                    error: Some(format!("Failed to checkout {branch}")),
                    ..Default::default()
                }
            }
        };
    }

    match checkout(cwd, &["checkout", "-b", &branch]).await {
        Ok(()) => {
            info!(%branch, "created feature branch");
            GitBranchResult {
                created: true,
                branch_name: Some(branch),
                error: None,
            }
        }
        Err(e) => {
            debug!("branch creation failed: {}", e);
            GitBranchResult {
                error: Some(format!("Failed to create branch {branch}")),
                ..Default::default()
            }
        }
    }
}

async fn checkout(cwd: &Path, args: &[&str]) -> Result<()> {
    let output = git_command(cwd)
        .args(args)
        .output()
        .await
        .map_err(|e| RalphError::Git(format!("Failed to spawn git: {e}")))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(RalphError::Git(format!(
            "git {} failed: {}",
            args.join(" "),
            stderr.trim()
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slugify_kebab_case() {
        assert_eq!(slugify_title("User Authentication System"), "user-authentication-system");
        assert_eq!(slugify_title("My   Project   Title"), "my-project-title");
        assert_eq!(slugify_title("My---Project---Title"), "my-project-title");
        assert_eq!(slugify_title("---My Project---"), "my-project");
        assert_eq!(slugify_title("my-existing-slug"), "my-existing-slug");
    }

    #[test]
    fn test_slugify_drops_special_characters() {
        assert_eq!(slugify_title("Feature: Add OAuth 2.0!"), "feature-add-oauth-20");
        assert_eq!(slugify_title("Project 2024 v1.0"), "project-2024-v10");
        assert_eq!(slugify_title("!@#$%^&*()"), "");
        assert_eq!(slugify_title(""), "");
    }

    #[test]
    fn test_slugify_caps_length() {
        let long = "This is a very long title that should be truncated to fifty characters maximum";
        let slug = slugify_title(long);
        assert!(slug.len() <= MAX_SLUG_LEN);
        assert!(!slug.ends_with('-'));
        assert!(slug.starts_with("this-is-a-very-long-title"));
    }

    async fn init_repo(dir: &Path, branch: &str) {
        let head = format!("refs/heads/{branch}");
        for args in [
            vec!["init", "--quiet"],
            vec!["symbolic-ref", "HEAD", head.as_str()],
            vec![
                "-c",
                "user.email=test@example.com",
                "-c",
                "user.name=test",
                "-c",
                "commit.gpgsign=false",
                "commit",
                "--quiet",
                "--allow-empty",
                "-m",
                "init",
            ],
        ] {
            let status = git_command(dir).args(&args).status().await.unwrap();
            assert!(status.success(), "git {:?} failed", args);
        }
    }

    #[tokio::test]
    async fn test_git_command_runs_successfully() {
        let dir = tempfile::tempdir().unwrap();
        let output = git_command(dir.path())
            .args(["--version"])
            .output()
            .await
            .expect("git --version should succeed");
        assert!(output.status.success());
        assert!(String::from_utf8_lossy(&output.stdout).contains("git version"));
    }

    #[tokio::test]
    async fn test_creates_then_reuses_feature_branch() {
        let dir = tempfile::tempdir().unwrap();
        init_repo(dir.path(), "main").await;
        assert!(is_on_main_branch(dir.path()).await);

        let result = create_feature_branch(dir.path(), "Add Login Page").await;
        assert_eq!(
            result,
            GitBranchResult {
                created: true,
                branch_name: Some("feat/add-login-page".into()),
                error: None,
            }
        );
        assert_eq!(
            current_branch(dir.path()).await.as_deref(),
            Some("feat/add-login-page")
        );

        checkout(dir.path(), &["checkout", "--quiet", "main"]).await.unwrap();
        let again = create_feature_branch(dir.path(), "Add Login Page").await;
        assert!(!again.created);
        assert_eq!(again.branch_name.as_deref(), Some("feat/add-login-page"));
    }

    #[tokio::test]
    async fn test_feature_branch_untouched_off_main() {
        let dir = tempfile::tempdir().unwrap();
        init_repo(dir.path(), "develop").await;

        let result = create_feature_branch(dir.path(), "Anything").await;
        assert_eq!(result, GitBranchResult::default());
        assert_eq!(current_branch(dir.path()).await.as_deref(), Some("develop"));
    }

    #[tokio::test]
    async fn test_empty_slug_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        init_repo(dir.path(), "master").await;

        let result = create_feature_branch(dir.path(), "!!!").await;
        assert!(!result.created);
        assert_eq!(
            result.error.as_deref(),
            Some("Could not generate branch name from title")
        );
        assert_eq!(current_branch(dir.path()).await.as_deref(), Some("master"));
    }
}
