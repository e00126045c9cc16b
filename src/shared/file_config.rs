use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::shared::error::{RalphError, Result};

/// Configuration loaded from .ralph.toml file
#[derive(Debug, Default, Deserialize)]
pub struct FileConfig {
    #[serde(default)]
    pub prompt: PromptConfig,
    #[serde(default)]
    pub run: RunConfig,
    #[serde(default)]
    pub spec: SpecConfig,
}

/// Prompt configuration with optional prefix and suffix
#[derive(Debug, Default, Deserialize)]
pub struct PromptConfig {
    /// Text to prepend before user's prompt
    #[serde(default)]
    pub prefix: Option<String>,

    /// Text to append after user's prompt
    #[serde(default)]
    pub suffix: Option<String>,
}

/// Monitored run settings (`[run]` in .ralph.toml)
#[derive(Debug, Deserialize)]
pub struct RunConfig {
    #[serde(default = "default_run_idle_timeout")]
    pub idle_timeout_secs: u64,
    #[serde(default)]
    pub model: Option<String>,
    /// Directory for auto-named JSONL logs
    #[serde(default = "default_runs_dir")]
    pub runs_dir: PathBuf,
    /// Text expected inside <promise>...</promise> to stop the loop early
    #[serde(default = "default_completion_promise")]
    pub completion_promise: String,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            idle_timeout_secs: default_run_idle_timeout(),
            model: None,
            runs_dir: default_runs_dir(),
            completion_promise: default_completion_promise(),
        }
    }
}

/// Spec generation settings (`[spec]` in .ralph.toml)
#[derive(Debug, Deserialize)]
pub struct SpecConfig {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default = "default_spec_file")]
    pub file: PathBuf,
    #[serde(default = "default_spec_idle_timeout")]
    pub idle_timeout_secs: u64,
}

impl Default for SpecConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            model: None,
            file: default_spec_file(),
            idle_timeout_secs: default_spec_idle_timeout(),
        }
    }
}

fn default_run_idle_timeout() -> u64 {
    120
}

fn default_spec_idle_timeout() -> u64 {
    300
}

fn default_runs_dir() -> PathBuf {
    PathBuf::from(".ralph/runs")
}

fn default_completion_promise() -> String {
    "COMPLETE".to_string()
}

fn default_max_attempts() -> u32 {
    3
}

fn default_spec_file() -> PathBuf {
    PathBuf::from("SPEC.md")
}

impl FileConfig {
    /// Load configuration from a specific path
    /// Returns default config if file doesn't exist
    pub fn load_from_path(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)
            .map_err(|e| RalphError::Config(format!("Failed to read {}: {}", path.display(), e)))?;

        toml::from_str(&content)
            .map_err(|e| RalphError::Config(format!("Failed to parse {}: {}", path.display(), e)))
    }

    /// Apply prefix and suffix to user prompt
    pub fn wrap_user_prompt(&self, user_prompt: &str) -> String {
        let mut result = String::new();

        if let Some(prefix) = &self.prompt.prefix {
            result.push_str(prefix);
            result.push_str("\n\n");
        }

        result.push_str(user_prompt);

        if let Some(suffix) = &self.prompt.suffix {
            result.push_str("\n\n");
            result.push_str(suffix);
        }

        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = FileConfig::default();
        assert!(config.prompt.prefix.is_none());
        assert_eq!(config.run.idle_timeout_secs, 120);
        assert_eq!(config.run.runs_dir, PathBuf::from(".ralph/runs"));
        assert_eq!(config.spec.max_attempts, 3);
        assert_eq!(config.spec.file, PathBuf::from("SPEC.md"));
    }

    #[test]
    fn test_missing_file_yields_defaults() {
        let config = FileConfig::load_from_path(Path::new("/nonexistent/.ralph.toml")).unwrap();
        assert_eq!(config.run.completion_promise, "COMPLETE");
    }

    #[test]
    fn test_partial_sections_keep_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".ralph.toml");
        std::fs::write(
            &path,
            "[run]\nidle_timeout_secs = 30\n\n[spec]\nmodel = \"opus\"\n",
        )
        .unwrap();

        let config = FileConfig::load_from_path(&path).unwrap();
        assert_eq!(config.run.idle_timeout_secs, 30);
        assert_eq!(config.run.completion_promise, "COMPLETE");
        assert_eq!(config.spec.model.as_deref(), Some("opus"));
        assert_eq!(config.spec.max_attempts, 3);
    }

    #[test]
    fn test_invalid_toml_is_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".ralph.toml");
        std::fs::write(&path, "[run\nidle_timeout_secs = ").unwrap();

        let err = FileConfig::load_from_path(&path).unwrap_err();
        assert!(matches!(err, RalphError::Config(_)));
    }

    #[test]
    fn test_wrap_user_prompt_no_modifications() {
        let config = FileConfig::default();
        assert_eq!(config.wrap_user_prompt("My prompt"), "My prompt");
    }

    #[test]
    fn test_wrap_user_prompt_with_prefix_and_suffix() {
        let config = FileConfig {
            prompt: PromptConfig {
                prefix: Some("PREFIX:".to_string()),
                suffix: Some("SUFFIX".to_string()),
            },
            ..Default::default()
        };
        assert_eq!(
            config.wrap_user_prompt("My prompt"),
            "PREFIX:\n\nMy prompt\n\nSUFFIX"
        );
    }
}
