use thiserror::Error;

#[derive(Error, Debug)]
pub enum RalphError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("{0}")]
    MissingFile(String),

    #[error("Failed to spawn agent process: {0}")]
    Spawn(String),

    #[error("No agent activity for {secs}s, process terminated")]
    IdleTimeout { secs: u64 },

    #[error("Max attempts ({0}) reached without passing review")]
    MaxAttempts(u32),

    #[error("{0}")]
    SpecFailed(String),

    #[error("Git error: {0}")]
    Git(String),

    #[error("JSON parsing error: {0}")]
    JsonParse(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Interrupted by user")]
    Interrupted,
}

pub type Result<T> = std::result::Result<T, RalphError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_max_attempts_message() {
        let err = RalphError::MaxAttempts(3);
        assert_eq!(
            err.to_string(),
            "Max attempts (3) reached without passing review"
        );
    }

    #[test]
    fn test_missing_file_message_is_verbatim() {
        let err = RalphError::MissingFile("Prompt file not found: /test/missing.txt".into());
        assert_eq!(err.to_string(), "Prompt file not found: /test/missing.txt");
    }

    #[test]
    fn test_io_error_converts() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err: RalphError = io.into();
        assert!(matches!(err, RalphError::Io(_)));
    }
}
