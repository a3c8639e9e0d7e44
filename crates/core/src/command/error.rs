//! Error types for command execution.

use thiserror::Error;

/// Errors returned once a command has exhausted its attempts.
#[derive(Debug, Error)]
pub enum CommandError {
    /// The program could not be found on `PATH`.
    #[error("command not found: {program}")]
    NotFound { program: String },

    /// Every attempt was classified as an error.
    #[error("`{command}` failed after {attempts} attempts")]
    Failed {
        command: String,
        attempts: u32,
        output: Vec<String>,
    },

    /// The final attempt exceeded its timeout.
    #[error("`{command}` timed out after {attempts} attempts ({timeout_secs}s each)")]
    TimedOut {
        command: String,
        attempts: u32,
        timeout_secs: u64,
    },

    /// I/O error while spawning or reading the process.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl CommandError {
    /// Creates a failed error carrying the last attempt's output.
    pub fn failed(command: impl Into<String>, attempts: u32, output: Vec<String>) -> Self {
        Self::Failed {
            command: command.into(),
            attempts,
            output,
        }
    }

    /// Output of the last failed attempt, if any.
    pub fn output(&self) -> &[String] {
        match self {
            Self::Failed { output, .. } => output,
            _ => &[],
        }
    }

    /// Whether the failure was a timeout.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::TimedOut { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failed_keeps_output() {
        let err = CommandError::failed("lcg-ls -l x", 3, vec!["No such file".to_string()]);
        assert_eq!(err.output(), ["No such file".to_string()]);
        assert!(!err.is_timeout());
        assert_eq!(err.to_string(), "`lcg-ls -l x` failed after 3 attempts");
    }

    #[test]
    fn test_timeout_has_no_output() {
        let err = CommandError::TimedOut {
            command: "glite-transfer-list".to_string(),
            attempts: 3,
            timeout_secs: 300,
        };
        assert!(err.is_timeout());
        assert!(err.output().is_empty());
    }
}
