//! Mock command runner for testing.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

use crate::command::{classify, AttemptOutcome, CommandError, CommandRunner, GridCommand, RunMode};

/// A scripted reply to one command invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockResponse {
    /// Successful run printing these lines.
    Lines(Vec<String>),
    /// Every attempt reported an error with these lines.
    Fail(Vec<String>),
    /// Every attempt timed out.
    Timeout,
    /// Raw process output, classified for the requested [`RunMode`].
    Output {
        stdout: String,
        stderr: String,
        exit_ok: bool,
    },
}

impl MockResponse {
    /// Successful response with the given output lines.
    pub fn lines<I, S>(lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Lines(lines.into_iter().map(Into::into).collect())
    }

    /// Clean exit printing `stdout`, classified like a real process.
    pub fn stdout(text: impl Into<String>) -> Self {
        Self::Output {
            stdout: text.into(),
            stderr: String::new(),
            exit_ok: true,
        }
    }

    /// Failed response with a single error line.
    pub fn fail(message: impl Into<String>) -> Self {
        Self::Fail(vec![message.into()])
    }
}

/// A recorded invocation for test assertions.
#[derive(Debug, Clone)]
pub struct RecordedCommand {
    /// The command that was run.
    pub command: GridCommand,
    /// Timeout the caller asked for.
    pub timeout: Duration,
    /// Output classification mode.
    pub mode: RunMode,
    /// Contents of the `-f` batch file at call time, if any.
    pub batch: Option<Vec<String>>,
    /// When the command was run.
    pub timestamp: chrono::DateTime<Utc>,
}

/// Mock implementation of the CommandRunner trait.
///
/// Provides controllable behavior for testing:
/// - Script responses per program, either sticky or one-shot
/// - Track invocations, including batch file contents
/// - Simulate failures and timeouts
///
/// Programs without a scripted response succeed with no output.
///
/// # Example
///
/// ```rust,ignore
/// let runner = MockCommandRunner::new();
/// runner
///     .set_response("glite-transfer-submit", MockResponse::lines(["job-1"]))
///     .await;
///
/// // ... exercise code that submits ...
///
/// let submits = runner.invocations_of("glite-transfer-submit").await;
/// assert_eq!(submits[0].batch.as_ref().unwrap().len(), 3);
/// ```
#[derive(Debug, Clone, Default)]
pub struct MockCommandRunner {
    /// Responses reused for every call to a program.
    sticky: Arc<RwLock<HashMap<String, MockResponse>>>,
    /// Responses consumed in order before falling back to sticky ones.
    queued: Arc<RwLock<HashMap<String, VecDeque<MockResponse>>>>,
    /// Recorded invocations.
    recorded: Arc<RwLock<Vec<RecordedCommand>>>,
}

impl MockCommandRunner {
    /// Create a new mock runner.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the response for every call to `program`.
    pub async fn set_response(&self, program: &str, response: MockResponse) {
        self.sticky
            .write()
            .await
            .insert(program.to_string(), response);
    }

    /// Queue a one-shot response for the next call to `program`.
    pub async fn push_response(&self, program: &str, response: MockResponse) {
        self.queued
            .write()
            .await
            .entry(program.to_string())
            .or_default()
            .push_back(response);
    }

    /// Get all recorded invocations.
    pub async fn recorded(&self) -> Vec<RecordedCommand> {
        self.recorded.read().await.clone()
    }

    /// Recorded invocations of one program.
    pub async fn invocations_of(&self, program: &str) -> Vec<RecordedCommand> {
        self.recorded
            .read()
            .await
            .iter()
            .filter(|r| r.command.program() == program)
            .cloned()
            .collect()
    }

    /// Number of calls to one program.
    pub async fn call_count(&self, program: &str) -> usize {
        self.invocations_of(program).await.len()
    }

    /// Clear recorded invocations.
    pub async fn clear_recorded(&self) {
        self.recorded.write().await.clear();
    }

    async fn next_response(&self, program: &str) -> MockResponse {
        if let Some(queue) = self.queued.write().await.get_mut(program) {
            if let Some(response) = queue.pop_front() {
                return response;
            }
        }
        self.sticky
            .read()
            .await
            .get(program)
            .cloned()
            .unwrap_or_else(|| MockResponse::Lines(Vec::new()))
    }
}

#[async_trait]
impl CommandRunner for MockCommandRunner {
    async fn run(
        &self,
        command: &GridCommand,
        timeout: Duration,
        mode: RunMode,
    ) -> Result<Vec<String>, CommandError> {
        let batch = match command.flag_value("-f") {
            Some(path) => tokio::fs::read_to_string(path)
                .await
                .ok()
                .map(|c| c.lines().map(String::from).collect()),
            None => None,
        };

        self.recorded.write().await.push(RecordedCommand {
            command: command.clone(),
            timeout,
            mode,
            batch,
            timestamp: Utc::now(),
        });

        let outcome = match self.next_response(command.program()).await {
            MockResponse::Lines(lines) => AttemptOutcome::Success(lines),
            MockResponse::Fail(output) => AttemptOutcome::Error(output),
            MockResponse::Timeout => AttemptOutcome::Timeout,
            MockResponse::Output {
                stdout,
                stderr,
                exit_ok,
            } => classify(mode, exit_ok, &stdout, &stderr),
        };

        match outcome {
            AttemptOutcome::Success(lines) => Ok(lines),
            AttemptOutcome::Error(output) => {
                Err(CommandError::failed(command.to_string(), 1, output))
            }
            AttemptOutcome::Timeout => Err(CommandError::TimedOut {
                command: command.to_string(),
                attempts: 1,
                timeout_secs: timeout.as_secs(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_queued_then_sticky() {
        let runner = MockCommandRunner::new();
        runner.set_response("lcg-lr", MockResponse::lines(["sticky"])).await;
        runner.push_response("lcg-lr", MockResponse::fail("once")).await;
        let cmd = GridCommand::new("lcg-lr").arg("lfn:/x");

        assert!(runner
            .run(&cmd, Duration::from_secs(1), RunMode::Interactive)
            .await
            .is_err());
        assert_eq!(
            runner
                .run(&cmd, Duration::from_secs(1), RunMode::Interactive)
                .await
                .unwrap(),
            vec!["sticky"]
        );
        assert_eq!(runner.call_count("lcg-lr").await, 2);
    }

    #[tokio::test]
    async fn test_output_is_classified_per_mode() {
        let runner = MockCommandRunner::new();
        runner
            .set_response("lcg-ls", MockResponse::stdout("Reason: SOURCE error\n"))
            .await;
        let cmd = GridCommand::new("lcg-ls");

        assert_eq!(
            runner
                .run(&cmd, Duration::from_secs(1), RunMode::Captured)
                .await
                .unwrap(),
            vec!["Reason: SOURCE error"]
        );
        let err = runner
            .run(&cmd, Duration::from_secs(1), RunMode::Interactive)
            .await
            .unwrap_err();
        assert!(matches!(err, CommandError::Failed { .. }));
    }

    #[tokio::test]
    async fn test_default_is_empty_success() {
        let runner = MockCommandRunner::new();
        let lines = runner
            .run(
                &GridCommand::new("lfc-ls"),
                Duration::from_secs(1),
                RunMode::Captured,
            )
            .await
            .unwrap();
        assert!(lines.is_empty());
        assert_eq!(runner.recorded().await[0].mode, RunMode::Captured);
    }
}
