//! Process-based command runner.

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex_lite::Regex;
use std::process::Stdio;
use std::time::{Duration, Instant};
use tokio::process::Command;
use tokio::time::timeout;
use tracing::{debug, warn};

use super::config::CommandConfig;
use super::error::CommandError;
use super::traits::CommandRunner;
use super::types::{AttemptOutcome, GridCommand, RunMode};
use crate::metrics::{COMMAND_ATTEMPTS, COMMAND_DURATION};

/// Text that grid tools print when something went wrong, whatever their exit code.
static ERROR_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)usage: |no such|invalid|illegal|error|failure|no accessible|unauthori[sz]ed|expire|exceed|fatal|abort|denied|no available|timed out",
    )
    .expect("error pattern compiles")
});

/// Whether a line of command output reports an error.
pub fn is_error_output(line: &str) -> bool {
    ERROR_PATTERN.is_match(line)
}

/// Runs commands as child processes with per-attempt timeouts.
#[derive(Debug, Clone, Default)]
pub struct ProcessRunner {
    config: CommandConfig,
}

impl ProcessRunner {
    /// Creates a runner with the given configuration.
    pub fn new(config: CommandConfig) -> Self {
        Self { config }
    }

    /// Runs a single attempt.
    async fn attempt(
        &self,
        command: &GridCommand,
        limit: Duration,
        mode: RunMode,
    ) -> Result<AttemptOutcome, CommandError> {
        let child = Command::new(command.program())
            .args(command.arguments())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    CommandError::NotFound {
                        program: command.program().to_string(),
                    }
                } else {
                    CommandError::Io(e)
                }
            })?;

        // Dropping the future on timeout drops the child, which kills it.
        match timeout(limit, child.wait_with_output()).await {
            Err(_) => Ok(AttemptOutcome::Timeout),
            Ok(Err(e)) => Err(CommandError::Io(e)),
            Ok(Ok(output)) => Ok(classify(
                mode,
                output.status.success(),
                &String::from_utf8_lossy(&output.stdout),
                &String::from_utf8_lossy(&output.stderr),
            )),
        }
    }
}

/// Splits raw output into trimmed lines.
fn output_lines(raw: &str) -> Vec<String> {
    raw.lines().map(|l| l.trim().to_string()).collect()
}

/// Classifies a finished attempt.
pub(crate) fn classify(mode: RunMode, exited_ok: bool, stdout: &str, stderr: &str) -> AttemptOutcome {
    let out = output_lines(stdout);
    let err: Vec<String> = output_lines(stderr)
        .into_iter()
        .filter(|l| !l.is_empty())
        .collect();

    match mode {
        RunMode::Interactive => {
            let mut merged = out;
            merged.extend(err);
            if !exited_ok || merged.iter().any(|l| is_error_output(l)) {
                AttemptOutcome::Error(merged)
            } else {
                AttemptOutcome::Success(merged)
            }
        }
        RunMode::Captured => {
            if !err.is_empty() {
                AttemptOutcome::Error(err)
            } else if !exited_ok {
                AttemptOutcome::Error(out)
            } else {
                AttemptOutcome::Success(out)
            }
        }
    }
}

#[async_trait]
impl CommandRunner for ProcessRunner {
    async fn run(
        &self,
        command: &GridCommand,
        limit: Duration,
        mode: RunMode,
    ) -> Result<Vec<String>, CommandError> {
        let attempts = self.config.max_attempts.max(1);
        let mut last = AttemptOutcome::Timeout;

        for attempt in 1..=attempts {
            debug!(
                command = %command,
                attempt,
                attempts,
                timeout_secs = limit.as_secs(),
                "Running grid command"
            );
            let start = Instant::now();
            let outcome = self.attempt(command, limit, mode).await?;
            COMMAND_DURATION
                .with_label_values(&[command.program()])
                .observe(start.elapsed().as_secs_f64());

            match outcome {
                AttemptOutcome::Success(lines) => {
                    COMMAND_ATTEMPTS.with_label_values(&["success"]).inc();
                    return Ok(lines);
                }
                AttemptOutcome::Timeout => {
                    COMMAND_ATTEMPTS.with_label_values(&["timeout"]).inc();
                    warn!(command = %command, attempt, "Command timed out after {:?}", limit);
                    last = AttemptOutcome::Timeout;
                }
                AttemptOutcome::Error(lines) => {
                    COMMAND_ATTEMPTS.with_label_values(&["error"]).inc();
                    warn!(
                        command = %command,
                        attempt,
                        "Command reported an error: {}",
                        lines.join(" | ")
                    );
                    last = AttemptOutcome::Error(lines);
                    if attempt < attempts {
                        tokio::time::sleep(self.config.retry_delay(limit)).await;
                    }
                }
            }
        }

        Err(match last {
            AttemptOutcome::Error(lines) => CommandError::failed(command.to_string(), attempts, lines),
            _ => CommandError::TimedOut {
                command: command.to_string(),
                attempts,
                timeout_secs: limit.as_secs(),
            },
        })
    }

    fn default_timeout(&self) -> Duration {
        self.config.timeout()
    }
}
