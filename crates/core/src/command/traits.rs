//! Trait definitions for command execution.

use async_trait::async_trait;
use std::time::Duration;

use super::error::CommandError;
use super::types::{GridCommand, RunMode};

/// Runs external grid commands.
///
/// Implementations retry internally; an `Err` means every attempt failed or
/// timed out. On success the returned lines are newline-stripped.
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Runs `command`, giving each attempt at most `timeout`.
    async fn run(
        &self,
        command: &GridCommand,
        timeout: Duration,
        mode: RunMode,
    ) -> Result<Vec<String>, CommandError>;

    /// Timeout used when the caller has no specific requirement.
    fn default_timeout(&self) -> Duration {
        Duration::from_secs(300)
    }
}
