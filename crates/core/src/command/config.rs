//! Configuration for command execution.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Timeouts and retry bounds for external commands.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandConfig {
    /// Timeout for a single attempt in seconds.
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,

    /// Attempts per command before the call fails.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Pause after an attempt classified as an error (milliseconds).
    /// Capped by the attempt timeout.
    #[serde(default = "default_retry_delay")]
    pub retry_delay_ms: u64,
}

fn default_timeout() -> u64 {
    300 // 5 minutes
}

fn default_max_attempts() -> u32 {
    3
}

fn default_retry_delay() -> u64 {
    3000
}

impl Default for CommandConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout(),
            max_attempts: default_max_attempts(),
            retry_delay_ms: default_retry_delay(),
        }
    }
}

impl CommandConfig {
    /// Default per-attempt timeout.
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Delay before retrying after an error, never longer than `timeout`.
    pub fn retry_delay(&self, timeout: Duration) -> Duration {
        Duration::from_millis(self.retry_delay_ms).min(timeout)
    }

    /// Sets the retry delay.
    pub fn with_retry_delay(mut self, retry_delay_ms: u64) -> Self {
        self.retry_delay_ms = retry_delay_ms;
        self
    }
}
