//! Configuration for batching, submission and channel quotas.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use super::status::FtsProtocol;

/// Bulk submission settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferConfig {
    /// Directory holding channel batch files and daily submission logs.
    #[serde(default = "default_directory")]
    pub directory: PathBuf,

    /// Transfer service endpoint passed to every `glite-transfer-*` call.
    pub fts_service: String,

    /// MyProxy server used by the service for credential renewal.
    #[serde(default)]
    pub myproxy_server: Option<String>,

    /// Virtual organisation used to scope transfer listings.
    #[serde(default = "default_vo")]
    pub vo: String,

    /// Pending pairs that trigger a submission on their own.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Status vocabulary of the transfer service.
    #[serde(default)]
    pub protocol: FtsProtocol,

    /// Space-token tag sent for destinations that require one.
    #[serde(default = "default_space_token")]
    pub space_token: String,

    /// Source keys containing this marker get their submissions prioritised.
    #[serde(default = "default_priority_marker")]
    pub priority_marker: String,

    /// Priority assigned to marked submissions.
    #[serde(default = "default_priority")]
    pub priority: u8,

    /// Optional disambiguator appended to batch file names so several
    /// independent runs can share one transfer directory.
    #[serde(default)]
    pub slot: Option<u32>,
}

fn default_directory() -> PathBuf {
    PathBuf::from(".")
}

fn default_vo() -> String {
    "t2k.org".to_string()
}

fn default_batch_size() -> usize {
    200
}

fn default_space_token() -> String {
    "T2KORGDISK".to_string()
}

fn default_priority_marker() -> String {
    "kek".to_string()
}

fn default_priority() -> u8 {
    5
}

impl TransferConfig {
    /// Creates a config for `fts_service` with defaults everywhere else.
    pub fn new(fts_service: impl Into<String>) -> Self {
        Self {
            directory: default_directory(),
            fts_service: fts_service.into(),
            myproxy_server: None,
            vo: default_vo(),
            batch_size: default_batch_size(),
            protocol: FtsProtocol::default(),
            space_token: default_space_token(),
            priority_marker: default_priority_marker(),
            priority: default_priority(),
            slot: None,
        }
    }

    /// Sets the transfer directory.
    pub fn with_directory(mut self, directory: impl Into<PathBuf>) -> Self {
        self.directory = directory.into();
        self
    }

    /// Sets the batching threshold.
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    /// Sets the MyProxy server.
    pub fn with_myproxy_server(mut self, server: impl Into<String>) -> Self {
        self.myproxy_server = Some(server.into());
        self
    }
}

/// Per-channel in-flight limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuotaConfig {
    /// Ceiling on active transfers per channel before submitting more.
    #[serde(default = "default_max_active")]
    pub max_active_per_channel: usize,

    /// Pause between polls while a channel is over its ceiling (milliseconds).
    #[serde(default = "default_poll_interval")]
    pub poll_interval_ms: u64,

    /// Give up waiting after this long (milliseconds). Unset waits forever.
    #[serde(default)]
    pub max_wait_ms: Option<u64>,

    /// Source keys containing any of these markers never wait.
    #[serde(default = "default_fast_origins")]
    pub fast_origins: Vec<String>,
}

fn default_max_active() -> usize {
    600
}

fn default_poll_interval() -> u64 {
    60_000 // 1 minute
}

fn default_fast_origins() -> Vec<String> {
    vec!["kek.jp".to_string()]
}

impl Default for QuotaConfig {
    fn default() -> Self {
        Self {
            max_active_per_channel: default_max_active(),
            poll_interval_ms: default_poll_interval(),
            max_wait_ms: None,
            fast_origins: default_fast_origins(),
        }
    }
}

impl QuotaConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn max_wait(&self) -> Option<Duration> {
        self.max_wait_ms.map(Duration::from_millis)
    }
}
