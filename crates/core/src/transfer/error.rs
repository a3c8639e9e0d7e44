//! Error types for the transfer engine.

use std::path::PathBuf;
use thiserror::Error;

use crate::command::CommandError;
use crate::storage::StorageError;

/// Errors that can occur while queueing or submitting transfers.
#[derive(Debug, Error)]
pub enum TransferError {
    /// A remote command failed or timed out after its retries.
    #[error("remote command failed: {0}")]
    Command(#[from] CommandError),

    /// Malformed or self-referential copy request.
    #[error("invalid transfer pair {original} -> {copy}: {reason}")]
    InvalidPair {
        original: String,
        copy: String,
        reason: String,
    },

    /// Inconsistent channel bookkeeping.
    #[error("channel {channel}: {reason}")]
    ChannelState { channel: String, reason: String },

    /// The capacity wait hit its deadline.
    #[error("gave up waiting for capacity on {channel} after {waited_secs}s with {active} active transfers")]
    QuotaWaitAbandoned {
        channel: String,
        active: usize,
        waited_secs: u64,
    },

    /// A URL points at a storage element that is not configured.
    #[error("unknown storage element: {key}")]
    UnknownStorageElement { key: String },

    /// The service accepted the submission but printed no identifier.
    #[error("submission for {channel} returned no transfer identifier")]
    MissingTransferId { channel: String },

    /// No replica exists to copy from.
    #[error("no replica of {lfn} available to copy from")]
    NoReplica { lfn: String },

    /// The source file could not be brought online.
    #[error("failed to stage {surl}: {reason}")]
    StagingFailed { surl: String, reason: String },

    /// Registry construction failed.
    #[error("storage registry error: {0}")]
    Storage(#[from] StorageError),

    /// Batch file or log I/O failed.
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl TransferError {
    /// Creates an invalid pair error.
    pub fn invalid_pair(
        original: impl Into<String>,
        copy: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::InvalidPair {
            original: original.into(),
            copy: copy.into(),
            reason: reason.into(),
        }
    }

    /// Creates a channel state error.
    pub fn channel_state(channel: impl ToString, reason: impl Into<String>) -> Self {
        Self::ChannelState {
            channel: channel.to_string(),
            reason: reason.into(),
        }
    }

    /// Creates an I/O error bound to a path.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Whether retrying the same operation later may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Command(_)
                | Self::QuotaWaitAbandoned { .. }
                | Self::MissingTransferId { .. }
                | Self::StagingFailed { .. }
                | Self::Io { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable() {
        let err = TransferError::Command(CommandError::TimedOut {
            command: "glite-transfer-submit".to_string(),
            attempts: 3,
            timeout_secs: 300,
        });
        assert!(err.is_retryable());
        assert!(!TransferError::invalid_pair("a", "a", "self copy").is_retryable());
        assert!(!TransferError::UnknownStorageElement {
            key: "x".to_string()
        }
        .is_retryable());
    }

    #[test]
    fn test_display() {
        let err = TransferError::QuotaWaitAbandoned {
            channel: "a -> b".to_string(),
            active: 700,
            waited_secs: 3600,
        };
        assert_eq!(
            err.to_string(),
            "gave up waiting for capacity on a -> b after 3600s with 700 active transfers"
        );
    }
}
