//! Error types for directory syncs.

use std::path::PathBuf;
use thiserror::Error;

use crate::command::CommandError;
use crate::transfer::TransferError;

/// Errors that can occur while syncing a directory.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Queueing, staging or submission failed.
    #[error(transparent)]
    Transfer(#[from] TransferError),

    /// The catalogue directory could not be listed.
    #[error("could not list {directory}: {reason}")]
    Listing { directory: String, reason: String },

    /// The known-good list could not be read.
    #[error("could not read known-good list {path}: {source}")]
    KnownGoodList {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Some files of the directory could not be synchronised.
    #[error("could not synchronise {failures} files between {directory} and {destination}")]
    DirectoryFailed {
        directory: String,
        destination: String,
        failures: usize,
    },
}

impl SyncError {
    /// Creates a listing error from a failed catalogue command.
    pub fn listing(directory: impl Into<String>, source: &CommandError) -> Self {
        Self::Listing {
            directory: directory.into(),
            reason: source.to_string(),
        }
    }

    /// Failure count for directory-level errors.
    pub fn failures(&self) -> Option<usize> {
        match self {
            Self::DirectoryFailed { failures, .. } => Some(*failures),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_directory_failed_display() {
        let err = SyncError::DirectoryFailed {
            directory: "lfn:/grid/t2k.org/nd280/raw".to_string(),
            destination: "t2ksrm.nd280.org".to_string(),
            failures: 2,
        };
        assert_eq!(err.failures(), Some(2));
        assert_eq!(
            err.to_string(),
            "could not synchronise 2 files between lfn:/grid/t2k.org/nd280/raw and t2ksrm.nd280.org"
        );
    }

    #[test]
    fn test_transfer_is_transparent() {
        let err: SyncError = TransferError::NoReplica {
            lfn: "lfn:/a".to_string(),
        }
        .into();
        assert_eq!(err.to_string(), "no replica of lfn:/a available to copy from");
        assert_eq!(err.failures(), None);
    }
}
