//! Types for the transfer engine.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

use crate::storage::storage_key;

/// One file copy: original SURL to copy SURL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferRequest {
    /// SURL of the existing replica.
    pub original: String,
    /// SURL the replica should be copied to.
    pub copy: String,
    /// Whether this is the final request of a directory pass.
    #[serde(default)]
    pub last_in_directory: bool,
    /// Whether the request must flush open channels regardless of size.
    #[serde(default)]
    pub forced: bool,
}

impl TransferRequest {
    pub fn new(original: impl Into<String>, copy: impl Into<String>) -> Self {
        Self {
            original: original.into(),
            copy: copy.into(),
            last_in_directory: false,
            forced: false,
        }
    }

    /// Marks the request as the directory's last.
    pub fn last_in_directory(mut self, last: bool) -> Self {
        self.last_in_directory = last;
        self
    }

    /// Marks the request as a forced copy.
    pub fn forced(mut self, forced: bool) -> Self {
        self.forced = forced;
        self
    }

    /// SE key of the original.
    pub fn source_key(&self) -> Option<String> {
        storage_key(&self.original)
    }

    /// SE key of the copy.
    pub fn destination_key(&self) -> Option<String> {
        storage_key(&self.copy)
    }

    pub fn is_self_copy(&self) -> bool {
        self.original == self.copy
    }

    /// Flush trigger carried by this request.
    pub fn trigger(&self) -> FlushTrigger {
        FlushTrigger {
            last_in_directory: self.last_in_directory,
            forced: self.forced || (self.is_self_copy() && self.last_in_directory),
        }
    }
}

/// A (source, destination) storage pair used as the batching unit.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ChannelKey {
    pub source: String,
    pub destination: String,
    /// Optional disambiguator for concurrent runs on the same pair.
    pub slot: Option<u32>,
}

impl ChannelKey {
    pub fn new(source: impl Into<String>, destination: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            destination: destination.into(),
            slot: None,
        }
    }

    pub fn with_slot(mut self, slot: Option<u32>) -> Self {
        self.slot = slot;
        self
    }

    /// Batch file name, `transfer.<source>-<destination>[.<slot>].txt`.
    pub fn batch_file_name(&self) -> String {
        match self.slot {
            Some(slot) => format!("transfer.{}-{}.{}.txt", self.source, self.destination, slot),
            None => format!("transfer.{}-{}.txt", self.source, self.destination),
        }
    }
}

impl fmt::Display for ChannelKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {}", self.source, self.destination)?;
        if let Some(slot) = self.slot {
            write!(f, " [{}]", slot)?;
        }
        Ok(())
    }
}

/// Result of queueing one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnqueueOutcome {
    /// The pair was appended to the channel's batch file.
    Queued { channel: ChannelKey, path: PathBuf },
    /// The pair equals the last one appended to this batch.
    SkippedDuplicate { channel: ChannelKey, path: PathBuf },
    /// A self-copy used only to flush every open channel.
    ForcedFlush,
}

/// Conditions under which a flush is attempted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FlushTrigger {
    pub last_in_directory: bool,
    pub forced: bool,
}

impl FlushTrigger {
    /// No special condition; only a full batch is submitted.
    pub fn routine() -> Self {
        Self::default()
    }

    pub fn last_file() -> Self {
        Self {
            last_in_directory: true,
            forced: false,
        }
    }

    pub fn forced() -> Self {
        Self {
            last_in_directory: false,
            forced: true,
        }
    }
}

/// What to do with a channel's batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlushDecision {
    /// Submit the batch to the transfer service.
    Submit,
    /// Remove the batch without submitting it.
    Discard,
    /// Leave the batch pending.
    Defer,
}

/// Decides what a flush does with `pending` queued pairs.
pub fn decide_flush(pending: usize, batch_size: usize, trigger: FlushTrigger) -> FlushDecision {
    if pending > 0 && pending >= batch_size {
        FlushDecision::Submit
    } else if trigger.forced && pending >= 1 {
        FlushDecision::Submit
    } else if trigger.last_in_directory && pending > 1 {
        FlushDecision::Submit
    } else if trigger.last_in_directory || trigger.forced {
        FlushDecision::Discard
    } else {
        FlushDecision::Defer
    }
}

/// Result of flushing one channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum FlushOutcome {
    Submitted {
        channel: ChannelKey,
        transfer_id: String,
        files: usize,
    },
    Discarded {
        channel: ChannelKey,
        pending: usize,
    },
    Deferred {
        channel: ChannelKey,
        pending: usize,
    },
}

impl FlushOutcome {
    pub fn channel(&self) -> &ChannelKey {
        match self {
            Self::Submitted { channel, .. }
            | Self::Discarded { channel, .. }
            | Self::Deferred { channel, .. } => channel,
        }
    }

    /// Whether the channel's batch is gone after this outcome.
    pub fn closes_channel(&self) -> bool {
        !matches!(self, Self::Deferred { .. })
    }

    pub fn transfer_id(&self) -> Option<&str> {
        match self {
            Self::Submitted { transfer_id, .. } => Some(transfer_id),
            _ => None,
        }
    }
}
