//! Transfer orchestration engine.
//!
//! Individual copy requests are appended to per-channel batch files by the
//! [`TransferLedger`]. The [`TransferSubmitter`] decides when a batch is
//! worth a bulk submission, waits on the [`ChannelQuotaMonitor`] until the
//! channel has capacity, submits, records the transfer id in the
//! [`SubmissionLog`] and removes the consumed batch.
//!
//! Channel state lives in an [`OpenChannels`] value owned by the caller
//! (normally one directory pass of the sync driver).
//!
//! # Example
//!
//! ```ignore
//! let mut channels = OpenChannels::new();
//! let request = TransferRequest::new(original_surl, copy_surl).last_in_directory(true);
//! ledger.enqueue(&mut channels, &request).await?;
//! let outcomes = submitter.flush_open(&mut channels, request.trigger()).await?;
//! ```

mod channels;
mod config;
mod error;
mod ledger;
mod log;
mod quota;
mod status;
mod submitter;
mod types;

pub use channels::{OpenChannel, OpenChannels};
pub use config::{QuotaConfig, TransferConfig};
pub use error::TransferError;
pub use ledger::{count_pending, TransferLedger};
pub use log::SubmissionLog;
pub use quota::ChannelQuotaMonitor;
pub use status::{parse_status_stanzas, FileTransferStatus, FtsProtocol, StatusClass, TransferCounts};
pub use submitter::TransferSubmitter;
pub use types::{
    decide_flush, ChannelKey, EnqueueOutcome, FlushDecision, FlushOutcome, FlushTrigger,
    TransferRequest,
};
