//! Directory synchronisation onto a storage element.
//!
//! A [`SyncDriver`] walks a [`DirectorySnapshot`] in name order, queues a
//! copy for every file missing on the destination and lets the transfer
//! submitter flush channel batches as they fill. The last file of the
//! directory always triggers a flush of every open channel.

mod config;
mod driver;
mod error;
mod known_good;
mod lister;
mod types;

pub use config::{SyncConfig, TransferMode};
pub use driver::SyncDriver;
pub use error::SyncError;
pub use known_good::{run_number, run_range, KnownGoodList};
pub use lister::{DirectoryLister, LfcDirectoryLister};
pub use types::{DirectorySnapshot, FileEntry, SyncFilter, SyncPhase, SyncReport};
