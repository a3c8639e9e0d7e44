//! Per-channel batch files of pending copy pairs.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

use super::channels::OpenChannels;
use super::error::TransferError;
use super::types::{ChannelKey, EnqueueOutcome, TransferRequest};
use crate::storage::{storage_key, StorageRegistry};

/// Number of pending pairs in a batch file; a missing file holds none.
pub async fn count_pending(path: &Path) -> Result<usize, TransferError> {
    match fs::read_to_string(path).await {
        Ok(contents) => Ok(contents.lines().filter(|l| !l.trim().is_empty()).count()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(0),
        Err(e) => Err(TransferError::io(path, e)),
    }
}

/// Append-only store of pending pairs, one batch file per channel.
pub struct TransferLedger {
    directory: PathBuf,
    registry: Arc<StorageRegistry>,
    slot: Option<u32>,
}

impl TransferLedger {
    pub fn new(directory: impl Into<PathBuf>, registry: Arc<StorageRegistry>) -> Self {
        Self {
            directory: directory.into(),
            registry,
            slot: None,
        }
    }

    /// Sets the channel disambiguator used in batch file names.
    pub fn with_slot(mut self, slot: Option<u32>) -> Self {
        self.slot = slot;
        self
    }

    /// Path of a channel's batch file.
    pub fn channel_path(&self, key: &ChannelKey) -> PathBuf {
        self.directory.join(key.batch_file_name())
    }

    /// Channel key for a request, validating both ends.
    pub fn channel_for(&self, request: &TransferRequest) -> Result<ChannelKey, TransferError> {
        let source = self.resolve(&request.original, request)?;
        let destination = self.resolve(&request.copy, request)?;
        Ok(ChannelKey::new(source, destination).with_slot(self.slot))
    }

    fn resolve(&self, surl: &str, request: &TransferRequest) -> Result<String, TransferError> {
        let key = storage_key(surl).ok_or_else(|| {
            TransferError::invalid_pair(
                &request.original,
                &request.copy,
                format!("{} is not a valid SURL", surl),
            )
        })?;
        if !self.registry.contains(&key) {
            return Err(TransferError::UnknownStorageElement { key });
        }
        Ok(key)
    }

    /// Queues a request on its channel.
    ///
    /// A self-copy is only accepted as the last request of a directory or
    /// when explicitly forced; it writes nothing and asks for a flush of
    /// every open channel instead.
    pub async fn enqueue(
        &self,
        channels: &mut OpenChannels,
        request: &TransferRequest,
    ) -> Result<EnqueueOutcome, TransferError> {
        if request.is_self_copy() {
            if request.last_in_directory || request.forced {
                info!(
                    file = %request.original,
                    "Self-copy on last file, forcing flush of open channels"
                );
                return Ok(EnqueueOutcome::ForcedFlush);
            }
            return Err(TransferError::invalid_pair(
                &request.original,
                &request.copy,
                "trying to overwrite a file with itself",
            ));
        }

        let key = self.channel_for(request)?;
        let path = self.channel_path(&key);
        let channel = channels.register(key.clone(), path.clone())?;

        if channel.is_last_pair(&request.original, &request.copy) {
            debug!(channel = %key, file = %request.original, "Pair already queued, skipping");
            return Ok(EnqueueOutcome::SkippedDuplicate { channel: key, path });
        }

        fs::create_dir_all(&self.directory)
            .await
            .map_err(|e| TransferError::io(&self.directory, e))?;

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await
            .map_err(|e| TransferError::io(&path, e))?;
        let line = format!("{} {}\n", request.original, request.copy);
        file.write_all(line.as_bytes())
            .await
            .map_err(|e| TransferError::io(&path, e))?;
        file.flush().await.map_err(|e| TransferError::io(&path, e))?;

        channel.record_pair(&request.original, &request.copy);
        debug!(channel = %key, path = %path.display(), "Queued transfer pair");

        Ok(EnqueueOutcome::Queued { channel: key, path })
    }

    /// Removes every open channel's batch file and unregisters it.
    ///
    /// Channels with a failed flush, retained or reopened, keep their files.
    /// Returns the removed paths.
    pub async fn purge(&self, channels: &mut OpenChannels) -> Vec<PathBuf> {
        let mut removed = Vec::new();
        for channel in channels.drain_discardable() {
            match fs::remove_file(&channel.path).await {
                Ok(()) => {
                    info!(channel = %channel.key, path = %channel.path.display(), "Removed batch file");
                    removed.push(channel.path);
                }
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => {
                    warn!(path = %channel.path.display(), "Failed to remove batch file: {}", e);
                }
            }
        }
        removed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::StorageElement;
    use tempfile::TempDir;

    fn registry() -> Arc<StorageRegistry> {
        Arc::new(
            StorageRegistry::new([
                StorageElement::new("src.example.org", "srm://src.example.org/t2k", "SRC", false),
                StorageElement::new("dst.example.org", "srm://dst.example.org/t2k", "DST", true),
            ])
            .unwrap(),
        )
    }

    fn request(n: usize) -> TransferRequest {
        TransferRequest::new(
            format!("srm://src.example.org/t2k/raw/f{n}.daq"),
            format!("srm://dst.example.org/t2k/raw/f{n}.daq"),
        )
    }

    #[tokio::test]
    async fn test_enqueue_appends_one_line_per_call() {
        let dir = TempDir::new().unwrap();
        let ledger = TransferLedger::new(dir.path(), registry());
        let mut channels = OpenChannels::new();

        let mut path = PathBuf::new();
        for n in 0..7 {
            match ledger.enqueue(&mut channels, &request(n)).await.unwrap() {
                EnqueueOutcome::Queued { path: p, .. } => path = p,
                other => panic!("unexpected outcome {other:?}"),
            }
        }

        assert_eq!(count_pending(&path).await.unwrap(), 7);
        assert_eq!(channels.len(), 1);
        let contents = std::fs::read_to_string(&path).unwrap();
        assert_eq!(
            contents.lines().next().unwrap(),
            "srm://src.example.org/t2k/raw/f0.daq srm://dst.example.org/t2k/raw/f0.daq"
        );
        assert_eq!(
            path.file_name().unwrap().to_str().unwrap(),
            "transfer.src.example.org-dst.example.org.txt"
        );
    }

    #[tokio::test]
    async fn test_consecutive_duplicate_skipped() {
        let dir = TempDir::new().unwrap();
        let ledger = TransferLedger::new(dir.path(), registry());
        let mut channels = OpenChannels::new();

        ledger.enqueue(&mut channels, &request(1)).await.unwrap();
        let outcome = ledger.enqueue(&mut channels, &request(1)).await.unwrap();
        assert!(matches!(outcome, EnqueueOutcome::SkippedDuplicate { .. }));
        ledger.enqueue(&mut channels, &request(2)).await.unwrap();

        let key = ledger.channel_for(&request(1)).unwrap();
        assert_eq!(count_pending(&ledger.channel_path(&key)).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_self_copy_rejected_without_writing() {
        let dir = TempDir::new().unwrap();
        let ledger = TransferLedger::new(dir.path(), registry());
        let mut channels = OpenChannels::new();
        let same = "srm://dst.example.org/t2k/raw/f.daq";

        let err = ledger
            .enqueue(&mut channels, &TransferRequest::new(same, same))
            .await
            .unwrap_err();
        assert!(matches!(err, TransferError::InvalidPair { .. }));
        assert!(channels.is_empty());
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_self_copy_on_last_file_forces_flush() {
        let dir = TempDir::new().unwrap();
        let ledger = TransferLedger::new(dir.path(), registry());
        let mut channels = OpenChannels::new();
        let same = "srm://dst.example.org/t2k/raw/f.daq";

        let outcome = ledger
            .enqueue(
                &mut channels,
                &TransferRequest::new(same, same).last_in_directory(true),
            )
            .await
            .unwrap();
        assert_eq!(outcome, EnqueueOutcome::ForcedFlush);
        assert!(channels.is_empty());
    }

    #[tokio::test]
    async fn test_invalid_and_unknown_urls() {
        let dir = TempDir::new().unwrap();
        let ledger = TransferLedger::new(dir.path(), registry());
        let mut channels = OpenChannels::new();

        let err = ledger
            .enqueue(
                &mut channels,
                &TransferRequest::new("/local/f.daq", "srm://dst.example.org/t2k/f.daq"),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, TransferError::InvalidPair { .. }));

        let err = ledger
            .enqueue(
                &mut channels,
                &TransferRequest::new(
                    "srm://elsewhere.example.org/f.daq",
                    "srm://dst.example.org/t2k/f.daq",
                ),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, TransferError::UnknownStorageElement { .. }));
        assert!(channels.is_empty());
    }

    #[tokio::test]
    async fn test_slot_in_file_name() {
        let dir = TempDir::new().unwrap();
        let ledger = TransferLedger::new(dir.path(), registry()).with_slot(Some(3));
        let mut channels = OpenChannels::new();

        match ledger.enqueue(&mut channels, &request(1)).await.unwrap() {
            EnqueueOutcome::Queued { path, channel } => {
                assert_eq!(channel.slot, Some(3));
                assert!(path.ends_with("transfer.src.example.org-dst.example.org.3.txt"));
            }
            other => panic!("unexpected outcome {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_count_pending_missing_file() {
        let dir = TempDir::new().unwrap();
        assert_eq!(
            count_pending(&dir.path().join("transfer.none.txt"))
                .await
                .unwrap(),
            0
        );
    }

    #[tokio::test]
    async fn test_purge_removes_open_batches() {
        let dir = TempDir::new().unwrap();
        let ledger = TransferLedger::new(dir.path(), registry());
        let mut channels = OpenChannels::new();
        ledger.enqueue(&mut channels, &request(1)).await.unwrap();

        let removed = ledger.purge(&mut channels).await;
        assert_eq!(removed.len(), 1);
        assert!(!removed[0].exists());
        assert!(channels.is_empty());
    }

    #[tokio::test]
    async fn test_purge_spares_reopened_failed_channel() {
        let dir = TempDir::new().unwrap();
        let ledger = TransferLedger::new(dir.path(), registry());
        let mut channels = OpenChannels::new();

        // The first channel's submission failed, then a later file reopened it.
        ledger.enqueue(&mut channels, &request(1)).await.unwrap();
        let failed = ledger.channel_for(&request(1)).unwrap();
        channels.retain_for_retry(&failed);
        ledger.enqueue(&mut channels, &request(2)).await.unwrap();

        let reverse = TransferRequest::new(
            "srm://dst.example.org/t2k/raw/g1.daq",
            "srm://src.example.org/t2k/raw/g1.daq",
        );
        ledger.enqueue(&mut channels, &reverse).await.unwrap();
        let other = ledger.channel_for(&reverse).unwrap();

        let removed = ledger.purge(&mut channels).await;

        assert_eq!(removed, vec![ledger.channel_path(&other)]);
        assert!(!ledger.channel_path(&other).exists());
        assert_eq!(count_pending(&ledger.channel_path(&failed)).await.unwrap(), 2);
        assert!(channels.is_empty());
        assert_eq!(channels.retained().len(), 1);
        assert_eq!(channels.retained()[0].key, failed);
    }

    #[tokio::test]
    async fn test_resumes_existing_batch() {
        let dir = TempDir::new().unwrap();
        let ledger = TransferLedger::new(dir.path(), registry());

        // A previous run left one pair behind.
        let mut first = OpenChannels::new();
        ledger.enqueue(&mut first, &request(1)).await.unwrap();

        let mut second = OpenChannels::new();
        ledger.enqueue(&mut second, &request(2)).await.unwrap();

        let key = ledger.channel_for(&request(2)).unwrap();
        assert_eq!(count_pending(&ledger.channel_path(&key)).await.unwrap(), 2);
    }
}
