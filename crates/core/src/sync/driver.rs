//! Per-directory sync pass.

use std::sync::Arc;
use tracing::{debug, error, info, warn};

use super::config::{SyncConfig, TransferMode};
use super::error::SyncError;
use super::lister::DirectoryLister;
use super::types::{DirectorySnapshot, FileEntry, SyncFilter, SyncPhase, SyncReport};
use crate::command::{CommandRunner, GridCommand, RunMode};
use crate::metrics::SYNC_FILES;
use crate::storage::{storage_key, StorageElement, StorageRegistry};
use crate::transfer::{
    count_pending, ChannelQuotaMonitor, EnqueueOutcome, FlushOutcome, OpenChannels, QuotaConfig,
    TransferConfig, TransferError, TransferLedger, TransferRequest, TransferSubmitter,
};

/// Replicates the files of a catalogue directory onto one storage element.
pub struct SyncDriver {
    runner: Arc<dyn CommandRunner>,
    registry: Arc<StorageRegistry>,
    ledger: TransferLedger,
    submitter: TransferSubmitter,
    config: SyncConfig,
}

impl SyncDriver {
    pub fn new(
        runner: Arc<dyn CommandRunner>,
        registry: Arc<StorageRegistry>,
        ledger: TransferLedger,
        submitter: TransferSubmitter,
        config: SyncConfig,
    ) -> Self {
        Self {
            runner,
            registry,
            ledger,
            submitter,
            config,
        }
    }

    /// Wires the ledger, quota monitor and submitter from their configs.
    pub fn from_parts(
        runner: Arc<dyn CommandRunner>,
        registry: Arc<StorageRegistry>,
        transfer: TransferConfig,
        quota: QuotaConfig,
        config: SyncConfig,
    ) -> Self {
        let ledger = TransferLedger::new(&transfer.directory, registry.clone()).with_slot(transfer.slot);
        let monitor = ChannelQuotaMonitor::new(runner.clone(), &transfer, quota);
        let submitter = TransferSubmitter::new(runner.clone(), registry.clone(), monitor, transfer);
        Self::new(runner, registry, ledger, submitter, config)
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    pub fn submitter(&self) -> &TransferSubmitter {
        &self.submitter
    }

    /// Lists `directory` and syncs it.
    pub async fn sync(
        &self,
        lister: &dyn DirectoryLister,
        directory: &str,
        destination: &str,
        filter: &SyncFilter,
    ) -> Result<SyncReport, SyncError> {
        let snapshot = lister.snapshot(directory).await?;
        self.sync_directory(&snapshot, destination, filter).await
    }

    /// Runs one pass over a directory snapshot.
    ///
    /// Per-file failures are counted and the pass continues. If any file
    /// failed, the batches still registered are purged and the count is
    /// returned as [`SyncError::DirectoryFailed`].
    pub async fn sync_directory(
        &self,
        snapshot: &DirectorySnapshot,
        destination: &str,
        filter: &SyncFilter,
    ) -> Result<SyncReport, SyncError> {
        let dest = self.registry.lookup(destination).ok_or_else(|| {
            TransferError::UnknownStorageElement {
                key: destination.to_string(),
            }
        })?;

        let mut report = SyncReport {
            directory: snapshot.directory().to_string(),
            destination: dest.key.clone(),
            ..SyncReport::default()
        };
        let mut channels = OpenChannels::new();
        let mut failures = 0;

        info!(
            phase = %SyncPhase::Scanning,
            directory = snapshot.directory(),
            files = snapshot.len(),
            last = snapshot.last_name().unwrap_or_default(),
            "Syncing directory to {}",
            dest.key
        );

        debug!(phase = %SyncPhase::Copying, mode = ?self.config.mode, "Copying files");
        for entry in snapshot.entries() {
            let batched_last =
                snapshot.is_last(entry) && self.config.mode == TransferMode::Batched;

            if !filter.matches(entry) && !batched_last {
                report.filtered += 1;
                SYNC_FILES.with_label_values(&["filtered"]).inc();
                continue;
            }

            if let Err(e) = self
                .copy_entry(&mut channels, entry, dest, batched_last, &mut report)
                .await
            {
                failures += 1;
                SYNC_FILES.with_label_values(&["failed"]).inc();
                error!(file = %entry.lfn, destination = %dest.key, "Copy failed: {}", e);
            }
        }

        debug!(phase = %SyncPhase::Flushing, open = channels.len(), "Closing channels");
        failures += close_idle_channels(&mut channels).await;
        report.pending_channels = channels.len();

        if failures > 0 {
            let removed = self.ledger.purge(&mut channels).await;
            warn!(
                phase = %SyncPhase::Failed,
                failures,
                removed = removed.len(),
                retained = channels.retained().len(),
                "Directory sync failed"
            );
            return Err(SyncError::DirectoryFailed {
                directory: snapshot.directory().to_string(),
                destination: dest.key.clone(),
                failures,
            });
        }

        info!(
            phase = %SyncPhase::Done,
            queued = report.queued,
            replicated = report.replicated,
            present = report.already_present,
            submissions = report.transfer_ids().len(),
            pending_channels = report.pending_channels,
            "Directory sync complete"
        );
        Ok(report)
    }

    async fn copy_entry(
        &self,
        channels: &mut OpenChannels,
        entry: &FileEntry,
        dest: &StorageElement,
        batched_last: bool,
        report: &mut SyncReport,
    ) -> Result<(), TransferError> {
        let present = entry.replica_on(&dest.key);

        if self.config.mode == TransferMode::Direct {
            if present.is_some() {
                mark_present(entry, report);
                return Ok(());
            }
            self.replicate(entry, dest).await?;
            report.replicated += 1;
            SYNC_FILES.with_label_values(&["replicated"]).inc();
            return Ok(());
        }

        let request = match present {
            Some(existing) if batched_last => {
                // Nothing to copy, but the open channels still need their flush.
                TransferRequest::new(existing, existing)
                    .last_in_directory(true)
                    .forced(true)
            }
            Some(_) => {
                mark_present(entry, report);
                return Ok(());
            }
            None => {
                let original = entry
                    .source_replica(&dest.key)
                    .ok_or_else(|| TransferError::NoReplica {
                        lfn: entry.lfn.clone(),
                    })?;
                self.stage(original).await?;
                TransferRequest::new(original, dest.surl_for(&entry.relative_path))
                    .last_in_directory(batched_last)
            }
        };

        match self.ledger.enqueue(channels, &request).await? {
            EnqueueOutcome::Queued { .. } => {
                report.queued += 1;
                SYNC_FILES.with_label_values(&["queued"]).inc();
            }
            EnqueueOutcome::SkippedDuplicate { .. } => {}
            EnqueueOutcome::ForcedFlush => mark_present(entry, report),
        }

        let outcomes = self
            .submitter
            .flush_open(channels, request.trigger())
            .await?;
        report.flushes.extend(
            outcomes
                .into_iter()
                .filter(|o| !matches!(o, FlushOutcome::Deferred { .. })),
        );
        Ok(())
    }

    /// Brings a tape-backed source online before it is transferred.
    async fn stage(&self, surl: &str) -> Result<(), TransferError> {
        let Some(key) = storage_key(surl) else {
            return Ok(());
        };
        if !self.config.needs_staging(&key) {
            return Ok(());
        }

        let staging_failed = |e: &dyn std::fmt::Display| TransferError::StagingFailed {
            surl: surl.to_string(),
            reason: e.to_string(),
        };

        let listing = GridCommand::new("lcg-ls").args(["-l", surl]);
        let lines = self
            .runner
            .run(&listing, self.runner.default_timeout(), RunMode::Interactive)
            .await
            .map_err(|e| staging_failed(&e))?;
        let online = lines
            .first()
            .and_then(|l| l.split_whitespace().nth(5))
            .is_some_and(|locality| locality.contains("ONLINE"));
        if online {
            return Ok(());
        }

        info!(surl, "Bringing file online");
        let bring_online = GridCommand::new("lcg-bringonline").arg(surl);
        self.runner
            .run(&bring_online, self.config.staging_timeout(), RunMode::Captured)
            .await
            .map_err(|e| staging_failed(&e))?;
        Ok(())
    }

    /// Copies one file straight to the destination.
    async fn replicate(&self, entry: &FileEntry, dest: &StorageElement) -> Result<(), TransferError> {
        let copy = dest.surl_for(&entry.relative_path);
        let mut command = GridCommand::new("lcg-rep").args(["-v", "-n", "3"]);
        if dest.space_token {
            command = command.args(["-S", self.submitter.config().space_token.as_str()]);
        }
        let command = command.args(["-d", copy.as_str(), entry.lfn.as_str()]);

        info!(file = %entry.lfn, copy = %copy, "Replicating");
        self.runner
            .run(&command, self.config.replicate_timeout(), RunMode::Interactive)
            .await?;
        Ok(())
    }
}

/// Unregisters channels with nothing pending. Returns how many batch files
/// could not be read.
async fn close_idle_channels(channels: &mut OpenChannels) -> usize {
    let mut failures = 0;
    for channel in channels.snapshot() {
        match count_pending(&channel.path).await {
            Ok(0) => {
                channels.remove(&channel.key);
            }
            Ok(pending) => {
                debug!(channel = %channel.key, pending, "Leaving batch for the next run");
            }
            Err(e) => {
                failures += 1;
                error!(channel = %channel.key, "Failed to read batch: {}", e);
            }
        }
    }
    failures
}

fn mark_present(entry: &FileEntry, report: &mut SyncReport) {
    debug!(file = %entry.lfn, "Replica already exists");
    report.already_present += 1;
    SYNC_FILES.with_label_values(&["present"]).inc();
}
