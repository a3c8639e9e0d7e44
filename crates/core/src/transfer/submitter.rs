//! Bulk submission of channel batches.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

use super::channels::{OpenChannel, OpenChannels};
use super::config::TransferConfig;
use super::error::TransferError;
use super::ledger::count_pending;
use super::log::SubmissionLog;
use super::quota::ChannelQuotaMonitor;
use super::types::{decide_flush, ChannelKey, FlushDecision, FlushOutcome, FlushTrigger};
use crate::command::{CommandRunner, GridCommand, RunMode};
use crate::metrics::{FILES_SUBMITTED, FLUSHES, TRANSFERS_SUBMITTED};
use crate::storage::StorageRegistry;

/// Turns channel batch files into transfer service jobs.
pub struct TransferSubmitter {
    runner: Arc<dyn CommandRunner>,
    registry: Arc<StorageRegistry>,
    monitor: ChannelQuotaMonitor,
    log: SubmissionLog,
    config: TransferConfig,
    timeout: Duration,
}

impl TransferSubmitter {
    pub fn new(
        runner: Arc<dyn CommandRunner>,
        registry: Arc<StorageRegistry>,
        monitor: ChannelQuotaMonitor,
        config: TransferConfig,
    ) -> Self {
        let timeout = runner.default_timeout();
        let log = SubmissionLog::new(&config.directory);
        Self {
            runner,
            registry,
            monitor,
            log,
            config,
            timeout,
        }
    }

    pub fn config(&self) -> &TransferConfig {
        &self.config
    }

    pub fn monitor(&self) -> &ChannelQuotaMonitor {
        &self.monitor
    }

    pub fn submission_log(&self) -> &SubmissionLog {
        &self.log
    }

    /// The submit command for a batch file.
    pub fn submit_command(&self, path: &Path, destination_has_token: bool) -> GridCommand {
        let mut command = GridCommand::new("glite-transfer-submit")
            .args(["--verbose", "-v", "-K", "-o"])
            .args(["-s", self.config.fts_service.as_str()]);
        if let Some(myproxy) = &self.config.myproxy_server {
            command = command.args(["-m", myproxy.as_str()]);
        }
        if destination_has_token {
            command = command.args(["-t", self.config.space_token.as_str()]);
        }
        command.arg("-f").arg(path.display().to_string())
    }

    /// Flushes one channel according to `trigger`.
    ///
    /// The batch file is removed after a successful submission or a
    /// discard, and kept whenever an error is returned.
    pub async fn flush(
        &self,
        channel: &OpenChannel,
        trigger: FlushTrigger,
    ) -> Result<FlushOutcome, TransferError> {
        let key = &channel.key;
        let pending = count_pending(&channel.path).await?;

        match decide_flush(pending, self.config.batch_size, trigger) {
            FlushDecision::Defer => {
                debug!(channel = %key, pending, "Batch below threshold, deferring");
                FLUSHES.with_label_values(&["deferred"]).inc();
                Ok(FlushOutcome::Deferred {
                    channel: key.clone(),
                    pending,
                })
            }
            FlushDecision::Discard => {
                remove_batch(&channel.path).await?;
                info!(channel = %key, pending, "No new files to transfer, removed batch");
                FLUSHES.with_label_values(&["discarded"]).inc();
                Ok(FlushOutcome::Discarded {
                    channel: key.clone(),
                    pending,
                })
            }
            FlushDecision::Submit => {
                let transfer_id = self.submit(key, &channel.path).await?;
                remove_batch(&channel.path).await?;
                FILES_SUBMITTED.inc_by(pending as u64);
                FLUSHES.with_label_values(&["submitted"]).inc();
                Ok(FlushOutcome::Submitted {
                    channel: key.clone(),
                    transfer_id,
                    files: pending,
                })
            }
        }
    }

    async fn submit(&self, key: &ChannelKey, path: &Path) -> Result<String, TransferError> {
        if self.registry.lookup(&key.source).is_none() {
            return Err(TransferError::UnknownStorageElement {
                key: key.source.clone(),
            });
        }
        let destination = self.registry.lookup(&key.destination).ok_or_else(|| {
            TransferError::UnknownStorageElement {
                key: key.destination.clone(),
            }
        })?;
        if !tokio::fs::try_exists(path)
            .await
            .map_err(|e| TransferError::io(path, e))?
        {
            return Err(TransferError::channel_state(
                key,
                format!("batch file {} is missing", path.display()),
            ));
        }

        self.monitor
            .wait_for_capacity(
                &key.source,
                &key.destination,
                self.monitor.config().max_active_per_channel,
            )
            .await?;

        let command = self.submit_command(path, destination.space_token);
        info!(channel = %key, command = %command, "Submitting batch");
        let lines = self
            .runner
            .run(&command, self.timeout, RunMode::Interactive)
            .await
            .inspect_err(|e| error!(channel = %key, "Submission failed: {}", e))?;

        let transfer_id = lines
            .iter()
            .map(|l| l.trim())
            .find(|l| !l.is_empty())
            .map(String::from)
            .ok_or_else(|| TransferError::MissingTransferId {
                channel: key.to_string(),
            })?;

        TRANSFERS_SUBMITTED.inc();
        info!(channel = %key, transfer_id = %transfer_id, "Batch submitted");

        if self.should_elevate(&key.source) {
            self.elevate_priority(&transfer_id).await;
        }

        self.log.append(&transfer_id).await?;
        Ok(transfer_id)
    }

    fn should_elevate(&self, source: &str) -> bool {
        !self.config.priority_marker.is_empty() && source.contains(&self.config.priority_marker)
    }

    /// Raises a submitted job's priority. Failures are only logged.
    pub async fn elevate_priority(&self, transfer_id: &str) -> bool {
        let priority = self.config.priority.to_string();
        let command = GridCommand::new("glite-transfer-setpriority").args([
            "-s",
            self.config.fts_service.as_str(),
            transfer_id,
            priority.as_str(),
        ]);
        match self
            .runner
            .run(&command, self.timeout, RunMode::Interactive)
            .await
        {
            Ok(_) => {
                debug!(transfer_id, priority = self.config.priority, "Priority raised");
                true
            }
            Err(e) => {
                warn!(transfer_id, "Failed to raise priority: {}", e);
                false
            }
        }
    }

    /// Flushes every open channel in registration order.
    ///
    /// Closed channels leave the open set. On error the failing channel is
    /// retained with its batch on disk and the error is returned.
    pub async fn flush_open(
        &self,
        channels: &mut OpenChannels,
        trigger: FlushTrigger,
    ) -> Result<Vec<FlushOutcome>, TransferError> {
        let mut outcomes = Vec::new();
        for channel in channels.snapshot() {
            match self.flush(&channel, trigger).await {
                Ok(outcome) => {
                    if outcome.closes_channel() {
                        channels.remove(&channel.key);
                    }
                    outcomes.push(outcome);
                }
                Err(e) => {
                    channels.retain_for_retry(&channel.key);
                    FLUSHES.with_label_values(&["failed"]).inc();
                    return Err(e);
                }
            }
        }
        Ok(outcomes)
    }
}

async fn remove_batch(path: &Path) -> Result<(), TransferError> {
    match tokio::fs::remove_file(path).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(TransferError::io(path, e)),
    }
}
