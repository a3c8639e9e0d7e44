//! Per-channel in-flight limit against the transfer service.

use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use super::config::{QuotaConfig, TransferConfig};
use super::error::TransferError;
use super::status::{parse_status_stanzas, FileTransferStatus, FtsProtocol, TransferCounts};
use super::types::ChannelKey;
use crate::command::{CommandRunner, GridCommand, RunMode};
use crate::metrics::QUOTA_WAITS;
use crate::storage::storage_key;

/// Counts active transfers on a channel and waits for room.
pub struct ChannelQuotaMonitor {
    runner: Arc<dyn CommandRunner>,
    config: QuotaConfig,
    service: String,
    vo: String,
    protocol: FtsProtocol,
    timeout: Duration,
}

impl ChannelQuotaMonitor {
    pub fn new(
        runner: Arc<dyn CommandRunner>,
        transfer: &TransferConfig,
        config: QuotaConfig,
    ) -> Self {
        let timeout = runner.default_timeout();
        Self {
            runner,
            config,
            service: transfer.fts_service.clone(),
            vo: transfer.vo.clone(),
            protocol: transfer.protocol,
            timeout,
        }
    }

    pub fn config(&self) -> &QuotaConfig {
        &self.config
    }

    /// Whether a source never has to wait for capacity.
    pub fn is_fast_origin(&self, source: &str) -> bool {
        self.config
            .fast_origins
            .iter()
            .any(|marker| !marker.is_empty() && source.contains(marker.as_str()))
    }

    /// Identifiers of the service's transfers between two SEs.
    pub async fn active_transfer_ids(
        &self,
        source: &str,
        destination: &str,
    ) -> Result<Vec<String>, TransferError> {
        let command = GridCommand::new("glite-transfer-list")
            .args(["-o", self.vo.as_str(), "-s", self.service.as_str()])
            .args(["--source", source, "--dest", destination]);
        let lines = self
            .runner
            .run(&command, self.timeout, RunMode::Captured)
            .await?;

        Ok(lines
            .iter()
            .filter_map(|l| l.split('\t').next())
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .map(String::from)
            .collect())
    }

    /// Per-file records of one submitted transfer.
    ///
    /// Reason lines routinely carry error text, so only stderr and the exit
    /// status decide whether the call failed.
    pub async fn transfer_status(
        &self,
        transfer_id: &str,
    ) -> Result<Vec<FileTransferStatus>, TransferError> {
        let command = GridCommand::new("glite-transfer-status")
            .args(["-s", self.service.as_str(), "-l", transfer_id]);
        let lines = self
            .runner
            .run(&command, self.timeout, RunMode::Captured)
            .await?;
        Ok(parse_status_stanzas(&lines))
    }

    /// Active file transfers on a channel.
    ///
    /// Failed listings count as zero so a flaky service never stalls the
    /// caller.
    pub async fn active_count(&self, source: &str, destination: &str) -> usize {
        let ids = match self.active_transfer_ids(source, destination).await {
            Ok(ids) => ids,
            Err(e) => {
                warn!(source, destination, "Failed to list transfers: {}", e);
                return 0;
            }
        };

        let mut counts = TransferCounts::default();
        for id in &ids {
            match self.transfer_status(id).await {
                Ok(records) => {
                    counts += TransferCounts::tally(
                        self.protocol,
                        records.iter().filter(|r| on_channel(r, source, destination)),
                    );
                }
                Err(e) => {
                    warn!(transfer_id = %id, "Failed to get transfer status: {}", e);
                }
            }
        }

        info!(
            source,
            destination,
            transfers = ids.len(),
            files = counts.total(),
            active = counts.active,
            finished = counts.finished,
            failed = counts.failed,
            "Polled channel"
        );
        counts.active
    }

    /// Blocks until the channel has at most `ceiling` active transfers.
    pub async fn wait_for_capacity(
        &self,
        source: &str,
        destination: &str,
        ceiling: usize,
    ) -> Result<(), TransferError> {
        if self.is_fast_origin(source) {
            debug!(source, "Fast origin, skipping capacity check");
            return Ok(());
        }

        let started = Instant::now();
        let interval = self.config.poll_interval();
        loop {
            let active = self.active_count(source, destination).await;
            if active <= ceiling {
                return Ok(());
            }

            if let Some(max_wait) = self.config.max_wait() {
                if started.elapsed() + interval > max_wait {
                    return Err(TransferError::QuotaWaitAbandoned {
                        channel: ChannelKey::new(source, destination).to_string(),
                        active,
                        waited_secs: started.elapsed().as_secs(),
                    });
                }
            }

            QUOTA_WAITS.inc();
            info!(
                source,
                destination,
                active,
                ceiling,
                "Channel over capacity, waiting {:?}",
                interval
            );
            tokio::time::sleep(interval).await;
        }
    }
}

fn on_channel(record: &FileTransferStatus, source: &str, destination: &str) -> bool {
    storage_key(&record.source).as_deref() == Some(source)
        && storage_key(&record.destination).as_deref() == Some(destination)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::CommandError;
    use crate::testing::{fixtures, MockCommandRunner, MockResponse};

    const SRC: &str = "srm-t2k.gridpp.rl.ac.uk";
    const DST: &str = "t2ksrm.nd280.org";

    fn monitor(runner: &MockCommandRunner, quota: QuotaConfig) -> ChannelQuotaMonitor {
        let transfer = fixtures::transfer_config("/tmp");
        ChannelQuotaMonitor::new(Arc::new(runner.clone()), &transfer, quota)
    }

    fn fast_poll() -> QuotaConfig {
        QuotaConfig {
            poll_interval_ms: 1,
            ..QuotaConfig::default()
        }
    }

    fn stanzas(states: &[&str]) -> Vec<String> {
        let mut lines = vec!["Active".to_string()];
        for (n, state) in states.iter().enumerate() {
            lines.extend(fixtures::status_stanza(
                &format!("srm://{SRC}/castor/f{n}"),
                &format!("srm://{DST}/nd280data/f{n}"),
                state,
            ));
        }
        lines
    }

    #[tokio::test]
    async fn test_active_count_sums_active_records() {
        let runner = MockCommandRunner::new();
        runner
            .set_response("glite-transfer-list", MockResponse::lines(["id-1\tActive", "id-2\tActive"]))
            .await;
        runner
            .set_response(
                "glite-transfer-status",
                MockResponse::Lines(stanzas(&["Active", "Submitted", "Finished", "Hold"])),
            )
            .await;

        let monitor = monitor(&runner, fast_poll());
        assert_eq!(monitor.active_count(SRC, DST).await, 4);

        let list = runner.invocations_of("glite-transfer-list").await;
        assert_eq!(list.len(), 1);
        assert_eq!(list[0].command.flag_value("--source"), Some(SRC));
        assert_eq!(list[0].command.flag_value("--dest"), Some(DST));
        assert_eq!(list[0].command.flag_value("-o"), Some("t2k.org"));
        let status = runner.invocations_of("glite-transfer-status").await;
        assert_eq!(status[1].command.flag_value("-l"), Some("id-2"));
    }

    #[tokio::test]
    async fn test_error_text_in_reason_does_not_fail_status() {
        let runner = MockCommandRunner::new();
        runner
            .set_response("glite-transfer-list", MockResponse::stdout("id-1\tActive\n"))
            .await;
        let stdout = format!(
            "Active\n\
             Source:      srm://{SRC}/castor/f0\n\
             Destination: srm://{DST}/nd280data/f0\n\
             State:       Active\n\
             Retries:     0\n\
             Reason:      (null)\n\
             Duration:    0\n\
             Source:      srm://{SRC}/castor/f1\n\
             Destination: srm://{DST}/nd280data/f1\n\
             State:       Failed\n\
             Retries:     3\n\
             Reason:      TRANSFER error during transfer: connection timed out\n\
             Duration:    600\n"
        );
        runner
            .set_response("glite-transfer-status", MockResponse::stdout(stdout))
            .await;

        let monitor = monitor(&runner, fast_poll());
        assert_eq!(monitor.active_count(SRC, DST).await, 1);

        let status = runner.invocations_of("glite-transfer-status").await;
        assert_eq!(status.len(), 1);
        assert_eq!(status[0].mode, RunMode::Captured);
    }

    #[tokio::test]
    async fn test_status_stderr_counts_zero() {
        let runner = MockCommandRunner::new();
        runner
            .set_response("glite-transfer-list", MockResponse::lines(["id-1"]))
            .await;
        runner
            .set_response(
                "glite-transfer-status",
                MockResponse::Output {
                    stdout: String::new(),
                    stderr: "glite-transfer-status: proxy expired\n".to_string(),
                    exit_ok: false,
                },
            )
            .await;

        let monitor = monitor(&runner, fast_poll());
        assert_eq!(monitor.active_count(SRC, DST).await, 0);
    }

    #[tokio::test]
    async fn test_active_count_ignores_other_channels() {
        let runner = MockCommandRunner::new();
        runner
            .set_response("glite-transfer-list", MockResponse::lines(["id-1"]))
            .await;
        let mut lines = stanzas(&["Active"]);
        lines.extend(fixtures::status_stanza(
            "srm://other.example.org/f",
            &format!("srm://{DST}/f"),
            "Active",
        ));
        runner
            .set_response("glite-transfer-status", MockResponse::Lines(lines))
            .await;

        let monitor = monitor(&runner, fast_poll());
        assert_eq!(monitor.active_count(SRC, DST).await, 1);
    }

    #[tokio::test]
    async fn test_failed_listing_counts_zero() {
        let runner = MockCommandRunner::new();
        runner
            .set_response("glite-transfer-list", MockResponse::fail("proxy expired"))
            .await;

        let monitor = monitor(&runner, fast_poll());
        assert_eq!(monitor.active_count(SRC, DST).await, 0);
        assert_eq!(runner.call_count("glite-transfer-status").await, 0);
    }

    #[tokio::test]
    async fn test_fast_origin_skips_polling() {
        let runner = MockCommandRunner::new();
        let monitor = monitor(&runner, fast_poll());

        monitor
            .wait_for_capacity("kek-se01.cc.kek.jp", DST, 0)
            .await
            .unwrap();
        assert!(runner.recorded().await.is_empty());
    }

    #[tokio::test]
    async fn test_waits_until_below_ceiling() {
        let runner = MockCommandRunner::new();
        runner
            .set_response("glite-transfer-list", MockResponse::lines(["id-1"]))
            .await;
        runner
            .push_response(
                "glite-transfer-status",
                MockResponse::Lines(stanzas(&["Active", "Active", "Active"])),
            )
            .await;
        runner
            .push_response("glite-transfer-status", MockResponse::Lines(stanzas(&["Active"])))
            .await;

        let monitor = monitor(&runner, fast_poll());
        monitor.wait_for_capacity(SRC, DST, 2).await.unwrap();
        assert_eq!(runner.call_count("glite-transfer-list").await, 2);
    }

    #[tokio::test]
    async fn test_gives_up_after_max_wait() {
        let runner = MockCommandRunner::new();
        runner
            .set_response("glite-transfer-list", MockResponse::lines(["id-1"]))
            .await;
        runner
            .set_response("glite-transfer-status", MockResponse::Lines(stanzas(&["Active"])))
            .await;

        let quota = QuotaConfig {
            poll_interval_ms: 50,
            max_wait_ms: Some(120),
            ..QuotaConfig::default()
        };
        let monitor = monitor(&runner, quota);
        let err = monitor.wait_for_capacity(SRC, DST, 0).await.unwrap_err();
        match err {
            TransferError::QuotaWaitAbandoned { active, .. } => assert_eq!(active, 1),
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_status_error_propagates_from_direct_call() {
        let runner = MockCommandRunner::new();
        runner
            .set_response("glite-transfer-status", MockResponse::Timeout)
            .await;
        let monitor = monitor(&runner, fast_poll());
        let err = monitor.transfer_status("id-1").await.unwrap_err();
        assert!(matches!(
            err,
            TransferError::Command(CommandError::TimedOut { .. })
        ));
    }
}
