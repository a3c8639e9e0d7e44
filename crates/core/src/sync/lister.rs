//! Directory listings from the logical file catalogue.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use super::error::SyncError;
use super::types::{DirectorySnapshot, FileEntry};
use crate::command::{CommandRunner, GridCommand, RunMode};

/// Produces a snapshot of a catalogue directory.
#[async_trait]
pub trait DirectoryLister: Send + Sync {
    async fn snapshot(&self, directory: &str) -> Result<DirectorySnapshot, SyncError>;
}

/// Lists directories with `lfc-ls -l` and resolves replicas with `lcg-lr`.
pub struct LfcDirectoryLister {
    runner: Arc<dyn CommandRunner>,
    namespace_root: String,
    vo: String,
    timeout: Duration,
}

impl LfcDirectoryLister {
    pub fn new(
        runner: Arc<dyn CommandRunner>,
        namespace_root: impl Into<String>,
        vo: impl Into<String>,
    ) -> Self {
        let timeout = runner.default_timeout();
        Self {
            runner,
            namespace_root: namespace_root.into(),
            vo: vo.into(),
            timeout,
        }
    }

    /// Path of `lfn` below the namespace root.
    pub fn relative_path(&self, lfn: &str) -> String {
        let root = self.namespace_root.trim_end_matches('/');
        lfn.strip_prefix(root)
            .unwrap_or_else(|| lfn.trim_start_matches("lfn:"))
            .trim_start_matches('/')
            .to_string()
    }

    /// Replica SURLs of a logical file.
    pub async fn replicas(&self, lfn: &str) -> Result<Vec<String>, SyncError> {
        let command = GridCommand::new("lcg-lr").args(["--vo", self.vo.as_str(), lfn]);
        let lines = self
            .runner
            .run(&command, self.timeout, RunMode::Interactive)
            .await
            .map_err(|e| SyncError::listing(lfn, &e))?;
        Ok(lines
            .into_iter()
            .map(|l| l.trim().to_string())
            .filter(|l| l.starts_with("srm://"))
            .collect())
    }
}

/// Whether an `lfc-ls -l` line describes a subdirectory.
fn is_directory_row(line: &str) -> bool {
    line.trim_start().starts_with('d')
}

/// `(size, name)` from one `lfc-ls -l` line; short lines and subdirectories
/// carry no file.
fn parse_listing_line(line: &str) -> Option<(u64, String)> {
    if is_directory_row(line) {
        return None;
    }
    let fields: Vec<&str> = line.split_whitespace().collect();
    if fields.len() < 9 {
        return None;
    }
    let name = fields[fields.len() - 1].rsplit('/').next()?.to_string();
    let size = fields[4].parse().unwrap_or(0);
    Some((size, name))
}

#[async_trait]
impl DirectoryLister for LfcDirectoryLister {
    async fn snapshot(&self, directory: &str) -> Result<DirectorySnapshot, SyncError> {
        let directory = directory.trim_end_matches('/');
        let path = directory.trim_start_matches("lfn:");
        let command = GridCommand::new("lfc-ls").args(["-l", path]);
        let lines = self
            .runner
            .run(&command, self.timeout, RunMode::Interactive)
            .await
            .map_err(|e| SyncError::listing(directory, &e))?;

        let mut entries = Vec::new();
        for line in &lines {
            let Some((size_bytes, name)) = parse_listing_line(line) else {
                if is_directory_row(line) {
                    debug!(directory, line = %line, "Skipping subdirectory");
                } else if !line.trim().is_empty() {
                    warn!(directory, line = %line, "Skipping unnamed catalogue entry");
                }
                continue;
            };
            let lfn = format!("{}/{}", directory, name);
            let replicas = self.replicas(&lfn).await?;
            entries.push(FileEntry {
                relative_path: self.relative_path(&lfn),
                name,
                size_bytes,
                lfn,
                replicas,
            });
        }

        let snapshot = DirectorySnapshot::new(directory, entries);
        debug!(
            directory,
            files = snapshot.len(),
            last = snapshot.last_name().unwrap_or_default(),
            "Listed catalogue directory"
        );
        Ok(snapshot)
    }
}
