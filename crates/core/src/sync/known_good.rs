//! Known-good file list.

use std::collections::HashSet;
use std::path::Path;
use tracing::{debug, info, warn};

use super::error::SyncError;
use super::types::{normalize_lfn, SyncFilter};

/// Run-range directory holding `run`, e.g. `00004000_00004999`.
pub fn run_range(run: u64) -> String {
    let start = 1000 * (run / 1000);
    format!("{:08}_{:08}", start, start + 999)
}

/// Run number of a raw file name such as `nd280_00004123_0001.daq.mid.gz`.
pub fn run_number(file_name: &str) -> Option<u64> {
    file_name.split('_').nth(1)?.parse().ok()
}

/// LFNs read from a known-good list, restricted to one run range.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KnownGoodList {
    lfns: HashSet<String>,
}

impl KnownGoodList {
    /// Loads the list, keeping lines that contain `run_range`.
    pub async fn load(path: &Path, run_range: &str) -> Result<Self, SyncError> {
        info!(path = %path.display(), run_range, "Loading known-good list");
        let contents =
            tokio::fs::read_to_string(path)
                .await
                .map_err(|source| SyncError::KnownGoodList {
                    path: path.to_path_buf(),
                    source,
                })?;
        let list = Self::parse(&contents, run_range);
        debug!(files = list.len(), "Known-good files in range");
        Ok(list)
    }

    pub fn parse(contents: &str, run_range: &str) -> Self {
        let lfns = contents
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty() && l.contains(run_range))
            .map(normalize_lfn)
            .collect();
        Self { lfns }
    }

    pub fn contains(&self, lfn: &str) -> bool {
        self.lfns.contains(&normalize_lfn(lfn))
    }

    pub fn len(&self) -> usize {
        self.lfns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lfns.is_empty()
    }

    /// Filter that keeps only listed files.
    ///
    /// A list with nothing in range filters nothing.
    pub fn into_filter(self) -> SyncFilter {
        if self.lfns.is_empty() {
            warn!("No known-good files in range, syncing every file");
            return SyncFilter::All;
        }
        SyncFilter::KnownGood(self.lfns)
    }
}
