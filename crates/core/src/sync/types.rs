//! Types for directory syncs.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

use crate::storage::storage_key;
use crate::transfer::FlushOutcome;

/// A catalogue file with its known replicas.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileEntry {
    /// File name, the sort key within a directory.
    pub name: String,
    pub size_bytes: u64,
    /// Logical file name (`lfn:/grid/...`).
    pub lfn: String,
    /// Path below the namespace root, used to build copy SURLs.
    pub relative_path: String,
    /// SURLs of existing replicas.
    #[serde(default)]
    pub replicas: Vec<String>,
}

impl FileEntry {
    /// Replica SURL on the given storage element, if any.
    pub fn replica_on(&self, key: &str) -> Option<&str> {
        self.replicas
            .iter()
            .find(|r| storage_key(r).as_deref() == Some(key))
            .map(String::as_str)
    }

    /// First replica that can serve as a copy source for `destination`.
    pub fn source_replica(&self, destination: &str) -> Option<&str> {
        self.replicas
            .iter()
            .find(|r| matches!(storage_key(r), Some(key) if key != destination))
            .map(String::as_str)
    }
}

/// The files of one catalogue directory, sorted by name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DirectorySnapshot {
    directory: String,
    entries: Vec<FileEntry>,
}

impl DirectorySnapshot {
    pub fn new(directory: impl Into<String>, mut entries: Vec<FileEntry>) -> Self {
        entries.sort_by(|a, b| a.name.cmp(&b.name));
        Self {
            directory: directory.into(),
            entries,
        }
    }

    pub fn directory(&self) -> &str {
        &self.directory
    }

    pub fn entries(&self) -> &[FileEntry] {
        &self.entries
    }

    /// Name of the last file by sort order.
    pub fn last_name(&self) -> Option<&str> {
        self.entries.last().map(|e| e.name.as_str())
    }

    pub fn is_last(&self, entry: &FileEntry) -> bool {
        self.last_name() == Some(entry.name.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Which files of a directory are synced.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum SyncFilter {
    #[default]
    All,
    /// Files whose name contains the pattern.
    Pattern(String),
    /// Files whose LFN is on a known-good list.
    KnownGood(HashSet<String>),
}

impl SyncFilter {
    /// Builds a filter from an optional name pattern; empty means all.
    pub fn from_pattern(pattern: Option<&str>) -> Self {
        match pattern {
            Some(p) if !p.is_empty() => Self::Pattern(p.to_string()),
            _ => Self::All,
        }
    }

    pub fn matches(&self, entry: &FileEntry) -> bool {
        match self {
            Self::All => true,
            Self::Pattern(pattern) => entry.name.contains(pattern.as_str()),
            Self::KnownGood(lfns) => lfns.contains(&normalize_lfn(&entry.lfn)),
        }
    }
}

/// Collapses doubled slashes so list entries and catalogue names compare equal.
pub(crate) fn normalize_lfn(lfn: &str) -> String {
    let mut out = String::with_capacity(lfn.len());
    let mut previous = '\0';
    for c in lfn.chars() {
        if !(c == '/' && previous == '/') {
            out.push(c);
        }
        previous = c;
    }
    out
}

/// Phase of a directory pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncPhase {
    Scanning,
    Copying,
    Flushing,
    Done,
    Failed,
}

impl fmt::Display for SyncPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Scanning => "scanning",
            Self::Copying => "copying",
            Self::Flushing => "flushing",
            Self::Done => "done",
            Self::Failed => "failed",
        };
        write!(f, "{}", s)
    }
}

/// Summary of a completed directory pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SyncReport {
    pub directory: String,
    pub destination: String,
    /// Pairs appended to channel batches.
    pub queued: usize,
    /// Files replicated directly.
    pub replicated: usize,
    /// Files already present on the destination.
    pub already_present: usize,
    /// Files excluded by the filter.
    pub filtered: usize,
    /// Flush results in the order they happened.
    pub flushes: Vec<FlushOutcome>,
    /// Channels left with pending pairs for a later run.
    pub pending_channels: usize,
}

impl SyncReport {
    /// Transfer identifiers of every submission made during the pass.
    pub fn transfer_ids(&self) -> Vec<&str> {
        self.flushes.iter().filter_map(|f| f.transfer_id()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(name: &str, replicas: &[&str]) -> FileEntry {
        FileEntry {
            name: name.to_string(),
            size_bytes: 1,
            lfn: format!("lfn:/grid/t2k.org/nd280/raw/{name}"),
            relative_path: format!("raw/{name}"),
            replicas: replicas.iter().map(|r| r.to_string()).collect(),
        }
    }

    #[test]
    fn test_snapshot_sorted_by_name() {
        let snapshot = DirectorySnapshot::new(
            "lfn:/grid/t2k.org/nd280/raw",
            vec![entry("c.daq", &[]), entry("a.daq", &[]), entry("b.daq", &[])],
        );
        let names: Vec<_> = snapshot.entries().iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["a.daq", "b.daq", "c.daq"]);
        assert_eq!(snapshot.last_name(), Some("c.daq"));
        assert!(snapshot.is_last(&snapshot.entries()[2]));
    }

    #[test]
    fn test_replica_lookup() {
        let file = entry(
            "f.daq",
            &[
                "srm://t2ksrm.nd280.org/nd280data/raw/f.daq",
                "srm://srm-t2k.gridpp.rl.ac.uk/castor/raw/f.daq",
            ],
        );
        assert_eq!(
            file.replica_on("srm-t2k.gridpp.rl.ac.uk"),
            Some("srm://srm-t2k.gridpp.rl.ac.uk/castor/raw/f.daq")
        );
        assert_eq!(file.replica_on("kek-se01.cc.kek.jp"), None);
        assert_eq!(
            file.source_replica("t2ksrm.nd280.org"),
            Some("srm://srm-t2k.gridpp.rl.ac.uk/castor/raw/f.daq")
        );
        assert_eq!(entry("g.daq", &[]).source_replica("t2ksrm.nd280.org"), None);
    }

    #[test]
    fn test_filters() {
        let file = entry("nd280_00004000_0001.daq.mid.gz", &[]);
        assert!(SyncFilter::All.matches(&file));
        assert!(SyncFilter::from_pattern(Some("0001.daq")).matches(&file));
        assert!(!SyncFilter::from_pattern(Some("0002.daq")).matches(&file));
        assert_eq!(SyncFilter::from_pattern(Some("")), SyncFilter::All);

        let good: HashSet<String> =
            [normalize_lfn("lfn:/grid//t2k.org/nd280/raw/nd280_00004000_0001.daq.mid.gz")]
                .into_iter()
                .collect();
        assert!(SyncFilter::KnownGood(good).matches(&file));
    }

    #[test]
    fn test_normalize_lfn() {
        assert_eq!(normalize_lfn("lfn:/grid//t2k.org///a"), "lfn:/grid/t2k.org/a");
    }
}
