//! Transfer service status vocabulary and output parsing.

use serde::{Deserialize, Serialize};
use std::ops::AddAssign;

/// Status vocabulary version of the transfer service.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FtsProtocol {
    Fts2,
    #[default]
    Fts3,
}

/// Coarse class of a per-file transfer state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StatusClass {
    Active,
    Finished,
    Failed,
}

const FTS2_ACTIVE: &[&str] = &[
    "Active",
    "Pending",
    "Ready",
    "Submitted",
    "Hold",
    "Waiting",
    "Finishing",
];
const FTS2_FINISHED: &[&str] = &["Done", "Finished", "FinishedDirty"];
const FTS3_ACTIVE: &[&str] = &["Active", "Pending", "Ready", "Submitted"];
const FTS3_FINISHED: &[&str] = &["Finished", "FinishedDirty"];
const FAILED: &[&str] = &["Canceled", "Failed"];

impl FtsProtocol {
    /// Classifies a state string. Unknown states belong to no class.
    pub fn classify(&self, state: &str) -> Option<StatusClass> {
        let (active, finished) = match self {
            Self::Fts2 => (FTS2_ACTIVE, FTS2_FINISHED),
            Self::Fts3 => (FTS3_ACTIVE, FTS3_FINISHED),
        };
        if active.contains(&state) {
            Some(StatusClass::Active)
        } else if finished.contains(&state) {
            Some(StatusClass::Finished)
        } else if FAILED.contains(&state) {
            Some(StatusClass::Failed)
        } else {
            None
        }
    }
}

/// One file record from a detailed status listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileTransferStatus {
    pub source: String,
    pub destination: String,
    pub state: String,
    pub retries: String,
    pub reason: String,
    pub duration: String,
}

const STANZA_LINES: usize = 6;

/// Parses `glite-transfer-status -l` output.
///
/// The first line is the job state and is skipped. The remaining non-blank
/// lines come in six-line stanzas whose second token is the value. A
/// trailing partial stanza is dropped.
pub fn parse_status_stanzas(lines: &[String]) -> Vec<FileTransferStatus> {
    let values: Vec<String> = lines
        .iter()
        .skip(1)
        .filter(|l| !l.trim().is_empty())
        .map(|l| l.split_whitespace().nth(1).unwrap_or_default().to_string())
        .collect();

    values
        .chunks_exact(STANZA_LINES)
        .map(|s| FileTransferStatus {
            source: s[0].clone(),
            destination: s[1].clone(),
            state: s[2].clone(),
            retries: s[3].clone(),
            reason: s[4].clone(),
            duration: s[5].clone(),
        })
        .collect()
}

/// Per-class totals over a set of file records.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TransferCounts {
    pub active: usize,
    pub finished: usize,
    pub failed: usize,
}

impl TransferCounts {
    pub fn tally<'a>(
        protocol: FtsProtocol,
        records: impl IntoIterator<Item = &'a FileTransferStatus>,
    ) -> Self {
        let mut counts = Self::default();
        for record in records {
            counts.record(protocol.classify(&record.state));
        }
        counts
    }

    fn record(&mut self, class: Option<StatusClass>) {
        match class {
            Some(StatusClass::Active) => self.active += 1,
            Some(StatusClass::Finished) => self.finished += 1,
            Some(StatusClass::Failed) => self.failed += 1,
            None => {}
        }
    }

    pub fn total(&self) -> usize {
        self.active + self.finished + self.failed
    }
}

impl AddAssign for TransferCounts {
    fn add_assign(&mut self, other: Self) {
        self.active += other.active;
        self.finished += other.finished;
        self.failed += other.failed;
    }
}
