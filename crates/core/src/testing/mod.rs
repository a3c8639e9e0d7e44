//! Testing utilities and mock implementations.
//!
//! This module provides a scripted [`MockCommandRunner`] standing in for the
//! grid middleware, so transfers and syncs can be exercised end to end
//! without real infrastructure.
//!
//! # Example
//!
//! ```rust,ignore
//! use gridsync_core::testing::{fixtures, MockCommandRunner, MockResponse};
//!
//! let runner = MockCommandRunner::new();
//! runner
//!     .set_response("glite-transfer-submit", MockResponse::lines(["job-1"]))
//!     .await;
//!
//! let registry = fixtures::registry();
//! let config = fixtures::transfer_config(tmp.path());
//! // Build a SyncDriver with Arc::new(runner.clone())...
//! ```

mod mock_command_runner;

pub use mock_command_runner::{MockCommandRunner, MockResponse, RecordedCommand};

/// Test fixtures and helper functions.
pub mod fixtures {
    use std::path::Path;

    use crate::storage::{StorageElement, StorageRegistry};
    use crate::sync::FileEntry;
    use crate::transfer::TransferConfig;

    /// Tape-backed SE requiring a space token.
    pub const RAL: &str = "srm-t2k.gridpp.rl.ac.uk";
    /// Disk SE without space token.
    pub const TRIUMF: &str = "t2ksrm.nd280.org";
    /// SE whose outbound link never waits for capacity.
    pub const KEK: &str = "kek-se01.cc.kek.jp";

    pub const FTS_SERVICE: &str = "https://fts3.example.org:8446";

    /// Catalogue directory used by [`file_entry`].
    pub const DIRECTORY: &str = "lfn:/grid/t2k.org/nd280/raw";

    /// The three test storage elements.
    pub fn storage_elements() -> Vec<StorageElement> {
        vec![
            StorageElement::new(
                RAL,
                "srm://srm-t2k.gridpp.rl.ac.uk/castor/ads.rl.ac.uk/prod/t2k.org/nd280",
                "RALLCG2",
                true,
            ),
            StorageElement::new(TRIUMF, "srm://t2ksrm.nd280.org/nd280data", "TRIUMF", false),
            StorageElement::new(KEK, "srm://kek-se01.cc.kek.jp/t2k.org/nd280", "KEK", false),
        ]
    }

    /// Registry over [`storage_elements`].
    pub fn registry() -> StorageRegistry {
        StorageRegistry::new(storage_elements()).expect("fixture registry is valid")
    }

    /// Transfer config writing batches under `directory`.
    pub fn transfer_config(directory: impl AsRef<Path>) -> TransferConfig {
        TransferConfig::new(FTS_SERVICE).with_directory(directory.as_ref())
    }

    /// A file in [`DIRECTORY`] with a replica on each of `on`.
    pub fn file_entry(name: &str, on: &[&str]) -> FileEntry {
        let registry = registry();
        let relative_path = format!("raw/{}", name);
        FileEntry {
            name: name.to_string(),
            size_bytes: 1024 * 1024 * 500, // 500 MB
            lfn: format!("{}/{}", DIRECTORY, name),
            replicas: on
                .iter()
                .filter_map(|key| registry.lookup(key))
                .map(|se| se.surl_for(&relative_path))
                .collect(),
            relative_path,
        }
    }

    /// One six-line `glite-transfer-status -l` stanza.
    pub fn status_stanza(source: &str, destination: &str, state: &str) -> Vec<String> {
        vec![
            format!("  Source:      {}", source),
            format!("  Destination: {}", destination),
            format!("  State:       {}", state),
            "  Retries:     0".to_string(),
            "  Reason:      (null)".to_string(),
            "  Duration:    0".to_string(),
        ]
    }
}
