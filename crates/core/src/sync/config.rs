//! Configuration for directory syncs.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// How missing replicas are created.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransferMode {
    /// Queue pairs for bulk submission through the transfer service.
    #[default]
    Batched,
    /// Replicate each file immediately with `lcg-rep`.
    Direct,
}

/// Directory sync settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    #[serde(default)]
    pub mode: TransferMode,

    /// Catalogue path that storage element roots mirror.
    #[serde(default = "default_namespace_root")]
    pub namespace_root: String,

    /// SE keys whose files must be brought online before a transfer.
    #[serde(default)]
    pub staging_hosts: Vec<String>,

    #[serde(default = "default_staging_timeout")]
    pub staging_timeout_secs: u64,

    #[serde(default = "default_replicate_timeout")]
    pub replicate_timeout_secs: u64,

    /// Known-good file list used by the `GOODFILES` filter.
    #[serde(default)]
    pub known_good_list: Option<PathBuf>,
}

fn default_namespace_root() -> String {
    "lfn:/grid/t2k.org/nd280".to_string()
}

fn default_staging_timeout() -> u64 {
    7200 // 2 hours
}

fn default_replicate_timeout() -> u64 {
    600
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            mode: TransferMode::default(),
            namespace_root: default_namespace_root(),
            staging_hosts: Vec::new(),
            staging_timeout_secs: default_staging_timeout(),
            replicate_timeout_secs: default_replicate_timeout(),
            known_good_list: None,
        }
    }
}

impl SyncConfig {
    pub fn staging_timeout(&self) -> Duration {
        Duration::from_secs(self.staging_timeout_secs)
    }

    pub fn replicate_timeout(&self) -> Duration {
        Duration::from_secs(self.replicate_timeout_secs)
    }

    /// Whether files on `key` need staging before transfer.
    pub fn needs_staging(&self, key: &str) -> bool {
        self.staging_hosts.iter().any(|h| h == key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config: SyncConfig = toml::from_str("").unwrap();
        assert_eq!(config.mode, TransferMode::Batched);
        assert_eq!(config.namespace_root, "lfn:/grid/t2k.org/nd280");
        assert_eq!(config.staging_timeout(), Duration::from_secs(7200));
        assert_eq!(config.replicate_timeout(), Duration::from_secs(600));
        assert!(config.staging_hosts.is_empty());
    }

    #[test]
    fn test_direct_mode() {
        let config: SyncConfig = toml::from_str(
            r#"
            mode = "direct"
            staging_hosts = ["srm-t2k.gridpp.rl.ac.uk"]
            "#,
        )
        .unwrap();
        assert_eq!(config.mode, TransferMode::Direct);
        assert!(config.needs_staging("srm-t2k.gridpp.rl.ac.uk"));
        assert!(!config.needs_staging("t2ksrm.nd280.org"));
    }
}
