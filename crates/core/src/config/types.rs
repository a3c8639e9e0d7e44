use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::command::CommandConfig;
use crate::storage::{StorageElement, StorageError, StorageRegistry};
use crate::sync::SyncConfig;
use crate::transfer::{QuotaConfig, TransferConfig};

/// Root configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    pub transfer: TransferConfig,
    #[serde(default)]
    pub quota: QuotaConfig,
    #[serde(default)]
    pub commands: CommandConfig,
    #[serde(default)]
    pub sync: SyncConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
    /// Known storage elements, one `[[storage_element]]` table each.
    #[serde(default, rename = "storage_element")]
    pub storage_elements: Vec<StorageElement>,
}

impl Config {
    /// Builds the storage registry from the configured elements.
    pub fn registry(&self) -> Result<StorageRegistry, StorageError> {
        StorageRegistry::new(self.storage_elements.iter().cloned())
    }
}

/// Metrics export configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct MetricsConfig {
    /// Prometheus text file written at the end of a run.
    #[serde(default)]
    pub textfile: Option<PathBuf>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sync::TransferMode;

    #[test]
    fn test_minimal_config() {
        let toml = r#"
[transfer]
fts_service = "https://fts3.cern.ch:8446"
"#;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.transfer.batch_size, 200);
        assert_eq!(config.quota.max_active_per_channel, 600);
        assert_eq!(config.commands.max_attempts, 3);
        assert_eq!(config.sync.mode, TransferMode::Batched);
        assert!(config.metrics.textfile.is_none());
        assert!(config.storage_elements.is_empty());
    }

    #[test]
    fn test_storage_elements_build_registry() {
        let toml = r#"
[transfer]
fts_service = "https://fts3.cern.ch:8446"

[[storage_element]]
key = "srm-t2k.gridpp.rl.ac.uk"
root = "srm://srm-t2k.gridpp.rl.ac.uk/castor/ads.rl.ac.uk/prod/t2k.org/nd280"
channel = "RALLCG2"
space_token = true

[[storage_element]]
key = "t2ksrm.nd280.org"
root = "srm://t2ksrm.nd280.org/nd280data"
channel = "TRIUMF"
"#;
        let config: Config = toml::from_str(toml).unwrap();
        let registry = config.registry().unwrap();
        assert_eq!(registry.len(), 2);
        assert!(registry.lookup("srm-t2k.gridpp.rl.ac.uk").unwrap().space_token);
        assert!(!registry.lookup("t2ksrm.nd280.org").unwrap().space_token);
    }
}
