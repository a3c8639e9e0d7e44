//! Storage element types.

use serde::{Deserialize, Serialize};

/// A remote storage endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageElement {
    /// Unique key, the SE host name (e.g. `srm-t2k.gridpp.rl.ac.uk`).
    pub key: String,
    /// SRM root under which the experiment namespace lives.
    pub root: String,
    /// Transfer-service channel name.
    pub channel: String,
    /// Whether writes must carry the space-token reservation.
    #[serde(default)]
    pub space_token: bool,
}

impl StorageElement {
    pub fn new(
        key: impl Into<String>,
        root: impl Into<String>,
        channel: impl Into<String>,
        space_token: bool,
    ) -> Self {
        Self {
            key: key.into(),
            root: root.into(),
            channel: channel.into(),
            space_token,
        }
    }

    /// SURL of a namespace-relative path on this element.
    pub fn surl_for(&self, relative_path: &str) -> String {
        format!(
            "{}/{}",
            self.root.trim_end_matches('/'),
            relative_path.trim_start_matches('/')
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_surl_for_joins_with_single_slash() {
        let se = StorageElement::new(
            "t2ksrm.nd280.org",
            "srm://t2ksrm.nd280.org/nd280data/",
            "TRIUMF",
            false,
        );
        assert_eq!(
            se.surl_for("/raw/ND280/run.daq"),
            "srm://t2ksrm.nd280.org/nd280data/raw/ND280/run.daq"
        );
        assert_eq!(
            se.surl_for("raw/x"),
            "srm://t2ksrm.nd280.org/nd280data/raw/x"
        );
    }

    #[test]
    fn test_deserialize_defaults_space_token() {
        let se: StorageElement = toml::from_str(
            r#"
key = "se03.esc.qmul.ac.uk"
root = "srm://se03.esc.qmul.ac.uk/t2k.org/nd280"
channel = "QMUL"
"#,
        )
        .unwrap();
        assert!(!se.space_token);
    }
}
