//! Typed lookup over the configured storage elements.

use std::collections::BTreeMap;
use thiserror::Error;
use url::Url;

use super::types::StorageElement;

/// Errors raised while building the registry.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("storage element key is empty")]
    EmptyKey,

    #[error("duplicate storage element: {key}")]
    Duplicate { key: String },

    #[error("storage element {key} has invalid root {root}: expected srm://{key}/...")]
    InvalidRoot { key: String, root: String },
}

/// SE key (host) of an `srm://` URL, or `None` if it is not one.
pub fn storage_key(surl: &str) -> Option<String> {
    let url = Url::parse(surl).ok()?;
    if url.scheme() != "srm" {
        return None;
    }
    url.host_str()
        .filter(|h| !h.is_empty())
        .map(|h| h.to_ascii_lowercase())
}

/// Immutable registry of storage elements keyed by host.
#[derive(Debug, Clone, Default)]
pub struct StorageRegistry {
    elements: BTreeMap<String, StorageElement>,
}

impl StorageRegistry {
    /// Builds and validates a registry.
    pub fn new(elements: impl IntoIterator<Item = StorageElement>) -> Result<Self, StorageError> {
        let mut map = BTreeMap::new();
        for element in elements {
            if element.key.trim().is_empty() {
                return Err(StorageError::EmptyKey);
            }
            let key = element.key.to_ascii_lowercase();
            if storage_key(&element.root).as_deref() != Some(key.as_str()) {
                return Err(StorageError::InvalidRoot {
                    key: element.key.clone(),
                    root: element.root.clone(),
                });
            }
            if map.insert(key.clone(), element).is_some() {
                return Err(StorageError::Duplicate { key });
            }
        }
        Ok(Self { elements: map })
    }

    /// Element registered under `key`.
    pub fn lookup(&self, key: &str) -> Option<&StorageElement> {
        self.elements.get(&key.to_ascii_lowercase())
    }

    pub fn contains(&self, key: &str) -> bool {
        self.lookup(key).is_some()
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }
}
