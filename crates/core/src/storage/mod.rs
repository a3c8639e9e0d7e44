//! Storage element registry.
//!
//! Storage elements are loaded once from configuration, validated, and then
//! looked up by key (the SE host name) for the lifetime of the process.

mod registry;
mod types;

pub use registry::{storage_key, StorageError, StorageRegistry};
pub use types::StorageElement;
