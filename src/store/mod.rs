//! Durable per-target state storage
//!
//! The scheduler is the only writer. Records of different targets are
//! independent; a `put` replaces one record as a whole or not at all.

pub mod file;

pub use file::JsonFileStore;

use std::collections::BTreeMap;

use crate::monitor::TargetState;

/// Trait for target state stores
pub trait StateStore: Send + Sync {
    /// State of a target, or the default record if the target was never seen
    fn get(&self, target_id: &str) -> Result<TargetState, StoreError>;

    /// Replace a target's record; durable once this returns `Ok`
    fn put(&self, target_id: &str, state: &TargetState) -> Result<(), StoreError>;

    /// All persisted records keyed by target id
    fn snapshot(&self) -> Result<BTreeMap<String, TargetState>, StoreError>;
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("IO error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Corrupted state file {path}: {reason}")]
    Corrupted { path: String, reason: String },
}
