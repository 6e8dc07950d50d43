//! Snapshot store contract for environment state checkpoints.
//!
//! A snapshot is a named, restorable checkpoint of environment state
//! produced by a setup-style test case. The actual state backend (a
//! hypervisor, a lab controller, a container fleet) lives outside this
//! crate; rigor only depends on the contract:
//!
//! - `exists(name)` - does a checkpoint with this name exist?
//! - `restore(name)` - bring the environment back to the checkpoint
//! - `save(name, state)` - record the current environment under a name
//!
//! # Invariants
//!
//! - Snapshot names have at most one producing case per suite
//! - `restore` of a name that was never saved is an error, not a no-op
//! - `save` is idempotent: re-saving a name replaces the checkpoint

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::RwLock;

/// Errors from snapshot store operations.
#[derive(Debug, Error)]
pub enum SnapshotError {
    /// No snapshot with the requested name exists.
    #[error("snapshot not found: {0}")]
    NotFound(String),

    /// The snapshot name is not acceptable to the store.
    #[error("invalid snapshot name: {0}")]
    InvalidName(String),

    /// The backend failed to persist or load state.
    #[error("snapshot backend error: {0}")]
    Backend(String),
}

impl SnapshotError {
    /// Returns true if this error means the snapshot does not exist.
    pub fn is_not_found(&self) -> bool {
        matches!(self, SnapshotError::NotFound(_))
    }
}

/// Opaque environment state carried between test cases.
///
/// Case bodies read and write keys to describe what the environment
/// looks like (deployed cluster ids, node rosters, network layout).
/// The scheduler never interprets the contents.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvState {
    values: BTreeMap<String, serde_json::Value>,
}

impl EnvState {
    /// Create an empty environment state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Get a value by key.
    pub fn get(&self, key: &str) -> Option<&serde_json::Value> {
        self.values.get(key)
    }

    /// Set a value, replacing any previous value for the key.
    pub fn set(&mut self, key: impl Into<String>, value: serde_json::Value) {
        self.values.insert(key.into(), value);
    }

    /// Remove a value by key.
    pub fn remove(&mut self, key: &str) -> Option<serde_json::Value> {
        self.values.remove(key)
    }

    /// Returns true if no values are set.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Number of values set.
    pub fn len(&self) -> usize {
        self.values.len()
    }
}

/// A stored checkpoint: name, capture time, and the captured state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    /// Snapshot name (unique within the store).
    pub name: String,

    /// When the checkpoint was captured.
    pub created_at: DateTime<Utc>,

    /// The captured environment state.
    pub state: EnvState,
}

/// Contract implemented by environment state backends.
#[async_trait]
pub trait SnapshotStore: Send + Sync {
    /// Check whether a snapshot with this name exists.
    async fn exists(&self, name: &str) -> Result<bool, SnapshotError>;

    /// Restore the environment to the named checkpoint.
    async fn restore(&self, name: &str) -> Result<EnvState, SnapshotError>;

    /// Save the given state under a name, replacing any previous checkpoint.
    async fn save(&self, name: &str, state: EnvState) -> Result<(), SnapshotError>;
}

fn validate_name(name: &str) -> Result<(), SnapshotError> {
    if name.is_empty() {
        return Err(SnapshotError::InvalidName("empty name".to_string()));
    }
    if name.chars().any(char::is_whitespace) {
        return Err(SnapshotError::InvalidName(format!(
            "whitespace in name: {name:?}"
        )));
    }
    Ok(())
}

/// In-memory snapshot store.
///
/// Reference backend for local runs and tests. Real deployments plug in
/// a backend that talks to the hypervisor or lab controller.
#[derive(Default)]
pub struct MemoryStore {
    snapshots: RwLock<BTreeMap<String, Snapshot>>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Names of all stored snapshots, sorted.
    pub async fn names(&self) -> Vec<String> {
        self.snapshots.read().await.keys().cloned().collect()
    }

    /// Number of stored snapshots.
    pub async fn len(&self) -> usize {
        self.snapshots.read().await.len()
    }

    /// Returns true if the store holds no snapshots.
    pub async fn is_empty(&self) -> bool {
        self.snapshots.read().await.is_empty()
    }
}

#[async_trait]
impl SnapshotStore for MemoryStore {
    async fn exists(&self, name: &str) -> Result<bool, SnapshotError> {
        validate_name(name)?;
        Ok(self.snapshots.read().await.contains_key(name))
    }

    async fn restore(&self, name: &str) -> Result<EnvState, SnapshotError> {
        validate_name(name)?;
        let snapshots = self.snapshots.read().await;
        snapshots
            .get(name)
            .map(|s| s.state.clone())
            .ok_or_else(|| SnapshotError::NotFound(name.to_string()))
    }

    async fn save(&self, name: &str, state: EnvState) -> Result<(), SnapshotError> {
        validate_name(name)?;
        let snapshot = Snapshot {
            name: name.to_string(),
            created_at: Utc::now(),
            state,
        };
        self.snapshots
            .write()
            .await
            .insert(name.to_string(), snapshot);
        Ok(())
    }
}
