//! Last-known-applied state
//!
//! Manages the `.stratus/state.json` file recording, per node id, the hash
//! and resolved properties of the spec that was last applied together with
//! the outputs the provider returned. Secret values are recorded in their
//! symbolic `secret(name)` form only.

use crate::error::{CloudError, Result};
use crate::provider::Outputs;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tokio::fs;

const STATE_VERSION: u32 = 1;
const STATE_DIR: &str = ".stratus";
const STATE_FILE: &str = "state.json";
const STATE_BACKUP: &str = "state.json.backup";
const LOCK_FILE: &str = "lock.json";

/// Everything applied in previous runs, keyed by node id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GlobalState {
    /// State file version
    pub version: u32,

    /// Last modified timestamp
    pub updated_at: DateTime<Utc>,

    /// Applied resources by node id
    pub resources: BTreeMap<String, ResourceRecord>,
}

impl Default for GlobalState {
    fn default() -> Self {
        Self {
            version: STATE_VERSION,
            updated_at: Utc::now(),
            resources: BTreeMap::new(),
        }
    }
}

impl GlobalState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn resource(&self, node_id: &str) -> Option<&ResourceRecord> {
        self.resources.get(node_id)
    }

    pub fn set_resource(&mut self, node_id: impl Into<String>, record: ResourceRecord) {
        self.resources.insert(node_id.into(), record);
        self.updated_at = Utc::now();
    }

    pub fn remove_resource(&mut self, node_id: &str) -> Option<ResourceRecord> {
        let removed = self.resources.remove(node_id);
        if removed.is_some() {
            self.updated_at = Utc::now();
        }
        removed
    }
}

/// Applied state of a single resource node.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceRecord {
    /// Resource type tag
    pub resource_type: String,

    /// Content hash of the resolved spec that was applied
    pub spec_hash: String,

    /// Resolved properties as applied (secrets symbolic)
    pub properties: Map<String, Value>,

    /// Outputs returned by the provider
    pub outputs: Outputs,

    /// When the resource was first created
    pub created_at: DateTime<Utc>,

    /// Last apply timestamp
    pub updated_at: DateTime<Utc>,
}

impl ResourceRecord {
    pub fn new(
        resource_type: impl Into<String>,
        spec_hash: impl Into<String>,
        properties: Map<String, Value>,
        outputs: Outputs,
    ) -> Self {
        let now = Utc::now();
        Self {
            resource_type: resource_type.into(),
            spec_hash: spec_hash.into(),
            properties,
            outputs,
            created_at: now,
            updated_at: now,
        }
    }

    /// Carry the original creation timestamp over an update.
    pub fn updated_from(mut self, prior: &ResourceRecord) -> Self {
        self.created_at = prior.created_at;
        self
    }
}

/// Reads and writes the state directory.
pub struct StateManager {
    project_root: PathBuf,
}

impl StateManager {
    pub fn new(project_root: impl AsRef<Path>) -> Self {
        Self {
            project_root: project_root.as_ref().to_path_buf(),
        }
    }

    fn state_dir(&self) -> PathBuf {
        self.project_root.join(STATE_DIR)
    }

    fn state_path(&self) -> PathBuf {
        self.state_dir().join(STATE_FILE)
    }

    fn backup_path(&self) -> PathBuf {
        self.state_dir().join(STATE_BACKUP)
    }

    fn lock_path(&self) -> PathBuf {
        self.state_dir().join(LOCK_FILE)
    }

    async fn ensure_state_dir(&self) -> Result<()> {
        let dir = self.state_dir();
        if !dir.exists() {
            fs::create_dir_all(&dir).await?;
            tracing::debug!("Created state directory: {}", dir.display());
        }
        Ok(())
    }

    /// Load the current state, or an empty one if none exists yet.
    pub async fn load(&self) -> Result<GlobalState> {
        let path = self.state_path();
        if !path.exists() {
            tracing::debug!("State file not found, returning empty state");
            return Ok(GlobalState::new());
        }

        let content = fs::read_to_string(&path).await?;
        let state: GlobalState = serde_json::from_str(&content)?;

        if state.version > STATE_VERSION {
            return Err(CloudError::StateError(format!(
                "State file version {} is newer than supported version {}",
                state.version, STATE_VERSION
            )));
        }

        tracing::debug!("Loaded state with {} resources", state.resources.len());
        Ok(state)
    }

    /// Save the state, keeping the previous file as a backup.
    pub async fn save(&self, state: &GlobalState) -> Result<()> {
        self.ensure_state_dir().await?;

        let path = self.state_path();
        let backup = self.backup_path();

        if path.exists() {
            if backup.exists() {
                fs::remove_file(&backup).await?;
            }
            fs::rename(&path, &backup).await?;
            tracing::debug!("Created state backup");
        }

        let content = serde_json::to_string_pretty(state)?;
        fs::write(&path, content).await?;

        tracing::debug!("Saved state with {} resources", state.resources.len());
        Ok(())
    }

    /// Acquire the run lock for exclusive access to the state.
    pub async fn acquire_lock(&self) -> Result<StateLock> {
        self.ensure_state_dir().await?;

        let lock_path = self.lock_path();

        if lock_path.exists() {
            let content = fs::read_to_string(&lock_path).await?;
            let lock_info: LockInfo = serde_json::from_str(&content)?;

            // Locks older than an hour are considered stale
            let age = Utc::now().signed_duration_since(lock_info.acquired_at);
            if age.num_hours() < 1 {
                return Err(CloudError::LockError(format!(
                    "State is locked by {} since {}",
                    lock_info.holder, lock_info.acquired_at
                )));
            }

            tracing::warn!("Removing stale lock from {}", lock_info.holder);
        }

        let lock_info = LockInfo {
            holder: std::env::var("HOSTNAME")
                .or_else(|_| std::env::var("HOST"))
                .unwrap_or_else(|_| "unknown".to_string()),
            acquired_at: Utc::now(),
        };

        let content = serde_json::to_string_pretty(&lock_info)?;
        fs::write(&lock_path, content).await?;

        tracing::debug!("Acquired state lock");
        Ok(StateLock {
            lock_path,
            released: false,
        })
    }
}

/// Lock information
#[derive(Debug, Serialize, Deserialize)]
struct LockInfo {
    holder: String,
    acquired_at: DateTime<Utc>,
}

/// RAII guard for the state lock
pub struct StateLock {
    lock_path: PathBuf,
    released: bool,
}

impl StateLock {
    pub async fn release(mut self) -> Result<()> {
        if !self.released {
            if self.lock_path.exists() {
                fs::remove_file(&self.lock_path).await?;
                tracing::debug!("Released state lock");
            }
            self.released = true;
        }
        Ok(())
    }
}

impl Drop for StateLock {
    fn drop(&mut self) {
        if !self.released && self.lock_path.exists() {
            // Synchronous cleanup in drop - not ideal but necessary
            let _ = std::fs::remove_file(&self.lock_path);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn record() -> ResourceRecord {
        let mut outputs = Outputs::new();
        outputs.insert("id".into(), serde_json::json!("net-0001"));
        ResourceRecord::new("network", "abc123", Map::new(), outputs)
    }

    #[tokio::test]
    async fn state_save_load_roundtrip() {
        let temp_dir = tempdir().unwrap();
        let manager = StateManager::new(temp_dir.path());

        let mut state = GlobalState::new();
        state.set_resource("vpc", record());

        manager.save(&state).await.unwrap();

        let loaded = manager.load().await.unwrap();
        assert_eq!(loaded.resources.len(), 1);
        assert_eq!(loaded.resource("vpc").unwrap().spec_hash, "abc123");
    }

    #[tokio::test]
    async fn empty_state_when_no_file() {
        let temp_dir = tempdir().unwrap();
        let manager = StateManager::new(temp_dir.path());

        let state = manager.load().await.unwrap();
        assert!(state.resources.is_empty());
    }

    #[tokio::test]
    async fn second_save_creates_backup() {
        let temp_dir = tempdir().unwrap();
        let manager = StateManager::new(temp_dir.path());

        let mut state = GlobalState::new();
        manager.save(&state).await.unwrap();
        state.set_resource("vpc", record());
        manager.save(&state).await.unwrap();

        assert!(temp_dir.path().join(".stratus/state.json.backup").exists());
    }

    #[tokio::test]
    async fn lock_blocks_second_acquire() {
        let temp_dir = tempdir().unwrap();
        let manager = StateManager::new(temp_dir.path());

        let lock = manager.acquire_lock().await.unwrap();
        assert!(matches!(
            manager.acquire_lock().await,
            Err(CloudError::LockError(_))
        ));
        lock.release().await.unwrap();
        let lock = manager.acquire_lock().await.unwrap();
        lock.release().await.unwrap();
    }
}
