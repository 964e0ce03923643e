//! State persistence
//!
//! A `StateStore` loads the state once at the start of a run and saves the
//! full snapshot at every checkpoint.

use super::types::SyncState;
use crate::error::{Error, Result};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

/// Where sync state lives between runs
#[async_trait]
pub trait StateStore: Send + Sync + std::fmt::Debug {
    /// Load the last saved state; a store that was never written is empty
    async fn load(&self) -> Result<SyncState>;

    /// Durably replace the saved state
    async fn save(&self, state: &SyncState) -> Result<()>;
}

// ============================================================================
// File Store
// ============================================================================

/// JSON state file, rewritten atomically on every save
#[derive(Debug, Clone)]
pub struct FileStateStore {
    path: PathBuf,
}

impl FileStateStore {
    /// Create a store backed by a file path
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    /// Get the state file path
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "state.json".into());
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

#[async_trait]
impl StateStore for FileStateStore {
    async fn load(&self) -> Result<SyncState> {
        if !self.path.exists() {
            debug!(path = %self.path.display(), "No state file, starting fresh");
            return Ok(SyncState::new());
        }

        let contents = tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|e| Error::state(format!("Failed to read state file: {e}")))?;
        SyncState::from_json(&contents)
    }

    async fn save(&self, state: &SyncState) -> Result<()> {
        let contents = serde_json::to_string_pretty(state)
            .map_err(|e| Error::state(format!("Failed to serialize state: {e}")))?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                Error::checkpoint(format!("Failed to create state directory: {e}"))
            })?;
        }

        // Write to temp file first, then rename for atomicity
        let temp_path = self.temp_path();
        tokio::fs::write(&temp_path, &contents)
            .await
            .map_err(|e| Error::checkpoint(format!("Failed to write state file: {e}")))?;
        tokio::fs::rename(&temp_path, &self.path)
            .await
            .map_err(|e| Error::checkpoint(format!("Failed to rename state file: {e}")))?;

        debug!(path = %self.path.display(), "State saved");
        Ok(())
    }
}

// ============================================================================
// Memory Store
// ============================================================================

/// In-memory store; clones share the same state
#[derive(Debug, Clone, Default)]
pub struct MemoryStateStore {
    state: Arc<RwLock<SyncState>>,
    saves: Arc<AtomicUsize>,
}

impl MemoryStateStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store holding an initial state
    pub fn with_state(state: SyncState) -> Self {
        Self {
            state: Arc::new(RwLock::new(state)),
            saves: Arc::default(),
        }
    }

    /// The last saved state
    pub async fn snapshot(&self) -> SyncState {
        self.state.read().await.clone()
    }

    /// Number of saves so far
    pub fn save_count(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl StateStore for MemoryStateStore {
    async fn load(&self) -> Result<SyncState> {
        Ok(self.snapshot().await)
    }

    async fn save(&self, state: &SyncState) -> Result<()> {
        *self.state.write().await = state.clone();
        self.saves.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
