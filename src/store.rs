use std::collections::HashMap;
use std::io::{Read, Write};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use anyhow::Context;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::service::BrowseError;
use crate::session::{BrowseState, ShareInfo};
use crate::tree::DirectoryNode;

/// The one key the session is stored under. Every write is a full-state
/// overwrite, so a crash mid-transition loses at most the last save.
const SNAPSHOT_KEY: &str = "browse-session";

/// Durable client-local key/value storage.
pub trait Storage: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError>;
    fn set(&self, key: &str, value: &[u8]) -> Result<(), StorageError>;
}

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("storage I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("no user data directory on this platform")]
    NoDataDir,
}

/// One file per key under a root directory.
pub struct FileStorage {
    root: PathBuf,
}

impl FileStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Storage rooted in the platform's per-user data directory.
    pub fn in_user_data() -> Result<Self, StorageError> {
        let root = dirs_next::data_dir()
            .ok_or(StorageError::NoDataDir)?
            .join("goombay");
        Ok(Self::new(root))
    }
}

impl Storage for FileStorage {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError> {
        match std::fs::read(self.root.join(key)) {
            Ok(value) => Ok(Some(value)),
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(error) => Err(error.into()),
        }
    }

    fn set(&self, key: &str, value: &[u8]) -> Result<(), StorageError> {
        std::fs::create_dir_all(&self.root)?;
        std::fs::write(self.root.join(key), value)?;
        Ok(())
    }
}

/// Keeps values in memory only. Backs tests and ephemeral sessions.
#[derive(Default)]
pub struct MemoryStorage {
    entries: Mutex<HashMap<String, Vec<u8>>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Storage for MemoryStorage {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError> {
        Ok(self
            .entries
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .get(key)
            .cloned())
    }

    fn set(&self, key: &str, value: &[u8]) -> Result<(), StorageError> {
        self.entries
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .insert(key.to_owned(), value.to_vec());
        Ok(())
    }
}

/// The observable session fields, exactly as a host sees them. Nothing
/// derived or renderer-owned goes in here.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub username: String,
    pub browse_state: BrowseState,
    pub browse_status: f64,
    pub browse_error: Option<BrowseError>,
    pub tree: Vec<DirectoryNode>,
    pub separator: Option<char>,
    pub selected_directory: Option<DirectoryNode>,
    pub info: ShareInfo,
}

/// Serializes, compresses and stores session snapshots.
///
/// Saves run on the blocking pool so the event path never waits on
/// compression or disk; failures are logged and swallowed. Loading falls
/// back to the initial empty session whenever the stored value is absent
/// or unreadable.
#[derive(Clone)]
pub struct SnapshotStore {
    storage: Arc<dyn Storage>,
}

impl SnapshotStore {
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self { storage }
    }

    /// Read the stored session, or the initial empty one if there is no
    /// usable snapshot.
    pub fn load(&self) -> SessionSnapshot {
        match Self::read(self.storage.as_ref()) {
            Ok(Some(snapshot)) => snapshot,
            Ok(None) => SessionSnapshot::default(),
            Err(error) => {
                tracing::warn!("discarding stored browse session: {error:#}");
                SessionSnapshot::default()
            }
        }
    }

    /// Schedule a write of the given snapshot. Returns the task handle so
    /// callers that need the write to have landed can await it; the
    /// session just drops it.
    pub fn save(&self, snapshot: SessionSnapshot) -> tokio::task::JoinHandle<()> {
        let storage = Arc::clone(&self.storage);
        tokio::task::spawn_blocking(move || {
            if let Err(error) = Self::write(storage.as_ref(), &snapshot) {
                tracing::warn!("failed to persist browse session: {error:#}");
            }
        })
    }

    fn write(storage: &dyn Storage, snapshot: &SessionSnapshot) -> anyhow::Result<()> {
        let json = serde_json::to_vec(snapshot).context("serializing session")?;
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(&json).context("compressing session")?;
        let compressed = encoder.finish().context("compressing session")?;
        storage
            .set(SNAPSHOT_KEY, &compressed)
            .context("writing snapshot")?;
        Ok(())
    }

    fn read(storage: &dyn Storage) -> anyhow::Result<Option<SessionSnapshot>> {
        let Some(compressed) = storage.get(SNAPSHOT_KEY).context("reading snapshot")? else {
            return Ok(None);
        };
        let mut json = Vec::new();
        GzDecoder::new(compressed.as_slice())
            .read_to_end(&mut json)
            .context("decompressing session")?;
        let snapshot = serde_json::from_slice(&json).context("deserializing session")?;
        Ok(Some(snapshot))
    }
}
