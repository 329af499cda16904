use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::{debug, info};
use walkdir::WalkDir;

use keepsake_store::ChunkedStore;

use crate::config::FileBackendConfig;
use crate::error::{BackendError, BackendResult};
use crate::format;
use crate::traits::PersistenceBackend;

/// One save slot stored as a single binary file (see [`format`]).
///
/// All file operations are serialized through an internal lock that is
/// independent of any controller lock. The save directory is created on the
/// first [`save`](PersistenceBackend::save). Writes go to a sibling temp file
/// that is then renamed over the save file.
#[derive(Debug)]
pub struct FileBackend {
    slot: String,
    dir: PathBuf,
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileBackend {
    /// Create a backend for `slot` under the configured save directory.
    pub fn new(config: &FileBackendConfig, slot: &str) -> BackendResult<Self> {
        validate_slot(slot)?;
        Ok(Self {
            slot: slot.to_string(),
            dir: config.save_dir(),
            path: config.path_for(slot),
            lock: Mutex::new(()),
        })
    }

    /// The slot name.
    pub fn slot(&self) -> &str {
        &self.slot
    }

    /// The save file path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self.path.file_name().unwrap_or_default().to_os_string();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

#[async_trait]
impl PersistenceBackend for FileBackend {
    async fn exists(&self) -> BackendResult<bool> {
        Ok(tokio::fs::try_exists(&self.path).await?)
    }

    async fn name(&self) -> BackendResult<String> {
        Ok(format!("File Save \"{}\"", self.slot))
    }

    async fn load(&self) -> BackendResult<ChunkedStore> {
        let _guard = self.lock.lock().await;
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!(slot = %self.slot, "no save file; loading empty store");
                return Ok(ChunkedStore::new());
            }
            Err(e) => return Err(e.into()),
        };
        let store = format::decode(&bytes)?;
        debug!(slot = %self.slot, bytes = bytes.len(), chunks = store.len(), "save file loaded");
        Ok(store)
    }

    async fn save(&self, store: &ChunkedStore) -> BackendResult<()> {
        let encoded = format::encode(store)?;
        let _guard = self.lock.lock().await;
        tokio::fs::create_dir_all(&self.dir).await?;
        let temp = self.temp_path();
        tokio::fs::write(&temp, &encoded).await?;
        tokio::fs::rename(&temp, &self.path).await?;
        info!(
            slot = %self.slot,
            path = %self.path.display(),
            bytes = encoded.len(),
            "save file written"
        );
        Ok(())
    }

    async fn create(&self) -> BackendResult<ChunkedStore> {
        Ok(ChunkedStore::new())
    }

    async fn delete(&self) -> BackendResult<()> {
        let _guard = self.lock.lock().await;
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => {
                info!(slot = %self.slot, "save file deleted");
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// List the slot names that have a save file under `config`, sorted.
///
/// A missing save directory yields an empty list.
pub fn discover_saves(config: &FileBackendConfig) -> BackendResult<Vec<String>> {
    let dir = config.save_dir();
    if !dir.is_dir() {
        return Ok(Vec::new());
    }
    let mut slots = Vec::new();
    for entry in WalkDir::new(&dir).min_depth(1).max_depth(1) {
        let entry = entry.map_err(|e| {
            e.into_io_error()
                .map(BackendError::Io)
                .unwrap_or_else(|| BackendError::Config("save directory loop".into()))
        })?;
        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) != Some(config.extension.as_str()) {
            continue;
        }
        if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
            slots.push(stem.to_string());
        }
    }
    slots.sort();
    Ok(slots)
}

fn validate_slot(slot: &str) -> BackendResult<()> {
    let invalid = |reason: &str| BackendError::InvalidName {
        name: slot.to_string(),
        reason: reason.to_string(),
    };
    if slot.is_empty() {
        return Err(invalid("empty"));
    }
    if slot == "." || slot == ".." {
        return Err(invalid("reserved path component"));
    }
    if slot.contains(['/', '\\', '\0']) {
        return Err(invalid("contains a path separator or NUL"));
    }
    Ok(())
}
