//! In-memory backend for tests and ephemeral saves.
//!
//! [`InMemoryBackend`] keeps at most one persisted snapshot behind a
//! `RwLock`. Wrap it in an `Arc` to let several controllers share the same
//! "persistent" slot.

use std::sync::RwLock;

use async_trait::async_trait;
use keepsake_store::ChunkedStore;
use tracing::debug;

use crate::error::BackendResult;
use crate::traits::PersistenceBackend;

/// An in-memory implementation of [`PersistenceBackend`].
///
/// Data is lost when the backend is dropped.
#[derive(Debug)]
pub struct InMemoryBackend {
    name: String,
    persisted: RwLock<Option<ChunkedStore>>,
}

impl InMemoryBackend {
    /// Create an empty backend with the given display name.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            persisted: RwLock::new(None),
        }
    }

    /// Create a backend that already holds a persisted snapshot.
    pub fn with_snapshot(name: impl Into<String>, snapshot: ChunkedStore) -> Self {
        Self {
            name: name.into(),
            persisted: RwLock::new(Some(snapshot)),
        }
    }

    /// A copy of the persisted snapshot, if any.
    pub fn snapshot(&self) -> Option<ChunkedStore> {
        self.persisted.read().expect("lock poisoned").clone()
    }
}

impl Default for InMemoryBackend {
    fn default() -> Self {
        Self::new("Memory Save")
    }
}

#[async_trait]
impl PersistenceBackend for InMemoryBackend {
    async fn exists(&self) -> BackendResult<bool> {
        Ok(self.persisted.read().expect("lock poisoned").is_some())
    }

    async fn name(&self) -> BackendResult<String> {
        Ok(self.name.clone())
    }

    async fn load(&self) -> BackendResult<ChunkedStore> {
        Ok(self.snapshot().unwrap_or_default())
    }

    async fn save(&self, store: &ChunkedStore) -> BackendResult<()> {
        debug!(save = %self.name, chunks = store.len(), "snapshot persisted in memory");
        *self.persisted.write().expect("lock poisoned") = Some(store.clone());
        Ok(())
    }

    async fn create(&self) -> BackendResult<ChunkedStore> {
        Ok(ChunkedStore::new())
    }

    async fn delete(&self) -> BackendResult<()> {
        self.persisted.write().expect("lock poisoned").take();
        Ok(())
    }
}
