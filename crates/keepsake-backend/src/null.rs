use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use keepsake_store::ChunkedStore;

use crate::error::BackendResult;
use crate::traits::PersistenceBackend;

/// A backend that persists nothing.
///
/// Tracks whether the slot was created so that the controller's
/// create/delete flow behaves normally, but every load yields an empty store.
#[derive(Debug, Default)]
pub struct NullBackend {
    exists: AtomicBool,
}

impl NullBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PersistenceBackend for NullBackend {
    async fn exists(&self) -> BackendResult<bool> {
        Ok(self.exists.load(Ordering::SeqCst))
    }

    async fn name(&self) -> BackendResult<String> {
        Ok("Dummy Save".into())
    }

    async fn load(&self) -> BackendResult<ChunkedStore> {
        Ok(ChunkedStore::new())
    }

    async fn save(&self, _store: &ChunkedStore) -> BackendResult<()> {
        Ok(())
    }

    async fn create(&self) -> BackendResult<ChunkedStore> {
        self.exists.store(true, Ordering::SeqCst);
        Ok(ChunkedStore::new())
    }

    async fn delete(&self) -> BackendResult<()> {
        self.exists.store(false, Ordering::SeqCst);
        Ok(())
    }
}
