//! The [`PersistenceBackend`] trait.

use async_trait::async_trait;
use keepsake_store::ChunkedStore;

use crate::error::BackendResult;

/// Storage contract for one save slot.
///
/// Every method is independently awaitable. Implementations must be
/// `Send + Sync` so a controller can hand them to spawned tasks, and they
/// should serialize their own I/O internally; the controller's lock does not
/// protect the backend.
#[async_trait]
pub trait PersistenceBackend: Send + Sync {
    /// Whether the slot has persisted data.
    async fn exists(&self) -> BackendResult<bool>;

    /// Human-readable slot name, for diagnostics and tooling.
    async fn name(&self) -> BackendResult<String>;

    /// Load the persisted snapshot.
    ///
    /// Returns an empty store, not an error, when nothing is persisted.
    async fn load(&self) -> BackendResult<ChunkedStore>;

    /// Persist a snapshot, replacing whatever was stored before.
    async fn save(&self, store: &ChunkedStore) -> BackendResult<()>;

    /// Materialize a fresh store for a new slot.
    ///
    /// Must not touch persistent storage; the result reaches storage through
    /// a later [`save`](Self::save).
    async fn create(&self) -> BackendResult<ChunkedStore>;

    /// Remove the persisted data. Deleting a missing slot succeeds.
    async fn delete(&self) -> BackendResult<()>;
}
