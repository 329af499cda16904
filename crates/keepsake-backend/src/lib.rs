//! Persistence backends for Keepsake.
//!
//! A backend moves whole [`ChunkedStore`](keepsake_store::ChunkedStore)
//! snapshots between memory and some persistent medium. The save controller
//! only ever talks to the [`PersistenceBackend`] trait, so backends are
//! interchangeable.
//!
//! # Backends
//!
//! - [`NullBackend`] -- persists nothing; useful before a real slot is chosen
//! - [`InMemoryBackend`] -- keeps one snapshot in memory; shareable between controllers
//! - [`FileBackend`] -- one binary save file per slot (see [`format`])
//!
//! # Modules
//!
//! - [`error`] -- Error types for backend operations
//! - [`traits`] -- The [`PersistenceBackend`] contract
//! - [`format`] -- Binary save-file encoding
//! - [`config`] -- [`FileBackendConfig`]

pub mod config;
pub mod error;
pub mod file;
pub mod format;
pub mod memory;
pub mod null;
pub mod traits;

pub use config::FileBackendConfig;
pub use error::{BackendError, BackendResult};
pub use file::{discover_saves, FileBackend};
pub use memory::InMemoryBackend;
pub use null::NullBackend;
pub use traits::PersistenceBackend;
