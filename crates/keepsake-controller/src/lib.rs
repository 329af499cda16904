//! Save controller for Keepsake.
//!
//! A [`SaveController`] owns one save slot: the active
//! [`ChunkedStore`], the [`PersistenceBackend`] behind it, and the lock that
//! admits one load/save/create/delete at a time. Participants registered in
//! an [`ObserverRegistry`] are told when data has been loaded and when it is
//! about to be saved, and read or write their own [`Location`]s through the
//! controller.
//!
//! # Ordering
//!
//! - `load`: backend fetch, then controller hook, then participants.
//! - `save`: participants, then controller hook, then backend persist.
//! - [`LifecycleEvent::Saving`] fires right after the lock is taken,
//!   [`LifecycleEvent::Saved`] right after it is released.
//!
//! # Modules
//!
//! - [`controller`] -- [`SaveController`] and its builder
//! - [`observer`] -- [`Participant`], [`ObserverRegistry`], scoped [`Registration`]s
//! - [`events`] -- `Saving`/`Saved` callbacks
//! - [`hooks`] -- Controller-level [`ControllerHooks`]
//! - [`live`] -- [`LiveControllers`], a weak registry for tooling
//! - [`config`] -- [`ControllerConfig`]
//! - [`error`] -- Error types

pub mod config;
pub mod controller;
pub mod error;
pub mod events;
pub mod hooks;
pub mod live;
pub mod observer;

pub use config::{BroadcastPolicy, ControllerConfig};
pub use controller::{ControllerState, SaveController, SaveControllerBuilder};
pub use error::{ControllerError, ControllerResult, ParticipantError, ParticipantResult};
pub use events::{LifecycleEvent, LifecycleEvents, Operation, SubscriptionId};
pub use hooks::{ControllerHooks, NoOpHooks};
pub use live::LiveControllers;
pub use observer::{BroadcastReport, ObserverRegistry, Participant, Registration};

// Re-export the types every caller needs alongside the controller.
pub use keepsake_backend::{
    BackendError, FileBackend, FileBackendConfig, InMemoryBackend, NullBackend,
    PersistenceBackend,
};
pub use keepsake_store::{ChunkedStore, StoreError};
pub use keepsake_types::{Location, SaveMode};
