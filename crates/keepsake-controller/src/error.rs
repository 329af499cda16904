//! Error types for controller operations.

use keepsake_backend::BackendError;
use keepsake_store::StoreError;
use thiserror::Error;

/// Error returned by a participant or controller hook.
#[derive(Debug, Error)]
pub enum ParticipantError {
    /// A store read or write failed, typically a malformed payload.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Any other participant-specific failure.
    #[error("{0}")]
    Failed(String),
}

/// Result alias for participant callbacks and hooks.
pub type ParticipantResult = Result<(), ParticipantError>;

/// Errors from [`SaveController`](crate::SaveController) operations.
#[derive(Debug, Error)]
pub enum ControllerError {
    /// The persistence backend failed. Nothing is retried.
    #[error("backend error: {0}")]
    Backend(#[from] BackendError),

    /// A participant failed and the broadcast was aborted.
    #[error("participant {participant} failed: {source}")]
    Participant {
        participant: String,
        #[source]
        source: ParticipantError,
    },

    /// A controller hook failed.
    #[error("hook {hook} failed: {source}")]
    Hook {
        hook: &'static str,
        #[source]
        source: ParticipantError,
    },

    /// A spawned backend task panicked or was cancelled by the runtime.
    #[error("backend task aborted during {0}")]
    TaskAborted(String),

    /// Controller configuration could not be parsed.
    #[error("config error: {0}")]
    Config(String),
}

/// Convenience type alias for controller operations.
pub type ControllerResult<T> = std::result::Result<T, ControllerError>;
