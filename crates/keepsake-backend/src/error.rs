//! Error types for backend operations.

use std::io;

use thiserror::Error;

/// Errors produced by persistence backends.
#[derive(Debug, Error)]
pub enum BackendError {
    /// I/O error from the underlying medium.
    #[error("io error: {0}")]
    Io(#[from] io::Error),

    /// A save file is truncated or otherwise does not follow the format.
    #[error("malformed save data at byte {offset}: {reason}")]
    Format { offset: usize, reason: String },

    /// A slot name that cannot be mapped to storage.
    #[error("invalid slot name {name:?}: {reason}")]
    InvalidName { name: String, reason: String },

    /// Backend configuration could not be read.
    #[error("config error: {0}")]
    Config(String),
}

/// Convenience type alias for backend operations.
pub type BackendResult<T> = std::result::Result<T, BackendError>;
