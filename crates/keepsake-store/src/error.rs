use keepsake_types::Location;

/// Failure inside a payload codec.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// JSON encoding or decoding failed.
    #[error("json: {0}")]
    Json(#[from] serde_json::Error),

    /// Binary encoding or decoding failed.
    #[error("bincode: {0}")]
    Bincode(#[from] bincode::Error),

    /// The payload is not valid hex.
    #[error("hex: {0}")]
    Hex(#[from] hex::FromHexError),
}

/// Errors from typed store operations.
///
/// A missing record is never an error; see [`ChunkedStore::read`](crate::ChunkedStore::read).
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The value could not be encoded into a payload.
    #[error("cannot encode value for {location}: {source}")]
    Encode {
        location: Location,
        #[source]
        source: CodecError,
    },

    /// A payload exists at the location but cannot be decoded.
    #[error("malformed payload at {location}: {source}")]
    Decode {
        location: Location,
        #[source]
        source: CodecError,
    },
}

impl StoreError {
    /// The location the failing operation addressed.
    pub fn location(&self) -> &Location {
        match self {
            Self::Encode { location, .. } | Self::Decode { location, .. } => location,
        }
    }
}

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
