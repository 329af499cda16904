//! Chunked in-memory record store for Keepsake.
//!
//! A [`ChunkedStore`] maps chunk ids to [`Chunk`]s, and each chunk maps object
//! ids to opaque string payloads. Typed values go in and out through a
//! [`Codec`]; the store itself never interprets payloads.
//!
//! # Design Rules
//!
//! 1. Absence is not an error: reading a missing record yields the type's
//!    default (or `false` for in-place reads).
//! 2. A present payload that fails to decode is always reported.
//! 3. Chunks are created on first access and never disappear on their own.
//! 4. Writes addressed to the unassigned chunk are dropped with a warning.

pub mod codec;
pub mod error;
pub mod store;

pub use codec::{BincodeHexCodec, Codec, JsonCodec};
pub use error::{CodecError, StoreError, StoreResult};
pub use store::{Chunk, ChunkedStore};
