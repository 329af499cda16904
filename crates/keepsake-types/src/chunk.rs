//! Well-known chunk identifiers.
//!
//! Chunk ids are opaque strings. The ones below are reserved by convention:
//! tooling that derives locations places records into them.

/// Chunk used when a [`Location`](crate::Location) carries no chunk id.
pub const DEFAULT_CHUNK: &str = "default";

/// Chunk for state owned by shared assets (one record per asset).
pub const ASSETS_CHUNK: &str = "assets";

/// Chunk for state shared by every instance of a prefab.
pub const PREFABS_CHUNK: &str = "prefabs";

/// The all-zero identity produced when an owner has not been assigned an id yet.
///
/// Writes addressed to this chunk are rejected by the store.
pub const UNASSIGNED_CHUNK: &str = "00000000000000000000000000000000";

/// Returns `true` if `chunk_id` is the unassigned-identity sentinel.
pub fn is_unassigned(chunk_id: &str) -> bool {
    chunk_id == UNASSIGNED_CHUNK
}

/// Substitute [`DEFAULT_CHUNK`] for a missing chunk id.
pub fn resolve(chunk_id: Option<&str>) -> &str {
    chunk_id.unwrap_or(DEFAULT_CHUNK)
}
