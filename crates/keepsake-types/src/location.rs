use std::fmt;
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};

use crate::chunk::{self, ASSETS_CHUNK, PREFABS_CHUNK};

/// Address of one record: a chunk id and an object id within that chunk.
///
/// The chunk id is optional; a missing chunk id means [`DEFAULT_CHUNK`](crate::DEFAULT_CHUNK).
/// Equality and hashing are defined on the resolved chunk id, so
/// `Location::new(None, "a") == Location::new(Some("default"), "a")`.
///
/// Both parts are opaque strings. Locations are computed by external tooling
/// and handed to the store as-is.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Location {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    chunk_id: Option<String>,
    object_id: String,
}

impl Location {
    /// Create a location from an optional chunk id and an object id.
    pub fn new(chunk_id: Option<impl Into<String>>, object_id: impl Into<String>) -> Self {
        Self {
            chunk_id: chunk_id.map(Into::into),
            object_id: object_id.into(),
        }
    }

    /// A location inside a named chunk.
    pub fn in_chunk(chunk_id: impl Into<String>, object_id: impl Into<String>) -> Self {
        Self {
            chunk_id: Some(chunk_id.into()),
            object_id: object_id.into(),
        }
    }

    /// A location in the default chunk.
    pub fn in_default_chunk(object_id: impl Into<String>) -> Self {
        Self {
            chunk_id: None,
            object_id: object_id.into(),
        }
    }

    /// A location for asset-owned state, keyed by the asset's id.
    pub fn for_asset(asset_id: impl Into<String>) -> Self {
        Self::in_chunk(ASSETS_CHUNK, asset_id)
    }

    /// A location shared by every instance of a prefab.
    pub fn for_prefab(prefab_id: impl Into<String>) -> Self {
        Self::in_chunk(PREFABS_CHUNK, prefab_id)
    }

    /// The chunk id as supplied, without default substitution.
    pub fn raw_chunk_id(&self) -> Option<&str> {
        self.chunk_id.as_deref()
    }

    /// The chunk id with [`DEFAULT_CHUNK`](crate::DEFAULT_CHUNK) substituted when absent.
    pub fn chunk_id(&self) -> &str {
        chunk::resolve(self.chunk_id.as_deref())
    }

    /// The object id within the chunk.
    pub fn object_id(&self) -> &str {
        &self.object_id
    }

    /// Returns `true` if the chunk id is the unassigned-identity sentinel.
    pub fn is_unassigned(&self) -> bool {
        chunk::is_unassigned(self.chunk_id())
    }
}

impl PartialEq for Location {
    fn eq(&self, other: &Self) -> bool {
        self.chunk_id() == other.chunk_id() && self.object_id == other.object_id
    }
}

impl Eq for Location {}

impl Hash for Location {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.chunk_id().hash(state);
        self.object_id.hash(state);
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.chunk_id(), self.object_id)
    }
}
