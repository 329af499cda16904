use std::collections::BTreeMap;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{trace, warn};

use keepsake_types::chunk;
use keepsake_types::Location;

use crate::codec::{Codec, JsonCodec};
use crate::error::{StoreError, StoreResult};

/// One chunk: object id -> encoded payload.
///
/// Keys are kept sorted so that persisted output and diffs are deterministic.
pub type Chunk = BTreeMap<String, String>;

/// In-memory save data: chunk id -> [`Chunk`].
///
/// The store is a plain value. It is cloned to take snapshots and replaced
/// wholesale on load; it never merges two stores.
///
/// The convenience methods [`read`](Self::read), [`read_into`](Self::read_into)
/// and [`write`](Self::write) use [`JsonCodec`]. The `*_with` variants take
/// any [`Codec`].
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ChunkedStore {
    chunks: BTreeMap<String, Chunk>,
}

impl ChunkedStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    // -----------------------------------------------------------------------
    // Typed access
    // -----------------------------------------------------------------------

    /// Read a value, or `T::default()` if nothing is stored at `location`.
    pub fn read<T: DeserializeOwned + Default>(&self, location: &Location) -> StoreResult<T> {
        self.read_with::<JsonCodec, T>(location)
    }

    /// [`read`](Self::read) with an explicit codec.
    pub fn read_with<C: Codec, T: DeserializeOwned + Default>(
        &self,
        location: &Location,
    ) -> StoreResult<T> {
        match self.payload(location) {
            Some(payload) => C::decode(payload).map_err(|source| StoreError::Decode {
                location: location.clone(),
                source,
            }),
            None => Ok(T::default()),
        }
    }

    /// Decode the stored value into `target`.
    ///
    /// Returns `Ok(false)` and leaves `target` untouched when nothing is
    /// stored at `location`. A stored payload that fails to decode is an
    /// error, and `target` is left untouched in that case too.
    pub fn read_into<T: Serialize + DeserializeOwned>(
        &self,
        location: &Location,
        target: &mut T,
    ) -> StoreResult<bool> {
        self.read_into_with::<JsonCodec, T>(location, target)
    }

    /// [`read_into`](Self::read_into) with an explicit codec.
    pub fn read_into_with<C: Codec, T: Serialize + DeserializeOwned>(
        &self,
        location: &Location,
        target: &mut T,
    ) -> StoreResult<bool> {
        let Some(payload) = self.payload(location) else {
            return Ok(false);
        };
        C::decode_into(payload, target).map_err(|source| StoreError::Decode {
            location: location.clone(),
            source,
        })?;
        Ok(true)
    }

    /// Encode `value` and store it at `location`.
    ///
    /// Returns `Ok(false)` without storing anything when `location` points
    /// into the unassigned chunk.
    pub fn write<T: Serialize + ?Sized>(
        &mut self,
        location: &Location,
        value: &T,
    ) -> StoreResult<bool> {
        self.write_with::<JsonCodec, T>(location, value)
    }

    /// [`write`](Self::write) with an explicit codec.
    pub fn write_with<C: Codec, T: Serialize + ?Sized>(
        &mut self,
        location: &Location,
        value: &T,
    ) -> StoreResult<bool> {
        if location.is_unassigned() {
            warn!(
                object = %location.object_id(),
                "rejected write to unassigned chunk; owner has no identity yet"
            );
            return Ok(false);
        }
        let payload = C::encode(value).map_err(|source| StoreError::Encode {
            location: location.clone(),
            source,
        })?;
        Ok(self.insert_payload(location, payload))
    }

    // -----------------------------------------------------------------------
    // Raw payload access
    // -----------------------------------------------------------------------

    /// The raw payload stored at `location`, if any. Does not create chunks.
    pub fn payload(&self, location: &Location) -> Option<&str> {
        self.chunks
            .get(location.chunk_id())?
            .get(location.object_id())
            .map(String::as_str)
    }

    /// Store a pre-encoded payload. Subject to the same unassigned-chunk guard
    /// as [`write`](Self::write).
    pub fn insert_payload(&mut self, location: &Location, payload: String) -> bool {
        if location.is_unassigned() {
            warn!(object = %location.object_id(), "rejected payload for unassigned chunk");
            return false;
        }
        trace!(%location, bytes = payload.len(), "record written");
        self.get_chunk(location.raw_chunk_id())
            .insert(location.object_id().to_string(), payload);
        true
    }

    /// Remove the record at `location`, returning its payload.
    pub fn remove(&mut self, location: &Location) -> Option<String> {
        self.chunks
            .get_mut(location.chunk_id())?
            .remove(location.object_id())
    }

    // -----------------------------------------------------------------------
    // Chunks
    // -----------------------------------------------------------------------

    /// The chunk with the given id, created empty if it does not exist.
    ///
    /// `None` means the default chunk. A chunk returned here stays listed by
    /// [`get_chunk_ids`](Self::get_chunk_ids) even if it remains empty.
    pub fn get_chunk(&mut self, chunk_id: Option<&str>) -> &mut Chunk {
        let id = chunk::resolve(chunk_id);
        self.chunks.entry(id.to_string()).or_default()
    }

    /// The chunk with the given id, without creating it.
    pub fn chunk(&self, chunk_id: &str) -> Option<&Chunk> {
        self.chunks.get(chunk_id)
    }

    /// Ids of every known chunk, in sorted order.
    pub fn get_chunk_ids(&self) -> Vec<String> {
        self.chunks.keys().cloned().collect()
    }

    /// Remove a whole chunk, returning it.
    pub fn remove_chunk(&mut self, chunk_id: &str) -> Option<Chunk> {
        self.chunks.remove(chunk_id)
    }

    /// Iterate over `(chunk id, chunk)` pairs in chunk-id order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Chunk)> {
        self.chunks.iter().map(|(id, chunk)| (id.as_str(), chunk))
    }

    /// Number of chunks, including empty ones.
    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    /// Returns `true` if the store has no chunks at all.
    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    /// Total number of records across all chunks.
    pub fn record_count(&self) -> usize {
        self.chunks.values().map(BTreeMap::len).sum()
    }
}

impl FromIterator<(String, Chunk)> for ChunkedStore {
    fn from_iter<I: IntoIterator<Item = (String, Chunk)>>(iter: I) -> Self {
        Self {
            chunks: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::BincodeHexCodec;
    use keepsake_types::{DEFAULT_CHUNK, UNASSIGNED_CHUNK};
    use proptest::prelude::*;
    use serde::Deserialize;

    #[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
    struct Hp {
        hp: u32,
    }

    #[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
    struct Transform {
        x: f32,
        y: f32,
        #[serde(default)]
        label: String,
    }

    fn hero() -> Location {
        Location::in_default_chunk("hero")
    }

    // -----------------------------------------------------------------------
    // Absence
    // -----------------------------------------------------------------------

    #[test]
    fn read_missing_returns_default() {
        let store = ChunkedStore::new();
        let hp: Hp = store.read(&hero()).unwrap();
        assert_eq!(hp, Hp::default());
    }

    #[test]
    fn read_missing_object_in_existing_chunk_returns_default() {
        let mut store = ChunkedStore::new();
        store.write(&Location::in_default_chunk("other"), &Hp { hp: 1 }).unwrap();
        let hp: Hp = store.read(&hero()).unwrap();
        assert_eq!(hp, Hp::default());
    }

    #[test]
    fn read_into_missing_returns_false_and_leaves_target() {
        let store = ChunkedStore::new();
        let mut target = Hp { hp: 99 };
        assert!(!store.read_into(&hero(), &mut target).unwrap());
        assert_eq!(target, Hp { hp: 99 });
    }

    #[test]
    fn reads_do_not_create_chunks() {
        let store = ChunkedStore::new();
        let _: Hp = store.read(&Location::in_chunk("scene", "x")).unwrap();
        assert!(store.is_empty());
    }

    // -----------------------------------------------------------------------
    // Write / read
    // -----------------------------------------------------------------------

    #[test]
    fn write_then_read() {
        let mut store = ChunkedStore::new();
        assert!(store.write(&hero(), &Hp { hp: 10 }).unwrap());
        let hp: Hp = store.read(&hero()).unwrap();
        assert_eq!(hp, Hp { hp: 10 });
        assert_eq!(store.payload(&hero()), Some(r#"{"hp":10}"#));
    }

    #[test]
    fn write_overwrites() {
        let mut store = ChunkedStore::new();
        store.write(&hero(), &Hp { hp: 10 }).unwrap();
        store.write(&hero(), &Hp { hp: 4 }).unwrap();
        assert_eq!(store.read::<Hp>(&hero()).unwrap(), Hp { hp: 4 });
        assert_eq!(store.record_count(), 1);
    }

    #[test]
    fn implicit_and_explicit_default_chunk_are_the_same_record() {
        let mut store = ChunkedStore::new();
        store.write(&hero(), &Hp { hp: 7 }).unwrap();
        let explicit = Location::in_chunk(DEFAULT_CHUNK, "hero");
        assert_eq!(store.read::<Hp>(&explicit).unwrap(), Hp { hp: 7 });
        assert_eq!(store.get_chunk_ids(), vec![DEFAULT_CHUNK.to_string()]);
    }

    #[test]
    fn read_into_overlays() {
        let mut store = ChunkedStore::new();
        let loc = Location::in_chunk("scene", "camera");
        store.insert_payload(&loc, r#"{"x":1.0,"y":2.0}"#.into());

        let mut target = Transform {
            x: 0.0,
            y: 0.0,
            label: "main".into(),
        };
        assert!(store.read_into(&loc, &mut target).unwrap());
        assert_eq!(target.x, 1.0);
        assert_eq!(target.y, 2.0);
        assert_eq!(target.label, "main");
    }

    #[test]
    fn alternative_codec() {
        let mut store = ChunkedStore::new();
        store
            .write_with::<BincodeHexCodec, _>(&hero(), &Hp { hp: 12 })
            .unwrap();
        let hp: Hp = store.read_with::<BincodeHexCodec, _>(&hero()).unwrap();
        assert_eq!(hp, Hp { hp: 12 });

        // The JSON codec cannot read a hex payload.
        assert!(store.read::<Hp>(&hero()).is_err());
    }

    // -----------------------------------------------------------------------
    // Malformed payloads
    // -----------------------------------------------------------------------

    #[test]
    fn malformed_payload_is_an_error_not_a_default() {
        let mut store = ChunkedStore::new();
        store.insert_payload(&hero(), "{not json".into());

        let err = store.read::<Hp>(&hero()).unwrap_err();
        assert!(matches!(err, StoreError::Decode { .. }));
        assert_eq!(err.location(), &hero());
    }

    #[test]
    fn malformed_payload_in_read_into_leaves_target() {
        let mut store = ChunkedStore::new();
        store.insert_payload(&hero(), r#"{"hp":"many"}"#.into());

        let mut target = Hp { hp: 5 };
        assert!(store.read_into(&hero(), &mut target).is_err());
        assert_eq!(target, Hp { hp: 5 });
    }

    // -----------------------------------------------------------------------
    // Unassigned chunk guard
    // -----------------------------------------------------------------------

    #[test]
    fn write_to_unassigned_chunk_is_rejected() {
        let mut store = ChunkedStore::new();
        let loc = Location::in_chunk(UNASSIGNED_CHUNK, "orphan");
        assert!(!store.write(&loc, &Hp { hp: 1 }).unwrap());
        assert!(!store.insert_payload(&loc, "{}".into()));

        assert!(store.get_chunk_ids().is_empty());
        assert!(store.chunk(UNASSIGNED_CHUNK).is_none());
        assert_eq!(store.read::<Hp>(&loc).unwrap(), Hp::default());
    }

    // -----------------------------------------------------------------------
    // Chunks
    // -----------------------------------------------------------------------

    #[test]
    fn get_chunk_creates_and_registers() {
        let mut store = ChunkedStore::new();
        assert!(store.get_chunk(Some("empty")).is_empty());
        assert_eq!(store.get_chunk_ids(), vec!["empty".to_string()]);
    }

    #[test]
    fn get_chunk_none_is_default_chunk() {
        let mut store = ChunkedStore::new();
        store.get_chunk(None).insert("k".into(), "v".into());
        assert_eq!(store.chunk(DEFAULT_CHUNK).unwrap().get("k").unwrap(), "v");
    }

    #[test]
    fn chunk_ids_are_stable_between_calls() {
        let mut store = ChunkedStore::new();
        for id in ["zeta", "alpha", "mid"] {
            store.get_chunk(Some(id));
        }
        let first = store.get_chunk_ids();
        let second = store.get_chunk_ids();
        assert_eq!(first, second);
        assert_eq!(first, vec!["alpha", "mid", "zeta"]);
    }

    #[test]
    fn remove_record_and_chunk() {
        let mut store = ChunkedStore::new();
        store.write(&hero(), &Hp { hp: 1 }).unwrap();
        assert_eq!(store.remove(&hero()).as_deref(), Some(r#"{"hp":1}"#));
        assert!(store.remove(&hero()).is_none());
        // The chunk itself survives record removal.
        assert_eq!(store.len(), 1);
        assert!(store.remove_chunk(DEFAULT_CHUNK).is_some());
        assert!(store.is_empty());
    }

    #[test]
    fn from_iter_builds_store() {
        let mut chunk = Chunk::new();
        chunk.insert("a".into(), "1".into());
        let store: ChunkedStore = vec![("c".to_string(), chunk)].into_iter().collect();
        assert_eq!(store.payload(&Location::in_chunk("c", "a")), Some("1"));
        assert_eq!(store.iter().count(), 1);
    }

    // -----------------------------------------------------------------------
    // Properties
    // -----------------------------------------------------------------------

    proptest! {
        #[test]
        fn roundtrip_any_value(
            chunk in "[a-z]{1,8}",
            object in "[a-z0-9]{1,8}",
            hp in any::<u32>(),
            name in ".*",
        ) {
            let mut store = ChunkedStore::new();
            let loc = Location::in_chunk(chunk, object);
            let value = (hp, name);
            prop_assert!(store.write(&loc, &value).unwrap());
            let back: (u32, String) = store.read(&loc).unwrap();
            prop_assert_eq!(back, value);
        }

        #[test]
        fn unwritten_locations_read_default(object in "[a-z0-9]{1,8}") {
            let store = ChunkedStore::new();
            let mut target = Hp { hp: 42 };
            let loc = Location::in_default_chunk(object);
            prop_assert_eq!(store.read::<Hp>(&loc).unwrap(), Hp::default());
            prop_assert!(!store.read_into(&loc, &mut target).unwrap());
            prop_assert_eq!(target, Hp { hp: 42 });
        }
    }
}
