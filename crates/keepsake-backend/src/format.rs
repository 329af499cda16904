//! Binary save-file encoding.
//!
//! A save file is a sequence of chunk blocks followed by a terminator:
//!
//! ```text
//! block      := 0x01 string(chunk_id) i32le(count) count * (string(key) string(value))
//! terminator := 0x00
//! string     := varint(byte_len) utf8_bytes
//! ```
//!
//! `varint` is the 7-bit little-endian encoding (high bit = continuation),
//! limited to 32-bit lengths. Repeated chunk ids are merged on decode;
//! a repeated key within a chunk is malformed. Bytes after the terminator
//! are ignored.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use tracing::debug;

use keepsake_store::{Chunk, ChunkedStore};

use crate::error::{BackendError, BackendResult};

/// Longest varint accepted for a 32-bit length.
const MAX_VARINT_BYTES: usize = 5;

/// Encode a store into save-file bytes.
pub fn encode(store: &ChunkedStore) -> BackendResult<Bytes> {
    let mut buf = BytesMut::new();
    for (chunk_id, chunk) in store.iter() {
        let count = i32::try_from(chunk.len()).map_err(|_| BackendError::Format {
            offset: buf.len(),
            reason: format!("chunk {chunk_id:?} has too many records ({})", chunk.len()),
        })?;
        buf.put_u8(1);
        put_string(&mut buf, chunk_id)?;
        buf.put_i32_le(count);
        for (key, value) in chunk {
            put_string(&mut buf, key)?;
            put_string(&mut buf, value)?;
        }
    }
    buf.put_u8(0);
    Ok(buf.freeze())
}

/// Decode save-file bytes into a store.
pub fn decode(data: &[u8]) -> BackendResult<ChunkedStore> {
    let mut reader = Reader::new(data);
    let mut store = ChunkedStore::new();
    while reader.read_bool()? {
        let chunk_id = reader.read_string()?;
        let count = reader.read_count()?;
        let chunk: &mut Chunk = store.get_chunk(Some(chunk_id.as_str()));
        for _ in 0..count {
            let key_offset = reader.offset();
            let key = reader.read_string()?;
            let value = reader.read_string()?;
            if chunk.insert(key.clone(), value).is_some() {
                return Err(BackendError::Format {
                    offset: key_offset,
                    reason: format!("duplicate key {key:?} in chunk {chunk_id:?}"),
                });
            }
        }
    }
    if reader.remaining() > 0 {
        debug!(trailing = reader.remaining(), "ignoring bytes after save terminator");
    }
    Ok(store)
}

fn put_string(buf: &mut BytesMut, s: &str) -> BackendResult<()> {
    let len = u32::try_from(s.len())
        .ok()
        .filter(|len| *len <= i32::MAX as u32)
        .ok_or_else(|| BackendError::Format {
            offset: buf.len(),
            reason: format!("string of {} bytes is too long", s.len()),
        })?;
    put_varint(buf, len);
    buf.put_slice(s.as_bytes());
    Ok(())
}

fn put_varint(buf: &mut BytesMut, mut value: u32) {
    loop {
        let mut byte = (value & 0x7F) as u8;
        value >>= 7;
        if value > 0 {
            byte |= 0x80;
        }
        buf.put_u8(byte);
        if value == 0 {
            break;
        }
    }
}

/// Cursor over save-file bytes that reports offsets in errors.
struct Reader<'a> {
    buf: &'a [u8],
    total: usize,
}

impl<'a> Reader<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Self {
            buf,
            total: buf.len(),
        }
    }

    fn offset(&self) -> usize {
        self.total - self.buf.remaining()
    }

    fn remaining(&self) -> usize {
        self.buf.remaining()
    }

    fn malformed(&self, reason: impl Into<String>) -> BackendError {
        BackendError::Format {
            offset: self.offset(),
            reason: reason.into(),
        }
    }

    fn need(&self, n: usize, what: &str) -> BackendResult<()> {
        if self.buf.remaining() < n {
            return Err(self.malformed(format!(
                "truncated {what}: need {n} bytes, have {}",
                self.buf.remaining()
            )));
        }
        Ok(())
    }

    fn read_bool(&mut self) -> BackendResult<bool> {
        self.need(1, "block marker")?;
        Ok(self.buf.get_u8() != 0)
    }

    fn read_count(&mut self) -> BackendResult<usize> {
        self.need(4, "record count")?;
        let count = self.buf.get_i32_le();
        usize::try_from(count).map_err(|_| self.malformed(format!("negative record count {count}")))
    }

    fn read_varint(&mut self) -> BackendResult<u32> {
        let mut value: u32 = 0;
        for i in 0..MAX_VARINT_BYTES {
            self.need(1, "length prefix")?;
            let byte = self.buf.get_u8();
            let bits = u32::from(byte & 0x7F);
            if i == MAX_VARINT_BYTES - 1 && bits > 0x0F {
                return Err(self.malformed("length prefix overflows 32 bits"));
            }
            value |= bits << (7 * i);
            if byte & 0x80 == 0 {
                return Ok(value);
            }
        }
        Err(self.malformed("length prefix longer than 5 bytes"))
    }

    fn read_string(&mut self) -> BackendResult<String> {
        let start = self.offset();
        let len = self.read_varint()? as usize;
        self.need(len, "string")?;
        let bytes = self.buf.copy_to_bytes(len);
        String::from_utf8(bytes.to_vec()).map_err(|e| BackendError::Format {
            offset: start,
            reason: format!("invalid utf-8: {e}"),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use keepsake_types::Location;
    use proptest::collection::btree_map;
    use proptest::prelude::*;

    fn sample() -> ChunkedStore {
        let mut store = ChunkedStore::new();
        store.insert_payload(&Location::in_default_chunk("hero"), r#"{"hp":10}"#.into());
        store.insert_payload(&Location::in_chunk("scene-1", "door"), r#"{"open":true}"#.into());
        store.get_chunk(Some("empty"));
        store
    }

    #[test]
    fn empty_store_is_single_terminator() {
        let bytes = encode(&ChunkedStore::new()).unwrap();
        assert_eq!(&bytes[..], &[0u8]);
        assert!(decode(&bytes).unwrap().is_empty());
    }

    #[test]
    fn exact_layout_of_one_record() {
        let mut store = ChunkedStore::new();
        store.insert_payload(&Location::in_chunk("c", "k"), "v".into());
        let bytes = encode(&store).unwrap();
        assert_eq!(
            &bytes[..],
            &[
                1, // has_next
                1, b'c', // chunk id
                1, 0, 0, 0, // count
                1, b'k', // key
                1, b'v', // value
                0, // terminator
            ]
        );
    }

    #[test]
    fn roundtrip_preserves_empty_chunks() {
        let store = sample();
        let back = decode(&encode(&store).unwrap()).unwrap();
        assert_eq!(back, store);
        assert!(back.chunk("empty").unwrap().is_empty());
    }

    #[test]
    fn long_strings_use_multibyte_length() {
        let mut store = ChunkedStore::new();
        let value = "x".repeat(300);
        store.insert_payload(&Location::in_chunk("c", "k"), value.clone());
        let bytes = encode(&store).unwrap();
        // 300 = 0b1_0010_1100 -> 0xAC 0x02
        let pos = bytes.windows(2).position(|w| w == [0xAC, 0x02]);
        assert!(pos.is_some());
        let back = decode(&bytes).unwrap();
        assert_eq!(back.payload(&Location::in_chunk("c", "k")), Some(value.as_str()));
    }

    #[test]
    fn missing_terminator_is_malformed() {
        let bytes = encode(&sample()).unwrap();
        let err = decode(&bytes[..bytes.len() - 1]).unwrap_err();
        assert!(matches!(err, BackendError::Format { .. }));
    }

    #[test]
    fn truncated_string_is_malformed() {
        let err = decode(&[1, 5, b'a', b'b']).unwrap_err();
        match err {
            BackendError::Format { offset, reason } => {
                assert_eq!(offset, 2);
                assert!(reason.contains("string"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn negative_count_is_malformed() {
        let err = decode(&[1, 1, b'c', 0xFF, 0xFF, 0xFF, 0xFF, 0]).unwrap_err();
        assert!(matches!(err, BackendError::Format { .. }));
    }

    #[test]
    fn invalid_utf8_is_malformed() {
        let err = decode(&[1, 1, 0xFF, 0, 0, 0, 0, 0]).unwrap_err();
        assert!(err.to_string().contains("utf-8"));
    }

    #[test]
    fn overlong_varint_is_malformed() {
        let err = decode(&[1, 0xFF, 0xFF, 0xFF, 0xFF, 0x7F]).unwrap_err();
        assert!(matches!(err, BackendError::Format { .. }));
    }

    #[test]
    fn duplicate_key_is_malformed() {
        let data = [1, 1, b'c', 2, 0, 0, 0, 1, b'k', 1, b'a', 1, b'k', 1, b'b', 0];
        let err = decode(&data).unwrap_err();
        assert!(err.to_string().contains("duplicate key"));
    }

    #[test]
    fn repeated_chunk_blocks_merge() {
        let data = [
            1, 1, b'c', 1, 0, 0, 0, 1, b'a', 1, b'1', //
            1, 1, b'c', 1, 0, 0, 0, 1, b'b', 1, b'2', //
            0,
        ];
        let store = decode(&data).unwrap();
        assert_eq!(store.len(), 1);
        assert_eq!(store.record_count(), 2);
    }

    #[test]
    fn trailing_bytes_are_ignored() {
        let mut bytes = encode(&sample()).unwrap().to_vec();
        bytes.extend_from_slice(b"garbage");
        assert_eq!(decode(&bytes).unwrap(), sample());
    }

    proptest! {
        #[test]
        fn any_store_roundtrips(
            chunks in btree_map(
                ".{0,12}",
                btree_map(".{0,12}", ".{0,40}", 0..6),
                0..5,
            )
        ) {
            let store: ChunkedStore = chunks.into_iter().collect();
            let back = decode(&encode(&store).unwrap()).unwrap();
            prop_assert_eq!(back, store);
        }
    }
}
