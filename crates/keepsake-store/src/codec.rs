use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::error::CodecError;

/// Converts typed values to and from the string payloads held in a chunk.
///
/// Codecs are stateless; the store selects one per call through a type
/// parameter. Any encoding works as long as `decode(encode(v)) == v`.
pub trait Codec {
    /// Short name used in diagnostics.
    const NAME: &'static str;

    /// Encode a value into a payload string.
    fn encode<T: Serialize + ?Sized>(value: &T) -> Result<String, CodecError>;

    /// Decode a payload string into a new value.
    fn decode<T: DeserializeOwned>(payload: &str) -> Result<T, CodecError>;

    /// Decode a payload into an existing value.
    ///
    /// On error `target` must be left untouched. The default replaces the
    /// whole value.
    fn decode_into<T: Serialize + DeserializeOwned>(
        payload: &str,
        target: &mut T,
    ) -> Result<(), CodecError> {
        *target = Self::decode(payload)?;
        Ok(())
    }
}

/// JSON payloads via `serde_json`. The default codec.
#[derive(Clone, Copy, Debug, Default)]
pub struct JsonCodec;

impl Codec for JsonCodec {
    const NAME: &'static str = "json";

    fn encode<T: Serialize + ?Sized>(value: &T) -> Result<String, CodecError> {
        Ok(serde_json::to_string(value)?)
    }

    fn decode<T: DeserializeOwned>(payload: &str) -> Result<T, CodecError> {
        Ok(serde_json::from_str(payload)?)
    }

    /// Overlay the fields present in the payload onto `target`.
    ///
    /// Object fields missing from the payload keep their current values in
    /// `target`; everything else is replaced.
    fn decode_into<T: Serialize + DeserializeOwned>(
        payload: &str,
        target: &mut T,
    ) -> Result<(), CodecError> {
        let patch: Value = serde_json::from_str(payload)?;
        let mut merged = serde_json::to_value(&*target)?;
        overlay(&mut merged, patch);
        *target = serde_json::from_value(merged)?;
        Ok(())
    }
}

fn overlay(base: &mut Value, patch: Value) {
    match (base, patch) {
        (Value::Object(base), Value::Object(patch)) => {
            for (key, value) in patch {
                match base.get_mut(&key) {
                    Some(slot) => overlay(slot, value),
                    None => {
                        base.insert(key, value);
                    }
                }
            }
        }
        (base, patch) => *base = patch,
    }
}

/// Compact binary payloads: bincode bytes, hex-encoded into the string.
///
/// Not self-describing, so [`Codec::decode_into`] replaces the whole value.
#[derive(Clone, Copy, Debug, Default)]
pub struct BincodeHexCodec;

impl Codec for BincodeHexCodec {
    const NAME: &'static str = "bincode-hex";

    fn encode<T: Serialize + ?Sized>(value: &T) -> Result<String, CodecError> {
        let bytes = bincode::serialize(value)?;
        Ok(hex::encode(bytes))
    }

    fn decode<T: DeserializeOwned>(payload: &str) -> Result<T, CodecError> {
        let bytes = hex::decode(payload)?;
        Ok(bincode::deserialize(&bytes)?)
    }
}
