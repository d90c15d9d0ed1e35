//! Payload codecs: application values to bytes and back.
//!
//! - [`JsonCodec`] - JSON via `serde_json` (default)
//! - [`MsgPackCodec`] - MessagePack via `rmp-serde` (behind the `msgpack` feature)
//!
//! A codec instance is handed to each [`Framer`](crate::Framer) and
//! [`Deframer`](crate::Deframer); sender and receiver must use the same one.

use serde::de::DeserializeOwned;
use serde::Serialize;

/// Boxed error returned by codecs.
pub type CodecError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Serializes values into payload bytes and back.
pub trait PayloadCodec {
    /// Codec name for diagnostics.
    fn name(&self) -> &'static str;

    /// Encode a value.
    fn encode<T: Serialize + ?Sized>(&self, value: &T) -> Result<Vec<u8>, CodecError>;

    /// Decode a value.
    fn decode<T: DeserializeOwned>(&self, bytes: &[u8]) -> Result<T, CodecError>;
}

/// JSON payloads.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

impl PayloadCodec for JsonCodec {
    fn name(&self) -> &'static str {
        "json"
    }

    fn encode<T: Serialize + ?Sized>(&self, value: &T) -> Result<Vec<u8>, CodecError> {
        Ok(serde_json::to_vec(value)?)
    }

    fn decode<T: DeserializeOwned>(&self, bytes: &[u8]) -> Result<T, CodecError> {
        Ok(serde_json::from_slice(bytes)?)
    }
}

/// MessagePack payloads with named struct fields.
#[cfg(feature = "msgpack")]
#[derive(Debug, Clone, Copy, Default)]
pub struct MsgPackCodec;

#[cfg(feature = "msgpack")]
impl PayloadCodec for MsgPackCodec {
    fn name(&self) -> &'static str {
        "msgpack"
    }

    fn encode<T: Serialize + ?Sized>(&self, value: &T) -> Result<Vec<u8>, CodecError> {
        Ok(rmp_serde::to_vec_named(value)?)
    }

    fn decode<T: DeserializeOwned>(&self, bytes: &[u8]) -> Result<T, CodecError> {
        Ok(rmp_serde::from_slice(bytes)?)
    }
}
