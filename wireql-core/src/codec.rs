//! Codec for WireQL envelopes
//!
//! Envelopes are encoded either as JSON or as MessagePack. MessagePack uses
//! named maps (`rmp_serde::to_vec_named`) so that a binary envelope carries the
//! same field names as its JSON twin and the server can treat both alike.
//!
//! # Frame sniffing
//!
//! WebSocket frames do not announce their format. A frame whose first byte is
//! `{` is JSON; anything else is MessagePack. A frame that fails to decode in
//! the sniffed format is an error, never a best-effort guess.
//!
//! # Correlation
//!
//! WebSocket requests carry an extra `requestId` field next to the envelope's
//! own fields, and replies echo it back as `{requestId, response}`.
//!
//! # Examples
//!
//! ```rust
//! use wireql_core::{codec, SerializationFormat, SqlOperation, SqlRequest};
//!
//! let request = SqlRequest::new(SqlOperation::Query, "SELECT 1", vec![]);
//! let bytes = codec::encode(&request, SerializationFormat::MessagePack).unwrap();
//! assert_eq!(codec::sniff(&bytes), Some(SerializationFormat::MessagePack));
//!
//! let decoded: SqlRequest = codec::decode(&bytes, SerializationFormat::MessagePack).unwrap();
//! assert_eq!(decoded, request);
//! ```

use crate::error::{Error, Result};
use crate::types::{SerializationFormat, SqlResponse};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use std::time::{Duration, Instant};

/// Field name of the correlation id on WebSocket envelopes
pub const REQUEST_ID_FIELD: &str = "requestId";

/// Field carrying the inner response on WebSocket replies
pub const RESPONSE_FIELD: &str = "response";

/// First byte of every JSON object
const JSON_OBJECT_START: u8 = b'{';

/// Encode a value in the given format
pub fn encode<T: Serialize + ?Sized>(value: &T, format: SerializationFormat) -> Result<Vec<u8>> {
    match format {
        SerializationFormat::Json => {
            serde_json::to_vec(value).map_err(|e| Error::Serialization(e.to_string()))
        }
        SerializationFormat::MessagePack => Ok(rmp_serde::to_vec_named(value)?),
    }
}

/// Decode a value from bytes in the given format
pub fn decode<T: DeserializeOwned>(bytes: &[u8], format: SerializationFormat) -> Result<T> {
    match format {
        SerializationFormat::Json => Ok(serde_json::from_slice(bytes)?),
        SerializationFormat::MessagePack => Ok(rmp_serde::from_slice(bytes)?),
    }
}

/// Encode and report how long serialization took
pub fn encode_timed<T: Serialize + ?Sized>(
    value: &T,
    format: SerializationFormat,
) -> Result<(Vec<u8>, Duration)> {
    let start = Instant::now();
    let bytes = encode(value, format)?;
    Ok((bytes, start.elapsed()))
}

/// Decode and report how long deserialization took
pub fn decode_timed<T: DeserializeOwned>(
    bytes: &[u8],
    format: SerializationFormat,
) -> Result<(T, Duration)> {
    let start = Instant::now();
    let value = decode(bytes, format)?;
    Ok((value, start.elapsed()))
}

/// Guess the format of a raw frame from its first byte
///
/// Returns `None` for an empty frame.
pub fn sniff(bytes: &[u8]) -> Option<SerializationFormat> {
    match bytes.first() {
        None => None,
        Some(&JSON_OBJECT_START) => Some(SerializationFormat::Json),
        Some(_) => Some(SerializationFormat::MessagePack),
    }
}

/// Decode an inbound WebSocket frame of unknown format into a generic value
pub fn decode_frame(bytes: &[u8]) -> Result<Value> {
    let format = sniff(bytes).ok_or_else(|| Error::Decode("empty frame".to_string()))?;
    decode(bytes, format)
}

/// Build the outbound WebSocket form of an envelope: its fields plus `requestId`
pub fn with_request_id<T: Serialize>(envelope: &T, request_id: &str) -> Result<Value> {
    let mut value =
        serde_json::to_value(envelope).map_err(|e| Error::Serialization(e.to_string()))?;

    match value.as_object_mut() {
        Some(map) => {
            map.insert(
                REQUEST_ID_FIELD.to_string(),
                Value::String(request_id.to_string()),
            );
            Ok(value)
        }
        None => Err(Error::Serialization(
            "envelope must serialize to an object".to_string(),
        )),
    }
}

/// Correlation id carried by an inbound frame, if any
pub fn request_id(frame: &Value) -> Option<&str> {
    frame.get(REQUEST_ID_FIELD).and_then(Value::as_str)
}

/// Extract the `SqlResponse` from a correlated reply
///
/// Replies normally nest the envelope under `response`; a frame without that
/// field is read as the envelope itself.
pub fn reply_payload(frame: Value) -> Result<SqlResponse> {
    let payload = match frame {
        Value::Object(mut map) => match map.remove(RESPONSE_FIELD) {
            Some(inner) => inner,
            None => Value::Object(map),
        },
        other => other,
    };
    Ok(serde_json::from_value(payload)?)
}
