//! Codec contract and the built-in wire encodings.
//!
//! The node delegates all serialization to a codec supplied for the payload
//! type, so the library never constrains what applications put inside a
//! message. Two implementations ship with the crate:
//!
//! - [`JsonCodec`] — the reference wire format. Envelope fields and payload
//!   fields share one JSON object; independent implementations of this
//!   encoding interoperate.
//! - [`BincodeCodec`] — compact binary framing for deployments where every
//!   datagram byte counts and both ends run this crate.
//!
//! Senders should keep encoded messages within a safe unicast MTU
//! (≈1200 bytes); datagrams are not fragmented above the endpoint layer and
//! oversized receives are truncated by the OS, which surfaces here as a
//! decode failure.

use {
    crate::{
        envelope::{Envelope, GossipMessage},
        error::{GossipNetError, Result},
    },
    serde::{de::DeserializeOwned, Serialize},
    std::marker::PhantomData,
};

/// Serialization contract between the node runtime and a payload type.
///
/// `encode(decode(bytes))` must round-trip every envelope field exactly,
/// including the insertion order of the notified-set.
pub trait Codec: Send + Sync + 'static {
    /// The application payload type this codec understands.
    ///
    /// `Sync` because published messages are shared with subscribers
    /// behind an `Arc`.
    type Payload: Send + Sync + 'static;

    /// Serialize an envelope+payload pair into one datagram's bytes.
    fn encode(&self, message: &GossipMessage<Self::Payload>) -> Result<Vec<u8>>;

    /// Deserialize one datagram's bytes. Fails with
    /// [`GossipNetError::Decode`] on malformed or truncated input.
    fn decode(&self, bytes: &[u8]) -> Result<GossipMessage<Self::Payload>>;
}

fn check_size(encoded_len: usize, cap: Option<usize>) -> Result<()> {
    match cap {
        Some(max) if encoded_len > max => Err(GossipNetError::MessageTooLarge {
            size: encoded_len,
            max,
        }),
        _ => Ok(()),
    }
}

// ── JSON reference codec ────────────────────────────────────────────────────

/// The reference JSON wire format.
///
/// One JSON object per datagram: the envelope's `id`, `timestamp`, and
/// `notifiedNodes` fields next to the payload's own fields. The payload must
/// therefore serialize to a JSON object, and its field names must not
/// collide with the envelope's.
#[derive(Debug)]
pub struct JsonCodec<P> {
    max_encoded_size: Option<usize>,
    _payload: PhantomData<fn() -> P>,
}

impl<P> JsonCodec<P> {
    /// Codec without an encoded-size cap.
    pub fn new() -> Self {
        Self {
            max_encoded_size: None,
            _payload: PhantomData,
        }
    }

    /// Codec that refuses to encode messages larger than `max` bytes.
    pub fn with_size_cap(max: usize) -> Self {
        Self {
            max_encoded_size: Some(max),
            _payload: PhantomData,
        }
    }
}

impl<P> Default for JsonCodec<P> {
    fn default() -> Self {
        Self::new()
    }
}

impl<P> Codec for JsonCodec<P>
where
    P: Serialize + DeserializeOwned + Send + Sync + 'static,
{
    type Payload = P;

    fn encode(&self, message: &GossipMessage<P>) -> Result<Vec<u8>> {
        let mut object = match serde_json::to_value(message.envelope()) {
            Ok(serde_json::Value::Object(map)) => map,
            Ok(_) => unreachable!("envelope serializes to an object"),
            Err(e) => return Err(GossipNetError::Encode(e.to_string())),
        };

        let payload = serde_json::to_value(message.payload())
            .map_err(|e| GossipNetError::Encode(e.to_string()))?;
        match payload {
            serde_json::Value::Object(fields) => {
                for (key, value) in fields {
                    if object.contains_key(&key) {
                        return Err(GossipNetError::Encode(format!(
                            "payload field `{key}` collides with an envelope field"
                        )));
                    }
                    object.insert(key, value);
                }
            }
            other => {
                return Err(GossipNetError::Encode(format!(
                    "payload must serialize to a JSON object, got {}",
                    json_kind(&other)
                )))
            }
        }

        let bytes = serde_json::to_vec(&serde_json::Value::Object(object))
            .map_err(|e| GossipNetError::Encode(e.to_string()))?;
        check_size(bytes.len(), self.max_encoded_size)?;
        Ok(bytes)
    }

    fn decode(&self, bytes: &[u8]) -> Result<GossipMessage<P>> {
        let value: serde_json::Value = serde_json::from_slice(bytes)
            .map_err(|e| GossipNetError::Decode(e.to_string()))?;

        // Envelope and payload each pick their fields out of the same
        // object; unknown keys are ignored on both sides.
        let envelope: Envelope = serde_json::from_value(value.clone())
            .map_err(|e| GossipNetError::Decode(format!("envelope: {e}")))?;
        let payload: P = serde_json::from_value(value)
            .map_err(|e| GossipNetError::Decode(format!("payload: {e}")))?;

        Ok(GossipMessage::from_parts(envelope, payload))
    }
}

fn json_kind(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "a boolean",
        serde_json::Value::Number(_) => "a number",
        serde_json::Value::String(_) => "a string",
        serde_json::Value::Array(_) => "an array",
        serde_json::Value::Object(_) => "an object",
    }
}

// ── Bincode codec ───────────────────────────────────────────────────────────

/// Compact binary framing: a bincode-encoded `(envelope, payload)` pair.
///
/// Not self-describing and not interoperable with the JSON reference
/// encoding; both ends must use this codec.
#[derive(Debug)]
pub struct BincodeCodec<P> {
    max_encoded_size: Option<usize>,
    _payload: PhantomData<fn() -> P>,
}

impl<P> BincodeCodec<P> {
    /// Codec without an encoded-size cap.
    pub fn new() -> Self {
        Self {
            max_encoded_size: None,
            _payload: PhantomData,
        }
    }

    /// Codec that refuses to encode messages larger than `max` bytes.
    pub fn with_size_cap(max: usize) -> Self {
        Self {
            max_encoded_size: Some(max),
            _payload: PhantomData,
        }
    }
}

impl<P> Default for BincodeCodec<P> {
    fn default() -> Self {
        Self::new()
    }
}

impl<P> Codec for BincodeCodec<P>
where
    P: Serialize + DeserializeOwned + Send + Sync + 'static,
{
    type Payload = P;

    fn encode(&self, message: &GossipMessage<P>) -> Result<Vec<u8>> {
        let bytes = bincode::serialize(&(message.envelope(), message.payload()))
            .map_err(|e| GossipNetError::Encode(e.to_string()))?;
        check_size(bytes.len(), self.max_encoded_size)?;
        Ok(bytes)
    }

    fn decode(&self, bytes: &[u8]) -> Result<GossipMessage<P>> {
        let (envelope, payload): (Envelope, P) = bincode::deserialize(bytes)
            .map_err(|e| GossipNetError::Decode(e.to_string()))?;
        Ok(GossipMessage::from_parts(envelope, payload))
    }
}

// ── Tests ───────────────────────────────────────────────────────────────────
