//! Payload codecs.
//!
//! Stores treat payloads as opaque: they hand them to a [`PayloadCodec`] on
//! write and store the resulting bytes next to the caller's type tag. On read
//! the tag is passed back to the codec, which picks the decoder.
//!
//! Provided codecs:
//! - [`JsonCodec`]: serde_json, one concrete payload type
//! - [`CodecRegistry`]: serde_json with a per-tag decoder lookup for polymorphic payloads
//! - [`ProstCodec`]: a single protobuf message type
//! - [`AnyCodec`]: `google.protobuf.Any`, the tag doubles as the type URL

use std::collections::HashMap;
use std::marker::PhantomData;

use serde::de::DeserializeOwned;
use serde::Serialize;

/// Errors raised while encoding or decoding payloads.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("JSON codec error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Protobuf decode error: {0}")]
    ProtobufDecode(#[from] prost::DecodeError),

    #[error("No decoder registered for type tag '{0}'")]
    UnknownType(String),
}

/// Converts payloads to and from their stored byte form.
pub trait PayloadCodec<P>: Send + Sync {
    fn serialize(&self, payload: &P) -> Result<Vec<u8>, CodecError>;

    fn deserialize(&self, data: &[u8], type_tag: &str) -> Result<P, CodecError>;
}

/// JSON codec for a single payload type. The type tag is ignored.
pub struct JsonCodec<P> {
    _marker: PhantomData<fn() -> P>,
}

impl<P> JsonCodec<P> {
    pub fn new() -> Self {
        Self {
            _marker: PhantomData,
        }
    }
}

impl<P> Default for JsonCodec<P> {
    fn default() -> Self {
        Self::new()
    }
}

impl<P> PayloadCodec<P> for JsonCodec<P>
where
    P: Serialize + DeserializeOwned,
{
    fn serialize(&self, payload: &P) -> Result<Vec<u8>, CodecError> {
        Ok(serde_json::to_vec(payload)?)
    }

    fn deserialize(&self, data: &[u8], _type_tag: &str) -> Result<P, CodecError> {
        Ok(serde_json::from_slice(data)?)
    }
}

type Decoder<P> = Box<dyn Fn(&[u8]) -> Result<P, CodecError> + Send + Sync>;

/// JSON codec dispatching decodes on the stored type tag.
///
/// Payloads are encoded with their own `Serialize` impl, so enums should be
/// `#[serde(untagged)]`: the variant lives in the type tag, not in the body.
///
/// ```ignore
/// let codec = CodecRegistry::<OrderEvent>::new()
///     .register("OrderPlaced", OrderEvent::Placed)
///     .register("OrderShipped", OrderEvent::Shipped);
/// ```
pub struct CodecRegistry<P> {
    decoders: HashMap<String, Decoder<P>>,
}

impl<P> CodecRegistry<P> {
    pub fn new() -> Self {
        Self {
            decoders: HashMap::new(),
        }
    }

    /// Register the decoder for `type_tag`: the body is parsed as `T` and
    /// lifted into the payload type with `wrap`.
    pub fn register<T, F>(mut self, type_tag: impl Into<String>, wrap: F) -> Self
    where
        T: DeserializeOwned,
        F: Fn(T) -> P + Send + Sync + 'static,
    {
        let decoder: Decoder<P> = Box::new(move |data| {
            let value: T = serde_json::from_slice(data)?;
            Ok(wrap(value))
        });
        self.decoders.insert(type_tag.into(), decoder);
        self
    }

    pub fn is_registered(&self, type_tag: &str) -> bool {
        self.decoders.contains_key(type_tag)
    }
}

impl<P> Default for CodecRegistry<P> {
    fn default() -> Self {
        Self::new()
    }
}

impl<P: Serialize> PayloadCodec<P> for CodecRegistry<P> {
    fn serialize(&self, payload: &P) -> Result<Vec<u8>, CodecError> {
        Ok(serde_json::to_vec(payload)?)
    }

    fn deserialize(&self, data: &[u8], type_tag: &str) -> Result<P, CodecError> {
        let decoder = self
            .decoders
            .get(type_tag)
            .ok_or_else(|| CodecError::UnknownType(type_tag.to_string()))?;
        decoder(data)
    }
}

/// Protobuf codec for a single message type.
pub struct ProstCodec<M> {
    _marker: PhantomData<fn() -> M>,
}

impl<M> ProstCodec<M> {
    pub fn new() -> Self {
        Self {
            _marker: PhantomData,
        }
    }
}

impl<M> Default for ProstCodec<M> {
    fn default() -> Self {
        Self::new()
    }
}

impl<M> PayloadCodec<M> for ProstCodec<M>
where
    M: prost::Message + Default,
{
    fn serialize(&self, payload: &M) -> Result<Vec<u8>, CodecError> {
        Ok(payload.encode_to_vec())
    }

    fn deserialize(&self, data: &[u8], _type_tag: &str) -> Result<M, CodecError> {
        Ok(M::decode(data)?)
    }
}

/// Codec for `google.protobuf.Any` payloads.
///
/// Only the packed bytes are stored; the type URL travels as the type tag,
/// so callers should tag envelopes with `any.type_url`.
#[derive(Debug, Default, Clone, Copy)]
pub struct AnyCodec;

impl PayloadCodec<prost_types::Any> for AnyCodec {
    fn serialize(&self, payload: &prost_types::Any) -> Result<Vec<u8>, CodecError> {
        Ok(payload.value.clone())
    }

    fn deserialize(&self, data: &[u8], type_tag: &str) -> Result<prost_types::Any, CodecError> {
        Ok(prost_types::Any {
            type_url: type_tag.to_string(),
            value: data.to_vec(),
        })
    }
}
