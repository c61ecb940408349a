//! Payload codecs.
//!
//! The store never looks inside a payload; it hands values to a [`Codec`] and
//! writes whatever bytes come back. YAML is the default so records stay
//! readable and editable by hand.

use serde::Serialize;
use serde::de::DeserializeOwned;

/// Error type produced by codecs.
pub type CodecError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Encodes values to bytes and back.
pub trait Codec: Send + Sync {
  /// Short format name for diagnostics (e.g. `"yaml"`).
  fn name(&self) -> &'static str;

  fn encode<T: Serialize + ?Sized>(&self, value: &T) -> Result<Vec<u8>, CodecError>;

  fn decode<T: DeserializeOwned>(&self, bytes: &[u8]) -> Result<T, CodecError>;
}

/// YAML via `serde_yaml`.
#[derive(Debug, Clone, Copy, Default)]
pub struct YamlCodec;

impl Codec for YamlCodec {
  fn name(&self) -> &'static str {
    "yaml"
  }

  fn encode<T: Serialize + ?Sized>(&self, value: &T) -> Result<Vec<u8>, CodecError> {
    Ok(serde_yaml::to_string(value)?.into_bytes())
  }

  fn decode<T: DeserializeOwned>(&self, bytes: &[u8]) -> Result<T, CodecError> {
    Ok(serde_yaml::from_slice(bytes)?)
  }
}

/// Pretty-printed JSON via `serde_json`.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

impl Codec for JsonCodec {
  fn name(&self) -> &'static str {
    "json"
  }

  fn encode<T: Serialize + ?Sized>(&self, value: &T) -> Result<Vec<u8>, CodecError> {
    let mut bytes = serde_json::to_vec_pretty(value)?;
    bytes.push(b'\n');
    Ok(bytes)
  }

  fn decode<T: DeserializeOwned>(&self, bytes: &[u8]) -> Result<T, CodecError> {
    Ok(serde_json::from_slice(bytes)?)
  }
}
