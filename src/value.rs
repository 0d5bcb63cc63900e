//! Value and octet types for the ZenDSL engine.
//!
//! `Octet` is the universal currency for cryptographic material: an
//! opaque byte buffer with an explicit length, produced by the codec or
//! by a primitive and consumed by the same. `Value` is the recursive
//! type every compartment holds; JSON is its only serialization.

use std::fmt;

use indexmap::IndexMap;
use serde_json::Number;

use crate::error::ExecError;

/// An opaque byte sequence. Buffers are owned and released on drop, on
/// every exit path.
#[derive(Clone, PartialEq, Eq)]
pub struct Octet {
    bytes: Vec<u8>,
}

impl Octet {
    pub fn from_bytes(bytes: impl Into<Vec<u8>>) -> Self {
        Octet { bytes: bytes.into() }
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Base58 rendering, the default encoding at the JSON boundary.
    pub fn to_base58(&self) -> String {
        bs58::encode(&self.bytes).into_string()
    }

    pub fn from_base58(s: &str) -> Result<Self, ExecError> {
        let bytes = bs58::decode(s)
            .into_vec()
            .map_err(|e| ExecError::Codec(format!("invalid base58: {e}")))?;
        Ok(Octet { bytes })
    }

    pub fn to_hex(&self) -> String {
        hex::encode(&self.bytes)
    }

    pub fn from_hex(s: &str) -> Result<Self, ExecError> {
        let bytes =
            hex::decode(s).map_err(|e| ExecError::Codec(format!("invalid hex: {e}")))?;
        Ok(Octet { bytes })
    }

    /// Interpret the buffer as UTF-8 text.
    pub fn to_text(&self) -> Result<String, ExecError> {
        String::from_utf8(self.bytes.clone())
            .map_err(|_| ExecError::Type("octet is not valid UTF-8 text".into()))
    }
}

impl fmt::Debug for Octet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Octet({}:{})", self.len(), self.to_base58())
    }
}

/// A DSL-level value: an octet, a JSON scalar, an ordered sequence, or
/// an insertion-ordered mapping. Mappings keep the order of the
/// underlying JSON document; the one-deep lookup rule depends on it.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Number(Number),
    String(String),
    Octet(Octet),
    Array(Vec<Value>),
    Map(IndexMap<String, Value>),
}

impl Value {
    /// Decode a JSON document into a value. Strings stay strings; octets
    /// only arise from primitives or explicit conversion.
    pub fn from_json(json: &serde_json::Value) -> Value {
        match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(*b),
            serde_json::Value::Number(n) => Value::Number(n.clone()),
            serde_json::Value::String(s) => Value::String(s.clone()),
            serde_json::Value::Array(items) => {
                Value::Array(items.iter().map(Value::from_json).collect())
            }
            serde_json::Value::Object(map) => Value::Map(
                map.iter()
                    .map(|(k, v)| (k.clone(), Value::from_json(v)))
                    .collect(),
            ),
        }
    }

    /// Encode back to JSON. Octets render as base58 strings.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::Null => serde_json::Value::Null,
            Value::Bool(b) => serde_json::Value::Bool(*b),
            Value::Number(n) => serde_json::Value::Number(n.clone()),
            Value::String(s) => serde_json::Value::String(s.clone()),
            Value::Octet(o) => serde_json::Value::String(o.to_base58()),
            Value::Array(items) => {
                serde_json::Value::Array(items.iter().map(Value::to_json).collect())
            }
            Value::Map(map) => serde_json::Value::Object(
                map.iter().map(|(k, v)| (k.clone(), v.to_json())).collect(),
            ),
        }
    }

    /// Coerce to raw bytes: octets pass through, strings contribute
    /// their UTF-8 bytes. Anything else has no byte representation.
    pub fn to_octet(&self) -> Result<Octet, ExecError> {
        match self {
            Value::Octet(o) => Ok(o.clone()),
            Value::String(s) => Ok(Octet::from_bytes(s.as_bytes())),
            other => Err(ExecError::Type(format!(
                "expected an octet or a string, found {}",
                other.kind()
            ))),
        }
    }

    /// Short name of the variant, for error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "boolean",
            Value::Number(_) => "number",
            Value::String(_) => "string",
            Value::Octet(_) => "octet",
            Value::Array(_) => "array",
            Value::Map(_) => "mapping",
        }
    }

    pub fn as_map(&self) -> Option<&IndexMap<String, Value>> {
        match self {
            Value::Map(m) => Some(m),
            _ => None,
        }
    }
}
