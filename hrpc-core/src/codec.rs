//! # Codec and Type Registry
//!
//! The core treats serialization as a black box behind the [`Codec`] trait: request bodies are
//! encoded from `serde_json::Value` into bytes and response bodies are decoded back into a
//! `serde_json::Value`.
//!
//! Declared return types are only known by name (e.g. `Order` or `Vec<Order>`). The
//! [`TypeRegistry`] resolves such a name into a [`TypeDecoder`] at decode time, which checks that
//! the decoded value really has the shape of the registered Rust type.
//!
//! ## How it works
//!
//! 1. **Encode**: the body argument (a `Value`) is serialized by the codec.
//! 2. **Decode**: raw bytes are parsed into a `Value` by the codec.
//! 3. **Validate**: the [`TypeDecoder`] round-trips the `Value` through the registered type,
//!    rejecting payloads that do not match and normalizing the ones that do.
use bytes::Bytes;
use regex::Regex;
use serde::{Serialize, de::DeserializeOwned};
use serde_json::Value;
use std::{
    collections::HashMap,
    fmt,
    sync::{Arc, LazyLock},
};

/// Outer type names that are decoded as ordered sequences.
pub const SEQUENCE_TYPES: &[&str] = &[
    "Vec",
    "VecDeque",
    "LinkedList",
    "HashSet",
    "BTreeSet",
    "List",
    "Set",
    "Collection",
];

/// Outer type name of the generic response envelope.
pub const ENVELOPE_TYPE: &str = "ResponseEntity";

static GENERIC_TYPE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*([A-Za-z_][A-Za-z0-9_:]*)\s*<(.*)>\s*$").expect("valid generic type pattern")
});

#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("Failed to encode value: '{0}'")]
    Encode(#[source] serde_json::Error),
    #[error("Failed to decode bytes: '{0}'")]
    Decode(#[source] serde_json::Error),
}

/// Black-box serializer used for request and response bodies.
pub trait Codec: Send + Sync {
    fn encode(&self, value: &Value) -> Result<Bytes, CodecError>;
    fn decode(&self, bytes: &[u8]) -> Result<Value, CodecError>;
}

/// The default [`Codec`], backed by `serde_json`.
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonCodec;

impl Codec for JsonCodec {
    fn encode(&self, value: &Value) -> Result<Bytes, CodecError> {
        serde_json::to_vec(value)
            .map(Bytes::from)
            .map_err(CodecError::Encode)
    }

    fn decode(&self, bytes: &[u8]) -> Result<Value, CodecError> {
        serde_json::from_slice(bytes).map_err(CodecError::Decode)
    }
}

/// A declared type name such as `Order`, `Vec<Order>` or `crate::model::Order`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TypeRef(String);

impl TypeRef {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into().trim().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Splits `Outer<Inner>` into its last outer path segment and the text between the first `<`
    /// and the last `>`.
    pub fn generic_parts(&self) -> Option<(&str, &str)> {
        let captures = GENERIC_TYPE.captures(&self.0)?;
        let outer = captures.get(1)?.as_str();
        let inner = captures.get(2)?.as_str().trim();
        Some((last_segment(outer), inner))
    }

    pub fn is_unit(&self) -> bool {
        self.0.is_empty() || self.0.replace(' ', "") == "()"
    }

    /// The element type when this names a sequence, e.g. `Order` for `Vec<Order>`.
    pub fn sequence_element(&self) -> Option<TypeRef> {
        match self.generic_parts() {
            Some((outer, inner)) if SEQUENCE_TYPES.contains(&outer) => Some(TypeRef::new(inner)),
            _ => None,
        }
    }

    /// The wrapped type when this names the response envelope, e.g. `Order` for
    /// `ResponseEntity<Order>`.
    pub fn envelope_inner(&self) -> Option<TypeRef> {
        match self.generic_parts() {
            Some((ENVELOPE_TYPE, inner)) => Some(TypeRef::new(inner)),
            _ => None,
        }
    }
}

impl fmt::Display for TypeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

fn last_segment(path: &str) -> &str {
    path.rsplit("::").next().unwrap_or(path)
}

/// Checks a decoded value against a registered type.
pub type Validator = Arc<dyn Fn(Value) -> Result<Value, serde_json::Error> + Send + Sync>;

/// A resolved decoder for a declared type.
#[derive(Clone)]
pub enum TypeDecoder {
    /// Accepts any JSON value.
    Any,
    Named(Validator),
    Sequence(Box<TypeDecoder>),
    Optional(Box<TypeDecoder>),
}

impl TypeDecoder {
    pub fn decode(&self, value: Value) -> Result<Value, serde_json::Error> {
        match self {
            TypeDecoder::Any => Ok(value),
            TypeDecoder::Named(validate) => validate(value),
            TypeDecoder::Optional(_) if value.is_null() => Ok(Value::Null),
            TypeDecoder::Optional(inner) => inner.decode(value),
            TypeDecoder::Sequence(element) => element.decode_items(value).map(Value::Array),
        }
    }

    /// Decodes `value` as an array whose items are each decoded by `self`.
    pub fn decode_items(&self, value: Value) -> Result<Vec<Value>, serde_json::Error> {
        match value {
            Value::Array(items) => items.into_iter().map(|item| self.decode(item)).collect(),
            other => Err(serde::de::Error::custom(format!(
                "expected a sequence, found {}",
                json_kind(&other)
            ))),
        }
    }
}

impl fmt::Debug for TypeDecoder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeDecoder::Any => f.write_str("Any"),
            TypeDecoder::Named(_) => f.write_str("Named(..)"),
            TypeDecoder::Sequence(inner) => f.debug_tuple("Sequence").field(inner).finish(),
            TypeDecoder::Optional(inner) => f.debug_tuple("Optional").field(inner).finish(),
        }
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Maps declared type names to decoders.
///
/// Primitive types, `String` and `Value`/`Json` are always available. Application types must be
/// registered with [`TypeRegistry::register`] before a method returning them is decoded.
#[derive(Clone)]
pub struct TypeRegistry {
    types: HashMap<String, TypeDecoder>,
}

impl TypeRegistry {
    /// A registry holding only the built-in types.
    pub fn new() -> Self {
        let mut registry = Self {
            types: HashMap::new(),
        };

        registry.insert("Value", TypeDecoder::Any);
        registry.insert("Json", TypeDecoder::Any);
        registry.register::<String>("String");
        registry.register::<String>("str");
        registry.register::<bool>("bool");
        registry.register::<i8>("i8");
        registry.register::<i16>("i16");
        registry.register::<i32>("i32");
        registry.register::<i64>("i64");
        registry.register::<isize>("isize");
        registry.register::<u8>("u8");
        registry.register::<u16>("u16");
        registry.register::<u32>("u32");
        registry.register::<u64>("u64");
        registry.register::<usize>("usize");
        registry.register::<f32>("f32");
        registry.register::<f64>("f64");
        registry
    }

    fn insert(&mut self, name: &str, decoder: TypeDecoder) {
        self.types.insert(name.to_string(), decoder);
    }

    /// Registers `T` under `name`. Decoding a value of that name deserializes it into `T` and
    /// serializes it back.
    pub fn register<T>(&mut self, name: &str)
    where
        T: DeserializeOwned + Serialize + 'static,
    {
        let validator: Validator = Arc::new(|value| {
            let typed: T = serde_json::from_value(value)?;
            serde_json::to_value(typed)
        });
        self.insert(name.trim(), TypeDecoder::Named(validator));
    }

    pub fn contains(&self, name: &str) -> bool {
        self.types.contains_key(name.trim())
    }

    /// Resolves a declared type into a decoder.
    ///
    /// Sequences (`Vec<T>`, `HashSet<T>`, ...) and `Option<T>` are resolved recursively. Plain
    /// names are looked up as written first and by their last path segment second.
    pub fn resolve(&self, type_ref: &TypeRef) -> Option<TypeDecoder> {
        if let Some(element) = type_ref.sequence_element() {
            return self
                .resolve(&element)
                .map(|decoder| TypeDecoder::Sequence(Box::new(decoder)));
        }

        if let Some(("Option", inner)) = type_ref.generic_parts() {
            return self
                .resolve(&TypeRef::new(inner))
                .map(|decoder| TypeDecoder::Optional(Box::new(decoder)));
        }

        let name = type_ref.as_str();
        self.types
            .get(name)
            .or_else(|| self.types.get(last_segment(name)))
            .cloned()
    }
}

impl Default for TypeRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for TypeRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<_> = self.types.keys().collect();
        names.sort();
        f.debug_struct("TypeRegistry").field("types", &names).finish()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use serde::Deserialize;
    use serde_json::json;

    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    struct Health {
        status: String,
        #[serde(default)]
        uptime: u64,
    }

    #[test]
    fn json_codec_round_trips_values() {
        let value = json!({ "status": "UP", "checks": [1, 2, 3], "nested": { "ok": true } });
        let bytes = JsonCodec.encode(&value).unwrap();

        assert_eq!(JsonCodec.decode(&bytes).unwrap(), value);
    }

    #[test]
    fn json_codec_rejects_malformed_bytes() {
        assert!(matches!(
            JsonCodec.decode(b"{ not json"),
            Err(CodecError::Decode(_))
        ));
    }

    #[test]
    fn type_refs_expose_generic_parts() {
        let entity = TypeRef::new("ResponseEntity<com::model::Health>");
        assert_eq!(
            entity.envelope_inner(),
            Some(TypeRef::new("com::model::Health"))
        );

        let nested = TypeRef::new("std::collections::Vec<Vec<Health>>");
        assert_eq!(nested.sequence_element(), Some(TypeRef::new("Vec<Health>")));

        assert!(TypeRef::new(" ( ) ").is_unit());
        assert_eq!(TypeRef::new("Health").generic_parts(), None);
    }

    #[test]
    fn registered_types_validate_and_normalize() {
        let mut registry = TypeRegistry::new();
        registry.register::<Health>("Health");

        let decoder = registry.resolve(&TypeRef::new("model::Health")).unwrap();

        assert_eq!(
            decoder.decode(json!({ "status": "UP" })).unwrap(),
            json!({ "status": "UP", "uptime": 0 })
        );
        assert!(decoder.decode(json!({ "uptime": 3 })).is_err());
    }

    #[test]
    fn sequences_and_options_resolve_recursively() {
        let mut registry = TypeRegistry::new();
        registry.register::<Health>("Health");

        let decoder = registry
            .resolve(&TypeRef::new("Vec<Option<Health>>"))
            .unwrap();

        assert_eq!(
            decoder
                .decode(json!([null, { "status": "DOWN", "uptime": 1 }]))
                .unwrap(),
            json!([null, { "status": "DOWN", "uptime": 1 }])
        );
        assert!(decoder.decode(json!({ "status": "DOWN" })).is_err());
    }

    #[test]
    fn unknown_types_do_not_resolve() {
        let registry = TypeRegistry::new();

        assert!(registry.resolve(&TypeRef::new("Ghost")).is_none());
        assert!(registry.resolve(&TypeRef::new("Vec<Ghost>")).is_none());
        assert!(registry.resolve(&TypeRef::new("Vec<i64>")).is_some());
    }
}
