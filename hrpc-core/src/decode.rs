//! # Response Decoder
//!
//! Turns a [`RawResponse`] into a [`Reply`] according to the [`ReturnShape`] of the method.
//!
//! ## How it works
//!
//! 1. A non-2xx status fails with [`DecodeError::RemoteInvocation`]. The codec is never called.
//! 2. `Void` methods discard the body without looking at it.
//! 3. Every other shape resolves its declared type in the [`TypeRegistry`] (this is where the
//!    inner type of a `ResponseEntity<T>` is looked up), decodes the body with the [`Codec`] and
//!    validates the value against the resolved type.
//!
//! Decoding failures carry the raw body as text so that it can be logged.
use crate::{
    binding::ReturnShape,
    codec::{Codec, TypeDecoder, TypeRef, TypeRegistry},
    http::RawResponse,
};
use http::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    #[error("Remote invocation failed with status {status}")]
    RemoteInvocation { status: StatusCode, body: String },
    #[error("Failed to decode the response as '{type_name}': {reason}")]
    ResponseDecode {
        type_name: String,
        reason: String,
        body: String,
    },
}

/// A response body together with the status it was received with.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseEntity<T> {
    #[serde(with = "status_code")]
    pub status: StatusCode,
    pub body: T,
}

/// The decoded outcome of a call.
#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    Unit,
    Sequence(Vec<Value>),
    Entity(ResponseEntity<Value>),
    Plain(Value),
}

impl Reply {
    /// The reply as a single JSON value. An entity becomes `{ "status": .., "body": .. }`.
    pub fn into_value(self) -> Value {
        match self {
            Reply::Unit => Value::Null,
            Reply::Sequence(items) => Value::Array(items),
            Reply::Entity(entity) => serde_json::json!({
                "status": entity.status.as_u16(),
                "body": entity.body,
            }),
            Reply::Plain(value) => value,
        }
    }
}

#[derive(Clone)]
pub struct ResponseDecoder {
    codec: Arc<dyn Codec>,
    types: TypeRegistry,
}

impl ResponseDecoder {
    pub fn new(codec: Arc<dyn Codec>, types: TypeRegistry) -> Self {
        Self { codec, types }
    }

    pub fn decode(&self, shape: &ReturnShape, response: RawResponse) -> Result<Reply, DecodeError> {
        let RawResponse { status, body } = response;

        if !status.is_success() {
            return Err(DecodeError::RemoteInvocation {
                status,
                body: lossy(&body),
            });
        }

        let reply = match shape {
            ReturnShape::Void => Reply::Unit,
            ReturnShape::Collection { element } => {
                let sequence = TypeRef::new(format!("Vec<{element}>"));
                let items =
                    self.decode_with(&sequence, element, &body, TypeDecoder::decode_items)?;
                Reply::Sequence(items)
            }
            ReturnShape::WrappedEntity { inner } => Reply::Entity(ResponseEntity {
                status,
                body: self.decode_as(inner, &body)?,
            }),
            ReturnShape::Plain(type_ref) => Reply::Plain(self.decode_as(type_ref, &body)?),
        };

        tracing::debug!(%status, ?shape, "Decoded response");

        Ok(reply)
    }

    fn decode_as(&self, type_ref: &TypeRef, body: &[u8]) -> Result<Value, DecodeError> {
        self.decode_with(type_ref, type_ref, body, TypeDecoder::decode)
    }

    /// Resolves `resolved` and hands the decoded body to `finish`. Failures are reported
    /// against `declared`.
    fn decode_with<T>(
        &self,
        declared: &TypeRef,
        resolved: &TypeRef,
        body: &[u8],
        finish: impl FnOnce(&TypeDecoder, Value) -> Result<T, serde_json::Error>,
    ) -> Result<T, DecodeError> {
        let failure = |reason: String| DecodeError::ResponseDecode {
            type_name: declared.to_string(),
            reason,
            body: lossy(body),
        };

        let decoder = self
            .types
            .resolve(resolved)
            .ok_or_else(|| failure("the type is not registered".to_string()))?;

        let value = self
            .codec
            .decode(body)
            .map_err(|e| failure(e.to_string()))?;

        finish(&decoder, value).map_err(|e| failure(e.to_string()))
    }
}

impl std::fmt::Debug for ResponseDecoder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResponseDecoder")
            .field("types", &self.types)
            .finish_non_exhaustive()
    }
}

fn lossy(body: &[u8]) -> String {
    String::from_utf8_lossy(body).into_owned()
}

mod status_code {
    use http::StatusCode;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(status: &StatusCode, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u16(status.as_u16())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<StatusCode, D::Error> {
        let code = u16::deserialize(deserializer)?;
        StatusCode::from_u16(code).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::codec::{CodecError, JsonCodec};
    use bytes::Bytes;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    struct User {
        id: u64,
        name: String,
    }

    #[derive(Default)]
    struct CountingCodec(AtomicUsize);

    impl Codec for CountingCodec {
        fn encode(&self, value: &Value) -> Result<Bytes, CodecError> {
            JsonCodec.encode(value)
        }

        fn decode(&self, bytes: &[u8]) -> Result<Value, CodecError> {
            self.0.fetch_add(1, Ordering::SeqCst);
            JsonCodec.decode(bytes)
        }
    }

    fn decoder() -> ResponseDecoder {
        let mut types = TypeRegistry::new();
        types.register::<User>("User");
        ResponseDecoder::new(Arc::new(JsonCodec), types)
    }

    fn ok(body: &str) -> RawResponse {
        RawResponse::new(StatusCode::OK, body.to_string())
    }

    #[test]
    fn plain_values_are_validated() {
        let reply = decoder()
            .decode(
                &ReturnShape::classify("User"),
                ok(r#"{"id": 1, "name": "ada"}"#),
            )
            .unwrap();

        assert_eq!(reply, Reply::Plain(json!({ "id": 1, "name": "ada" })));

        let error = decoder()
            .decode(&ReturnShape::classify("User"), ok(r#"{"id": "x"}"#))
            .unwrap_err();
        assert!(matches!(
            error,
            DecodeError::ResponseDecode { ref body, .. } if body == r#"{"id": "x"}"#
        ));
    }

    #[test]
    fn collections_decode_every_element() {
        let reply = decoder()
            .decode(
                &ReturnShape::classify("Vec<User>"),
                ok(r#"[{"id": 1, "name": "a"}, {"id": 2, "name": "b"}]"#),
            )
            .unwrap();

        let Reply::Sequence(items) = reply else {
            panic!("expected a sequence, got {reply:?}");
        };
        assert_eq!(items.len(), 2);

        let error = decoder()
            .decode(
                &ReturnShape::classify("Vec<User>"),
                ok(r#"{"id": 1, "name": "a"}"#),
            )
            .unwrap_err();
        assert!(matches!(
            error,
            DecodeError::ResponseDecode { ref type_name, ref reason, .. }
                if type_name == "Vec<User>" && reason.contains("expected a sequence")
        ));
    }

    #[test]
    fn entities_keep_their_status() {
        let reply = decoder()
            .decode(
                &ReturnShape::classify("ResponseEntity<User>"),
                RawResponse::new(StatusCode::CREATED, r#"{"id": 7, "name": "g"}"#),
            )
            .unwrap();

        let entity: ResponseEntity<User> = serde_json::from_value(reply.into_value()).unwrap();
        assert_eq!(entity.status, StatusCode::CREATED);
        assert_eq!(
            entity.body,
            User {
                id: 7,
                name: "g".into()
            }
        );
    }

    #[test]
    fn unknown_inner_types_fail_at_decode_time() {
        let error = decoder()
            .decode(&ReturnShape::classify("ResponseEntity<Ghost>"), ok("{}"))
            .unwrap_err();

        assert!(matches!(
            error,
            DecodeError::ResponseDecode { ref type_name, .. } if type_name == "Ghost"
        ));
    }

    #[test]
    fn void_never_touches_the_codec() {
        let codec = Arc::new(CountingCodec::default());
        let decoder = ResponseDecoder::new(codec.clone(), TypeRegistry::new());

        let reply = decoder
            .decode(&ReturnShape::Void, ok("definitely not json"))
            .unwrap();

        assert_eq!(reply, Reply::Unit);
        assert_eq!(codec.0.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn non_success_status_never_reaches_the_codec() {
        let codec = Arc::new(CountingCodec::default());
        let decoder = ResponseDecoder::new(codec.clone(), TypeRegistry::new());

        let error = decoder
            .decode(
                &ReturnShape::classify("Value"),
                RawResponse::new(StatusCode::SERVICE_UNAVAILABLE, "down"),
            )
            .unwrap_err();

        assert_eq!(
            error,
            DecodeError::RemoteInvocation {
                status: StatusCode::SERVICE_UNAVAILABLE,
                body: "down".into()
            }
        );
        assert_eq!(codec.0.load(Ordering::SeqCst), 0);
    }
}
