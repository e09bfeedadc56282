use crate::BoxError;
use bytes::Bytes;
use futures_util::future::BoxFuture;
use http::{HeaderMap, Method, StatusCode, Uri};

#[derive(Debug, thiserror::Error)]
pub enum ExecuteError {
    #[error("Failed to connect to '{url}': '{source}'")]
    Connect { url: Uri, source: BoxError },
    #[error("Request to '{url}' timed out")]
    Timeout { url: Uri },
    #[error("Transport error while calling '{url}': '{source}'")]
    Transport { url: Uri, source: BoxError },
    #[error("Failed to read the response body of '{url}': '{source}'")]
    Body { url: Uri, source: BoxError },
}

/// A fully materialized request.
#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub verb: Method,
    pub url: Uri,
    pub headers: HeaderMap,
    /// The encoded body. Always `None` for `GET`.
    pub body: Option<Bytes>,
}

/// Status and body as received, before any decoding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawResponse {
    pub status: StatusCode,
    pub body: Bytes,
}

impl RawResponse {
    pub fn new(status: StatusCode, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }
}

/// A pluggable transport.
pub trait RequestExecutor: Send + Sync {
    fn execute(&self, request: HttpRequest) -> BoxFuture<'_, Result<RawResponse, ExecuteError>>;
}
