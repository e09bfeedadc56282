//! # Materialization
//!
//! Combines an immutable [`MethodDescriptor`] with the live arguments of one call into a
//! [`CallBindingContext`]. Every call gets its own context, the descriptor is only read.
//!
//! ## How it works
//!
//! 1. The URL skeleton is copied into the context.
//! 2. Path placeholders are substituted, aliased ones first.
//! 3. Aliased query placeholders (`alias={alias}`) are substituted.
//! 4. Any placeholder still present fails the call.
//! 5. Positional query parameters, then the entries of map slots, then interceptor queries are
//!    appended with `?` or `&`.
//! 6. Interceptor headers are collected, then argument headers, so arguments win.
//! 7. The body argument is kept as is until the request is encoded.
//!
//! Values substituted into the URL are percent-encoded. Strings are used verbatim, other JSON
//! values by their JSON text. Null query and header arguments are skipped.
use super::descriptor::MethodDescriptor;
use crate::{
    codec::{Codec, CodecError},
    declaration::Verb,
    http::HttpRequest,
    interceptor::RequestContext,
};
use http::{
    HeaderMap, HeaderName, HeaderValue, Uri,
    header::{InvalidHeaderName, InvalidHeaderValue},
    uri::InvalidUri,
};
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use regex::Regex;
use serde_json::Value;
use std::{str::FromStr, sync::LazyLock};

/// Everything outside the RFC 3986 unreserved set is encoded.
const COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

static PLACEHOLDER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{([^{}]*)\}").expect("valid placeholder pattern"));

#[derive(Debug, thiserror::Error)]
pub enum BindError {
    #[error("Expected {expected} arguments but the call provided {actual}")]
    ArityMismatch { expected: usize, actual: usize },
    #[error("Placeholder '{{{0}}}' has no bound argument")]
    UnresolvedPlaceholder(String),
    #[error("Path variable '{0}' is null")]
    NullPathVariable(String),
    #[error("Query map argument at position {position} is not a map")]
    NotAMap { position: usize },
    #[error("Invalid request URL '{url}': '{source}'")]
    InvalidUrl { url: String, source: InvalidUri },
    #[error("Invalid header name '{key}': '{source}'")]
    InvalidHeaderName {
        key: String,
        source: InvalidHeaderName,
    },
    #[error("Invalid header value for key '{key}': '{source}'")]
    InvalidHeaderValue {
        key: String,
        source: InvalidHeaderValue,
    },
    #[error("Failed to encode the request body: '{0}'")]
    Body(#[from] CodecError),
}

/// The request state of a single call.
#[derive(Debug, Clone, PartialEq)]
pub struct CallBindingContext {
    url: String,
    headers: Vec<(String, String)>,
    body: Option<Value>,
}

impl CallBindingContext {
    /// Binds `args` to `descriptor`, adding what the interceptors put in `context`.
    pub fn materialize(
        descriptor: &MethodDescriptor,
        args: &[Value],
        context: &RequestContext,
    ) -> Result<Self, BindError> {
        if args.len() != descriptor.arity() {
            return Err(BindError::ArityMismatch {
                expected: descriptor.arity(),
                actual: args.len(),
            });
        }

        let mut url = descriptor.url_skeleton().to_string();

        for (key, position) in descriptor.path_slots().iter() {
            let value = &args[position];
            if value.is_null() {
                return Err(BindError::NullPathVariable(key.to_string()));
            }
            url = url.replace(&placeholder(key), &encode(&stringify(value)));
        }

        for (alias, &position) in &descriptor.query_slots().aliases {
            let value = match &args[position] {
                Value::Null => String::new(),
                value => encode(&stringify(value)),
            };
            url = url.replace(&placeholder(alias), &value);
        }

        // Positional slots fill their placeholder when the template has one, otherwise append.
        let mut appended = Vec::new();
        for (name, position) in &descriptor.query_slots().positional {
            let key = placeholder(name);
            if url.contains(&key) {
                let value = match &args[*position] {
                    Value::Null => String::new(),
                    value => encode(&stringify(value)),
                };
                url = url.replace(&key, &value);
            } else {
                appended.push((name, *position));
            }
        }

        if let Some(captures) = PLACEHOLDER.captures(&url) {
            let name = captures.get(1).map_or("", |m| m.as_str());
            return Err(BindError::UnresolvedPlaceholder(name.to_string()));
        }

        for (name, position) in appended {
            let value = &args[position];
            if !value.is_null() {
                append_query(&mut url, name, &stringify(value));
            }
        }

        for &position in descriptor.query_map_slots() {
            match &args[position] {
                Value::Null => {}
                Value::Object(entries) => {
                    for (key, value) in entries {
                        if !value.is_null() {
                            append_query(&mut url, key, &stringify(value));
                        }
                    }
                }
                _ => return Err(BindError::NotAMap { position }),
            }
        }

        for (key, value) in context.queries() {
            append_query(&mut url, key, value);
        }

        let mut headers: Vec<(String, String)> = context
            .headers()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();

        for (key, position) in descriptor.header_slots().iter() {
            let value = &args[position];
            if !value.is_null() {
                headers.push((key.to_string(), stringify(value)));
            }
        }

        let body = descriptor
            .body_index()
            .map(|position| args[position].clone())
            .filter(|value| !value.is_null());

        Ok(Self { url, headers, body })
    }

    /// Path and query, relative to the host.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Headers in application order. Later entries override earlier ones with the same name.
    pub fn headers(&self) -> &[(String, String)] {
        &self.headers
    }

    pub fn body(&self) -> Option<&Value> {
        self.body.as_ref()
    }

    /// The absolute URL for `protocol` and `host`.
    pub fn full_url(&self, protocol: &str, host: &str) -> String {
        format!("{protocol}://{host}/{}", self.url)
    }

    /// Turns the context into a transport request. `GET` never carries a body.
    pub fn into_request(
        self,
        verb: Verb,
        protocol: &str,
        host: &str,
        codec: &dyn Codec,
    ) -> Result<HttpRequest, BindError> {
        let full_url = self.full_url(protocol, host);
        let url = Uri::from_str(&full_url).map_err(|source| BindError::InvalidUrl {
            url: full_url.clone(),
            source,
        })?;

        let headers = build_headers(self.headers)?;

        let body = match self.body {
            Some(value) if verb.carries_body() => Some(codec.encode(&value)?),
            _ => None,
        };

        Ok(HttpRequest {
            verb: verb.to_http(),
            url,
            headers,
            body,
        })
    }
}

fn build_headers(entries: Vec<(String, String)>) -> Result<HeaderMap, BindError> {
    let mut headers = HeaderMap::new();
    for (k, v) in entries {
        let key = HeaderName::from_str(&k).map_err(|source| BindError::InvalidHeaderName {
            key: k.clone(),
            source,
        })?;
        let value = HeaderValue::from_str(&v)
            .map_err(|source| BindError::InvalidHeaderValue { key: k, source })?;
        headers.insert(key, value);
    }
    Ok(headers)
}

fn placeholder(key: &str) -> String {
    format!("{{{key}}}")
}

fn stringify(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

fn encode(value: &str) -> String {
    utf8_percent_encode(value, COMPONENT).to_string()
}

fn append_query(url: &mut String, key: &str, value: &str) {
    url.push(if url.contains('?') { '&' } else { '?' });
    url.push_str(&encode(key));
    url.push('=');
    url.push_str(&encode(value));
}
