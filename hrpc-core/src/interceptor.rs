//! # Request Interceptors
//!
//! Interceptors run once per call, before the arguments are materialized, and may contribute
//! extra query parameters and headers through a fresh [`RequestContext`].
//!
//! * Interceptor queries are appended after the argument-bound query parameters.
//! * Interceptor headers are applied first, so an argument-bound header with the same name wins.
use crate::declaration::MethodId;
use std::{collections::BTreeMap, sync::Arc};

/// Per-call attributes collected from the interceptor chain. Never shared between calls.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestContext {
    queries: BTreeMap<String, String>,
    headers: BTreeMap<String, String>,
}

impl RequestContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_query(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.queries.insert(key.into(), value.into());
    }

    pub fn set_header(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.headers.insert(key.into(), value.into());
    }

    pub fn query(&self, key: &str) -> Option<&str> {
        self.queries.get(key).map(String::as_str)
    }

    pub fn header(&self, key: &str) -> Option<&str> {
        self.headers.get(key).map(String::as_str)
    }

    pub fn queries(&self) -> impl Iterator<Item = (&str, &str)> {
        self.queries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn headers(&self) -> impl Iterator<Item = (&str, &str)> {
        self.headers.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

pub trait RequestInterceptor: Send + Sync {
    /// Lower orders run first.
    fn order(&self) -> i32 {
        i32::MAX
    }

    fn intercept(&self, method: &MethodId, context: &mut RequestContext);
}

impl<F> RequestInterceptor for F
where
    F: Fn(&MethodId, &mut RequestContext) + Send + Sync,
{
    fn intercept(&self, method: &MethodId, context: &mut RequestContext) {
        self(method, context)
    }
}

/// Interceptors sorted by [`RequestInterceptor::order`].
#[derive(Clone, Default)]
pub struct InterceptorChain {
    interceptors: Vec<Arc<dyn RequestInterceptor>>,
}

impl InterceptorChain {
    pub fn register(&mut self, interceptor: Arc<dyn RequestInterceptor>) {
        self.interceptors.push(interceptor);
        self.interceptors.sort_by_key(|i| i.order());
    }

    /// Runs every interceptor against a new context.
    pub fn intercept(&self, method: &MethodId) -> RequestContext {
        let mut context = RequestContext::new();
        for interceptor in &self.interceptors {
            interceptor.intercept(method, &mut context);
        }
        context
    }

    pub fn len(&self) -> usize {
        self.interceptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.interceptors.is_empty()
    }
}

impl std::fmt::Debug for InterceptorChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InterceptorChain")
            .field("len", &self.interceptors.len())
            .finish()
    }
}
