//! # HRPC Client
//!
//! The invocation dispatcher. An [`HrpcClient`] holds an explicit registry of declared methods
//! and turns each `invoke` into one HTTP exchange.
//!
//! ## How it works
//!
//! For every call:
//!
//! 1. The method is looked up in the registry.
//! 2. Its [`MethodDescriptor`] is fetched from a per-method cache, or built on first use. A build
//!    runs at most once at a time and a failed build is not cached.
//! 3. When the host is dynamic, the [`ClusterHostResolver`] picks a route of the service.
//! 4. The interceptors fill a fresh [`RequestContext`](crate::interceptor::RequestContext) and the
//!    arguments are materialized into a new [`CallBindingContext`].
//! 5. The request is sent by the configured [`RequestExecutor`].
//! 6. The [`ResponseDecoder`] turns the response into a [`Reply`] according to the return shape.
//!
//! Any failure is wrapped into an [`InvokeError`] carrying the method and, when known, the URL.
//! The dispatcher never retries.
//!
//! ## Example
//!
//! ```rust,no_run
//! use hrpc_core::{
//!     client::HrpcClient,
//!     config::ClientConfig,
//!     declaration::{Endpoint, InterfaceDeclaration, MethodDeclaration, MethodId, ParameterDeclaration},
//! };
//! use serde_json::json;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let client = HrpcClient::builder(ClientConfig::default())
//!     .interface(
//!         InterfaceDeclaration::new("HealthClient").method(
//!             MethodDeclaration::get("check", Endpoint::fixed("http", "localhost:8080", "/health/{probe}"))
//!                 .parameter(ParameterDeclaration::path("probe", None))
//!                 .returns("Value"),
//!         ),
//!     )
//!     .build()?;
//!
//! let reply = client
//!     .invoke(&MethodId::new("HealthClient", "check"), &[json!("live")])
//!     .await?;
//! println!("{reply:?}");
//! # Ok(())
//! # }
//! ```
mod builder;
mod error;

pub use builder::{ClientBuildError, HrpcClientBuilder};
pub use error::{CallError, ErrorCategory, InvokeError};

use crate::{
    binding::{BinderChain, CallBindingContext, DescriptorBuilder, HostBinding, MethodDescriptor},
    cluster::ClusterHostResolver,
    codec::Codec,
    config::ClientConfig,
    decode::{Reply, ResponseDecoder},
    declaration::{MethodDeclaration, MethodId},
    http::RequestExecutor,
    interceptor::InterceptorChain,
};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::{collections::HashMap, fmt, sync::Arc};
use tokio::sync::OnceCell;

/// A registered method and its lazily built descriptor.
struct MethodEntry {
    service: Option<String>,
    declaration: MethodDeclaration,
    descriptor: OnceCell<Arc<MethodDescriptor>>,
}

/// Dispatches calls to declared HTTP methods. Safe to share between tasks.
pub struct HrpcClient {
    methods: HashMap<MethodId, MethodEntry>,
    binders: BinderChain,
    resolver: ClusterHostResolver,
    interceptors: InterceptorChain,
    executor: Arc<dyn RequestExecutor>,
    codec: Arc<dyn Codec>,
    decoder: ResponseDecoder,
}

impl HrpcClient {
    pub fn builder(config: ClientConfig) -> HrpcClientBuilder {
        HrpcClientBuilder::new(config)
    }

    /// Invokes `method` with `args`, given in declaration order.
    ///
    /// # Arguments
    ///
    /// * `method` - A method registered on the builder.
    /// * `args` - One JSON value per declared parameter. `null` stands for an absent value.
    ///
    /// # Returns
    ///
    /// * `Ok(Reply)` - The response decoded according to the declared return type.
    /// * `Err(InvokeError)` - The failed method, the URL when one was built, and the cause.
    pub async fn invoke(&self, method: &MethodId, args: &[Value]) -> Result<Reply, InvokeError> {
        let mut url = None;
        let result = self.dispatch(method, args, &mut url).await;

        result.map_err(|source| InvokeError {
            method: method.clone(),
            url,
            source,
        })
    }

    /// Invokes `method` and deserializes the reply into `T`.
    ///
    /// Fails like [`HrpcClient::invoke`], or with [`CallError::Convert`] when the reply does not
    /// fit `T`.
    ///
    /// A `ResponseEntity<T>` return deserializes into [`crate::decode::ResponseEntity`], a unit
    /// return into `()`.
    pub async fn invoke_as<T>(&self, method: &MethodId, args: &[Value]) -> Result<T, InvokeError>
    where
        T: DeserializeOwned,
    {
        let mut url = None;
        let result = async {
            let reply = self.dispatch(method, args, &mut url).await?;
            serde_json::from_value(reply.into_value()).map_err(CallError::Convert)
        }
        .await;

        result.map_err(|source| InvokeError {
            method: method.clone(),
            url,
            source,
        })
    }

    /// Registered methods, in no particular order.
    pub fn methods(&self) -> impl Iterator<Item = &MethodId> {
        self.methods.keys()
    }

    /// The descriptor of `method`, if it was already built by a previous call.
    pub fn cached_descriptor(&self, method: &MethodId) -> Option<Arc<MethodDescriptor>> {
        self.methods.get(method)?.descriptor.get().cloned()
    }

    async fn dispatch(
        &self,
        id: &MethodId,
        args: &[Value],
        url: &mut Option<String>,
    ) -> Result<Reply, CallError> {
        let entry = self.methods.get(id).ok_or(CallError::UnknownMethod)?;
        let descriptor = self.descriptor(id, entry).await?;

        let host = match descriptor.host() {
            HostBinding::Static(host) => host.clone(),
            HostBinding::Dynamic { service } => self.resolver.resolve(service)?.host(),
        };

        let context = self.interceptors.intercept(id);
        let bound = CallBindingContext::materialize(&descriptor, args, &context)?;
        *url = Some(bound.full_url(descriptor.protocol(), &host));

        let request = bound.into_request(
            descriptor.verb(),
            descriptor.protocol(),
            &host,
            self.codec.as_ref(),
        )?;

        tracing::debug!(method = %id, verb = %request.verb, url = %request.url, "Sending request");

        let response = self.executor.execute(request).await?;

        tracing::debug!(method = %id, status = %response.status, "Received response");

        Ok(self.decoder.decode(descriptor.return_shape(), response)?)
    }

    async fn descriptor(
        &self,
        id: &MethodId,
        entry: &MethodEntry,
    ) -> Result<Arc<MethodDescriptor>, CallError> {
        let descriptor = entry
            .descriptor
            .get_or_try_init(|| async {
                DescriptorBuilder::new(&self.binders)
                    .build(&id.interface, entry.service.as_deref(), &entry.declaration)
                    .map(Arc::new)
            })
            .await?;

        Ok(descriptor.clone())
    }
}

impl fmt::Debug for HrpcClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HrpcClient")
            .field("methods", &self.methods.keys().collect::<Vec<_>>())
            .field("binders", &self.binders)
            .field("resolver", &self.resolver)
            .field("interceptors", &self.interceptors)
            .finish_non_exhaustive()
    }
}
