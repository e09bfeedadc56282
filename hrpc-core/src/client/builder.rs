use super::{HrpcClient, MethodEntry};
use crate::{
    binding::{BinderChain, ParameterBinder},
    cluster::{
        ClusterHostResolver, ClusterStrategy, ClusterStrategyKind,
        strategy::discover_local_address,
    },
    codec::{Codec, JsonCodec, TypeRegistry},
    config::{ClientConfig, ConfigError, DEFAULT_EXECUTOR},
    decode::ResponseDecoder,
    declaration::{InterfaceDeclaration, MethodId},
    http::RequestExecutor,
    interceptor::{InterceptorChain, RequestInterceptor},
};
use serde::{Serialize, de::DeserializeOwned};
use std::{collections::HashMap, net::IpAddr, sync::Arc};
use tokio::sync::OnceCell;

/// Errors that can occur when building an [`HrpcClient`].
#[derive(Debug, thiserror::Error)]
pub enum ClientBuildError {
    #[error("Invalid configuration: '{0}'")]
    Config(#[from] ConfigError),
    #[error("No executor registered under '{0}'")]
    ExecutorNotFound(String),
    #[cfg(feature = "reqwest")]
    #[error("Failed to create the default executor: '{0}'")]
    DefaultExecutor(#[source] reqwest::Error),
    #[error("Method '{0}' is declared more than once")]
    DuplicateMethod(MethodId),
}

/// Collects declarations and extensions, then builds an [`HrpcClient`].
pub struct HrpcClientBuilder {
    config: ClientConfig,
    interfaces: Vec<InterfaceDeclaration>,
    executors: HashMap<String, Arc<dyn RequestExecutor>>,
    strategies: HashMap<ClusterStrategyKind, Arc<dyn ClusterStrategy>>,
    interceptors: InterceptorChain,
    binders: BinderChain,
    codec: Arc<dyn Codec>,
    types: TypeRegistry,
    caller: Option<IpAddr>,
}

impl HrpcClientBuilder {
    pub fn new(config: ClientConfig) -> Self {
        Self {
            config,
            interfaces: Vec::new(),
            executors: HashMap::new(),
            strategies: HashMap::new(),
            interceptors: InterceptorChain::default(),
            binders: BinderChain::default(),
            codec: Arc::new(JsonCodec),
            types: TypeRegistry::new(),
            caller: None,
        }
    }

    pub fn interface(mut self, interface: InterfaceDeclaration) -> Self {
        self.interfaces.push(interface);
        self
    }

    /// Registers a transport under `key`. The configuration's `executor` selects which one is
    /// used. Registering under the default key replaces the built-in executor.
    pub fn register_executor(mut self, key: &str, executor: Arc<dyn RequestExecutor>) -> Self {
        self.executors.insert(key.to_string(), executor);
        self
    }

    /// Registers a shared strategy instance under `key`.
    ///
    /// Used for `CUSTOM:<name>` keys, and to replace a built-in algorithm.
    pub fn register_cluster_strategy(
        mut self,
        key: ClusterStrategyKind,
        strategy: Arc<dyn ClusterStrategy>,
    ) -> Self {
        self.strategies.insert(key, strategy);
        self
    }

    pub fn interceptor(mut self, interceptor: Arc<dyn RequestInterceptor>) -> Self {
        self.interceptors.register(interceptor);
        self
    }

    /// Adds a binder to the chain, ordered by [`ParameterBinder::order`].
    pub fn binder(mut self, binder: impl ParameterBinder + 'static) -> Self {
        self.binders = self.binders.register(binder);
        self
    }

    pub fn codec(mut self, codec: Arc<dyn Codec>) -> Self {
        self.codec = codec;
        self
    }

    /// Makes `T` available as a declared return type under `name`.
    pub fn register_type<T>(mut self, name: &str) -> Self
    where
        T: DeserializeOwned + Serialize + 'static,
    {
        self.types.register::<T>(name);
        self
    }

    /// Overrides the address hashed by the `HASH` strategy.
    pub fn caller_address(mut self, address: IpAddr) -> Self {
        self.caller = Some(address);
        self
    }

    /// Creates the client.
    ///
    /// # Returns
    ///
    /// * `Ok(HrpcClient)` - The client, with no descriptor built yet.
    /// * `Err(ClientBuildError)` - If the topology is invalid, the configured executor is not
    ///   registered or two interfaces declare the same method.
    pub fn build(mut self) -> Result<HrpcClient, ClientBuildError> {
        let topology = self.config.topology()?;
        let executor = self.executor()?;

        let caller = self.caller.unwrap_or_else(|| {
            let hashed = topology.services().any(|info| {
                info.strategy.as_ref().unwrap_or(&self.config.cluster_strategy)
                    == &ClusterStrategyKind::Hash
            });
            if hashed {
                discover_local_address()
            } else {
                IpAddr::from([127, 0, 0, 1])
            }
        });

        let resolver = ClusterHostResolver::new(
            topology,
            &self.config.cluster_strategy,
            &self.strategies,
            caller,
        );

        let mut methods = HashMap::new();
        for interface in self.interfaces {
            for declaration in interface.methods {
                let id = MethodId::new(&interface.name, &declaration.name);
                if methods.contains_key(&id) {
                    return Err(ClientBuildError::DuplicateMethod(id));
                }
                methods.insert(
                    id,
                    MethodEntry {
                        service: interface.service.clone(),
                        declaration,
                        descriptor: OnceCell::new(),
                    },
                );
            }
        }

        tracing::debug!(
            methods = methods.len(),
            executor = %self.config.executor,
            default_strategy = %self.config.cluster_strategy,
            "Built HRPC client"
        );

        Ok(HrpcClient {
            methods,
            binders: self.binders,
            resolver,
            interceptors: self.interceptors,
            executor,
            decoder: ResponseDecoder::new(self.codec.clone(), self.types),
            codec: self.codec,
        })
    }

    fn executor(&mut self) -> Result<Arc<dyn RequestExecutor>, ClientBuildError> {
        let key = &self.config.executor;

        if let Some(executor) = self.executors.remove(key) {
            return Ok(executor);
        }

        if key == DEFAULT_EXECUTOR {
            if let Some(executor) = default_executor(&self.config)? {
                return Ok(executor);
            }
        }

        Err(ClientBuildError::ExecutorNotFound(key.clone()))
    }
}

#[cfg(feature = "reqwest")]
fn default_executor(
    config: &ClientConfig,
) -> Result<Option<Arc<dyn RequestExecutor>>, ClientBuildError> {
    let executor = crate::http::ReqwestExecutor::from_config(config)
        .map_err(ClientBuildError::DefaultExecutor)?;
    Ok(Some(Arc::new(executor)))
}

#[cfg(not(feature = "reqwest"))]
fn default_executor(
    _: &ClientConfig,
) -> Result<Option<Arc<dyn RequestExecutor>>, ClientBuildError> {
    Ok(None)
}

impl std::fmt::Debug for HrpcClientBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HrpcClientBuilder")
            .field("config", &self.config)
            .field("interfaces", &self.interfaces.len())
            .field("executors", &self.executors.keys().collect::<Vec<_>>())
            .field("strategies", &self.strategies.keys().collect::<Vec<_>>())
            .field("interceptors", &self.interceptors)
            .field("binders", &self.binders)
            .field("types", &self.types)
            .finish_non_exhaustive()
    }
}
