//! # Client Configuration
//!
//! Timeouts, executor selection, the default cluster strategy and the service topology.
//!
//! The configuration is plain serde data and is usually loaded from a JSON document:
//!
//! ```json
//! {
//!   "connectTimeoutSeconds": 6,
//!   "readTimeoutSeconds": 60,
//!   "writeTimeoutSeconds": 60,
//!   "executor": "reqwest",
//!   "clusterStrategy": "POLLING",
//!   "services": [
//!     {
//!       "service": "provider",
//!       "strategy": "WEIGHT_RANDOM",
//!       "routes": [
//!         { "address": "10.0.0.1", "port": 8080, "weight": 3 },
//!         { "address": "10.0.0.2", "port": 8080 }
//!       ]
//!     }
//!   ]
//! }
//! ```
use crate::cluster::ClusterStrategyKind;
use serde::{Deserialize, Serialize};
use std::{
    collections::HashMap,
    net::IpAddr,
    path::{Path, PathBuf},
    time::Duration,
};

/// Key of the executor registered by default.
pub const DEFAULT_EXECUTOR: &str = "reqwest";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': '{source}'")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to parse config: '{0}'")]
    Parse(#[from] serde_json::Error),
    #[error("Service '{0}' is declared more than once")]
    DuplicateService(String),
    #[error("Route '{route}' of service '{service}' has a weight of zero")]
    ZeroWeight { service: String, route: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ClientConfig {
    pub connect_timeout_seconds: u64,
    pub read_timeout_seconds: u64,
    pub write_timeout_seconds: u64,
    /// Key of the registered executor to use.
    pub executor: String,
    /// Strategy of every service that does not name its own.
    pub cluster_strategy: ClusterStrategyKind,
    pub services: Vec<ServiceInfo>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            connect_timeout_seconds: 6,
            read_timeout_seconds: 60,
            write_timeout_seconds: 60,
            executor: DEFAULT_EXECUTOR.to_string(),
            cluster_strategy: ClusterStrategyKind::Polling,
            services: Vec::new(),
        }
    }
}

impl ClientConfig {
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&content)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_seconds)
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_secs(self.read_timeout_seconds)
    }

    pub fn write_timeout(&self) -> Duration {
        Duration::from_secs(self.write_timeout_seconds)
    }

    /// Upper bound of a whole exchange: connect, write and read.
    pub fn total_timeout(&self) -> Duration {
        self.connect_timeout()
            .saturating_add(self.write_timeout())
            .saturating_add(self.read_timeout())
    }

    /// Adds a service to the topology.
    pub fn service(mut self, service: ServiceInfo) -> Self {
        self.services.push(service);
        self
    }

    /// Validates the declared services and indexes them by name.
    pub fn topology(&self) -> Result<ServiceTopology, ConfigError> {
        ServiceTopology::new(self.services.clone())
    }
}

/// The routes of one logical service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceInfo {
    pub service: String,
    /// Overrides [`ClientConfig::cluster_strategy`] for this service.
    #[serde(default)]
    pub strategy: Option<ClusterStrategyKind>,
    #[serde(default)]
    pub routes: Vec<ServiceRoute>,
}

impl ServiceInfo {
    pub fn new(service: &str) -> Self {
        Self {
            service: service.to_string(),
            strategy: None,
            routes: Vec::new(),
        }
    }

    pub fn strategy(mut self, strategy: ClusterStrategyKind) -> Self {
        self.strategy = Some(strategy);
        self
    }

    pub fn route(mut self, route: ServiceRoute) -> Self {
        self.routes.push(route);
        self
    }
}

/// One concrete endpoint behind a logical service.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ServiceRoute {
    pub address: String,
    pub port: u16,
    #[serde(default = "default_weight")]
    pub weight: u32,
}

fn default_weight() -> u32 {
    1
}

impl ServiceRoute {
    pub fn new(address: &str, port: u16) -> Self {
        Self {
            address: address.to_string(),
            port,
            weight: default_weight(),
        }
    }

    pub fn weighted(address: &str, port: u16, weight: u32) -> Self {
        Self {
            weight,
            ..Self::new(address, port)
        }
    }

    /// `address:port`, with IPv6 literals bracketed.
    pub fn host(&self) -> String {
        match self.address.parse::<IpAddr>() {
            Ok(IpAddr::V6(ip)) => format!("[{ip}]:{}", self.port),
            _ => format!("{}:{}", self.address, self.port),
        }
    }
}

/// Validated services indexed by name. Immutable once built.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ServiceTopology {
    services: HashMap<String, ServiceInfo>,
}

impl ServiceTopology {
    pub fn new(services: Vec<ServiceInfo>) -> Result<Self, ConfigError> {
        let mut indexed = HashMap::with_capacity(services.len());

        for info in services {
            if let Some(route) = info.routes.iter().find(|r| r.weight == 0) {
                return Err(ConfigError::ZeroWeight {
                    service: info.service.clone(),
                    route: route.host(),
                });
            }

            if indexed.contains_key(&info.service) {
                return Err(ConfigError::DuplicateService(info.service));
            }
            indexed.insert(info.service.clone(), info);
        }

        Ok(Self { services: indexed })
    }

    pub fn get(&self, service: &str) -> Option<&ServiceInfo> {
        self.services.get(service)
    }

    pub fn services(&self) -> impl Iterator<Item = &ServiceInfo> {
        self.services.values()
    }

    pub fn len(&self) -> usize {
        self.services.len()
    }

    pub fn is_empty(&self) -> bool {
        self.services.is_empty()
    }
}
