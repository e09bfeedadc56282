//! # Cluster Strategies
//!
//! | key              | algorithm                                                  |
//! |------------------|------------------------------------------------------------|
//! | `RANDOM`         | uniform pick over the routes                               |
//! | `WEIGHT_RANDOM`  | random pick, each route `weight` times as likely           |
//! | `POLLING`        | round robin over the routes                                |
//! | `WEIGHT_POLLING` | round robin where each route takes `weight` turns          |
//! | `HASH`           | hash of the caller's address modulo the number of routes   |
//! | `CUSTOM:<name>`  | a strategy registered on the client builder under `<name>` |
//!
//! Round robin cursors are guarded by a mutex with a bounded wait. When the lock cannot be taken
//! in time the first route is returned instead of blocking the call.
use crate::config::ServiceRoute;
use parking_lot::Mutex;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::{
    fmt,
    hash::{DefaultHasher, Hash, Hasher},
    net::{IpAddr, Ipv4Addr, UdpSocket},
    str::FromStr,
    sync::Arc,
    time::Duration,
};

/// How long a round robin strategy waits for its cursor.
pub const POLLING_LOCK_TIMEOUT: Duration = Duration::from_secs(10);

const CUSTOM_PREFIX: &str = "CUSTOM:";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown cluster strategy '{0}'")]
pub struct UnknownStrategy(pub String);

/// Key of a cluster strategy.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum ClusterStrategyKind {
    Random,
    WeightRandom,
    Polling,
    WeightPolling,
    Hash,
    Custom(String),
}

impl ClusterStrategyKind {
    pub fn custom(name: &str) -> Self {
        ClusterStrategyKind::Custom(name.to_string())
    }
}

impl FromStr for ClusterStrategyKind {
    type Err = UnknownStrategy;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let trimmed = value.trim();

        if let Some(name) = trimmed.strip_prefix(CUSTOM_PREFIX) {
            let name = name.trim();
            if name.is_empty() {
                return Err(UnknownStrategy(value.to_string()));
            }
            return Ok(ClusterStrategyKind::Custom(name.to_string()));
        }

        match trimmed.to_ascii_uppercase().as_str() {
            "RANDOM" => Ok(ClusterStrategyKind::Random),
            "WEIGHT_RANDOM" => Ok(ClusterStrategyKind::WeightRandom),
            "POLLING" => Ok(ClusterStrategyKind::Polling),
            "WEIGHT_POLLING" => Ok(ClusterStrategyKind::WeightPolling),
            "HASH" => Ok(ClusterStrategyKind::Hash),
            _ => Err(UnknownStrategy(value.to_string())),
        }
    }
}

impl TryFrom<String> for ClusterStrategyKind {
    type Error = UnknownStrategy;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ClusterStrategyKind> for String {
    fn from(kind: ClusterStrategyKind) -> Self {
        kind.to_string()
    }
}

impl fmt::Display for ClusterStrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClusterStrategyKind::Random => f.write_str("RANDOM"),
            ClusterStrategyKind::WeightRandom => f.write_str("WEIGHT_RANDOM"),
            ClusterStrategyKind::Polling => f.write_str("POLLING"),
            ClusterStrategyKind::WeightPolling => f.write_str("WEIGHT_POLLING"),
            ClusterStrategyKind::Hash => f.write_str("HASH"),
            ClusterStrategyKind::Custom(name) => write!(f, "{CUSTOM_PREFIX}{name}"),
        }
    }
}

/// Selects one route out of a non-empty candidate set.
pub trait ClusterStrategy: Send + Sync {
    fn select<'a>(&self, service: &str, routes: &'a [ServiceRoute]) -> Option<&'a ServiceRoute>;
}

/// A closure returning the index of the selected route.
impl<F> ClusterStrategy for F
where
    F: Fn(&str, &[ServiceRoute]) -> Option<usize> + Send + Sync,
{
    fn select<'a>(&self, service: &str, routes: &'a [ServiceRoute]) -> Option<&'a ServiceRoute> {
        self(service, routes).and_then(|index| routes.get(index))
    }
}

/// Sum of the weights of `routes`.
pub fn total_weight(routes: &[ServiceRoute]) -> u64 {
    routes.iter().map(|route| u64::from(route.weight)).sum()
}

/// The route covering `offset` when every route spans `weight` consecutive slots.
///
/// Equivalent to indexing the list of routes repeated `weight` times, without building it.
pub fn route_at_weight(routes: &[ServiceRoute], offset: u64) -> Option<&ServiceRoute> {
    let mut remaining = offset;
    for route in routes {
        let weight = u64::from(route.weight);
        if remaining < weight {
            return Some(route);
        }
        remaining -= weight;
    }
    None
}

#[derive(Debug, Default, Clone, Copy)]
pub struct RandomStrategy;

impl ClusterStrategy for RandomStrategy {
    fn select<'a>(&self, _: &str, routes: &'a [ServiceRoute]) -> Option<&'a ServiceRoute> {
        if routes.is_empty() {
            return None;
        }
        routes.get(rand::rng().random_range(0..routes.len()))
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct WeightRandomStrategy;

impl ClusterStrategy for WeightRandomStrategy {
    fn select<'a>(&self, _: &str, routes: &'a [ServiceRoute]) -> Option<&'a ServiceRoute> {
        let total = total_weight(routes);
        if total == 0 {
            return None;
        }
        route_at_weight(routes, rand::rng().random_range(0..total))
    }
}

/// Round robin, optionally weighted. A weighted cursor walks `weight` slots per route.
#[derive(Debug)]
pub struct PollingStrategy {
    cursor: Mutex<u64>,
    weighted: bool,
    lock_timeout: Duration,
}

impl PollingStrategy {
    pub fn new() -> Self {
        Self {
            cursor: Mutex::new(0),
            weighted: false,
            lock_timeout: POLLING_LOCK_TIMEOUT,
        }
    }

    pub fn weighted() -> Self {
        Self {
            weighted: true,
            ..Self::new()
        }
    }

    pub fn with_lock_timeout(mut self, timeout: Duration) -> Self {
        self.lock_timeout = timeout;
        self
    }

    fn route_at<'a>(&self, routes: &'a [ServiceRoute], slot: u64) -> Option<&'a ServiceRoute> {
        if self.weighted {
            route_at_weight(routes, slot)
        } else {
            usize::try_from(slot).ok().and_then(|index| routes.get(index))
        }
    }
}

impl Default for PollingStrategy {
    fn default() -> Self {
        Self::new()
    }
}

impl ClusterStrategy for PollingStrategy {
    fn select<'a>(&self, service: &str, routes: &'a [ServiceRoute]) -> Option<&'a ServiceRoute> {
        let slots = if self.weighted {
            total_weight(routes)
        } else {
            routes.len() as u64
        };
        if slots == 0 {
            return None;
        }

        let Some(mut cursor) = self.cursor.try_lock_for(self.lock_timeout) else {
            tracing::warn!(
                service,
                timeout = ?self.lock_timeout,
                "Round robin cursor is busy, falling back to the first route"
            );
            return self.route_at(routes, 0);
        };

        let slot = *cursor % slots;
        *cursor = (slot + 1) % slots;
        self.route_at(routes, slot)
    }
}

/// Sticky routing keyed on the caller's own address.
#[derive(Debug, Clone, Copy)]
pub struct HashStrategy {
    caller: IpAddr,
}

impl HashStrategy {
    pub fn new(caller: IpAddr) -> Self {
        Self { caller }
    }
}

impl ClusterStrategy for HashStrategy {
    fn select<'a>(&self, _: &str, routes: &'a [ServiceRoute]) -> Option<&'a ServiceRoute> {
        if routes.is_empty() {
            return None;
        }
        let mut hasher = DefaultHasher::new();
        self.caller.hash(&mut hasher);
        routes.get((hasher.finish() % routes.len() as u64) as usize)
    }
}

/// A fresh instance of a built-in strategy, `None` for [`ClusterStrategyKind::Custom`].
pub fn builtin(kind: &ClusterStrategyKind, caller: IpAddr) -> Option<Arc<dyn ClusterStrategy>> {
    match kind {
        ClusterStrategyKind::Random => Some(Arc::new(RandomStrategy)),
        ClusterStrategyKind::WeightRandom => Some(Arc::new(WeightRandomStrategy)),
        ClusterStrategyKind::Polling => Some(Arc::new(PollingStrategy::new())),
        ClusterStrategyKind::WeightPolling => Some(Arc::new(PollingStrategy::weighted())),
        ClusterStrategyKind::Hash => Some(Arc::new(HashStrategy::new(caller))),
        ClusterStrategyKind::Custom(_) => None,
    }
}

/// The address this host uses for outbound traffic.
///
/// Connecting a UDP socket sends no packet, it only asks the OS to pick a source address.
/// Falls back to the IPv4 loopback address.
pub fn discover_local_address() -> IpAddr {
    UdpSocket::bind((Ipv4Addr::UNSPECIFIED, 0))
        .and_then(|socket| {
            socket.connect((Ipv4Addr::new(8, 8, 8, 8), 80))?;
            socket.local_addr()
        })
        .map(|address| address.ip())
        .unwrap_or(IpAddr::V4(Ipv4Addr::LOCALHOST))
}
