//! # Cluster Host Resolver
//!
//! Resolves a logical service name into one of its routes.
//!
//! The resolver owns one built-in strategy instance per service, so round robin cursors are never
//! shared between services. Custom strategies are registered by the caller as shared instances
//! and take precedence over built-ins with the same key.
//!
//! Resolution order:
//!
//! 1. A service absent from the topology, or one without routes, fails with
//!    [`RouteError::NoRouteAvailable`].
//! 2. A single route is returned as is, no strategy is consulted.
//! 3. Otherwise the service's strategy selects a route, failing with
//!    [`RouteError::StrategyNotFound`] for a custom key that was never registered.
use super::strategy::{self, ClusterStrategy, ClusterStrategyKind};
use crate::config::{ServiceRoute, ServiceTopology};
use std::{collections::HashMap, fmt, net::IpAddr, sync::Arc};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RouteError {
    #[error("No route available for service '{0}'")]
    NoRouteAvailable(String),
    #[error("Cluster strategy '{strategy}' of service '{service}' is not registered")]
    StrategyNotFound {
        service: String,
        strategy: ClusterStrategyKind,
    },
}

struct ServiceStrategy {
    kind: ClusterStrategyKind,
    instance: Option<Arc<dyn ClusterStrategy>>,
}

pub struct ClusterHostResolver {
    topology: ServiceTopology,
    strategies: HashMap<String, ServiceStrategy>,
}

impl ClusterHostResolver {
    /// Creates the resolver and the strategy of every service in `topology`.
    ///
    /// `caller` is the address hashed by the `HASH` strategy.
    pub fn new(
        topology: ServiceTopology,
        default_strategy: &ClusterStrategyKind,
        custom: &HashMap<ClusterStrategyKind, Arc<dyn ClusterStrategy>>,
        caller: IpAddr,
    ) -> Self {
        let strategies = topology
            .services()
            .map(|info| {
                let kind = info
                    .strategy
                    .clone()
                    .unwrap_or_else(|| default_strategy.clone());
                let instance = custom
                    .get(&kind)
                    .cloned()
                    .or_else(|| strategy::builtin(&kind, caller));

                (info.service.clone(), ServiceStrategy { kind, instance })
            })
            .collect();

        Self {
            topology,
            strategies,
        }
    }

    pub fn topology(&self) -> &ServiceTopology {
        &self.topology
    }

    /// Picks the route that serves the next call to `service`.
    ///
    /// # Arguments
    ///
    /// * `service` - The logical service name, as configured in the topology.
    ///
    /// # Returns
    ///
    /// * `Ok(&ServiceRoute)` - The selected route.
    /// * `Err(RouteError)` - The service has no routes, or its strategy is not registered.
    pub fn resolve(&self, service: &str) -> Result<&ServiceRoute, RouteError> {
        let no_route = || RouteError::NoRouteAvailable(service.to_string());
        let routes = self
            .topology
            .get(service)
            .map(|info| info.routes.as_slice())
            .unwrap_or_default();

        let route = match routes {
            [] => return Err(no_route()),
            [single] => single,
            routes => {
                let strategy = self.strategies.get(service).ok_or_else(no_route)?;

                let instance = strategy.instance.as_ref().ok_or_else(|| {
                    RouteError::StrategyNotFound {
                        service: service.to_string(),
                        strategy: strategy.kind.clone(),
                    }
                })?;

                instance
                    .select(service, routes)
                    .ok_or_else(no_route)?
            }
        };

        tracing::debug!(service, route = %route.host(), "Resolved service route");

        Ok(route)
    }
}

impl fmt::Debug for ClusterHostResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let strategies: HashMap<_, _> = self
            .strategies
            .iter()
            .map(|(service, strategy)| (service.as_str(), strategy.kind.to_string()))
            .collect();

        f.debug_struct("ClusterHostResolver")
            .field("topology", &self.topology)
            .field("strategies", &strategies)
            .finish()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::config::ServiceInfo;
    use std::net::Ipv4Addr;

    const CALLER: IpAddr = IpAddr::V4(Ipv4Addr::new(10, 1, 2, 3));

    fn three_routes(name: &str) -> ServiceInfo {
        ServiceInfo::new(name)
            .route(ServiceRoute::new("a", 1))
            .route(ServiceRoute::new("b", 1))
            .route(ServiceRoute::new("c", 1))
    }

    fn resolver(
        services: Vec<ServiceInfo>,
        custom: &HashMap<ClusterStrategyKind, Arc<dyn ClusterStrategy>>,
    ) -> ClusterHostResolver {
        ClusterHostResolver::new(
            ServiceTopology::new(services).unwrap(),
            &ClusterStrategyKind::Polling,
            custom,
            CALLER,
        )
    }

    fn pick(resolver: &ClusterHostResolver, service: &str) -> String {
        resolver.resolve(service).unwrap().address.clone()
    }

    #[test]
    fn single_route_bypasses_the_strategy() {
        let resolver = resolver(
            vec![
                ServiceInfo::new("solo")
                    .strategy(ClusterStrategyKind::custom("missing"))
                    .route(ServiceRoute::new("only", 80)),
            ],
            &HashMap::new(),
        );

        for _ in 0..3 {
            assert_eq!(pick(&resolver, "solo"), "only");
        }
    }

    #[test]
    fn absent_and_empty_services_have_no_route() {
        let resolver = resolver(vec![ServiceInfo::new("empty")], &HashMap::new());

        assert_eq!(
            resolver.resolve("ghost"),
            Err(RouteError::NoRouteAvailable("ghost".into()))
        );
        assert_eq!(
            resolver.resolve("empty"),
            Err(RouteError::NoRouteAvailable("empty".into()))
        );
    }

    #[test]
    fn every_service_gets_its_own_cursor() {
        let resolver = resolver(vec![three_routes("x"), three_routes("y")], &HashMap::new());

        assert_eq!(pick(&resolver, "x"), "a");
        assert_eq!(pick(&resolver, "x"), "b");
        assert_eq!(pick(&resolver, "y"), "a");
        assert_eq!(pick(&resolver, "x"), "c");
        assert_eq!(pick(&resolver, "x"), "a");
    }

    #[test]
    fn unregistered_custom_strategy_fails() {
        let resolver = resolver(
            vec![three_routes("x").strategy(ClusterStrategyKind::custom("zone"))],
            &HashMap::new(),
        );

        assert_eq!(
            resolver.resolve("x"),
            Err(RouteError::StrategyNotFound {
                service: "x".into(),
                strategy: ClusterStrategyKind::custom("zone"),
            })
        );
    }

    #[test]
    fn custom_strategies_are_delegated_to() {
        let mut custom: HashMap<ClusterStrategyKind, Arc<dyn ClusterStrategy>> = HashMap::new();
        custom.insert(
            ClusterStrategyKind::custom("last"),
            Arc::new(|_: &str, routes: &[ServiceRoute]| routes.len().checked_sub(1)),
        );
        custom.insert(
            ClusterStrategyKind::Polling,
            Arc::new(|_: &str, _: &[ServiceRoute]| Some(1_usize)),
        );

        let resolver = resolver(
            vec![
                three_routes("x").strategy(ClusterStrategyKind::custom("last")),
                three_routes("y"),
            ],
            &custom,
        );

        assert_eq!(pick(&resolver, "x"), "c");
        assert_eq!(pick(&resolver, "y"), "b");
        assert_eq!(pick(&resolver, "y"), "b");
    }

    #[test]
    fn hash_strategy_is_deterministic_per_caller() {
        let resolver = resolver(
            vec![three_routes("x").strategy(ClusterStrategyKind::Hash)],
            &HashMap::new(),
        );

        let first = pick(&resolver, "x");
        for _ in 0..20 {
            assert_eq!(pick(&resolver, "x"), first);
        }
    }
}
