//! # Cluster Host Resolution
//!
//! Picks one [`crate::config::ServiceRoute`] of a logical service for each call to a method whose
//! host is dynamic.
//!
//! * [`strategy`]: the [`ClusterStrategy`] contract and the built-in algorithms.
//! * [`resolver`]: the [`ClusterHostResolver`], which owns one strategy instance per service.
pub mod resolver;
pub mod strategy;

pub use resolver::{ClusterHostResolver, RouteError};
pub use strategy::{ClusterStrategy, ClusterStrategyKind, UnknownStrategy};
