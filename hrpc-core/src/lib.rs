//! # HRPC Core
//!
//! `hrpc-core` is a declarative HTTP-RPC client core. Callers describe the methods of a remote
//! HTTP API as plain data (verb, endpoint template, parameter roles and return type) and invoke
//! them by identity with JSON arguments. The core binds the arguments into a request, picks a
//! host for the logical service, sends the request and decodes the response.
//!
//! ## Key Components
//!
//! * **[`HrpcClient`]:** The main entry point. It owns the method registry and dispatches calls.
//! * **[`declaration`]:** Interface, method and parameter declarations.
//! * **[`binding`]:** Build-once method descriptors and per-call materialization.
//! * **[`cluster`]:** Cluster strategies and the host resolver for dynamic hosts.
//! * **[`http`]:** The pluggable request executor boundary, with a default built on `reqwest`.
//! * **[`decode`]:** Status checking and return-shape driven decoding.
//!
//! ## Feature Flags
//!
//! * `reqwest` (default): Enables [`http::ReqwestExecutor`], registered under the `"reqwest"` key.
//!
//! ## Re-exports
//!
//! This crate re-exports `http` and `serde_json` so that custom executors and callers use
//! compatible versions of the request and value types.
pub mod binding;
pub mod client;
pub mod cluster;
pub mod codec;
pub mod config;
pub mod declaration;
pub mod decode;
pub mod http;
pub mod interceptor;

pub use client::{HrpcClient, HrpcClientBuilder, InvokeError};
pub use decode::{Reply, ResponseEntity};

// Re-exports
pub use ::http as http_types;
pub use serde_json;

/// Type alias for the standard boxed error used by transports.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;
