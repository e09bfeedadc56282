//! # Request Executor Boundary
//!
//! The core never talks to the network itself. A fully materialized [`HttpRequest`] is handed to
//! a [`RequestExecutor`] which returns the raw status and body bytes.
//!
//! Executors are registered by key on the client builder and the configuration selects which one
//! is used. The default, [`ReqwestExecutor`], is available behind the `reqwest` feature.
pub mod executor;
#[cfg(feature = "reqwest")]
pub mod reqwest;

pub use executor::{ExecuteError, HttpRequest, RawResponse, RequestExecutor};
#[cfg(feature = "reqwest")]
pub use self::reqwest::ReqwestExecutor;
