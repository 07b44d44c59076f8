//! Shared building blocks for the tenant database gateway.
//!
//! - `config`: environment-driven configuration, including the declared connections
//! - `errors`: the error taxonomy and its HTTP mapping
//! - `response`: the JSON envelope every endpoint answers with
//! - `models`: API and domain models
//! - `middleware`: request id and bearer-token middleware
//! - `utils`: ad-hoc statement validation

pub mod config;
pub mod errors;
pub mod middleware;
pub mod models;
pub mod response;
pub mod utils;
