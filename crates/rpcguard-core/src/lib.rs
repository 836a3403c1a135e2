//! rpcguard-core — circuit breaker and bulkhead interception for gRPC clients.
//!
//! # Overview
//!
//! rpcguard sits between application code and a gRPC transport. Every
//! outbound call is routed through an external resource guard (circuit
//! breaker / bulkhead) addressed by the destination's configured name and
//! the call's shape. The core crate defines:
//!
//! - [`RpcTransport`] — the four gRPC call shapes a transport exposes
//! - [`GuardedClient`] — the interceptor, itself an `RpcTransport`
//! - [`ConfigRegistry`] / [`ProtectionConfig`] — write-once, per-destination policy lookup
//! - [`ErrorClassifier`] — which failures count against the guard
//! - [`ResourceGuard`] — the boundary the external guard implements
//! - [`CallError`] — the error taxonomy callers observe
//!
//! # Example
//! ```rust,ignore
//! use rpcguard_core::{set_global_resolver, GuardedClient, ProtectionConfig};
//!
//! set_global_resolver(|host: &str| match host {
//!     "billing.internal:443" => Some(ProtectionConfig::new("billing-service")),
//!     _ => None,
//! })?;
//!
//! let client = GuardedClient::new(transport, guard);
//! let reply = client.unary("/billing.v1.Invoices/Get", request).await?;
//! ```

pub mod classifier;
pub mod client;
pub mod config;
pub mod error;
pub mod guard;
pub mod scope;
pub mod transport;

pub use classifier::{is_resource_failure, CodeClassifier, ErrorClassifier};
pub use client::GuardedClient;
pub use config::{set_global_resolver, ConfigRegistry, ProtectionConfig, ProtectionTable};
pub use error::{CallError, ConfigError};
pub use guard::{GuardKey, Outcome, Rejection, ResourceGuard};
pub use scope::CallScope;
pub use transport::{MessageStream, ResponseStream, RpcTransport};
