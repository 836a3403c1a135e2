//! rpcguard-tonic — a `tonic` channel transport for rpcguard.
//!
//! # Quick start
//! ```rust,no_run
//! use std::sync::Arc;
//! use rpcguard_core::{GuardedClient, ResourceGuard};
//! use rpcguard_tonic::{ChannelConfig, ChannelTransport};
//!
//! # async fn run(guard: Arc<dyn ResourceGuard>) -> Result<(), Box<dyn std::error::Error>> {
//! let transport =
//!     ChannelTransport::connect("http://billing.internal:443", ChannelConfig::default()).await?;
//! let client = GuardedClient::new(transport, guard);
//! # Ok(())
//! # }
//! ```

pub mod channel;
pub mod codec;

pub use channel::{ChannelConfig, ChannelTransport, TransportSetupError};
pub use codec::BytesCodec;
