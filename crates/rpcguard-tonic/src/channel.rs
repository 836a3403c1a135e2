//! gRPC transport over a `tonic` channel.
//!
//! Features:
//! - Explicit-host construction (eager or lazy connect)
//! - Wrapping an existing `Channel`, with its target as the destination key
//! - All four call shapes via a pass-through bytes codec
//! - A per-call deadline that surfaces as `DeadlineExceeded`

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use futures::StreamExt;
use thiserror::Error;
use tonic::client::Grpc;
use tonic::codegen::http::uri::PathAndQuery;
use tonic::transport::{Channel, Endpoint};
use tonic::{Request, Response, Status, Streaming};

use rpcguard_core::transport::{MessageStream, ResponseStream, RpcTransport};

use crate::codec::BytesCodec;

/// Default connect timeout (10 seconds)
const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;

/// Default request timeout (30 seconds)
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Channel options. `connect_timeout` applies when this crate builds the
/// channel; `request_timeout` bounds every call, including wrapped channels.
#[derive(Debug, Clone)]
pub struct ChannelConfig {
    pub connect_timeout: Duration,
    pub request_timeout: Duration,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(DEFAULT_CONNECT_TIMEOUT_SECS),
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
        }
    }
}

/// Errors building a [`ChannelTransport`].
#[derive(Debug, Error)]
pub enum TransportSetupError {
    #[error("invalid endpoint URI {uri}: {source}")]
    InvalidUri {
        uri: String,
        #[source]
        source: tonic::transport::Error,
    },

    #[error("failed to connect to {uri}: {source}")]
    Connect {
        uri: String,
        #[source]
        source: tonic::transport::Error,
    },
}

/// A gRPC client transport backed by a `tonic` [`Channel`].
#[derive(Debug, Clone)]
pub struct ChannelTransport {
    host: String,
    target: String,
    request_timeout: Duration,
    grpc: Grpc<Channel>,
}

impl ChannelTransport {
    /// Connect to `host` (e.g. `"http://billing.internal:443"`), failing if
    /// it is unreachable.
    pub async fn connect(
        host: impl Into<String>,
        config: ChannelConfig,
    ) -> Result<Self, TransportSetupError> {
        let host = host.into();
        let endpoint = endpoint(&host, &config)?;
        let target = endpoint.uri().to_string();
        let channel = endpoint
            .connect()
            .await
            .map_err(|source| TransportSetupError::Connect {
                uri: host.clone(),
                source,
            })?;
        tracing::debug!(host = %host, "gRPC channel connected");
        Ok(Self {
            host,
            target,
            request_timeout: config.request_timeout,
            grpc: Grpc::new(channel),
        })
    }

    /// Like [`connect`](Self::connect) but connects on first use.
    /// Must be called within a Tokio runtime.
    pub fn connect_lazy(
        host: impl Into<String>,
        config: ChannelConfig,
    ) -> Result<Self, TransportSetupError> {
        let host = host.into();
        let endpoint = endpoint(&host, &config)?;
        let target = endpoint.uri().to_string();
        Ok(Self {
            host,
            target,
            request_timeout: config.request_timeout,
            grpc: Grpc::new(endpoint.connect_lazy()),
        })
    }

    /// Wrap a channel built elsewhere. There is no explicit host, so the
    /// guarded client keys configuration on `target`.
    pub fn from_channel(channel: Channel, target: impl Into<String>) -> Self {
        Self {
            host: String::new(),
            target: target.into(),
            request_timeout: ChannelConfig::default().request_timeout,
            grpc: Grpc::new(channel),
        }
    }

    /// Override the per-call deadline.
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn request_timeout(&self) -> Duration {
        self.request_timeout
    }

    async fn ready(&self) -> Result<Grpc<Channel>, Status> {
        let mut grpc = self.grpc.clone();
        grpc.ready()
            .await
            .map_err(|e| Status::unknown(format!("service was not ready: {e}")))?;
        Ok(grpc)
    }

    /// Run `call` (readiness included) under the request timeout.
    async fn deadline<R, Fut>(&self, method: &str, call: Fut) -> Result<R, Status>
    where
        Fut: Future<Output = Result<R, Status>>,
    {
        match tokio::time::timeout(self.request_timeout, call).await {
            Ok(result) => result,
            Err(_) => {
                tracing::debug!(
                    method = %method,
                    timeout_ms = self.request_timeout.as_millis() as u64,
                    "gRPC call deadline exceeded"
                );
                Err(Status::deadline_exceeded(format!(
                    "{method}: no response within {:?}",
                    self.request_timeout
                )))
            }
        }
    }
}

fn endpoint(host: &str, config: &ChannelConfig) -> Result<Endpoint, TransportSetupError> {
    let endpoint = Endpoint::from_shared(host.to_string()).map_err(|source| {
        TransportSetupError::InvalidUri {
            uri: host.to_string(),
            source,
        }
    })?;
    Ok(endpoint.connect_timeout(config.connect_timeout))
}

fn method_path(method: &str) -> Result<PathAndQuery, Status> {
    if !method.starts_with('/') {
        return Err(Status::invalid_argument(format!(
            "method path must start with '/': {method}"
        )));
    }
    PathAndQuery::try_from(method)
        .map_err(|e| Status::invalid_argument(format!("invalid method path {method}: {e}")))
}

fn boxed(response: Response<Streaming<Bytes>>) -> Response<ResponseStream> {
    let (metadata, stream, extensions) = response.into_parts();
    Response::from_parts(metadata, stream.boxed(), extensions)
}

#[async_trait]
impl RpcTransport for ChannelTransport {
    async fn unary(
        &self,
        method: &str,
        request: Request<Bytes>,
    ) -> Result<Response<Bytes>, Status> {
        let path = method_path(method)?;
        self.deadline(method, async {
            let mut grpc = self.ready().await?;
            grpc.unary(request, path, BytesCodec).await
        })
        .await
    }

    async fn client_streaming(
        &self,
        method: &str,
        request: Request<MessageStream>,
    ) -> Result<Response<Bytes>, Status> {
        let path = method_path(method)?;
        self.deadline(method, async {
            let mut grpc = self.ready().await?;
            grpc.client_streaming(request, path, BytesCodec).await
        })
        .await
    }

    async fn server_streaming(
        &self,
        method: &str,
        request: Request<Bytes>,
    ) -> Result<Response<ResponseStream>, Status> {
        let path = method_path(method)?;
        self.deadline(method, async {
            let mut grpc = self.ready().await?;
            grpc.server_streaming(request, path, BytesCodec)
                .await
                .map(boxed)
        })
        .await
    }

    async fn bidi_streaming(
        &self,
        method: &str,
        request: Request<MessageStream>,
    ) -> Result<Response<ResponseStream>, Status> {
        let path = method_path(method)?;
        self.deadline(method, async {
            let mut grpc = self.ready().await?;
            grpc.streaming(request, path, BytesCodec).await.map(boxed)
        })
        .await
    }

    fn host(&self) -> &str {
        &self.host
    }

    fn target(&self) -> String {
        self.target.clone()
    }
}
