//! The `RpcTransport` trait — the four gRPC call shapes.

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::BoxStream;
use tonic::{Request, Response, Status};

/// Outbound message stream for client-streaming and bidi calls.
pub type MessageStream = BoxStream<'static, Bytes>;

/// Inbound message stream for server-streaming and bidi calls.
pub type ResponseStream = BoxStream<'static, Result<Bytes, Status>>;

/// A gRPC client transport.
///
/// Messages are already-encoded protobuf bytes; `method` is the full
/// path, e.g. `/billing.v1.Invoices/Get`.
///
/// # Thread Safety
/// Implementations must be `Send + Sync` for use across Tokio tasks.
///
/// # Object Safety
/// The trait is object-safe and can be stored as `Arc<dyn RpcTransport>`.
#[async_trait]
pub trait RpcTransport: Send + Sync + 'static {
    /// Single request, single response.
    async fn unary(
        &self,
        method: &str,
        request: Request<Bytes>,
    ) -> Result<Response<Bytes>, Status>;

    /// Stream of requests, single response.
    async fn client_streaming(
        &self,
        method: &str,
        request: Request<MessageStream>,
    ) -> Result<Response<Bytes>, Status>;

    /// Single request, stream of responses.
    async fn server_streaming(
        &self,
        method: &str,
        request: Request<Bytes>,
    ) -> Result<Response<ResponseStream>, Status>;

    /// Streams in both directions.
    async fn bidi_streaming(
        &self,
        method: &str,
        request: Request<MessageStream>,
    ) -> Result<Response<ResponseStream>, Status>;

    /// The explicitly configured host. Empty when the transport was built
    /// around an existing channel.
    fn host(&self) -> &str;

    /// The channel's resolved target.
    fn target(&self) -> String;
}
