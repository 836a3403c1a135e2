//! `GuardedClient` — wraps any [`RpcTransport`] with resource protection.
//!
//! Every call shape goes through the same acquire/execute/release path,
//! parameterized only by its [`CallScope`]:
//!
//! ```text
//! call ─▶ binding (once) ─▶ guard.acquire(name, scope) ─▶ transport ─▶ guard.release(outcome)
//!                │                      │
//!                │ no config            └─ rejected ─▶ CircuitOpen / ResourceBusy
//!                ▼
//!           transport (unguarded)
//! ```

use std::future::Future;
use std::sync::{Arc, OnceLock};

use async_trait::async_trait;
use bytes::Bytes;
use tonic::{Request, Response, Status};

use crate::classifier::{CodeClassifier, ErrorClassifier};
use crate::config::{ConfigRegistry, ProtectionConfig};
use crate::error::CallError;
use crate::guard::{GuardKey, Lease, Outcome, ResourceGuard};
use crate::scope::CallScope;
use crate::transport::{MessageStream, ResponseStream, RpcTransport};

/// Destination and configuration, resolved on first use.
#[derive(Debug)]
struct Binding {
    destination: String,
    config: Option<ProtectionConfig>,
}

/// A transport decorator that runs every call under a [`ResourceGuard`].
///
/// The destination key is the inner transport's host, or its channel
/// target when no host was configured. The key and its configuration are
/// resolved once per client and kept as a private copy.
pub struct GuardedClient<T> {
    inner: T,
    guard: Arc<dyn ResourceGuard>,
    registry: Arc<ConfigRegistry>,
    classifier: Arc<dyn ErrorClassifier>,
    binding: OnceLock<Binding>,
}

impl<T: RpcTransport> GuardedClient<T> {
    /// Wrap `inner`, resolving configuration from the global registry.
    pub fn new(inner: T, guard: Arc<dyn ResourceGuard>) -> Self {
        Self {
            inner,
            guard,
            registry: ConfigRegistry::global(),
            classifier: Arc::new(CodeClassifier::default()),
            binding: OnceLock::new(),
        }
    }

    /// Resolve configuration from `registry` instead of the global one.
    pub fn with_registry(mut self, registry: Arc<ConfigRegistry>) -> Self {
        self.registry = registry;
        self.binding = OnceLock::new();
        self
    }

    pub fn with_classifier(mut self, classifier: impl ErrorClassifier + 'static) -> Self {
        self.classifier = Arc::new(classifier);
        self
    }

    /// The wrapped transport.
    pub fn inner(&self) -> &T {
        &self.inner
    }

    /// The destination key configuration is resolved under.
    pub fn destination(&self) -> &str {
        &self.binding().destination
    }

    /// This client's copy of its protection configuration, if any.
    pub fn config(&self) -> Option<&ProtectionConfig> {
        self.binding().config.as_ref()
    }

    /// The identifier presented to the guard. `None` means calls are
    /// not guarded.
    pub fn identifier(&self) -> Option<&str> {
        self.config().map(|c| c.name.as_str())
    }

    fn binding(&self) -> &Binding {
        self.binding.get_or_init(|| {
            let host = self.inner.host();
            let destination = if host.is_empty() {
                self.inner.target()
            } else {
                host.to_string()
            };
            let config = self.registry.resolve(&destination);
            match &config {
                Some(c) => tracing::debug!(
                    destination = %destination,
                    identifier = %c.name,
                    "protection configuration resolved"
                ),
                None => tracing::debug!(
                    destination = %destination,
                    "no protection configuration, calls pass through"
                ),
            }
            Binding {
                destination,
                config,
            }
        })
    }

    /// Run `call` under the guard for `scope`.
    ///
    /// `call` is only invoked once the guard has admitted the request.
    /// Statuses pass through unchanged; only the classifier decides whether
    /// they are recorded as failures.
    pub async fn guard<R, F, Fut>(&self, scope: CallScope, call: F) -> Result<R, CallError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<R, Status>>,
    {
        let Some(config) = self.binding().config.as_ref() else {
            return call().await.map_err(CallError::Transport);
        };
        let key = GuardKey::new(scope, config);

        let lease = Lease::acquire(&*self.guard, key).map_err(|rejection| {
            tracing::warn!(
                identifier = %key.identifier(),
                scope = %scope,
                ?rejection,
                "guard rejected call"
            );
            rejection.into_error(key.identifier())
        })?;

        match call().await {
            Ok(response) => {
                lease.settle(Outcome::Success);
                Ok(response)
            }
            Err(status) if self.classifier.counts_against_guard(&status) => {
                tracing::debug!(
                    identifier = %key.identifier(),
                    scope = %scope,
                    code = ?status.code(),
                    "failure recorded against guard"
                );
                lease.settle(Outcome::Failure(status.code()));
                Err(CallError::Transport(status))
            }
            Err(status) => {
                lease.settle(Outcome::Ignored);
                Err(CallError::Transport(status))
            }
        }
    }
}

#[async_trait]
impl<T: RpcTransport> RpcTransport for GuardedClient<T> {
    async fn unary(
        &self,
        method: &str,
        request: Request<Bytes>,
    ) -> Result<Response<Bytes>, Status> {
        self.guard(CallScope::Unary, || self.inner.unary(method, request))
            .await
            .map_err(Status::from)
    }

    async fn client_streaming(
        &self,
        method: &str,
        request: Request<MessageStream>,
    ) -> Result<Response<Bytes>, Status> {
        self.guard(CallScope::ClientStream, || {
            self.inner.client_streaming(method, request)
        })
        .await
        .map_err(Status::from)
    }

    async fn server_streaming(
        &self,
        method: &str,
        request: Request<Bytes>,
    ) -> Result<Response<ResponseStream>, Status> {
        self.guard(CallScope::ServerStream, || {
            self.inner.server_streaming(method, request)
        })
        .await
        .map_err(Status::from)
    }

    async fn bidi_streaming(
        &self,
        method: &str,
        request: Request<MessageStream>,
    ) -> Result<Response<ResponseStream>, Status> {
        self.guard(CallScope::BidiStream, || {
            self.inner.bidi_streaming(method, request)
        })
        .await
        .map_err(Status::from)
    }

    fn host(&self) -> &str {
        self.inner.host()
    }

    fn target(&self) -> String {
        self.inner.target()
    }
}

impl<T> std::fmt::Debug for GuardedClient<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GuardedClient")
            .field("binding", &self.binding.get())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Stub {
        host: String,
        target_lookups: AtomicUsize,
    }

    #[async_trait]
    impl RpcTransport for Stub {
        async fn unary(&self, _: &str, req: Request<Bytes>) -> Result<Response<Bytes>, Status> {
            Ok(Response::new(req.into_inner()))
        }
        async fn client_streaming(
            &self,
            _: &str,
            _: Request<MessageStream>,
        ) -> Result<Response<Bytes>, Status> {
            Err(Status::unimplemented("stub"))
        }
        async fn server_streaming(
            &self,
            _: &str,
            _: Request<Bytes>,
        ) -> Result<Response<ResponseStream>, Status> {
            Err(Status::unimplemented("stub"))
        }
        async fn bidi_streaming(
            &self,
            _: &str,
            _: Request<MessageStream>,
        ) -> Result<Response<ResponseStream>, Status> {
            Err(Status::unimplemented("stub"))
        }
        fn host(&self) -> &str {
            &self.host
        }
        fn target(&self) -> String {
            self.target_lookups.fetch_add(1, Ordering::SeqCst);
            "dns:///billing.internal:443".into()
        }
    }

    struct AllowAll;

    impl ResourceGuard for AllowAll {
        fn acquire(&self, _: &GuardKey<'_>) -> Result<(), crate::guard::Rejection> {
            Ok(())
        }
        fn release(&self, _: &GuardKey<'_>, _: Outcome) {}
    }

    fn client(host: &str) -> GuardedClient<Stub> {
        let registry = Arc::new(ConfigRegistry::new());
        registry
            .set_resolver(|key: &str| Some(ProtectionConfig::new(format!("cfg:{key}"))))
            .unwrap();
        GuardedClient::new(
            Stub {
                host: host.into(),
                target_lookups: AtomicUsize::new(0),
            },
            Arc::new(AllowAll),
        )
        .with_registry(registry)
    }

    #[test]
    fn explicit_host_wins_over_target() {
        let c = client("billing.internal:443");
        assert_eq!(c.destination(), "billing.internal:443");
        assert_eq!(c.identifier(), Some("cfg:billing.internal:443"));
        assert_eq!(c.inner().target_lookups.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn empty_host_falls_back_to_target_once() {
        let c = client("");
        assert_eq!(c.destination(), "dns:///billing.internal:443");
        assert_eq!(c.identifier(), Some("cfg:dns:///billing.internal:443"));
        let _ = c.config();
        let _ = c.destination();
        assert_eq!(c.inner().target_lookups.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn decorator_preserves_unary_payload() {
        let c = client("billing.internal:443");
        let resp = c
            .unary("/billing.v1.Invoices/Get", Request::new(Bytes::from_static(b"\x08\x2a")))
            .await
            .unwrap();
        assert_eq!(resp.into_inner(), Bytes::from_static(b"\x08\x2a"));
    }
}
