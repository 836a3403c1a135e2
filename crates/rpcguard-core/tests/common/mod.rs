//! Shared test doubles: an instrumented transport and a threshold guard.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use futures::StreamExt;
use rpcguard_core::{
    CallScope, ConfigRegistry, GuardKey, MessageStream, Outcome, ProtectionConfig, Rejection,
    ResourceGuard, ResponseStream, RpcTransport,
};
use tonic::{Code, Request, Response, Status};

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

// ─── Transport ────────────────────────────────────────────────────────────────

/// A transport that echoes its input, or fails with a fixed status.
pub struct MockTransport {
    pub host: String,
    pub target: String,
    pub fail_with: Option<(Code, String)>,
    pub hang: bool,
    pub calls: AtomicUsize,
    pub target_lookups: AtomicUsize,
}

impl MockTransport {
    pub fn new(host: &str) -> Self {
        Self {
            host: host.to_string(),
            target: "dns:///billing.internal:443".to_string(),
            fail_with: None,
            hang: false,
            calls: AtomicUsize::new(0),
            target_lookups: AtomicUsize::new(0),
        }
    }

    pub fn failing(host: &str, code: Code) -> Self {
        Self {
            fail_with: Some((code, format!("mock {code:?}"))),
            ..Self::new(host)
        }
    }

    pub fn hanging(host: &str) -> Self {
        Self {
            hang: true,
            ..Self::new(host)
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    async fn enter(&self) -> Result<(), Status> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.hang {
            futures::future::pending::<()>().await;
        }
        match &self.fail_with {
            Some((code, message)) => Err(Status::new(*code, message.clone())),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl RpcTransport for MockTransport {
    async fn unary(&self, _method: &str, request: Request<Bytes>) -> Result<Response<Bytes>, Status> {
        self.enter().await?;
        Ok(Response::new(request.into_inner()))
    }

    async fn client_streaming(
        &self,
        _method: &str,
        request: Request<MessageStream>,
    ) -> Result<Response<Bytes>, Status> {
        self.enter().await?;
        let chunks: Vec<Bytes> = request.into_inner().collect().await;
        let mut joined = BytesMut::new();
        for chunk in chunks {
            joined.extend_from_slice(&chunk);
        }
        Ok(Response::new(joined.freeze()))
    }

    async fn server_streaming(
        &self,
        _method: &str,
        request: Request<Bytes>,
    ) -> Result<Response<ResponseStream>, Status> {
        self.enter().await?;
        let message = request.into_inner();
        let stream = futures::stream::iter(vec![Ok::<Bytes, Status>(message.clone()), Ok(message)]);
        Ok(Response::new(stream.boxed()))
    }

    async fn bidi_streaming(
        &self,
        _method: &str,
        request: Request<MessageStream>,
    ) -> Result<Response<ResponseStream>, Status> {
        self.enter().await?;
        Ok(Response::new(request.into_inner().map(Ok::<Bytes, Status>).boxed()))
    }

    fn host(&self) -> &str {
        &self.host
    }

    fn target(&self) -> String {
        self.target_lookups.fetch_add(1, Ordering::SeqCst);
        self.target.clone()
    }
}

// ─── Guard ────────────────────────────────────────────────────────────────────

/// Opens a `(identifier, scope)` circuit after `threshold` recorded failures.
pub struct ThresholdGuard {
    threshold: u32,
    busy: AtomicBool,
    failures: Mutex<HashMap<(String, CallScope), u32>>,
    pub admitted: Mutex<Vec<(String, CallScope)>>,
    pub outcomes: Mutex<Vec<Outcome>>,
}

impl ThresholdGuard {
    pub fn new(threshold: u32) -> Arc<Self> {
        Arc::new(Self {
            threshold,
            busy: AtomicBool::new(false),
            failures: Mutex::new(HashMap::new()),
            admitted: Mutex::new(Vec::new()),
            outcomes: Mutex::new(Vec::new()),
        })
    }

    pub fn set_busy(&self, busy: bool) {
        self.busy.store(busy, Ordering::SeqCst);
    }

    pub fn failures(&self, identifier: &str, scope: CallScope) -> u32 {
        self.failures
            .lock()
            .unwrap()
            .get(&(identifier.to_string(), scope))
            .copied()
            .unwrap_or(0)
    }

    pub fn total_failures(&self) -> u32 {
        self.failures.lock().unwrap().values().sum()
    }

    pub fn outcomes(&self) -> Vec<Outcome> {
        self.outcomes.lock().unwrap().clone()
    }

    pub fn admitted(&self) -> Vec<(String, CallScope)> {
        self.admitted.lock().unwrap().clone()
    }
}

impl ResourceGuard for ThresholdGuard {
    fn acquire(&self, key: &GuardKey<'_>) -> Result<(), Rejection> {
        let failures = self.failures(key.identifier(), key.scope);
        if failures >= self.threshold {
            return Err(Rejection::CircuitOpen(format!(
                "{failures} failures in window"
            )));
        }
        if self.busy.load(Ordering::SeqCst) {
            return Err(Rejection::ResourceBusy("no tickets available".to_string()));
        }
        self.admitted
            .lock()
            .unwrap()
            .push((key.identifier().to_string(), key.scope));
        Ok(())
    }

    fn release(&self, key: &GuardKey<'_>, outcome: Outcome) {
        if let Outcome::Failure(_) = outcome {
            *self
                .failures
                .lock()
                .unwrap()
                .entry((key.identifier().to_string(), key.scope))
                .or_insert(0) += 1;
        }
        self.outcomes.lock().unwrap().push(outcome);
    }
}

// ─── Registry ─────────────────────────────────────────────────────────────────

/// A registry resolving `billing.internal:443` and the mock channel target
/// to `billing-service`, counting resolver invocations.
pub fn billing_registry() -> (Arc<ConfigRegistry>, Arc<AtomicUsize>) {
    let lookups = Arc::new(AtomicUsize::new(0));
    let counter = lookups.clone();
    let registry = Arc::new(ConfigRegistry::new());
    registry
        .set_resolver(move |host: &str| {
            counter.fetch_add(1, Ordering::SeqCst);
            match host {
                "billing.internal:443" | "dns:///billing.internal:443" => Some(
                    ProtectionConfig::new("billing-service")
                        .with_option("tickets", 4)
                        .with_option("error_threshold", 5),
                ),
                _ => None,
            }
        })
        .unwrap();
    (registry, lookups)
}
