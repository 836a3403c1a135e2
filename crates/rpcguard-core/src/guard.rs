//! The resource guard boundary.
//!
//! The guard itself (circuit breaker, bulkhead, their thresholds and
//! timers) lives outside this crate. The interceptor only asks it for
//! admission and reports how the admitted call ended:
//!
//! ```text
//! acquire(key) ── Err(Rejection) ──▶ CircuitOpen / ResourceBusy, call never runs
//!      │
//!      Ok
//!      ▼
//! transport call ──▶ release(key, Success | Failure(code) | Ignored)
//! ```

use std::sync::Arc;

use tonic::Code;

use crate::config::ProtectionConfig;
use crate::error::CallError;
use crate::scope::CallScope;

/// Adapter name presented to guards by this crate.
pub const ADAPTER: &str = "grpc";

/// Addressing key for one guarded call: `(identifier, scope)` plus the
/// destination's full configuration so the guard can size its resources.
#[derive(Debug, Clone, Copy)]
pub struct GuardKey<'a> {
    pub adapter: &'static str,
    pub scope: CallScope,
    pub config: &'a ProtectionConfig,
}

impl<'a> GuardKey<'a> {
    pub fn new(scope: CallScope, config: &'a ProtectionConfig) -> Self {
        Self {
            adapter: ADAPTER,
            scope,
            config,
        }
    }

    /// The semantic identifier the guard tracks state under.
    pub fn identifier(&self) -> &'a str {
        &self.config.name
    }
}

/// Why a guard denied admission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rejection {
    /// Breaker is open.
    CircuitOpen(String),
    /// Bulkhead has no free tickets.
    ResourceBusy(String),
}

impl Rejection {
    /// The caller-facing error for this rejection.
    pub fn into_error(self, identifier: &str) -> CallError {
        let identifier = identifier.to_string();
        match self {
            Self::CircuitOpen(details) => CallError::CircuitOpen { identifier, details },
            Self::ResourceBusy(details) => CallError::ResourceBusy { identifier, details },
        }
    }
}

/// How an admitted call ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// The call returned normally.
    Success,
    /// The call failed with a status that counts against the guard.
    Failure(Code),
    /// The call failed with an unclassified status, or was cancelled.
    /// Frees any held capacity without touching error accounting.
    Ignored,
}

/// A circuit breaker / bulkhead the interceptor delegates admission to.
///
/// `release` is called exactly once for every `acquire` that returned `Ok`.
pub trait ResourceGuard: Send + Sync {
    fn acquire(&self, key: &GuardKey<'_>) -> Result<(), Rejection>;

    fn release(&self, key: &GuardKey<'_>, outcome: Outcome);
}

impl<G: ResourceGuard + ?Sized> ResourceGuard for Arc<G> {
    fn acquire(&self, key: &GuardKey<'_>) -> Result<(), Rejection> {
        (**self).acquire(key)
    }

    fn release(&self, key: &GuardKey<'_>, outcome: Outcome) {
        (**self).release(key, outcome)
    }
}

/// An admitted call's hold on the guard.
///
/// Dropped without being settled (the call's future was cancelled) it
/// releases with [`Outcome::Ignored`].
pub(crate) struct Lease<'a> {
    guard: &'a dyn ResourceGuard,
    key: GuardKey<'a>,
    settled: bool,
}

impl<'a> Lease<'a> {
    pub(crate) fn acquire(
        guard: &'a dyn ResourceGuard,
        key: GuardKey<'a>,
    ) -> Result<Self, Rejection> {
        guard.acquire(&key)?;
        Ok(Self {
            guard,
            key,
            settled: false,
        })
    }

    pub(crate) fn settle(mut self, outcome: Outcome) {
        self.settled = true;
        self.guard.release(&self.key, outcome);
    }
}

impl Drop for Lease<'_> {
    fn drop(&mut self) {
        if !self.settled {
            self.guard.release(&self.key, Outcome::Ignored);
        }
    }
}
