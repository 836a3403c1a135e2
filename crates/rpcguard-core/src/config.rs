//! Protection configuration and the write-once resolver registry.
//!
//! A resolver maps a destination key (the client's host, or its channel
//! target) to the [`ProtectionConfig`] for that destination. Exactly one
//! resolver can be registered per [`ConfigRegistry`]; there is no way to
//! swap it afterwards.
//!
//! ```text
//! set_resolver(f)  ──▶  OnceLock<f>  ──▶  resolve("billing.internal:443")
//!                                              │
//!                                              ▼
//!                                  Some({ name: "billing-service", .. })
//! ```

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, OnceLock};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::ConfigError;

/// Per-destination protection policy.
///
/// Only `name` has meaning to this crate: it is the identifier the guard
/// tracks state under. Every other field is passed to the guard as-is.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProtectionConfig {
    pub name: String,
    #[serde(flatten)]
    pub options: Map<String, Value>,
}

impl ProtectionConfig {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            options: Map::new(),
        }
    }

    /// Builder-style option setter (e.g. `tickets`, `error_threshold`).
    pub fn with_option(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.options.insert(key.into(), value.into());
        self
    }

    pub fn option(&self, key: &str) -> Option<&Value> {
        self.options.get(key)
    }
}

type Resolver = dyn Fn(&str) -> Option<ProtectionConfig> + Send + Sync;

/// Write-once holder of the configuration resolver.
pub struct ConfigRegistry {
    resolver: OnceLock<Box<Resolver>>,
}

static GLOBAL: OnceLock<Arc<ConfigRegistry>> = OnceLock::new();

impl ConfigRegistry {
    /// An empty registry. Until a resolver is set, every lookup is `None`.
    pub const fn new() -> Self {
        Self {
            resolver: OnceLock::new(),
        }
    }

    /// The process-wide registry used by clients that are not given one.
    pub fn global() -> Arc<ConfigRegistry> {
        GLOBAL.get_or_init(|| Arc::new(ConfigRegistry::new())).clone()
    }

    /// Register the resolver.
    ///
    /// Fails with [`ConfigError::AlreadySet`] if one is already registered;
    /// the first registration stays in effect. Under concurrent first
    /// registration exactly one caller succeeds.
    pub fn set_resolver<F>(&self, resolver: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<ProtectionConfig> + Send + Sync + 'static,
    {
        self.resolver
            .set(Box::new(resolver))
            .map_err(|_| ConfigError::AlreadySet)?;
        tracing::debug!("protection configuration resolver registered");
        Ok(())
    }

    /// Look up the configuration for `key`. Not cached here; clients keep
    /// their own copy of the result.
    pub fn resolve(&self, key: &str) -> Option<ProtectionConfig> {
        self.resolver.get().and_then(|resolve| resolve(key))
    }

    /// Returns `true` once a resolver has been registered.
    pub fn is_configured(&self) -> bool {
        self.resolver.get().is_some()
    }
}

impl Default for ConfigRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ConfigRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConfigRegistry")
            .field("configured", &self.is_configured())
            .finish()
    }
}

/// Register the resolver on the process-wide registry.
pub fn set_global_resolver<F>(resolver: F) -> Result<(), ConfigError>
where
    F: Fn(&str) -> Option<ProtectionConfig> + Send + Sync + 'static,
{
    ConfigRegistry::global().set_resolver(resolver)
}

// ─── Static table ─────────────────────────────────────────────────────────────

/// A fixed destination → configuration map, loadable from JSON.
///
/// ```json
/// {
///   "billing.internal:443": { "name": "billing-service", "tickets": 4 },
///   "http://ledger:50051":  { "name": "ledger", "error_threshold": 3 }
/// }
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProtectionTable {
    entries: HashMap<String, ProtectionConfig>,
}

impl ProtectionTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a table from a JSON object string.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Read and parse a table from a JSON file.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&content)
    }

    pub fn insert(&mut self, destination: impl Into<String>, config: ProtectionConfig) {
        self.entries.insert(destination.into(), config);
    }

    pub fn get(&self, destination: &str) -> Option<&ProtectionConfig> {
        self.entries.get(destination)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Turn the table into a resolver for [`ConfigRegistry::set_resolver`].
    pub fn into_resolver(
        self,
    ) -> impl Fn(&str) -> Option<ProtectionConfig> + Send + Sync + 'static {
        move |destination: &str| self.entries.get(destination).cloned()
    }
}
