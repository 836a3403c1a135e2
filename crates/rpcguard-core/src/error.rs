//! Error types for configuration and guarded calls.

use std::path::PathBuf;
use std::sync::Arc;

use thiserror::Error;
use tonic::metadata::MetadataValue;
use tonic::{Code, Status};

/// Metadata key marking a `Status` as a guard rejection.
pub const REJECTION_KEY: &str = "x-resource-guard";
/// Binary metadata key carrying the rejected destination's identifier.
pub const IDENTIFIER_KEY: &str = "x-resource-guard-id-bin";

const CIRCUIT_OPEN: &str = "circuit-open";
const RESOURCE_BUSY: &str = "resource-busy";

/// Errors raised while registering or loading protection configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A resolver was already registered; configuration is write-once.
    #[error("cannot re-initialize protection configuration")]
    AlreadySet,

    /// A protection table could not be parsed.
    #[error("invalid protection table: {0}")]
    Parse(#[from] serde_json::Error),

    /// A protection table file could not be read.
    #[error("failed to read protection table {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// The error a guarded call can end with.
///
/// Callers only ever see the transport's own error, unchanged, or one of
/// the two guard rejections. Both rejections report [`Code::Unavailable`]
/// so code written against the gRPC status taxonomy keeps working.
#[derive(Debug, Error)]
pub enum CallError {
    /// The transport call ran and failed; the status is passed through verbatim.
    #[error(transparent)]
    Transport(Status),

    /// The guard's circuit is open; the transport call never ran.
    #[error("circuit open for {identifier}: {details}")]
    CircuitOpen { identifier: String, details: String },

    /// The guard's bulkhead is full; the transport call never ran.
    #[error("resource busy for {identifier}: {details}")]
    ResourceBusy { identifier: String, details: String },
}

impl CallError {
    /// The gRPC status code this error maps to.
    pub fn code(&self) -> Code {
        match self {
            Self::Transport(status) => status.code(),
            Self::CircuitOpen { .. } | Self::ResourceBusy { .. } => Code::Unavailable,
        }
    }

    /// Returns `true` if the guard denied the call before it ran.
    pub fn is_rejection(&self) -> bool {
        matches!(self, Self::CircuitOpen { .. } | Self::ResourceBusy { .. })
    }

    /// The guarded destination's identifier, for rejections.
    pub fn identifier(&self) -> Option<&str> {
        match self {
            Self::Transport(_) => None,
            Self::CircuitOpen { identifier, .. } | Self::ResourceBusy { identifier, .. } => {
                Some(identifier)
            }
        }
    }

    /// Human-readable detail message.
    pub fn details(&self) -> &str {
        match self {
            Self::Transport(status) => status.message(),
            Self::CircuitOpen { details, .. } | Self::ResourceBusy { details, .. } => details,
        }
    }
}

/// Attached as the source of a rejection `Status` built in this process.
/// Sources never cross the wire, so a peer's forwarded rejection stays a
/// plain transport error.
#[derive(Debug, Clone, Error)]
#[error("{kind} for {identifier}")]
struct LocalRejection {
    kind: &'static str,
    identifier: String,
}

/// Recovers a typed rejection from a status that crossed an `RpcTransport`
/// boundary inside this process. Everything else stays `Transport`, even
/// when it carries rejection metadata from a remote peer.
impl From<Status> for CallError {
    fn from(status: Status) -> Self {
        let Some(rejection) = local_rejection(&status) else {
            return Self::Transport(status);
        };
        let details = status.message().to_string();
        match rejection.kind {
            CIRCUIT_OPEN => Self::CircuitOpen {
                identifier: rejection.identifier,
                details,
            },
            _ => Self::ResourceBusy {
                identifier: rejection.identifier,
                details,
            },
        }
    }
}

fn local_rejection(status: &Status) -> Option<LocalRejection> {
    std::error::Error::source(status)?
        .downcast_ref::<LocalRejection>()
        .cloned()
}

impl From<CallError> for Status {
    fn from(err: CallError) -> Self {
        let (kind, identifier, details) = match err {
            CallError::Transport(status) => return status,
            CallError::CircuitOpen { identifier, details } => (CIRCUIT_OPEN, identifier, details),
            CallError::ResourceBusy { identifier, details } => (RESOURCE_BUSY, identifier, details),
        };
        let mut status = Status::unavailable(details);
        let metadata = status.metadata_mut();
        metadata.insert(REJECTION_KEY, MetadataValue::from_static(kind));
        metadata.insert_bin(IDENTIFIER_KEY, MetadataValue::from_bytes(identifier.as_bytes()));
        status.set_source(Arc::new(LocalRejection { kind, identifier }));
        status
    }
}
