//! Call scopes — the four gRPC call shapes a guard can be addressed by.

use serde::{Deserialize, Serialize};

/// Which call shape is being protected.
///
/// Used together with the destination identifier as the guard's addressing
/// key, so a destination's streaming calls can be tracked apart from its
/// unary calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CallScope {
    /// Single request, single response.
    Unary,
    /// Stream of requests, single response.
    ClientStream,
    /// Single request, stream of responses.
    ServerStream,
    /// Streams in both directions.
    BidiStream,
}

impl CallScope {
    /// Every scope, in declaration order.
    pub const ALL: [CallScope; 4] = [
        Self::Unary,
        Self::ClientStream,
        Self::ServerStream,
        Self::BidiStream,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unary => "unary",
            Self::ClientStream => "client_stream",
            Self::ServerStream => "server_stream",
            Self::BidiStream => "bidi_stream",
        }
    }
}

impl std::fmt::Display for CallScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_matches_wire_names() {
        let names: Vec<String> = CallScope::ALL.iter().map(|s| s.to_string()).collect();
        assert_eq!(names, ["unary", "client_stream", "server_stream", "bidi_stream"]);
    }

    #[test]
    fn serde_uses_snake_case() {
        let json = serde_json::to_string(&CallScope::BidiStream).unwrap();
        assert_eq!(json, "\"bidi_stream\"");
        let back: CallScope = serde_json::from_str("\"client_stream\"").unwrap();
        assert_eq!(back, CallScope::ClientStream);
    }
}
