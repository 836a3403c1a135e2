//! Error classification — which transport failures count against the guard.
//!
//! Only infrastructure-level failures are attributed to the guard.
//! Application-level statuses (`InvalidArgument`, `NotFound`, ...) pass
//! through untouched and never move guard state.

use tonic::{Code, Status};

/// The codes counted by default.
pub const RESOURCE_FAILURE_CODES: [Code; 4] = [
    Code::DeadlineExceeded,
    Code::ResourceExhausted,
    Code::Unavailable,
    Code::Unknown,
];

/// Returns `true` if `code` is one of [`RESOURCE_FAILURE_CODES`].
pub fn is_resource_failure(code: Code) -> bool {
    RESOURCE_FAILURE_CODES.contains(&code)
}

/// Decides whether a failed call is recorded against the guard.
pub trait ErrorClassifier: Send + Sync {
    fn counts_against_guard(&self, status: &Status) -> bool;
}

/// Classifies by status code membership.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodeClassifier {
    codes: Vec<Code>,
}

impl CodeClassifier {
    /// Count exactly `codes` as resource failures.
    pub fn new(codes: impl IntoIterator<Item = Code>) -> Self {
        let mut unique = Vec::new();
        for code in codes {
            if !unique.contains(&code) {
                unique.push(code);
            }
        }
        Self { codes: unique }
    }

    pub fn codes(&self) -> &[Code] {
        &self.codes
    }
}

impl Default for CodeClassifier {
    fn default() -> Self {
        Self::new(RESOURCE_FAILURE_CODES)
    }
}

impl ErrorClassifier for CodeClassifier {
    fn counts_against_guard(&self, status: &Status) -> bool {
        self.codes.contains(&status.code())
    }
}
