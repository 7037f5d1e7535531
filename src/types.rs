//! Shared error and result types for Gatekeeper
//!
//! The error taxonomy mirrors the dual-store design: validation and
//! not-found errors carry no side effects, ledger errors may trigger
//! compensation, and `PartialFailure` reports what state the two stores
//! were left in when a compensated flow went wrong.

use thiserror::Error;

/// Top-level error type for Gatekeeper operations
#[derive(Error, Debug)]
pub enum GatekeeperError {
    /// Bad input or a domain rule rejected the request (quota, duplicate)
    #[error("Validation error: {0}")]
    Validation(String),

    /// A record was missing locally or on the ledger
    #[error("Not found: {0}")]
    NotFound(String),

    /// Authentication or authorization failure
    #[error("Auth error: {0}")]
    Auth(String),

    /// Local document store failure
    #[error("Database error: {0}")]
    Database(String),

    /// Ledger gateway failure: call failed, timed out, or returned
    /// malformed data in a context that required it
    #[error("Ledger error: {0}")]
    Ledger(String),

    /// A dual-write flow failed after the local commit.
    ///
    /// `compensated == true` means the local write was undone and the
    /// stores agree again. `compensated == false` means the undo itself
    /// failed and the stores have diverged; this is the only case that
    /// needs operator reconciliation.
    #[error("Partial failure in '{flow}' at step '{step}' (compensated: {compensated}): {detail}")]
    PartialFailure {
        flow: &'static str,
        step: &'static str,
        compensated: bool,
        detail: String,
    },

    /// HTTP-layer failure (body parse, oversized payload)
    #[error("HTTP error: {0}")]
    Http(String),

    /// Configuration error
    #[error("Config error: {0}")]
    Config(String),
}

impl GatekeeperError {
    /// Whether this error left the two stores in a diverged state
    pub fn is_diverged(&self) -> bool {
        matches!(
            self,
            GatekeeperError::PartialFailure {
                compensated: false,
                ..
            }
        )
    }
}

/// Convenience result alias
pub type Result<T> = std::result::Result<T, GatekeeperError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_failure_divergence() {
        let undone = GatekeeperError::PartialFailure {
            flow: "add_visitor",
            step: "ledger-invoke",
            compensated: true,
            detail: "bridge unreachable".into(),
        };
        assert!(!undone.is_diverged());

        let diverged = GatekeeperError::PartialFailure {
            flow: "add_visitor",
            step: "ledger-invoke",
            compensated: false,
            detail: "bridge unreachable; delete also failed".into(),
        };
        assert!(diverged.is_diverged());
        assert!(diverged.to_string().contains("compensated: false"));
    }

    #[test]
    fn test_validation_is_not_divergence() {
        assert!(!GatekeeperError::Validation("phone taken".into()).is_diverged());
    }
}
