//! Ledger gateway boundary
//!
//! The ledger network itself (consensus, chaincode execution) is an
//! external collaborator. Everything the rest of the crate knows about
//! it goes through [`LedgerGateway`]: three operations, bounded
//! timeouts, and a normalizing response adapter so the core consumes a
//! single canonical shape regardless of chaincode version.

pub mod fabric;
pub mod identity;
pub mod response;

#[cfg(test)]
pub mod mock;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub use fabric::FabricGateway;
pub use identity::IdentityRegistry;
pub use response::LedgerRecord;

use crate::config::Args;
use crate::types::Result;

/// Chaincode function names on the resident-management contract
pub mod functions {
    pub const REGISTER_RESIDENT: &str = "RegisterResident";
    pub const UPDATE_RESIDENT: &str = "UpdateResident";
    pub const BLOCK_RESIDENT: &str = "BlockResident";
    pub const UNBLOCK_RESIDENT: &str = "UnblockResident";
    pub const GET_RESIDENT: &str = "GetResident";
    pub const ADD_VISITOR: &str = "AddVisitor";
    pub const UPDATE_VISITOR: &str = "UpdateVisitor";
    pub const BLOCK_VISITOR: &str = "BlockVisitor";
    pub const UNBLOCK_VISITOR: &str = "UnblockVisitor";
    pub const GET_VISITOR: &str = "GetVisitor";
    pub const ADD_VISIT_REQUEST: &str = "AddVisitRequest";
    pub const UPDATE_VISIT_REQUEST_STATUS: &str = "UpdateVisitRequestStatus";
    pub const GET_VISIT_REQUEST: &str = "GetVisitRequest";
    pub const SAVE_ENTRY_LOG: &str = "SaveLogToChain";
}

/// Opaque confirmation that a ledger write was accepted.
///
/// The payload may or may not be JSON depending on the chaincode
/// version; parse failures are informational, not fatal.
#[derive(Debug, Clone)]
pub struct Receipt {
    pub raw: Vec<u8>,
    pub tx_id: Option<String>,
}

impl Receipt {
    /// Attempt to parse the receipt payload as JSON
    pub fn payload_json(&self) -> Option<serde_json::Value> {
        serde_json::from_slice(&self.raw).ok()
    }
}

/// Enrollment credential returned by identity registration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Credential {
    pub identity: String,
    pub org: String,
    pub token: String,
}

/// Abstract interface to the external ledger
#[async_trait]
pub trait LedgerGateway: Send + Sync {
    /// Submit a state-changing chaincode transaction
    async fn invoke(
        &self,
        channel: &str,
        chaincode: &str,
        function: &str,
        args: &[String],
        identity: &str,
        org: &str,
    ) -> Result<Receipt>;

    /// Evaluate a read-only chaincode query
    async fn query(
        &self,
        channel: &str,
        chaincode: &str,
        args: &[String],
        function: &str,
        identity: &str,
        org: &str,
    ) -> Result<LedgerRecord>;

    /// Enroll an identity with the ledger's certificate authority.
    ///
    /// Enrollment is idempotent: re-registering an existing identity
    /// returns its credential rather than failing, which is also how
    /// the login pre-check verifies prior registration.
    async fn register_identity(
        &self,
        identity: &str,
        org: &str,
        role: &str,
        admin: bool,
    ) -> Result<Credential>;
}

/// Channel, chaincode, and organization settings shared by every
/// ledger call site
#[derive(Debug, Clone)]
pub struct LedgerSettings {
    pub channel: String,
    pub chaincode: String,
    /// Org for resident-facing writes
    pub write_org: String,
    /// Org for scanner-side reads
    pub read_org: String,
    /// Identity for scanner-side reads
    pub read_identity: String,
}

impl LedgerSettings {
    pub fn from_args(args: &Args) -> Self {
        Self {
            channel: args.ledger_channel.clone(),
            chaincode: args.ledger_chaincode.clone(),
            write_org: args.ledger_write_org.clone(),
            read_org: args.ledger_read_org.clone(),
            read_identity: args.ledger_read_identity.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_receipt_payload_parse_is_defensive() {
        let json = Receipt {
            raw: br#"{"txId":"abc"}"#.to_vec(),
            tx_id: None,
        };
        assert!(json.payload_json().is_some());

        // Non-JSON payloads are legal; absence of a parse is not failure
        let opaque = Receipt {
            raw: b"OK: committed".to_vec(),
            tx_id: None,
        };
        assert!(opaque.payload_json().is_none());
    }
}
