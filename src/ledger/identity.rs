//! Identity registry
//!
//! Maps a human entity to a ledger identity. Residents enroll under the
//! write org keyed by their external id; admins enroll under the read
//! org keyed by name. The leaf dependency of every write flow.

use std::sync::Arc;
use tracing::info;

use crate::db::schemas::UserRole;
use crate::ledger::{Credential, LedgerGateway};
use crate::types::{GatekeeperError, Result};

/// Registry wrapping identity enrollment and registration checks
#[derive(Clone)]
pub struct IdentityRegistry {
    gateway: Arc<dyn LedgerGateway>,
}

impl IdentityRegistry {
    pub fn new(gateway: Arc<dyn LedgerGateway>) -> Self {
        Self { gateway }
    }

    /// Enroll an identity, or fetch its credential if already enrolled.
    ///
    /// Enrollment is idempotent on the bridge side, so this doubles as
    /// ensure-registered for first-time registration flows.
    pub async fn ensure_registered(
        &self,
        external_id: &str,
        org: &str,
        role: UserRole,
    ) -> Result<Credential> {
        let credential = self
            .gateway
            .register_identity(
                external_id,
                org,
                role.as_str(),
                matches!(role, UserRole::Admin),
            )
            .await?;

        info!(identity = %external_id, org = %org, "Ledger identity registered");
        Ok(credential)
    }

    /// Check that an identity is already enrolled.
    ///
    /// Used as the login pre-check: a credential comes back for a known
    /// identity, an enrollment rejection means the entity was never
    /// registered. Gateway outages propagate as ledger errors so the
    /// caller can distinguish "not registered" from "cannot tell".
    pub async fn verify_enrolled(&self, external_id: &str, org: &str, role: UserRole) -> Result<()> {
        match self
            .gateway
            .register_identity(
                external_id,
                org,
                role.as_str(),
                matches!(role, UserRole::Admin),
            )
            .await
        {
            Ok(_) => Ok(()),
            Err(GatekeeperError::Ledger(msg)) if msg.contains("rejected") => Err(
                GatekeeperError::Auth(format!("{} is not registered on the ledger", external_id)),
            ),
            Err(e) => Err(e),
        }
    }
}
