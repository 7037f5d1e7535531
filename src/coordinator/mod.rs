//! Dual-write coordinator
//!
//! Entity flows that must land in both stores or in neither. Each flow
//! builds a [`Saga`](crate::saga::Saga): local writes first with
//! per-step compensation, then the ledger invoke whose arguments derive
//! from the just-committed local record.
//!
//! Write ordering is pinned per entity type:
//! - resident, visitor, block, unblock, visit-request creation:
//!   local-first, compensated on ledger failure;
//! - visit-request status change: ledger-first, the local status and QR
//!   artifacts are only persisted after the chain accepted the update
//!   (see `requests.rs` for why that flow cannot be compensated).

pub mod blocks;
pub mod requests;
pub mod residents;
pub mod visitors;

use std::sync::Arc;

use crate::db::Store;
use crate::ledger::{IdentityRegistry, LedgerGateway, LedgerSettings};
use crate::services::QrStore;

pub use blocks::BlockWindow;
pub use requests::{NewVisitRequest, StatusChange};
pub use residents::{NewResident, ResidentUpdate};
pub use visitors::{NewVisitor, VisitorUpdate};

/// Shared context for every mutating flow
#[derive(Clone)]
pub struct Coordinator {
    pub(crate) store: Store,
    pub(crate) gateway: Arc<dyn LedgerGateway>,
    pub(crate) settings: LedgerSettings,
    pub(crate) identity: IdentityRegistry,
    pub(crate) qr: QrStore,
}

impl Coordinator {
    pub fn new(
        store: Store,
        gateway: Arc<dyn LedgerGateway>,
        settings: LedgerSettings,
        qr: QrStore,
    ) -> Self {
        let identity = IdentityRegistry::new(Arc::clone(&gateway));
        Self {
            store,
            gateway,
            settings,
            identity,
            qr,
        }
    }
}

/// Parse a "YYYY-MM-DD" + "HH:MM" pair into a bson timestamp
pub(crate) fn parse_datetime(date: &str, time: &str) -> crate::types::Result<bson::DateTime> {
    use chrono::{NaiveDateTime, TimeZone, Utc};

    let naive = NaiveDateTime::parse_from_str(&format!("{}T{}", date, time), "%Y-%m-%dT%H:%M")
        .map_err(|_| {
            crate::types::GatekeeperError::Validation(format!(
                "Invalid date/time '{}T{}'",
                date, time
            ))
        })?;

    Ok(bson::DateTime::from_chrono(
        Utc.from_utc_datetime(&naive),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_datetime() {
        let dt = parse_datetime("2026-08-06", "09:30").unwrap();
        let chrono_dt = dt.to_chrono();
        assert_eq!(chrono_dt.to_rfc3339(), "2026-08-06T09:30:00+00:00");
    }

    #[test]
    fn test_parse_datetime_rejects_garbage() {
        assert!(parse_datetime("tomorrow", "soon").is_err());
        assert!(parse_datetime("2026-08-06", "25:99").is_err());
    }
}
