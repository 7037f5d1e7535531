//! Entry verification state machine
//!
//! Drives a scanned QR token through:
//! Classify -> FetchTruth -> CheckBlocked -> CheckWindow -> RecordLocal
//! -> LogLedger (best-effort) -> Done, with Rejected terminal states
//! along the way.
//!
//! The ledger is authoritative for the admit/deny decision; the local
//! document is a required display companion. The one deliberate
//! inversion of the dual-write rule lives here: once the local entry
//! log is committed the admission stands, and a failed ledger mirror
//! only annotates the row. Physical access is never retroactively
//! revoked because of a ledger hiccup.

pub mod policy;

use bson::{doc, oid::ObjectId, DateTime};
use chrono::Utc;
use serde_json::json;
use std::sync::Arc;
use tracing::{info, warn};

pub use policy::{classify, Rejection, TokenKind};

use crate::db::schemas::{EntryAction, EntryLogDoc, EntrySubject};
use crate::db::Store;
use crate::ledger::{functions, LedgerGateway, LedgerSettings, Receipt};
use crate::types::{GatekeeperError, Result};

/// Terminal outcome of a verification
#[derive(Debug)]
pub enum ScanOutcome {
    Admitted(Admission),
    Rejected(Rejection),
}

/// A granted entry with its recorded subject and display payload
#[derive(Debug)]
pub struct Admission {
    pub subject: EntrySubject,
    pub action: EntryAction,
    /// Local metadata for the scanner UI
    pub display: serde_json::Value,
    /// Whether the best-effort ledger mirror landed
    pub ledger_mirrored: bool,
}

/// Best-effort mirror of an entry event onto the ledger
pub async fn mirror_entry(
    gateway: &dyn LedgerGateway,
    settings: &LedgerSettings,
    token: &str,
    action: EntryAction,
    unix_timestamp: i64,
) -> Result<Receipt> {
    gateway
        .invoke(
            &settings.channel,
            &settings.chaincode,
            functions::SAVE_ENTRY_LOG,
            &[
                token.to_string(),
                action.as_str().to_string(),
                unix_timestamp.to_string(),
            ],
            &settings.read_identity,
            &settings.read_org,
        )
        .await
}

/// The verification state machine over the two stores
pub struct Scanner {
    store: Store,
    gateway: Arc<dyn LedgerGateway>,
    settings: LedgerSettings,
}

impl Scanner {
    pub fn new(store: Store, gateway: Arc<dyn LedgerGateway>, settings: LedgerSettings) -> Self {
        Self {
            store,
            gateway,
            settings,
        }
    }

    /// Verify a scanned token end to end
    pub async fn verify(&self, token: &str) -> Result<ScanOutcome> {
        let Some(kind) = classify(token) else {
            return Ok(ScanOutcome::Rejected(Rejection::InvalidToken));
        };

        match kind {
            TokenKind::Resident => self.verify_resident(token).await,
            TokenKind::Visitor => self.verify_visitor(token).await,
            TokenKind::Request => self.verify_request(token).await,
        }
    }

    async fn verify_resident(&self, token: &str) -> Result<ScanOutcome> {
        // FetchTruth: the chain record decides
        let record = self
            .gateway
            .query(
                &self.settings.channel,
                &self.settings.chaincode,
                &[token.to_string()],
                functions::GET_RESIDENT,
                &self.settings.read_identity,
                &self.settings.read_org,
            )
            .await?;

        if let Err(rejection) = policy::check_resident(&record) {
            return reject(rejection);
        }

        // Local metadata is required for display but not authoritative
        let Some(resident) = self
            .store
            .residents
            .find_one(doc! { "external_id": token })
            .await?
        else {
            return Ok(ScanOutcome::Rejected(Rejection::NotFound(
                "Resident metadata",
            )));
        };

        let user = self
            .store
            .users
            .find_one(doc! { "_id": resident.user_id })
            .await?;

        let display = json!({
            "externalId": resident.external_id,
            "apartment": resident.apartment,
            "name": user.as_ref().map(|u| u.name.clone()),
            "email": user.as_ref().map(|u| u.email.clone()),
        });

        let subject = EntrySubject::Resident {
            resident_id: resident._id.unwrap_or_else(ObjectId::new),
            external_id: resident.external_id.clone(),
        };

        self.record_and_mirror(subject, display).await
    }

    async fn verify_visitor(&self, token: &str) -> Result<ScanOutcome> {
        // The compound chain key needs the owning resident, so the
        // metadata lookup comes first for this kind
        let Some(visitor) = self
            .store
            .visitors
            .find_one(doc! { "external_id": token })
            .await?
        else {
            return Ok(ScanOutcome::Rejected(Rejection::NotFound(
                "Visitor metadata",
            )));
        };

        let record = self
            .gateway
            .query(
                &self.settings.channel,
                &self.settings.chaincode,
                &[visitor.resident_external_id.clone(), token.to_string()],
                functions::GET_VISITOR,
                &self.settings.read_identity,
                &self.settings.read_org,
            )
            .await?;

        if let Err(rejection) = policy::check_visitor(&record, Utc::now().naive_utc()) {
            return reject(rejection);
        }

        let display = json!({
            "externalId": visitor.external_id,
            "fullName": visitor.full_name,
            "relationship": visitor.relationship,
            "residentExternalId": visitor.resident_external_id,
        });

        let subject = EntrySubject::Visitor {
            visitor_id: visitor._id.unwrap_or_else(ObjectId::new),
            external_id: visitor.external_id.clone(),
        };

        self.record_and_mirror(subject, display).await
    }

    async fn verify_request(&self, token: &str) -> Result<ScanOutcome> {
        let record = self
            .gateway
            .query(
                &self.settings.channel,
                &self.settings.chaincode,
                &[token.to_string()],
                functions::GET_VISIT_REQUEST,
                &self.settings.read_identity,
                &self.settings.read_org,
            )
            .await?;

        if let Err(rejection) = policy::check_request(&record, Utc::now().naive_utc()) {
            return reject(rejection);
        }

        let Some(request) = self
            .store
            .visit_requests
            .find_one(doc! { "request_id": token })
            .await?
        else {
            return Ok(ScanOutcome::Rejected(Rejection::NotFound(
                "Visit request metadata",
            )));
        };

        let display = json!({
            "requestId": request.request_id,
            "visitorName": request.visitor_name,
            "visitDate": request.visit_date,
            "visitTimeFrom": request.visit_time_from,
            "visitTimeTo": request.visit_time_to,
        });

        let subject = EntrySubject::VisitRequest {
            visit_request_id: request._id.unwrap_or_else(ObjectId::new),
            request_id: request.request_id.clone(),
        };

        self.record_and_mirror(subject, display).await
    }

    /// RecordLocal then LogLedger. The local append commits the
    /// admission; the mirror failure only annotates it.
    async fn record_and_mirror(
        &self,
        subject: EntrySubject,
        display: serde_json::Value,
    ) -> Result<ScanOutcome> {
        let now = DateTime::now();
        let mut log = EntryLogDoc::enter(subject.clone(), now);
        let log_id = ObjectId::new();
        log._id = Some(log_id);

        self.store.entry_logs.insert_one(log).await?;

        let unix_timestamp = now.timestamp_millis() / 1000;
        let mirrored = match mirror_entry(
            self.gateway.as_ref(),
            &self.settings,
            subject.token(),
            EntryAction::Enter,
            unix_timestamp,
        )
        .await
        {
            Ok(_) => true,
            Err(e) => {
                warn!(token = %subject.token(), error = %e, "Ledger entry mirror failed");
                if let Err(annotate_err) = self
                    .store
                    .entry_logs
                    .update_one(
                        doc! { "_id": log_id },
                        doc! { "$set": { "ledger_status": "failed" } },
                    )
                    .await
                {
                    warn!(error = %annotate_err, "Failed to annotate entry log");
                }
                false
            }
        };

        info!(token = %subject.token(), mirrored, "Entry admitted");

        Ok(ScanOutcome::Admitted(Admission {
            subject,
            action: EntryAction::Enter,
            display,
            ledger_mirrored: mirrored,
        }))
    }
}

/// Map a policy rejection into an outcome, promoting malformed ledger
/// data to a ledger error since the decision required it
fn reject(rejection: Rejection) -> Result<ScanOutcome> {
    if let Rejection::Malformed(detail) = rejection {
        return Err(GatekeeperError::Ledger(detail));
    }
    Ok(ScanOutcome::Rejected(rejection))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::mock::MockLedger;
    use chrono::{NaiveDate, NaiveTime};

    fn settings() -> LedgerSettings {
        LedgerSettings {
            channel: "residentschannel".into(),
            chaincode: "residentManagement".into(),
            write_org: "Org1".into(),
            read_org: "Org2".into(),
            read_identity: "admin2".into(),
        }
    }

    fn at(time: &str) -> chrono::NaiveDateTime {
        NaiveDate::parse_from_str("2026-08-06", "%Y-%m-%d")
            .unwrap()
            .and_time(NaiveTime::parse_from_str(time, "%H:%M").unwrap())
    }

    /// End-to-end over the ledger side of the machine: register a
    /// resident, create and accept a visit request, then verify its
    /// token inside the window and mirror exactly one entry event.
    #[tokio::test]
    async fn test_accepted_request_admits_and_mirrors_one_log() {
        let ledger = MockLedger::new();
        let s = settings();

        ledger
            .invoke(
                &s.channel,
                &s.chaincode,
                functions::REGISTER_RESIDENT,
                &[
                    "RES-1001".into(),
                    "Sam Resident".into(),
                    "sam@example.com".into(),
                    "555-0100".into(),
                    "male".into(),
                    "single".into(),
                    "owner".into(),
                    "A-12".into(),
                ],
                "RES-1001",
                &s.write_org,
            )
            .await
            .unwrap();

        ledger
            .invoke(
                &s.channel,
                &s.chaincode,
                functions::ADD_VISIT_REQUEST,
                &[
                    "REQ-0001".into(),
                    "admin".into(),
                    "RES-1001".into(),
                    "Jess Doe".into(),
                    "555-0199".into(),
                    "guest".into(),
                    "family visit".into(),
                    String::new(),
                    "09:00".into(),
                    "11:00".into(),
                    "2026-08-06".into(),
                ],
                "RES-1001",
                &s.write_org,
            )
            .await
            .unwrap();

        ledger
            .invoke(
                &s.channel,
                &s.chaincode,
                functions::UPDATE_VISIT_REQUEST_STATUS,
                &["REQ-0001".into(), "accepted".into(), "admin".into()],
                "RES-1001",
                &s.write_org,
            )
            .await
            .unwrap();

        // FetchTruth + policy at 10:00 inside the window
        let record = ledger
            .query(
                &s.channel,
                &s.chaincode,
                &["REQ-0001".to_string()],
                functions::GET_VISIT_REQUEST,
                &s.read_identity,
                &s.read_org,
            )
            .await
            .unwrap();
        assert_eq!(policy::check_request(&record, at("10:00")), Ok(()));

        // RecordLocal is Mongo-side; the mirror is what lands on chain
        mirror_entry(&ledger, &s, "REQ-0001", EntryAction::Enter, 1_786_000_000)
            .await
            .unwrap();

        let logs = ledger.entry_logs();
        assert_eq!(logs.len(), 1);
        assert_eq!(logs[0]["token"], "REQ-0001");
        assert_eq!(logs[0]["action"], "enter");
    }

    #[tokio::test]
    async fn test_pending_request_rejected_not_accepted() {
        let ledger = MockLedger::new();
        let s = settings();

        ledger
            .invoke(
                &s.channel,
                &s.chaincode,
                functions::ADD_VISIT_REQUEST,
                &[
                    "REQ-0002".into(),
                    "admin".into(),
                    "RES-1001".into(),
                    "Jess Doe".into(),
                    "555-0199".into(),
                    "guest".into(),
                    "family visit".into(),
                    String::new(),
                    "09:00".into(),
                    "11:00".into(),
                    "2026-08-06".into(),
                ],
                "RES-1001",
                &s.write_org,
            )
            .await
            .unwrap();

        let record = ledger
            .query(
                &s.channel,
                &s.chaincode,
                &["REQ-0002".to_string()],
                functions::GET_VISIT_REQUEST,
                &s.read_identity,
                &s.read_org,
            )
            .await
            .unwrap();

        assert_eq!(
            policy::check_request(&record, at("10:00")),
            Err(Rejection::NotAccepted)
        );
    }

    #[tokio::test]
    async fn test_blocked_resident_rejected_from_chain_truth() {
        let ledger = MockLedger::new();
        let s = settings();

        ledger
            .invoke(
                &s.channel,
                &s.chaincode,
                functions::REGISTER_RESIDENT,
                &[
                    "RES-2001".into(),
                    "Pat Resident".into(),
                    "pat@example.com".into(),
                    "555-0101".into(),
                    "female".into(),
                    "married".into(),
                    "tenant".into(),
                    "B-3".into(),
                ],
                "RES-2001",
                &s.write_org,
            )
            .await
            .unwrap();

        ledger
            .invoke(
                &s.channel,
                &s.chaincode,
                functions::BLOCK_RESIDENT,
                &[
                    "RES-2001".into(),
                    "misconduct".into(),
                    "admin".into(),
                    "2026-08-01".into(),
                    "00:00".into(),
                    "2026-08-31".into(),
                    "23:59".into(),
                ],
                "RES-2001",
                &s.write_org,
            )
            .await
            .unwrap();

        let record = ledger
            .query(
                &s.channel,
                &s.chaincode,
                &["RES-2001".to_string()],
                functions::GET_RESIDENT,
                &s.read_identity,
                &s.read_org,
            )
            .await
            .unwrap();

        assert_eq!(
            policy::check_resident(&record),
            Err(Rejection::Blocked(TokenKind::Resident))
        );
    }

    #[tokio::test]
    async fn test_mirror_failure_does_not_error() {
        let ledger = MockLedger::new();
        ledger.fail_function(functions::SAVE_ENTRY_LOG);
        let s = settings();

        // The caller treats this as an annotation, never a failure of
        // the admission itself
        let result = mirror_entry(&ledger, &s, "RES-1001", EntryAction::Enter, 0).await;
        assert!(result.is_err());
        assert!(ledger.entry_logs().is_empty());
    }
}
