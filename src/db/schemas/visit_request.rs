//! Visit request document schema
//!
//! `request_id` is generated before either store is written and is the
//! shared key between MongoDB and the ledger.

use bson::{doc, oid::ObjectId, Document};
use mongodb::options::IndexOptions;
use serde::{Deserialize, Serialize};

use crate::db::mongo::{IntoIndexes, MutMetadata};
use crate::db::schemas::Metadata;

/// Collection name for visit requests
pub const VISIT_REQUEST_COLLECTION: &str = "visit_requests";

/// Lifecycle status of a visit request.
///
/// A request is created pending and transitions exactly once to
/// accepted or rejected; both are terminal.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RequestStatus {
    Pending,
    Accepted,
    Rejected,
}

impl RequestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RequestStatus::Pending => "pending",
            RequestStatus::Accepted => "accepted",
            RequestStatus::Rejected => "rejected",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, RequestStatus::Pending)
    }
}

/// Visit request document stored in MongoDB
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct VisitRequestDoc {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub _id: Option<ObjectId>,

    #[serde(default)]
    pub metadata: Metadata,

    /// Shared key between MongoDB and the ledger ("REQ-xxxx")
    pub request_id: String,

    /// User who created the request
    pub created_by: ObjectId,

    /// Resident the visit targets
    pub target_resident: ObjectId,

    pub visitor_name: String,
    pub visitor_phone: String,

    /// Request type (e.g. "guest", "delivery")
    pub request_type: String,

    pub visit_purpose: String,

    #[serde(default)]
    pub custom_reason: String,

    /// Visit window: date "YYYY-MM-DD" plus "HH:MM" bounds
    pub visit_date: String,
    pub visit_time_from: String,
    pub visit_time_to: String,

    pub status: RequestStatus,

    /// QR token, present only once the request is accepted
    #[serde(skip_serializing_if = "Option::is_none")]
    pub qr_token: Option<String>,

    /// QR image filename, present only once the request is accepted
    #[serde(skip_serializing_if = "Option::is_none")]
    pub qr_image: Option<String>,
}

impl VisitRequestDoc {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        request_id: String,
        created_by: ObjectId,
        target_resident: ObjectId,
        visitor_name: String,
        visitor_phone: String,
        request_type: String,
        visit_purpose: String,
        custom_reason: String,
        visit_date: String,
        visit_time_from: String,
        visit_time_to: String,
    ) -> Self {
        Self {
            _id: None,
            metadata: Metadata::new(),
            request_id,
            created_by,
            target_resident,
            visitor_name,
            visitor_phone,
            request_type,
            visit_purpose,
            custom_reason,
            visit_date,
            visit_time_from,
            visit_time_to,
            status: RequestStatus::Pending,
            qr_token: None,
            qr_image: None,
        }
    }
}

impl IntoIndexes for VisitRequestDoc {
    fn into_indices() -> Vec<(Document, Option<IndexOptions>)> {
        vec![
            (
                doc! { "request_id": 1 },
                Some(
                    IndexOptions::builder()
                        .unique(true)
                        .name("request_id_unique".to_string())
                        .build(),
                ),
            ),
            (
                doc! { "target_resident": 1 },
                Some(
                    IndexOptions::builder()
                        .name("target_resident_index".to_string())
                        .build(),
                ),
            ),
        ]
    }
}

impl MutMetadata for VisitRequestDoc {
    fn mut_metadata(&mut self) -> &mut Metadata {
        &mut self.metadata
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_terminality() {
        assert!(!RequestStatus::Pending.is_terminal());
        assert!(RequestStatus::Accepted.is_terminal());
        assert!(RequestStatus::Rejected.is_terminal());
    }

    #[test]
    fn test_new_request_has_no_qr() {
        let req = VisitRequestDoc::new(
            "REQ-1234".into(),
            ObjectId::new(),
            ObjectId::new(),
            "Jess Doe".into(),
            "555-0100".into(),
            "guest".into(),
            "family visit".into(),
            String::new(),
            "2026-08-06".into(),
            "09:00".into(),
            "11:00".into(),
        );
        assert_eq!(req.status, RequestStatus::Pending);
        assert!(req.qr_token.is_none());
        assert!(req.qr_image.is_none());
    }
}
