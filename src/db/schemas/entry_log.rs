//! Entry log document schema
//!
//! Append-only record of physical entry events. Rows are never mutated
//! after the fact except for the `ledger_status` annotation written
//! when the best-effort ledger mirror fails.

use bson::{doc, oid::ObjectId, DateTime, Document};
use mongodb::options::IndexOptions;
use serde::{Deserialize, Serialize};

use crate::db::mongo::{IntoIndexes, MutMetadata};
use crate::db::schemas::Metadata;

/// Collection name for entry logs
pub const ENTRY_LOG_COLLECTION: &str = "entry_logs";

/// The one subject an entry event belongs to
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EntrySubject {
    Resident {
        resident_id: ObjectId,
        external_id: String,
    },
    Visitor {
        visitor_id: ObjectId,
        external_id: String,
    },
    VisitRequest {
        visit_request_id: ObjectId,
        request_id: String,
    },
}

impl EntrySubject {
    /// The token the subject was admitted under
    pub fn token(&self) -> &str {
        match self {
            EntrySubject::Resident { external_id, .. } => external_id,
            EntrySubject::Visitor { external_id, .. } => external_id,
            EntrySubject::VisitRequest { request_id, .. } => request_id,
        }
    }
}

/// Direction of an entry event
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum EntryAction {
    Enter,
    Leave,
}

impl EntryAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntryAction::Enter => "enter",
            EntryAction::Leave => "leave",
        }
    }
}

/// Entry log document stored in MongoDB
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct EntryLogDoc {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub _id: Option<ObjectId>,

    #[serde(default)]
    pub metadata: Metadata,

    pub subject: EntrySubject,

    #[serde(rename = "type")]
    pub action: EntryAction,

    pub timestamp: DateTime,

    /// Set to "failed" when the best-effort ledger mirror did not land;
    /// absent otherwise
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ledger_status: Option<String>,
}

impl EntryLogDoc {
    pub fn enter(subject: EntrySubject, timestamp: DateTime) -> Self {
        Self {
            _id: None,
            metadata: Metadata::new(),
            subject,
            action: EntryAction::Enter,
            timestamp,
            ledger_status: None,
        }
    }
}

impl IntoIndexes for EntryLogDoc {
    fn into_indices() -> Vec<(Document, Option<IndexOptions>)> {
        vec![(
            doc! { "timestamp": -1 },
            Some(
                IndexOptions::builder()
                    .name("timestamp_index".to_string())
                    .build(),
            ),
        )]
    }
}

impl MutMetadata for EntryLogDoc {
    fn mut_metadata(&mut self) -> &mut Metadata {
        &mut self.metadata
    }
}
