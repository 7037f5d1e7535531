//! Block document schema
//!
//! A block suspends entry for exactly one subject. The subject is a
//! tagged variant so "resident XOR visitor" is enforced by the type,
//! and the unique index on the subject's external id enforces at most
//! one active block per subject at the storage layer.

use bson::{doc, oid::ObjectId, DateTime, Document};
use mongodb::options::IndexOptions;
use serde::{Deserialize, Serialize};

use crate::db::mongo::{IntoIndexes, MutMetadata};
use crate::db::schemas::Metadata;

/// Collection name for blocks
pub const BLOCK_COLLECTION: &str = "blocks";

/// The one subject a block applies to
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BlockSubject {
    Resident {
        resident_id: ObjectId,
        external_id: String,
    },
    Visitor {
        visitor_id: ObjectId,
        external_id: String,
        /// Owning resident's ledger identity, needed for the compound
        /// ledger key on unblock
        resident_external_id: String,
    },
}

impl BlockSubject {
    /// The ledger-facing identity of the blocked subject
    pub fn external_id(&self) -> &str {
        match self {
            BlockSubject::Resident { external_id, .. } => external_id,
            BlockSubject::Visitor { external_id, .. } => external_id,
        }
    }
}

/// Block document stored in MongoDB
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct BlockDoc {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub _id: Option<ObjectId>,

    #[serde(default)]
    pub metadata: Metadata,

    pub subject: BlockSubject,

    pub reason: String,

    /// User id of the admin who created the block
    pub blocked_by: String,

    pub from_datetime: DateTime,
    pub to_datetime: DateTime,
}

impl BlockDoc {
    pub fn new(
        subject: BlockSubject,
        reason: String,
        blocked_by: String,
        from_datetime: DateTime,
        to_datetime: DateTime,
    ) -> Self {
        Self {
            _id: None,
            metadata: Metadata::new(),
            subject,
            reason,
            blocked_by,
            from_datetime,
            to_datetime,
        }
    }

    /// Whether the block's window has passed
    pub fn is_expired(&self, now: DateTime) -> bool {
        self.to_datetime < now
    }
}

impl IntoIndexes for BlockDoc {
    fn into_indices() -> Vec<(Document, Option<IndexOptions>)> {
        vec![
            // Both variants serialize the subject's ledger identity at
            // the same path, so one unique index covers residents and
            // visitors alike.
            (
                doc! { "subject.external_id": 1 },
                Some(
                    IndexOptions::builder()
                        .unique(true)
                        .name("subject_external_id_unique".to_string())
                        .build(),
                ),
            ),
            (
                doc! { "to_datetime": 1 },
                Some(
                    IndexOptions::builder()
                        .name("to_datetime_index".to_string())
                        .build(),
                ),
            ),
        ]
    }
}

impl MutMetadata for BlockDoc {
    fn mut_metadata(&mut self) -> &mut Metadata {
        &mut self.metadata
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_block(to_millis: i64) -> BlockDoc {
        BlockDoc::new(
            BlockSubject::Resident {
                resident_id: ObjectId::new(),
                external_id: "RES-1001".into(),
            },
            "misconduct".into(),
            "admin".into(),
            DateTime::from_millis(0),
            DateTime::from_millis(to_millis),
        )
    }

    #[test]
    fn test_expiry_boundary() {
        let block = sample_block(10_000);
        assert!(!block.is_expired(DateTime::from_millis(10_000)));
        assert!(block.is_expired(DateTime::from_millis(10_001)));
    }

    #[test]
    fn test_subject_external_id() {
        let block = sample_block(0);
        assert_eq!(block.subject.external_id(), "RES-1001");

        let visitor = BlockSubject::Visitor {
            visitor_id: ObjectId::new(),
            external_id: "VIS-2002".into(),
            resident_external_id: "RES-1001".into(),
        };
        assert_eq!(visitor.external_id(), "VIS-2002");
    }

    #[test]
    fn test_unique_index_enforces_one_active_block() {
        let indices = BlockDoc::into_indices();
        let (keys, opts) = &indices[0];
        assert_eq!(keys.get_i32("subject.external_id").unwrap(), 1);
        assert!(opts.as_ref().unwrap().unique.unwrap());
    }

    #[test]
    fn test_subject_serializes_external_id_at_common_path() {
        // The unique index depends on both variants sharing the path.
        let resident = bson::to_document(&BlockSubject::Resident {
            resident_id: ObjectId::new(),
            external_id: "RES-1".into(),
        })
        .unwrap();
        let visitor = bson::to_document(&BlockSubject::Visitor {
            visitor_id: ObjectId::new(),
            external_id: "VIS-1".into(),
            resident_external_id: "RES-1".into(),
        })
        .unwrap();
        assert_eq!(resident.get_str("external_id").unwrap(), "RES-1");
        assert_eq!(visitor.get_str("external_id").unwrap(), "VIS-1");
    }
}
