//! Visitor document schema

use bson::{doc, oid::ObjectId, Document};
use mongodb::options::IndexOptions;
use serde::{Deserialize, Serialize};

use crate::db::mongo::{IntoIndexes, MutMetadata};
use crate::db::schemas::Metadata;

/// Collection name for visitors
pub const VISITOR_COLLECTION: &str = "visitors";

/// Visitor document stored in MongoDB
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct VisitorDoc {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub _id: Option<ObjectId>,

    #[serde(default)]
    pub metadata: Metadata,

    /// Ledger-facing identity ("VIS-xxxx"), immutable once assigned
    pub external_id: String,

    pub full_name: String,
    pub phone: String,

    /// Daily visit window, "HH:MM" wall-clock strings
    pub visit_time_from: String,
    pub visit_time_to: String,

    pub relationship: String,

    /// Owning resident document
    pub resident_id: ObjectId,

    /// Owning resident's ledger identity, part of the compound ledger key
    pub resident_external_id: String,

    /// QR token embedded in the visitor's QR image (the external_id itself)
    pub qr_token: String,

    /// QR image filename under the visitors category
    pub qr_image: String,
}

impl VisitorDoc {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        external_id: String,
        full_name: String,
        phone: String,
        visit_time_from: String,
        visit_time_to: String,
        relationship: String,
        resident_id: ObjectId,
        resident_external_id: String,
    ) -> Self {
        let qr_image = format!("{}.png", external_id);
        Self {
            _id: None,
            metadata: Metadata::new(),
            qr_token: external_id.clone(),
            qr_image,
            external_id,
            full_name,
            phone,
            visit_time_from,
            visit_time_to,
            relationship,
            resident_id,
            resident_external_id,
        }
    }
}

impl IntoIndexes for VisitorDoc {
    fn into_indices() -> Vec<(Document, Option<IndexOptions>)> {
        vec![
            (
                doc! { "external_id": 1 },
                Some(
                    IndexOptions::builder()
                        .unique(true)
                        .name("external_id_unique".to_string())
                        .build(),
                ),
            ),
            (
                doc! { "phone": 1 },
                Some(
                    IndexOptions::builder()
                        .unique(true)
                        .name("phone_unique".to_string())
                        .build(),
                ),
            ),
            (
                doc! { "resident_id": 1 },
                Some(
                    IndexOptions::builder()
                        .name("resident_id_index".to_string())
                        .build(),
                ),
            ),
        ]
    }
}

impl MutMetadata for VisitorDoc {
    fn mut_metadata(&mut self) -> &mut Metadata {
        &mut self.metadata
    }
}
