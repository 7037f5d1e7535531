//! Resident document schema

use bson::{doc, oid::ObjectId, Document};
use mongodb::options::IndexOptions;
use serde::{Deserialize, Serialize};

use crate::db::mongo::{IntoIndexes, MutMetadata};
use crate::db::schemas::Metadata;

/// Collection name for residents
pub const RESIDENT_COLLECTION: &str = "residents";

/// Resident document stored in MongoDB
///
/// The ledger holds the canonical copy keyed by `external_id`; this
/// document carries the operational fields the UI needs.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct ResidentDoc {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub _id: Option<ObjectId>,

    #[serde(default)]
    pub metadata: Metadata,

    /// Owning user document
    pub user_id: ObjectId,

    /// Ledger-facing identity ("RES-xxxx"), immutable once assigned
    pub external_id: String,

    pub gender: String,
    pub marital_status: String,
    pub resident_type: String,
    pub apartment: String,

    /// Visitors registered under this resident
    #[serde(default)]
    pub visitors: Vec<ObjectId>,

    /// QR token embedded in the resident's QR image (the external_id itself)
    pub qr_token: String,

    /// QR image filename under the residents category
    pub qr_image: String,
}

impl ResidentDoc {
    pub fn new(
        user_id: ObjectId,
        external_id: String,
        gender: String,
        marital_status: String,
        resident_type: String,
        apartment: String,
    ) -> Self {
        let qr_image = format!("{}.png", external_id);
        Self {
            _id: None,
            metadata: Metadata::new(),
            user_id,
            qr_token: external_id.clone(),
            qr_image,
            external_id,
            gender,
            marital_status,
            resident_type,
            apartment,
            visitors: Vec::new(),
        }
    }
}

impl IntoIndexes for ResidentDoc {
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
                doc! { "user_id": 1 },
                Some(
                    IndexOptions::builder()
                        .name("user_id_index".to_string())
                        .build(),
                ),
            ),
            (
                doc! { "apartment": 1 },
                Some(
                    IndexOptions::builder()
                        .name("apartment_index".to_string())
                        .build(),
                ),
            ),
        ]
    }
}

impl MutMetadata for ResidentDoc {
    fn mut_metadata(&mut self) -> &mut Metadata {
        &mut self.metadata
    }
}
