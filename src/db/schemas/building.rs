//! Building configuration schema
//!
//! A single document carrying the occupancy quotas the registration
//! flows validate against.

use bson::{doc, oid::ObjectId, Document};
use mongodb::options::IndexOptions;
use serde::{Deserialize, Serialize};

use crate::db::mongo::{IntoIndexes, MutMetadata};
use crate::db::schemas::Metadata;

/// Collection name for the building configuration
pub const BUILDING_COLLECTION: &str = "buildings";

/// Building configuration document
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct BuildingDoc {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub _id: Option<ObjectId>,

    #[serde(default)]
    pub metadata: Metadata,

    pub name: String,

    /// Maximum residents registered per apartment
    pub residents_per_apartment: u32,

    /// Maximum standing visitors per resident
    pub max_visitors_per_resident: u32,
}

impl BuildingDoc {
    pub fn new(name: String, residents_per_apartment: u32, max_visitors_per_resident: u32) -> Self {
        Self {
            _id: None,
            metadata: Metadata::new(),
            name,
            residents_per_apartment,
            max_visitors_per_resident,
        }
    }
}

impl IntoIndexes for BuildingDoc {
    fn into_indices() -> Vec<(Document, Option<IndexOptions>)> {
        vec![]
    }
}

impl MutMetadata for BuildingDoc {
    fn mut_metadata(&mut self) -> &mut Metadata {
        &mut self.metadata
    }
}
