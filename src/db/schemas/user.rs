//! User document schema
//!
//! Stores login credentials and the ledger-facing identity mapping.

use bson::{doc, oid::ObjectId, Document};
use mongodb::options::IndexOptions;
use serde::{Deserialize, Serialize};

use crate::db::mongo::{IntoIndexes, MutMetadata};
use crate::db::schemas::Metadata;

/// Collection name for users
pub const USER_COLLECTION: &str = "users";

/// Role of a user account
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    Resident,
    Admin,
}

impl UserRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserRole::Resident => "resident",
            UserRole::Admin => "admin",
        }
    }
}

/// User document stored in MongoDB
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct UserDoc {
    /// MongoDB document ID
    #[serde(skip_serializing_if = "Option::is_none")]
    pub _id: Option<ObjectId>,

    /// Common metadata (created_at, updated_at)
    #[serde(default)]
    pub metadata: Metadata,

    /// Ledger-facing identity shared with the chain ("RES-xxxx" or admin name)
    pub external_id: String,

    pub name: String,
    pub email: String,
    pub phone: String,

    /// Argon2 password hash (PHC format)
    pub password_hash: String,

    pub role: UserRole,

    /// Uploaded profile image filename, empty when none
    #[serde(default)]
    pub profile_image: String,
}

impl UserDoc {
    pub fn new(
        external_id: String,
        name: String,
        email: String,
        phone: String,
        password_hash: String,
        role: UserRole,
    ) -> Self {
        Self {
            _id: None,
            metadata: Metadata::new(),
            external_id,
            name,
            email,
            phone,
            password_hash,
            role,
            profile_image: String::new(),
        }
    }
}

impl IntoIndexes for UserDoc {
    fn into_indices() -> Vec<(Document, Option<IndexOptions>)> {
        vec![
            (
                doc! { "email": 1 },
                Some(
                    IndexOptions::builder()
                        .unique(true)
                        .name("email_unique".to_string())
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
                doc! { "external_id": 1 },
                Some(
                    IndexOptions::builder()
                        .name("external_id_index".to_string())
                        .build(),
                ),
            ),
        ]
    }
}

impl MutMetadata for UserDoc {
    fn mut_metadata(&mut self) -> &mut Metadata {
        &mut self.metadata
    }
}
