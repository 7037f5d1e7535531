//! Document store layer: MongoDB client, typed collections, schemas

pub mod mongo;
pub mod schemas;

pub use mongo::{IntoIndexes, MongoClient, MongoCollection, MutMetadata};

use crate::types::Result;
use schemas::{
    BlockDoc, BuildingDoc, EntryLogDoc, NotificationDoc, ResidentDoc, UserDoc, VisitRequestDoc,
    VisitorDoc, BLOCK_COLLECTION, BUILDING_COLLECTION, ENTRY_LOG_COLLECTION,
    NOTIFICATION_COLLECTION, RESIDENT_COLLECTION, USER_COLLECTION, VISITOR_COLLECTION,
    VISIT_REQUEST_COLLECTION,
};

/// All typed collections, opened once at boot with their indexes applied
#[derive(Clone)]
pub struct Store {
    pub users: MongoCollection<UserDoc>,
    pub residents: MongoCollection<ResidentDoc>,
    pub visitors: MongoCollection<VisitorDoc>,
    pub visit_requests: MongoCollection<VisitRequestDoc>,
    pub blocks: MongoCollection<BlockDoc>,
    pub entry_logs: MongoCollection<EntryLogDoc>,
    pub buildings: MongoCollection<BuildingDoc>,
    pub notifications: MongoCollection<NotificationDoc>,
}

impl Store {
    /// Open every collection and apply schema indexes
    pub async fn new(client: &MongoClient) -> Result<Self> {
        Ok(Self {
            users: client.collection(USER_COLLECTION).await?,
            residents: client.collection(RESIDENT_COLLECTION).await?,
            visitors: client.collection(VISITOR_COLLECTION).await?,
            visit_requests: client.collection(VISIT_REQUEST_COLLECTION).await?,
            blocks: client.collection(BLOCK_COLLECTION).await?,
            entry_logs: client.collection(ENTRY_LOG_COLLECTION).await?,
            buildings: client.collection(BUILDING_COLLECTION).await?,
            notifications: client.collection(NOTIFICATION_COLLECTION).await?,
        })
    }
}
