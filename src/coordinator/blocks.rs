//! Block and unblock flows for residents and visitors
//!
//! At most one active block exists per subject. The unique index on
//! `subject.external_id` is the real guarantee; the existence check
//! here is the fast path that turns a concurrent duplicate into a clean
//! validation error instead of an index violation.

use bson::{doc, oid::ObjectId};
use serde::Deserialize;
use tracing::info;

use crate::coordinator::{parse_datetime, Coordinator};
use crate::db::schemas::{BlockDoc, BlockSubject};
use crate::ledger::functions;
use crate::saga::Saga;
use crate::services::reaper::unblock_on_ledger;
use crate::types::{GatekeeperError, Result};

/// Input for blocking a subject
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockWindow {
    pub reason: String,
    pub from: String,
    pub from_time: String,
    pub to: String,
    pub to_time: String,
}

impl Coordinator {
    /// Block a resident in both stores
    pub async fn block_resident(
        &self,
        id: ObjectId,
        window: BlockWindow,
        blocked_by: String,
    ) -> Result<()> {
        let resident = self
            .store
            .residents
            .find_one(doc! { "_id": id })
            .await?
            .ok_or_else(|| GatekeeperError::NotFound("Resident not found".into()))?;

        if self
            .store
            .blocks
            .find_one(doc! { "subject.external_id": &resident.external_id })
            .await?
            .is_some()
        {
            return Err(GatekeeperError::Validation("Resident already blocked".into()));
        }

        let from_datetime = parse_datetime(&window.from, &window.from_time)?;
        let to_datetime = parse_datetime(&window.to, &window.to_time)?;

        let block_id = ObjectId::new();
        let mut block = BlockDoc::new(
            BlockSubject::Resident {
                resident_id: id,
                external_id: resident.external_id.clone(),
            },
            window.reason.clone(),
            blocked_by.clone(),
            from_datetime,
            to_datetime,
        );
        block._id = Some(block_id);

        let ledger_args = vec![
            resident.external_id.clone(),
            window.reason.clone(),
            blocked_by,
            window.from.clone(),
            window.from_time.clone(),
            window.to.clone(),
            window.to_time.clone(),
        ];

        let blocks = self.store.blocks.clone();
        let blocks_undo = self.store.blocks.clone();
        let gateway = self.gateway.clone();
        let settings = self.settings.clone();
        let ext = resident.external_id.clone();

        Saga::new("block_resident")
            .compensable_step(
                "local-block-insert",
                move || async move { blocks.insert_one(block).await.map(|_| ()) },
                move || async move {
                    blocks_undo
                        .delete_one(doc! { "_id": block_id })
                        .await
                        .map(|_| ())
                },
            )
            .step("ledger-invoke", move || async move {
                gateway
                    .invoke(
                        &settings.channel,
                        &settings.chaincode,
                        functions::BLOCK_RESIDENT,
                        &ledger_args,
                        &ext,
                        &settings.write_org,
                    )
                    .await
                    .map(|_| ())
            })
            .run()
            .await?;

        info!(external_id = %resident.external_id, "Resident blocked in both stores");
        Ok(())
    }

    /// Remove a resident's block from both stores, re-inserting the
    /// local row if the chain rejects the unblock
    pub async fn unblock_resident(&self, id: ObjectId) -> Result<()> {
        let resident = self
            .store
            .residents
            .find_one(doc! { "_id": id })
            .await?
            .ok_or_else(|| GatekeeperError::NotFound("Resident not found".into()))?;

        self.unblock_subject(&resident.external_id).await
    }

    /// Block a visitor in both stores. The owning resident's block
    /// state is checked too: a blocked resident's visitors do not get
    /// independent passes.
    pub async fn block_visitor(
        &self,
        id: ObjectId,
        window: BlockWindow,
        blocked_by: String,
    ) -> Result<()> {
        let visitor = self
            .store
            .visitors
            .find_one(doc! { "_id": id })
            .await?
            .ok_or_else(|| GatekeeperError::NotFound("Visitor not found".into()))?;

        let existing = self
            .store
            .blocks
            .find_one(doc! { "subject.external_id": {
                "$in": [&visitor.external_id, &visitor.resident_external_id]
            }})
            .await?;
        if existing.is_some() {
            return Err(GatekeeperError::Validation(
                "Visitor or resident already blocked".into(),
            ));
        }

        let from_datetime = parse_datetime(&window.from, &window.from_time)?;
        let to_datetime = parse_datetime(&window.to, &window.to_time)?;

        let block_id = ObjectId::new();
        let mut block = BlockDoc::new(
            BlockSubject::Visitor {
                visitor_id: id,
                external_id: visitor.external_id.clone(),
                resident_external_id: visitor.resident_external_id.clone(),
            },
            window.reason.clone(),
            blocked_by.clone(),
            from_datetime,
            to_datetime,
        );
        block._id = Some(block_id);

        let ledger_args = vec![
            visitor.external_id.clone(),
            visitor.resident_external_id.clone(),
            window.reason.clone(),
            window.from.clone(),
            window.from_time.clone(),
            window.to.clone(),
            window.to_time.clone(),
            blocked_by,
        ];

        let blocks = self.store.blocks.clone();
        let blocks_undo = self.store.blocks.clone();
        let gateway = self.gateway.clone();
        let settings = self.settings.clone();
        let resident_ext = visitor.resident_external_id.clone();

        Saga::new("block_visitor")
            .compensable_step(
                "local-block-insert",
                move || async move { blocks.insert_one(block).await.map(|_| ()) },
                move || async move {
                    blocks_undo
                        .delete_one(doc! { "_id": block_id })
                        .await
                        .map(|_| ())
                },
            )
            .step("ledger-invoke", move || async move {
                gateway
                    .invoke(
                        &settings.channel,
                        &settings.chaincode,
                        functions::BLOCK_VISITOR,
                        &ledger_args,
                        &resident_ext,
                        &settings.write_org,
                    )
                    .await
                    .map(|_| ())
            })
            .run()
            .await?;

        info!(external_id = %visitor.external_id, "Visitor blocked in both stores");
        Ok(())
    }

    /// Remove a visitor's block from both stores
    pub async fn unblock_visitor(&self, id: ObjectId) -> Result<()> {
        let visitor = self
            .store
            .visitors
            .find_one(doc! { "_id": id })
            .await?
            .ok_or_else(|| GatekeeperError::NotFound("Visitor not found".into()))?;

        self.unblock_subject(&visitor.external_id).await
    }

    /// Shared unblock saga: delete the local row first, re-insert the
    /// snapshot if the chain call fails
    async fn unblock_subject(&self, external_id: &str) -> Result<()> {
        let block = self
            .store
            .blocks
            .find_one(doc! { "subject.external_id": external_id })
            .await?
            .ok_or_else(|| GatekeeperError::NotFound("Block entry not found".into()))?;

        let block_id = block
            ._id
            .ok_or_else(|| GatekeeperError::Database("Block row missing id".into()))?;
        let snapshot = block.clone();
        let subject = block.subject.clone();

        let blocks = self.store.blocks.clone();
        let blocks_undo = self.store.blocks.clone();
        let gateway = self.gateway.clone();
        let settings = self.settings.clone();

        Saga::new("unblock_subject")
            .compensable_step(
                "local-block-delete",
                move || async move {
                    blocks
                        .delete_one(doc! { "_id": block_id })
                        .await
                        .map(|_| ())
                },
                move || async move { blocks_undo.insert_one(snapshot).await.map(|_| ()) },
            )
            .step("ledger-invoke", move || async move {
                unblock_on_ledger(gateway.as_ref(), &settings, &subject).await
            })
            .run()
            .await?;

        info!(external_id = %external_id, "Subject unblocked in both stores");
        Ok(())
    }
}
