//! Visitor registration, update, and deletion flows

use bson::{doc, oid::ObjectId};
use serde::Deserialize;
use tracing::{info, warn};

use crate::coordinator::Coordinator;
use crate::db::schemas::VisitorDoc;
use crate::ledger::functions;
use crate::saga::Saga;
use crate::services::{idgen, QrCategory};
use crate::types::{GatekeeperError, Result};

/// Input for registering a visitor under a resident
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewVisitor {
    pub full_name: String,
    pub phone: String,
    pub visit_time_from: String,
    pub visit_time_to: String,
    pub relationship: String,
    /// Resident document id (hex); admins pass it explicitly, residents
    /// default to their own
    #[serde(default)]
    pub resident_id: Option<String>,
}

/// Updatable visitor fields
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VisitorUpdate {
    pub phone: String,
    pub visit_time_from: String,
    pub visit_time_to: String,
}

impl Coordinator {
    /// Add a visitor in both stores.
    ///
    /// Local writes are the visitor document plus the owning resident's
    /// visitor list; both are rolled back if the chain write fails.
    pub async fn add_visitor(&self, input: NewVisitor, resident_oid: ObjectId) -> Result<String> {
        if self
            .store
            .visitors
            .find_one(doc! { "phone": &input.phone })
            .await?
            .is_some()
        {
            return Err(GatekeeperError::Validation(
                "Phone number already registered".into(),
            ));
        }

        let building = self
            .store
            .buildings
            .find_one(doc! {})
            .await?
            .ok_or_else(|| GatekeeperError::Config("Building configuration not found".into()))?;

        let resident = self
            .store
            .residents
            .find_one(doc! { "_id": resident_oid })
            .await?
            .ok_or_else(|| GatekeeperError::NotFound("Resident not found".into()))?;

        let standing = self
            .store
            .visitors
            .count(doc! { "resident_id": resident_oid })
            .await?;
        if standing >= building.max_visitors_per_resident as u64 {
            return Err(GatekeeperError::Validation(
                "Maximum number of visitors for this resident reached".into(),
            ));
        }

        let external_id = idgen::visitor_id();
        let visitor_id = ObjectId::new();
        let mut visitor = VisitorDoc::new(
            external_id.clone(),
            input.full_name.clone(),
            input.phone.clone(),
            input.visit_time_from.clone(),
            input.visit_time_to.clone(),
            input.relationship.clone(),
            resident_oid,
            resident.external_id.clone(),
        );
        visitor._id = Some(visitor_id);

        if let Err(e) = self
            .qr
            .render(QrCategory::Visitors, &external_id, &external_id)
        {
            warn!(error = %e, "QR render failed for visitor");
        }

        let ledger_args = vec![
            visitor.resident_external_id.clone(),
            visitor.external_id.clone(),
            visitor.full_name.clone(),
            visitor.phone.clone(),
            visitor.visit_time_from.clone(),
            visitor.visit_time_to.clone(),
            visitor.relationship.clone(),
        ];

        let visitors = self.store.visitors.clone();
        let visitors_undo = self.store.visitors.clone();
        let residents = self.store.residents.clone();
        let residents_undo = self.store.residents.clone();
        let gateway = self.gateway.clone();
        let settings = self.settings.clone();
        let resident_ext = resident.external_id.clone();

        Saga::new("add_visitor")
            .compensable_step(
                "local-visitor-insert",
                move || async move { visitors.insert_one(visitor).await.map(|_| ()) },
                move || async move {
                    visitors_undo
                        .delete_one(doc! { "_id": visitor_id })
                        .await
                        .map(|_| ())
                },
            )
            .compensable_step(
                "resident-list-push",
                move || async move {
                    residents
                        .update_one(
                            doc! { "_id": resident_oid },
                            doc! { "$push": { "visitors": visitor_id } },
                        )
                        .await
                        .map(|_| ())
                },
                move || async move {
                    residents_undo
                        .update_one(
                            doc! { "_id": resident_oid },
                            doc! { "$pull": { "visitors": visitor_id } },
                        )
                        .await
                        .map(|_| ())
                },
            )
            .step("ledger-invoke", move || async move {
                gateway
                    .invoke(
                        &settings.channel,
                        &settings.chaincode,
                        functions::ADD_VISITOR,
                        &ledger_args,
                        &resident_ext,
                        &settings.write_org,
                    )
                    .await
                    .map(|_| ())
            })
            .run()
            .await?;

        info!(external_id = %external_id, "Visitor added in both stores");
        Ok(external_id)
    }

    /// Update a visitor's contact and window fields in both stores
    pub async fn update_visitor(&self, id: ObjectId, input: VisitorUpdate) -> Result<()> {
        let visitor = self
            .store
            .visitors
            .find_one(doc! { "_id": id })
            .await?
            .ok_or_else(|| GatekeeperError::NotFound("Visitor not found".into()))?;

        let ledger_args = vec![
            visitor.resident_external_id.clone(),
            visitor.external_id.clone(),
            input.phone.clone(),
            input.visit_time_from.clone(),
            input.visit_time_to.clone(),
        ];

        let visitors = self.store.visitors.clone();
        let visitors_undo = self.store.visitors.clone();
        let gateway = self.gateway.clone();
        let settings = self.settings.clone();
        let resident_ext = visitor.resident_external_id.clone();
        let prior = visitor.clone();
        let update = input.clone();

        Saga::new("update_visitor")
            .compensable_step(
                "local-update",
                move || async move {
                    visitors
                        .update_one(
                            doc! { "_id": id },
                            doc! { "$set": {
                                "phone": &update.phone,
                                "visit_time_from": &update.visit_time_from,
                                "visit_time_to": &update.visit_time_to,
                            }},
                        )
                        .await
                        .map(|_| ())
                },
                move || async move {
                    visitors_undo
                        .update_one(
                            doc! { "_id": id },
                            doc! { "$set": {
                                "phone": &prior.phone,
                                "visit_time_from": &prior.visit_time_from,
                                "visit_time_to": &prior.visit_time_to,
                            }},
                        )
                        .await
                        .map(|_| ())
                },
            )
            .step("ledger-invoke", move || async move {
                gateway
                    .invoke(
                        &settings.channel,
                        &settings.chaincode,
                        functions::UPDATE_VISITOR,
                        &ledger_args,
                        &resident_ext,
                        &settings.write_org,
                    )
                    .await
                    .map(|_| ())
            })
            .run()
            .await?;

        info!(external_id = %visitor.external_id, "Visitor updated in both stores");
        Ok(())
    }

    /// Delete a visitor and its dependent rows locally; the chain
    /// record is tombstoned, never deleted
    pub async fn delete_visitor(&self, id: ObjectId) -> Result<()> {
        let visitor = self
            .store
            .visitors
            .find_one(doc! { "_id": id })
            .await?
            .ok_or_else(|| GatekeeperError::NotFound("Visitor not found".into()))?;

        let ext = &visitor.external_id;
        self.store
            .entry_logs
            .delete_many(doc! { "subject.external_id": ext })
            .await?;
        self.store
            .blocks
            .delete_many(doc! { "subject.external_id": ext })
            .await?;
        self.store.visitors.delete_one(doc! { "_id": id }).await?;
        self.store
            .residents
            .update_one(
                doc! { "_id": visitor.resident_id },
                doc! { "$pull": { "visitors": id } },
            )
            .await?;

        info!(external_id = %ext, "Visitor deleted locally; chain record tombstoned");
        Ok(())
    }
}
