//! Resident registration, update, and deletion flows

use bson::{doc, oid::ObjectId};
use serde::Deserialize;
use tracing::{info, warn};

use crate::auth::hash_password;
use crate::coordinator::Coordinator;
use crate::db::schemas::{ResidentDoc, UserDoc, UserRole};
use crate::ledger::functions;
use crate::saga::Saga;
use crate::services::{idgen, QrCategory};
use crate::types::{GatekeeperError, Result};

/// Input for registering a resident
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewResident {
    pub name: String,
    pub email: String,
    pub phone: String,
    pub gender: String,
    pub marital_status: String,
    pub resident_type: String,
    pub apartment: String,
    pub password: String,
    #[serde(default)]
    pub profile_image: String,
}

/// Updatable resident fields
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResidentUpdate {
    pub name: String,
    pub marital_status: String,
    pub resident_type: String,
    pub apartment: String,
}

impl Coordinator {
    /// Register a resident in both stores.
    ///
    /// Pre-checks run before any write; the user and resident documents
    /// commit locally, then the identity enrolls and the chain record
    /// is written. Ledger failure deletes both local documents.
    pub async fn register_resident(&self, input: NewResident) -> Result<String> {
        // Pre-checks against the local store, no side effects yet
        if self
            .store
            .users
            .find_one(doc! { "email": &input.email })
            .await?
            .is_some()
        {
            return Err(GatekeeperError::Validation(
                "Email already registered".into(),
            ));
        }

        if self
            .store
            .users
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
            .ok_or_else(|| {
                GatekeeperError::Config("Building configuration not found".into())
            })?;

        let occupied = self
            .store
            .residents
            .count(doc! { "apartment": &input.apartment })
            .await?;
        if occupied >= building.residents_per_apartment as u64 {
            return Err(GatekeeperError::Validation(
                "Maximum number of residents for this apartment reached".into(),
            ));
        }

        let external_id = idgen::resident_id();
        let password_hash = hash_password(&input.password)?;

        let user_id = ObjectId::new();
        let mut user = UserDoc::new(
            external_id.clone(),
            input.name.clone(),
            input.email.clone(),
            input.phone.clone(),
            password_hash,
            UserRole::Resident,
        );
        user._id = Some(user_id);
        user.profile_image = input.profile_image.clone();

        let resident_id = ObjectId::new();
        let mut resident = ResidentDoc::new(
            user_id,
            external_id.clone(),
            input.gender.clone(),
            input.marital_status.clone(),
            input.resident_type.clone(),
            input.apartment.clone(),
        );
        resident._id = Some(resident_id);

        // QR artifact is keyed by the token in the store, so a failed
        // render is only a warning
        if let Err(e) = self
            .qr
            .render(QrCategory::Residents, &external_id, &external_id)
        {
            warn!(error = %e, "QR render failed for resident");
        }

        // Ledger args derive from the documents being committed, never
        // from raw request input
        let ledger_args = vec![
            resident.external_id.clone(),
            user.name.clone(),
            user.email.clone(),
            user.phone.clone(),
            resident.gender.clone(),
            resident.marital_status.clone(),
            resident.resident_type.clone(),
            resident.apartment.clone(),
        ];

        let users = self.store.users.clone();
        let users_undo = self.store.users.clone();
        let residents = self.store.residents.clone();
        let residents_undo = self.store.residents.clone();
        let identity = self.identity.clone();
        let gateway = self.gateway.clone();
        let settings = self.settings.clone();
        let ext = external_id.clone();

        Saga::new("register_resident")
            .compensable_step(
                "local-user-insert",
                move || async move { users.insert_one(user).await.map(|_| ()) },
                move || async move {
                    users_undo
                        .delete_one(doc! { "_id": user_id })
                        .await
                        .map(|_| ())
                },
            )
            .compensable_step(
                "local-resident-insert",
                move || async move { residents.insert_one(resident).await.map(|_| ()) },
                move || async move {
                    residents_undo
                        .delete_one(doc! { "_id": resident_id })
                        .await
                        .map(|_| ())
                },
            )
            .step("ledger-register-identity", {
                let ext = ext.clone();
                let org = settings.write_org.clone();
                move || async move {
                    identity
                        .ensure_registered(&ext, &org, UserRole::Resident)
                        .await
                        .map(|_| ())
                }
            })
            .step("ledger-invoke", move || async move {
                gateway
                    .invoke(
                        &settings.channel,
                        &settings.chaincode,
                        functions::REGISTER_RESIDENT,
                        &ledger_args,
                        &ext,
                        &settings.write_org,
                    )
                    .await
                    .map(|_| ())
            })
            .run()
            .await?;

        info!(external_id = %external_id, "Resident registered in both stores");
        Ok(external_id)
    }

    /// Update a resident in both stores, restoring the prior snapshot
    /// if the chain rejects the update
    pub async fn update_resident(&self, id: ObjectId, input: ResidentUpdate) -> Result<()> {
        let resident = self
            .store
            .residents
            .find_one(doc! { "_id": id })
            .await?
            .ok_or_else(|| GatekeeperError::NotFound("Resident not found".into()))?;

        let user = self
            .store
            .users
            .find_one(doc! { "_id": resident.user_id })
            .await?
            .ok_or_else(|| GatekeeperError::NotFound("User not found".into()))?;

        // Apartment change is quota-checked like a fresh registration
        if resident.apartment != input.apartment {
            let building = self
                .store
                .buildings
                .find_one(doc! {})
                .await?
                .ok_or_else(|| GatekeeperError::Config("Building configuration not found".into()))?;

            let occupied = self
                .store
                .residents
                .count(doc! { "apartment": &input.apartment })
                .await?;
            if occupied >= building.residents_per_apartment as u64 {
                return Err(GatekeeperError::Validation("Apartment already full".into()));
            }
        }

        // Merge updated fields over the committed record for the chain
        let ledger_args = vec![
            resident.external_id.clone(),
            input.name.clone(),
            user.email.clone(),
            user.phone.clone(),
            resident.gender.clone(),
            input.marital_status.clone(),
            input.resident_type.clone(),
            input.apartment.clone(),
        ];

        let users = self.store.users.clone();
        let users_undo = self.store.users.clone();
        let residents = self.store.residents.clone();
        let residents_undo = self.store.residents.clone();
        let gateway = self.gateway.clone();
        let settings = self.settings.clone();
        let user_id = resident.user_id;
        let ext = resident.external_id.clone();
        let prior_name = user.name.clone();
        let prior = resident.clone();
        let update = input.clone();

        Saga::new("update_resident")
            .compensable_step(
                "local-update",
                move || async move {
                    users
                        .update_one(doc! { "_id": user_id }, doc! { "$set": { "name": &update.name } })
                        .await?;
                    residents
                        .update_one(
                            doc! { "_id": id },
                            doc! { "$set": {
                                "marital_status": &update.marital_status,
                                "resident_type": &update.resident_type,
                                "apartment": &update.apartment,
                            }},
                        )
                        .await?;
                    Ok(())
                },
                move || async move {
                    users_undo
                        .update_one(doc! { "_id": user_id }, doc! { "$set": { "name": &prior_name } })
                        .await?;
                    residents_undo
                        .update_one(
                            doc! { "_id": id },
                            doc! { "$set": {
                                "marital_status": &prior.marital_status,
                                "resident_type": &prior.resident_type,
                                "apartment": &prior.apartment,
                            }},
                        )
                        .await?;
                    Ok(())
                },
            )
            .step("ledger-invoke", move || async move {
                gateway
                    .invoke(
                        &settings.channel,
                        &settings.chaincode,
                        functions::UPDATE_RESIDENT,
                        &ledger_args,
                        &ext,
                        &settings.write_org,
                    )
                    .await
                    .map(|_| ())
            })
            .run()
            .await?;

        info!(external_id = %resident.external_id, "Resident updated in both stores");
        Ok(())
    }

    /// Delete a resident and its dependent rows locally.
    ///
    /// The ledger is append-only; the chain record is tombstoned, never
    /// deleted, and the external id is never reused.
    pub async fn delete_resident(&self, id: ObjectId) -> Result<()> {
        let resident = self
            .store
            .residents
            .find_one(doc! { "_id": id })
            .await?
            .ok_or_else(|| GatekeeperError::NotFound("Resident not found".into()))?;

        let ext = &resident.external_id;
        self.store
            .entry_logs
            .delete_many(doc! { "subject.external_id": ext })
            .await?;
        self.store
            .blocks
            .delete_many(doc! { "subject.external_id": ext })
            .await?;
        self.store.residents.delete_one(doc! { "_id": id }).await?;
        self.store
            .users
            .delete_one(doc! { "_id": resident.user_id })
            .await?;

        info!(external_id = %ext, "Resident deleted locally; chain record tombstoned");
        Ok(())
    }
}
