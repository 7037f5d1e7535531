//! Visit request flows
//!
//! Creation is local-first with compensation like every other create.
//! The status change is the one ledger-first flow in the system: the
//! chain accepts the transition before the local status and the QR
//! artifacts are persisted. There is no compensation path on that side
//! because the ledger cannot roll back; a local failure after chain
//! acceptance is reported as an uncompensated partial failure for the
//! operator.

use bson::{doc, oid::ObjectId};
use serde::Deserialize;
use tracing::{error, info, warn};

use crate::coordinator::Coordinator;
use crate::db::schemas::{NotificationDoc, RequestStatus, UserRole, VisitRequestDoc};
use crate::ledger::functions;
use crate::saga::Saga;
use crate::services::{idgen, QrCategory};
use crate::types::{GatekeeperError, Result};

/// Input for creating a visit request
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewVisitRequest {
    /// Target resident document id (hex)
    pub target_resident: String,
    pub visitor_name: String,
    pub visitor_phone: String,
    #[serde(rename = "type")]
    pub request_type: String,
    pub visit_purpose: String,
    #[serde(default)]
    pub custom_reason: String,
    pub visit_date: String,
    pub visit_time_from: String,
    pub visit_time_to: String,
}

/// Requested status transition
#[derive(Debug, Clone, Deserialize)]
pub struct StatusChange {
    pub status: String,
}

impl StatusChange {
    /// Only the two terminal states are reachable by request
    pub fn parse(&self) -> Result<RequestStatus> {
        match self.status.as_str() {
            "accepted" => Ok(RequestStatus::Accepted),
            "rejected" => Ok(RequestStatus::Rejected),
            other => Err(GatekeeperError::Validation(format!(
                "Invalid status value '{}'",
                other
            ))),
        }
    }
}

impl Coordinator {
    /// Create a visit request in both stores under one generated
    /// request id
    pub async fn create_visit_request(
        &self,
        input: NewVisitRequest,
        created_by: ObjectId,
    ) -> Result<String> {
        let target_resident = ObjectId::parse_str(&input.target_resident)
            .map_err(|_| GatekeeperError::Validation("Invalid targetResident id".into()))?;

        // Resident pre-check aborts before any write
        let resident = self
            .store
            .residents
            .find_one(doc! { "_id": target_resident })
            .await?
            .ok_or_else(|| GatekeeperError::NotFound("Target resident not found".into()))?;

        let request_id = idgen::request_id();
        let doc_id = ObjectId::new();
        let mut request = VisitRequestDoc::new(
            request_id.clone(),
            created_by,
            target_resident,
            input.visitor_name.clone(),
            input.visitor_phone.clone(),
            input.request_type.clone(),
            input.visit_purpose.clone(),
            input.custom_reason.clone(),
            input.visit_date.clone(),
            input.visit_time_from.clone(),
            input.visit_time_to.clone(),
        );
        request._id = Some(doc_id);

        let ledger_args = vec![
            request.request_id.clone(),
            created_by.to_hex(),
            resident.external_id.clone(),
            request.visitor_name.clone(),
            request.visitor_phone.clone(),
            request.request_type.clone(),
            request.visit_purpose.clone(),
            request.custom_reason.clone(),
            request.visit_time_from.clone(),
            request.visit_time_to.clone(),
            request.visit_date.clone(),
        ];

        let requests = self.store.visit_requests.clone();
        let requests_undo = self.store.visit_requests.clone();
        let gateway = self.gateway.clone();
        let settings = self.settings.clone();
        let resident_ext = resident.external_id.clone();

        Saga::new("create_visit_request")
            .compensable_step(
                "local-insert",
                move || async move { requests.insert_one(request).await.map(|_| ()) },
                move || async move {
                    requests_undo
                        .delete_one(doc! { "_id": doc_id })
                        .await
                        .map(|_| ())
                },
            )
            .step("ledger-invoke", move || async move {
                gateway
                    .invoke(
                        &settings.channel,
                        &settings.chaincode,
                        functions::ADD_VISIT_REQUEST,
                        &ledger_args,
                        &resident_ext,
                        &settings.write_org,
                    )
                    .await
                    .map(|_| ())
            })
            .run()
            .await?;

        // Notification is a local-only side record, best-effort
        if let Err(e) = self
            .store
            .notifications
            .insert_one(NotificationDoc::new(resident.user_id, doc_id))
            .await
        {
            warn!(error = %e, "Failed to write visit-request notification");
        }

        info!(request_id = %request_id, "Visit request created in both stores");
        Ok(request_id)
    }

    /// Accept or reject a visit request: ledger-first.
    ///
    /// The QR token materializes only in the accepted state and equals
    /// the request id.
    pub async fn change_request_status(
        &self,
        id: ObjectId,
        status: RequestStatus,
        admin_id: String,
    ) -> Result<VisitRequestDoc> {
        let request = self
            .store
            .visit_requests
            .find_one(doc! { "_id": id })
            .await?
            .ok_or_else(|| GatekeeperError::NotFound("Request not found".into()))?;

        // The transition happens exactly once
        if request.status.is_terminal() {
            return Err(GatekeeperError::Validation(format!(
                "Request already {}",
                request.status.as_str()
            )));
        }

        let resident = self
            .store
            .residents
            .find_one(doc! { "_id": request.target_resident })
            .await?
            .ok_or_else(|| GatekeeperError::NotFound("Resident not found".into()))?;

        // Ledger first: only a chain-accepted transition is persisted
        self.gateway
            .invoke(
                &self.settings.channel,
                &self.settings.chaincode,
                functions::UPDATE_VISIT_REQUEST_STATUS,
                &[
                    request.request_id.clone(),
                    status.as_str().to_string(),
                    admin_id,
                ],
                &resident.external_id,
                &self.settings.write_org,
            )
            .await?;

        let mut update = doc! { "status": status.as_str() };
        if status == RequestStatus::Accepted {
            if let Err(e) = self.qr.render(
                QrCategory::Requests,
                &request.request_id,
                &request.request_id,
            ) {
                warn!(error = %e, "QR render failed for accepted request");
            }
            update.insert("qr_token", request.request_id.as_str());
            update.insert("qr_image", format!("{}.png", request.request_id));
        }

        if let Err(e) = self
            .store
            .visit_requests
            .update_one(doc! { "_id": id }, doc! { "$set": update })
            .await
        {
            // The chain already holds the new status and cannot be
            // rolled back; this divergence needs an operator
            error!(
                request_id = %request.request_id,
                error = %e,
                "Local status update failed after chain acceptance; stores have diverged"
            );
            return Err(GatekeeperError::PartialFailure {
                flow: "change_request_status",
                step: "local-update",
                compensated: false,
                detail: e.to_string(),
            });
        }

        if status == RequestStatus::Accepted {
            if let Ok(Some(admin)) = self
                .store
                .users
                .find_one(doc! { "role": UserRole::Admin.as_str() })
                .await
            {
                if let Some(admin_oid) = admin._id {
                    if let Err(e) = self
                        .store
                        .notifications
                        .insert_one(NotificationDoc::new(admin_oid, id))
                        .await
                    {
                        warn!(error = %e, "Failed to write acceptance notification");
                    }
                }
            }
        }

        let updated = self
            .store
            .visit_requests
            .find_one(doc! { "_id": id })
            .await?
            .ok_or_else(|| GatekeeperError::NotFound("Request not found".into()))?;

        info!(
            request_id = %updated.request_id,
            status = %status.as_str(),
            "Visit request status changed in both stores"
        );
        Ok(updated)
    }
}
