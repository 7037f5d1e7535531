//! Expiry reaper
//!
//! Periodic sweep that finds time-expired blocks and unblocks the
//! subject in both stores: ledger unblock first, local delete only on
//! ledger success. A block whose ledger call fails simply stays for the
//! next cycle; unblock is idempotent on the chain, so at-least-once
//! retry is safe. One bad block never halts the rest of the sweep.

use bson::{doc, oid::ObjectId, DateTime};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, error, info, warn};

use crate::db::schemas::{BlockDoc, BlockSubject};
use crate::db::{MongoCollection, Store};
use crate::ledger::{functions, LedgerGateway, LedgerSettings};
use crate::types::Result;

/// Outcome of one ledger-side sweep pass
#[derive(Debug, Default)]
pub struct SweepReport {
    /// Blocks whose ledger unblock landed; safe to delete locally
    pub unblocked: Vec<ObjectId>,
    /// Blocks whose ledger unblock failed; retried next cycle
    pub failed: usize,
}

/// Invoke the chaincode unblock operation for a block's subject.
///
/// Shared with the explicit unblock flows; idempotent on the ledger
/// side by construction.
pub async fn unblock_on_ledger(
    gateway: &dyn LedgerGateway,
    settings: &LedgerSettings,
    subject: &BlockSubject,
) -> Result<()> {
    match subject {
        BlockSubject::Resident { external_id, .. } => {
            gateway
                .invoke(
                    &settings.channel,
                    &settings.chaincode,
                    functions::UNBLOCK_RESIDENT,
                    &[external_id.clone()],
                    external_id,
                    &settings.write_org,
                )
                .await?;
        }
        BlockSubject::Visitor {
            external_id,
            resident_external_id,
            ..
        } => {
            gateway
                .invoke(
                    &settings.channel,
                    &settings.chaincode,
                    functions::UNBLOCK_VISITOR,
                    &[external_id.clone(), resident_external_id.clone()],
                    resident_external_id,
                    &settings.write_org,
                )
                .await?;
        }
    }
    Ok(())
}

/// Run the ledger side of a sweep over already-fetched expired blocks.
///
/// Failures are isolated per item: a failed unblock is counted and
/// skipped, never propagated.
pub async fn run_sweep(
    gateway: &dyn LedgerGateway,
    settings: &LedgerSettings,
    expired: &[BlockDoc],
) -> SweepReport {
    let mut report = SweepReport::default();

    for block in expired {
        let Some(id) = block._id else {
            warn!("Expired block without an id, skipping");
            continue;
        };

        match unblock_on_ledger(gateway, settings, &block.subject).await {
            Ok(()) => {
                info!(
                    subject = %block.subject.external_id(),
                    "Expired block unblocked on ledger"
                );
                report.unblocked.push(id);
            }
            Err(e) => {
                report.failed += 1;
                warn!(
                    subject = %block.subject.external_id(),
                    error = %e,
                    "Ledger unblock failed, block kept for next cycle"
                );
            }
        }
    }

    report
}

/// Periodic task owned by the process runtime
pub struct ExpiryReaper {
    blocks: MongoCollection<BlockDoc>,
    gateway: Arc<dyn LedgerGateway>,
    settings: LedgerSettings,
    interval: Duration,
    running: Arc<RwLock<bool>>,
}

impl ExpiryReaper {
    pub fn new(
        store: &Store,
        gateway: Arc<dyn LedgerGateway>,
        settings: LedgerSettings,
        interval: Duration,
    ) -> Self {
        Self {
            blocks: store.blocks.clone(),
            gateway,
            settings,
            interval,
            running: Arc::new(RwLock::new(false)),
        }
    }

    /// One full cycle: fetch expired blocks, unblock on the ledger,
    /// delete the local rows whose unblock landed
    pub async fn run_cycle(&self) -> Result<SweepReport> {
        let now = DateTime::now();
        let expired = self
            .blocks
            .find_many(doc! { "to_datetime": { "$lt": now } })
            .await?;

        if expired.is_empty() {
            return Ok(SweepReport::default());
        }

        debug!("Reaper found {} expired block(s)", expired.len());
        let report = run_sweep(self.gateway.as_ref(), &self.settings, &expired).await;

        for id in &report.unblocked {
            if let Err(e) = self.blocks.delete_one(doc! { "_id": id }).await {
                // The next cycle retries; ledger unblock is idempotent
                warn!(block = %id, error = %e, "Failed to delete unblocked block");
            }
        }

        Ok(report)
    }

    /// Start the periodic loop. Safe to call more than once; duplicate
    /// starts are ignored.
    pub async fn start(self: Arc<Self>) {
        {
            let mut running = self.running.write().await;
            if *running {
                warn!("Expiry reaper already running");
                return;
            }
            *running = true;
        }

        info!("Starting expiry reaper (interval: {:?})", self.interval);

        let reaper = Arc::clone(&self);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(reaper.interval);

            loop {
                interval.tick().await;

                if !*reaper.running.read().await {
                    info!("Expiry reaper stopped");
                    break;
                }

                match reaper.run_cycle().await {
                    Ok(report) if !report.unblocked.is_empty() || report.failed > 0 => {
                        info!(
                            unblocked = report.unblocked.len(),
                            failed = report.failed,
                            "Reaper cycle complete"
                        );
                    }
                    Ok(_) => {}
                    Err(e) => {
                        error!("Reaper cycle failed: {}", e);
                    }
                }
            }
        });
    }

    /// Stop the periodic loop after the current tick
    pub async fn stop(&self) {
        let mut running = self.running.write().await;
        *running = false;
        info!("Stopping expiry reaper");
    }

    pub async fn is_running(&self) -> bool {
        *self.running.read().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::mock::MockLedger;

    fn settings() -> LedgerSettings {
        LedgerSettings {
            channel: "residentschannel".into(),
            chaincode: "residentManagement".into(),
            write_org: "Org1".into(),
            read_org: "Org2".into(),
            read_identity: "admin2".into(),
        }
    }

    fn resident_block(external_id: &str) -> BlockDoc {
        let mut block = BlockDoc::new(
            BlockSubject::Resident {
                resident_id: ObjectId::new(),
                external_id: external_id.into(),
            },
            "expired test".into(),
            "admin".into(),
            DateTime::from_millis(0),
            DateTime::from_millis(1),
        );
        block._id = Some(ObjectId::new());
        block
    }

    fn visitor_block(external_id: &str, resident_external_id: &str) -> BlockDoc {
        let mut block = BlockDoc::new(
            BlockSubject::Visitor {
                visitor_id: ObjectId::new(),
                external_id: external_id.into(),
                resident_external_id: resident_external_id.into(),
            },
            "expired test".into(),
            "admin".into(),
            DateTime::from_millis(0),
            DateTime::from_millis(1),
        );
        block._id = Some(ObjectId::new());
        block
    }

    #[tokio::test]
    async fn test_sweep_unblocks_all_expired() {
        let ledger = MockLedger::new();
        let expired = vec![
            resident_block("RES-0001"),
            resident_block("RES-0002"),
            visitor_block("VIS-0001", "RES-0001"),
        ];

        let report = run_sweep(&ledger, &settings(), &expired).await;

        // Convergence: every expired block is cleared in one cycle
        assert_eq!(report.unblocked.len(), 3);
        assert_eq!(report.failed, 0);
        assert_eq!(ledger.invocation_count(functions::UNBLOCK_RESIDENT), 2);
        assert_eq!(ledger.invocation_count(functions::UNBLOCK_VISITOR), 1);
    }

    #[tokio::test]
    async fn test_sweep_isolates_failures_per_item() {
        let ledger = MockLedger::new();
        ledger.fail_function(functions::UNBLOCK_VISITOR);

        let expired = vec![
            resident_block("RES-0001"),
            visitor_block("VIS-0001", "RES-0001"),
            resident_block("RES-0002"),
        ];

        let report = run_sweep(&ledger, &settings(), &expired).await;

        // The visitor failure does not halt the resident unblocks
        assert_eq!(report.unblocked.len(), 2);
        assert_eq!(report.failed, 1);
    }

    #[tokio::test]
    async fn test_unblock_is_idempotent() {
        let ledger = MockLedger::new();
        let subject = BlockSubject::Resident {
            resident_id: ObjectId::new(),
            external_id: "RES-0001".into(),
        };

        // Never-blocked subject: unblocking twice must not error and
        // must not create duplicate state
        unblock_on_ledger(&ledger, &settings(), &subject)
            .await
            .unwrap();
        unblock_on_ledger(&ledger, &settings(), &subject)
            .await
            .unwrap();

        assert_eq!(ledger.invocation_count(functions::UNBLOCK_RESIDENT), 2);
    }
}
