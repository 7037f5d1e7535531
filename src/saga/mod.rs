//! Dual-write saga executor
//!
//! Every mutating flow is a short ordered list of steps, each with an
//! optional compensating action. Steps run in order; when one fails,
//! the compensations of the steps that already completed run in
//! reverse. This keeps the compensation logic in one tested place
//! instead of scattered through per-flow error handling.
//!
//! Outcome contract:
//! - failure before any compensable step completed surfaces the
//!   original error untouched ("failed before any side effect");
//! - failure after local commits, all compensations succeeded, surfaces
//!   [`GatekeeperError::PartialFailure`] with `compensated: true`;
//! - a compensation failure surfaces `compensated: false` and is logged
//!   at error level, the one case needing operator reconciliation.

use std::future::Future;
use std::pin::Pin;
use tracing::{debug, error, warn};

use crate::types::{GatekeeperError, Result};

type StepFuture = Pin<Box<dyn Future<Output = Result<()>> + Send>>;
type StepFn = Box<dyn FnOnce() -> StepFuture + Send>;

/// One step of a saga: an action and an optional compensation
struct SagaStep {
    label: &'static str,
    action: StepFn,
    compensation: Option<StepFn>,
}

/// Ordered steps with per-step compensation
pub struct Saga {
    flow: &'static str,
    steps: Vec<SagaStep>,
}

impl Saga {
    pub fn new(flow: &'static str) -> Self {
        Self {
            flow,
            steps: Vec::new(),
        }
    }

    /// Add a step with no compensation (pre-checks, best-effort tails,
    /// and the final ledger write, which cannot be rolled back anyway)
    pub fn step<F, Fut>(mut self, label: &'static str, action: F) -> Self
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        self.steps.push(SagaStep {
            label,
            action: Box::new(move || Box::pin(action())),
            compensation: None,
        });
        self
    }

    /// Add a step whose effect is undone by `compensation` if a later
    /// step fails
    pub fn compensable_step<F, Fut, C, CFut>(
        mut self,
        label: &'static str,
        action: F,
        compensation: C,
    ) -> Self
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
        C: FnOnce() -> CFut + Send + 'static,
        CFut: Future<Output = Result<()>> + Send + 'static,
    {
        self.steps.push(SagaStep {
            label,
            action: Box::new(move || Box::pin(action())),
            compensation: Some(Box::new(move || Box::pin(compensation()))),
        });
        self
    }

    /// Run the steps in order, compensating on failure
    pub async fn run(self) -> Result<()> {
        let flow = self.flow;
        let mut completed: Vec<(&'static str, StepFn)> = Vec::new();

        for step in self.steps {
            debug!(flow = %flow, step = %step.label, "Saga step");

            match (step.action)().await {
                Ok(()) => {
                    if let Some(compensation) = step.compensation {
                        completed.push((step.label, compensation));
                    }
                }
                Err(cause) => {
                    if completed.is_empty() {
                        // Nothing committed yet; surface the error as-is
                        return Err(cause);
                    }

                    warn!(
                        flow = %flow,
                        step = %step.label,
                        error = %cause,
                        "Saga step failed, compensating {} completed step(s)",
                        completed.len()
                    );

                    let mut undo_failed = false;
                    for (label, compensation) in completed.into_iter().rev() {
                        if let Err(undo_err) = compensation().await {
                            undo_failed = true;
                            error!(
                                flow = %flow,
                                step = %label,
                                error = %undo_err,
                                "Saga compensation failed; stores have diverged and need manual reconciliation"
                            );
                        }
                    }

                    return Err(GatekeeperError::PartialFailure {
                        flow,
                        step: step.label,
                        compensated: !undo_failed,
                        detail: cause.to_string(),
                    });
                }
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::functions;
    use crate::ledger::mock::MockLedger;
    use crate::ledger::LedgerGateway;
    use std::sync::{Arc, Mutex};

    fn shared_vec() -> Arc<Mutex<Vec<&'static str>>> {
        Arc::new(Mutex::new(Vec::new()))
    }

    #[tokio::test]
    async fn test_all_steps_run_in_order() {
        let trace = shared_vec();
        let (t1, t2) = (trace.clone(), trace.clone());

        let result = Saga::new("test")
            .step("first", move || async move {
                t1.lock().unwrap().push("first");
                Ok(())
            })
            .step("second", move || async move {
                t2.lock().unwrap().push("second");
                Ok(())
            })
            .run()
            .await;

        assert!(result.is_ok());
        assert_eq!(*trace.lock().unwrap(), vec!["first", "second"]);
    }

    #[tokio::test]
    async fn test_failure_before_any_commit_surfaces_original_error() {
        let trace = shared_vec();
        let (t1, t2) = (trace.clone(), trace.clone());

        let result = Saga::new("test")
            .step("pre-check", || async {
                Err(GatekeeperError::Validation("quota exceeded".into()))
            })
            .compensable_step(
                "local-insert",
                move || async move {
                    t1.lock().unwrap().push("action");
                    Ok(())
                },
                move || async move {
                    t2.lock().unwrap().push("compensation");
                    Ok(())
                },
            )
            .run()
            .await;

        // The pre-check error surfaces as-is, and nothing after it ran
        assert!(matches!(result, Err(GatekeeperError::Validation(_))));
        assert!(trace.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_compensation_undoes_local_write() {
        // Shape of a create flow: local insert, then ledger invoke.
        let store = shared_vec();
        let (insert, undo) = (store.clone(), store.clone());

        let result = Saga::new("create")
            .compensable_step(
                "local-insert",
                move || async move {
                    insert.lock().unwrap().push("record");
                    Ok(())
                },
                move || async move {
                    undo.lock().unwrap().retain(|r| *r != "record");
                    Ok(())
                },
            )
            .step("ledger-invoke", || async {
                Err(GatekeeperError::Ledger("bridge unreachable".into()))
            })
            .run()
            .await;

        // The local record must not be observable afterwards
        assert!(store.lock().unwrap().is_empty());
        match result {
            Err(GatekeeperError::PartialFailure {
                flow,
                step,
                compensated,
                ..
            }) => {
                assert_eq!(flow, "create");
                assert_eq!(step, "ledger-invoke");
                assert!(compensated);
            }
            other => panic!("expected compensated partial failure, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_compensations_run_in_reverse_order() {
        let trace = shared_vec();
        let (u1, u2) = (trace.clone(), trace.clone());

        let result = Saga::new("test")
            .compensable_step(
                "a",
                || async { Ok(()) },
                move || async move {
                    u1.lock().unwrap().push("undo-a");
                    Ok(())
                },
            )
            .compensable_step(
                "b",
                || async { Ok(()) },
                move || async move {
                    u2.lock().unwrap().push("undo-b");
                    Ok(())
                },
            )
            .step("fail", || async {
                Err(GatekeeperError::Ledger("down".into()))
            })
            .run()
            .await;

        assert!(result.is_err());
        assert_eq!(*trace.lock().unwrap(), vec!["undo-b", "undo-a"]);
    }

    #[tokio::test]
    async fn test_compensation_failure_reports_divergence() {
        let result = Saga::new("test")
            .compensable_step(
                "local-insert",
                || async { Ok(()) },
                || async { Err(GatekeeperError::Database("delete failed".into())) },
            )
            .step("ledger-invoke", || async {
                Err(GatekeeperError::Ledger("down".into()))
            })
            .run()
            .await;

        match result {
            Err(e @ GatekeeperError::PartialFailure { .. }) => assert!(e.is_diverged()),
            other => panic!("expected diverged partial failure, got {:?}", other),
        }
    }

    /// The add-visitor partial-failure scenario: ledger invoke fails,
    /// the visitor row and the resident's visitor list entry are both
    /// rolled back.
    #[tokio::test]
    async fn test_visitor_create_compensation_against_mock_ledger() {
        let ledger = Arc::new(MockLedger::new());
        ledger.fail_function(functions::ADD_VISITOR);

        let visitors = shared_vec();
        let resident_list = shared_vec();

        let (v_ins, v_del) = (visitors.clone(), visitors.clone());
        let (r_ins, r_del) = (resident_list.clone(), resident_list.clone());
        let gateway = ledger.clone();

        let result = Saga::new("add_visitor")
            .compensable_step(
                "local-insert",
                move || async move {
                    v_ins.lock().unwrap().push("VIS-0001");
                    Ok(())
                },
                move || async move {
                    v_del.lock().unwrap().retain(|v| *v != "VIS-0001");
                    Ok(())
                },
            )
            .compensable_step(
                "resident-list-push",
                move || async move {
                    r_ins.lock().unwrap().push("VIS-0001");
                    Ok(())
                },
                move || async move {
                    r_del.lock().unwrap().retain(|v| *v != "VIS-0001");
                    Ok(())
                },
            )
            .step("ledger-invoke", move || async move {
                gateway
                    .invoke(
                        "residentschannel",
                        "residentManagement",
                        functions::ADD_VISITOR,
                        &[
                            "RES-1001".into(),
                            "VIS-0001".into(),
                            "Jess Doe".into(),
                            "555-0100".into(),
                            "09:00".into(),
                            "17:00".into(),
                            "friend".into(),
                        ],
                        "RES-1001",
                        "Org1",
                    )
                    .await
                    .map(|_| ())
            })
            .run()
            .await;

        assert!(matches!(
            result,
            Err(GatekeeperError::PartialFailure {
                compensated: true,
                ..
            })
        ));
        // No visitor persists and the resident's list is unchanged
        assert!(visitors.lock().unwrap().is_empty());
        assert!(resident_list.lock().unwrap().is_empty());
        assert!(!ledger.has_visitor("RES-1001", "VIS-0001"));
    }
}
