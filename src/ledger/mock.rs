//! In-memory ledger double for tests
//!
//! Implements the resident-management chaincode semantics over a plain
//! map so saga, scanner, and reaper logic can be exercised without a
//! ledger network. Individual chaincode functions can be told to fail
//! to drive the compensation paths.

use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use crate::ledger::response::LedgerRecord;
use crate::ledger::{functions, Credential, LedgerGateway, Receipt};
use crate::types::{GatekeeperError, Result};

#[derive(Default)]
struct MockState {
    residents: HashMap<String, Value>,
    visitors: HashMap<String, Value>,
    requests: HashMap<String, Value>,
    entry_logs: Vec<Value>,
    enrolled: HashSet<(String, String)>,
    /// Chaincode functions that fail on invoke
    fail_functions: HashSet<String>,
    /// Identities whose enrollment is rejected
    reject_identities: HashSet<String>,
    /// Emit PascalCase record fields (older chaincode builds)
    pascal_responses: bool,
    invocations: Vec<(String, Vec<String>)>,
}

/// Scriptable in-memory [`LedgerGateway`]
#[derive(Default)]
pub struct MockLedger {
    state: Mutex<MockState>,
}

impl MockLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the given chaincode function fail on invoke
    pub fn fail_function(&self, function: &str) {
        self.state
            .lock()
            .unwrap()
            .fail_functions
            .insert(function.to_string());
    }

    /// Clear a scripted failure
    pub fn heal_function(&self, function: &str) {
        self.state.lock().unwrap().fail_functions.remove(function);
    }

    /// Reject enrollment for the given identity
    pub fn reject_identity(&self, identity: &str) {
        self.state
            .lock()
            .unwrap()
            .reject_identities
            .insert(identity.to_string());
    }

    /// Emit PascalCase fields in query results
    pub fn use_pascal_responses(&self) {
        self.state.lock().unwrap().pascal_responses = true;
    }

    /// Number of invokes of a given function
    pub fn invocation_count(&self, function: &str) -> usize {
        self.state
            .lock()
            .unwrap()
            .invocations
            .iter()
            .filter(|(f, _)| f == function)
            .count()
    }

    /// All entry log rows mirrored to the chain
    pub fn entry_logs(&self) -> Vec<Value> {
        self.state.lock().unwrap().entry_logs.clone()
    }

    /// Whether a resident record exists on the chain
    pub fn has_resident(&self, external_id: &str) -> bool {
        self.state.lock().unwrap().residents.contains_key(external_id)
    }

    /// Whether a visitor record exists on the chain
    pub fn has_visitor(&self, resident_external_id: &str, external_id: &str) -> bool {
        self.state
            .lock()
            .unwrap()
            .visitors
            .contains_key(&visitor_key(resident_external_id, external_id))
    }

    fn apply_invoke(state: &mut MockState, function: &str, args: &[String]) -> Result<()> {
        match function {
            functions::REGISTER_RESIDENT | functions::UPDATE_RESIDENT => {
                let record = json!({
                    "residentId": args[0],
                    "name": args[1],
                    "email": args[2],
                    "phone": args[3],
                    "gender": args[4],
                    "maritalStatus": args[5],
                    "residentType": args[6],
                    "apartment": args[7],
                    "isBlocked": state
                        .residents
                        .get(&args[0])
                        .and_then(|r| r.get("isBlocked"))
                        .and_then(Value::as_bool)
                        .unwrap_or(false),
                });
                state.residents.insert(args[0].clone(), record);
            }
            functions::BLOCK_RESIDENT => {
                let record = state.residents.get_mut(&args[0]).ok_or_else(|| {
                    GatekeeperError::Ledger(format!("resident {} not found", args[0]))
                })?;
                record["isBlocked"] = json!(true);
            }
            functions::UNBLOCK_RESIDENT => {
                // Idempotent: unblocking an unblocked resident is a no-op
                if let Some(record) = state.residents.get_mut(&args[0]) {
                    record["isBlocked"] = json!(false);
                }
            }
            functions::ADD_VISITOR | functions::UPDATE_VISITOR => {
                let key = visitor_key(&args[0], &args[1]);
                let status = state
                    .visitors
                    .get(&key)
                    .and_then(|v| v.get("visitor"))
                    .and_then(|v| v.get("status"))
                    .and_then(Value::as_str)
                    .unwrap_or("Active")
                    .to_string();
                let record = json!({
                    "residentId": args[0],
                    "visitorId": args[1],
                    "fullName": args[2],
                    "phone": args[3],
                    "visitTimeFrom": args[4],
                    "visitTimeTo": args[5],
                    "visitor": { "status": status },
                });
                state.visitors.insert(key, record);
            }
            functions::BLOCK_VISITOR => {
                let key = visitor_key(&args[1], &args[0]);
                let record = state.visitors.get_mut(&key).ok_or_else(|| {
                    GatekeeperError::Ledger(format!("visitor {} not found", args[0]))
                })?;
                record["visitor"]["status"] = json!("Blocked");
            }
            functions::UNBLOCK_VISITOR => {
                // Idempotent, same as resident unblock
                let key = visitor_key(&args[1], &args[0]);
                if let Some(record) = state.visitors.get_mut(&key) {
                    record["visitor"]["status"] = json!("Active");
                }
            }
            functions::ADD_VISIT_REQUEST => {
                let record = json!({
                    "requestId": args[0],
                    "createdBy": args[1],
                    "targetResident": args[2],
                    "visitorName": args[3],
                    "visitorPhone": args[4],
                    "type": args[5],
                    "visitPurpose": args[6],
                    "customReason": args[7],
                    "visitTimeFrom": args[8],
                    "visitTimeTo": args[9],
                    "visitDate": args[10],
                    "status": "pending",
                });
                state.requests.insert(args[0].clone(), record);
            }
            functions::UPDATE_VISIT_REQUEST_STATUS => {
                let record = state.requests.get_mut(&args[0]).ok_or_else(|| {
                    GatekeeperError::Ledger(format!("request {} not found", args[0]))
                })?;
                record["status"] = json!(args[1]);
            }
            functions::SAVE_ENTRY_LOG => {
                state.entry_logs.push(json!({
                    "token": args[0],
                    "action": args[1],
                    "timestamp": args[2],
                }));
            }
            other => {
                return Err(GatekeeperError::Ledger(format!(
                    "unknown chaincode function {}",
                    other
                )));
            }
        }
        Ok(())
    }

    fn render(state: &MockState, record: &Value) -> Value {
        if !state.pascal_responses {
            return record.clone();
        }
        match record {
            Value::Object(map) => {
                let mut out = serde_json::Map::new();
                for (k, v) in map {
                    let mut chars = k.chars();
                    let pascal = match chars.next() {
                        Some(first) => first.to_ascii_uppercase().to_string() + chars.as_str(),
                        None => String::new(),
                    };
                    out.insert(pascal, Self::render(state, v));
                }
                Value::Object(out)
            }
            other => other.clone(),
        }
    }
}

fn visitor_key(resident_external_id: &str, visitor_external_id: &str) -> String {
    format!("{}::{}", resident_external_id, visitor_external_id)
}

#[async_trait]
impl LedgerGateway for MockLedger {
    async fn invoke(
        &self,
        _channel: &str,
        _chaincode: &str,
        function: &str,
        args: &[String],
        _identity: &str,
        _org: &str,
    ) -> Result<Receipt> {
        let mut state = self.state.lock().unwrap();
        state
            .invocations
            .push((function.to_string(), args.to_vec()));

        if state.fail_functions.contains(function) {
            return Err(GatekeeperError::Ledger(format!(
                "scripted failure for {}",
                function
            )));
        }

        Self::apply_invoke(&mut state, function, args)?;

        Ok(Receipt {
            raw: b"OK: committed".to_vec(),
            tx_id: Some(format!("tx-{}", state.invocations.len())),
        })
    }

    async fn query(
        &self,
        _channel: &str,
        _chaincode: &str,
        args: &[String],
        function: &str,
        _identity: &str,
        _org: &str,
    ) -> Result<LedgerRecord> {
        let state = self.state.lock().unwrap();

        let record = match function {
            functions::GET_RESIDENT => state.residents.get(&args[0]),
            functions::GET_VISITOR => state.visitors.get(&visitor_key(&args[0], &args[1])),
            functions::GET_VISIT_REQUEST => state.requests.get(&args[0]),
            other => {
                return Err(GatekeeperError::Ledger(format!(
                    "unknown chaincode query {}",
                    other
                )));
            }
        };

        match record {
            Some(r) => Ok(LedgerRecord::new(Self::render(&state, r))),
            None => Ok(LedgerRecord::new(json!({ "error": "record not found" }))),
        }
    }

    async fn register_identity(
        &self,
        identity: &str,
        org: &str,
        _role: &str,
        _admin: bool,
    ) -> Result<Credential> {
        let mut state = self.state.lock().unwrap();

        if state.reject_identities.contains(identity) {
            return Err(GatekeeperError::Ledger(format!(
                "Identity enrollment for '{}' ({}) rejected: HTTP 400",
                identity, org
            )));
        }

        state
            .enrolled
            .insert((identity.to_string(), org.to_string()));

        Ok(Credential {
            identity: identity.to_string(),
            org: org.to_string(),
            token: format!("mock-token-{}", identity),
        })
    }
}
