//! Gatekeeper - residential access-control gateway
//!
//! Keeps two stores of record in agreement: MongoDB for operational
//! state and a permissioned ledger for the canonical, tamper-evident
//! record of identity and authorization events. Every mutation lands in
//! both stores or in neither.
//!
//! ## Components
//!
//! - **Ledger gateway**: abstract invoke/query/register boundary with a
//!   normalizing response adapter and a Fabric REST bridge client
//! - **Dual-write coordinator**: saga flows with per-step compensation
//!   for residents, visitors, blocks, and visit requests
//! - **Scanner**: QR verification state machine gating physical entry
//! - **Expiry reaper**: periodic unblock of time-expired blocks
//! - **Projections**: Blocked/Active status enrichment on reads

pub mod auth;
pub mod config;
pub mod coordinator;
pub mod db;
pub mod ledger;
pub mod projection;
pub mod routes;
pub mod saga;
pub mod scanner;
pub mod server;
pub mod services;
pub mod types;

pub use config::Args;
pub use server::{run, AppState};
pub use types::{GatekeeperError, Result};
