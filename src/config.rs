//! Configuration for Gatekeeper
//!
//! CLI arguments and environment variable handling using clap.

use clap::Parser;
use std::net::SocketAddr;
use uuid::Uuid;

/// Gatekeeper - residential access-control gateway
///
/// Keeps the MongoDB operational store and the permissioned ledger in
/// agreement for every identity and authorization event.
#[derive(Parser, Debug, Clone)]
#[command(name = "gatekeeper")]
#[command(about = "Residential access-control gateway over MongoDB and a permissioned ledger")]
pub struct Args {
    /// Unique node identifier for this gateway instance
    #[arg(long, env = "NODE_ID", default_value_t = Uuid::new_v4())]
    pub node_id: Uuid,

    /// Address to listen on
    #[arg(long, env = "LISTEN", default_value = "0.0.0.0:8080")]
    pub listen: SocketAddr,

    /// Base URL of the ledger REST bridge (invoke/query/identity API)
    #[arg(long, env = "LEDGER_URL", default_value = "http://localhost:4000")]
    pub ledger_url: String,

    /// Ledger channel that carries the resident-management chaincode
    #[arg(long, env = "LEDGER_CHANNEL", default_value = "residentschannel")]
    pub ledger_channel: String,

    /// Chaincode name on the ledger channel
    #[arg(long, env = "LEDGER_CHAINCODE", default_value = "residentManagement")]
    pub ledger_chaincode: String,

    /// Organization used for resident-facing ledger writes
    #[arg(long, env = "LEDGER_WRITE_ORG", default_value = "Org1")]
    pub ledger_write_org: String,

    /// Organization used for scanner-side ledger reads
    #[arg(long, env = "LEDGER_READ_ORG", default_value = "Org2")]
    pub ledger_read_org: String,

    /// Identity used for scanner-side ledger reads
    #[arg(long, env = "LEDGER_READ_IDENTITY", default_value = "admin2")]
    pub ledger_read_identity: String,

    /// Ledger call timeout in milliseconds; a hung call fails closed
    #[arg(long, env = "LEDGER_TIMEOUT_MS", default_value = "10000")]
    pub ledger_timeout_ms: u64,

    /// MongoDB connection URI
    #[arg(long, env = "MONGODB_URI", default_value = "mongodb://localhost:27017")]
    pub mongodb_uri: String,

    /// MongoDB database name
    #[arg(long, env = "MONGODB_DB", default_value = "gatekeeper")]
    pub mongodb_db: String,

    /// JWT secret for token signing (required in production)
    #[arg(long, env = "JWT_SECRET")]
    pub jwt_secret: Option<String>,

    /// JWT token expiry in seconds (default 10 days)
    #[arg(long, env = "JWT_EXPIRY_SECONDS", default_value = "864000")]
    pub jwt_expiry_seconds: u64,

    /// Directory where QR code images are written
    #[arg(long, env = "QR_DIR", default_value = "public/qrcodes")]
    pub qr_dir: String,

    /// Expiry reaper interval in seconds
    #[arg(long, env = "REAPER_INTERVAL_SECS", default_value = "30")]
    pub reaper_interval_secs: u64,

    /// Enable development mode (insecure JWT default, verbose errors)
    #[arg(long, env = "DEV_MODE", default_value = "false")]
    pub dev_mode: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,
}

impl Args {
    /// Get effective JWT secret (uses default in dev mode)
    pub fn jwt_secret(&self) -> String {
        if self.dev_mode {
            self.jwt_secret
                .clone()
                .unwrap_or_else(|| "dev-only-insecure-secret".to_string())
        } else {
            self.jwt_secret
                .clone()
                .expect("JWT_SECRET is required in production mode")
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        if !self.dev_mode && self.jwt_secret.is_none() {
            return Err("JWT_SECRET is required in production mode".to_string());
        }

        if self.ledger_timeout_ms == 0 {
            return Err("LEDGER_TIMEOUT_MS must be greater than zero".to_string());
        }

        if self.reaper_interval_secs == 0 {
            return Err("REAPER_INTERVAL_SECS must be greater than zero".to_string());
        }

        Ok(())
    }
}
