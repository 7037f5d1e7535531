//! Seed utility
//!
//! Creates the default admin user and building configuration, and
//! enrolls the admin identity with the ledger. Safe to re-run: existing
//! records are left alone.

use bson::doc;
use clap::Parser;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use gatekeeper::{
    auth::hash_password,
    config::Args,
    db::schemas::{BuildingDoc, UserDoc, UserRole},
    db::{MongoClient, Store},
    ledger::{fabric::FabricConfig, FabricGateway, IdentityRegistry, LedgerGateway},
};

const ADMIN_NAME: &str = "Admin";
const ADMIN_EMAIL: &str = "admin@gatekeeper.local";
const ADMIN_EXTERNAL_ID: &str = "ADMIN-0001";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();
    let args = Args::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "gatekeeper=info,info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let admin_password = std::env::var("ADMIN_PASSWORD").unwrap_or_else(|_| "admin".to_string());

    let mongo = MongoClient::new(&args.mongodb_uri, &args.mongodb_db).await?;
    let store = Store::new(&mongo).await?;

    // Admin user
    if store
        .users
        .find_one(doc! { "email": ADMIN_EMAIL })
        .await?
        .is_none()
    {
        let user = UserDoc::new(
            ADMIN_EXTERNAL_ID.to_string(),
            ADMIN_NAME.to_string(),
            ADMIN_EMAIL.to_string(),
            "000-0000".to_string(),
            hash_password(&admin_password)?,
            UserRole::Admin,
        );
        store.users.insert_one(user).await?;
        info!("Admin user created ({})", ADMIN_EMAIL);
    } else {
        info!("Admin user already present, skipping");
    }

    // Building configuration
    if store.buildings.find_one(doc! {}).await?.is_none() {
        let building = BuildingDoc::new("Main building".to_string(), 4, 10);
        store.buildings.insert_one(building).await?;
        info!("Building configuration created");
    } else {
        info!("Building configuration already present, skipping");
    }

    // Ledger enrollment for the admin identity is best-effort here; a
    // bridge that is down does not block local seeding
    let gateway: Arc<dyn LedgerGateway> =
        Arc::new(FabricGateway::new(FabricConfig::from_args(&args)));
    let registry = IdentityRegistry::new(gateway);
    match registry
        .ensure_registered(ADMIN_NAME, &args.ledger_read_org, UserRole::Admin)
        .await
    {
        Ok(_) => info!("Admin identity enrolled with the ledger"),
        Err(e) => warn!("Admin ledger enrollment skipped: {}", e),
    }

    info!("Seed complete");
    Ok(())
}
