//! Gatekeeper - residential access-control gateway

use clap::Parser;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use gatekeeper::{
    config::Args,
    coordinator::Coordinator,
    db::{MongoClient, Store},
    ledger::{fabric::FabricConfig, FabricGateway, LedgerGateway, LedgerSettings},
    scanner::Scanner,
    server,
    services::{ExpiryReaper, QrStore},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file if present
    let _ = dotenvy::dotenv();

    // Parse command line arguments
    let args = Args::parse();

    // Initialize tracing/logging
    let log_level = args.log_level.clone();
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("gatekeeper={},info", log_level).into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Validate configuration
    if let Err(e) = args.validate() {
        error!("Configuration error: {}", e);
        std::process::exit(1);
    }

    // Print startup banner
    info!("======================================");
    info!("  Gatekeeper - Access Control Gateway");
    info!("======================================");
    info!("Node ID: {}", args.node_id);
    info!("Listen: {}", args.listen);
    info!("Mode: {}", if args.dev_mode { "DEVELOPMENT" } else { "PRODUCTION" });
    info!("Ledger bridge: {}", args.ledger_url);
    info!("Ledger channel: {} / {}", args.ledger_channel, args.ledger_chaincode);
    info!("MongoDB: {}", args.mongodb_uri);
    info!("QR directory: {}", args.qr_dir);
    info!("Reaper interval: {}s", args.reaper_interval_secs);
    info!("======================================");

    // Connect to MongoDB
    let mongo = match MongoClient::new(&args.mongodb_uri, &args.mongodb_db).await {
        Ok(client) => {
            info!("MongoDB connected successfully");
            client
        }
        Err(e) => {
            error!("MongoDB connection failed: {}", e);
            std::process::exit(1);
        }
    };

    // Open collections and apply indexes
    let store = match Store::new(&mongo).await {
        Ok(s) => s,
        Err(e) => {
            error!("Failed to initialize collections: {}", e);
            std::process::exit(1);
        }
    };

    // Ledger gateway over the REST bridge
    let settings = LedgerSettings::from_args(&args);
    let gateway: Arc<dyn LedgerGateway> =
        Arc::new(FabricGateway::new(FabricConfig::from_args(&args)));

    let qr = QrStore::new(args.qr_dir.clone());
    let coordinator = Coordinator::new(
        store.clone(),
        Arc::clone(&gateway),
        settings.clone(),
        qr,
    );
    let scanner = Scanner::new(store.clone(), Arc::clone(&gateway), settings.clone());

    // Start the expiry reaper, owned by the process lifetime
    let reaper = Arc::new(ExpiryReaper::new(
        &store,
        Arc::clone(&gateway),
        settings.clone(),
        std::time::Duration::from_secs(args.reaper_interval_secs),
    ));
    Arc::clone(&reaper).start().await;

    // Run the server
    let state = Arc::new(server::AppState::new(
        args, mongo, store, settings, coordinator, scanner,
    ));

    if let Err(e) = server::run(state).await {
        error!("Server error: {:?}", e);
        reaper.stop().await;
        std::process::exit(1);
    }

    Ok(())
}
