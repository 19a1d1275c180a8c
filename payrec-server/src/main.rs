//! payrec server
//!
//! Reconciles payment-provider callbacks and escrow changes into token
//! transfers and seller payouts.

mod api;
mod config;
mod server;
mod shutdown;
mod state;

use clap::Parser;
use config::{ConfigLoader, Secrets};
use payrec_core::events::escrow_changed_channel;
use payrec_core::processors::{
    CallbackRouter, DepositReconciler, EscrowWatcher, PayoutInitiator, PayoutStatusReconciler,
};
use payrec_core::store::{EntityStore, EscrowChangeListener, PgEntityStore};
use payrec_core::transfer::Erc20Transfer;
use payrec_sdk::client::PayoutClient;
use server::{build_router, run_server};
use sqlx::postgres::PgPoolOptions;
use state::AppState;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::watch;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// payrec - payment reconciliation server
#[derive(Parser, Debug)]
#[command(name = "payrec-server")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to the configuration file
    #[arg(short, long, default_value = "./payrec-config.toml")]
    config: PathBuf,

    /// Override the listen address (e.g., 0.0.0.0:3000)
    #[arg(short, long)]
    listen: Option<SocketAddr>,

    /// Run database migrations on startup
    #[arg(long, default_value = "false")]
    migrate: bool,

    /// Emit logs as JSON lines
    #[arg(long, env = "PAYREC_LOG_JSON", default_value = "false")]
    log_json: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Parse command line arguments
    let args = Args::parse();

    // Initialize tracing
    init_tracing(args.log_json);

    tracing::info!("Starting payrec-server v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration
    let config_loader = ConfigLoader::new(&args.config, args.listen);
    let loaded_config = config_loader.load().map_err(|e| {
        tracing::error!("Failed to load configuration: {}", e);
        e
    })?;
    tracing::info!("Configuration loaded from {:?}", args.config);

    let secrets = Secrets::from_env().map_err(|e| {
        tracing::error!("{}", e);
        e
    })?;

    // Create database connection pool
    tracing::info!("Connecting to database...");
    let db_pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(&secrets.database_url)
        .await
        .map_err(|e| {
            tracing::error!("Failed to connect to database: {}", e);
            e
        })?;
    tracing::info!("Database connection established");

    // Run migrations if requested
    if args.migrate {
        tracing::info!("Running database migrations...");
        sqlx::migrate!("../migrations")
            .run(&db_pool)
            .await
            .map_err(|e| {
                tracing::error!("Failed to run migrations: {}", e);
                e
            })?;
        tracing::info!("Migrations completed successfully");
    }

    // External services
    let chain = &loaded_config.chain;
    let transfer = Erc20Transfer::new(
        secrets.hot_wallet_private_key.as_deref(),
        chain.rpc_url.clone(),
        chain.tokens.clone(),
        chain.confirmations,
    )?;
    match transfer.wallet_address() {
        Some(address) => {
            tracing::info!(%address, network = ?chain.network, "Hot wallet loaded")
        }
        None => tracing::warn!("HOT_WALLET_PRIVATE_KEY not set, token purchases will fail"),
    }
    let payout_client =
        PayoutClient::for_environment(loaded_config.payout.environment, secrets.payout_api_key)?
            .with_timeout(loaded_config.payout.http_timeout)?;
    tracing::info!(
        environment = %loaded_config.payout.environment,
        timeout_secs = payout_client.timeout().as_secs(),
        "Payout client configured"
    );

    // Processors
    let store: Arc<dyn EntityStore> = Arc::new(PgEntityStore::new(db_pool.clone()));
    let reconciler = &loaded_config.reconciler;
    let deposits = DepositReconciler::new(store.clone(), Arc::new(transfer), reconciler);
    let payouts = PayoutStatusReconciler::new(store.clone());
    let initiator = Arc::new(PayoutInitiator::new(
        store.clone(),
        Arc::new(payout_client),
        reconciler,
    ));

    // Escrow change pipeline
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let (change_tx, change_rx) = escrow_changed_channel();
    let listener = tokio::spawn(
        EscrowChangeListener::new(db_pool.clone(), change_tx, shutdown_rx.clone()).run(),
    );
    let watcher =
        tokio::spawn(EscrowWatcher::new(initiator.clone(), change_rx, shutdown_rx).run());

    // Create application state
    let state = AppState::new(
        store,
        Arc::new(CallbackRouter::new(deposits, payouts)),
        initiator,
        loaded_config.admin,
    );

    // Build the router
    let router = build_router(state);

    // Run the server
    let listen_addr = loaded_config.server.listen;
    tracing::info!("Starting HTTP server on {}", listen_addr);
    let result = run_server(router, listen_addr).await;

    // Stop the background tasks; the watcher finishes payouts already started
    let _ = shutdown_tx.send(true);
    for (name, task) in [("listener", listener), ("watcher", watcher)] {
        if let Err(e) = task.await {
            tracing::error!(task = name, error = %e, "Background task failed");
        }
    }

    // Close database connections gracefully
    tracing::info!("Closing database connections...");
    db_pool.close().await;
    tracing::info!("Server shutdown complete");

    result.map_err(Into::into)
}

/// Initialize the tracing subscriber with environment-based filtering.
fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,sqlx=warn,tower_http=debug"));

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}
