//! Fuel Raffle Server
//!
//! Turns fuel coupon redemptions and ad engagements into raffle tickets, runs
//! provably fair draws and walks winners through the claim process.

mod api;
mod config;
mod server;
mod shutdown;
mod state;

use clap::Parser;
use config::{ConfigLoader, get_database_url};
use fuelraffle_core::config::ConfigStore;
use fuelraffle_core::events::{EventPublisher, InProcessBus};
use fuelraffle_core::processors::{
    DrawScheduler, OutboxRelay, Sweeper, TicketIssuanceConsumer, TicketIssuer,
};
use fuelraffle_core::store::PgStore;
use fuelraffle_sdk::objects::topics;
use fuelraffle_sdk::signature::Ed25519KeyProvider;
use server::{build_router, run_server};
use shutdown::spawn_config_reload_handler;
use sqlx::postgres::PgPoolOptions;
use state::{AppState, Store};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::watch;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Fuel Raffle - ticket pipeline for fuel coupon raffles
#[derive(Parser, Debug)]
#[command(name = "fuelraffle-server")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to the configuration file
    #[arg(short, long, default_value = "./fuelraffle-config.toml")]
    config: PathBuf,

    /// Override the listen address (e.g., 0.0.0.0:3000)
    #[arg(short, long)]
    listen: Option<SocketAddr>,

    /// Run database migrations on startup
    #[arg(long, default_value = "false")]
    migrate: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    init_tracing();

    // Parse command line arguments
    let args = Args::parse();

    tracing::info!("Starting fuelraffle-server v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration
    let config_loader = Arc::new(ConfigLoader::new(&args.config, args.listen));
    let loaded_config = config_loader.load().map_err(|e| {
        tracing::error!("Failed to load configuration: {}", e);
        e
    })?;

    let listen_addr = loaded_config.server.listen;
    tracing::info!("Configuration loaded from {:?}", args.config);

    // Get database URL from environment
    let database_url = get_database_url().map_err(|e| {
        tracing::error!("DATABASE_URL environment variable not set");
        e
    })?;

    // Create database connection pool
    tracing::info!("Connecting to database...");
    let db_pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(&database_url)
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

    let keys = Ed25519KeyProvider::from_pkcs8_base64(&loaded_config.signing.private_key)?;
    let store: Arc<Store> = Arc::new(PgStore::new(db_pool.clone()));
    let bus = Arc::new(InProcessBus::new());
    let publisher: Arc<dyn EventPublisher> = bus.clone();
    let pipeline_config = ConfigStore::new(loaded_config.pipeline.clone());

    // Subscribe before anything can publish, so no ticket event is missed.
    let issuance_subscription = bus
        .subscribe(
            "ticket-issuance",
            &[topics::REDEMPTION_COMPLETED, topics::AD_ENGAGEMENT_COMPLETED],
            loaded_config.pipeline.issuance.max_delivery_attempts,
            loaded_config.subscription.redelivery_delay,
        )
        .await;

    // Create application state
    let state = AppState::new(
        Arc::clone(&store),
        Arc::clone(&publisher),
        pipeline_config.clone(),
        loaded_config.admin.clone(),
        &loaded_config.signing,
        keys,
    );

    // Spawn background workers
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let workers = vec![
        tokio::spawn(
            OutboxRelay::new(
                Arc::clone(&store),
                Arc::clone(&publisher),
                pipeline_config.clone(),
            )
            .run(shutdown_rx.clone()),
        ),
        tokio::spawn(
            TicketIssuanceConsumer::new(
                TicketIssuer::new(
                    Arc::clone(&store),
                    Arc::clone(&publisher),
                    pipeline_config.clone(),
                ),
                issuance_subscription,
            )
            .run(shutdown_rx.clone()),
        ),
        tokio::spawn(
            DrawScheduler::new(Arc::clone(&state.draws), pipeline_config.clone())
                .run(shutdown_rx.clone()),
        ),
        tokio::spawn(
            Sweeper::new(
                Arc::clone(&store),
                Arc::clone(&state.claims),
                pipeline_config.clone(),
            )
            .run(shutdown_rx),
        ),
    ];

    // Spawn config reload handler (listens for SIGHUP)
    let shutdown_notify = spawn_config_reload_handler(
        state.clone(),
        config_loader,
        loaded_config.server.clone(),
        loaded_config.signing.clone(),
    );

    // Build the router
    let router = build_router(state);

    // Run the server
    tracing::info!("Starting HTTP server on {}", listen_addr);
    let result = run_server(router, listen_addr).await;

    // Stop the workers and wait for their current pass to finish
    if shutdown_tx.send(true).is_err() {
        tracing::warn!("All background workers already stopped");
    }
    for worker in workers {
        if let Err(e) = worker.await {
            tracing::error!("Background worker panicked: {}", e);
        }
    }

    // Signal the config reload handler to stop
    shutdown_notify.notify_one();

    // Close database connections gracefully
    tracing::info!("Closing database connections...");
    db_pool.close().await;
    tracing::info!("Server shutdown complete");

    result.map_err(Into::into)
}

/// Initialize the tracing subscriber with environment-based filtering.
fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,sqlx=warn"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}
