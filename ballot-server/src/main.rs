//! Ballot Server
//!
//! Vote intake, queue consumer and live tally broadcaster for a two-choice
//! ballot.

mod api;
mod config;
mod server;
mod shutdown;
mod state;

use ballot_core::config::ConfigStore;
use ballot_core::events::LiveRegistry;
use ballot_core::processors::{QueueConsumer, TallyBroadcaster};
use ballot_core::queue::RedisQueueConnector;
use ballot_core::store::PgStoreConnector;
use ballot_core::utils::retry::connect_with_retry;
use clap::Parser;
use config::{ConfigLoader, get_database_url, get_redis_url};
use server::{build_router, run_server};
use shutdown::{spawn_config_reload_handler, spawn_shutdown_listener};
use state::AppState;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::watch;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Ballot Server - vote ingestion and live tally
#[derive(Parser, Debug)]
#[command(name = "ballot-server")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to the configuration file
    #[arg(short, long, default_value = "./ballot-config.toml")]
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
    init_tracing();

    let args = Args::parse();

    tracing::info!("Starting ballot-server v{}", env!("CARGO_PKG_VERSION"));

    let config_loader = Arc::new(ConfigLoader::new(&args.config, args.listen));
    let loaded_config = config_loader.load().map_err(|e| {
        tracing::error!("Failed to load configuration: {}", e);
        e
    })?;
    tracing::info!("Configuration loaded from {:?}", args.config);

    let database_url = get_database_url().map_err(|e| {
        tracing::error!("DATABASE_URL environment variable not set");
        e
    })?;
    let redis_url = get_redis_url();
    let queue_name = loaded_config.queue.name.clone();

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let shutdown_tx = Arc::new(shutdown_tx);
    spawn_shutdown_listener(shutdown_tx.clone());

    // Request-path connections. Retried like the background loops so the
    // server can start before its dependencies.
    let mut startup_rx = shutdown_rx.clone();
    let Some(store) = connect_with_retry(
        &PgStoreConnector::new(&database_url).with_max_connections(10),
        loaded_config.consumer.retry,
        &mut startup_rx,
        |_| {},
    )
    .await
    else {
        tracing::info!("Shutdown requested before the database was reachable");
        return Ok(());
    };
    let Some(queue) = connect_with_retry(
        &RedisQueueConnector::new(&redis_url, &queue_name),
        loaded_config.consumer.retry,
        &mut startup_rx,
        |_| {},
    )
    .await
    else {
        tracing::info!("Shutdown requested before the queue was reachable");
        store.pool().close().await;
        return Ok(());
    };

    if args.migrate {
        tracing::info!("Running database migrations...");
        sqlx::migrate!("../migrations")
            .run(store.pool())
            .await
            .map_err(|e| {
                tracing::error!("Failed to run migrations: {}", e);
                e
            })?;
        tracing::info!("Migrations completed successfully");
    }

    let ballot = ConfigStore::new(loaded_config.ballot.clone());
    let live = LiveRegistry::new();

    let consumer = QueueConsumer::new(
        RedisQueueConnector::new(&redis_url, &queue_name),
        PgStoreConnector::new(&database_url),
        loaded_config.consumer.clone(),
        shutdown_rx.clone(),
    );
    let consumer_phase = consumer.subscribe_phase();
    let consumer_handle = tokio::spawn(consumer.run());

    let broadcaster = TallyBroadcaster::new(
        PgStoreConnector::new(&database_url),
        live.clone(),
        loaded_config.broadcaster.clone(),
        ballot.clone(),
        shutdown_rx.clone(),
    );
    let snapshots = broadcaster.snapshots();
    let broadcaster_handle = tokio::spawn(broadcaster.run());

    let reload_handle =
        spawn_config_reload_handler(ballot.clone(), config_loader, shutdown_rx.clone());

    let state = AppState {
        store: store.clone(),
        queue,
        live,
        snapshots,
        ballot,
        consumer_phase,
        recent_window: loaded_config.broadcaster.recent_window(),
    };

    let router = build_router(state);

    tracing::info!("Starting HTTP server on {}", loaded_config.listen);
    let result = run_server(router, loaded_config.listen, shutdown_rx.clone()).await;

    // Stop the background loops even if the server exited on its own.
    let _ = shutdown_tx.send(true);

    for (name, handle) in [
        ("QueueConsumer", consumer_handle),
        ("TallyBroadcaster", broadcaster_handle),
        ("config reload handler", reload_handle),
    ] {
        if let Err(e) = handle.await {
            tracing::error!("{} task failed: {}", name, e);
        }
    }

    tracing::info!("Closing database connections...");
    store.pool().close().await;
    tracing::info!("Server shutdown complete");

    result.map_err(Into::into)
}

/// Initialize the tracing subscriber with environment-based filtering.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,sqlx=warn"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}
