//! Scalable Real-Time Chat Service - Entry Point
//!
//! Connects to Postgres (with bounded retry) and Redis, starts the hub
//! actor and the bus subscriber task, and serves the HTTP surface.

use std::sync::Arc;

use axum::routing::get;
use axum::Router;
use clap::Parser;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use chat_hub::bus::{self, RedisBus};
use chat_hub::handler::{self, AppState};
use chat_hub::{Config, Hub, PgStore};

/// Channel buffer size for hub commands
const COMMAND_BUFFER_SIZE: usize = 256;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging with environment filter
    // Use RUST_LOG env var to control log level
    // e.g., RUST_LOG=debug or RUST_LOG=chat_hub=trace
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("chat_hub=info")),
        )
        .init();

    let config = Config::parse();

    // Postgres is required at boot: keep retrying while the container
    // comes up, then treat unavailability as fatal.
    let store = PgStore::connect(&config.database_url).await?;

    // Redis connectivity is lazy; steady-state failures are logged by the
    // hub and the subscriber, never fatal.
    let redis_client = redis::Client::open(config.redis_url())?;

    let (cmd_tx, cmd_rx) = mpsc::channel(COMMAND_BUFFER_SIZE);
    let (bus_tx, bus_rx) = mpsc::unbounded_channel();

    let hub = Hub::new(cmd_rx, bus_rx, store.clone(), RedisBus::new(redis_client.clone()));
    tokio::spawn(hub.run());
    info!("Hub actor started");

    // Bus subscriber pump; if it ends, live fan-in stops for this instance.
    tokio::spawn(async move {
        match bus::run_subscriber(redis_client, bus_tx).await {
            Ok(()) => error!("Bus subscription stream ended; live delivery stopped"),
            Err(e) => error!("Bus subscription failed: {e}"),
        }
    });

    let state = Arc::new(AppState { cmd_tx, store });
    let app = Router::new()
        .route("/", get(handler::index))
        .route("/ws", get(handler::ws_handler::<PgStore>))
        .with_state(state);

    let listener = TcpListener::bind(&config.addr).await?;
    info!("Server started on {}", config.addr);
    axum::serve(listener, app).await?;

    Ok(())
}
