//! Scalable Real-Time Chat Service Library
//!
//! A WebSocket chat server that scales horizontally: every instance
//! publishes to a shared Redis pub/sub topic and fans bus-delivered
//! messages out to its locally connected clients, with best-effort
//! message history in Postgres.
//!
//! # Architecture
//! Uses the Actor pattern with `mpsc` channels:
//! - `Hub` is the central actor owning the client registry
//! - Each connection runs read/write tasks communicating with the hub
//! - A subscriber task pumps bus payloads into the hub
//! - No locks needed - all registry access goes through message passing
//!
//! Messages sent by a local client are persisted, published to the bus,
//! and delivered to local clients only when they come back on the
//! subscription - the same path every other instance's messages take.
//!
//! # Example
//! ```ignore
//! use tokio::sync::mpsc;
//! use chat_hub::{Hub, PgStore, RedisBus};
//!
//! #[tokio::main]
//! async fn main() {
//!     let store = PgStore::connect("postgres://...").await.unwrap();
//!     let redis = redis::Client::open("redis://localhost:6379").unwrap();
//!
//!     let (cmd_tx, cmd_rx) = mpsc::channel(256);
//!     let (bus_tx, bus_rx) = mpsc::unbounded_channel();
//!
//!     tokio::spawn(Hub::new(cmd_rx, bus_rx, store, RedisBus::new(redis.clone())).run());
//!     tokio::spawn(chat_hub::bus::run_subscriber(redis, bus_tx));
//!     // hand cmd_tx to the HTTP layer...
//! }
//! ```

pub mod bus;
pub mod client;
pub mod config;
pub mod error;
pub mod handler;
pub mod hub;
pub mod message;
pub mod store;
pub mod types;

// Re-export main types for convenience
pub use bus::{Bus, RedisBus, TOPIC};
pub use client::Client;
pub use config::Config;
pub use error::AppError;
pub use handler::AppState;
pub use hub::{Hub, HubCommand};
pub use message::StoredMessage;
pub use store::{MessageStore, PgStore};
pub use types::ClientId;
