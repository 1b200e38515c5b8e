//! Redis pub/sub bus adapter
//!
//! Pure relay of raw payloads on one fixed topic: no envelope, no sender
//! identity, no deduplication. Every hub instance publishes here and
//! receives everything back, its own messages included; local live delivery
//! always goes through this round trip.

use async_trait::async_trait;
use futures_util::StreamExt;
use redis::AsyncCommands;
use tokio::sync::mpsc;
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::error::AppError;

/// Fixed pub/sub channel shared by every hub instance system-wide
pub const TOPIC: &str = "chat_room";

/// Bus publisher seam
///
/// Publish failures are reported to the caller; the hub logs them and moves
/// on without retrying.
#[async_trait]
pub trait Bus: Send + Sync + 'static {
    /// Broadcast one payload to all subscribed instances (this one included)
    async fn publish(&self, topic: &str, payload: &str) -> Result<(), AppError>;
}

/// Redis-backed publisher
///
/// The connection is opened lazily on first publish and dropped on error so
/// the next publish reconnects. Only the database is required at boot; an
/// unreachable broker surfaces as logged publish failures instead.
pub struct RedisBus {
    client: redis::Client,
    conn: Mutex<Option<redis::aio::MultiplexedConnection>>,
}

impl RedisBus {
    pub fn new(client: redis::Client) -> Self {
        Self {
            client,
            conn: Mutex::new(None),
        }
    }
}

#[async_trait]
impl Bus for RedisBus {
    async fn publish(&self, topic: &str, payload: &str) -> Result<(), AppError> {
        let mut guard = self.conn.lock().await;
        let mut conn = match guard.take() {
            Some(conn) => conn,
            None => self.client.get_multiplexed_async_connection().await?,
        };

        match conn.publish::<_, _, ()>(topic, payload).await {
            Ok(()) => {
                *guard = Some(conn);
                Ok(())
            }
            // Connection stays dropped; the next publish reconnects.
            Err(e) => Err(e.into()),
        }
    }
}

/// Pump bus-delivered payloads into the hub
///
/// Runs as an independent task. The hub-facing channel is unbounded so a
/// stalled hub loop can never back-pressure the Redis subscription itself.
/// When the subscription connection drops the stream ends and the task
/// returns; no reconnection is attempted.
pub async fn run_subscriber(
    client: redis::Client,
    tx: mpsc::UnboundedSender<String>,
) -> Result<(), AppError> {
    let mut pubsub = client.get_async_pubsub().await?;
    pubsub.subscribe(TOPIC).await?;
    info!("Subscribed to bus topic '{TOPIC}'");

    let mut stream = pubsub.on_message();
    while let Some(msg) = stream.next().await {
        let payload: String = match msg.get_payload() {
            Ok(payload) => payload,
            Err(e) => {
                warn!("Dropping undecodable bus payload: {e}");
                continue;
            }
        };
        if tx.send(payload).is_err() {
            // Hub is gone; nothing left to deliver to.
            break;
        }
    }
    Ok(())
}
