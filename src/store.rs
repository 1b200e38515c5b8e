//! Message history persistence
//!
//! Postgres-backed append-only log of message content. Persistence is
//! best-effort and decoupled from live delivery: the hub logs a failed save
//! and carries on. Only boot-time unavailability is fatal, after a bounded
//! number of connection attempts.

use std::time::Duration;

use async_trait::async_trait;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing::{info, warn};

use crate::error::AppError;
use crate::message::StoredMessage;

/// Boot-time connection attempts before giving up
pub const BOOT_ATTEMPTS: u32 = 10;

/// Pause between boot-time connection attempts
pub const BOOT_RETRY_INTERVAL: Duration = Duration::from_secs(2);

/// Durable message store seam
///
/// The hub and the connection handler only see this trait; tests substitute
/// an in-memory implementation.
#[async_trait]
pub trait MessageStore: Send + Sync + 'static {
    /// Append one message row
    async fn save(&self, content: &str) -> Result<(), AppError>;

    /// Up to `limit` most recent messages, re-oriented oldest → newest
    async fn fetch_recent(&self, limit: i64) -> Result<Vec<StoredMessage>, AppError>;
}

/// Postgres-backed store
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    /// Connect with bounded retry, then bootstrap the schema
    ///
    /// Retries cover the docker-compose case where the database container is
    /// still booting. After the final failed attempt the error is fatal.
    pub async fn connect(database_url: &str) -> Result<Self, AppError> {
        let mut attempt = 1;
        let pool = loop {
            match PgPoolOptions::new()
                .max_connections(5)
                .connect(database_url)
                .await
            {
                Ok(pool) => break pool,
                Err(e) if attempt < BOOT_ATTEMPTS => {
                    warn!(
                        "Database not ready yet (attempt {attempt}/{BOOT_ATTEMPTS}), \
                         retrying in {}s: {e}",
                        BOOT_RETRY_INTERVAL.as_secs()
                    );
                    attempt += 1;
                    tokio::time::sleep(BOOT_RETRY_INTERVAL).await;
                }
                Err(e) => {
                    return Err(AppError::BootConnect {
                        attempts: BOOT_ATTEMPTS,
                        source: e,
                    })
                }
            }
        };

        info!("Connected to Postgres");

        let store = Self { pool };
        store.init_schema().await?;
        Ok(store)
    }

    /// Create the messages table and its recency index if missing
    async fn init_schema(&self) -> Result<(), AppError> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS messages (
                id BIGSERIAL PRIMARY KEY,
                content TEXT NOT NULL,
                created_at TIMESTAMPTZ NOT NULL DEFAULT now()
            )",
        )
        .execute(&self.pool)
        .await?;

        // Descending index keeps the recent-history query off a full sort.
        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_messages_created_at \
             ON messages (created_at DESC)",
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

#[async_trait]
impl MessageStore for PgStore {
    async fn save(&self, content: &str) -> Result<(), AppError> {
        sqlx::query("INSERT INTO messages (content) VALUES ($1)")
            .bind(content)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn fetch_recent(&self, limit: i64) -> Result<Vec<StoredMessage>, AppError> {
        let mut rows: Vec<StoredMessage> = sqlx::query_as(
            "SELECT id, content, created_at FROM messages \
             ORDER BY created_at DESC LIMIT $1",
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        // Query returns newest first; history is displayed oldest first.
        rows.reverse();
        Ok(rows)
    }
}
