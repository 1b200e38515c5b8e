//! Persisted message shape
//!
//! One append-only record type: auto-assigned monotonic id, required text
//! content, creation timestamp defaulted at insert. Messages are immutable
//! once created; across the bus only the raw content travels, so this struct
//! exists purely for the history path.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;

/// A message row as stored in Postgres
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct StoredMessage {
    pub id: i64,
    pub content: String,
    pub created_at: DateTime<Utc>,
}
