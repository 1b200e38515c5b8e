//! Error types for the chat service
//!
//! Defines application-level errors using thiserror. Steady-state bus and
//! storage failures are logged where they occur and never propagate back to
//! the originating client; only boot-time store failure is fatal.

use thiserror::Error;

/// Application-level errors
#[derive(Debug, Error)]
pub enum AppError {
    /// Redis bus error (publish or subscribe)
    #[error("bus error: {0}")]
    Bus(#[from] redis::RedisError),

    /// Postgres storage error
    #[error("storage error: {0}")]
    Storage(#[from] sqlx::Error),

    /// Store still unreachable after the bounded boot retries (fatal)
    #[error("database unreachable after {attempts} attempts: {source}")]
    BootConnect { attempts: u32, source: sqlx::Error },
}
