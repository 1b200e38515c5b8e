//! Registered-client handle
//!
//! What the hub keeps in its registry for each connected client: the id and
//! the sending half of the bounded outbound queue. The registry holds the
//! only sender, so dropping the `Client` closes the queue exactly once and
//! the connection's write task observes the close and terminates.

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

use crate::types::ClientId;

/// Capacity of each client's outbound queue
///
/// A queue this far behind marks the client as a slow consumer; the hub
/// evicts it rather than buffer further or block.
pub const OUTBOUND_QUEUE_SIZE: usize = 256;

/// A client as registered with the hub
#[derive(Debug)]
pub struct Client {
    /// Unique identifier for this client
    pub id: ClientId,
    /// Hub → connection outbound queue (bounded)
    sender: mpsc::Sender<String>,
}

impl Client {
    /// Create a new client handle from the connection's outbound sender
    pub fn new(id: ClientId, sender: mpsc::Sender<String>) -> Self {
        Self { id, sender }
    }

    /// Non-blocking enqueue of one payload
    ///
    /// Errors when the queue is full (slow consumer) or already closed;
    /// either way the hub treats the client as gone.
    pub fn try_send(&self, payload: String) -> Result<(), TrySendError<String>> {
        self.sender.try_send(payload)
    }
}
