//! Hub actor implementation
//!
//! The central actor owning the registry of connected clients. All four
//! event streams — register, unregister, locally-originated messages, and
//! bus-delivered messages — are processed one at a time by a single task,
//! so registry membership needs no locking and cannot race.
//!
//! A locally-originated message is persisted, then published to the bus;
//! it reaches local clients only when it comes back on the subscription,
//! exactly like any other instance's traffic. Store and bus calls run
//! inline in the loop, so a slow backend stalls all delivery for the
//! duration of the call; that tradeoff is accepted for the race-free
//! registry.

use std::collections::HashMap;

use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::bus::{Bus, TOPIC};
use crate::client::Client;
use crate::store::MessageStore;
use crate::types::ClientId;

/// Commands sent from connection handlers to the hub actor
#[derive(Debug)]
pub enum HubCommand {
    /// New client finished the upgrade handshake
    Register { client: Client },
    /// Connection ended; safe to send even if the client was already
    /// evicted for backpressure
    Unregister { client_id: ClientId },
    /// A locally connected client sent a message
    PublishLocal { content: String },
}

/// The hub actor
///
/// Generic over the store and bus seams so tests can run it against
/// in-memory doubles.
pub struct Hub<S, B> {
    /// Registered clients, touched only from `run`
    clients: HashMap<ClientId, Client>,
    /// Register/unregister/local-message stream from connection handlers
    receiver: mpsc::Receiver<HubCommand>,
    /// Payloads arriving from the bus subscription pump
    bus_inbound: mpsc::UnboundedReceiver<String>,
    store: S,
    bus: B,
}

impl<S: MessageStore, B: Bus> Hub<S, B> {
    pub fn new(
        receiver: mpsc::Receiver<HubCommand>,
        bus_inbound: mpsc::UnboundedReceiver<String>,
        store: S,
        bus: B,
    ) -> Self {
        Self {
            clients: HashMap::new(),
            receiver,
            bus_inbound,
            store,
            bus,
        }
    }

    /// Run the hub event loop
    ///
    /// Merges the command stream and the bus-delivered stream, processing
    /// one event at a time. If the subscription pump dies the loop keeps
    /// serving registry changes and publishes; only live fan-in stops.
    pub async fn run(mut self) {
        info!("Hub started");

        let mut bus_open = true;
        loop {
            tokio::select! {
                cmd = self.receiver.recv() => match cmd {
                    Some(cmd) => self.handle_command(cmd).await,
                    // All handler senders dropped.
                    None => break,
                },
                payload = self.bus_inbound.recv(), if bus_open => match payload {
                    Some(payload) => self.deliver_remote(payload),
                    None => {
                        warn!("Bus-delivered stream closed; live fan-in stopped");
                        bus_open = false;
                    }
                },
            }
        }

        info!("Hub shutting down");
    }

    async fn handle_command(&mut self, cmd: HubCommand) {
        match cmd {
            HubCommand::Register { client } => self.register(client),
            HubCommand::Unregister { client_id } => self.unregister(client_id),
            HubCommand::PublishLocal { content } => self.publish_local(content).await,
        }
    }

    fn register(&mut self, client: Client) {
        info!("Client {} registered", client.id);
        self.clients.insert(client.id, client);
        debug!("Total clients: {}", self.clients.len());
    }

    /// No-op when the client is absent: it may already have been evicted
    /// for backpressure before its connection task noticed.
    fn unregister(&mut self, client_id: ClientId) {
        if self.clients.remove(&client_id).is_some() {
            info!("Client {client_id} unregistered");
            debug!("Total clients: {}", self.clients.len());
        }
    }

    /// Persist, then publish to the bus
    ///
    /// Both calls are best-effort. A failed save still publishes; a failed
    /// publish leaves the message durable but never delivered live on any
    /// instance, since local delivery only happens via the bus round trip.
    async fn publish_local(&mut self, content: String) {
        if let Err(e) = self.store.save(&content).await {
            error!("Failed to save message: {e}");
        }

        if let Err(e) = self.bus.publish(TOPIC, &content).await {
            error!("Bus publish failed, message dropped from live delivery: {e}");
        }
    }

    /// Fan one bus-delivered payload out to every registered client
    ///
    /// Enqueue is strictly non-blocking: a full (or already closed) outbound
    /// queue marks the client as a slow consumer, which is evicted on the
    /// spot. Dropping the evicted handle closes its queue, ending the
    /// connection's write task.
    fn deliver_remote(&mut self, payload: String) {
        let mut evicted = Vec::new();
        for (id, client) in &self.clients {
            if client.try_send(payload.clone()).is_err() {
                evicted.push(*id);
            }
        }
        for client_id in evicted {
            warn!("Evicting slow consumer {client_id}");
            self.clients.remove(&client_id);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::Ordering;
    use std::time::Duration;

    use tokio::sync::mpsc::error::TryRecvError;

    use crate::bus::memory::MemoryBus;
    use crate::store::memory::MemoryStore;

    use super::*;

    struct TestHub {
        hub: Hub<MemoryStore, MemoryBus>,
        store: MemoryStore,
        bus: MemoryBus,
        cmd_tx: mpsc::Sender<HubCommand>,
    }

    /// Hub wired to in-memory doubles; the bus loops published payloads
    /// straight back into the hub's bus-delivered channel.
    fn test_hub() -> TestHub {
        let (cmd_tx, cmd_rx) = mpsc::channel(64);
        let (bus_tx, bus_rx) = mpsc::unbounded_channel();
        let store = MemoryStore::default();
        let bus = MemoryBus::new(bus_tx);
        let hub = Hub::new(cmd_rx, bus_rx, store.clone(), bus.clone());
        TestHub {
            hub,
            store,
            bus,
            cmd_tx,
        }
    }

    fn client_pair(capacity: usize) -> (Client, mpsc::Receiver<String>, ClientId) {
        let (tx, rx) = mpsc::channel(capacity);
        let id = ClientId::new();
        (Client::new(id, tx), rx, id)
    }

    #[tokio::test]
    async fn test_registry_reflects_net_membership() {
        let mut t = test_hub();
        let (a, _a_rx, a_id) = client_pair(8);
        let (b, _b_rx, b_id) = client_pair(8);

        t.hub.register(a);
        t.hub.register(b);
        assert_eq!(t.hub.clients.len(), 2);

        t.hub.unregister(a_id);
        assert_eq!(t.hub.clients.len(), 1);
        assert!(!t.hub.clients.contains_key(&a_id));
        assert!(t.hub.clients.contains_key(&b_id));
    }

    #[tokio::test]
    async fn test_unregister_absent_is_noop() {
        let mut t = test_hub();
        t.hub.unregister(ClientId::new());
        assert!(t.hub.clients.is_empty());
    }

    #[tokio::test]
    async fn test_publish_persists_then_publishes() {
        let mut t = test_hub();
        t.hub.publish_local("hi".to_string()).await;

        let rows = t.store.rows.lock().unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].content, "hi");
        assert_eq!(t.bus.published.lock().unwrap().as_slice(), ["hi"]);
    }

    #[tokio::test]
    async fn test_round_trip_delivers_to_everyone_once() {
        let t = test_hub();
        let (a, mut a_rx, _) = client_pair(8);
        let (b, mut b_rx, _) = client_pair(8);
        let (c, mut c_rx, _) = client_pair(8);

        let store = t.store.clone();
        tokio::spawn(t.hub.run());

        for client in [a, b, c] {
            t.cmd_tx.send(HubCommand::Register { client }).await.unwrap();
        }
        t.cmd_tx
            .send(HubCommand::PublishLocal {
                content: "hi".to_string(),
            })
            .await
            .unwrap();

        for rx in [&mut a_rx, &mut b_rx, &mut c_rx] {
            let payload = tokio::time::timeout(Duration::from_secs(1), rx.recv())
                .await
                .expect("delivery timed out")
                .expect("queue closed");
            assert_eq!(payload, "hi");
            // Exactly once: nothing else was ever published.
            assert!(matches!(rx.try_recv(), Err(TryRecvError::Empty)));
        }

        assert_eq!(store.rows.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_slow_consumer_is_evicted() {
        let mut t = test_hub();
        let (a, mut a_rx, _) = client_pair(1);
        let (b, mut b_rx, b_id) = client_pair(1);
        let (c, mut c_rx, _) = client_pair(1);

        t.hub.register(a);
        t.hub.register(b);
        t.hub.register(c);

        // First delivery fills every capacity-1 queue; B never drains.
        t.hub.deliver_remote("m1".to_string());
        assert_eq!(a_rx.recv().await.as_deref(), Some("m1"));
        assert_eq!(c_rx.recv().await.as_deref(), Some("m1"));

        // Second delivery finds B's queue full and evicts it.
        t.hub.deliver_remote("m2".to_string());
        assert_eq!(t.hub.clients.len(), 2);
        assert!(!t.hub.clients.contains_key(&b_id));

        assert_eq!(a_rx.recv().await.as_deref(), Some("m2"));
        assert_eq!(c_rx.recv().await.as_deref(), Some("m2"));

        // B's queue still holds m1, then closes; it never sees m2.
        assert_eq!(b_rx.recv().await.as_deref(), Some("m1"));
        assert!(b_rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_unregister_after_eviction_is_safe() {
        let mut t = test_hub();
        let (b, _b_rx, b_id) = client_pair(1);
        t.hub.register(b);

        t.hub.deliver_remote("m1".to_string());
        t.hub.deliver_remote("m2".to_string());
        assert!(!t.hub.clients.contains_key(&b_id));

        // The connection task sends its own Unregister later; must not
        // panic or disturb anything.
        t.hub.unregister(b_id);
        assert!(t.hub.clients.is_empty());
    }

    #[tokio::test]
    async fn test_bus_failure_keeps_message_durable_but_undelivered() {
        let mut t = test_hub();
        let (a, mut a_rx, _) = client_pair(8);
        t.hub.register(a);

        t.bus.fail.store(true, Ordering::SeqCst);
        t.hub.publish_local("lost".to_string()).await;

        // Durable, but nothing looped back from the bus.
        assert_eq!(t.store.rows.lock().unwrap().len(), 1);
        assert!(t.bus.published.lock().unwrap().is_empty());
        assert!(matches!(
            t.hub.bus_inbound.try_recv(),
            Err(TryRecvError::Empty)
        ));
        assert!(matches!(a_rx.try_recv(), Err(TryRecvError::Empty)));
    }

    #[tokio::test]
    async fn test_store_failure_does_not_block_delivery() {
        let mut t = test_hub();

        t.store.fail.store(true, Ordering::SeqCst);
        t.hub.publish_local("hi".to_string()).await;

        assert!(t.store.rows.lock().unwrap().is_empty());
        assert_eq!(t.bus.published.lock().unwrap().as_slice(), ["hi"]);
    }
}
