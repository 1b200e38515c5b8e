//! HTTP surface and WebSocket connection handler
//!
//! Two routes: the root serves the embedded chat page, `/ws` upgrades to a
//! WebSocket and runs the per-connection read and write duties. The handler
//! owns the transport; the hub only ever sees the registered `Client`
//! handle and its outbound queue.

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::{Html, IntoResponse};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::client::{Client, OUTBOUND_QUEUE_SIZE};
use crate::hub::HubCommand;
use crate::store::MessageStore;
use crate::types::ClientId;

/// Number of history messages replayed to a newly connected client
pub const HISTORY_LIMIT: i64 = 50;

/// Shared state handed to the axum handlers
pub struct AppState<S> {
    /// Hub command stream
    pub cmd_tx: mpsc::Sender<HubCommand>,
    /// Store handle for the initial-history fetch; the hub's steady-state
    /// path never goes through this
    pub store: S,
}

/// `GET /` — embedded chat page
pub async fn index() -> Html<&'static str> {
    Html(include_str!("../static/index.html"))
}

/// `GET /ws` — upgrade and hand the socket to the connection task
pub async fn ws_handler<S: MessageStore>(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState<S>>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// Per-connection lifecycle
///
/// Replays recent history, registers with the hub, then runs the read duty
/// (inbound frames → `PublishLocal`) and write duty (outbound queue →
/// socket) until either side ends. The final `Unregister` is safe even if
/// the hub already evicted this client for backpressure.
async fn handle_socket<S: MessageStore>(socket: WebSocket, state: Arc<AppState<S>>) {
    let (mut ws_sender, mut ws_receiver) = socket.split();
    let client_id = ClientId::new();
    info!("Client {client_id} connected");

    // History first, so the client sees it before any live traffic.
    match state.store.fetch_recent(HISTORY_LIMIT).await {
        Ok(history) => {
            for msg in history {
                if ws_sender.send(Message::Text(msg.content)).await.is_err() {
                    debug!("Client {client_id} dropped during history replay");
                    return;
                }
            }
        }
        Err(e) => warn!("History fetch failed for {client_id}: {e}"),
    }

    let (msg_tx, mut msg_rx) = mpsc::channel::<String>(OUTBOUND_QUEUE_SIZE);

    // The registry holds the only sender; unregistration or eviction drops
    // it and closes the queue, which ends the write task below.
    if state
        .cmd_tx
        .send(HubCommand::Register {
            client: Client::new(client_id, msg_tx),
        })
        .await
        .is_err()
    {
        error!("Failed to register client {client_id} - hub closed");
        return;
    }

    let cmd_tx_read = state.cmd_tx.clone();

    // Read duty: inbound frames -> hub local-message stream
    let read_task = tokio::spawn(async move {
        while let Some(msg) = ws_receiver.next().await {
            match msg {
                Ok(Message::Text(content)) => {
                    if cmd_tx_read
                        .send(HubCommand::PublishLocal { content })
                        .await
                        .is_err()
                    {
                        debug!("Hub closed, ending read task for {client_id}");
                        break;
                    }
                }
                Ok(Message::Close(_)) => {
                    debug!("Client {client_id} sent close frame");
                    break;
                }
                // Binary, ping and pong frames are ignored; tungstenite
                // answers pings itself.
                Ok(_) => {}
                Err(e) => {
                    debug!("WebSocket error for {client_id}: {e}");
                    break;
                }
            }
        }
        debug!("Read task ended for {client_id}");
    });

    // Write duty: drain the outbound queue to the socket
    let write_task = tokio::spawn(async move {
        while let Some(payload) = msg_rx.recv().await {
            if ws_sender.send(Message::Text(payload)).await.is_err() {
                debug!("WebSocket send failed, ending write task");
                break;
            }
        }
        debug!("Write task ended for {client_id}");

        let _ = ws_sender.close().await;
    });

    // Whichever duty ends first tears the connection down; the other ends
    // on its own once the queue closes or the socket drops.
    tokio::select! {
        _ = read_task => {}
        _ = write_task => {}
    }

    let _ = state
        .cmd_tx
        .send(HubCommand::Unregister { client_id })
        .await;

    info!("Client {client_id} disconnected");
}
