use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::{Message, WebSocket};
use futures_util::{Sink, SinkExt, StreamExt};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use super::AppState;
use crate::protocol::{decode_message, ClientMessage};
use crate::session::{ConnectionId, ConnectionLifecycle};

/// How long one socket write may take before the peer is treated as dead
///
/// A peer can hold the TCP connection open without ever reading; without a
/// bound its writer task would await forever and its queue would grow
/// unchecked, since the registry handoff keeps succeeding.
const SEND_TIMEOUT: Duration = Duration::from_secs(10);

/// Handles one peer's WebSocket connection, bound to a single document
pub struct WebSocketHandler {
    socket: WebSocket,
    state: AppState,
    document_id: String,
}

impl WebSocketHandler {
    /// Create a new WebSocket handler
    pub fn new(socket: WebSocket, state: AppState, document_id: String) -> Self {
        Self {
            socket,
            state,
            document_id,
        }
    }

    /// Drive the connection: admit it into the registry, pump frames both
    /// ways, and tear membership down on any exit path
    pub async fn handle(self) {
        let (mut ws_sender, mut ws_receiver) = self.socket.split();

        // Broadcasts destined for this peer arrive pre-encoded on this channel
        let (tx, mut rx) = mpsc::unbounded_channel::<Arc<str>>();

        let lifecycle =
            ConnectionLifecycle::new(self.state.registry().clone(), self.document_id.clone());
        lifecycle.open(tx);
        let connection_id = lifecycle.id();

        info!(
            "Peer {} connected to document '{}'",
            connection_id, self.document_id
        );

        // Writer task: registry handoffs -> socket. Ends when the peer is
        // evicted (sender dropped from the registry), the write fails, or
        // the write exceeds the delivery bound.
        let mut writer_task = tokio::spawn(async move {
            while let Some(frame) = rx.recv().await {
                if let Err(e) = send_frame(&mut ws_sender, frame).await {
                    warn!("Failed to send to peer {}: {}", connection_id, e);
                    break;
                }
            }
            debug!("Writer task ended for peer {}", connection_id);
        });

        // Reader task: inbound frames -> save coordinator
        let mut reader_task = {
            let state = self.state.clone();
            let document_id = self.document_id.clone();

            tokio::spawn(async move {
                while let Some(msg) = ws_receiver.next().await {
                    match msg {
                        Ok(Message::Text(text)) => {
                            handle_inbound(&state, &document_id, connection_id, text.as_str())
                                .await;
                        }
                        Ok(Message::Binary(_)) => {
                            debug!("Ignoring binary frame from peer {}", connection_id);
                        }
                        Ok(Message::Close(_)) => {
                            info!("Peer {} closed connection normally", connection_id);
                            break;
                        }
                        Ok(Message::Ping(_)) | Ok(Message::Pong(_)) => {
                            // Axum answers pings itself
                        }
                        Err(e) => {
                            warn!("WebSocket error for peer {}: {}", connection_id, e);
                            break;
                        }
                    }
                }
                debug!("Reader task ended for peer {}", connection_id);
            })
        };

        // Either side finishing means the connection is done; the survivor
        // must not outlive the closed connection
        tokio::select! {
            _ = &mut writer_task => reader_task.abort(),
            _ = &mut reader_task => writer_task.abort(),
        }

        lifecycle.begin_close();
        lifecycle.close();

        info!(
            "Peer {} disconnected from document '{}'",
            connection_id, self.document_id
        );
    }
}

/// Write one frame to the peer, bounded by [`SEND_TIMEOUT`]
///
/// Expiry is a failed delivery: the caller breaks out of the writer loop and
/// the lifecycle evicts the connection from the registry.
async fn send_frame<S>(ws_sender: &mut S, frame: Arc<str>) -> Result<(), String>
where
    S: Sink<Message> + Unpin,
    S::Error: std::fmt::Display,
{
    let send = ws_sender.send(Message::Text(frame.as_ref().into()));

    match tokio::time::timeout(SEND_TIMEOUT, send).await {
        Ok(Ok(())) => Ok(()),
        Ok(Err(e)) => Err(e.to_string()),
        Err(_) => Err(format!("delivery timed out after {:?}", SEND_TIMEOUT)),
    }
}

/// Dispatch one inbound text frame
///
/// Malformed frames and unknown message kinds are dropped, never fatal; a
/// failed save is logged and scoped to that one update, the connection
/// stays up.
async fn handle_inbound(
    state: &AppState,
    document_id: &str,
    connection_id: ConnectionId,
    text: &str,
) {
    let message: ClientMessage = match decode_message(text) {
        Ok(message) => message,
        Err(e) => {
            debug!(
                "Dropping malformed frame from peer {}: {}",
                connection_id, e
            );
            return;
        }
    };

    match message {
        ClientMessage::ContentUpdate { content } => {
            if let Err(e) = state
                .service()
                .save_and_notify(document_id, &content)
                .await
            {
                warn!(
                    "Failed to save update for document '{}' from peer {}: {}",
                    document_id, connection_id, e
                );
            }
        }
        ClientMessage::Unknown => {
            debug!("Ignoring unknown message kind from peer {}", connection_id);
        }
    }
}
