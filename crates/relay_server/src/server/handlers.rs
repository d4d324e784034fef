//! Per-connection task.
//!
//! Performs the WebSocket handshake, registers the connection, then turns
//! inbound frames into [`ConnectionEvent`]s for the relay until the peer goes
//! away or the server shuts down. A dedicated writer task drains the
//! connection's outbound queue into the socket.

use crate::connection::ConnectionId;
use crate::error::ServerError;
use crate::messaging::{ConnectionEvent, Relay};
use futures::{SinkExt, StreamExt};
use std::net::SocketAddr;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, watch};
use tokio_tungstenite::{accept_async, tungstenite::Message};
use tracing::{debug, error};

/// Runs one client connection from handshake to close.
///
/// Returns an error only if the handshake fails; in that case the stream is
/// dropped without ever touching the registry. Once registered, the
/// connection always ends with exactly one `Closed` event, and no message
/// is handled after it.
///
/// Once `shutdown` turns `true` the client is sent a Close frame and the
/// connection ends. A handshake completing after that point is closed
/// straight away and never registered.
pub async fn handle_connection(
    stream: TcpStream,
    addr: SocketAddr,
    relay: Relay,
    mut shutdown: watch::Receiver<bool>,
) -> Result<(), ServerError> {
    let mut ws_stream = accept_async(stream)
        .await
        .map_err(|e| ServerError::Network(format!("WebSocket handshake failed for {addr}: {e}")))?;

    if *shutdown.borrow() {
        debug!("Refusing {} during shutdown", addr);
        let _ = ws_stream.close(None).await;
        return Ok(());
    }

    let (mut ws_sink, mut ws_receiver) = ws_stream.split();
    let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel::<Message>();

    let connections = relay.connections().clone();
    let connection_id = connections.next_connection_id();
    let player_id = connections.register(connection_id, addr, outbound_tx);

    let writer = tokio::spawn(async move {
        while let Some(message) = outbound_rx.recv().await {
            let closing = matches!(message, Message::Close(_));
            if let Err(e) = ws_sink.send(message).await {
                debug!("Send to player {} failed: {}", player_id, e);
                break;
            }
            if closing {
                break;
            }
        }
        let _ = ws_sink.close().await;
    });

    dispatch(&relay, connection_id, ConnectionEvent::Opened);

    loop {
        let frame = tokio::select! {
            frame = ws_receiver.next() => frame,
            _ = stopping(&mut shutdown) => {
                debug!("Closing player {} for shutdown", player_id);
                if let Ok(handle) = relay.connections().handle(connection_id) {
                    handle.send(Message::Close(None));
                }
                break;
            }
        };
        let Some(frame) = frame else {
            break;
        };

        let payload = match frame {
            Ok(Message::Text(text)) => text.as_bytes().to_vec(),
            Ok(Message::Binary(data)) => data.to_vec(),
            Ok(Message::Close(_)) => {
                debug!("Player {} requested close", player_id);
                break;
            }
            Ok(Message::Ping(_)) | Ok(Message::Pong(_)) | Ok(Message::Frame(_)) => continue,
            Err(e) => {
                debug!("WebSocket error for player {}: {}", player_id, e);
                break;
            }
        };

        dispatch(&relay, connection_id, ConnectionEvent::Message(payload));
    }

    // Unregistering drops the last sender, which ends the writer.
    dispatch(&relay, connection_id, ConnectionEvent::Closed);
    let _ = writer.await;

    Ok(())
}

/// Resolves once shutdown is requested or the server is gone.
async fn stopping(shutdown: &mut watch::Receiver<bool>) {
    let _ = shutdown.wait_for(|stopping| *stopping).await;
}

fn dispatch(relay: &Relay, connection_id: ConnectionId, event: ConnectionEvent) {
    if let Err(e) = relay.handle_event(connection_id, event) {
        error!("Relay error on connection {}: {}", connection_id, e);
    }
}
