//! WebSocket connection loop.
//!
//! Handles the read/write loop for a single WebSocket connection: client
//! frames go through the [`SessionProtocol`], channel events queued by the
//! registries are written out in arrival order.

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;

use super::protocol::SessionProtocol;
use crate::domain::{ChannelToken, UserRef};
use crate::service::GatewayService;

/// Runs the read/write loop for a single WebSocket connection.
///
/// - Registers the connection and sends `Connected`.
/// - Reads frames from the client and writes back their responses.
/// - Forwards queued channel events (`handle.ddp`, `send`) to the client.
/// - Disconnects the channel on close, error, or a malformed frame.
pub async fn run_connection(socket: WebSocket, service: Arc<GatewayService>, user: Option<UserRef>) {
    let (mut ws_tx, mut ws_rx) = socket.split();
    let (event_tx, mut event_rx) = mpsc::unbounded_channel();
    let mut session = SessionProtocol::new(service, ChannelToken::new());
    let channel = session.channel();

    match session.connect(user, event_tx).await {
        Ok(hello) => {
            if ws_tx.send(Message::text(hello.to_value().to_string())).await.is_err() {
                session.disconnect().await;
                return;
            }
        }
        Err(err) => {
            tracing::warn!(%channel, error = %err, "session registration failed");
            return;
        }
    }

    loop {
        tokio::select! {
            msg = ws_rx.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        match session.receive(text.as_str()).await {
                            Ok(Some(response)) => {
                                if ws_tx.send(Message::text(response.to_value().to_string())).await.is_err() {
                                    break;
                                }
                            }
                            Ok(None) => {}
                            Err(err) => {
                                tracing::warn!(%channel, error = %err, "closing session on malformed frame");
                                let _ = ws_tx.send(Message::Close(None)).await;
                                break;
                            }
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Err(err)) => {
                        tracing::debug!(%channel, error = %err, "ws read failed");
                        break;
                    }
                    _ => {}
                }
            }
            event = event_rx.recv() => {
                let Some(event) = event else { break };
                let frame = session.handle_event(event);
                if ws_tx.send(Message::text(frame.to_string())).await.is_err() {
                    break;
                }
            }
        }
    }

    session.disconnect().await;
    tracing::debug!(%channel, "ws connection closed");
}
