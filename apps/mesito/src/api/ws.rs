//! WebSocket event feed.
//!
//! Each connection subscribes to the emission channel and receives every
//! emission as a JSON text frame `{"event": ..., "data": ...}`. Clients may
//! send `machine_change` frames, which are relayed to all observers.

use super::AppState;
use axum::extract::State;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::response::Response;
use mesito_core::Emission;
use tokio::sync::broadcast::Receiver;
use tokio::sync::broadcast::error::RecvError;

pub async fn handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    // Subscribe before the handshake completes so no emission after it is missed.
    let events = state.events.subscribe();
    ws.on_upgrade(move |socket| relay(socket, state, events))
}

async fn relay(mut socket: WebSocket, state: AppState, mut events: Receiver<Emission>) {
    tracing::debug!("Observer connected");

    loop {
        tokio::select! {
            event = events.recv() => match event {
                Ok(emission) => {
                    let text = match serde_json::to_string(&emission) {
                        Ok(text) => text,
                        Err(err) => {
                            tracing::error!(error = %err, "Failed to encode emission");
                            continue;
                        }
                    };
                    if socket.send(Message::Text(text.into())).await.is_err() {
                        break;
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "Observer lagged behind, emissions dropped");
                }
                Err(RecvError::Closed) => break,
            },
            incoming = socket.recv() => match incoming {
                Some(Ok(Message::Text(text))) => match client_emission(text.as_str()) {
                    Some(emission) => state.emit(emission),
                    None => tracing::warn!(frame = %text.as_str(), "Ignoring client frame"),
                },
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                Some(Ok(_)) => {}
            },
        }
    }

    tracing::debug!("Observer disconnected");
}

/// Parse a frame sent by a client. Only `machine_change` may be relayed.
fn client_emission(text: &str) -> Option<Emission> {
    match serde_json::from_str(text) {
        Ok(emission @ Emission::MachineChange(_)) => Some(emission),
        _ => None,
    }
}
