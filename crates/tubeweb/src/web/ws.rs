//! WebSocket push channel.
//!
//! Each connection gets its own receiver on the core event bus and forwards
//! every event as one JSON text frame. Frames from the browser are ignored.

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
};
use futures_util::{SinkExt, StreamExt};
use serde_json::json;
use tokio::sync::broadcast::error::RecvError;

use tubecore::{Event, EventBus, Namespace};

use super::AppState;

/// GET /ws
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    let events = state.service.events().clone();
    ws.on_upgrade(move |socket| handle_connection(socket, events))
}

async fn handle_connection(socket: WebSocket, events: EventBus) {
    // Subscribe before greeting so nothing published in between is lost
    let mut updates = events.subscribe();
    let (mut ws_tx, mut ws_rx) = socket.split();
    log::info!("Client connected to WebSocket ({} listening)", events.receiver_count());

    let hello = Event::new(
        Namespace::System,
        "connected",
        json!({ "message": "Connected to tubewatch" }),
    );
    if ws_tx.send(Message::Text(hello.to_json().into())).await.is_err() {
        return;
    }

    let mut write_loop = tokio::spawn(async move {
        loop {
            match updates.recv().await {
                Ok(event) => {
                    if ws_tx.send(Message::Text(event.to_json().into())).await.is_err() {
                        break;
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    log::warn!("WebSocket client lagging, skipped {} events", skipped);
                    continue;
                }
                Err(RecvError::Closed) => break,
            }
        }
    });

    let mut read_loop = tokio::spawn(async move {
        while let Some(Ok(msg)) = ws_rx.next().await {
            if let Message::Close(_) = msg {
                break;
            }
        }
    });

    tokio::select! {
        _ = &mut write_loop => read_loop.abort(),
        _ = &mut read_loop => write_loop.abort(),
    }

    log::info!("Client disconnected from WebSocket");
}
