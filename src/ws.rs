//! WebSocket transport
//!
//! `GET /ws/:client_id` carries the same turn pipeline as the REST chat
//! endpoint: one JSON response frame per inbound frame, with a welcome frame
//! on connect. Inbound frames are either JSON `{message, language}` objects
//! or raw text treated as a Hindi query. A registry tracks live connections
//! and supports broadcast.

use std::collections::HashMap;
use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, State};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::{mpsc, RwLock};
use tracing::{info, warn};

use crate::orchestrator::Orchestrator;

const WELCOME_MESSAGE: &str = "नमस्कार! मैं KrishiSampann हूँ, आपका कृषि और वित्तीय सलाहकार।";

/// Live-connection registry. Each client gets an outbound channel; dropping
/// the channel on disconnect unregisters it.
#[derive(Default)]
pub struct ConnectionRegistry {
    clients: RwLock<HashMap<String, mpsc::UnboundedSender<String>>>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn register(&self, client_id: &str, sender: mpsc::UnboundedSender<String>) {
        self.clients
            .write()
            .await
            .insert(client_id.to_string(), sender);
        info!(client_id, "websocket connected");
    }

    pub async fn unregister(&self, client_id: &str) {
        self.clients.write().await.remove(client_id);
        info!(client_id, "websocket disconnected");
    }

    pub async fn send_to(&self, client_id: &str, frame: String) -> bool {
        let clients = self.clients.read().await;
        match clients.get(client_id) {
            Some(sender) => sender.send(frame).is_ok(),
            None => false,
        }
    }

    /// Send a frame to every live client; stale channels are pruned.
    pub async fn broadcast(&self, frame: &str) {
        let mut stale = Vec::new();
        {
            let clients = self.clients.read().await;
            for (client_id, sender) in clients.iter() {
                if sender.send(frame.to_string()).is_err() {
                    stale.push(client_id.clone());
                }
            }
        }

        if !stale.is_empty() {
            let mut clients = self.clients.write().await;
            for client_id in stale {
                clients.remove(&client_id);
            }
        }
    }

    pub async fn active_count(&self) -> usize {
        self.clients.read().await.len()
    }

    pub async fn connected_clients(&self) -> Vec<String> {
        self.clients.read().await.keys().cloned().collect()
    }
}

/// An inbound frame reduced to its query and language.
pub fn parse_frame(raw: &str) -> (String, String) {
    match serde_json::from_str::<serde_json::Value>(raw) {
        Ok(value) => {
            let query = value
                .get("message")
                .and_then(|m| m.as_str())
                .unwrap_or(raw)
                .to_string();
            let language = value
                .get("language")
                .and_then(|l| l.as_str())
                .unwrap_or("hi")
                .to_string();
            (query, language)
        }
        Err(_) => (raw.to_string(), "hi".to_string()),
    }
}

fn welcome_frame() -> String {
    serde_json::json!({
        "type": "welcome",
        "message": WELCOME_MESSAGE,
        "language": "hi",
    })
    .to_string()
}

#[derive(Clone)]
pub struct WsState {
    pub orchestrator: Arc<Orchestrator>,
    pub registry: Arc<ConnectionRegistry>,
}

pub fn ws_router(state: WsState) -> Router {
    Router::new()
        .route("/ws/:client_id", get(ws_upgrade))
        .with_state(state)
}

async fn ws_upgrade(
    State(state): State<WsState>,
    Path(client_id): Path<String>,
    upgrade: WebSocketUpgrade,
) -> impl IntoResponse {
    upgrade.on_upgrade(move |socket| handle_socket(state, client_id, socket))
}

async fn handle_socket(state: WsState, client_id: String, socket: WebSocket) {
    let (mut sink, mut stream) = socket.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<String>();

    state.registry.register(&client_id, tx.clone()).await;

    // Single writer: everything outbound (responses and broadcasts) flows
    // through the registry channel.
    let writer = tokio::spawn(async move {
        while let Some(frame) = rx.recv().await {
            if sink.send(Message::Text(frame)).await.is_err() {
                break;
            }
        }
    });

    if tx.send(welcome_frame()).is_err() {
        warn!(client_id, "failed to queue welcome frame");
    }

    while let Some(message) = stream.next().await {
        let message = match message {
            Ok(message) => message,
            Err(error) => {
                warn!(client_id, %error, "websocket receive error");
                break;
            }
        };

        match message {
            Message::Text(raw) => {
                let (query, language) = parse_frame(&raw);
                let response = state
                    .orchestrator
                    .process_query(&query, &client_id, &language)
                    .await;

                let frame = match serde_json::to_string(&response) {
                    Ok(frame) => frame,
                    Err(error) => {
                        warn!(client_id, %error, "failed to serialize response frame");
                        continue;
                    }
                };

                if tx.send(frame).is_err() {
                    break;
                }
            }
            Message::Close(_) => break,
            // Ping/pong is handled by axum; binary frames are ignored
            _ => {}
        }
    }

    state.registry.unregister(&client_id).await;
    writer.abort();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_json_frame() {
        let (query, language) = parse_frame(r#"{"message": "karz ki jankari", "language": "en"}"#);
        assert_eq!(query, "karz ki jankari");
        assert_eq!(language, "en");
    }

    #[test]
    fn test_parse_json_frame_defaults_language() {
        let (query, language) = parse_frame(r#"{"message": "fasal ki salah"}"#);
        assert_eq!(query, "fasal ki salah");
        assert_eq!(language, "hi");
    }

    #[test]
    fn test_parse_raw_text_frame() {
        let (query, language) = parse_frame("mandi bhav batao");
        assert_eq!(query, "mandi bhav batao");
        assert_eq!(language, "hi");
    }

    #[test]
    fn test_welcome_frame_shape() {
        let frame: serde_json::Value = serde_json::from_str(&welcome_frame()).unwrap();
        assert_eq!(frame["type"], "welcome");
        assert_eq!(frame["language"], "hi");
    }

    #[tokio::test]
    async fn test_registry_lifecycle() {
        let registry = ConnectionRegistry::new();
        let (tx, mut rx) = mpsc::unbounded_channel();

        registry.register("client-1", tx).await;
        assert_eq!(registry.active_count().await, 1);
        assert_eq!(registry.connected_clients().await, vec!["client-1"]);

        assert!(registry.send_to("client-1", "hello".to_string()).await);
        assert_eq!(rx.recv().await.unwrap(), "hello");
        assert!(!registry.send_to("unknown", "hello".to_string()).await);

        registry.unregister("client-1").await;
        assert_eq!(registry.active_count().await, 0);
    }

    #[tokio::test]
    async fn test_broadcast_prunes_stale_clients() {
        let registry = ConnectionRegistry::new();

        let (live_tx, mut live_rx) = mpsc::unbounded_channel();
        registry.register("live", live_tx).await;

        let (dead_tx, dead_rx) = mpsc::unbounded_channel();
        registry.register("dead", dead_tx).await;
        drop(dead_rx);

        registry.broadcast("update").await;
        assert_eq!(live_rx.recv().await.unwrap(), "update");
        assert_eq!(registry.active_count().await, 1);
        assert_eq!(registry.connected_clients().await, vec!["live"]);
    }
}
