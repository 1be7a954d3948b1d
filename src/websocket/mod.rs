//! WebSocket fan-out for real-time marketplace events
//!
//! Clients authenticate with the same bearer token as the REST API, then
//! subscribe to named channels. Subscriptions are authorized per channel;
//! events are published synchronously by the request that produced them
//! and delivered to every authorized subscriber.

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
};
use futures_util::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, RwLock};
use uuid::Uuid;

use crate::middleware::AuthenticatedUser;
use crate::state::AppState;

mod channel;

pub use channel::Channel;

/// A single event addressed to one broadcast channel
#[derive(Debug, Clone, Serialize)]
pub struct OutboundEvent {
    pub channel: String,
    pub event: String,
    pub payload: serde_json::Value,
}

impl OutboundEvent {
    pub fn new(channel: Channel, event: &str, payload: serde_json::Value) -> Self {
        Self {
            channel: channel.to_string(),
            event: event.to_string(),
            payload,
        }
    }
}

/// Shared broadcast hub
#[derive(Clone)]
pub struct WsState {
    tx: broadcast::Sender<OutboundEvent>,
}

impl WsState {
    pub fn new() -> Self {
        let (tx, _rx) = broadcast::channel(256);
        Self { tx }
    }

    /// Publish one event to every connected subscriber of its channel.
    /// Delivery is fire-and-forget; a hub with no subscribers is not an error.
    pub fn publish(&self, event: OutboundEvent) {
        tracing::debug!(channel = %event.channel, event = %event.event, "Publishing event");
        let _ = self.tx.send(event);
    }

    /// Publish a batch of events in order
    pub fn publish_all(&self, events: Vec<OutboundEvent>) {
        for event in events {
            self.publish(event);
        }
    }
}

impl Default for WsState {
    fn default() -> Self {
        Self::new()
    }
}

/// Client message types
#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
enum ClientMessage {
    Subscribe { channels: Vec<String> },
    Unsubscribe { channels: Vec<String> },
    Ping,
}

/// Server message types
#[derive(Debug, Serialize)]
#[serde(tag = "type")]
enum ServerMessage {
    Event {
        channel: String,
        event: String,
        payload: serde_json::Value,
    },
    Subscribed {
        channels: Vec<String>,
    },
    Denied {
        channels: Vec<String>,
    },
    Unsubscribed {
        channels: Vec<String>,
    },
    Pong,
}

/// WebSocket handler - upgrades the HTTP connection
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    user: AuthenticatedUser,
    State(app_state): State<AppState>,
) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, app_state, user))
}

/// Check whether a principal may subscribe to a channel.
/// Conversation membership is the only check that needs the store.
async fn authorize_subscription(
    app_state: &AppState,
    user: &AuthenticatedUser,
    channel: &Channel,
) -> bool {
    match channel {
        Channel::Conversation(conversation_id) => app_state
            .chat_service
            .is_participant(*conversation_id, user.user_id)
            .await
            .unwrap_or(false),
        other => other.allows(user.user_id, user.company_id, user.role),
    }
}

async fn handle_socket(socket: WebSocket, app_state: AppState, user: AuthenticatedUser) {
    let client_id = Uuid::new_v4();
    tracing::info!(client = %client_id, user = %user.user_id, "WebSocket client connected");

    let (mut sender, mut receiver) = socket.split();

    // Channels this connection is subscribed to, shared by both tasks
    let subscriptions: Arc<RwLock<HashSet<String>>> = Arc::new(RwLock::new(HashSet::new()));

    // Internal channel for sending confirmations from recv_task to sender
    let (internal_tx, mut internal_rx) = mpsc::channel::<ServerMessage>(32);

    let mut rx = app_state.ws_state.tx.subscribe();
    let subs_send = subscriptions.clone();

    // Forward broadcast events and internal messages to this client
    let mut send_task = tokio::spawn(async move {
        loop {
            tokio::select! {
                Ok(event) = rx.recv() => {
                    let subscribed = subs_send.read().await.contains(&event.channel);
                    if subscribed {
                        let msg = ServerMessage::Event {
                            channel: event.channel,
                            event: event.event,
                            payload: event.payload,
                        };
                        if let Ok(text) = serde_json::to_string(&msg) {
                            if sender.send(Message::Text(text)).await.is_err() {
                                break;
                            }
                        }
                    }
                }
                Some(msg) = internal_rx.recv() => {
                    if let Ok(text) = serde_json::to_string(&msg) {
                        if sender.send(Message::Text(text)).await.is_err() {
                            break;
                        }
                    }
                }
                else => break,
            }
        }
    });

    // Handle incoming messages from the client
    let subs_recv = subscriptions.clone();
    let user_recv = user.clone();
    let state_recv = app_state.clone();
    let mut recv_task = tokio::spawn(async move {
        while let Some(Ok(msg)) = receiver.next().await {
            if let Message::Text(text) = msg {
                if let Ok(client_msg) = serde_json::from_str::<ClientMessage>(&text) {
                    match client_msg {
                        ClientMessage::Subscribe { channels } => {
                            let mut granted = Vec::new();
                            let mut denied = Vec::new();

                            for name in channels {
                                let allowed = match Channel::parse(&name) {
                                    Some(channel) => {
                                        authorize_subscription(&state_recv, &user_recv, &channel)
                                            .await
                                    }
                                    None => false,
                                };
                                if allowed {
                                    granted.push(name);
                                } else {
                                    denied.push(name);
                                }
                            }

                            if !granted.is_empty() {
                                let mut subs = subs_recv.write().await;
                                subs.extend(granted.iter().cloned());
                            }
                            if !denied.is_empty() {
                                tracing::warn!(
                                    user = %user_recv.user_id,
                                    channels = ?denied,
                                    "Subscription denied"
                                );
                                let _ = internal_tx
                                    .send(ServerMessage::Denied { channels: denied })
                                    .await;
                            }
                            let _ = internal_tx
                                .send(ServerMessage::Subscribed { channels: granted })
                                .await;
                        }
                        ClientMessage::Unsubscribe { channels } => {
                            {
                                let mut subs = subs_recv.write().await;
                                for name in &channels {
                                    subs.remove(name);
                                }
                            }
                            let _ = internal_tx
                                .send(ServerMessage::Unsubscribed { channels })
                                .await;
                        }
                        ClientMessage::Ping => {
                            let _ = internal_tx.send(ServerMessage::Pong).await;
                        }
                    }
                }
            } else if let Message::Close(_) = msg {
                break;
            }
        }
    });

    tokio::select! {
        _ = (&mut send_task) => recv_task.abort(),
        _ = (&mut recv_task) => send_task.abort(),
    }

    tracing::info!(client = %client_id, "WebSocket client disconnected");
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_publish_preserves_order() {
        let ws = WsState::new();
        let mut rx = ws.tx.subscribe();

        let conversation = Channel::Conversation(Uuid::new_v4());
        ws.publish_all(vec![
            OutboundEvent::new(conversation, "message.sent", json!({ "seq": 1 })),
            OutboundEvent::new(conversation, "message.sent", json!({ "seq": 2 })),
        ]);

        let first = rx.recv().await.unwrap();
        let second = rx.recv().await.unwrap();
        assert_eq!(first.payload["seq"], 1);
        assert_eq!(second.payload["seq"], 2);
    }

    #[tokio::test]
    async fn test_publish_without_subscribers_is_not_an_error() {
        let ws = WsState::new();
        ws.publish(OutboundEvent::new(
            Channel::UserNotifications(Uuid::new_v4()),
            "rfq.created",
            json!({}),
        ));
    }
}
