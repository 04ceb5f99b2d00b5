//! WebSocket endpoint for real-time updates.
//!
//! # Protocol
//!
//! Connect with the same bearer token as the REST API, either as a query
//! parameter or a header:
//!
//! ```text
//! ws://localhost:3000/ws?token=<token>
//! ws://localhost:3000/ws          (with Authorization: Bearer <token>)
//! ```
//!
//! Organizer and admin connections are added to the `organizers` room at
//! handshake and receive `registration_notification` pushes.
//!
//! **Server to client:** `attendee_update`, `new_event`,
//! `registration_notification`, plus re-broadcast refresh hints.
//!
//! **Client to server:** `join_event` / `leave_event` manage room membership
//! for a single event; `registration_update`, `event_created`, and
//! `new_registration` are advisory hints the server re-broadcasts without
//! treating them as state changes.
//!
//! Keep-alive pings every 30 seconds; idle connections are dropped after
//! 5 minutes without traffic.

use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
};

use axum::{
    extract::{
        ws::{Message, WebSocket},
        Query, State, WebSocketUpgrade,
    },
    http::{header::AUTHORIZATION, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use futures::{stream::StreamExt, SinkExt};
use serde::Deserialize;
use tokio::sync::mpsc::unbounded_channel;
use tokio::time::{interval, Duration};
use tracing::{debug, info, warn};

use ce_common::{event_room, Notifier, RealtimeEvent, ORGANIZERS_ROOM};
use ce_platform::service::{extract_bearer_token, Claims, TokenService};

use crate::hub::Hub;

static ACTIVE_CONNECTIONS: AtomicUsize = AtomicUsize::new(0);

const MAX_CONNECTIONS: usize = 1000;
const PING_INTERVAL_SECS: u64 = 30;
const IDLE_TIMEOUT_SECS: u64 = 300;

#[derive(Clone)]
pub struct RealtimeState {
    pub hub: Arc<Hub>,
    pub token_service: Arc<TokenService>,
}

#[derive(Debug, Deserialize)]
pub struct WsQuery {
    pub token: Option<String>,
}

/// Client-originated messages.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ClientMessage {
    #[serde(rename_all = "camelCase")]
    JoinEvent { event_id: String },
    #[serde(rename_all = "camelCase")]
    LeaveEvent { event_id: String },
    #[serde(rename_all = "camelCase")]
    RegistrationUpdate { event_id: String },
    #[serde(rename_all = "camelCase")]
    EventCreated {
        #[serde(default)]
        event_id: Option<String>,
    },
    #[serde(rename_all = "camelCase")]
    NewRegistration { event_id: String },
}

fn token_from_request(query: &WsQuery, headers: &HeaderMap) -> Option<String> {
    if let Some(token) = query.token.as_deref().filter(|t| !t.is_empty()) {
        return Some(token.to_string());
    }
    headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(extract_bearer_token)
        .map(str::to_string)
}

/// WebSocket handshake: authenticate, enforce the connection cap, upgrade.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Query(query): Query<WsQuery>,
    headers: HeaderMap,
    State(state): State<RealtimeState>,
) -> Response {
    let current = ACTIVE_CONNECTIONS.load(Ordering::Relaxed);
    if current >= MAX_CONNECTIONS {
        warn!(current_connections = current, "connection limit exceeded");
        return (
            StatusCode::SERVICE_UNAVAILABLE,
            "Too many concurrent connections. Please try again later.",
        )
            .into_response();
    }

    let token = match token_from_request(&query, &headers) {
        Some(t) => t,
        None => return (StatusCode::UNAUTHORIZED, "Missing token").into_response(),
    };

    let claims = match state.token_service.decode(&token) {
        Ok(claims) => claims,
        Err(e) => {
            debug!(error = %e, "websocket handshake rejected");
            return (StatusCode::UNAUTHORIZED, "Invalid token").into_response();
        }
    };

    ws.on_upgrade(move |socket| handle_socket(socket, claims, state))
}

async fn handle_socket(socket: WebSocket, claims: Claims, state: RealtimeState) {
    let conn_id = uuid::Uuid::new_v4().to_string();
    let count = ACTIVE_CONNECTIONS.fetch_add(1, Ordering::Relaxed) + 1;
    info!(
        conn_id = %conn_id,
        user_id = %claims.sub,
        total_connections = count,
        "websocket connected"
    );

    let (outbound_tx, mut outbound_rx) = unbounded_channel::<RealtimeEvent>();
    state.hub.register(&conn_id, outbound_tx);

    // Organizers and admins get registration notifications without an
    // explicit join.
    if claims.role == "organizer" || claims.role == "admin" {
        state.hub.join(ORGANIZERS_ROOM, &conn_id);
    }

    let (sender, mut receiver) = socket.split();
    let sender = Arc::new(tokio::sync::Mutex::new(sender));

    // Forward hub events to the client.
    let forward_sender = sender.clone();
    let mut forward_task = tokio::spawn(async move {
        while let Some(event) = outbound_rx.recv().await {
            let json = match serde_json::to_string(&event) {
                Ok(json) => json,
                Err(e) => {
                    warn!(error = %e, "dropping unserializable event");
                    continue;
                }
            };
            let mut guard = forward_sender.lock().await;
            if guard.send(Message::Text(json)).await.is_err() {
                break;
            }
        }
        debug!("forward task terminated");
    });

    // Keep-alive pings.
    let ping_sender = sender.clone();
    let mut ping_interval = interval(Duration::from_secs(PING_INTERVAL_SECS));
    let mut ping_task = tokio::spawn(async move {
        loop {
            ping_interval.tick().await;
            let mut guard = ping_sender.lock().await;
            if guard.send(Message::Ping(Vec::new())).await.is_err() {
                break;
            }
        }
        debug!("ping task terminated");
    });

    // Inbound messages and the idle timeout.
    let recv_hub = state.hub.clone();
    let recv_conn_id = conn_id.clone();
    let mut recv_task = tokio::spawn(async move {
        let timeout = tokio::time::sleep(Duration::from_secs(IDLE_TIMEOUT_SECS));
        tokio::pin!(timeout);

        loop {
            tokio::select! {
                next = receiver.next() => {
                    let msg = match next {
                        Some(Ok(msg)) => msg,
                        _ => break,
                    };
                    timeout.as_mut().reset(
                        tokio::time::Instant::now() + Duration::from_secs(IDLE_TIMEOUT_SECS),
                    );
                    match msg {
                        Message::Text(text) => {
                            handle_client_message(&recv_hub, &recv_conn_id, &text);
                        }
                        Message::Close(_) => {
                            info!(conn_id = %recv_conn_id, "client requested close");
                            break;
                        }
                        Message::Pong(_) | Message::Ping(_) | Message::Binary(_) => {}
                    }
                }
                () = &mut timeout => {
                    warn!(conn_id = %recv_conn_id, "websocket idle timeout");
                    break;
                }
            }
        }
        debug!("receive task terminated");
    });

    tokio::select! {
        _ = (&mut forward_task) => {
            ping_task.abort();
            recv_task.abort();
        },
        _ = (&mut ping_task) => {
            forward_task.abort();
            recv_task.abort();
        },
        _ = (&mut recv_task) => {
            forward_task.abort();
            ping_task.abort();
        },
    }

    state.hub.unregister(&conn_id);
    let count = ACTIVE_CONNECTIONS.fetch_sub(1, Ordering::Relaxed) - 1;
    info!(
        conn_id = %conn_id,
        user_id = %claims.sub,
        total_connections = count,
        "websocket disconnected"
    );
}

/// Room management plus advisory refresh hints. Hints are re-broadcast
/// as-is; they never mutate store state.
fn handle_client_message(hub: &Arc<Hub>, conn_id: &str, text: &str) {
    let message: ClientMessage = match serde_json::from_str(text) {
        Ok(message) => message,
        Err(e) => {
            debug!(conn_id = %conn_id, error = %e, "ignoring malformed client message");
            return;
        }
    };

    match message {
        ClientMessage::JoinEvent { event_id } => {
            hub.join(&event_room(&event_id), conn_id);
        }
        ClientMessage::LeaveEvent { event_id } => {
            hub.leave(&event_room(&event_id), conn_id);
        }
        ClientMessage::RegistrationUpdate { event_id } => {
            hub.publish(
                &event_room(&event_id),
                RealtimeEvent::RegistrationUpdate { event_id },
            );
        }
        ClientMessage::EventCreated { event_id } => {
            hub.broadcast(RealtimeEvent::EventCreated { event_id });
        }
        ClientMessage::NewRegistration { event_id } => {
            hub.publish(
                ORGANIZERS_ROOM,
                RealtimeEvent::NewRegistration { event_id },
            );
        }
    }
}

/// Current connection count, for the health endpoint.
pub fn active_connection_count() -> usize {
    ACTIVE_CONNECTIONS.load(Ordering::Relaxed)
}
