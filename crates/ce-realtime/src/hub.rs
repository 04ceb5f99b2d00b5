//! Connection Hub
//!
//! Tracks live WebSocket connections and their room memberships, and fans
//! events out to them. Sends are fire-and-forget over unbounded channels; a
//! closed receiver just means the connection is being torn down, so failures
//! are dropped rather than propagated.

use std::collections::HashSet;

use dashmap::DashMap;
use tokio::sync::mpsc::UnboundedSender;

use ce_common::{Notifier, RealtimeEvent};

#[derive(Default)]
pub struct Hub {
    /// Connection id to outbound channel.
    connections: DashMap<String, UnboundedSender<RealtimeEvent>>,
    /// Room name to member connection ids.
    rooms: DashMap<String, HashSet<String>>,
}

impl Hub {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, conn_id: &str, sender: UnboundedSender<RealtimeEvent>) {
        self.connections.insert(conn_id.to_string(), sender);
        tracing::debug!(conn_id = %conn_id, total = self.connections.len(), "connection registered");
    }

    /// Drop a connection and remove it from every room.
    pub fn unregister(&self, conn_id: &str) {
        self.connections.remove(conn_id);
        self.rooms.retain(|_, members| {
            members.remove(conn_id);
            !members.is_empty()
        });
        tracing::debug!(conn_id = %conn_id, total = self.connections.len(), "connection unregistered");
    }

    pub fn join(&self, room: &str, conn_id: &str) {
        self.rooms
            .entry(room.to_string())
            .or_default()
            .insert(conn_id.to_string());
        tracing::debug!(conn_id = %conn_id, room = %room, "joined room");
    }

    pub fn leave(&self, room: &str, conn_id: &str) {
        if let Some(mut members) = self.rooms.get_mut(room) {
            members.remove(conn_id);
        }
        tracing::debug!(conn_id = %conn_id, room = %room, "left room");
    }

    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    pub fn room_size(&self, room: &str) -> usize {
        self.rooms.get(room).map(|m| m.len()).unwrap_or(0)
    }

    fn send_to(&self, conn_id: &str, event: &RealtimeEvent) {
        if let Some(sender) = self.connections.get(conn_id) {
            let _ = sender.send(event.clone());
        }
    }
}

impl Notifier for Hub {
    fn publish(&self, room: &str, event: RealtimeEvent) {
        let members: Vec<String> = match self.rooms.get(room) {
            Some(members) => members.iter().cloned().collect(),
            None => return,
        };
        tracing::debug!(room = %room, recipients = members.len(), "publishing event");
        for conn_id in members {
            self.send_to(&conn_id, &event);
        }
    }

    fn broadcast(&self, event: RealtimeEvent) {
        tracing::debug!(recipients = self.connections.len(), "broadcasting event");
        for entry in self.connections.iter() {
            let _ = entry.value().send(event.clone());
        }
    }
}
