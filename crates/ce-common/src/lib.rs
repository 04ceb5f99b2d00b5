//! CampusEvents shared types
//!
//! Wire types for the real-time notification channel, shared between the
//! REST platform (which publishes) and the WebSocket hub (which delivers).

use serde::{Deserialize, Serialize};

/// Broadcast room joined by every organizer and admin connection at handshake.
pub const ORGANIZERS_ROOM: &str = "organizers";

/// Room name for clients watching a single event's attendance.
pub fn event_room(event_id: &str) -> String {
    format!("event:{}", event_id)
}

/// A server-pushed real-time notification.
///
/// `AttendeeUpdate`, `NewEvent` and `RegistrationNotification` carry state the
/// server derived from the store. The remaining variants mirror
/// client-originated messages that are re-broadcast verbatim as refresh
/// hints; receivers must re-query the REST API rather than trust their
/// payloads.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RealtimeEvent {
    /// Approved-attendee count changed for an event.
    #[serde(rename_all = "camelCase")]
    AttendeeUpdate {
        event_id: String,
        attendee_count: i64,
        status: String,
    },
    /// A new event was created.
    NewEvent { event: serde_json::Value },
    /// A student registered for an event (sent to the organizers room).
    #[serde(rename_all = "camelCase")]
    RegistrationNotification { event_id: String, user_id: String },
    /// Client-originated refresh hint: a registration changed.
    #[serde(rename_all = "camelCase")]
    RegistrationUpdate { event_id: String },
    /// Client-originated refresh hint: an event was created.
    #[serde(rename_all = "camelCase")]
    EventCreated { event_id: Option<String> },
    /// Client-originated refresh hint: a new registration arrived.
    #[serde(rename_all = "camelCase")]
    NewRegistration { event_id: String },
}

/// Fan-out capability used by mutating REST handlers.
///
/// Implemented by the WebSocket hub; handlers publish without knowing about
/// connections or rooms. Sends are fire-and-forget.
pub trait Notifier: Send + Sync {
    /// Deliver an event to every connection currently in `room`.
    fn publish(&self, room: &str, event: RealtimeEvent);

    /// Deliver an event to every connection.
    fn broadcast(&self, event: RealtimeEvent);
}

/// Notifier that drops everything; used when no real-time layer is wired in
/// (tests, one-off tools).
#[derive(Debug, Default, Clone, Copy)]
pub struct NullNotifier;

impl Notifier for NullNotifier {
    fn publish(&self, _room: &str, _event: RealtimeEvent) {}
    fn broadcast(&self, _event: RealtimeEvent) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_room_naming() {
        assert_eq!(event_room("abc123"), "event:abc123");
    }

    #[test]
    fn test_attendee_update_serialization() {
        let event = RealtimeEvent::AttendeeUpdate {
            event_id: "e1".to_string(),
            attendee_count: 7,
            status: "approved".to_string(),
        };

        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"type\":\"attendee_update\""));
        assert!(json.contains("\"eventId\":\"e1\""));
        assert!(json.contains("\"attendeeCount\":7"));
    }

    #[test]
    fn test_registration_notification_round_trip() {
        let event = RealtimeEvent::RegistrationNotification {
            event_id: "e1".to_string(),
            user_id: "u1".to_string(),
        };

        let json = serde_json::to_string(&event).unwrap();
        let parsed: RealtimeEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, event);
    }
}
