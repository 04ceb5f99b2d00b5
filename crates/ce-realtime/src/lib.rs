//! CampusEvents Realtime
//!
//! WebSocket layer: a connection hub with room-scoped fan-out and the
//! socket handler that authenticates clients and relays events.

pub mod hub;
pub mod socket;

pub use hub::Hub;
pub use socket::{ws_handler, RealtimeState};
