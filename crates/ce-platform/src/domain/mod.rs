//! Domain Entities
//!
//! Core data model: users with roles, events with capacity, and the
//! registration rows binding them together.

pub mod event;
pub mod registration;
pub mod user;

pub use event::{Event, EventSummary};
pub use registration::{Registration, RegistrationDetail, RegistrationStatus};
pub use user::{Role, User};
