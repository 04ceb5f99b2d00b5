//! API Layer
//!
//! REST endpoints, the response envelope, and the auth extractor.

pub mod auth;
pub mod common;
pub mod events;
pub mod middleware;
pub mod openapi;
pub mod registrations;

pub use common::{ApiResponse, PaginatedResponse};
pub use middleware::{AuthState, Authenticated};
pub use openapi::ApiDoc;

pub use auth::{auth_router, AuthApiState};
pub use events::{events_router, EventsState};
pub use registrations::{registrations_router, RegistrationsState};
