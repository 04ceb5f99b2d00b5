//! CampusEvents Platform
//!
//! Core platform providing:
//! - User accounts with role-based access (student, organizer, admin)
//! - Token issuance and verification
//! - Event listing, creation, and management with live attendance counts
//! - Registration workflow with capacity enforcement (pending/approved/rejected)
//! - REST APIs consumed by the SPA and the real-time hub

pub mod api;
pub mod domain;
pub mod error;
pub mod repository;
pub mod service;

pub use domain::*;
pub use error::ApiError;
