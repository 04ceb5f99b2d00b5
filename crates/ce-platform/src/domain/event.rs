//! Event Entity
//!
//! Campus events with a fixed capacity and a derived attendance count.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::error::{ApiError, Result};

pub const TITLE_MIN: usize = 3;
pub const TITLE_MAX: usize = 200;
pub const CAPACITY_MIN: i64 = 1;
pub const CAPACITY_MAX: i64 = 10_000;
pub const CAPACITY_DEFAULT: i64 = 100;

/// An event row as stored. Attendance count and fullness are derived at read
/// time, never persisted.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    pub id: String,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub date: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    pub capacity: i64,

    /// Owning creator (an organizer or admin user id).
    pub created_by: String,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Event {
    pub fn new(
        title: impl Into<String>,
        date: DateTime<Utc>,
        capacity: i64,
        created_by: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            title: title.into(),
            description: None,
            date,
            location: None,
            capacity,
            created_by: created_by.into(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }

    pub fn is_past(&self) -> bool {
        self.date < Utc::now()
    }

    /// Validate the mutable fields, collecting every violation so the caller
    /// gets per-field messages in one response.
    pub fn validate_fields(title: &str, date: &DateTime<Utc>, capacity: i64) -> Result<()> {
        let mut errors = Vec::new();

        let title_len = title.trim().chars().count();
        if title_len < TITLE_MIN || title_len > TITLE_MAX {
            errors.push(format!(
                "title must be between {} and {} characters",
                TITLE_MIN, TITLE_MAX
            ));
        }

        if *date <= Utc::now() {
            errors.push("date must be in the future".to_string());
        }

        if !(CAPACITY_MIN..=CAPACITY_MAX).contains(&capacity) {
            errors.push(format!(
                "capacity must be between {} and {}",
                CAPACITY_MIN, CAPACITY_MAX
            ));
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ApiError::validation(errors))
        }
    }
}

/// Read model for event listings: the stored row annotated with the creator's
/// username, the live approved-attendee count, and the fullness flag.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct EventSummary {
    pub id: String,
    pub title: String,
    pub description: Option<String>,
    pub date: DateTime<Utc>,
    pub location: Option<String>,
    pub capacity: i64,
    pub created_by: String,
    pub creator_username: String,
    pub attendee_count: i64,
    pub is_full: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
