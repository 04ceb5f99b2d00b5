//! Registration Entity
//!
//! One row per (event, user) pair. Status starts at `pending` and stays
//! freely reversible between `approved` and `rejected` until the row is
//! deleted; there is no terminal state.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum RegistrationStatus {
    Pending,
    Approved,
    Rejected,
}

impl RegistrationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "approved" => Some(Self::Approved),
            "rejected" => Some(Self::Rejected),
            _ => None,
        }
    }
}

impl std::fmt::Display for RegistrationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Registration {
    pub id: String,
    pub event_id: String,
    pub user_id: String,
    pub status: RegistrationStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Registration {
    /// New registrations always start pending.
    pub fn new(event_id: impl Into<String>, user_id: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            event_id: event_id.into(),
            user_id: user_id.into(),
            status: RegistrationStatus::Pending,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Read model joining a registration with its student and event summary
/// fields, used by the listing endpoints.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RegistrationDetail {
    pub id: String,
    pub event_id: String,
    pub user_id: String,
    pub status: RegistrationStatus,
    pub username: String,
    pub event_title: String,
    pub event_date: DateTime<Utc>,
    pub event_location: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_parse_round_trip() {
        for status in [
            RegistrationStatus::Pending,
            RegistrationStatus::Approved,
            RegistrationStatus::Rejected,
        ] {
            assert_eq!(RegistrationStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(RegistrationStatus::parse("waitlisted"), None);
    }

    #[test]
    fn test_new_registration_starts_pending() {
        let reg = Registration::new("e1", "u1");
        assert_eq!(reg.status, RegistrationStatus::Pending);
        assert_eq!(reg.event_id, "e1");
        assert_eq!(reg.user_id, "u1");
    }
}
