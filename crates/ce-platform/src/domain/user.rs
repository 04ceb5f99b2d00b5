//! User Entity and Roles

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// User role. Admin implicitly has all organizer and student permissions.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, ToSchema,
)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Student,
    Organizer,
    Admin,
}

impl Default for Role {
    fn default() -> Self {
        Self::Student
    }
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Student => "student",
            Self::Organizer => "organizer",
            Self::Admin => "admin",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "student" => Some(Self::Student),
            "organizer" => Some(Self::Organizer),
            "admin" => Some(Self::Admin),
            _ => None,
        }
    }

    pub fn is_admin(&self) -> bool {
        matches!(self, Self::Admin)
    }

    /// Organizer-or-above: may create and manage events.
    pub fn can_manage_events(&self) -> bool {
        matches!(self, Self::Organizer | Self::Admin)
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A user account. The password hash never leaves the platform crate;
/// API responses use DTOs built from the public fields.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,

    /// Globally unique handle.
    pub username: String,

    /// Globally unique email address.
    pub email: String,

    /// Argon2id hash, PHC string format.
    #[serde(skip_serializing)]
    pub password_hash: String,

    pub role: Role,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    pub fn new(
        username: impl Into<String>,
        email: impl Into<String>,
        password_hash: impl Into<String>,
        role: Role,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            username: username.into(),
            email: email.into(),
            password_hash: password_hash.into(),
            role,
            created_at: now,
            updated_at: now,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_parse_round_trip() {
        for role in [Role::Student, Role::Organizer, Role::Admin] {
            assert_eq!(Role::parse(role.as_str()), Some(role));
        }
        assert_eq!(Role::parse("superuser"), None);
    }

    #[test]
    fn test_role_defaults_to_student() {
        assert_eq!(Role::default(), Role::Student);
    }

    #[test]
    fn test_role_ordering() {
        assert!(Role::Student < Role::Organizer);
        assert!(Role::Organizer < Role::Admin);
    }

    #[test]
    fn test_event_management_capability() {
        assert!(!Role::Student.can_manage_events());
        assert!(Role::Organizer.can_manage_events());
        assert!(Role::Admin.can_manage_events());
        assert!(Role::Admin.is_admin());
        assert!(!Role::Organizer.is_admin());
    }

    #[test]
    fn test_password_hash_not_serialized() {
        let user = User::new("alice", "alice@campus.edu", "$argon2id$fake", Role::Student);
        let json = serde_json::to_string(&user).unwrap();
        assert!(!json.contains("argon2id"));
        assert!(json.contains("alice@campus.edu"));
    }
}
