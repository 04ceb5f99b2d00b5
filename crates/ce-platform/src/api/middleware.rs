//! API Middleware
//!
//! Authentication extractor and role guards for Axum.

use std::sync::Arc;

use axum::{
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts},
};

use crate::domain::User;
use crate::error::{ApiError, Result};
use crate::repository::UserRepository;
use crate::service::{extract_bearer_token, TokenService};

/// Shared auth state, attached to the router as an `Extension`.
#[derive(Clone)]
pub struct AuthState {
    pub token_service: Arc<TokenService>,
    pub user_repo: Arc<UserRepository>,
}

/// Extractor for authenticated requests.
///
/// Validates the bearer token and re-fetches the user row, so a deleted
/// account is rejected immediately even while its token is still live.
pub struct Authenticated(pub User);

#[axum::async_trait]
impl<S> FromRequestParts<S> for Authenticated
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self> {
        let auth_header = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| ApiError::InvalidToken {
                message: "Missing Authorization header".to_string(),
            })?;

        let token = extract_bearer_token(auth_header).ok_or_else(|| ApiError::InvalidToken {
            message: "Invalid Authorization header format".to_string(),
        })?;

        let auth_state = parts
            .extensions
            .get::<AuthState>()
            .ok_or_else(|| ApiError::internal("AuthState not found in request extensions"))?;

        let claims = auth_state.token_service.decode(token)?;

        let user = auth_state
            .user_repo
            .find_by_id(&claims.sub)
            .await?
            .ok_or(ApiError::UserNotFound)?;

        Ok(Authenticated(user))
    }
}

/// Organizer or admin.
pub fn require_event_manager(user: &User) -> Result<()> {
    if user.role.can_manage_events() {
        Ok(())
    } else {
        Err(ApiError::forbidden("Organizer or admin role required"))
    }
}

pub fn require_admin(user: &User) -> Result<()> {
    if user.role.is_admin() {
        Ok(())
    } else {
        Err(ApiError::forbidden("Admin role required"))
    }
}

/// Resource-level guard: the owner or any admin passes.
pub fn ensure_owner_or_admin(user: &User, owner_id: &str) -> Result<()> {
    if user.id == owner_id || user.role.is_admin() {
        Ok(())
    } else {
        Err(ApiError::forbidden("Not authorized to modify this resource"))
    }
}
