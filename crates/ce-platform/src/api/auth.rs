//! Auth API Endpoints
//!
//! - POST /register - Create an account
//! - POST /login - Password-based login
//! - GET /me - Validate the current token and return the account
//! - PUT /profile - Update username/email
//! - PUT /change-password - Rotate the password

use std::sync::Arc;

use axum::{
    extract::{Extension, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post, put},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::api::common::ApiResponse;
use crate::api::middleware::Authenticated;
use crate::domain::{Role, User};
use crate::error::{ApiError, Result};
use crate::repository::UserRepository;
use crate::service::{PasswordService, TokenService};

pub const USERNAME_MIN: usize = 3;
pub const USERNAME_MAX: usize = 30;
pub const PASSWORD_MIN: usize = 6;

/// Registration request
#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    pub password: String,
    /// Defaults to student.
    #[serde(default)]
    pub role: Role,
}

/// Login request
#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Profile update request
#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProfileRequest {
    pub username: Option<String>,
    pub email: Option<String>,
}

/// Password change request
#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ChangePasswordRequest {
    pub current_password: String,
    pub new_password: String,
}

/// Public view of an account
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UserResponse {
    pub id: String,
    pub username: String,
    pub email: String,
    pub role: Role,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            username: user.username,
            email: user.email,
            role: user.role,
            created_at: user.created_at,
        }
    }
}

/// Token plus account, returned by register and login.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AuthResponse {
    pub token: String,
    pub user: UserResponse,
}

/// Auth endpoint state
#[derive(Clone)]
pub struct AuthApiState {
    pub user_repo: Arc<UserRepository>,
    pub token_service: Arc<TokenService>,
    pub password_service: Arc<PasswordService>,
}

fn validate_credentials(username: &str, email: &str, password: &str) -> Result<()> {
    let mut errors = Vec::new();

    let name_len = username.chars().count();
    if name_len < USERNAME_MIN || name_len > USERNAME_MAX {
        errors.push(format!(
            "username must be between {} and {} characters",
            USERNAME_MIN, USERNAME_MAX
        ));
    }
    if !email.contains('@') || email.starts_with('@') || email.ends_with('@') {
        errors.push("email must be a valid address".to_string());
    }
    if password.chars().count() < PASSWORD_MIN {
        errors.push(format!("password must be at least {} characters", PASSWORD_MIN));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(ApiError::Validation { errors })
    }
}

/// Register a new account
#[utoipa::path(
    post,
    path = "/register",
    tag = "auth",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "Account created", body = AuthResponse),
        (status = 400, description = "Validation failed"),
        (status = 409, description = "Username or email already in use")
    )
)]
pub async fn register(
    State(state): State<AuthApiState>,
    Json(req): Json<RegisterRequest>,
) -> Result<impl IntoResponse> {
    validate_credentials(&req.username, &req.email, &req.password)?;

    let hash = state.password_service.hash(&req.password)?;
    let user = User::new(&req.username, &req.email, &hash, req.role);
    state.user_repo.insert(&user).await?;

    let token = state.token_service.issue(&user)?;
    tracing::info!(user_id = %user.id, username = %user.username, "account registered");

    let body = ApiResponse::with_message(
        "Account created",
        AuthResponse {
            token,
            user: user.into(),
        },
    );
    Ok((StatusCode::CREATED, Json(body)))
}

/// Login with email and password
///
/// The response never distinguishes an unknown email from a wrong password.
#[utoipa::path(
    post,
    path = "/login",
    tag = "auth",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Login successful", body = AuthResponse),
        (status = 401, description = "Invalid credentials")
    )
)]
pub async fn login(
    State(state): State<AuthApiState>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<ApiResponse<AuthResponse>>> {
    let user = state
        .user_repo
        .find_by_email(&req.email)
        .await?
        .ok_or(ApiError::InvalidCredentials)?;

    if !state.password_service.verify(&req.password, &user.password_hash)? {
        return Err(ApiError::InvalidCredentials);
    }

    let token = state.token_service.issue(&user)?;
    tracing::info!(user_id = %user.id, "login");

    Ok(Json(ApiResponse::data(AuthResponse {
        token,
        user: user.into(),
    })))
}

/// Validate the current token and return the account
#[utoipa::path(
    get,
    path = "/me",
    tag = "auth",
    responses(
        (status = 200, description = "Token is valid", body = UserResponse),
        (status = 401, description = "Missing, invalid, or expired token")
    ),
    security(("bearer_auth" = []))
)]
pub async fn verify(
    Authenticated(user): Authenticated,
) -> Json<ApiResponse<UserResponse>> {
    Json(ApiResponse::data(user.into()))
}

/// Update username and/or email
#[utoipa::path(
    put,
    path = "/profile",
    tag = "auth",
    request_body = UpdateProfileRequest,
    responses(
        (status = 200, description = "Profile updated", body = UserResponse),
        (status = 400, description = "Validation failed"),
        (status = 409, description = "Username or email already in use")
    ),
    security(("bearer_auth" = []))
)]
pub async fn update_profile(
    State(state): State<AuthApiState>,
    Authenticated(user): Authenticated,
    Json(req): Json<UpdateProfileRequest>,
) -> Result<Json<ApiResponse<UserResponse>>> {
    let username = req.username.unwrap_or_else(|| user.username.clone());
    let email = req.email.unwrap_or_else(|| user.email.clone());

    let mut errors = Vec::new();
    let name_len = username.chars().count();
    if name_len < USERNAME_MIN || name_len > USERNAME_MAX {
        errors.push(format!(
            "username must be between {} and {} characters",
            USERNAME_MIN, USERNAME_MAX
        ));
    }
    if !email.contains('@') || email.starts_with('@') || email.ends_with('@') {
        errors.push("email must be a valid address".to_string());
    }
    if !errors.is_empty() {
        return Err(ApiError::Validation { errors });
    }

    state.user_repo.update_profile(&user.id, &username, &email).await?;

    let updated = state
        .user_repo
        .find_by_id(&user.id)
        .await?
        .ok_or(ApiError::UserNotFound)?;

    Ok(Json(ApiResponse::with_message("Profile updated", updated.into())))
}

/// Rotate the password
#[utoipa::path(
    put,
    path = "/change-password",
    tag = "auth",
    request_body = ChangePasswordRequest,
    responses(
        (status = 200, description = "Password changed"),
        (status = 400, description = "New password too short"),
        (status = 401, description = "Current password is wrong")
    ),
    security(("bearer_auth" = []))
)]
pub async fn change_password(
    State(state): State<AuthApiState>,
    Authenticated(user): Authenticated,
    Json(req): Json<ChangePasswordRequest>,
) -> Result<Json<ApiResponse<()>>> {
    if req.new_password.chars().count() < PASSWORD_MIN {
        return Err(ApiError::invalid_field(format!(
            "new password must be at least {} characters",
            PASSWORD_MIN
        )));
    }

    if !state
        .password_service
        .verify(&req.current_password, &user.password_hash)?
    {
        return Err(ApiError::InvalidCredentials);
    }

    let hash = state.password_service.hash(&req.new_password)?;
    state.user_repo.update_password(&user.id, &hash).await?;
    tracing::info!(user_id = %user.id, "password changed");

    Ok(Json(ApiResponse::message("Password changed")))
}

pub fn auth_router(state: AuthApiState, auth_state: crate::api::middleware::AuthState) -> Router {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/me", get(verify))
        .route("/profile", put(update_profile))
        .route("/change-password", put(change_password))
        .layer(Extension(auth_state))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_credentials_collects_all_errors() {
        let err = validate_credentials("ab", "not-an-email", "short").unwrap_err();
        match err {
            ApiError::Validation { errors } => assert_eq!(errors.len(), 3),
            other => panic!("expected validation error, got {:?}", other),
        }
    }

    #[test]
    fn test_validate_credentials_accepts_good_input() {
        assert!(validate_credentials("alice", "alice@campus.edu", "hunter22").is_ok());
    }

    #[test]
    fn test_user_response_has_no_hash() {
        let user = User::new("alice", "alice@campus.edu", "secret-hash", Role::Student);
        let resp: UserResponse = user.into();
        let json = serde_json::to_string(&resp).unwrap();
        assert!(!json.contains("secret-hash"));
        assert!(json.contains("\"username\":\"alice\""));
    }
}
