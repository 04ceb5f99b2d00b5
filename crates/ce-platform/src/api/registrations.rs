//! Registrations API Endpoints
//!
//! - GET / - Caller's registrations
//! - POST / - Register for an event
//! - DELETE /:id - Cancel own registration
//! - GET /manage - Registrations across owned events
//! - PUT /:id/status - Approve or reject one registration
//! - PUT /bulk-status - Approve or reject a batch atomically

use std::collections::BTreeSet;
use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, put},
    Json, Router,
};
use serde::Deserialize;
use utoipa::{IntoParams, ToSchema};

use ce_common::{event_room, Notifier, RealtimeEvent, ORGANIZERS_ROOM};

use crate::api::common::{ApiResponse, PaginatedResponse, MAX_LIMIT};
use crate::api::middleware::{require_event_manager, Authenticated};
use crate::domain::{Registration, RegistrationDetail, RegistrationStatus};
use crate::error::{ApiError, Result};
use crate::repository::{EventRepository, RegistrationFilter, RegistrationRepository};

/// Registration request
#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RegistrationRequest {
    pub event_id: String,
}

/// Status change request
#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct StatusRequest {
    pub status: String,
}

/// Bulk status change request
#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct BulkStatusRequest {
    pub ids: Vec<String>,
    pub status: String,
}

/// Listing query parameters
#[derive(Debug, Default, Deserialize, ToSchema, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct RegistrationListQuery {
    #[serde(default)]
    pub page: Option<u32>,
    #[serde(default)]
    pub limit: Option<u32>,
    #[serde(default)]
    pub event_id: Option<String>,
    /// pending, approved, or rejected.
    #[serde(default)]
    pub status: Option<String>,
}

impl RegistrationListQuery {
    fn page(&self) -> u32 {
        self.page.unwrap_or(1).max(1)
    }

    fn limit(&self) -> u32 {
        self.limit.unwrap_or(20).clamp(1, MAX_LIMIT)
    }

    fn filter(&self) -> Result<RegistrationFilter> {
        let status = match self.status.as_deref() {
            None => None,
            Some(s) => Some(
                RegistrationStatus::parse(s)
                    .ok_or_else(|| ApiError::invalid_field(format!("unknown status: {}", s)))?,
            ),
        };
        Ok(RegistrationFilter {
            event_id: self.event_id.clone(),
            status,
            limit: self.limit() as i64,
            offset: (self.page() as i64 - 1) * self.limit() as i64,
        })
    }
}

/// Any of the three known statuses is a valid target; setting back to
/// pending re-queues a decision. Anything else is rejected up front.
fn parse_decision(status: &str) -> Result<RegistrationStatus> {
    RegistrationStatus::parse(status).ok_or_else(|| {
        ApiError::invalid_field("status must be pending, approved, or rejected")
    })
}

/// Registrations endpoint state
#[derive(Clone)]
pub struct RegistrationsState {
    pub registration_repo: Arc<RegistrationRepository>,
    pub event_repo: Arc<EventRepository>,
    pub notifier: Arc<dyn Notifier>,
}

impl RegistrationsState {
    /// Push the current approved count for an event to its room.
    async fn publish_attendee_update(&self, event_id: &str, status: RegistrationStatus) {
        match self.event_repo.approved_count(event_id).await {
            Ok(count) => self.notifier.publish(
                &event_room(event_id),
                RealtimeEvent::AttendeeUpdate {
                    event_id: event_id.to_string(),
                    attendee_count: count,
                    status: status.as_str().to_string(),
                },
            ),
            Err(e) => {
                tracing::warn!(event_id = %event_id, error = %e, "attendee update skipped")
            }
        }
    }
}

/// Caller's registrations
#[utoipa::path(
    get,
    path = "",
    tag = "registrations",
    params(RegistrationListQuery),
    responses(
        (status = 200, description = "Paginated registrations", body = PaginatedResponse<RegistrationDetail>)
    ),
    security(("bearer_auth" = []))
)]
pub async fn list_my_registrations(
    State(state): State<RegistrationsState>,
    Authenticated(user): Authenticated,
    Query(query): Query<RegistrationListQuery>,
) -> Result<Json<ApiResponse<PaginatedResponse<RegistrationDetail>>>> {
    let filter = query.filter()?;
    let (items, total) = state
        .registration_repo
        .list_for_user(&user.id, &filter)
        .await?;
    Ok(Json(ApiResponse::data(PaginatedResponse::new(
        items,
        query.page(),
        query.limit(),
        total,
    ))))
}

/// Register for an event
///
/// Always lands as pending, even when the event is already full. Capacity
/// binds at approval time, not here.
#[utoipa::path(
    post,
    path = "",
    tag = "registrations",
    request_body = RegistrationRequest,
    responses(
        (status = 201, description = "Registered", body = Registration),
        (status = 400, description = "Event is in the past"),
        (status = 404, description = "Event not found"),
        (status = 409, description = "Already registered")
    ),
    security(("bearer_auth" = []))
)]
pub async fn register(
    State(state): State<RegistrationsState>,
    Authenticated(user): Authenticated,
    Json(req): Json<RegistrationRequest>,
) -> Result<impl IntoResponse> {
    let event = state
        .event_repo
        .find_by_id(&req.event_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Event", &req.event_id))?;

    if event.is_past() {
        return Err(ApiError::invalid_state(
            "Cannot register for a past event",
        ));
    }

    let registration = state.registration_repo.register(&event, &user.id).await?;
    tracing::info!(
        registration_id = %registration.id,
        event_id = %event.id,
        user_id = %user.id,
        "registration created"
    );

    state.notifier.publish(
        ORGANIZERS_ROOM,
        RealtimeEvent::RegistrationNotification {
            event_id: event.id.clone(),
            user_id: user.id.clone(),
        },
    );

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::with_message("Registered", registration)),
    ))
}

/// Cancel own registration
///
/// A registration owned by someone else reads as absent, so both cases
/// return 404.
#[utoipa::path(
    delete,
    path = "/{id}",
    tag = "registrations",
    params(("id" = String, Path, description = "Registration id")),
    responses(
        (status = 200, description = "Cancelled"),
        (status = 404, description = "Registration not found")
    ),
    security(("bearer_auth" = []))
)]
pub async fn cancel(
    State(state): State<RegistrationsState>,
    Authenticated(user): Authenticated,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<()>>> {
    let registration = state
        .registration_repo
        .find_by_id(&id)
        .await?
        .filter(|r| r.user_id == user.id)
        .ok_or_else(|| ApiError::not_found("Registration", &id))?;

    if !state.registration_repo.delete_owned(&id, &user.id).await? {
        return Err(ApiError::not_found("Registration", &id));
    }
    tracing::info!(registration_id = %id, user_id = %user.id, "registration cancelled");

    state
        .publish_attendee_update(&registration.event_id, registration.status)
        .await;

    Ok(Json(ApiResponse::message("Registration cancelled")))
}

/// Registrations across owned events (all events for admins)
#[utoipa::path(
    get,
    path = "/manage",
    tag = "registrations",
    params(RegistrationListQuery),
    responses(
        (status = 200, description = "Paginated registrations", body = PaginatedResponse<RegistrationDetail>),
        (status = 403, description = "Organizer or admin role required")
    ),
    security(("bearer_auth" = []))
)]
pub async fn list_managed(
    State(state): State<RegistrationsState>,
    Authenticated(user): Authenticated,
    Query(query): Query<RegistrationListQuery>,
) -> Result<Json<ApiResponse<PaginatedResponse<RegistrationDetail>>>> {
    require_event_manager(&user)?;

    let creator = if user.role.is_admin() {
        None
    } else {
        Some(user.id.as_str())
    };
    let filter = query.filter()?;
    let (items, total) = state
        .registration_repo
        .list_managed(creator, &filter)
        .await?;
    Ok(Json(ApiResponse::data(PaginatedResponse::new(
        items,
        query.page(),
        query.limit(),
        total,
    ))))
}

/// Approve or reject one registration
///
/// Approval re-checks capacity against the live approved count. This check
/// is the authoritative one.
#[utoipa::path(
    put,
    path = "/{id}/status",
    tag = "registrations",
    params(("id" = String, Path, description = "Registration id")),
    request_body = StatusRequest,
    responses(
        (status = 200, description = "Status updated", body = Registration),
        (status = 400, description = "Invalid status or event full"),
        (status = 403, description = "Not the event creator and not an admin"),
        (status = 404, description = "Registration not found")
    ),
    security(("bearer_auth" = []))
)]
pub async fn set_status(
    State(state): State<RegistrationsState>,
    Authenticated(user): Authenticated,
    Path(id): Path<String>,
    Json(req): Json<StatusRequest>,
) -> Result<Json<ApiResponse<Registration>>> {
    let status = parse_decision(&req.status)?;

    let registration = state
        .registration_repo
        .find_by_id(&id)
        .await?
        .ok_or_else(|| ApiError::not_found("Registration", &id))?;

    let event = state
        .event_repo
        .find_by_id(&registration.event_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Event", &registration.event_id))?;

    if !user.role.is_admin() && event.created_by != user.id {
        return Err(ApiError::forbidden(
            "Only the event creator or an admin can decide registrations",
        ));
    }

    if status == RegistrationStatus::Approved
        && registration.status != RegistrationStatus::Approved
    {
        let approved = state.event_repo.approved_count(&event.id).await?;
        if approved >= event.capacity {
            return Err(ApiError::Full);
        }
    }

    state.registration_repo.set_status(&id, status).await?;
    tracing::info!(
        registration_id = %id,
        status = %status,
        decided_by = %user.id,
        "registration status changed"
    );

    let updated = state
        .registration_repo
        .find_by_id(&id)
        .await?
        .ok_or_else(|| ApiError::not_found("Registration", &id))?;

    state.publish_attendee_update(&event.id, status).await;

    Ok(Json(ApiResponse::with_message("Status updated", updated)))
}

/// Approve or reject a batch atomically
///
/// Every id must exist and, for non-admins, belong to an event the caller
/// created. Any failure leaves the whole batch untouched.
#[utoipa::path(
    put,
    path = "/bulk-status",
    tag = "registrations",
    request_body = BulkStatusRequest,
    responses(
        (status = 200, description = "Batch updated", body = Vec<Registration>),
        (status = 400, description = "Invalid status or empty batch"),
        (status = 403, description = "Batch includes a registration for someone else's event"),
        (status = 404, description = "Batch includes an unknown registration")
    ),
    security(("bearer_auth" = []))
)]
pub async fn bulk_set_status(
    State(state): State<RegistrationsState>,
    Authenticated(user): Authenticated,
    Json(req): Json<BulkStatusRequest>,
) -> Result<Json<ApiResponse<Vec<Registration>>>> {
    require_event_manager(&user)?;
    let status = parse_decision(&req.status)?;

    if req.ids.is_empty() {
        return Err(ApiError::invalid_field("ids must not be empty"));
    }
    let ids: Vec<String> = BTreeSet::from_iter(req.ids).into_iter().collect();

    let pairs = state.registration_repo.creators_for(&ids).await?;
    if pairs.len() != ids.len() {
        let found: BTreeSet<&str> = pairs.iter().map(|(id, _)| id.as_str()).collect();
        let missing = ids
            .iter()
            .find(|id| !found.contains(id.as_str()))
            .cloned()
            .unwrap_or_default();
        return Err(ApiError::not_found("Registration", &missing));
    }
    if !user.role.is_admin() {
        if let Some((id, _)) = pairs.iter().find(|(_, creator)| *creator != user.id) {
            return Err(ApiError::forbidden(format!(
                "Registration {} belongs to an event you do not manage",
                id
            )));
        }
    }

    let updated = state.registration_repo.bulk_set_status(&ids, status).await?;
    tracing::info!(
        count = updated.len(),
        status = %status,
        decided_by = %user.id,
        "bulk registration status change"
    );

    let event_ids: BTreeSet<String> =
        updated.iter().map(|r| r.event_id.clone()).collect();
    for event_id in &event_ids {
        state.publish_attendee_update(event_id, status).await;
    }

    Ok(Json(ApiResponse::with_message("Batch updated", updated)))
}

pub fn registrations_router(
    state: RegistrationsState,
    auth_state: crate::api::middleware::AuthState,
) -> Router {
    Router::new()
        .route("/", get(list_my_registrations).post(register))
        .route("/manage", get(list_managed))
        .route("/bulk-status", put(bulk_set_status))
        .route("/:id", axum::routing::delete(cancel))
        .route("/:id/status", put(set_status))
        .layer(Extension(auth_state))
        .with_state(state)
}
