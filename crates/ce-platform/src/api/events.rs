//! Events API Endpoints
//!
//! - GET / - Paginated listing with search and upcoming filters
//! - GET /my-events - Events created by the caller
//! - GET /:id - Single event with attendee count
//! - POST / - Create (organizer or admin)
//! - PUT /:id - Update (creator or admin)
//! - DELETE /:id - Delete (creator or admin)

use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use utoipa::{IntoParams, ToSchema};

use ce_common::{event_room, Notifier, RealtimeEvent};

use crate::api::common::{ApiResponse, PaginatedResponse, MAX_LIMIT};
use crate::api::middleware::{ensure_owner_or_admin, require_event_manager, Authenticated};
use crate::domain::{Event, EventSummary};
use crate::error::{ApiError, Result};
use crate::repository::{EventFilter, EventRepository};

/// Event create/update request
#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct EventRequest {
    pub title: String,
    pub description: Option<String>,
    pub date: chrono::DateTime<chrono::Utc>,
    pub location: Option<String>,
    pub capacity: Option<i64>,
}

/// Listing query parameters
#[derive(Debug, Default, Deserialize, ToSchema, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct EventListQuery {
    #[serde(default)]
    pub page: Option<u32>,
    #[serde(default)]
    pub limit: Option<u32>,
    /// Case-insensitive substring match on title and description.
    #[serde(default)]
    pub search: Option<String>,
    /// When true, only events dated now or later.
    #[serde(default)]
    pub upcoming: bool,
}

impl EventListQuery {
    fn page(&self) -> u32 {
        self.page.unwrap_or(1).max(1)
    }

    fn limit(&self) -> u32 {
        self.limit.unwrap_or(20).clamp(1, MAX_LIMIT)
    }

    fn filter(&self) -> EventFilter {
        EventFilter {
            search: self
                .search
                .as_ref()
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty()),
            upcoming_only: self.upcoming,
            limit: self.limit() as i64,
            offset: (self.page() as i64 - 1) * self.limit() as i64,
        }
    }
}

/// Events endpoint state
#[derive(Clone)]
pub struct EventsState {
    pub event_repo: Arc<EventRepository>,
    pub notifier: Arc<dyn Notifier>,
}

/// List events
#[utoipa::path(
    get,
    path = "",
    tag = "events",
    params(EventListQuery),
    responses(
        (status = 200, description = "Paginated events", body = PaginatedResponse<EventSummary>)
    )
)]
pub async fn list_events(
    State(state): State<EventsState>,
    Query(query): Query<EventListQuery>,
) -> Result<Json<ApiResponse<PaginatedResponse<EventSummary>>>> {
    let (items, total) = state.event_repo.list(&query.filter()).await?;
    Ok(Json(ApiResponse::data(PaginatedResponse::new(
        items,
        query.page(),
        query.limit(),
        total,
    ))))
}

/// Events created by the caller
#[utoipa::path(
    get,
    path = "/my-events",
    tag = "events",
    responses(
        (status = 200, description = "Caller's events", body = Vec<EventSummary>),
        (status = 403, description = "Student role cannot create events")
    ),
    security(("bearer_auth" = []))
)]
pub async fn my_events(
    State(state): State<EventsState>,
    Authenticated(user): Authenticated,
) -> Result<Json<ApiResponse<Vec<EventSummary>>>> {
    require_event_manager(&user)?;
    let events = state.event_repo.list_by_creator(&user.id).await?;
    Ok(Json(ApiResponse::data(events)))
}

/// Single event
#[utoipa::path(
    get,
    path = "/{id}",
    tag = "events",
    params(("id" = String, Path, description = "Event id")),
    responses(
        (status = 200, description = "Event found", body = EventSummary),
        (status = 404, description = "Event not found")
    )
)]
pub async fn get_event(
    State(state): State<EventsState>,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<EventSummary>>> {
    let event = state
        .event_repo
        .find_summary(&id)
        .await?
        .ok_or_else(|| ApiError::not_found("Event", &id))?;
    Ok(Json(ApiResponse::data(event)))
}

/// Create an event
#[utoipa::path(
    post,
    path = "",
    tag = "events",
    request_body = EventRequest,
    responses(
        (status = 201, description = "Event created", body = EventSummary),
        (status = 400, description = "Validation failed"),
        (status = 403, description = "Organizer or admin role required")
    ),
    security(("bearer_auth" = []))
)]
pub async fn create_event(
    State(state): State<EventsState>,
    Authenticated(user): Authenticated,
    Json(req): Json<EventRequest>,
) -> Result<impl IntoResponse> {
    require_event_manager(&user)?;

    let capacity = req.capacity.unwrap_or(crate::domain::event::CAPACITY_DEFAULT);
    Event::validate_fields(&req.title, &req.date, capacity)?;

    let mut event = Event::new(&req.title, req.date, capacity, &user.id);
    event.description = req.description.map(|d| d.trim().to_string()).filter(|d| !d.is_empty());
    event.location = req.location.map(|l| l.trim().to_string()).filter(|l| !l.is_empty());

    state.event_repo.insert(&event).await?;

    let summary = state
        .event_repo
        .find_summary(&event.id)
        .await?
        .ok_or_else(|| ApiError::internal("event vanished after insert"))?;

    if let Ok(payload) = serde_json::to_value(&summary) {
        state.notifier.broadcast(RealtimeEvent::NewEvent { event: payload });
    }
    tracing::info!(event_id = %event.id, created_by = %user.id, "event created");

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::with_message("Event created", summary)),
    ))
}

/// Update an event
#[utoipa::path(
    put,
    path = "/{id}",
    tag = "events",
    params(("id" = String, Path, description = "Event id")),
    request_body = EventRequest,
    responses(
        (status = 200, description = "Event updated", body = EventSummary),
        (status = 403, description = "Not the creator and not an admin"),
        (status = 404, description = "Event not found")
    ),
    security(("bearer_auth" = []))
)]
pub async fn update_event(
    State(state): State<EventsState>,
    Authenticated(user): Authenticated,
    Path(id): Path<String>,
    Json(req): Json<EventRequest>,
) -> Result<Json<ApiResponse<EventSummary>>> {
    let mut event = state
        .event_repo
        .find_by_id(&id)
        .await?
        .ok_or_else(|| ApiError::not_found("Event", &id))?;

    ensure_owner_or_admin(&user, &event.created_by)?;

    let capacity = req.capacity.unwrap_or(event.capacity);
    Event::validate_fields(&req.title, &req.date, capacity)?;

    event.title = req.title.trim().to_string();
    event.description = req.description.map(|d| d.trim().to_string()).filter(|d| !d.is_empty());
    event.date = req.date;
    event.location = req.location.map(|l| l.trim().to_string()).filter(|l| !l.is_empty());
    event.capacity = capacity;

    state.event_repo.update(&event).await?;

    let summary = state
        .event_repo
        .find_summary(&id)
        .await?
        .ok_or_else(|| ApiError::not_found("Event", &id))?;

    state.notifier.publish(
        &event_room(&id),
        RealtimeEvent::AttendeeUpdate {
            event_id: id.clone(),
            attendee_count: summary.attendee_count,
            status: "updated".to_string(),
        },
    );

    Ok(Json(ApiResponse::with_message("Event updated", summary)))
}

/// Delete an event and its registrations
#[utoipa::path(
    delete,
    path = "/{id}",
    tag = "events",
    params(("id" = String, Path, description = "Event id")),
    responses(
        (status = 200, description = "Event deleted"),
        (status = 403, description = "Not the creator and not an admin"),
        (status = 404, description = "Event not found")
    ),
    security(("bearer_auth" = []))
)]
pub async fn delete_event(
    State(state): State<EventsState>,
    Authenticated(user): Authenticated,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<()>>> {
    let event = state
        .event_repo
        .find_by_id(&id)
        .await?
        .ok_or_else(|| ApiError::not_found("Event", &id))?;

    ensure_owner_or_admin(&user, &event.created_by)?;

    state.event_repo.delete(&id).await?;
    tracing::info!(event_id = %id, deleted_by = %user.id, "event deleted");

    Ok(Json(ApiResponse::message("Event deleted")))
}

pub fn events_router(state: EventsState, auth_state: crate::api::middleware::AuthState) -> Router {
    Router::new()
        .route("/", get(list_events).post(create_event))
        .route("/my-events", get(my_events))
        .route(
            "/:id",
            get(get_event).put(update_event).delete(delete_event),
        )
        .layer(Extension(auth_state))
        .with_state(state)
}
