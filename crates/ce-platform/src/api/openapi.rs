//! OpenAPI Documentation
//!
//! Central OpenAPI specification for the platform APIs.

use utoipa::OpenApi;

/// CampusEvents API OpenAPI Documentation
#[derive(OpenApi)]
#[openapi(
    info(
        title = "CampusEvents API",
        version = "1.0.0",
        description = "REST APIs for campus event listings and registrations"
    ),
    servers(
        (url = "http://localhost:3000", description = "Local development")
    ),
    tags(
        (name = "auth", description = "Accounts and authentication"),
        (name = "events", description = "Event listings and management"),
        (name = "registrations", description = "Registration workflow")
    ),
    paths(
        // Auth API
        super::auth::register,
        super::auth::login,
        super::auth::verify,
        super::auth::update_profile,
        super::auth::change_password,
        // Events API
        super::events::list_events,
        super::events::my_events,
        super::events::get_event,
        super::events::create_event,
        super::events::update_event,
        super::events::delete_event,
        // Registrations API
        super::registrations::list_my_registrations,
        super::registrations::register,
        super::registrations::cancel,
        super::registrations::list_managed,
        super::registrations::set_status,
        super::registrations::bulk_set_status,
    ),
    components(schemas(
        crate::domain::Role,
        crate::domain::Event,
        crate::domain::EventSummary,
        crate::domain::Registration,
        crate::domain::RegistrationDetail,
        crate::domain::RegistrationStatus,
        super::auth::RegisterRequest,
        super::auth::LoginRequest,
        super::auth::UpdateProfileRequest,
        super::auth::ChangePasswordRequest,
        super::auth::UserResponse,
        super::auth::AuthResponse,
        super::events::EventRequest,
        super::registrations::RegistrationRequest,
        super::registrations::StatusRequest,
        super::registrations::BulkStatusRequest,
    ))
)]
pub struct ApiDoc;
