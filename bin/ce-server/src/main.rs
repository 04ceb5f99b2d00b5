//! CampusEvents Server
//!
//! Production server combining the REST APIs and the WebSocket hub:
//! - Auth APIs: register, login, profile, password rotation
//! - Event APIs: listings, creation, management
//! - Registration APIs: the pending/approved/rejected workflow
//! - Real-time: `/ws` with room-scoped attendance updates
//!
//! ## Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `CE_API_PORT` | `3000` | HTTP API port |
//! | `DATABASE_URL` | `sqlite://campus_events.db` | SQLite connection URL |
//! | `CE_JWT_SECRET` | dev secret | HS256 signing secret |
//! | `CE_JWT_ISSUER` | `campus-events` | Token issuer claim |
//! | `CE_TOKEN_EXPIRY_SECS` | `86400` | Token lifetime |
//! | `CE_CORS_ORIGIN` | `*` | Allowed CORS origin |
//! | `RUST_LOG` | `info` | Log level |

use std::sync::Arc;

use anyhow::Result;
use axum::{response::Json, routing::get, Router};
use tokio::{net::TcpListener, signal};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_subscriber::EnvFilter;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use ce_platform::api::{
    auth_router, events_router, registrations_router, ApiDoc, AuthApiState, AuthState,
    EventsState, RegistrationsState,
};
use ce_platform::repository::{
    connect, EventRepository, RegistrationRepository, UserRepository,
};
use ce_platform::service::{PasswordService, TokenConfig, TokenService};
use ce_realtime::socket::active_connection_count;
use ce_realtime::{ws_handler, Hub, RealtimeState};

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_or_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()))
        .init();

    info!("Starting CampusEvents Server");

    let api_port: u16 = env_or_parse("CE_API_PORT", 3000);
    let database_url = env_or("DATABASE_URL", "sqlite://campus_events.db");
    let cors_origin = env_or("CE_CORS_ORIGIN", "*");

    let token_config = TokenConfig {
        secret: env_or("CE_JWT_SECRET", "campus-events-dev-secret"),
        issuer: env_or("CE_JWT_ISSUER", "campus-events"),
        expiry_secs: env_or_parse("CE_TOKEN_EXPIRY_SECS", 86_400),
    };

    info!("Connecting to database: {}", database_url);
    let pool = connect(&database_url).await?;

    let user_repo = Arc::new(UserRepository::new(pool.clone()));
    let event_repo = Arc::new(EventRepository::new(pool.clone()));
    let registration_repo = Arc::new(RegistrationRepository::new(pool));
    user_repo.init_schema().await?;
    event_repo.init_schema().await?;
    registration_repo.init_schema().await?;
    info!("Repositories initialized");

    let token_service = Arc::new(TokenService::new(token_config));
    let password_service = Arc::new(PasswordService::new());
    let hub = Arc::new(Hub::new());

    let auth_state = AuthState {
        token_service: token_service.clone(),
        user_repo: user_repo.clone(),
    };
    let auth_api_state = AuthApiState {
        user_repo,
        token_service: token_service.clone(),
        password_service,
    };
    let events_state = EventsState {
        event_repo: event_repo.clone(),
        notifier: hub.clone(),
    };
    let registrations_state = RegistrationsState {
        registration_repo,
        event_repo,
        notifier: hub.clone(),
    };
    let realtime_state = RealtimeState { hub, token_service };

    let cors = if cors_origin == "*" {
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any)
    } else {
        CorsLayer::new()
            .allow_origin(cors_origin.parse::<axum::http::HeaderValue>()?)
            .allow_methods(Any)
            .allow_headers(Any)
    };

    let app = Router::new()
        .nest("/api/auth", auth_router(auth_api_state, auth_state.clone()))
        .nest("/api/events", events_router(events_state, auth_state.clone()))
        .nest(
            "/api/registrations",
            registrations_router(registrations_state, auth_state),
        )
        .route("/ws", get(ws_handler).with_state(realtime_state))
        .route("/health", get(health_handler))
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .layer(TraceLayer::new_for_http())
        .layer(cors);

    let api_addr = format!("0.0.0.0:{}", api_port);
    info!("Server listening on http://{}", api_addr);

    let listener = TcpListener::bind(&api_addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("CampusEvents Server shutdown complete");
    Ok(())
}

async fn health_handler() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "UP",
        "version": env!("CARGO_PKG_VERSION"),
        "websocketConnections": active_connection_count(),
    }))
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
}
