use utoipa::OpenApi;

#[derive(OpenApi)]
/// Aggregated OpenAPI specification for Quizlink Back.
#[openapi(
    paths(
        crate::routes::health::healthcheck,
        crate::routes::sessions::create_session,
        crate::routes::sessions::get_session,
        crate::routes::events::submit_game_event,
        crate::routes::legacy::deprecated_game_event,
        crate::routes::sse::session_stream,
        crate::routes::sse::system_stream,
    ),
    components(
        schemas(
            crate::dto::health::HealthCheckResult,
            crate::dto::health::HealthState,
            crate::dto::health::EnvironmentFlags,
            crate::dto::health::DatabaseHealth,
            crate::dto::health::HealthErrorDetail,
            crate::dto::event::GameEventRequest,
            crate::dto::event::EventKind,
            crate::dto::event::DeprecationNotice,
            crate::dto::session::SessionSummary,
            crate::dto::session::ParticipantSummary,
            crate::dto::sse::SessionChangedEvent,
            crate::dto::sse::SystemStatus,
            crate::dao::models::SessionStatus,
        )
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "sessions", description = "Session creation and reconciliation"),
        (name = "events", description = "Game event submission"),
        (name = "sse", description = "Server-sent events streams"),
    )
)]
pub struct ApiDoc;
