use std::convert::Infallible;

use axum::{
    Router,
    extract::{Path, State},
    response::sse::Sse,
    routing::get,
};
use futures::Stream;
use tracing::info;

use crate::{
    dto::validation::validate_session_code,
    error::AppError,
    services::sse_service::{self, StreamKind},
    state::SharedState,
};

#[utoipa::path(
    get,
    path = "/sse/sessions/{code}",
    tag = "sse",
    params(("code" = String, Path, description = "Join code of the session")),
    responses((status = 200, description = "Per-session change feed", content_type = "text/event-stream", body = String))
)]
/// Stream `session_changed` events for one session.
pub async fn session_stream(
    State(state): State<SharedState>,
    Path(code): Path<String>,
) -> Result<Sse<impl Stream<Item = Result<axum::response::sse::Event, Infallible>>>, AppError> {
    validate_session_code(&code)
        .map_err(|err| AppError::BadRequest(format!("invalid session code: {err}")))?;

    let receiver = sse_service::subscribe_session(&state, &code);
    info!(code, "new session SSE connection");
    Ok(sse_service::to_sse_stream(
        receiver,
        StreamKind::Session { state, code },
    ))
}

#[utoipa::path(
    get,
    path = "/sse/system",
    tag = "sse",
    responses((status = 200, description = "System status stream (degraded transitions)", content_type = "text/event-stream", body = String))
)]
/// Stream `system_status` events (degraded-mode transitions).
pub async fn system_stream(
    State(state): State<SharedState>,
) -> Sse<impl Stream<Item = Result<axum::response::sse::Event, Infallible>>> {
    let receiver = state.sse().system().subscribe();
    info!("new system SSE connection");
    sse_service::to_sse_stream(receiver, StreamKind::System)
}

/// Configure the SSE endpoints.
pub fn router() -> Router<SharedState> {
    Router::<SharedState>::new()
        .route("/sse/sessions/{code}", get(session_stream))
        .route("/sse/system", get(system_stream))
}
