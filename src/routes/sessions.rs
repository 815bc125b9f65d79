use axum::{
    Json, Router,
    extract::{Path, State},
    http::HeaderMap,
    routing::{get, post},
};
use tracing::debug;

use crate::{
    auth::bearer_token,
    dto::{session::SessionSummary, validation::validate_session_code},
    error::AppError,
    services::session_service,
    state::SharedState,
};

/// Routes handling session creation and reconciliation.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/sessions", post(create_session))
        .route("/sessions/{code}", get(get_session))
}

/// Create a fresh session owned by the caller, with a collision-checked code.
#[utoipa::path(
    post,
    path = "/sessions",
    tag = "sessions",
    responses(
        (status = 200, description = "Session created", body = SessionSummary),
        (status = 401, description = "No verified identity presented"),
        (status = 503, description = "Code generation exhausted or store unavailable")
    )
)]
pub async fn create_session(
    State(state): State<SharedState>,
    headers: HeaderMap,
) -> Result<Json<SessionSummary>, AppError> {
    let session = session_service::create_session(&state, bearer_token(&headers)).await?;
    Ok(Json(session.into()))
}

/// Fetch a session, reconciling the server cache against the store row.
#[utoipa::path(
    get,
    path = "/sessions/{code}",
    tag = "sessions",
    params(("code" = String, Path, description = "Join code of the session")),
    responses(
        (status = 200, description = "Authoritative session state", body = SessionSummary),
        (status = 404, description = "No session with this code")
    )
)]
pub async fn get_session(
    State(state): State<SharedState>,
    Path(code): Path<String>,
) -> Result<Json<SessionSummary>, AppError> {
    validate_session_code(&code)
        .map_err(|err| AppError::BadRequest(format!("invalid session code: {err}")))?;

    let outcome = session_service::reconcile(&state, &code).await?;
    if outcome.drift_corrected {
        debug!(code, "served freshly reconciled session state");
    }
    Ok(Json(outcome.session.into()))
}
