use axum::{Json, Router, extract::State, http::HeaderMap, routing::post};
use validator::Validate;

use crate::{
    auth::bearer_token,
    dto::{event::GameEventRequest, session::SessionSummary},
    error::AppError,
    services::{event_gate, session_service},
    state::SharedState,
};

/// Routes handling game event submission.
pub fn router() -> Router<SharedState> {
    Router::new().route("/game-events", post(submit_game_event))
}

/// Submit a game event against a session.
///
/// The request passes the authorization gate (identity, then session lookup,
/// then role) before any write; the response carries the session state after
/// the event was applied.
#[utoipa::path(
    post,
    path = "/game-events",
    tag = "events",
    request_body = GameEventRequest,
    responses(
        (status = 200, description = "Event applied; authoritative session state", body = SessionSummary),
        (status = 400, description = "Malformed event payload"),
        (status = 401, description = "No verified identity presented"),
        (status = 403, description = "Host-only event from a non-host"),
        (status = 404, description = "No session with this code"),
        (status = 409, description = "A concurrent write won the race; re-read and resubmit")
    )
)]
pub async fn submit_game_event(
    State(state): State<SharedState>,
    headers: HeaderMap,
    Json(payload): Json<GameEventRequest>,
) -> Result<Json<SessionSummary>, AppError> {
    payload.validate()?;

    let authorized = event_gate::authorize(&state, bearer_token(&headers), payload).await?;
    let session = session_service::apply(&state, authorized).await?;
    Ok(Json(session.into()))
}
