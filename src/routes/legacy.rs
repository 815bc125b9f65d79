use axum::{Json, Router, http::StatusCode, routing::any};

use crate::{dto::event::DeprecationNotice, state::SharedState};

/// Routes kept only to answer retired paths with a firm deprecation notice.
pub fn router() -> Router<SharedState> {
    Router::new().route("/api/game-event", any(deprecated_game_event))
}

/// Retired game-event channel.
///
/// Answers 410 unconditionally, before reading the body or looking at
/// credentials, so stale clients fail fast instead of half-working. Preflight
/// requests are handled by the CORS layer and never reach this handler.
#[utoipa::path(
    post,
    path = "/api/game-event",
    tag = "events",
    responses((status = 410, description = "Endpoint retired; see the migration guide in the body", body = DeprecationNotice))
)]
pub async fn deprecated_game_event() -> (StatusCode, Json<DeprecationNotice>) {
    (StatusCode::GONE, Json(DeprecationNotice::game_event()))
}
