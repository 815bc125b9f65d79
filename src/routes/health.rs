use axum::{Json, Router, extract::State, routing::get};

use crate::{dto::health::HealthCheckResult, services::health_service, state::SharedState};

#[utoipa::path(
    get,
    path = "/healthcheck",
    tag = "health",
    responses((status = 200, description = "Probe result; degraded health travels in the body", body = HealthCheckResult))
)]
/// Run a health probe against the configured session store.
///
/// Always answers HTTP 200: `misconfigured` and `unhealthy` are verdicts in
/// the body, so monitoring can distinguish a failed check from an unreachable
/// probe endpoint.
pub async fn healthcheck(State(state): State<SharedState>) -> Json<HealthCheckResult> {
    let result = health_service::probe(&state).await;
    Json(result)
}

/// Configure the health routes subtree. Both verbs map to the same probe so
/// simple webhook-style monitors can POST.
pub fn router() -> Router<SharedState> {
    Router::<SharedState>::new().route("/healthcheck", get(healthcheck).post(healthcheck))
}
