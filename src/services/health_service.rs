//! Health probe behind `/healthcheck`. The verdict always travels in the
//! body with HTTP 200; transport-level failures are reserved for the probe
//! infrastructure itself.

use tokio::time::timeout;
use tracing::warn;

use crate::{dto::health::HealthCheckResult, state::SharedState};

/// Run one health probe.
///
/// Checks run in a fixed order:
/// 1. configuration: missing or placeholder values short-circuit to
///    `misconfigured` before any network call;
/// 2. store availability: degraded mode reports `unhealthy` with the
///    `store_unconnected` code;
/// 3. a bounded count query: the store's own error code is surfaced
///    verbatim so operators can match it against backend logs.
pub async fn probe(state: &SharedState) -> HealthCheckResult {
    let environment = state.config().environment.into();

    if state.config().is_misconfigured() {
        return HealthCheckResult::misconfigured(environment);
    }

    let store = match state.session_store().await {
        Some(store) => store,
        None => {
            warn!("health probe ran while no storage backend is connected");
            return HealthCheckResult::unhealthy(
                environment,
                "store_unconnected",
                "no storage backend is currently connected",
            );
        }
    };

    match timeout(state.config().probe_timeout, store.count_sessions()).await {
        Ok(Ok(count)) => HealthCheckResult::healthy(environment, count),
        Ok(Err(err)) => {
            warn!(error = %err, "health probe query failed");
            HealthCheckResult::unhealthy(environment, err.code(), err.to_string())
        }
        Err(_) => {
            warn!("health probe query timed out");
            HealthCheckResult::unhealthy(
                environment,
                "timeout",
                format!(
                    "store did not answer within {}ms",
                    state.config().probe_timeout.as_millis()
                ),
            )
        }
    }
}
