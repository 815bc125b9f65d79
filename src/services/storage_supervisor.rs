//! Background task owning the storage connection lifecycle and the backend's
//! own credential standing.

use std::{future::Future, sync::Arc, time::Duration};

use tokio::time::sleep;
use tracing::{info, warn};

use crate::{
    auth::state_machine::AuthEvent,
    dao::{session_store::SessionStore, storage::StorageError},
    state::SharedState,
};

const INITIAL_DELAY: Duration = Duration::from_millis(1_000);
const MAX_DELAY: Duration = Duration::from_secs(10);
const HEALTH_POLL_INTERVAL: Duration = Duration::from_secs(5);
const MAX_RECONNECT_ATTEMPTS: u32 = 3;

/// Connect to the storage backend and keep the shared state in degraded mode
/// while it is unavailable.
///
/// A successful connection also moves the auth state machine to
/// `authenticated`, since the store credential doubles as the backend's own
/// identity; a permission failure on the health poll expires it.
pub async fn run<F, Fut>(state: SharedState, mut connect: F)
where
    F: FnMut() -> Fut + Send + 'static,
    Fut: Future<Output = Result<Arc<dyn SessionStore>, StorageError>> + Send,
{
    let mut delay = INITIAL_DELAY;

    loop {
        match connect().await {
            Ok(store) => {
                state.install_session_store(store.clone()).await;
                state
                    .auth()
                    .observe(AuthEvent::SignedIn(state.service_identity()));
                info!("storage connection established; leaving degraded mode");
                delay = INITIAL_DELAY;

                poll_until_lost(&state, store).await;

                state.clear_session_store().await;
                sleep(delay).await;
                delay = (delay * 2).min(MAX_DELAY);
            }
            Err(err) => {
                warn!(error = %err, "storage connection attempt failed");
                sleep(delay).await;
                delay = (delay * 2).min(MAX_DELAY);
            }
        }
    }
}

/// Poll the store until its connection is lost for good.
async fn poll_until_lost(state: &SharedState, store: Arc<dyn SessionStore>) {
    loop {
        match store.health_check().await {
            Ok(()) => {
                if state.is_degraded().await {
                    info!("storage healthy again; leaving degraded mode");
                    state.update_degraded(false);
                }
                sleep(HEALTH_POLL_INTERVAL).await;
            }
            Err(err) => {
                if matches!(err, StorageError::PermissionDenied) {
                    warn!("store credential rejected; marking session expired");
                    state.auth().observe(AuthEvent::SessionExpired);
                }

                if !reconnect_with_backoff(state, store.as_ref()).await {
                    warn!("exhausted storage reconnect attempts; staying in degraded mode");
                    return;
                }

                state
                    .auth()
                    .observe(AuthEvent::SignedIn(state.service_identity()));
                state.update_degraded(false);
                sleep(HEALTH_POLL_INTERVAL).await;
            }
        }
    }
}

/// Bounded reconnect loop after a failed health check. Returns true when the
/// connection came back.
async fn reconnect_with_backoff(state: &SharedState, store: &dyn SessionStore) -> bool {
    let mut reconnect_delay = INITIAL_DELAY;

    for attempt in 0..MAX_RECONNECT_ATTEMPTS {
        match store.try_reconnect().await {
            Ok(()) => {
                info!("storage reconnection succeeded after health check failure");
                return true;
            }
            Err(reconnect_err) => {
                if attempt == 0 {
                    warn!(
                        attempt, error = %reconnect_err,
                        "storage reconnect first attempt failed; entering degraded mode"
                    );
                    state.update_degraded(true);
                } else {
                    warn!(attempt, error = %reconnect_err, "storage reconnect attempt failed");
                }
                sleep(reconnect_delay).await;
                reconnect_delay = (reconnect_delay * 2).min(MAX_DELAY);
            }
        }
    }

    false
}
