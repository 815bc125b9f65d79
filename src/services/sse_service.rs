//! Server-sent events plumbing: per-session change feeds and the system
//! status stream.

use std::{convert::Infallible, time::Duration};

use axum::response::sse::{Event, KeepAlive, Sse};
use futures::Stream;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::info;

use crate::{
    dao::models::SessionEntity,
    dto::sse::{ServerEvent, SessionChangedEvent, SystemStatus},
    state::{SharedState, SseHub},
};

/// Identifies which stream a connection belongs to, so the right bookkeeping
/// runs when it is torn down.
pub enum StreamKind {
    /// System status stream.
    System,
    /// Per-session change feed. Carries the state handle and code so the
    /// session hub can be dropped once its last subscriber disconnects.
    Session {
        /// Shared application state.
        state: SharedState,
        /// Join code of the subscribed session.
        code: String,
    },
}

/// Subscribe to the change feed of one session, creating its hub on first use.
pub fn subscribe_session(state: &SharedState, code: &str) -> broadcast::Receiver<ServerEvent> {
    state.sse().subscribe_session(code)
}

/// Convert a broadcast receiver into an SSE response, forwarding events until
/// the client disconnects. Session streams release their hub on teardown when
/// no other subscriber remains.
pub fn to_sse_stream(
    mut receiver: broadcast::Receiver<ServerEvent>,
    kind: StreamKind,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    // small bounded channel between forwarder and response
    let (tx, rx) = mpsc::channel::<Result<Event, Infallible>>(8);

    // forwarder task: reads from broadcast and pushes into mpsc
    tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = tx.closed() => break,
                recv_result = receiver.recv() => {
                    match recv_result {
                        Ok(payload) => {
                            let mut event = Event::default().data(payload.data);
                            if let Some(name) = payload.event {
                                event = event.event(name);
                            }

                            if tx.send(Ok(event)).await.is_err() {
                                break;
                            }
                        }
                        Err(RecvError::Closed) => break,
                        Err(RecvError::Lagged(_)) => {
                            // Skip lagged messages; the next session_changed
                            // carries the full state anyway.
                            continue;
                        }
                    }
                }
            }
        }

        drop(receiver);
        match kind {
            StreamKind::System => info!("system SSE stream disconnected"),
            StreamKind::Session { state, code } => {
                state.sse().drop_idle_session(&code);
                info!(code, "session SSE stream disconnected");
            }
        }
    });

    let stream = ReceiverStream::new(rx);
    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("keep-alive"),
    )
}

/// Broadcast a fresh authoritative copy of a session to its subscribers.
///
/// Every event carries the whole summary, so listeners replace their cached
/// copy wholesale instead of patching fields.
pub fn broadcast_session_changed(state: &SharedState, session: &SessionEntity) {
    if let Ok(event) = ServerEvent::json(
        Some("session_changed".to_string()),
        &SessionChangedEvent {
            session: session.clone().into(),
        },
    ) {
        state.sse().broadcast_session(&session.code, event);
    }
}

/// Forward degraded-mode transitions onto the system SSE stream until the
/// application state is dropped.
pub async fn forward_system_status(state: SharedState) {
    let mut watcher = state.degraded_watcher();
    loop {
        let degraded = *watcher.borrow_and_update();
        broadcast_system_status(state.sse().system(), degraded);
        if watcher.changed().await.is_err() {
            break;
        }
    }
}

/// Broadcast a degraded-mode transition on the given system hub.
pub fn broadcast_system_status(hub: &SseHub, degraded: bool) {
    if let Ok(event) = ServerEvent::json(
        Some("system_status".to_string()),
        &SystemStatus { degraded },
    ) {
        hub.broadcast(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{config::AppConfig, state::AppState};
    use uuid::Uuid;

    #[tokio::test]
    async fn session_changed_reaches_subscribers() {
        let state = AppState::new(AppConfig::from_lookup(|_| None), None);
        let session = SessionEntity::new("1A2#B3C".into(), Uuid::new_v4());

        let mut receiver = subscribe_session(&state, &session.code);
        broadcast_session_changed(&state, &session);

        let event = receiver.recv().await.expect("event");
        assert_eq!(event.event.as_deref(), Some("session_changed"));
        assert!(event.data.contains("\"id\":\"1A2#B3C\""));
    }

    #[tokio::test]
    async fn broadcast_without_subscribers_is_a_noop() {
        let state = AppState::new(AppConfig::from_lookup(|_| None), None);
        let session = SessionEntity::new("9Z8#Y7X".into(), Uuid::new_v4());
        // No hub exists for this code yet; nothing should panic or allocate one.
        broadcast_session_changed(&state, &session);
    }

    #[tokio::test]
    async fn system_status_reaches_subscribers() {
        let state = AppState::new(AppConfig::from_lookup(|_| None), None);
        let mut receiver = state.sse().system().subscribe();

        broadcast_system_status(state.sse().system(), true);
        let event = receiver.recv().await.expect("event");
        assert_eq!(event.event.as_deref(), Some("system_status"));
        assert!(event.data.contains("\"degraded\":true"));
    }

    #[tokio::test]
    async fn disconnect_releases_the_session_hub() {
        let state = AppState::new(AppConfig::from_lookup(|_| None), None);

        let receiver = subscribe_session(&state, "1A2#B3C");
        let sse = to_sse_stream(
            receiver,
            StreamKind::Session {
                state: state.clone(),
                code: "1A2#B3C".into(),
            },
        );
        assert_eq!(state.sse().session_hub_count(), 1);

        // Dropping the response closes the forwarder, which releases the hub.
        drop(sse);
        let deadline = std::time::Instant::now() + Duration::from_secs(2);
        while state.sse().session_hub_count() != 0 {
            assert!(std::time::Instant::now() < deadline, "hub was never released");
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    }
}
