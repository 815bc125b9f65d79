//! Session lifecycle: creation, event application, and reconciliation of the
//! in-process cache against the authoritative store row.

use std::time::SystemTime;

use tracing::{debug, info, warn};

use crate::{
    dao::models::{
        ParticipantEntity, SessionEntity, SessionPatch, SessionStatus, VideoRoom,
    },
    dto::event::EventKind,
    error::ServiceError,
    services::{event_gate::AuthorizedEvent, session_codes, sse_service},
    state::SharedState,
};

/// Result of reconciling one session against the store.
#[derive(Debug)]
pub struct ReconcileOutcome {
    /// Fresh authoritative copy of the session.
    pub session: SessionEntity,
    /// True when the cached copy disagreed with the store (or no copy
    /// existed) and was replaced wholesale.
    pub drift_corrected: bool,
}

/// Create a new session owned by the verified actor behind `bearer`.
///
/// The code is generated with a collision pre-check; the store's uniqueness
/// constraint settles any remaining race at insert time.
pub async fn create_session(
    state: &SharedState,
    bearer: Option<String>,
) -> Result<SessionEntity, ServiceError> {
    let token = bearer.ok_or_else(|| {
        ServiceError::Unauthorized("no bearer credential accompanied the request".into())
    })?;
    let host = state.authenticator()?.verify(token).await?;

    let store = state.require_session_store().await?;
    let code = session_codes::generate_code(store.as_ref(), state.config().code_retry_budget).await?;

    let session = SessionEntity::new(code, host.actor_id);
    store.insert_session(session.clone()).await?;
    info!(code = %session.code, host = %session.host_id, "session created");

    state.replace_cached_session(session.clone());
    sse_service::broadcast_session_changed(state, &session);
    Ok(session)
}

/// Apply an authorized game event to its session.
///
/// Mutations are expressed as absolute target states, so a retried event
/// reduces to an empty patch and is acknowledged without a store write. A
/// lost version race surfaces as [`ServiceError::Conflict`]; the client is
/// expected to re-read and resubmit against fresh state.
pub async fn apply(
    state: &SharedState,
    authorized: AuthorizedEvent,
) -> Result<SessionEntity, ServiceError> {
    let AuthorizedEvent {
        request,
        actor,
        role,
        session,
        store,
    } = authorized;

    debug!(
        event = request.event.name(),
        code = %session.code,
        role = ?role,
        "applying game event"
    );

    let patch = build_patch(&session, actor.actor_id, &request.event)?;
    if patch.is_empty() {
        return Ok(session);
    }

    let updated = store
        .update_session(session.code.clone(), session.version, patch)
        .await?;

    // A finished session gets no further events, so its cache entry is
    // dropped rather than kept alive forever.
    if updated.status == SessionStatus::Finished {
        state.drop_cached_session(&updated.code);
    } else {
        state.replace_cached_session(updated.clone());
    }
    sse_service::broadcast_session_changed(state, &updated);
    Ok(updated)
}

/// Reconcile the cached copy of a session against the authoritative row.
///
/// The cache is replaced wholesale with whatever the store returns; stale
/// copies are never merged field by field. A row whose video room columns
/// disagree is repaired in place by closing the room, then re-served.
pub async fn reconcile(
    state: &SharedState,
    code: &str,
) -> Result<ReconcileOutcome, ServiceError> {
    let store = state.require_session_store().await?;

    let session = match store.find_session(code.to_string()).await {
        Ok(Some(session)) => session,
        Ok(None) => {
            state.drop_cached_session(code);
            return Err(ServiceError::NotFound(format!(
                "no session with code `{code}`"
            )));
        }
        Err(err) if err.is_corrupt() => {
            warn!(code, %err, "corrupt session row; closing video room to repair");
            let repaired = store
                .force_update_session(
                    code.to_string(),
                    SessionPatch {
                        video_room: Some(VideoRoom::Closed),
                        ..SessionPatch::default()
                    },
                )
                .await?;
            sse_service::broadcast_session_changed(state, &repaired);
            repaired
        }
        Err(err) => return Err(err.into()),
    };

    let drift_corrected = state
        .cached_session(code)
        .map(|cached| cached != session)
        .unwrap_or(true);
    if session.status == SessionStatus::Finished {
        state.drop_cached_session(code);
    } else {
        state.replace_cached_session(session.clone());
    }

    Ok(ReconcileOutcome {
        session,
        drift_corrected,
    })
}

/// Translate an event into the patch that moves the session to the
/// requested absolute state. An empty patch means the session is already
/// there and the event is a retry.
fn build_patch(
    session: &SessionEntity,
    actor_id: uuid::Uuid,
    event: &EventKind,
) -> Result<SessionPatch, ServiceError> {
    let mut patch = SessionPatch::default();

    match event {
        EventKind::AdvanceRound { round } => {
            if session.status == SessionStatus::Finished {
                return Err(ServiceError::InvalidState(
                    "cannot advance a finished session".into(),
                ));
            }
            if *round < session.current_round {
                return Err(ServiceError::InvalidState(format!(
                    "round {round} is behind the current round {}",
                    session.current_round
                )));
            }
            if *round > session.current_round {
                patch.current_round = Some(*round);
            }
            if session.status < SessionStatus::Active {
                patch.status = Some(SessionStatus::Active);
            }
        }
        EventKind::EndGame => {
            if session.status != SessionStatus::Finished {
                patch.status = Some(SessionStatus::Finished);
            }
        }
        EventKind::OpenVideoRoom { url } => {
            if session.status == SessionStatus::Finished {
                return Err(ServiceError::InvalidState(
                    "cannot open a video room on a finished session".into(),
                ));
            }
            let target = VideoRoom::Open { url: url.clone() };
            if session.video_room != target {
                patch.video_room = Some(target);
            }
        }
        EventKind::CloseVideoRoom => {
            if session.video_room.is_open() {
                patch.video_room = Some(VideoRoom::Closed);
            }
        }
        EventKind::Join { display_name } => {
            if session.status == SessionStatus::Finished {
                return Err(ServiceError::InvalidState(
                    "cannot join a finished session".into(),
                ));
            }
            let already_joined = session
                .participants
                .iter()
                .any(|p| p.actor_id == actor_id);
            if !already_joined {
                let mut roster = session.participants.clone();
                roster.push(ParticipantEntity {
                    actor_id,
                    display_name: display_name.trim().to_string(),
                    answers: Default::default(),
                    joined_at: SystemTime::now(),
                });
                patch.participants = Some(roster);
                if session.status == SessionStatus::Created {
                    patch.status = Some(SessionStatus::Lobby);
                }
            }
        }
        EventKind::Answer { round, choice } => {
            if session.status != SessionStatus::Active {
                return Err(ServiceError::InvalidState(
                    "answers are only accepted while the session is active".into(),
                ));
            }
            if *round > session.current_round {
                return Err(ServiceError::InvalidState(format!(
                    "round {round} has not started yet"
                )));
            }
            let mut roster = session.participants.clone();
            let participant = roster
                .iter_mut()
                .find(|p| p.actor_id == actor_id)
                .ok_or_else(|| {
                    ServiceError::InvalidState("join the session before answering".into())
                })?;
            // Absolute overwrite: resubmitting the same choice is a no-op.
            if participant.answers.get(round) != Some(choice) {
                participant.answers.insert(*round, *choice);
                patch.participants = Some(roster);
            }
        }
    }

    Ok(patch)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        auth::{ActorIdentity, ActorRole, AuthError, Authenticator},
        config::AppConfig,
        dao::session_store::{SessionStore, memory::MemoryStore},
        dto::event::GameEventRequest,
        state::AppState,
    };
    use futures::future::BoxFuture;
    use rand::{Rng, SeedableRng, rngs::StdRng};
    use std::sync::Arc;
    use uuid::Uuid;

    struct StaticAuthenticator {
        identity: ActorIdentity,
    }

    impl Authenticator for StaticAuthenticator {
        fn verify(&self, _token: String) -> BoxFuture<'static, Result<ActorIdentity, AuthError>> {
            let identity = self.identity;
            Box::pin(async move { Ok(identity) })
        }
    }

    async fn state_with_store(identity: ActorIdentity, store: MemoryStore) -> SharedState {
        let state = AppState::new(
            AppConfig::from_lookup(|_| None),
            Some(Arc::new(StaticAuthenticator { identity })),
        );
        state.install_session_store(Arc::new(store)).await;
        state
    }

    async fn authorized(
        state: &SharedState,
        actor: ActorIdentity,
        session: SessionEntity,
        event: EventKind,
    ) -> AuthorizedEvent {
        let role = if session.host_id == actor.actor_id {
            ActorRole::Host
        } else {
            ActorRole::Participant
        };
        AuthorizedEvent {
            request: GameEventRequest {
                session_id: session.code.clone(),
                event,
            },
            actor,
            role,
            session,
            store: state.session_store().await.expect("store installed"),
        }
    }

    fn host() -> ActorIdentity {
        ActorIdentity {
            actor_id: Uuid::new_v4(),
        }
    }

    #[tokio::test]
    async fn create_session_inserts_and_caches() {
        let identity = host();
        let store = MemoryStore::new();
        let state = state_with_store(identity, store.clone()).await;

        let session = create_session(&state, Some("t".into()))
            .await
            .expect("create");
        assert_eq!(session.host_id, identity.actor_id);
        assert_eq!(session.status, SessionStatus::Created);
        assert_eq!(store.row(&session.code), Some(session.clone()));
        assert_eq!(state.cached_session(&session.code), Some(session));
    }

    #[tokio::test]
    async fn create_session_without_credential_is_unauthorized() {
        let state = state_with_store(host(), MemoryStore::new()).await;
        let err = create_session(&state, None).await.unwrap_err();
        assert!(matches!(err, ServiceError::Unauthorized(_)));
    }

    #[tokio::test]
    async fn advance_round_promotes_and_is_idempotent() {
        let identity = host();
        let store = MemoryStore::new();
        let state = state_with_store(identity, store.clone()).await;
        let session = SessionEntity::new("1A2#B3C".into(), identity.actor_id);
        store.seed(session.clone());

        let event = EventKind::AdvanceRound { round: 1 };
        let auth = authorized(&state, identity, session, event.clone()).await;
        let updated = apply(&state, auth).await.expect("apply");
        assert_eq!(updated.status, SessionStatus::Active);
        assert_eq!(updated.current_round, 1);
        let writes_after_first = store.writes();

        // Retry against the fresh row reduces to an empty patch.
        let auth = authorized(&state, identity, updated.clone(), event).await;
        let retried = apply(&state, auth).await.expect("retry");
        assert_eq!(retried, updated);
        assert_eq!(store.writes(), writes_after_first);
    }

    #[tokio::test]
    async fn advance_round_rejects_regression_and_finished_sessions() {
        let identity = host();
        let store = MemoryStore::new();
        let state = state_with_store(identity, store.clone()).await;

        let mut session = SessionEntity::new("1A2#B3C".into(), identity.actor_id);
        session.status = SessionStatus::Active;
        session.current_round = 3;
        store.seed(session.clone());

        let auth = authorized(
            &state,
            identity,
            session.clone(),
            EventKind::AdvanceRound { round: 2 },
        )
        .await;
        assert!(matches!(
            apply(&state, auth).await.unwrap_err(),
            ServiceError::InvalidState(_)
        ));

        session.status = SessionStatus::Finished;
        let auth = authorized(&state, identity, session, EventKind::AdvanceRound { round: 4 }).await;
        assert!(matches!(
            apply(&state, auth).await.unwrap_err(),
            ServiceError::InvalidState(_)
        ));
    }

    #[tokio::test]
    async fn end_game_is_idempotent() {
        let identity = host();
        let store = MemoryStore::new();
        let state = state_with_store(identity, store.clone()).await;
        let session = SessionEntity::new("1A2#B3C".into(), identity.actor_id);
        store.seed(session.clone());

        let auth = authorized(&state, identity, session, EventKind::EndGame).await;
        let ended = apply(&state, auth).await.expect("end");
        assert_eq!(ended.status, SessionStatus::Finished);
        // Finished sessions are evicted from the cache.
        assert_eq!(state.cached_session(&ended.code), None);
        let writes = store.writes();

        let auth = authorized(&state, identity, ended.clone(), EventKind::EndGame).await;
        let retried = apply(&state, auth).await.expect("retry");
        assert_eq!(retried, ended);
        assert_eq!(store.writes(), writes);
    }

    #[tokio::test]
    async fn video_room_columns_move_together() {
        let identity = host();
        let store = MemoryStore::new();
        let state = state_with_store(identity, store.clone()).await;
        let session = SessionEntity::new("1A2#B3C".into(), identity.actor_id);
        store.seed(session.clone());

        let auth = authorized(
            &state,
            identity,
            session,
            EventKind::OpenVideoRoom {
                url: "https://meet.example/r".into(),
            },
        )
        .await;
        let opened = apply(&state, auth).await.expect("open");
        let (created, url) = opened.video_room.columns();
        assert!(created);
        assert_eq!(url, Some("https://meet.example/r"));

        let auth = authorized(&state, identity, opened, EventKind::CloseVideoRoom).await;
        let closed = apply(&state, auth).await.expect("close");
        let (created, url) = closed.video_room.columns();
        assert!(!created);
        assert_eq!(url, None);
    }

    #[tokio::test]
    async fn video_room_invariant_holds_across_event_sequences() {
        let identity = host();
        let store = MemoryStore::new();
        let state = state_with_store(identity, store.clone()).await;
        let session = SessionEntity::new("1A2#B3C".into(), identity.actor_id);
        store.seed(session.clone());

        let events = [
            EventKind::OpenVideoRoom {
                url: "https://meet.example/a".into(),
            },
            EventKind::AdvanceRound { round: 1 },
            EventKind::CloseVideoRoom,
            EventKind::AdvanceRound { round: 2 },
            EventKind::OpenVideoRoom {
                url: "https://meet.example/b".into(),
            },
            EventKind::EndGame,
        ];

        let mut current = session;
        for event in events {
            let auth = authorized(&state, identity, current.clone(), event).await;
            current = apply(&state, auth).await.expect("apply");
            let (created, url) = current.video_room.columns();
            assert_eq!(created, url.is_some(), "columns drifted after an event");
            let row = store.row(&current.code).expect("row");
            let (created, url) = row.video_room.columns();
            assert_eq!(created, url.is_some(), "persisted columns drifted");
        }
    }

    #[tokio::test]
    async fn video_room_invariant_holds_for_random_event_sequences() {
        let identity = host();
        let store = MemoryStore::new();
        let state = state_with_store(identity, store.clone()).await;
        let mut current = SessionEntity::new("1A2#B3C".into(), identity.actor_id);
        store.seed(current.clone());

        let mut rng = StdRng::seed_from_u64(0x5e55);
        for _ in 0..250 {
            let event = match rng.random_range(0..12) {
                0..=3 => EventKind::AdvanceRound {
                    round: rng.random_range(0..6),
                },
                4..=6 => EventKind::OpenVideoRoom {
                    url: format!("https://meet.example/{}", rng.random_range(0..4)),
                },
                7..=8 => EventKind::CloseVideoRoom,
                9 => EventKind::Join {
                    display_name: "Ada".into(),
                },
                10 => EventKind::Answer {
                    round: rng.random_range(0..6),
                    choice: rng.random_range(0..4),
                },
                _ => EventKind::EndGame,
            };

            let auth = authorized(&state, identity, current.clone(), event).await;
            match apply(&state, auth).await {
                Ok(updated) => current = updated,
                // Out-of-order targets are rejected without touching the row.
                Err(ServiceError::InvalidState(_)) => {}
                Err(err) => panic!("unexpected error: {err}"),
            }

            let row = store.row(&current.code).expect("row");
            let (created, url) = row.video_room.columns();
            assert_eq!(created, url.is_some(), "persisted columns drifted");
            let (created, url) = current.video_room.columns();
            assert_eq!(created, url.is_some(), "in-memory columns drifted");

            // A finished session accepts nothing further; start a fresh one
            // so the rest of the sequence keeps exercising transitions.
            if current.status == SessionStatus::Finished {
                current = SessionEntity::new(current.code.clone(), identity.actor_id);
                store.seed(current.clone());
            }
        }
    }

    #[tokio::test]
    async fn join_promotes_created_to_lobby_and_deduplicates() {
        let identity = host();
        let participant = host();
        let store = MemoryStore::new();
        let state = state_with_store(participant, store.clone()).await;
        let session = SessionEntity::new("1A2#B3C".into(), identity.actor_id);
        store.seed(session.clone());

        let event = EventKind::Join {
            display_name: "Ada".into(),
        };
        let auth = authorized(&state, participant, session, event.clone()).await;
        let joined = apply(&state, auth).await.expect("join");
        assert_eq!(joined.status, SessionStatus::Lobby);
        assert_eq!(joined.participants.len(), 1);
        let writes = store.writes();

        let auth = authorized(&state, participant, joined.clone(), event).await;
        let retried = apply(&state, auth).await.expect("rejoin");
        assert_eq!(retried.participants.len(), 1);
        assert_eq!(store.writes(), writes);
    }

    #[tokio::test]
    async fn answer_overwrites_and_requires_prior_join() {
        let identity = host();
        let participant = host();
        let store = MemoryStore::new();
        let state = state_with_store(participant, store.clone()).await;

        let mut session = SessionEntity::new("1A2#B3C".into(), identity.actor_id);
        session.status = SessionStatus::Active;
        session.current_round = 1;
        store.seed(session.clone());

        // Not in the roster yet.
        let auth = authorized(
            &state,
            participant,
            session.clone(),
            EventKind::Answer { round: 1, choice: 2 },
        )
        .await;
        assert!(matches!(
            apply(&state, auth).await.unwrap_err(),
            ServiceError::InvalidState(_)
        ));

        session.participants.push(ParticipantEntity {
            actor_id: participant.actor_id,
            display_name: "Ada".into(),
            answers: Default::default(),
            joined_at: SystemTime::now(),
        });
        store.seed(session.clone());

        let auth = authorized(
            &state,
            participant,
            session.clone(),
            EventKind::Answer { round: 1, choice: 2 },
        )
        .await;
        let answered = apply(&state, auth).await.expect("answer");
        assert_eq!(answered.participants[0].answers.get(&1), Some(&2));

        // Changing the choice overwrites the same round entry.
        let auth = authorized(
            &state,
            participant,
            answered,
            EventKind::Answer { round: 1, choice: 3 },
        )
        .await;
        let changed = apply(&state, auth).await.expect("overwrite");
        assert_eq!(changed.participants[0].answers.get(&1), Some(&3));
        assert_eq!(changed.participants[0].answers.len(), 1);
    }

    #[tokio::test]
    async fn lost_version_race_surfaces_as_conflict() {
        let identity = host();
        let store = MemoryStore::new();
        let state = state_with_store(identity, store.clone()).await;
        let session = SessionEntity::new("1A2#B3C".into(), identity.actor_id);
        store.seed(session.clone());

        // Another writer bumps the row after our read.
        store
            .update_session(
                session.code.clone(),
                session.version,
                SessionPatch {
                    current_round: Some(1),
                    ..SessionPatch::default()
                },
            )
            .await
            .expect("concurrent write");

        let auth = authorized(&state, identity, session, EventKind::EndGame).await;
        assert!(matches!(
            apply(&state, auth).await.unwrap_err(),
            ServiceError::Conflict(_)
        ));
    }

    #[tokio::test]
    async fn reconcile_reports_drift_then_settles() {
        let identity = host();
        let store = MemoryStore::new();
        let state = state_with_store(identity, store.clone()).await;
        let session = SessionEntity::new("1A2#B3C".into(), identity.actor_id);
        store.seed(session.clone());

        let outcome = reconcile(&state, &session.code).await.expect("first");
        assert!(outcome.drift_corrected);

        let outcome = reconcile(&state, &session.code).await.expect("second");
        assert!(!outcome.drift_corrected);

        // An out-of-band write reintroduces drift.
        store
            .update_session(
                session.code.clone(),
                session.version,
                SessionPatch {
                    status: Some(SessionStatus::Lobby),
                    ..SessionPatch::default()
                },
            )
            .await
            .expect("external write");
        let outcome = reconcile(&state, &session.code).await.expect("third");
        assert!(outcome.drift_corrected);
        assert_eq!(outcome.session.status, SessionStatus::Lobby);
    }

    #[tokio::test]
    async fn reconcile_drops_cache_for_missing_rows() {
        let identity = host();
        let store = MemoryStore::new();
        let state = state_with_store(identity, store.clone()).await;
        let session = SessionEntity::new("1A2#B3C".into(), identity.actor_id);
        state.replace_cached_session(session.clone());

        let err = reconcile(&state, &session.code).await.unwrap_err();
        assert!(matches!(err, ServiceError::NotFound(_)));
        assert_eq!(state.cached_session(&session.code), None);
    }

    #[tokio::test]
    async fn reconcile_heals_corrupt_rows_by_closing_the_room() {
        let identity = host();
        let store = MemoryStore::new();
        let state = state_with_store(identity, store.clone()).await;
        let mut session = SessionEntity::new("1A2#B3C".into(), identity.actor_id);
        session.video_room = VideoRoom::Open {
            url: "https://meet.example/r".into(),
        };
        store.seed(session.clone());
        store.mark_corrupt(&session.code);

        let outcome = reconcile(&state, &session.code).await.expect("repair");
        assert!(outcome.drift_corrected);
        assert_eq!(outcome.session.video_room, VideoRoom::Closed);

        // The row itself was repaired, so the next reconcile is clean.
        let outcome = reconcile(&state, &session.code).await.expect("clean");
        assert!(!outcome.drift_corrected);
    }
}
