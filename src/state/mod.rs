mod sse;

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{RwLock, watch};
use uuid::Uuid;

use crate::{
    auth::{ActorIdentity, Authenticator, state_machine::AuthStateMachine},
    config::AppConfig,
    dao::{models::SessionEntity, session_store::SessionStore},
    error::ServiceError,
};

pub use self::sse::{SseHub, SseState};

/// Shared handle to the application state.
pub type SharedState = Arc<AppState>;

/// Central application state holding the store slot, cached sessions, SSE
/// hubs, and the auth state machine.
pub struct AppState {
    config: AppConfig,
    session_store: RwLock<Option<Arc<dyn SessionStore>>>,
    authenticator: Option<Arc<dyn Authenticator>>,
    sessions: DashMap<String, SessionEntity>,
    sse: SseState,
    degraded: watch::Sender<bool>,
    auth: AuthStateMachine,
    service_identity: ActorIdentity,
}

impl AppState {
    /// Construct a new [`AppState`] wrapped in an [`Arc`] so it can be cloned cheaply.
    ///
    /// The application starts in degraded mode until a storage backend is installed.
    pub fn new(config: AppConfig, authenticator: Option<Arc<dyn Authenticator>>) -> SharedState {
        let (degraded_tx, _rx) = watch::channel(true);
        Arc::new(Self {
            config,
            session_store: RwLock::new(None),
            authenticator,
            sessions: DashMap::new(),
            sse: SseState::new(16, 16),
            degraded: degraded_tx,
            auth: AuthStateMachine::new(),
            service_identity: ActorIdentity {
                actor_id: Uuid::new_v4(),
            },
        })
    }

    /// Immutable runtime configuration.
    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Obtain a handle to the current session store, if one is installed.
    pub async fn session_store(&self) -> Option<Arc<dyn SessionStore>> {
        let guard = self.session_store.read().await;
        guard.as_ref().cloned()
    }

    /// Session store handle, or a degraded-mode error when none is installed.
    pub async fn require_session_store(&self) -> Result<Arc<dyn SessionStore>, ServiceError> {
        self.session_store().await.ok_or(ServiceError::Degraded)
    }

    /// Install a new session store implementation and leave degraded mode.
    pub async fn install_session_store(&self, store: Arc<dyn SessionStore>) {
        {
            let mut guard = self.session_store.write().await;
            *guard = Some(store);
        }
        self.update_degraded(false);
    }

    /// Remove the current session store and enter degraded mode.
    pub async fn clear_session_store(&self) {
        {
            let mut guard = self.session_store.write().await;
            guard.take();
        }
        self.update_degraded(true);
    }

    /// Current degraded flag.
    pub async fn is_degraded(&self) -> bool {
        let guard = self.session_store.read().await;
        guard.is_none()
    }

    /// Subscribe to degraded mode updates.
    pub fn degraded_watcher(&self) -> watch::Receiver<bool> {
        self.degraded.subscribe()
    }

    /// Update and broadcast the degraded flag when the value changes.
    pub fn update_degraded(&self, value: bool) {
        self.degraded.send_if_modified(|current| {
            if *current == value {
                false
            } else {
                *current = value;
                true
            }
        });
    }

    /// Authenticator collaborator, or an error when the environment never
    /// provided one.
    pub fn authenticator(&self) -> Result<Arc<dyn Authenticator>, ServiceError> {
        self.authenticator
            .as_ref()
            .cloned()
            .ok_or_else(|| ServiceError::AuthBackend("no authenticator configured".into()))
    }

    /// State machine tracking the backend's own credential standing.
    pub fn auth(&self) -> &AuthStateMachine {
        &self.auth
    }

    /// Identity used for the backend's own auth transitions.
    pub fn service_identity(&self) -> ActorIdentity {
        self.service_identity
    }

    /// SSE sub-state (system hub and per-session hubs).
    pub fn sse(&self) -> &SseState {
        &self.sse
    }

    /// Cached copy of a session, if one was reconciled before.
    pub fn cached_session(&self, code: &str) -> Option<SessionEntity> {
        self.sessions.get(code).map(|entry| entry.clone())
    }

    /// Replace the cached copy wholesale, returning the previous one.
    /// No field-by-field merging: a stale cache is dropped, never patched.
    pub fn replace_cached_session(&self, session: SessionEntity) -> Option<SessionEntity> {
        self.sessions.insert(session.code.clone(), session)
    }

    /// Drop a cached session (row deleted or never existed).
    pub fn drop_cached_session(&self, code: &str) -> Option<SessionEntity> {
        self.sessions.remove(code).map(|(_, session)| session)
    }
}
