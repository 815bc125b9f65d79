//! Explicit authentication state machine.
//!
//! Replaces the broadly-scoped reactive auth context the frontend pattern
//! encourages: consumers hold a [`AuthWatcher`] with an explicit unsubscribe
//! instead of ambient global state.

use tokio::sync::{mpsc, watch};
use tracing::debug;

use crate::auth::ActorIdentity;

/// Current standing of the tracked credential.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AuthPhase {
    /// No auth event observed yet.
    #[default]
    Initializing,
    /// A credential was verified and is considered live.
    Authenticated(ActorIdentity),
    /// No live credential (signed out, or the session expired).
    Anonymous,
}

/// Transition-driving events, fed from an external auth-event stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthEvent {
    /// A credential was verified for the given identity.
    SignedIn(ActorIdentity),
    /// The credential was voluntarily dropped.
    SignedOut,
    /// The backend reported the credential as no longer valid.
    SessionExpired,
}

/// State machine tracking auth transitions behind a watch channel.
pub struct AuthStateMachine {
    tx: watch::Sender<AuthPhase>,
}

impl Default for AuthStateMachine {
    fn default() -> Self {
        let (tx, _rx) = watch::channel(AuthPhase::Initializing);
        Self { tx }
    }
}

impl AuthStateMachine {
    /// New machine in the initializing phase.
    pub fn new() -> Self {
        Self::default()
    }

    /// Current phase.
    pub fn phase(&self) -> AuthPhase {
        *self.tx.borrow()
    }

    /// Apply one event, notifying watchers when the phase changes.
    pub fn observe(&self, event: AuthEvent) -> AuthPhase {
        let next = match event {
            AuthEvent::SignedIn(identity) => AuthPhase::Authenticated(identity),
            AuthEvent::SignedOut | AuthEvent::SessionExpired => AuthPhase::Anonymous,
        };

        self.tx.send_if_modified(|phase| {
            if *phase == next {
                false
            } else {
                debug!(from = ?phase, to = ?next, "auth phase transition");
                *phase = next;
                true
            }
        });

        next
    }

    /// Subscribe to phase changes.
    pub fn watch(&self) -> AuthWatcher {
        AuthWatcher {
            rx: Some(self.tx.subscribe()),
        }
    }
}

/// Subscription handle over the auth phase. Dropping or calling
/// [`AuthWatcher::unsubscribe`] detaches it.
pub struct AuthWatcher {
    rx: Option<watch::Receiver<AuthPhase>>,
}

impl AuthWatcher {
    /// Phase as of the latest observed transition.
    pub fn current(&self) -> AuthPhase {
        self.rx
            .as_ref()
            .map(|rx| *rx.borrow())
            .unwrap_or(AuthPhase::Anonymous)
    }

    /// Wait for the next phase change. Returns `None` once unsubscribed or
    /// when the machine is gone.
    pub async fn changed(&mut self) -> Option<AuthPhase> {
        let rx = self.rx.as_mut()?;
        match rx.changed().await {
            Ok(()) => Some(*rx.borrow_and_update()),
            Err(_) => None,
        }
    }

    /// Explicitly detach from the machine.
    pub fn unsubscribe(mut self) {
        self.rx.take();
    }
}

/// Drive a machine from an external auth-event stream until it closes.
pub async fn drive(machine: std::sync::Arc<AuthStateMachine>, mut events: mpsc::Receiver<AuthEvent>) {
    while let Some(event) = events.recv().await {
        machine.observe(event);
    }
}
