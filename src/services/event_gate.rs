//! Authorization gate sitting in front of every game-event mutation.
//!
//! Ordering is fixed: identity first, then store availability, then the
//! session lookup, then the role check. Nothing is written to storage until
//! the gate has fully passed.

use std::{fmt, sync::Arc};

use tracing::debug;

use crate::{
    auth::{ActorIdentity, ActorRole},
    dao::{models::SessionEntity, session_store::SessionStore},
    dto::event::GameEventRequest,
    error::ServiceError,
    state::SharedState,
};

/// Proof that a game event passed the gate. Carries everything the apply
/// step needs so it never has to re-fetch or re-check.
pub struct AuthorizedEvent {
    /// The validated request.
    pub(crate) request: GameEventRequest,
    /// Verified identity of the sender.
    pub(crate) actor: ActorIdentity,
    /// Role of the sender relative to the targeted session.
    pub(crate) role: ActorRole,
    /// Session row as read during authorization.
    pub(crate) session: SessionEntity,
    /// Store handle resolved while the gate held it.
    pub(crate) store: Arc<dyn SessionStore>,
}

// Manual impl: the store handle is a trait object and has nothing useful to
// print.
impl fmt::Debug for AuthorizedEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthorizedEvent")
            .field("request", &self.request)
            .field("actor", &self.actor)
            .field("role", &self.role)
            .field("session", &self.session)
            .finish_non_exhaustive()
    }
}

/// Run the gate for one inbound event.
///
/// * no bearer credential: [`ServiceError::Unauthorized`], before any
///   network traffic;
/// * credential that does not verify: [`ServiceError::Unauthorized`];
/// * unknown session: [`ServiceError::NotFound`];
/// * host-only event from a non-host: [`ServiceError::Forbidden`]. The
///   request is identified as well-formed but disallowed, so it is never
///   retried by clients.
pub async fn authorize(
    state: &SharedState,
    bearer: Option<String>,
    request: GameEventRequest,
) -> Result<AuthorizedEvent, ServiceError> {
    let token = bearer.ok_or_else(|| {
        ServiceError::Unauthorized("no bearer credential accompanied the event".into())
    })?;

    let actor = state.authenticator()?.verify(token).await?;

    let store = state.require_session_store().await?;
    let session = store
        .find_session(request.session_id.clone())
        .await?
        .ok_or_else(|| {
            ServiceError::NotFound(format!("no session with code `{}`", request.session_id))
        })?;

    let role = if session.host_id == actor.actor_id {
        ActorRole::Host
    } else {
        ActorRole::Participant
    };

    if request.event.requires_host() && role != ActorRole::Host {
        debug!(
            event = request.event.name(),
            session = %request.session_id,
            actor = %actor.actor_id,
            "non-host attempted a host-only event"
        );
        return Err(ServiceError::Forbidden(format!(
            "event `{}` is reserved for the session host",
            request.event.name()
        )));
    }

    Ok(AuthorizedEvent {
        request,
        actor,
        role,
        session,
        store,
    })
}
