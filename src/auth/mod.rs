//! Authentication collaborator contract and the explicit auth state machine.
//!
//! The gate consumes a verified identity from an [`Authenticator`]; it never
//! re-implements row-level security, only role-level business rules on top.

pub mod rest;
pub mod state_machine;

use axum::http::{HeaderMap, header};
use futures::future::BoxFuture;
use thiserror::Error;
use uuid::Uuid;

/// Verified identity of the actor behind a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActorIdentity {
    /// Stable identifier assigned by the authentication backend.
    pub actor_id: Uuid,
}

/// Role of an actor relative to one session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActorRole {
    /// The actor created and controls the session.
    Host,
    /// Any other verified actor.
    Participant,
}

/// Failures surfaced by an [`Authenticator`].
#[derive(Debug, Error)]
pub enum AuthError {
    /// No credential accompanied the request.
    #[error("missing bearer credential")]
    MissingCredential,
    /// The credential could not be verified.
    #[error("invalid bearer credential")]
    InvalidCredential,
    /// The authentication backend could not be reached.
    #[error("authentication backend unavailable: {0}")]
    Unavailable(String),
}

/// External collaborator resolving bearer credentials to verified identities.
pub trait Authenticator: Send + Sync {
    /// Verify a bearer token, returning the identity it belongs to.
    fn verify(&self, token: String) -> BoxFuture<'static, Result<ActorIdentity, AuthError>>;
}

/// Pull the bearer token out of an `Authorization` header, if present.
pub fn bearer_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::to_string)
        .filter(|token| !token.is_empty())
}
