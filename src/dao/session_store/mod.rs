pub mod rest;

#[cfg(test)]
pub mod memory;

use futures::future::BoxFuture;

use crate::dao::models::{SessionEntity, SessionPatch};
use crate::dao::storage::StorageResult;

/// Abstraction over the persistence layer for quiz sessions.
///
/// The store serializes writes per row; callers pass the version they read so
/// a lost race surfaces as [`StorageError::Conflict`](crate::dao::storage::StorageError)
/// instead of silently clobbering another client's write.
pub trait SessionStore: Send + Sync {
    /// Look up a session by its join code.
    fn find_session(&self, code: String) -> BoxFuture<'static, StorageResult<Option<SessionEntity>>>;
    /// Insert a fresh session row. The store's uniqueness constraint on the
    /// code is the final arbiter of generator races.
    fn insert_session(&self, session: SessionEntity) -> BoxFuture<'static, StorageResult<()>>;
    /// Apply a patch atomically if the row still carries `expected_version`.
    fn update_session(
        &self,
        code: String,
        expected_version: u64,
        patch: SessionPatch,
    ) -> BoxFuture<'static, StorageResult<SessionEntity>>;
    /// Repair write that skips the version check. Reserved for healing rows
    /// that violate a compound invariant.
    fn force_update_session(
        &self,
        code: String,
        patch: SessionPatch,
    ) -> BoxFuture<'static, StorageResult<SessionEntity>>;
    /// Count reachable session rows; used by the health probe.
    fn count_sessions(&self) -> BoxFuture<'static, StorageResult<u64>>;
    /// Minimal authenticated read proving the backend is reachable.
    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>>;
    /// Attempt to re-establish the backend connection.
    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>>;
}
