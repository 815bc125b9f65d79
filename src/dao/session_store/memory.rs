//! In-memory [`SessionStore`] used by unit tests. Mirrors the optimistic
//! concurrency and corruption semantics of the REST backend so service tests
//! can exercise conflict and repair paths without a network.

use std::{
    collections::{HashMap, HashSet},
    sync::{
        Arc, Mutex,
        atomic::{AtomicUsize, Ordering},
    },
};

use futures::future::BoxFuture;

use crate::dao::{
    models::{SessionEntity, SessionPatch},
    session_store::SessionStore,
    storage::{StorageError, StorageResult},
};

/// Cloneable in-memory store with read/write spies.
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Inner>,
}

#[derive(Default)]
struct Inner {
    rows: Mutex<HashMap<String, SessionEntity>>,
    corrupt: Mutex<HashSet<String>>,
    reads: AtomicUsize,
    writes: AtomicUsize,
}

impl MemoryStore {
    /// Fresh empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a row directly, bypassing counters.
    pub fn seed(&self, session: SessionEntity) {
        self.inner
            .rows
            .lock()
            .expect("rows lock")
            .insert(session.code.clone(), session);
    }

    /// Mark a row so reads fail with `Corrupt` until a force update repairs it.
    pub fn mark_corrupt(&self, code: &str) {
        self.inner
            .corrupt
            .lock()
            .expect("corrupt lock")
            .insert(code.to_string());
    }

    /// Fetch the stored row without touching the read counter.
    pub fn row(&self, code: &str) -> Option<SessionEntity> {
        self.inner.rows.lock().expect("rows lock").get(code).cloned()
    }

    /// Number of read operations performed through the trait.
    pub fn reads(&self) -> usize {
        self.inner.reads.load(Ordering::SeqCst)
    }

    /// Number of write operations performed through the trait.
    pub fn writes(&self) -> usize {
        self.inner.writes.load(Ordering::SeqCst)
    }
}

impl SessionStore for MemoryStore {
    fn find_session(
        &self,
        code: String,
    ) -> BoxFuture<'static, StorageResult<Option<SessionEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            store.inner.reads.fetch_add(1, Ordering::SeqCst);
            if store.inner.corrupt.lock().expect("corrupt lock").contains(&code) {
                return Err(StorageError::Corrupt {
                    code,
                    detail: "video room columns disagree".into(),
                });
            }
            Ok(store.inner.rows.lock().expect("rows lock").get(&code).cloned())
        })
    }

    fn insert_session(&self, session: SessionEntity) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            store.inner.writes.fetch_add(1, Ordering::SeqCst);
            let mut rows = store.inner.rows.lock().expect("rows lock");
            if rows.contains_key(&session.code) {
                return Err(StorageError::Conflict {
                    code: session.code,
                });
            }
            rows.insert(session.code.clone(), session);
            Ok(())
        })
    }

    fn update_session(
        &self,
        code: String,
        expected_version: u64,
        patch: SessionPatch,
    ) -> BoxFuture<'static, StorageResult<SessionEntity>> {
        let store = self.clone();
        Box::pin(async move {
            store.inner.writes.fetch_add(1, Ordering::SeqCst);
            let mut rows = store.inner.rows.lock().expect("rows lock");
            let session = rows.get_mut(&code).ok_or(StorageError::NoRows)?;
            if session.version != expected_version {
                return Err(StorageError::Conflict { code });
            }
            patch.apply_to(session);
            Ok(session.clone())
        })
    }

    fn force_update_session(
        &self,
        code: String,
        patch: SessionPatch,
    ) -> BoxFuture<'static, StorageResult<SessionEntity>> {
        let store = self.clone();
        Box::pin(async move {
            store.inner.writes.fetch_add(1, Ordering::SeqCst);
            store.inner.corrupt.lock().expect("corrupt lock").remove(&code);
            let mut rows = store.inner.rows.lock().expect("rows lock");
            let session = rows.get_mut(&code).ok_or(StorageError::NoRows)?;
            patch.apply_to(session);
            Ok(session.clone())
        })
    }

    fn count_sessions(&self) -> BoxFuture<'static, StorageResult<u64>> {
        let store = self.clone();
        Box::pin(async move {
            store.inner.reads.fetch_add(1, Ordering::SeqCst);
            Ok(store.inner.rows.lock().expect("rows lock").len() as u64)
        })
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            store.inner.reads.fetch_add(1, Ordering::SeqCst);
            Ok(())
        })
    }

    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
        Box::pin(async { Ok(()) })
    }
}
