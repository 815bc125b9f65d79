use dashmap::DashMap;
use tokio::sync::broadcast;

use crate::dto::sse::ServerEvent;

/// SSE-specific sub-state carved out from [`AppState`](super::AppState).
pub struct SseState {
    system: SseHub,
    sessions: DashMap<String, SseHub>,
    session_capacity: usize,
}

impl SseState {
    /// Build the SSE sub-tree with per-stream channel capacities.
    pub fn new(system_capacity: usize, session_capacity: usize) -> Self {
        Self {
            system: SseHub::new(system_capacity),
            sessions: DashMap::new(),
            session_capacity,
        }
    }

    /// Hub carrying system-wide events (degraded transitions).
    pub fn system(&self) -> &SseHub {
        &self.system
    }

    /// Subscribe to the per-session hub, creating it on first use.
    pub fn subscribe_session(&self, code: &str) -> broadcast::Receiver<ServerEvent> {
        self.sessions
            .entry(code.to_string())
            .or_insert_with(|| SseHub::new(self.session_capacity))
            .subscribe()
    }

    /// Broadcast to a session's subscribers, if any stream was ever opened.
    ///
    /// A hub whose last subscriber is gone is removed instead of broadcast
    /// to, so the map only holds codes with live streams.
    pub fn broadcast_session(&self, code: &str, event: ServerEvent) {
        self.sessions.remove_if(code, |_, hub| hub.receiver_count() == 0);
        if let Some(hub) = self.sessions.get(code) {
            hub.broadcast(event);
        }
    }

    /// Drop the hub for `code` when it no longer has subscribers. Called on
    /// stream teardown so idle hubs do not accumulate.
    pub fn drop_idle_session(&self, code: &str) {
        self.sessions.remove_if(code, |_, hub| hub.receiver_count() == 0);
    }

    /// Number of per-session hubs currently held.
    pub fn session_hub_count(&self) -> usize {
        self.sessions.len()
    }
}

/// Simple broadcast hub wrapper used by the SSE services.
pub struct SseHub {
    sender: broadcast::Sender<ServerEvent>,
}

impl SseHub {
    /// Construct a new hub backed by a Tokio broadcast channel with the given capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _receiver) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Register a new subscriber that will receive subsequent events.
    pub fn subscribe(&self) -> broadcast::Receiver<ServerEvent> {
        self.sender.subscribe()
    }

    /// Send an event to all current subscribers, ignoring delivery errors.
    pub fn broadcast(&self, event: ServerEvent) {
        let _ = self.sender.send(event);
    }

    /// Number of live subscribers.
    pub fn receiver_count(&self) -> usize {
        self.sender.receiver_count()
    }
}
