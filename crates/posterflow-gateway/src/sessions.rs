//! In-memory poster sessions.
//!
//! Each session pairs the observable [`PosterSession`] state with the
//! drawing surface that holds the poster document.

use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info};

use posterflow_canvas::{MemorySurface, Viewport};
use posterflow_core::session::{PosterSession, SessionState};

pub struct SessionEntry {
    pub session: PosterSession,
    pub surface: Mutex<MemorySurface>,
}

impl SessionEntry {
    fn new(session_id: &str, viewport: Viewport) -> Self {
        Self {
            session: PosterSession::new(session_id),
            surface: Mutex::new(MemorySurface::new(session_id, viewport)),
        }
    }

    pub async fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            session_id: self.session.session_id.clone(),
            state: self.session.snapshot(),
            surface: self.surface.lock().await.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
    pub session_id: String,
    pub state: SessionState,
    pub surface: MemorySurface,
}

/// Marks a session busy for the lifetime of one turn. Dropping an armed
/// guard (for example when the request is cancelled) clears the busy flag.
pub struct TurnGuard<'a> {
    session: &'a PosterSession,
    armed: bool,
}

impl<'a> TurnGuard<'a> {
    /// `None` when a turn is already in flight for this session.
    pub fn acquire(session: &'a PosterSession) -> Option<Self> {
        session.start_thinking().then(|| Self {
            session,
            armed: true,
        })
    }

    pub fn session(&self) -> &'a PosterSession {
        self.session
    }

    /// The turn recorded its own result, which already cleared the flag.
    pub fn disarm(mut self) {
        self.armed = false;
    }
}

impl Drop for TurnGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            self.session.finish_thinking();
        }
    }
}

/// State for all active poster sessions.
pub struct SessionManager {
    sessions: RwLock<HashMap<String, Arc<SessionEntry>>>,
}

impl Default for SessionManager {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionManager {
    pub fn new() -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
        }
    }

    pub async fn get(&self, session_id: &str) -> Option<Arc<SessionEntry>> {
        self.sessions.read().await.get(session_id).cloned()
    }

    pub async fn get_or_create(&self, session_id: &str, viewport: Viewport) -> Arc<SessionEntry> {
        if let Some(entry) = self.get(session_id).await {
            return entry;
        }
        let mut sessions = self.sessions.write().await;
        sessions
            .entry(session_id.to_string())
            .or_insert_with(|| {
                info!(session_id, "Poster session created");
                Arc::new(SessionEntry::new(session_id, viewport))
            })
            .clone()
    }

    pub async fn remove(&self, session_id: &str) -> bool {
        let removed = self.sessions.write().await.remove(session_id).is_some();
        if removed {
            debug!(session_id, "Poster session removed");
        }
        removed
    }

    pub async fn ids(&self) -> Vec<String> {
        let mut ids: Vec<_> = self.sessions.read().await.keys().cloned().collect();
        ids.sort();
        ids
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_get_or_create_is_idempotent() {
        let manager = SessionManager::new();
        let a = manager.get_or_create("p1", Viewport::default()).await;
        let b = manager
            .get_or_create("p1", Viewport::new(10.0, 10.0))
            .await;
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(b.surface.lock().await.viewport, Viewport::default());
        assert_eq!(manager.len().await, 1);
    }

    #[tokio::test]
    async fn test_remove() {
        let manager = SessionManager::new();
        manager.get_or_create("p1", Viewport::default()).await;
        assert!(manager.remove("p1").await);
        assert!(!manager.remove("p1").await);
        assert!(manager.is_empty().await);
    }

    #[test]
    fn test_turn_guard_excludes_second_turn() {
        let session = PosterSession::new("p1");
        let guard = TurnGuard::acquire(&session).unwrap();
        assert!(session.is_thinking());
        assert!(TurnGuard::acquire(&session).is_none());
        drop(guard);
        assert!(!session.is_thinking());
        assert!(TurnGuard::acquire(&session).is_some());
    }

    #[test]
    fn test_disarmed_guard_leaves_flag_alone() {
        let session = PosterSession::new("p1");
        let first = TurnGuard::acquire(&session).unwrap();
        session.set_last_result("title", 1);
        let second = TurnGuard::acquire(&session).unwrap();
        first.disarm();
        assert!(session.is_thinking());
        drop(second);
        assert!(!session.is_thinking());
    }
}
