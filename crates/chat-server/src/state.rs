use chat_core::config::AppConfig;
use chat_core::conversation::{ConversationLoop, DisplaySink};
use chat_core::session::{Frame, Session};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{Mutex, RwLock};

/// One browser session: the conversation itself plus the last frame drawn
/// for it. The frame stays readable while a reply is being generated.
pub struct SessionHandle {
    id: String,
    pub session: Arc<Mutex<Session>>,
    snapshot: std::sync::Mutex<Frame>,
    last_active: std::sync::Mutex<Instant>,
}

impl SessionHandle {
    fn new(session: Session) -> Self {
        let frame = session.render();
        Self {
            id: session.id().to_string(),
            session: Arc::new(Mutex::new(session)),
            snapshot: std::sync::Mutex::new(frame),
            last_active: std::sync::Mutex::new(Instant::now()),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Mark the session as used now.
    pub fn touch(&self) {
        match self.last_active.lock() {
            Ok(mut at) => *at = Instant::now(),
            Err(poisoned) => *poisoned.into_inner() = Instant::now(),
        }
    }

    pub fn idle_for(&self) -> Duration {
        match self.last_active.lock() {
            Ok(at) => at.elapsed(),
            Err(poisoned) => poisoned.into_inner().elapsed(),
        }
    }

    /// True while a submission holds the session.
    pub fn is_busy(&self) -> bool {
        self.session.try_lock().is_err()
    }

    pub fn snapshot(&self) -> Frame {
        match self.snapshot.lock() {
            Ok(frame) => frame.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Display sink that publishes each frame as this session's snapshot.
    pub fn display(&self) -> SnapshotDisplay<'_> {
        SnapshotDisplay {
            snapshot: &self.snapshot,
        }
    }
}

pub struct SnapshotDisplay<'a> {
    snapshot: &'a std::sync::Mutex<Frame>,
}

impl DisplaySink for SnapshotDisplay<'_> {
    fn render(&mut self, frame: &Frame) {
        match self.snapshot.lock() {
            Ok(mut current) => *current = frame.clone(),
            Err(poisoned) => *poisoned.into_inner() = frame.clone(),
        }
    }
}

/// Live sessions keyed by id. Nothing is persisted; removing a session
/// discards its transcript.
#[derive(Default)]
pub struct SessionStore {
    sessions: RwLock<HashMap<String, Arc<SessionHandle>>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn create(&self) -> Arc<SessionHandle> {
        let handle = Arc::new(SessionHandle::new(Session::new()));
        let id = handle.id().to_string();
        self.sessions.write().await.insert(id.clone(), handle.clone());
        tracing::debug!("Created session {}", id);
        handle
    }

    /// Look up a session and mark it as used.
    pub async fn get(&self, id: &str) -> Option<Arc<SessionHandle>> {
        let handle = self.sessions.read().await.get(id).cloned()?;
        handle.touch();
        Some(handle)
    }

    pub async fn remove(&self, id: &str) -> bool {
        let removed = self.sessions.write().await.remove(id).is_some();
        if removed {
            tracing::debug!("Discarded session {}", id);
        }
        removed
    }

    /// Discard every session idle for at least `max_idle`. Sessions with a
    /// reply in flight are kept. Returns how many were removed.
    pub async fn sweep_idle(&self, max_idle: Duration) -> usize {
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|_, handle| handle.is_busy() || handle.idle_for() < max_idle);
        let removed = before - sessions.len();
        if removed > 0 {
            tracing::info!("Discarded {} idle session(s)", removed);
        }
        removed
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }
}

/// Shared application state for the server.
#[derive(Clone)]
pub struct AppState {
    pub config: AppConfig,
    pub conversation: Arc<ConversationLoop>,
    pub sessions: Arc<SessionStore>,
}

impl AppState {
    pub fn new(config: AppConfig, conversation: Arc<ConversationLoop>) -> Self {
        Self {
            config,
            conversation,
            sessions: Arc::new(SessionStore::new()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_sweep_removes_idle_sessions() {
        let store = SessionStore::new();
        let handle = store.create().await;

        assert_eq!(store.sweep_idle(Duration::from_secs(3600)).await, 0);
        assert!(store.get(handle.id()).await.is_some());

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(store.sweep_idle(Duration::from_millis(10)).await, 1);
        assert!(store.get(handle.id()).await.is_none());
    }

    #[tokio::test]
    async fn test_sweep_keeps_busy_sessions() {
        let store = SessionStore::new();
        let handle = store.create().await;
        let _busy = handle.session.lock().await;

        assert_eq!(store.sweep_idle(Duration::ZERO).await, 0);
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn test_get_refreshes_activity() {
        let store = SessionStore::new();
        let handle = store.create().await;
        tokio::time::sleep(Duration::from_millis(50)).await;

        store.get(handle.id()).await;

        assert!(handle.idle_for() < Duration::from_millis(50));
        assert_eq!(store.sweep_idle(Duration::from_millis(40)).await, 0);
    }
}
