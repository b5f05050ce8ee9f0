//! Browser sessions and their registry.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::{Mutex, MutexGuard};
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::conversation::ConversationStore;

/// Default idle timeout (30 minutes).
pub const DEFAULT_SESSION_TIMEOUT: Duration = Duration::from_secs(30 * 60);

/// One client session owning its conversations.
///
/// Cloning is cheap and yields a handle to the same session.
#[derive(Debug, Clone)]
pub struct Session {
    inner: Arc<SessionInner>,
}

#[derive(Debug)]
struct SessionInner {
    /// Unique session identifier.
    id: String,
    /// Conversations; held for the duration of a request.
    conversations: Mutex<ConversationStore>,
    /// Session creation time.
    created_at: DateTime<Utc>,
    /// Last activity time.
    last_activity: RwLock<DateTime<Utc>>,
}

impl Session {
    fn new(id: String) -> Self {
        let now = Utc::now();
        Self {
            inner: Arc::new(SessionInner {
                id,
                conversations: Mutex::new(ConversationStore::new()),
                created_at: now,
                last_activity: RwLock::new(now),
            }),
        }
    }

    /// Get the session ID.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.inner.id
    }

    /// Lock the session's conversations for the rest of a request.
    ///
    /// The store is initialized before it is handed out, so the active
    /// conversation always exists. Concurrent requests on the same session
    /// wait here; other sessions are unaffected.
    pub async fn conversations(&self) -> MutexGuard<'_, ConversationStore> {
        let mut guard = self.inner.conversations.lock().await;
        guard.ensure_initialized();
        self.touch();
        guard
    }

    /// Update the last activity timestamp.
    fn touch(&self) {
        let mut guard = self
            .inner
            .last_activity
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        *guard = Utc::now();
    }

    /// Time of the last request on this session.
    #[must_use]
    pub fn last_activity(&self) -> DateTime<Utc> {
        *self
            .inner
            .last_activity
            .read()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Check if the session has been idle longer than `timeout`.
    #[must_use]
    pub fn is_expired_with_timeout(&self, timeout: Duration) -> bool {
        match (Utc::now() - self.last_activity()).to_std() {
            Ok(idle) => idle > timeout,
            // Negative means clock skew; treat as fresh.
            Err(_) => false,
        }
    }

    /// Get the session age.
    #[must_use]
    pub fn age(&self) -> Duration {
        (Utc::now() - self.inner.created_at)
            .to_std()
            .unwrap_or(Duration::ZERO)
    }

    #[cfg(test)]
    fn backdate(&self, by: Duration) {
        let mut guard = self.inner.last_activity.write().unwrap();
        *guard -= chrono::Duration::from_std(by).unwrap();
    }
}

/// Thread-safe registry of live sessions.
///
/// Each session exclusively owns a [`ConversationStore`]; nothing is shared
/// between sessions and nothing outlives the process.
#[derive(Debug, Clone)]
pub struct SessionStore {
    inner: Arc<SessionStoreInner>,
}

#[derive(Debug)]
struct SessionStoreInner {
    sessions: RwLock<HashMap<String, Session>>,
    timeout: Duration,
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new(DEFAULT_SESSION_TIMEOUT)
    }
}

impl SessionStore {
    /// Create an empty registry whose sessions expire after `timeout` idle.
    #[must_use]
    pub fn new(timeout: Duration) -> Self {
        Self {
            inner: Arc::new(SessionStoreInner {
                sessions: RwLock::new(HashMap::new()),
                timeout,
            }),
        }
    }

    /// Create a new session and return it.
    #[must_use]
    pub fn create(&self) -> Session {
        let session = Session::new(Uuid::new_v4().to_string());
        self.inner
            .sessions
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(session.id().to_string(), session.clone());
        tracing::debug!(session_id = %session.id(), "Created session");
        session
    }

    /// Get a live session by ID.
    ///
    /// An expired session is dropped and reported as absent.
    #[must_use]
    pub fn get(&self, id: &str) -> Option<Session> {
        let session = self
            .inner
            .sessions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(id)
            .cloned()?;

        if session.is_expired_with_timeout(self.inner.timeout) {
            self.remove(id);
            tracing::debug!(session_id = %id, age_secs = session.age().as_secs(), "Session expired");
            return None;
        }
        Some(session)
    }

    /// Resolve the session named by a client, creating one if it is unknown.
    ///
    /// Returns the session and whether it was newly created. Client-supplied
    /// identifiers are never adopted; an unknown one gets a fresh session.
    #[must_use]
    pub fn resolve(&self, id: Option<&str>) -> (Session, bool) {
        match id.and_then(|id| self.get(id)) {
            Some(session) => (session, false),
            None => (self.create(), true),
        }
    }

    /// Remove a session by ID.
    pub fn remove(&self, id: &str) -> Option<Session> {
        self.inner
            .sessions
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(id)
    }

    /// Get the number of sessions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner
            .sessions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Check if there are no sessions.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Remove sessions idle longer than the configured timeout.
    ///
    /// Returns the number of sessions removed.
    pub fn cleanup_expired(&self) -> usize {
        let timeout = self.inner.timeout;
        let mut guard = self
            .inner
            .sessions
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        let before = guard.len();
        guard.retain(|id, session| {
            let expired = session.is_expired_with_timeout(timeout);
            if expired {
                tracing::debug!(
                    session_id = %id,
                    age_secs = session.age().as_secs(),
                    "Discarding expired session"
                );
            }
            !expired
        });
        before - guard.len()
    }

    /// Periodically discard expired sessions.
    pub fn spawn_sweeper(&self, every: Duration) -> JoinHandle<()> {
        let store = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let removed = store.cleanup_expired();
                if removed > 0 {
                    tracing::info!(
                        removed,
                        remaining = store.len(),
                        "Discarded expired sessions"
                    );
                }
            }
        })
    }
}
