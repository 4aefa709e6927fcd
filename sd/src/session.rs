//! Async session service
//!
//! Wraps the durable [`sessionstore::SessionStore`] with per-session
//! serialization: turns on the same session run strictly one at a time,
//! turns on different sessions never block each other. The store itself is
//! the only shared mutable resource in the system.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::debug;

use sessionstore::{Message, Session, SessionId, SessionStore, SessionSummary, StoreError};

/// Per-session lock handle
pub type TurnLock = Arc<Mutex<()>>;

/// Async façade over the session store
pub struct SessionService {
    store: SessionStore,
    /// One lock per session id, created lazily. Sessions are never deleted,
    /// so entries live as long as the service.
    locks: Mutex<HashMap<SessionId, TurnLock>>,
}

impl SessionService {
    /// Open the service over a store rooted at the given path
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        Ok(Self {
            store: SessionStore::open(path)?,
            locks: Mutex::new(HashMap::new()),
        })
    }

    /// Create a new empty session
    pub fn create(&self) -> Result<SessionId, StoreError> {
        self.store.create()
    }

    /// Check whether a session exists
    pub fn exists(&self, session_id: &str) -> bool {
        self.store.exists(session_id)
    }

    /// Load a session with full history
    pub fn get(&self, session_id: &str) -> Result<Session, StoreError> {
        self.store.get(session_id)
    }

    /// Ordered message history for a session
    pub fn history(&self, session_id: &str) -> Result<Vec<Message>, StoreError> {
        self.store.history(session_id)
    }

    /// Summaries of sessions with at least one user message, newest first
    pub fn list_summaries(&self) -> Result<Vec<SessionSummary>, StoreError> {
        self.store.list_summaries()
    }

    /// The turn lock for a session
    ///
    /// Callers hold this for the whole turn (context load through final
    /// append) so same-session turns serialize in arrival order.
    pub async fn turn_lock(&self, session_id: &str) -> TurnLock {
        let mut locks = self.locks.lock().await;
        locks
            .entry(session_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Append the user/assistant pair of a completed turn
    ///
    /// The pair goes through one buffered store write, so history never ends
    /// up with half a turn. Callers already hold the turn lock.
    pub fn append_turn(&self, session_id: &str, user: Message, assistant: Message) -> Result<(), StoreError> {
        debug!(%session_id, "append_turn: persisting turn");
        self.store.append_many(session_id, &[user, assistant])
    }
}
