/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 27/1/26
******************************************************************************/

//! The engine handle.
//!
//! The engine owns what the original design kept in process globals: the
//! session registry and the dictionary cache. Drivers and responders
//! address sessions only through this handle by [`SessionId`], which keeps
//! ownership acyclic.

use anvilfix_core::session_id::SessionId;
use anvilfix_dictionary::DictionaryCache;
use anvilfix_session::Session;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

/// A registered session behind its per-session lock.
///
/// The lock is the session-exclusivity guarantee: one task drives a
/// session's state machine at a time.
pub type SessionHandle = Arc<tokio::sync::Mutex<Session>>;

/// Explicit owner of the session registry and dictionary cache.
#[derive(Default)]
pub struct Engine {
    sessions: RwLock<HashMap<SessionId, SessionHandle>>,
    dictionaries: Arc<DictionaryCache>,
}

impl Engine {
    /// Creates an empty engine.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the dictionary cache.
    #[must_use]
    pub fn dictionaries(&self) -> &Arc<DictionaryCache> {
        &self.dictionaries
    }

    /// Registers a session; replaces any previous session with the same id.
    pub fn register(&self, session: Session) -> SessionHandle {
        let id = session.session_id().clone();
        let handle: SessionHandle = Arc::new(tokio::sync::Mutex::new(session));
        self.sessions.write().insert(id, Arc::clone(&handle));
        handle
    }

    /// Removes a session from the registry.
    pub fn unregister(&self, id: &SessionId) -> Option<SessionHandle> {
        self.sessions.write().remove(id)
    }

    /// Looks up a session by id.
    #[must_use]
    pub fn lookup(&self, id: &SessionId) -> Option<SessionHandle> {
        self.sessions.read().get(id).cloned()
    }

    /// Snapshot of all registered session ids.
    #[must_use]
    pub fn session_ids(&self) -> Vec<SessionId> {
        self.sessions.read().keys().cloned().collect()
    }

    /// Snapshot of all registered sessions.
    #[must_use]
    pub fn session_handles(&self) -> Vec<SessionHandle> {
        self.sessions.read().values().cloned().collect()
    }

    /// Number of registered sessions.
    #[must_use]
    pub fn session_count(&self) -> usize {
        self.sessions.read().len()
    }

    /// Returns true if any registered session is logged on.
    pub async fn is_logged_on(&self) -> bool {
        for handle in self.session_handles() {
            if handle.lock().await.is_logged_on() {
                return true;
            }
        }
        false
    }
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("sessions", &self.session_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anvilfix_core::CompId;
    use anvilfix_dictionary::{Validator, Version, session_dictionary};
    use anvilfix_session::{NullApplication, SessionConfig, SessionRole};
    use anvilfix_store::MemoryStore;

    fn sample_session(sender: &str) -> Session {
        let id = SessionId::new(
            "FIX.4.4",
            CompId::new(sender).unwrap(),
            CompId::new("CLIENT").unwrap(),
        );
        Session::new(
            id,
            SessionConfig::new(SessionRole::Acceptor),
            Arc::new(MemoryStore::new()),
            Arc::new(NullApplication),
            Validator::new(Arc::new(session_dictionary(Version::Fix44))),
            None,
        )
    }

    #[tokio::test]
    async fn test_register_and_lookup() {
        let engine = Engine::new();
        let session = sample_session("SERVER");
        let id = session.session_id().clone();
        engine.register(session);

        assert_eq!(engine.session_count(), 1);
        assert!(engine.lookup(&id).is_some());
        assert!(engine.lookup(&id.reversed()).is_none());
        assert!(!engine.is_logged_on().await);
    }

    #[tokio::test]
    async fn test_unregister() {
        let engine = Engine::new();
        let session = sample_session("SERVER");
        let id = session.session_id().clone();
        engine.register(session);

        assert!(engine.unregister(&id).is_some());
        assert_eq!(engine.session_count(), 0);
    }
}
