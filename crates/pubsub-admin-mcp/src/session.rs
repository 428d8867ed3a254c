//! Registry of established sessions, keyed by caller-visible id.
//!
//! The host binds and unbinds sessions; tools only look them up through
//! [`SessionLookup`].

use crate::sdk::SessionHandle;
use dashmap::DashMap;
use tracing::info;

/// Read-only view of the session registry, as injected into tools.
pub trait SessionLookup: Send + Sync {
    fn lookup(&self, session_id: &str) -> Option<SessionHandle>;
}

#[derive(Debug, Default)]
pub struct SessionRegistry {
    sessions: DashMap<String, SessionHandle>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Binds `session` under `session_id`, returning any session it replaces.
    pub fn bind(&self, session_id: impl Into<String>, session: SessionHandle) -> Option<SessionHandle> {
        let session_id = session_id.into();
        info!(
            session_id = %session_id,
            remote_session = session.id(),
            principal = session.principal().unwrap_or("ANONYMOUS"),
            "Session bound"
        );
        self.sessions.insert(session_id, session)
    }

    pub fn unbind(&self, session_id: &str) -> Option<SessionHandle> {
        let removed = self.sessions.remove(session_id).map(|(_, session)| session);
        if removed.is_some() {
            info!(session_id, "Session unbound");
        }
        removed
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    pub fn ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.sessions.iter().map(|entry| entry.key().clone()).collect();
        ids.sort();
        ids
    }
}

impl SessionLookup for SessionRegistry {
    fn lookup(&self, session_id: &str) -> Option<SessionHandle> {
        self.sessions.get(session_id).map(|entry| entry.value().clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sdk::loopback::LoopbackServer;
    use std::sync::Arc;

    #[test]
    fn test_bind_lookup_unbind() {
        let server = LoopbackServer::new();
        let registry = SessionRegistry::new();
        assert!(registry.lookup("main").is_none());

        let session = server.connect("admin", "password").unwrap();
        assert!(registry.bind("main", session.clone()).is_none());
        let found = registry.lookup("main").unwrap();
        assert!(Arc::ptr_eq(&found, &session));
        assert_eq!(registry.ids(), vec!["main"]);

        assert!(registry.unbind("main").is_some());
        assert!(registry.unbind("main").is_none());
        assert!(registry.is_empty());
    }

    #[test]
    fn test_rebind_replaces() {
        let server = LoopbackServer::new();
        let registry = SessionRegistry::new();
        let first = server.connect("admin", "password").unwrap();
        let second = server.connect("control", "password").unwrap();

        registry.bind("main", first.clone());
        let replaced = registry.bind("main", second).unwrap();
        assert!(Arc::ptr_eq(&replaced, &first));
        assert_eq!(registry.lookup("main").unwrap().principal(), Some("control"));
        assert_eq!(registry.len(), 1);
    }
}
