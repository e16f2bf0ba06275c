//! Session Registry
//!
//! Maps live sessions to their participants and exposes read-only snapshots
//! of their match state. The registry never owns a session; the matchmaker
//! registers a session when it starts and removes it when its loop returns.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;

use tokio::sync::RwLock;
use uuid::Uuid;

use crate::game::state::MatchState;

/// What the registry knows about a live session.
#[derive(Debug, Clone)]
pub struct SessionEntry {
    /// Participant ids in seat order.
    pub participants: [Uuid; 2],
    /// Participant names in seat order.
    pub usernames: [String; 2],
    /// Shared match state (read only outside the session loop).
    pub state: Arc<RwLock<MatchState>>,
    /// When the session was registered.
    pub started_at: Instant,
}

/// Registry of live sessions.
#[derive(Default)]
pub struct SessionRegistry {
    sessions: RwLock<BTreeMap<Uuid, SessionEntry>>,
}

impl SessionRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a session and its participants.
    pub async fn register(&self, session_id: Uuid, entry: SessionEntry) {
        self.sessions.write().await.insert(session_id, entry);
    }

    /// Remove a session.
    pub async fn unregister(&self, session_id: &Uuid) -> Option<SessionEntry> {
        self.sessions.write().await.remove(session_id)
    }

    /// Registry entry for a session.
    pub async fn get(&self, session_id: &Uuid) -> Option<SessionEntry> {
        self.sessions.read().await.get(session_id).cloned()
    }

    /// Copy of a session's current match state.
    pub async fn snapshot(&self, session_id: &Uuid) -> Option<MatchState> {
        let state = self.get(session_id).await?.state;
        let snapshot = state.read().await.clone();
        Some(snapshot)
    }

    /// Number of live sessions.
    pub async fn session_count(&self) -> usize {
        self.sessions.read().await.len()
    }

    /// Ids of live sessions.
    pub async fn session_ids(&self) -> Vec<Uuid> {
        self.sessions.read().await.keys().copied().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(a: Uuid, b: Uuid) -> SessionEntry {
        SessionEntry {
            participants: [a, b],
            usernames: ["alice".into(), "bob".into()],
            state: Arc::new(RwLock::new(MatchState::new([0; 16], 1, [1, 1]))),
            started_at: Instant::now(),
        }
    }

    #[tokio::test]
    async fn test_register_and_lookup() {
        let registry = SessionRegistry::new();
        let (a, b, session) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());

        registry.register(session, entry(a, b)).await;
        assert_eq!(registry.session_count().await, 1);
        assert_eq!(registry.get(&session).await.unwrap().participants, [a, b]);
        assert_eq!(registry.session_ids().await, vec![session]);
    }

    #[tokio::test]
    async fn test_unregister_removes_session() {
        let registry = SessionRegistry::new();
        let (a, b, session) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());

        registry.register(session, entry(a, b)).await;
        assert!(registry.unregister(&session).await.is_some());
        assert_eq!(registry.session_count().await, 0);
        assert!(registry.get(&session).await.is_none());
        assert!(registry.session_ids().await.is_empty());
        assert!(registry.unregister(&session).await.is_none());
    }

    #[tokio::test]
    async fn test_snapshot_is_a_copy() {
        let registry = SessionRegistry::new();
        let session = Uuid::new_v4();
        let e = entry(Uuid::new_v4(), Uuid::new_v4());
        let shared = Arc::clone(&e.state);
        registry.register(session, e).await;

        shared.write().await.credit_mana(4, 10);
        let snapshot = registry.snapshot(&session).await.unwrap();
        assert_eq!(snapshot.mana(crate::game::map::Side::P1), 4);
        assert!(registry.snapshot(&Uuid::new_v4()).await.is_none());
    }
}
