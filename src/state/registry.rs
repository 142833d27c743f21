use std::sync::Arc;

use dashmap::DashMap;
use tracing::info;
use uuid::Uuid;

use crate::{
    bank::Question,
    state::session::{Session, SessionId},
};

/// Id of the reserved session serving bare `join` actions. Never evicted.
pub const DEFAULT_SESSION_ID: &str = "default";

/// Read-only snapshot of one session for discovery listings.
///
/// Built from lock-free counters, so a listing taken during concurrent joins
/// is eventually consistent rather than serialized.
#[derive(Debug, Clone)]
pub struct SessionSummary {
    /// Stable session id.
    pub id: String,
    /// Human-readable session name.
    pub name: String,
    /// Whether a game is currently running.
    pub in_progress: bool,
    /// Number of players currently joined.
    pub player_count: usize,
}

/// Process-wide table of live sessions keyed by id.
///
/// Owned by [`AppState`](crate::state::AppState) and injected into whatever
/// serves connections; there is no ambient global registry.
pub struct SessionRegistry {
    sessions: DashMap<SessionId, Arc<Session>>,
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            sessions: DashMap::new(),
        }
    }

    /// Allocate a new session with a fresh id and insert it.
    ///
    /// Callers must reject empty question banks before getting here; the
    /// registry never does.
    pub fn create(&self, questions: Arc<[Question]>, name: Option<String>) -> Arc<Session> {
        let id = Uuid::new_v4().to_string();
        let name = name.unwrap_or_else(|| default_name(&id));
        let session = Arc::new(Session::new(id.clone(), name, questions));
        self.sessions.insert(id, Arc::clone(&session));
        info!(session_id = %session.id(), name = %session.name(), "created session");
        session
    }

    /// Insert the reserved default session.
    pub fn create_default(&self, questions: Arc<[Question]>) -> Arc<Session> {
        let session = Arc::new(Session::new(
            DEFAULT_SESSION_ID.to_string(),
            default_name(DEFAULT_SESSION_ID),
            questions,
        ));
        self.sessions
            .insert(DEFAULT_SESSION_ID.to_string(), Arc::clone(&session));
        session
    }

    /// Look up a session by id.
    pub fn get(&self, id: &str) -> Option<Arc<Session>> {
        self.sessions.get(id).map(|entry| Arc::clone(entry.value()))
    }

    /// Discard a session, cancelling any armed clock first. No-op if absent.
    pub async fn remove(&self, id: &str) {
        if let Some((_, session)) = self.sessions.remove(id) {
            session.shutdown().await;
            info!(session_id = %id, "removed session");
        }
    }

    /// Snapshot every session for discovery.
    pub fn summaries(&self) -> Vec<SessionSummary> {
        self.sessions
            .iter()
            .map(|entry| {
                let session = entry.value();
                SessionSummary {
                    id: session.id().to_string(),
                    name: session.name().to_string(),
                    in_progress: session.is_in_progress(),
                    player_count: session.player_count(),
                }
            })
            .collect()
    }

    /// Number of live sessions.
    pub fn len(&self) -> usize {
        self.sessions.len()
    }
}

/// Legacy naming rule: `"Game "` followed by the first 7 characters of the id.
fn default_name(id: &str) -> String {
    let prefix: String = id.chars().take(7).collect();
    format!("Game {prefix}")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn questions() -> Arc<[Question]> {
        vec![Question {
            text: "2+2?".into(),
            options: vec!["3".into(), "4".into()],
            correct: "4".into(),
        }]
        .into()
    }

    #[test]
    fn created_sessions_are_retrievable_by_id() {
        let registry = SessionRegistry::new();
        let session = registry.create(questions(), Some("Friday Quiz".into()));

        let found = registry.get(session.id()).unwrap();
        assert_eq!(found.name(), "Friday Quiz");
        assert!(registry.get("nope").is_none());
    }

    #[test]
    fn unnamed_sessions_get_the_legacy_name() {
        let registry = SessionRegistry::new();
        let session = registry.create(questions(), None);
        let expected: String = session.id().chars().take(7).collect();
        assert_eq!(session.name(), format!("Game {expected}"));
    }

    #[test]
    fn default_session_uses_the_reserved_id() {
        let registry = SessionRegistry::new();
        registry.create_default(questions());

        let session = registry.get(DEFAULT_SESSION_ID).unwrap();
        assert!(session.is_default());
        assert_eq!(session.name(), "Game default");
    }

    #[tokio::test]
    async fn remove_is_a_no_op_for_unknown_ids() {
        let registry = SessionRegistry::new();
        registry.create(questions(), None);
        registry.remove("unknown").await;
        assert_eq!(registry.len(), 1);
    }

    #[tokio::test]
    async fn removed_sessions_disappear_from_lookups() {
        let registry = SessionRegistry::new();
        let session = registry.create(questions(), None);
        let id = session.id().to_string();

        registry.remove(&id).await;
        assert!(registry.get(&id).is_none());
        assert_eq!(registry.len(), 0);
    }

    #[test]
    fn summaries_reflect_the_lobby_state() {
        let registry = SessionRegistry::new();
        registry.create(questions(), Some("A".into()));
        registry.create(questions(), Some("B".into()));

        let mut names: Vec<String> = registry.summaries().into_iter().map(|s| s.name).collect();
        names.sort();
        assert_eq!(names, vec!["A", "B"]);
        assert!(registry.summaries().iter().all(|s| !s.in_progress));
        assert!(registry.summaries().iter().all(|s| s.player_count == 0));
    }
}
