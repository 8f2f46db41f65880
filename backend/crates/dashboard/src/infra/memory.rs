//! In-memory session store
//!
//! Sessions live for the process lifetime only; a restart signs everyone
//! out.

use std::sync::Arc;

use chrono::Utc;
use dashmap::DashMap;
use kernel::id::SessionId;

use crate::domain::entities::Session;
use crate::domain::repository::SessionRepository;
use crate::error::DashboardResult;

#[derive(Debug, Clone, Default)]
pub struct InMemorySessionRepository {
    sessions: Arc<DashMap<SessionId, Session>>,
}

impl InMemorySessionRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

impl SessionRepository for InMemorySessionRepository {
    async fn create(&self, session: &Session) -> DashboardResult<()> {
        self.sessions.insert(session.session_id, session.clone());
        Ok(())
    }

    async fn find_by_id(&self, session_id: &SessionId) -> DashboardResult<Option<Session>> {
        Ok(self.sessions.get(session_id).map(|entry| entry.value().clone()))
    }

    async fn delete(&self, session_id: &SessionId) -> DashboardResult<()> {
        self.sessions.remove(session_id);
        Ok(())
    }

    async fn cleanup_expired(&self) -> DashboardResult<u64> {
        let now_ms = Utc::now().timestamp_millis();
        let before = self.sessions.len();
        self.sessions.retain(|_, session| !session.is_expired_at(now_ms));
        Ok((before - self.sessions.len()) as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entities::Identity;

    fn session(ttl: chrono::Duration) -> Session {
        Session::new(
            Identity {
                user_id: "u-1".to_string(),
                email: "ann@example.com".to_string(),
                name: None,
            },
            "tok".to_string(),
            ttl,
        )
    }

    #[tokio::test]
    async fn test_create_find_delete() {
        let repo = InMemorySessionRepository::new();
        let s = session(chrono::Duration::hours(1));

        repo.create(&s).await.unwrap();
        let found = repo.find_by_id(&s.session_id).await.unwrap().unwrap();
        assert_eq!(found.email, "ann@example.com");

        repo.delete(&s.session_id).await.unwrap();
        assert!(repo.find_by_id(&s.session_id).await.unwrap().is_none());
        assert!(repo.is_empty());
    }

    #[tokio::test]
    async fn test_cleanup_expired() {
        let repo = InMemorySessionRepository::new();
        repo.create(&session(chrono::Duration::hours(1)))
            .await
            .unwrap();
        repo.create(&session(chrono::Duration::milliseconds(-1_000)))
            .await
            .unwrap();

        assert_eq!(repo.cleanup_expired().await.unwrap(), 1);
        assert_eq!(repo.len(), 1);
    }
}
