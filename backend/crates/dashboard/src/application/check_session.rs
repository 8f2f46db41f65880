//! Check Session Use Case
//!
//! Verifies a session cookie and loads the session.

use std::sync::Arc;

use crate::application::config::DashboardConfig;
use crate::application::session_token::parse_session_token;
use crate::domain::entities::Session;
use crate::domain::repository::SessionRepository;
use crate::error::{DashboardError, DashboardResult};

/// Check session use case
pub struct CheckSessionUseCase<S>
where
    S: SessionRepository + Send + Sync + 'static,
{
    sessions: Arc<S>,
    config: Arc<DashboardConfig>,
}

impl<S> CheckSessionUseCase<S>
where
    S: SessionRepository + Send + Sync + 'static,
{
    pub fn new(sessions: Arc<S>, config: Arc<DashboardConfig>) -> Self {
        Self { sessions, config }
    }

    pub async fn execute(&self, session_token: &str) -> DashboardResult<Session> {
        let session_id = parse_session_token(&self.config, session_token)?;

        let session = self
            .sessions
            .find_by_id(&session_id)
            .await?
            .ok_or(DashboardError::SessionInvalid)?;

        if session.is_expired() {
            self.sessions.delete(&session_id).await?;
            return Err(DashboardError::SessionInvalid);
        }

        Ok(session)
    }

    /// Resolve the session if the token is valid, otherwise `None`
    ///
    /// Repository failures are logged and treated as signed out.
    pub async fn resolve(&self, session_token: &str) -> Option<Session> {
        match self.execute(session_token).await {
            Ok(session) => Some(session),
            Err(DashboardError::SessionInvalid) => None,
            Err(e) => {
                tracing::warn!(error = %e, "Session lookup failed");
                None
            }
        }
    }
}
