//! Close Session Use Case

use std::sync::Arc;

use crate::application::config::DashboardConfig;
use crate::application::session_token::parse_session_token;
use crate::domain::repository::SessionRepository;
use crate::error::DashboardResult;

/// Close session use case
pub struct CloseSessionUseCase<S>
where
    S: SessionRepository + Send + Sync + 'static,
{
    sessions: Arc<S>,
    config: Arc<DashboardConfig>,
}

impl<S> CloseSessionUseCase<S>
where
    S: SessionRepository + Send + Sync + 'static,
{
    pub fn new(sessions: Arc<S>, config: Arc<DashboardConfig>) -> Self {
        Self { sessions, config }
    }

    pub async fn execute(&self, session_token: &str) -> DashboardResult<()> {
        let session_id = parse_session_token(&self.config, session_token)?;
        self.sessions.delete(&session_id).await?;

        tracing::info!(session_id = %session_id, "Dashboard session closed");

        Ok(())
    }
}
