//! Open Session Use Case
//!
//! Exchanges a document-store access token for a dashboard session.

use std::sync::Arc;

use crate::application::config::DashboardConfig;
use crate::application::session_token::issue_session_token;
use crate::domain::entities::Session;
use crate::domain::repository::{DocumentStore, SessionRepository};
use crate::error::{DashboardError, DashboardResult};

/// Open session output
pub struct OpenSessionOutput {
    pub session: Session,
    /// Signed cookie value
    pub session_token: String,
}

/// Open session use case
pub struct OpenSessionUseCase<D, S>
where
    D: DocumentStore + Send + Sync + 'static,
    S: SessionRepository + Send + Sync + 'static,
{
    store: Arc<D>,
    sessions: Arc<S>,
    config: Arc<DashboardConfig>,
}

impl<D, S> OpenSessionUseCase<D, S>
where
    D: DocumentStore + Send + Sync + 'static,
    S: SessionRepository + Send + Sync + 'static,
{
    pub fn new(store: Arc<D>, sessions: Arc<S>, config: Arc<DashboardConfig>) -> Self {
        Self {
            store,
            sessions,
            config,
        }
    }

    pub async fn execute(&self, access_token: &str) -> DashboardResult<OpenSessionOutput> {
        let access_token = access_token.trim();
        if access_token.is_empty() {
            return Err(DashboardError::Validation(
                "Access token is required".to_string(),
            ));
        }

        // Token must be accepted by the document store before we keep it
        let identity = self.store.whoami(access_token).await?;

        let ttl = chrono::Duration::from_std(self.config.session_ttl)
            .map_err(|e| DashboardError::Internal(format!("Invalid session TTL: {e}")))?;
        let session = Session::new(identity, access_token.to_string(), ttl);

        self.sessions.create(&session).await?;
        let session_token = issue_session_token(&self.config, &session.session_id)?;

        tracing::info!(
            session_id = %session.session_id,
            user_id = %session.user_id,
            "Dashboard session opened"
        );

        Ok(OpenSessionOutput {
            session,
            session_token,
        })
    }
}
