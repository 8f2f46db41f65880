//! Repository Traits
//!
//! Interfaces for the document store and session persistence.
//! Implementations live in the infrastructure layer.

use crate::domain::entities::{Identity, Session, Submission, SummaryMetric, TaskRow};
use crate::error::DashboardResult;
use kernel::id::SessionId;

/// Spreadsheet-and-drive document store
///
/// Every call acts with the signed-in user's access token.
#[trait_variant::make(DocumentStore: Send)]
pub trait LocalDocumentStore {
    /// Resolve the identity behind an access token
    async fn whoami(&self, access_token: &str) -> DashboardResult<Identity>;

    async fn list_tasks(
        &self,
        access_token: &str,
        project_id: &str,
    ) -> DashboardResult<Vec<TaskRow>>;

    async fn append_submission(
        &self,
        access_token: &str,
        submission: &Submission,
    ) -> DashboardResult<()>;

    async fn read_summary(
        &self,
        access_token: &str,
        project_id: &str,
    ) -> DashboardResult<Vec<SummaryMetric>>;

    /// Force the project's derived formulas to recompute (slow)
    async fn refresh_formulas(&self, access_token: &str, project_id: &str) -> DashboardResult<()>;
}

/// Session repository trait
#[trait_variant::make(SessionRepository: Send)]
pub trait LocalSessionRepository {
    async fn create(&self, session: &Session) -> DashboardResult<()>;

    async fn find_by_id(&self, session_id: &SessionId) -> DashboardResult<Option<Session>>;

    async fn delete(&self, session_id: &SessionId) -> DashboardResult<()>;

    /// Clean up expired sessions
    async fn cleanup_expired(&self) -> DashboardResult<u64>;
}
