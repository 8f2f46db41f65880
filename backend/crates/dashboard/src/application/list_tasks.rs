//! List Tasks Use Case

use std::sync::Arc;

use crate::domain::entities::{Session, TaskRow, validate_project_id};
use crate::domain::repository::DocumentStore;
use crate::error::{DashboardError, DashboardResult};

/// List tasks use case
pub struct ListTasksUseCase<D>
where
    D: DocumentStore + Send + Sync + 'static,
{
    store: Arc<D>,
}

impl<D> ListTasksUseCase<D>
where
    D: DocumentStore + Send + Sync + 'static,
{
    pub fn new(store: Arc<D>) -> Self {
        Self { store }
    }

    pub async fn execute(
        &self,
        session: &Session,
        project_id: &str,
    ) -> DashboardResult<Vec<TaskRow>> {
        validate_project_id(project_id).map_err(DashboardError::Validation)?;
        self.store.list_tasks(&session.access_token, project_id).await
    }
}
