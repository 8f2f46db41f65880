//! Read Summary Use Case
//!
//! Reads the derived project figures. They may lag behind recent
//! submissions until the deferred recompute has run.

use std::sync::Arc;

use crate::application::formula_refresher::FormulaQueue;
use crate::domain::entities::{ProjectSummary, Session, validate_project_id};
use crate::domain::repository::DocumentStore;
use crate::error::{DashboardError, DashboardResult};

/// Read summary use case
pub struct ReadSummaryUseCase<D>
where
    D: DocumentStore + Send + Sync + 'static,
{
    store: Arc<D>,
    formula_queue: FormulaQueue<D>,
}

impl<D> ReadSummaryUseCase<D>
where
    D: DocumentStore + Send + Sync + 'static,
{
    pub fn new(store: Arc<D>, formula_queue: FormulaQueue<D>) -> Self {
        Self {
            store,
            formula_queue,
        }
    }

    pub async fn execute(
        &self,
        session: &Session,
        project_id: &str,
    ) -> DashboardResult<ProjectSummary> {
        validate_project_id(project_id).map_err(DashboardError::Validation)?;

        let metrics = self
            .store
            .read_summary(&session.access_token, project_id)
            .await?;

        let last_recomputed_at_ms = self
            .formula_queue
            .last_completed()
            .get(project_id)
            .copied();
        let recompute_pending = self
            .formula_queue
            .pending()
            .iter()
            .any(|entry| entry.key == project_id);

        Ok(ProjectSummary {
            project_id: project_id.to_string(),
            metrics,
            last_recomputed_at_ms,
            recompute_pending,
        })
    }
}
