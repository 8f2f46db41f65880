//! Request Recompute Use Case
//!
//! Explicit "refresh the numbers" request. Goes through the same
//! coalescing queue as submissions, so repeated clicks collapse.

use crate::application::formula_refresher::FormulaQueue;
use crate::domain::entities::{Session, validate_project_id};
use crate::domain::repository::DocumentStore;
use crate::error::{DashboardError, DashboardResult};

/// Request recompute output
pub struct RequestRecomputeOutput {
    /// Keys waiting for the next flush, this one included
    pub queue_depth: usize,
}

/// Request recompute use case
pub struct RequestRecomputeUseCase<D>
where
    D: DocumentStore + Send + Sync + 'static,
{
    formula_queue: FormulaQueue<D>,
}

impl<D> RequestRecomputeUseCase<D>
where
    D: DocumentStore + Send + Sync + 'static,
{
    pub fn new(formula_queue: FormulaQueue<D>) -> Self {
        Self { formula_queue }
    }

    pub fn execute(
        &self,
        session: &Session,
        project_id: &str,
    ) -> DashboardResult<RequestRecomputeOutput> {
        validate_project_id(project_id).map_err(DashboardError::Validation)?;

        self.formula_queue
            .schedule(project_id, Some(session.access_token.clone()));

        tracing::debug!(
            project_id = %project_id,
            user_id = %session.user_id,
            "Recompute requested"
        );

        Ok(RequestRecomputeOutput {
            queue_depth: self.formula_queue.depth(),
        })
    }
}
