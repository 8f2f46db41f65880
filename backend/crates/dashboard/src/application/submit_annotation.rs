//! Submit Annotation Use Case
//!
//! Appends an annotation to the project's submissions sheet and schedules
//! a deferred formula recompute instead of recomputing inline.

use std::sync::Arc;

use kernel::id::SubmissionId;

use crate::application::formula_refresher::FormulaQueue;
use crate::domain::entities::{Session, Submission, validate_project_id};
use crate::domain::repository::DocumentStore;
use crate::error::{DashboardError, DashboardResult};

const MAX_TASK_ID_LEN: usize = 128;
const MAX_ANSWER_LEN: usize = 10_000;

/// Submit annotation input
pub struct SubmitAnnotationInput {
    pub project_id: String,
    pub task_id: String,
    pub answer: String,
}

/// Submit annotation output
pub struct SubmitAnnotationOutput {
    pub submission_id: SubmissionId,
}

/// Submit annotation use case
pub struct SubmitAnnotationUseCase<D>
where
    D: DocumentStore + Send + Sync + 'static,
{
    store: Arc<D>,
    formula_queue: FormulaQueue<D>,
}

impl<D> SubmitAnnotationUseCase<D>
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
        input: SubmitAnnotationInput,
    ) -> DashboardResult<SubmitAnnotationOutput> {
        validate_project_id(&input.project_id).map_err(DashboardError::Validation)?;

        let task_id = input.task_id.trim();
        if task_id.is_empty() || task_id.len() > MAX_TASK_ID_LEN {
            return Err(DashboardError::Validation(format!(
                "Task id must be 1-{MAX_TASK_ID_LEN} characters"
            )));
        }
        if input.answer.trim().is_empty() {
            return Err(DashboardError::Validation("Answer is required".to_string()));
        }
        if input.answer.len() > MAX_ANSWER_LEN {
            return Err(DashboardError::Validation(format!(
                "Answer exceeds {MAX_ANSWER_LEN} bytes"
            )));
        }

        let submission = Submission::new(
            input.project_id,
            task_id.to_string(),
            session.email.clone(),
            input.answer,
        );

        self.store
            .append_submission(&session.access_token, &submission)
            .await?;

        // Summary formulas are stale now; refresh later, coalesced per project
        self.formula_queue.schedule(
            submission.project_id.clone(),
            Some(session.access_token.clone()),
        );

        tracing::info!(
            submission_id = %submission.submission_id,
            project_id = %submission.project_id,
            task_id = %submission.task_id,
            "Annotation submitted"
        );

        Ok(SubmitAnnotationOutput {
            submission_id: submission.submission_id,
        })
    }
}
