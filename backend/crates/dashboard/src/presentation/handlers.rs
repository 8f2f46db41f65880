//! HTTP Handlers

use axum::Json;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::IntoResponse;
use std::sync::Arc;

use platform::cookie::extract_cookie;
use platform::rate_limit::AdmissionController;

use crate::application::{
    CloseSessionUseCase, DashboardConfig, FormulaQueue, ListTasksUseCase, OpenSessionUseCase,
    QueueStatusUseCase, ReadSummaryUseCase, RequestRecomputeUseCase, SubmitAnnotationInput,
    SubmitAnnotationUseCase,
};
use crate::domain::repository::{DocumentStore, SessionRepository};
use crate::error::{DashboardError, DashboardResult};
use crate::presentation::dto::{
    FormulaQueueStatusResponse, OpenSessionRequest, ProjectSummaryResponse,
    RecomputeAcceptedResponse, SessionStatusResponse, SubmissionAcceptedResponse,
    SubmitAnnotationRequest, TaskDto, TaskListResponse,
};
use crate::presentation::middleware::CurrentSession;

/// Shared state for dashboard handlers
pub struct DashboardAppState<D, S>
where
    D: DocumentStore + Send + Sync + 'static,
    S: SessionRepository + Send + Sync + 'static,
{
    pub store: Arc<D>,
    pub sessions: Arc<S>,
    pub config: Arc<DashboardConfig>,
    pub limiter: Arc<AdmissionController>,
    pub formula_queue: FormulaQueue<D>,
}

impl<D, S> Clone for DashboardAppState<D, S>
where
    D: DocumentStore + Send + Sync + 'static,
    S: SessionRepository + Send + Sync + 'static,
{
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            sessions: self.sessions.clone(),
            config: self.config.clone(),
            limiter: self.limiter.clone(),
            formula_queue: self.formula_queue.clone(),
        }
    }
}

// ============================================================================
// Session
// ============================================================================

/// POST /api/session
pub async fn open_session<D, S>(
    State(state): State<DashboardAppState<D, S>>,
    Json(req): Json<OpenSessionRequest>,
) -> DashboardResult<impl IntoResponse>
where
    D: DocumentStore + Send + Sync + 'static,
    S: SessionRepository + Send + Sync + 'static,
{
    let use_case = OpenSessionUseCase::new(
        state.store.clone(),
        state.sessions.clone(),
        state.config.clone(),
    );
    let output = use_case.execute(&req.access_token).await?;

    let cookie = state
        .config
        .session_cookie()
        .set_cookie_header(&output.session_token)
        .map_err(|e| DashboardError::Internal(format!("Invalid cookie header: {e}")))?;
    let is_admin = state.config.is_admin(&output.session.email);

    Ok((
        StatusCode::CREATED,
        [(header::SET_COOKIE, cookie)],
        Json(SessionStatusResponse::signed_in(&output.session, is_admin)),
    ))
}

/// GET /api/session
pub async fn session_status<D, S>(
    State(state): State<DashboardAppState<D, S>>,
    current: Option<CurrentSession>,
) -> Json<SessionStatusResponse>
where
    D: DocumentStore + Send + Sync + 'static,
    S: SessionRepository + Send + Sync + 'static,
{
    match current {
        Some(CurrentSession(session)) => {
            let is_admin = state.config.is_admin(&session.email);
            Json(SessionStatusResponse::signed_in(&session, is_admin))
        }
        None => Json(SessionStatusResponse::signed_out()),
    }
}

/// DELETE /api/session
pub async fn close_session<D, S>(
    State(state): State<DashboardAppState<D, S>>,
    headers: HeaderMap,
) -> DashboardResult<impl IntoResponse>
where
    D: DocumentStore + Send + Sync + 'static,
    S: SessionRepository + Send + Sync + 'static,
{
    if let Some(token) = extract_cookie(&headers, &state.config.session_cookie_name) {
        let use_case = CloseSessionUseCase::new(state.sessions.clone(), state.config.clone());
        // Clearing the cookie is enough for forged or stale tokens
        if let Err(e) = use_case.execute(&token).await {
            tracing::debug!(error = %e, "Session close ignored");
        }
    }

    let cookie = state
        .config
        .session_cookie()
        .delete_cookie_header()
        .map_err(|e| DashboardError::Internal(format!("Invalid cookie header: {e}")))?;

    Ok((StatusCode::NO_CONTENT, [(header::SET_COOKIE, cookie)]))
}

// ============================================================================
// Projects
// ============================================================================

/// GET /api/projects/{project_id}/tasks
pub async fn list_tasks<D, S>(
    State(state): State<DashboardAppState<D, S>>,
    CurrentSession(session): CurrentSession,
    Path(project_id): Path<String>,
) -> DashboardResult<Json<TaskListResponse>>
where
    D: DocumentStore + Send + Sync + 'static,
    S: SessionRepository + Send + Sync + 'static,
{
    let use_case = ListTasksUseCase::new(state.store.clone());
    let tasks = use_case.execute(&session, &project_id).await?;

    Ok(Json(TaskListResponse {
        project_id,
        tasks: tasks.into_iter().map(TaskDto::from).collect(),
    }))
}

/// POST /api/projects/{project_id}/submissions
pub async fn submit_annotation<D, S>(
    State(state): State<DashboardAppState<D, S>>,
    CurrentSession(session): CurrentSession,
    Path(project_id): Path<String>,
    Json(req): Json<SubmitAnnotationRequest>,
) -> DashboardResult<impl IntoResponse>
where
    D: DocumentStore + Send + Sync + 'static,
    S: SessionRepository + Send + Sync + 'static,
{
    let use_case = SubmitAnnotationUseCase::new(state.store.clone(), state.formula_queue.clone());

    let input = SubmitAnnotationInput {
        project_id,
        task_id: req.task_id,
        answer: req.answer,
    };

    let output = use_case.execute(&session, input).await?;

    Ok((
        StatusCode::ACCEPTED,
        Json(SubmissionAcceptedResponse {
            submission_id: output.submission_id.to_string(),
            recompute_scheduled: true,
        }),
    ))
}

/// GET /api/projects/{project_id}/summary
pub async fn read_summary<D, S>(
    State(state): State<DashboardAppState<D, S>>,
    CurrentSession(session): CurrentSession,
    Path(project_id): Path<String>,
) -> DashboardResult<Json<ProjectSummaryResponse>>
where
    D: DocumentStore + Send + Sync + 'static,
    S: SessionRepository + Send + Sync + 'static,
{
    let use_case = ReadSummaryUseCase::new(state.store.clone(), state.formula_queue.clone());
    let summary = use_case.execute(&session, &project_id).await?;

    Ok(Json(summary.into()))
}

/// POST /api/projects/{project_id}/recompute
pub async fn request_recompute<D, S>(
    State(state): State<DashboardAppState<D, S>>,
    CurrentSession(session): CurrentSession,
    Path(project_id): Path<String>,
) -> DashboardResult<impl IntoResponse>
where
    D: DocumentStore + Send + Sync + 'static,
    S: SessionRepository + Send + Sync + 'static,
{
    let use_case = RequestRecomputeUseCase::new(state.formula_queue.clone());
    let output = use_case.execute(&session, &project_id)?;

    Ok((
        StatusCode::ACCEPTED,
        Json(RecomputeAcceptedResponse {
            project_id,
            queue_depth: output.queue_depth,
        }),
    ))
}

// ============================================================================
// Admin
// ============================================================================

/// GET /api/admin/formula-queue
pub async fn formula_queue_status<D, S>(
    State(state): State<DashboardAppState<D, S>>,
    CurrentSession(session): CurrentSession,
) -> DashboardResult<Json<FormulaQueueStatusResponse>>
where
    D: DocumentStore + Send + Sync + 'static,
    S: SessionRepository + Send + Sync + 'static,
{
    let use_case = QueueStatusUseCase::new(state.formula_queue.clone(), state.config.clone());
    let output = use_case.execute(&session, state.limiter.bucket_count())?;

    Ok(Json(output.into()))
}
