//! Dashboard Router

use axum::{
    Router,
    middleware::from_fn_with_state,
    routing::{get, post},
};

use platform::rate_limit::RateLimitConfig;

use crate::domain::repository::{DocumentStore, SessionRepository};
use crate::presentation::handlers::{self, DashboardAppState};
use crate::presentation::middleware::{RouteLimit, enforce_rate_limit, resolve_session};

/// Create the dashboard router for any store/session implementation
///
/// Every route passes its own admission check before the handler runs.
pub fn dashboard_router<D, S>(state: DashboardAppState<D, S>) -> Router
where
    D: DocumentStore + Send + Sync + 'static,
    S: SessionRepository + Send + Sync + 'static,
{
    let limits = &state.config.rate_limits;
    let limiter = &state.limiter;
    let limit = |route: &'static str, policy: &RateLimitConfig| {
        from_fn_with_state(RouteLimit::new(limiter, route, policy), enforce_rate_limit)
    };

    Router::new()
        .route(
            "/session",
            post(handlers::open_session::<D, S>)
                .layer(limit("session.open", &limits.open_session))
                .merge(
                    get(handlers::session_status::<D, S>)
                        .delete(handlers::close_session::<D, S>)
                        .layer(limit("session.read", &limits.read)),
                ),
        )
        .route(
            "/projects/{project_id}/tasks",
            get(handlers::list_tasks::<D, S>).layer(limit("projects.tasks", &limits.read)),
        )
        .route(
            "/projects/{project_id}/submissions",
            post(handlers::submit_annotation::<D, S>)
                .layer(limit("projects.submissions", &limits.submit)),
        )
        .route(
            "/projects/{project_id}/summary",
            get(handlers::read_summary::<D, S>).layer(limit("projects.summary", &limits.read)),
        )
        .route(
            "/projects/{project_id}/recompute",
            post(handlers::request_recompute::<D, S>)
                .layer(limit("projects.recompute", &limits.recompute)),
        )
        .route(
            "/admin/formula-queue",
            get(handlers::formula_queue_status::<D, S>)
                .layer(limit("admin.formula_queue", &limits.read)),
        )
        .layer(from_fn_with_state(state.clone(), resolve_session::<D, S>))
        .with_state(state)
}
