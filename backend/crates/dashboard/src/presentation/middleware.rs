//! Dashboard Middleware
//!
//! `resolve_session` runs on every route and attaches the signed-in
//! session (if any) to the request. `enforce_rate_limit` runs per route,
//! after it, so authenticated callers are bucketed by user id instead of
//! network origin.

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::{ConnectInfo, FromRequestParts, OptionalFromRequestParts, Request, State};
use axum::http::request::Parts;
use axum::middleware::Next;
use axum::response::Response;
use platform::client::CallerKey;
use platform::cookie::extract_cookie;
use platform::rate_limit::{AdmissionController, RateLimitConfig, RateLimitDecision};

use crate::application::CheckSessionUseCase;
use crate::domain::entities::Session;
use crate::domain::repository::{DocumentStore, SessionRepository};
use crate::error::DashboardError;
use crate::presentation::handlers::DashboardAppState;

/// Signed-in session stored in request extensions
///
/// As an extractor it rejects with 401 when nobody is signed in;
/// `Option<CurrentSession>` never rejects.
#[derive(Debug, Clone)]
pub struct CurrentSession(pub Session);

impl<S> FromRequestParts<S> for CurrentSession
where
    S: Send + Sync,
{
    type Rejection = DashboardError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<CurrentSession>()
            .cloned()
            .ok_or(DashboardError::SessionInvalid)
    }
}

impl<S> OptionalFromRequestParts<S> for CurrentSession
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        _state: &S,
    ) -> Result<Option<Self>, Self::Rejection> {
        Ok(parts.extensions.get::<CurrentSession>().cloned())
    }
}

/// Middleware that checks the session cookie but doesn't require it
pub async fn resolve_session<D, S>(
    State(state): State<DashboardAppState<D, S>>,
    mut req: Request,
    next: Next,
) -> Response
where
    D: DocumentStore + Send + Sync + 'static,
    S: SessionRepository + Send + Sync + 'static,
{
    let token = extract_cookie(req.headers(), &state.config.session_cookie_name);

    if let Some(token) = token {
        let use_case = CheckSessionUseCase::new(state.sessions.clone(), state.config.clone());
        match use_case.resolve(&token).await {
            Some(session) => {
                req.extensions_mut().insert(CurrentSession(session));
            }
            None => tracing::debug!("Session cookie present but invalid"),
        }
    }

    next.run(req).await
}

/// Admission policy bound to one route
#[derive(Debug, Clone)]
pub struct RouteLimit {
    pub route: &'static str,
    pub policy: RateLimitConfig,
    pub limiter: Arc<AdmissionController>,
}

impl RouteLimit {
    pub fn new(
        limiter: &Arc<AdmissionController>,
        route: &'static str,
        policy: &RateLimitConfig,
    ) -> Self {
        Self {
            route,
            policy: policy.clone(),
            limiter: Arc::clone(limiter),
        }
    }
}

/// Middleware that admits or rejects before the handler runs
pub async fn enforce_rate_limit(
    State(limit): State<RouteLimit>,
    req: Request,
    next: Next,
) -> Result<Response, DashboardError> {
    let direct_ip = req
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|info| info.0.ip());
    let user_id = req
        .extensions()
        .get::<CurrentSession>()
        .map(|current| current.0.user_id.as_str());

    let caller = CallerKey::identify(user_id, req.headers(), direct_ip);

    match limit
        .limiter
        .check(caller.as_str(), limit.route, &limit.policy)
    {
        RateLimitDecision::Admitted => Ok(next.run(req).await),
        RateLimitDecision::Rejected {
            retry_after_secs,
            limit: max_requests,
            ..
        } => {
            tracing::info!(
                route = limit.route,
                authenticated = caller.is_authenticated(),
                retry_after_secs = retry_after_secs,
                "Request rejected before handler"
            );
            Err(DashboardError::RateLimited {
                retry_after_secs,
                limit: max_requests,
                window_secs: limit.policy.window_secs(),
            })
        }
    }
}
