//! API Server Entry Point
//!
//! Application entry point and server initialization.
//! Uses `anyhow` for startup errors, but application-level
//! errors should use `kernel::error::AppError`.

use anyhow::Context;
use axum::{
    Router, http,
    http::{Method, header},
};
use base64::Engine;
use base64::engine::general_purpose;
use dashboard::domain::repository::SessionRepository;
use dashboard::{
    DashboardAppState, DashboardConfig, FormulaRefresher, InMemorySessionRepository,
    SheetsClient, SheetsConfig, dashboard_router,
};
use platform::rate_limit::AdmissionController;
use std::env;
use std::net::SocketAddr;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tower_http::cors::{AllowHeaders, AllowMethods, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

// Re-export unified error types for use in handlers
pub use kernel::error::{
    app_error::{AppError, AppResult},
    kind::ErrorKind,
};

/// How often expired sessions are dropped from memory
const SESSION_CLEANUP_INTERVAL: Duration = Duration::from_secs(15 * 60);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "api=info,dashboard=info,platform=info,tower_http=info".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Arc::new(load_dashboard_config()?);

    // Document store client
    let mut sheets_config = SheetsConfig::default();
    if let Ok(url) = env::var("DOCUMENT_STORE_URL") {
        sheets_config.base_url = url;
    }
    if let Ok(url) = env::var("USERINFO_URL") {
        sheets_config.userinfo_url = url;
    }
    tracing::info!(base_url = %sheets_config.base_url, "Document store configured");
    let store = Arc::new(SheetsClient::new(sheets_config)?);

    let formula_queue =
        FormulaRefresher::new(store.clone()).into_queue(config.formula_queue.clone());

    let limiter = Arc::new(AdmissionController::new());
    limiter.start_sweeper(config.limiter_sweep_interval, config.limiter_idle_windows);

    let sessions = Arc::new(InMemorySessionRepository::new());
    spawn_session_cleanup(sessions.clone());

    let state = DashboardAppState {
        store,
        sessions,
        config: config.clone(),
        limiter: limiter.clone(),
        formula_queue: formula_queue.clone(),
    };

    // CORS configuration
    let frontend_origins = env::var("FRONTEND_ORIGINS")
        .unwrap_or_else(|_| "http://localhost:40922,http://127.0.0.1:40922".to_string());

    let cors = cors_layer(&frontend_origins);

    // Build router
    let app = Router::new()
        .nest("/api", dashboard_router(state))
        .layer(TraceLayer::new_for_http())
        .layer(cors);

    // Start server
    let port: u16 = env_or("PORT", 31113)?;
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!("Listening on {}", addr);

    let listener = TcpListener::bind(addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    formula_queue.dispose();
    limiter.dispose();
    tracing::info!("Server stopped");

    Ok(())
}

/// Build the dashboard configuration from the environment
fn load_dashboard_config() -> anyhow::Result<DashboardConfig> {
    let mut config = if cfg!(debug_assertions) {
        DashboardConfig::development()
    } else {
        // In production, load secret from environment
        let secret_b64 =
            env::var("SESSION_SECRET").context("SESSION_SECRET must be set in production")?;
        let secret_bytes = Engine::decode(&general_purpose::STANDARD, secret_b64.trim())?;
        let secret: [u8; 32] = secret_bytes
            .try_into()
            .map_err(|_| anyhow::anyhow!("SESSION_SECRET must decode to 32 bytes"))?;
        DashboardConfig {
            session_secret: secret,
            ..DashboardConfig::default()
        }
    };

    if let Ok(emails) = env::var("ADMIN_EMAILS") {
        config.admin_emails = emails
            .split(',')
            .map(|email| email.trim().to_lowercase())
            .filter(|email| !email.is_empty())
            .collect();
    }

    let queue = &mut config.formula_queue;
    queue.min_delay = Duration::from_millis(env_or(
        "FORMULA_MIN_DELAY_MS",
        queue.min_delay.as_millis() as u64,
    )?);
    queue.guard = Duration::from_millis(env_or(
        "FORMULA_GUARD_MS",
        queue.guard.as_millis() as u64,
    )?);
    queue.flush_concurrency = env_or("FORMULA_FLUSH_CONCURRENCY", queue.flush_concurrency)?;

    tracing::info!(
        admins = config.admin_emails.len(),
        min_delay_ms = config.formula_queue.min_delay.as_millis() as u64,
        guard_ms = config.formula_queue.guard.as_millis() as u64,
        flush_concurrency = config.formula_queue.flush_concurrency,
        "Dashboard configuration loaded"
    );

    Ok(config)
}

/// CORS for the browser frontend, with the rate-limit headers readable
fn cors_layer(frontend_origins: &str) -> CorsLayer {
    let allowed_origins: Vec<http::HeaderValue> = frontend_origins
        .split(',')
        .filter_map(|origin| origin.trim().parse().ok())
        .collect();

    CorsLayer::new()
        .allow_origin(allowed_origins)
        .allow_methods(AllowMethods::list([
            Method::GET,
            Method::POST,
            Method::DELETE,
            Method::OPTIONS,
        ]))
        .allow_headers(AllowHeaders::list([
            header::CONTENT_TYPE,
            header::AUTHORIZATION,
            header::ACCEPT,
        ]))
        .expose_headers([
            header::RETRY_AFTER,
            http::HeaderName::from_static("ratelimit-policy"),
        ])
        .allow_credentials(true)
}

/// Parse an optional environment variable, falling back to `default`
fn env_or<T>(name: &str, default: T) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("{name} has an invalid value")),
        Err(_) => Ok(default),
    }
}

fn spawn_session_cleanup(sessions: Arc<InMemorySessionRepository>) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(SESSION_CLEANUP_INTERVAL);
        loop {
            ticker.tick().await;
            match sessions.cleanup_expired().await {
                Ok(0) => {}
                Ok(removed) => {
                    tracing::info!(sessions_deleted = removed, "Session cleanup completed");
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Session cleanup failed, continuing anyway");
                }
            }
        }
    });
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use axum::routing::get;
    use tower::ServiceExt;

    #[tokio::test]
    async fn test_cors_exposes_rate_limit_headers() {
        let app = Router::new()
            .route("/ping", get(|| async { StatusCode::TOO_MANY_REQUESTS }))
            .layer(cors_layer("http://localhost:40922"));

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/ping")
                    .header(header::ORIGIN, "http://localhost:40922")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        let exposed = response.headers()[header::ACCESS_CONTROL_EXPOSE_HEADERS]
            .to_str()
            .unwrap()
            .to_ascii_lowercase();
        assert!(exposed.contains("retry-after"));
        assert!(exposed.contains("ratelimit-policy"));
    }
}
