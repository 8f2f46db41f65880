//! Dashboard Backend Module
//!
//! Clean Architecture structure:
//! - `domain/` - Entities, document store and session traits
//! - `application/` - Use cases and the formula-refresh adapter
//! - `infra/` - Spreadsheet HTTP client, in-memory sessions
//! - `presentation/` - HTTP handlers, DTOs, middleware, router
//!
//! ## Request flow
//! - Every route resolves the session cookie, then passes a per-route
//!   admission check (sliding window per caller) before any business logic
//! - Writes that invalidate spreadsheet formulas schedule a deferred,
//!   coalesced recompute instead of recomputing inline
//! - Derived figures are eventually consistent; a failed recompute only
//!   leaves them stale until the next successful cycle

pub mod application;
pub mod domain;
pub mod error;
pub mod infra;
pub mod presentation;


// Re-exports for convenience
pub use application::config::DashboardConfig;
pub use application::{FormulaQueue, FormulaRefresher};
pub use error::{DashboardError, DashboardResult};
pub use infra::{InMemorySessionRepository, SheetsClient, SheetsConfig};
pub use presentation::handlers::DashboardAppState;
pub use presentation::router::dashboard_router;

// Re-export kernel error types for unified error handling
pub use kernel::error::{
    app_error::{AppError, AppResult},
    kind::ErrorKind,
};
