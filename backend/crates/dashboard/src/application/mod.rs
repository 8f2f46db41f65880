//! Application Layer
//!
//! Use cases and application services.

pub mod check_session;
pub mod close_session;
pub mod config;
pub mod formula_refresher;
pub mod list_tasks;
pub mod open_session;
pub mod queue_status;
pub mod read_summary;
pub mod request_recompute;
pub mod session_token;
pub mod submit_annotation;

// Re-exports
pub use check_session::CheckSessionUseCase;
pub use close_session::CloseSessionUseCase;
pub use config::{DashboardConfig, RateLimits};
pub use formula_refresher::{FormulaQueue, FormulaRefresher};
pub use list_tasks::ListTasksUseCase;
pub use open_session::{OpenSessionOutput, OpenSessionUseCase};
pub use queue_status::{QueueStatusOutput, QueueStatusUseCase};
pub use read_summary::ReadSummaryUseCase;
pub use request_recompute::{RequestRecomputeOutput, RequestRecomputeUseCase};
pub use submit_annotation::{
    SubmitAnnotationInput, SubmitAnnotationOutput, SubmitAnnotationUseCase,
};
