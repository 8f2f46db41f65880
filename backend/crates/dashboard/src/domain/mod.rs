//! Domain Layer
//!
//! Contains entities and repository traits.

pub mod entities;
pub mod repository;

// Re-exports
pub use entities::{Identity, ProjectSummary, Session, Submission, SummaryMetric, TaskRow};
pub use repository::{DocumentStore, SessionRepository};
