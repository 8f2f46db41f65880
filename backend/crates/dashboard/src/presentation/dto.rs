//! API DTOs (Data Transfer Objects)

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::application::QueueStatusOutput;
use crate::domain::entities::{ProjectSummary, Session, SummaryMetric, TaskRow};

// ============================================================================
// Session
// ============================================================================

/// Open session request
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OpenSessionRequest {
    /// Document-store OAuth access token
    pub access_token: String,
}

/// Session status response
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionStatusResponse {
    pub authenticated: bool,
    pub user_id: Option<String>,
    pub email: Option<String>,
    pub name: Option<String>,
    pub is_admin: bool,
    pub expires_at_ms: Option<i64>,
}

impl SessionStatusResponse {
    pub fn signed_in(session: &Session, is_admin: bool) -> Self {
        Self {
            authenticated: true,
            user_id: Some(session.user_id.clone()),
            email: Some(session.email.clone()),
            name: session.name.clone(),
            is_admin,
            expires_at_ms: Some(session.expires_at_ms),
        }
    }

    pub fn signed_out() -> Self {
        Self {
            authenticated: false,
            user_id: None,
            email: None,
            name: None,
            is_admin: false,
            expires_at_ms: None,
        }
    }
}

// ============================================================================
// Tasks
// ============================================================================

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskDto {
    pub row: u32,
    pub task_id: String,
    pub status: String,
    pub assignee: Option<String>,
    pub prompt: Option<String>,
}

impl From<TaskRow> for TaskDto {
    fn from(task: TaskRow) -> Self {
        Self {
            row: task.row,
            task_id: task.task_id,
            status: task.status,
            assignee: task.assignee,
            prompt: task.prompt,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskListResponse {
    pub project_id: String,
    pub tasks: Vec<TaskDto>,
}

// ============================================================================
// Submissions
// ============================================================================

/// Submit annotation request
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitAnnotationRequest {
    pub task_id: String,
    pub answer: String,
}

/// Accepted submission
///
/// The summary refresh happens later; re-read the summary to observe it.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionAcceptedResponse {
    pub submission_id: String,
    pub recompute_scheduled: bool,
}

// ============================================================================
// Summary / recompute
// ============================================================================

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricDto {
    pub label: String,
    pub value: String,
}

impl From<SummaryMetric> for MetricDto {
    fn from(metric: SummaryMetric) -> Self {
        Self {
            label: metric.label,
            value: metric.value,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectSummaryResponse {
    pub project_id: String,
    pub metrics: Vec<MetricDto>,
    pub last_recomputed_at_ms: Option<i64>,
    pub recompute_pending: bool,
}

impl From<ProjectSummary> for ProjectSummaryResponse {
    fn from(summary: ProjectSummary) -> Self {
        Self {
            project_id: summary.project_id,
            metrics: summary.metrics.into_iter().map(MetricDto::from).collect(),
            last_recomputed_at_ms: summary.last_recomputed_at_ms,
            recompute_pending: summary.recompute_pending,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecomputeAcceptedResponse {
    pub project_id: String,
    pub queue_depth: usize,
}

// ============================================================================
// Admin
// ============================================================================

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingEntryDto {
    pub key: String,
    pub enqueued_at_ms: i64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueStatsDto {
    pub scheduled: u64,
    pub completed: u64,
    pub failed: u64,
    pub skipped: u64,
    pub deferred: u64,
    pub flushes: u64,
}

/// Formula queue introspection
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FormulaQueueStatusResponse {
    pub depth: usize,
    pub armed: bool,
    pub flushing: bool,
    pub pending: Vec<PendingEntryDto>,
    pub last_completed: HashMap<String, i64>,
    pub stats: QueueStatsDto,
    pub limiter_buckets: usize,
}

impl From<QueueStatusOutput> for FormulaQueueStatusResponse {
    fn from(output: QueueStatusOutput) -> Self {
        let stats = output.stats;
        Self {
            depth: output.depth,
            armed: output.armed,
            flushing: output.flushing,
            pending: output
                .pending
                .into_iter()
                .map(|p| PendingEntryDto {
                    key: p.key,
                    enqueued_at_ms: p.enqueued_at_ms,
                })
                .collect(),
            last_completed: output.last_completed,
            stats: QueueStatsDto {
                scheduled: stats.scheduled,
                completed: stats.completed,
                failed: stats.failed,
                skipped: stats.skipped,
                deferred: stats.deferred,
                flushes: stats.flushes,
            },
            limiter_buckets: output.limiter_buckets,
        }
    }
}
