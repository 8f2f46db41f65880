//! Domain Entities

use chrono::{DateTime, Duration, Utc};
use kernel::id::{SessionId, SubmissionId};

// ============================================================================
// Identity
// ============================================================================

/// Who the document store says the access token belongs to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub user_id: String,
    pub email: String,
    pub name: Option<String>,
}

// ============================================================================
// Session
// ============================================================================

/// Signed-in dashboard session
///
/// Holds the document-store access token so later requests (and deferred
/// formula recomputes) can act on the user's behalf.
#[derive(Debug, Clone)]
pub struct Session {
    pub session_id: SessionId,
    pub user_id: String,
    pub email: String,
    pub name: Option<String>,
    pub access_token: String,
    /// Session expiration (Unix timestamp ms)
    pub expires_at_ms: i64,
    pub created_at: DateTime<Utc>,
}

impl Session {
    /// TTL is provided by the application layer (config), not hard-coded here.
    pub fn new(identity: Identity, access_token: String, ttl: Duration) -> Self {
        let now = Utc::now();
        Self {
            session_id: SessionId::new(),
            user_id: identity.user_id,
            email: identity.email,
            name: identity.name,
            access_token,
            expires_at_ms: (now + ttl).timestamp_millis(),
            created_at: now,
        }
    }

    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now().timestamp_millis())
    }

    pub fn is_expired_at(&self, now_ms: i64) -> bool {
        now_ms > self.expires_at_ms
    }

    pub fn remaining_ms(&self) -> i64 {
        (self.expires_at_ms - Utc::now().timestamp_millis()).max(0)
    }
}

// ============================================================================
// Project data
// ============================================================================

/// One row of a project's task sheet
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskRow {
    /// 1-based sheet row number
    pub row: u32,
    pub task_id: String,
    pub status: String,
    pub assignee: Option<String>,
    pub prompt: Option<String>,
}

impl TaskRow {
    /// Build from raw cell values; rows without a task id are ignored
    pub fn from_cells(row: u32, cells: &[String]) -> Option<Self> {
        let cell = |i: usize| {
            cells
                .get(i)
                .map(|c| c.trim())
                .filter(|c| !c.is_empty())
                .map(str::to_string)
        };

        Some(Self {
            row,
            task_id: cell(0)?,
            status: cell(1).unwrap_or_else(|| "open".to_string()),
            assignee: cell(2),
            prompt: cell(3),
        })
    }
}

/// Annotation answer appended to the submissions sheet
#[derive(Debug, Clone)]
pub struct Submission {
    pub submission_id: SubmissionId,
    pub project_id: String,
    pub task_id: String,
    pub submitted_by: String,
    pub answer: String,
    pub submitted_at: DateTime<Utc>,
}

impl Submission {
    pub fn new(project_id: String, task_id: String, submitted_by: String, answer: String) -> Self {
        Self {
            submission_id: SubmissionId::new(),
            project_id,
            task_id,
            submitted_by,
            answer,
            submitted_at: Utc::now(),
        }
    }

    /// Cell values in submissions-sheet column order
    pub fn to_cells(&self) -> Vec<String> {
        vec![
            self.submission_id.to_string(),
            self.task_id.clone(),
            self.submitted_by.clone(),
            self.answer.clone(),
            self.submitted_at.to_rfc3339(),
        ]
    }
}

/// Label/value pair read from the summary sheet
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SummaryMetric {
    pub label: String,
    pub value: String,
}

/// Derived project figures
///
/// `metrics` come from spreadsheet formulas and may be stale until the next
/// successful recompute.
#[derive(Debug, Clone)]
pub struct ProjectSummary {
    pub project_id: String,
    pub metrics: Vec<SummaryMetric>,
    pub last_recomputed_at_ms: Option<i64>,
    pub recompute_pending: bool,
}

/// Project ids are spreadsheet ids: URL-safe and bounded
pub fn validate_project_id(project_id: &str) -> Result<(), String> {
    if project_id.is_empty() || project_id.len() > 128 {
        return Err("Project id must be 1-128 characters".to_string());
    }
    if !project_id
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        return Err("Project id contains invalid characters".to_string());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identity() -> Identity {
        Identity {
            user_id: "108234".to_string(),
            email: "ann@example.com".to_string(),
            name: None,
        }
    }

    #[test]
    fn test_session_expiry() {
        let session = Session::new(identity(), "tok".to_string(), Duration::hours(1));
        assert!(!session.is_expired());
        assert!(session.remaining_ms() > 0);
        assert!(session.is_expired_at(session.expires_at_ms + 1));
        assert!(!session.is_expired_at(session.expires_at_ms));
    }

    #[test]
    fn test_task_row_from_cells() {
        let cells = vec![
            "task-7".to_string(),
            "".to_string(),
            "ann@example.com".to_string(),
        ];
        let row = TaskRow::from_cells(2, &cells).unwrap();
        assert_eq!(row.task_id, "task-7");
        assert_eq!(row.status, "open");
        assert_eq!(row.assignee.as_deref(), Some("ann@example.com"));
        assert!(row.prompt.is_none());

        assert!(TaskRow::from_cells(3, &["  ".to_string()]).is_none());
        assert!(TaskRow::from_cells(4, &[]).is_none());
    }

    #[test]
    fn test_submission_cells() {
        let submission = Submission::new(
            "sheet-1".to_string(),
            "task-7".to_string(),
            "ann@example.com".to_string(),
            "cat".to_string(),
        );
        let cells = submission.to_cells();
        assert_eq!(cells.len(), 5);
        assert_eq!(cells[1], "task-7");
        assert_eq!(cells[3], "cat");
    }

    #[test]
    fn test_validate_project_id() {
        assert!(validate_project_id("1BxiMVs0XRA5nFMdKvBdBZjgmUUqptlbs74OgvE2upms").is_ok());
        assert!(validate_project_id("").is_err());
        assert!(validate_project_id("../etc").is_err());
        assert!(validate_project_id(&"a".repeat(129)).is_err());
    }
}
