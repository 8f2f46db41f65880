//! Spreadsheet document store client
//!
//! Talks to a Sheets-v4-shaped REST API (`/v4/spreadsheets/{id}/values/{range}`)
//! and an OpenID userinfo endpoint. A project id is a spreadsheet id.

use std::sync::Arc;
use std::time::Duration;

use reqwest::{RequestBuilder, Response, StatusCode, Url};
use serde::Deserialize;
use serde_json::{Value, json};

use crate::domain::entities::{Identity, Submission, SummaryMetric, TaskRow};
use crate::domain::repository::DocumentStore;
use crate::error::{DashboardError, DashboardResult};

/// Longest upstream error body kept in error messages
const MAX_ERROR_BODY: usize = 300;

/// Document store endpoints and sheet layout
#[derive(Debug, Clone)]
pub struct SheetsConfig {
    pub base_url: String,
    pub userinfo_url: String,
    /// Task rows (first row of the range is the first task)
    pub tasks_range: String,
    /// Append target for submissions
    pub submissions_range: String,
    /// Label/value pairs shown as the project summary
    pub summary_range: String,
    /// Cells whose formulas are rewritten to force a recompute
    pub formula_range: String,
    pub timeout: Duration,
}

impl Default for SheetsConfig {
    fn default() -> Self {
        Self {
            base_url: "https://sheets.googleapis.com".to_string(),
            userinfo_url: "https://openidconnect.googleapis.com/v1/userinfo".to_string(),
            tasks_range: "Tasks!A2:D".to_string(),
            submissions_range: "Submissions!A:E".to_string(),
            summary_range: "Summary!A1:B50".to_string(),
            formula_range: "Summary!B1:B50".to_string(),
            timeout: Duration::from_secs(30),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct ValueRange {
    #[serde(default)]
    values: Vec<Vec<Value>>,
}

#[derive(Debug, Deserialize)]
struct UserInfo {
    sub: String,
    email: String,
    #[serde(default)]
    name: Option<String>,
}

/// HTTP client for the spreadsheet API
#[derive(Debug, Clone)]
pub struct SheetsClient {
    client: reqwest::Client,
    config: Arc<SheetsConfig>,
}

impl SheetsClient {
    pub fn new(config: SheetsConfig) -> DashboardResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| DashboardError::Internal(format!("HTTP client init failed: {e}")))?;
        Ok(Self::with_client(client, config))
    }

    pub fn with_client(client: reqwest::Client, config: SheetsConfig) -> Self {
        Self {
            client,
            config: Arc::new(config),
        }
    }

    pub fn config(&self) -> &SheetsConfig {
        &self.config
    }

    fn values_url(
        &self,
        spreadsheet_id: &str,
        range: &str,
        query: &[(&str, &str)],
    ) -> DashboardResult<Url> {
        let mut url = Url::parse(&self.config.base_url)
            .map_err(|e| DashboardError::Internal(format!("Invalid document store URL: {e}")))?;
        url.path_segments_mut()
            .map_err(|_| DashboardError::Internal("Document store URL cannot be a base".into()))?
            .pop_if_empty()
            .extend(["v4", "spreadsheets", spreadsheet_id, "values", range]);
        if !query.is_empty() {
            url.query_pairs_mut().extend_pairs(query);
        }
        Ok(url)
    }

    /// Send and map error statuses
    async fn send(&self, request: RequestBuilder) -> DashboardResult<Response> {
        let response = request.send().await?;
        let status = response.status();

        if status.is_success() {
            return Ok(response);
        }
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(DashboardError::UpstreamUnauthorized);
        }

        let mut message = response.text().await.unwrap_or_default();
        if message.len() > MAX_ERROR_BODY {
            let mut cut = MAX_ERROR_BODY;
            while !message.is_char_boundary(cut) {
                cut -= 1;
            }
            message.truncate(cut);
        }
        Err(DashboardError::Upstream {
            status: status.as_u16(),
            message,
        })
    }

    async fn get_raw(
        &self,
        access_token: &str,
        spreadsheet_id: &str,
        range: &str,
        render_option: &str,
    ) -> DashboardResult<Vec<Vec<Value>>> {
        let url = self.values_url(
            spreadsheet_id,
            range,
            &[("valueRenderOption", render_option)],
        )?;
        let response = self
            .send(self.client.get(url).bearer_auth(access_token))
            .await?;
        let body: ValueRange = response.json().await?;
        Ok(body.values)
    }

    async fn get_values(
        &self,
        access_token: &str,
        spreadsheet_id: &str,
        range: &str,
    ) -> DashboardResult<Vec<Vec<String>>> {
        let rows = self
            .get_raw(access_token, spreadsheet_id, range, "FORMATTED_VALUE")
            .await?;
        Ok(rows
            .into_iter()
            .map(|row| row.into_iter().map(cell_to_string).collect())
            .collect())
    }
}

fn cell_to_string(value: Value) -> String {
    match value {
        Value::String(s) => s,
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Row number of the first cell in an A1 range (`Tasks!A2:D` -> 2)
fn first_row(range: &str) -> u32 {
    let cells = range.rsplit_once('!').map_or(range, |(_, cells)| cells);
    cells
        .trim_start_matches(|c: char| c.is_ascii_alphabetic() || c == '$')
        .split(|c: char| !c.is_ascii_digit())
        .next()
        .and_then(|digits| digits.parse().ok())
        .unwrap_or(1)
}

impl DocumentStore for SheetsClient {
    async fn whoami(&self, access_token: &str) -> DashboardResult<Identity> {
        let response = self
            .send(
                self.client
                    .get(&self.config.userinfo_url)
                    .bearer_auth(access_token),
            )
            .await?;
        let info: UserInfo = response.json().await?;

        Ok(Identity {
            user_id: info.sub,
            email: info.email.trim().to_ascii_lowercase(),
            name: info.name,
        })
    }

    async fn list_tasks(
        &self,
        access_token: &str,
        project_id: &str,
    ) -> DashboardResult<Vec<TaskRow>> {
        let range = &self.config.tasks_range;
        let start = first_row(range);
        let rows = self.get_values(access_token, project_id, range).await?;

        Ok(rows
            .iter()
            .enumerate()
            .filter_map(|(i, cells)| TaskRow::from_cells(start + i as u32, cells))
            .collect())
    }

    async fn append_submission(
        &self,
        access_token: &str,
        submission: &Submission,
    ) -> DashboardResult<()> {
        let range = format!("{}:append", self.config.submissions_range);
        // RAW keeps user answers from being parsed as formulas
        let url = self.values_url(
            &submission.project_id,
            &range,
            &[
                ("valueInputOption", "RAW"),
                ("insertDataOption", "INSERT_ROWS"),
            ],
        )?;
        let body = json!({ "values": [submission.to_cells()] });

        self.send(
            self.client
                .post(url)
                .bearer_auth(access_token)
                .json(&body),
        )
        .await?;
        Ok(())
    }

    async fn read_summary(
        &self,
        access_token: &str,
        project_id: &str,
    ) -> DashboardResult<Vec<SummaryMetric>> {
        let rows = self
            .get_values(access_token, project_id, &self.config.summary_range)
            .await?;

        Ok(rows
            .into_iter()
            .filter_map(|row| {
                let mut cells = row.into_iter();
                let label = cells.next()?.trim().to_string();
                if label.is_empty() {
                    return None;
                }
                let value = cells.next().unwrap_or_default();
                Some(SummaryMetric { label, value })
            })
            .collect())
    }

    async fn refresh_formulas(&self, access_token: &str, project_id: &str) -> DashboardResult<()> {
        let range = &self.config.formula_range;
        let formulas = self
            .get_raw(access_token, project_id, range, "FORMULA")
            .await?;

        if formulas.is_empty() {
            tracing::debug!(project_id = %project_id, "No formulas to refresh");
            return Ok(());
        }

        // Writing the formulas back with USER_ENTERED makes the sheet re-evaluate them
        let url = self.values_url(
            project_id,
            range,
            &[("valueInputOption", "USER_ENTERED")],
        )?;
        let body = json!({
            "range": range,
            "majorDimension": "ROWS",
            "values": formulas,
        });

        self.send(self.client.put(url).bearer_auth(access_token).json(&body))
            .await?;

        tracing::debug!(project_id = %project_id, rows = formulas.len(), "Formulas rewritten");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Bytes;
    use axum::extract::{Path, Query, State};
    use axum::http::HeaderMap;
    use axum::routing::get;
    use axum::{Json, Router};
    use std::collections::HashMap;
    use std::sync::Mutex;
    use tokio::net::TcpListener;

    #[derive(Debug, Clone)]
    struct Recorded {
        method: String,
        range: String,
        query: HashMap<String, String>,
        body: Option<Value>,
    }

    #[derive(Clone, Default)]
    struct FakeSheets {
        calls: Arc<Mutex<Vec<Recorded>>>,
    }

    fn authorized(headers: &HeaderMap) -> bool {
        headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .is_some_and(|v| v == "Bearer good-token")
    }

    async fn values_handler(
        State(fake): State<FakeSheets>,
        method: axum::http::Method,
        headers: HeaderMap,
        Path((_id, range)): Path<(String, String)>,
        Query(query): Query<HashMap<String, String>>,
        body: Bytes,
    ) -> (StatusCode, Json<Value>) {
        if !authorized(&headers) {
            return (StatusCode::UNAUTHORIZED, Json(json!({"error": "bad token"})));
        }
        fake.calls.lock().unwrap().push(Recorded {
            method: method.to_string(),
            range: range.clone(),
            query: query.clone(),
            body: serde_json::from_slice(&body).ok(),
        });

        let render = query.get("valueRenderOption").map(String::as_str);
        let values = match (range.as_str(), render) {
            ("Tasks!A2:D", _) => json!([
                ["task-1", "open"],
                [],
                ["task-3", "done", "ann@example.com", "Label the cat"]
            ]),
            ("Summary!A1:B50", _) => {
                json!([["Submitted", "12"], ["", "ignored"], ["Payout", "$3.60"]])
            }
            ("Summary!B1:B50", Some("FORMULA")) => json!([["=COUNTA(Submissions!A:A)"], [42]]),
            ("Broken!A1:B2", _) => {
                return (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({"error": "backend"})),
                );
            }
            _ => json!([]),
        };
        (StatusCode::OK, Json(json!({ "range": range, "values": values })))
    }

    async fn userinfo_handler(headers: HeaderMap) -> (StatusCode, Json<Value>) {
        if !authorized(&headers) {
            return (StatusCode::UNAUTHORIZED, Json(json!({})));
        }
        (
            StatusCode::OK,
            Json(json!({"sub": "108234", "email": "Ann@Example.com", "name": "Ann"})),
        )
    }

    async fn start_fake() -> (SheetsClient, FakeSheets) {
        let fake = FakeSheets::default();
        let app = Router::new()
            .route(
                "/v4/spreadsheets/{id}/values/{range}",
                get(values_handler).post(values_handler).put(values_handler),
            )
            .route("/userinfo", get(userinfo_handler))
            .with_state(fake.clone());

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        let config = SheetsConfig {
            base_url: format!("http://{addr}"),
            userinfo_url: format!("http://{addr}/userinfo"),
            ..Default::default()
        };
        (SheetsClient::new(config).unwrap(), fake)
    }

    #[test]
    fn test_first_row() {
        assert_eq!(first_row("Tasks!A2:D"), 2);
        assert_eq!(first_row("Sheet 1!$B$10:C"), 10);
        assert_eq!(first_row("Submissions!A:E"), 1);
        assert_eq!(first_row("A5"), 5);
    }

    #[test]
    fn test_values_url_keeps_range_readable() {
        let client = SheetsClient::new(SheetsConfig::default()).unwrap();
        let url = client
            .values_url("abc", "Summary!B1:B50", &[("valueInputOption", "USER_ENTERED")])
            .unwrap();
        assert_eq!(
            url.as_str(),
            "https://sheets.googleapis.com/v4/spreadsheets/abc/values/Summary!B1:B50?valueInputOption=USER_ENTERED"
        );
    }

    #[tokio::test]
    async fn test_whoami() {
        let (client, _) = start_fake().await;
        let identity = client.whoami("good-token").await.unwrap();
        assert_eq!(identity.user_id, "108234");
        assert_eq!(identity.email, "ann@example.com");

        let err = client.whoami("bad-token").await.unwrap_err();
        assert!(matches!(err, DashboardError::UpstreamUnauthorized));
    }

    #[tokio::test]
    async fn test_list_tasks_numbers_rows() {
        let (client, _) = start_fake().await;
        let tasks = client.list_tasks("good-token", "sheet-1").await.unwrap();
        assert_eq!(tasks.len(), 2);
        assert_eq!(tasks[0].row, 2);
        assert_eq!(tasks[1].row, 4);
        assert_eq!(tasks[1].prompt.as_deref(), Some("Label the cat"));
    }

    #[tokio::test]
    async fn test_read_summary_skips_blank_labels() {
        let (client, _) = start_fake().await;
        let metrics = client.read_summary("good-token", "sheet-1").await.unwrap();
        assert_eq!(
            metrics,
            vec![
                SummaryMetric {
                    label: "Submitted".to_string(),
                    value: "12".to_string()
                },
                SummaryMetric {
                    label: "Payout".to_string(),
                    value: "$3.60".to_string()
                },
            ]
        );
    }

    #[tokio::test]
    async fn test_append_submission_uses_raw_input() {
        let (client, fake) = start_fake().await;
        let submission = Submission::new(
            "sheet-1".to_string(),
            "task-1".to_string(),
            "ann@example.com".to_string(),
            "=HYPERLINK(\"x\")".to_string(),
        );
        client
            .append_submission("good-token", &submission)
            .await
            .unwrap();

        let calls = fake.calls.lock().unwrap().clone();
        let call = calls.last().unwrap();
        assert_eq!(call.method, "POST");
        assert_eq!(call.range, "Submissions!A:E:append");
        assert_eq!(call.query["valueInputOption"], "RAW");
        let body = call.body.as_ref().unwrap();
        assert_eq!(body["values"][0][1], "task-1");
    }

    #[tokio::test]
    async fn test_refresh_formulas_rewrites_with_user_entered() {
        let (client, fake) = start_fake().await;
        client
            .refresh_formulas("good-token", "sheet-1")
            .await
            .unwrap();

        let calls = fake.calls.lock().unwrap().clone();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].method, "GET");
        assert_eq!(calls[0].query["valueRenderOption"], "FORMULA");
        assert_eq!(calls[1].method, "PUT");
        assert_eq!(calls[1].query["valueInputOption"], "USER_ENTERED");
        let body = calls[1].body.as_ref().unwrap();
        assert_eq!(body["values"][0][0], "=COUNTA(Submissions!A:A)");
        assert_eq!(body["values"][1][0], 42);
    }

    #[tokio::test]
    async fn test_upstream_error_is_mapped() {
        let (client, _) = start_fake().await;
        let err = client
            .get_values("good-token", "sheet-1", "Broken!A1:B2")
            .await
            .unwrap_err();
        assert!(matches!(err, DashboardError::Upstream { status: 500, .. }));

        let err = client
            .refresh_formulas("bad-token", "sheet-1")
            .await
            .unwrap_err();
        assert!(matches!(err, DashboardError::UpstreamUnauthorized));
    }
}
