//! Delivery of merged statuses to the dashboard.
//!
//! Reports are best-effort per cycle: a failed send is logged by the
//! orchestrator and the next cycle simply sends the next snapshot. The
//! dry-run sink prints the exact request envelope instead of POSTing it.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use isahc::config::{Configurable, RedirectPolicy};
use isahc::{AsyncReadResponseExt, HttpClient, Request};

use crate::core::status::{MergedStatus, Report};

/// Dashboard ingestion path, relative to `--dashboard-url`.
pub const REPORT_PATH: &str = "/api/component-monitor/report";

/// Per-request timeout for report submission.
pub const REPORT_TIMEOUT: Duration = Duration::from_secs(30);

/// Upper bound on error-body bytes attached to a rejection error.
const ERROR_BODY_LIMIT: usize = 1024;

#[derive(Debug, thiserror::Error)]
pub enum ReportError {
    #[error("failed to encode report: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("failed to send report: {0}")]
    Transport(String),
    #[error("dashboard rejected report with status {status}: {body}")]
    Rejected { status: u16, body: String },
}

/// Destination for one cycle's merged statuses.
#[async_trait]
pub trait ReportSink: Send + Sync {
    async fn submit(&self, statuses: &[MergedStatus]) -> Result<(), ReportError>;
}

/// Read the dashboard bearer token from a file, trimming surrounding
/// whitespace. Called once at startup.
pub fn read_token_file(path: &Path) -> Result<String, String> {
    let token = std::fs::read_to_string(path)
        .map_err(|e| format!("failed to read token file {}: {e}", path.display()))?
        .trim()
        .to_string();
    if token.is_empty() {
        return Err(format!("token file {} is empty", path.display()));
    }
    Ok(token)
}

/// Authenticated JSON POST client for the dashboard.
pub struct DashboardClient {
    client: HttpClient,
    endpoint: String,
    token: String,
    monitor_name: String,
}

impl DashboardClient {
    pub fn new(
        dashboard_url: &str,
        monitor_name: impl Into<String>,
        token: impl Into<String>,
    ) -> Result<Self, ReportError> {
        let client = HttpClient::builder()
            .redirect_policy(RedirectPolicy::None)
            .build()
            .map_err(|e| ReportError::Transport(e.to_string()))?;
        Ok(Self {
            client,
            endpoint: format!("{}{}", dashboard_url.trim_end_matches('/'), REPORT_PATH),
            token: token.into(),
            monitor_name: monitor_name.into(),
        })
    }

    fn envelope(&self, statuses: &[MergedStatus]) -> Report {
        Report {
            component_monitor: self.monitor_name.clone(),
            statuses: statuses.to_vec(),
        }
    }
}

#[async_trait]
impl ReportSink for DashboardClient {
    async fn submit(&self, statuses: &[MergedStatus]) -> Result<(), ReportError> {
        let body = serde_json::to_vec(&self.envelope(statuses))?;
        let request = Request::post(&self.endpoint)
            .timeout(REPORT_TIMEOUT)
            .header("Content-Type", "application/json")
            .header("Authorization", format!("Bearer {}", self.token))
            .body(body)
            .map_err(|e| ReportError::Transport(format!("failed to build request: {e}")))?;

        let mut response = self
            .client
            .send_async(request)
            .await
            .map_err(|e| ReportError::Transport(e.to_string()))?;

        let status = response.status().as_u16();
        if status != 200 {
            let body = response.text().await.unwrap_or_default();
            let body: String = body.chars().take(ERROR_BODY_LIMIT).collect();
            return Err(ReportError::Rejected { status, body });
        }
        tracing::debug!(statuses = statuses.len(), "report accepted");
        Ok(())
    }
}

/// Dry-run sink: serialise the request envelope, indented, to stdout.
pub struct StdoutReporter {
    monitor_name: String,
}

impl StdoutReporter {
    pub fn new(monitor_name: impl Into<String>) -> Self {
        Self {
            monitor_name: monitor_name.into(),
        }
    }
}

#[async_trait]
impl ReportSink for StdoutReporter {
    async fn submit(&self, statuses: &[MergedStatus]) -> Result<(), ReportError> {
        let report = Report {
            component_monitor: self.monitor_name.clone(),
            statuses: statuses.to_vec(),
        };
        println!("{}", serde_json::to_string_pretty(&report)?);
        Ok(())
    }
}
