//! HTTP prober with confirm-retry semantics.
//!
//! One probe issues a GET against the configured URL and compares the status
//! code with the expected one. A single miss is not trusted: the prober waits
//! `retry_after` and confirms with a second GET, classifying on that result
//! alone. Two misses separated by the wait are required before the configured
//! severity is reported, which keeps one transient blip from causing outage
//! churn on the dashboard.
//!
//! Transport errors are not classified at all: they produce a result with
//! `error` set, which the merge treats as "no verdict" rather than "down".

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use isahc::config::{Configurable, RedirectPolicy};
use isahc::{HttpClient, Request};
use tokio_util::sync::CancellationToken;

use crate::config::types::HttpMonitor;
use crate::core::probe::Prober;
use crate::core::status::{ProbeError, ProbeResult, Reason, Status};

/// Fixed per-request timeout for probe GETs.
pub const PROBE_TIMEOUT: Duration = Duration::from_secs(10);

/// Minimal HTTP surface the prober needs; mocked in tests.
#[async_trait]
pub trait HttpProbeClient: Send + Sync {
    /// Issue a GET and return the response status code. Redirects are not
    /// followed; a 3xx is a verdict like any other code.
    async fn get_status(&self, url: &str, timeout: Duration) -> Result<u16, String>;
}

/// Production probe client backed by isahc.
pub struct IsahcProbeClient {
    client: HttpClient,
}

impl IsahcProbeClient {
    pub fn new() -> Result<Self, isahc::Error> {
        let client = HttpClient::builder()
            .redirect_policy(RedirectPolicy::None)
            .build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl HttpProbeClient for IsahcProbeClient {
    async fn get_status(&self, url: &str, timeout: Duration) -> Result<u16, String> {
        let request = Request::get(url)
            .timeout(timeout)
            .header("Accept", "*/*")
            .body(())
            .map_err(|e| format!("failed to build request: {e}"))?;

        let response = self
            .client
            .send_async(request)
            .await
            .map_err(|e| e.to_string())?;
        Ok(response.status().as_u16())
    }
}

/// Prober for one configured [`HttpMonitor`].
pub struct HttpProber {
    component_slug: String,
    sub_component_slug: String,
    monitor: HttpMonitor,
    client: Arc<dyn HttpProbeClient>,
}

impl HttpProber {
    pub fn new(
        component_slug: String,
        sub_component_slug: String,
        monitor: HttpMonitor,
        client: Arc<dyn HttpProbeClient>,
    ) -> Self {
        Self {
            component_slug,
            sub_component_slug,
            monitor,
            client,
        }
    }

    fn result(&self, status: Status, reasons: Vec<Reason>, error: Option<ProbeError>) -> ProbeResult {
        ProbeResult {
            component_slug: self.component_slug.clone(),
            sub_component_slug: self.sub_component_slug.clone(),
            status,
            reasons,
            error,
        }
    }

    fn classified(&self, observed: u16) -> ProbeResult {
        let reason = Reason::http(
            self.monitor.url.as_str(),
            format!("Status code {} (expected {})", observed, self.monitor.code),
        );
        if observed == self.monitor.code {
            self.result(Status::Healthy, vec![reason], None)
        } else {
            self.result(self.monitor.severity.to_status(), vec![reason], None)
        }
    }

    fn transport_error(&self, detail: String) -> ProbeResult {
        let reason = Reason::http(
            self.monitor.url.as_str(),
            format!("request failed: {detail}"),
        );
        self.result(
            self.monitor.severity.to_status(),
            vec![reason],
            Some(ProbeError::Transport(detail)),
        )
    }
}

#[async_trait]
impl Prober for HttpProber {
    async fn probe(&self, cancel: &CancellationToken) -> ProbeResult {
        let first = self
            .client
            .get_status(&self.monitor.url, PROBE_TIMEOUT)
            .await;

        let observed = match first {
            Ok(code) if code == self.monitor.code => return self.classified(code),
            Ok(code) => code,
            Err(detail) => return self.transport_error(detail),
        };

        // Unexpected code: wait retry_after, then trust the second request.
        tracing::debug!(
            url = %self.monitor.url,
            observed,
            expected = self.monitor.code,
            retry_after = ?self.monitor.retry_after,
            "status mismatch, confirming after retry interval"
        );
        tokio::select! {
            _ = cancel.cancelled() => {
                return self.result(
                    self.monitor.severity.to_status(),
                    Vec::new(),
                    Some(ProbeError::Cancelled(format!(
                        "cancelled while waiting to confirm {}",
                        self.monitor.url
                    ))),
                );
            }
            _ = tokio::time::sleep(self.monitor.retry_after) => {}
        }

        match self
            .client
            .get_status(&self.monitor.url, PROBE_TIMEOUT)
            .await
        {
            Ok(code) => self.classified(code),
            Err(detail) => self.transport_error(detail),
        }
    }
}
