//! Shared mocks and fixtures for the integration tests.
//!
//! The mocks implement the library's client traits so probers and the
//! orchestrator run against scripted behaviour without any network.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio_util::sync::CancellationToken;

use component_monitor::config::types::HttpMonitor;
use component_monitor::core::probe::http::HttpProbeClient;
use component_monitor::core::probe::prometheus::{QueryClient, QueryError, QueryValue};
use component_monitor::core::probe::Prober;
use component_monitor::core::report::{ReportError, ReportSink};
use component_monitor::core::status::{MergedStatus, ProbeResult, Reason, Severity, Status};

/// Scripted HTTP probe client. Responses are consumed per URL in order; a
/// URL with an exhausted (or missing) script gets 200.
#[derive(Default)]
pub struct ScriptedHttpClient {
    responses: Mutex<HashMap<String, VecDeque<Result<u16, String>>>>,
    calls: Mutex<Vec<String>>,
}

impl ScriptedHttpClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn script(&self, url: &str, responses: Vec<Result<u16, String>>) {
        self.responses
            .lock()
            .unwrap()
            .insert(url.to_string(), responses.into());
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl HttpProbeClient for ScriptedHttpClient {
    async fn get_status(&self, url: &str, _timeout: Duration) -> Result<u16, String> {
        self.calls.lock().unwrap().push(url.to_string());
        let mut responses = self.responses.lock().unwrap();
        responses
            .get_mut(url)
            .and_then(|queue| queue.pop_front())
            .unwrap_or(Ok(200))
    }
}

/// Scripted query client keyed by query text. Both instant and range calls
/// resolve against the same script; executed queries are recorded.
#[derive(Default)]
pub struct ScriptedQueryClient {
    responses: Mutex<HashMap<String, Result<QueryValue, QueryError>>>,
    calls: Mutex<Vec<String>>,
    range_calls: Mutex<Vec<(String, Duration)>>,
}

impl ScriptedQueryClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn script(&self, query: &str, response: Result<QueryValue, QueryError>) {
        self.responses
            .lock()
            .unwrap()
            .insert(query.to_string(), response);
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn range_calls(&self) -> Vec<(String, Duration)> {
        self.range_calls.lock().unwrap().clone()
    }

    fn lookup(&self, query: &str) -> Result<QueryValue, QueryError> {
        self.calls.lock().unwrap().push(query.to_string());
        self.responses
            .lock()
            .unwrap()
            .get(query)
            .cloned()
            .unwrap_or(Ok(QueryValue::Null))
    }
}

#[async_trait]
impl QueryClient for ScriptedQueryClient {
    async fn instant(&self, query: &str, _at: DateTime<Utc>) -> Result<QueryValue, QueryError> {
        self.lookup(query)
    }

    async fn range(
        &self,
        query: &str,
        _start: DateTime<Utc>,
        _end: DateTime<Utc>,
        step: Duration,
    ) -> Result<QueryValue, QueryError> {
        self.range_calls
            .lock()
            .unwrap()
            .push((query.to_string(), step));
        self.lookup(query)
    }
}

/// Report sink capturing every submitted batch.
#[derive(Default)]
pub struct RecordingSink {
    batches: Mutex<Vec<Vec<MergedStatus>>>,
}

impl RecordingSink {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn batches(&self) -> Vec<Vec<MergedStatus>> {
        self.batches.lock().unwrap().clone()
    }

    pub fn batch_count(&self) -> usize {
        self.batches.lock().unwrap().len()
    }
}

#[async_trait]
impl ReportSink for RecordingSink {
    async fn submit(&self, statuses: &[MergedStatus]) -> Result<(), ReportError> {
        self.batches.lock().unwrap().push(statuses.to_vec());
        Ok(())
    }
}

/// Prober returning a fixed result, optionally after a cancellable delay.
pub struct FixedProber {
    pub result: ProbeResult,
    pub delay: Option<Duration>,
}

impl FixedProber {
    pub fn healthy(component: &str, sub: &str) -> Self {
        Self {
            result: ProbeResult {
                component_slug: component.to_string(),
                sub_component_slug: sub.to_string(),
                status: Status::Healthy,
                reasons: vec![Reason::http("http://x", "Status code 200 (expected 200)")],
                error: None,
            },
            delay: None,
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }
}

#[async_trait]
impl Prober for FixedProber {
    async fn probe(&self, cancel: &CancellationToken) -> ProbeResult {
        if let Some(delay) = self.delay {
            tokio::select! {
                _ = cancel.cancelled() => {}
                _ = tokio::time::sleep(delay) => {}
            }
        }
        self.result.clone()
    }
}

/// Standard HTTP monitor fixture used by the prober tests.
pub fn http_monitor(url: &str, severity: Severity) -> HttpMonitor {
    HttpMonitor {
        url: url.to_string(),
        code: 200,
        retry_after: Duration::from_millis(10),
        severity,
    }
}
