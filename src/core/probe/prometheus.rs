//! Prometheus prober: ordered PromQL checks against one endpoint.
//!
//! Each configured query runs once per cycle, as an instant query at `now`
//! or as a range query over `[now - duration, now]`. A query "succeeds" when
//! its result carries data (non-empty vector, scalar, or matrix with at
//! least one sample in its first series); anything else is a failure at the
//! query's configured severity. There is no retry at this layer: range
//! queries already aggregate over their window, and retrying would change
//! outage detection semantics.
//!
//! A query *error* (transport, PromQL rejection, unrepresentable range) is a
//! different animal from a failure: the prober stops immediately and emits a
//! result with `error` set, so the merge withholds a verdict for the pair
//! instead of guessing.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio_util::sync::CancellationToken;

use crate::config::types::PrometheusQuery;
use crate::core::probe::Prober;
use crate::core::status::{ProbeError, ProbeResult, Reason, Severity, Status};

/// Error from the query client, carrying the library's detail string.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{0}")]
pub struct QueryError(pub String);

/// One sample of an instant vector.
#[derive(Debug, Clone, PartialEq)]
pub struct VectorSample {
    /// Label set, ordered for deterministic rendering.
    pub labels: BTreeMap<String, String>,
    pub value: f64,
}

/// One series of a range result; samples are `(unix_seconds, value)`.
#[derive(Debug, Clone, PartialEq)]
pub struct RangeSeries {
    pub labels: BTreeMap<String, String>,
    pub samples: Vec<(f64, f64)>,
}

/// Tagged query result value.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryValue {
    Vector(Vec<VectorSample>),
    Scalar(f64),
    Matrix(Vec<RangeSeries>),
    Str(String),
    Null,
}

impl QueryValue {
    /// Whether the value counts as a successful check.
    pub fn has_data(&self) -> bool {
        match self {
            QueryValue::Vector(samples) => !samples.is_empty(),
            QueryValue::Scalar(_) => true,
            QueryValue::Matrix(series) => series.first().map_or(false, |s| !s.samples.is_empty()),
            QueryValue::Str(_) | QueryValue::Null => false,
        }
    }

    /// Compact human-readable rendering used for failure-query diagnostics.
    pub fn summarize(&self) -> String {
        match self {
            QueryValue::Vector(samples) => match samples.as_slice() {
                [] => "no result".to_string(),
                [single] => format_sample_value(single.value),
                many => many
                    .iter()
                    .map(|sample| {
                        let labels = sample
                            .labels
                            .iter()
                            .map(|(k, v)| format!("{k}={v}"))
                            .collect::<Vec<_>>()
                            .join(",");
                        format!("{{{labels}}}={}", format_sample_value(sample.value))
                    })
                    .collect::<Vec<_>>()
                    .join(", "),
            },
            QueryValue::Scalar(value) => format_sample_value(*value),
            QueryValue::Matrix(series) => series
                .first()
                .and_then(|s| s.samples.last())
                .map(|(_, value)| format_sample_value(*value))
                .unwrap_or_else(|| "no result".to_string()),
            QueryValue::Str(value) => value.clone(),
            QueryValue::Null => "no result".to_string(),
        }
    }
}

fn format_sample_value(value: f64) -> String {
    format!("{value}")
}

/// Query surface of a Prometheus endpoint; mocked in tests, implemented for
/// production by [`PromHttpClient`]. One client is shared by every prober
/// whose location resolves to the same endpoint.
#[async_trait]
pub trait QueryClient: Send + Sync {
    async fn instant(&self, query: &str, at: DateTime<Utc>) -> Result<QueryValue, QueryError>;

    async fn range(
        &self,
        query: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        step: Duration,
    ) -> Result<QueryValue, QueryError>;
}

/// Production query client backed by `prometheus_http_query` over a
/// pre-authenticated reqwest transport.
pub struct PromHttpClient {
    client: prometheus_http_query::Client,
}

impl PromHttpClient {
    pub fn new(base_url: &str, transport: reqwest::Client) -> Result<Self, QueryError> {
        let client = prometheus_http_query::Client::from(transport, base_url)
            .map_err(|e| QueryError(e.to_string()))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl QueryClient for PromHttpClient {
    async fn instant(&self, query: &str, at: DateTime<Utc>) -> Result<QueryValue, QueryError> {
        let response = self
            .client
            .query(query)
            .at(at.timestamp())
            .get()
            .await
            .map_err(|e| QueryError(e.to_string()))?;
        Ok(convert(response.data()))
    }

    async fn range(
        &self,
        query: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        step: Duration,
    ) -> Result<QueryValue, QueryError> {
        let response = self
            .client
            .query_range(query, start.timestamp(), end.timestamp(), step.as_secs_f64())
            .get()
            .await
            .map_err(|e| QueryError(e.to_string()))?;
        Ok(convert(response.data()))
    }
}

// The HTTP API's string results do not surface through this client; the
// `Str` and `Null` variants exist for the classification contract.
fn convert(data: &prometheus_http_query::response::Data) -> QueryValue {
    use prometheus_http_query::response::Data;

    match data {
        Data::Vector(samples) => QueryValue::Vector(
            samples
                .iter()
                .map(|v| VectorSample {
                    labels: v
                        .metric()
                        .iter()
                        .map(|(k, val)| (k.clone(), val.clone()))
                        .collect(),
                    value: v.sample().value(),
                })
                .collect(),
        ),
        Data::Matrix(series) => QueryValue::Matrix(
            series
                .iter()
                .map(|s| RangeSeries {
                    labels: s
                        .metric()
                        .iter()
                        .map(|(k, val)| (k.clone(), val.clone()))
                        .collect(),
                    samples: s
                        .samples()
                        .iter()
                        .map(|sample| (sample.timestamp(), sample.value()))
                        .collect(),
                })
                .collect(),
        ),
        Data::Scalar(sample) => QueryValue::Scalar(sample.value()),
    }
}

/// Prober running one component's ordered query list.
pub struct PrometheusProber {
    component_slug: String,
    sub_component_slug: String,
    queries: Vec<PrometheusQuery>,
    client: Arc<dyn QueryClient>,
}

impl PrometheusProber {
    pub fn new(
        component_slug: String,
        sub_component_slug: String,
        queries: Vec<PrometheusQuery>,
        client: Arc<dyn QueryClient>,
    ) -> Self {
        Self {
            component_slug,
            sub_component_slug,
            queries,
            client,
        }
    }

    async fn execute(&self, query: &PrometheusQuery) -> Result<QueryValue, QueryError> {
        let now = Utc::now();
        let Some(duration) = query.duration else {
            return self.client.instant(&query.query, now).await;
        };

        let span = chrono::Duration::from_std(duration)
            .map_err(|e| QueryError(format!("range duration not representable: {e}")))?;
        // Step is always present after default-fill.
        let step = query.step.unwrap_or(crate::config::types::DEFAULT_RANGE_STEP);
        self.client
            .range(&query.query, now - span, now, step)
            .await
    }

    fn query_error(&self, query: &PrometheusQuery, err: QueryError) -> ProbeResult {
        ProbeResult {
            component_slug: self.component_slug.clone(),
            sub_component_slug: self.sub_component_slug.clone(),
            status: query.severity.to_status(),
            reasons: Vec::new(),
            error: Some(ProbeError::Query {
                component: self.component_slug.clone(),
                sub_component: self.sub_component_slug.clone(),
                query: query.query.clone(),
                detail: err.to_string(),
            }),
        }
    }

    async fn failure_reason(&self, query: &PrometheusQuery) -> Reason {
        let Some(failure_query) = &query.failure_query else {
            return Reason::prometheus(query.query.as_str(), "query returned unsuccessful");
        };

        match self.client.instant(failure_query, Utc::now()).await {
            Ok(value) => Reason::prometheus(query.query.as_str(), value.summarize()),
            Err(err) => {
                tracing::warn!(
                    component = %self.component_slug,
                    sub_component = %self.sub_component_slug,
                    failure_query = %failure_query,
                    error = %err,
                    "failure query failed, emitting reason without diagnostic"
                );
                Reason::prometheus(query.query.as_str(), "query returned unsuccessful")
            }
        }
    }
}

#[async_trait]
impl Prober for PrometheusProber {
    async fn probe(&self, _cancel: &CancellationToken) -> ProbeResult {
        let mut successful: Vec<&PrometheusQuery> = Vec::new();
        let mut failed: Vec<&PrometheusQuery> = Vec::new();

        for query in &self.queries {
            match self.execute(query).await {
                Ok(value) if value.has_data() => successful.push(query),
                Ok(_) => failed.push(query),
                Err(err) => return self.query_error(query, err),
            }
        }

        if failed.is_empty() {
            let reasons = successful
                .iter()
                .map(|q| Reason::prometheus(q.query.as_str(), "query returned successfully"))
                .collect();
            return ProbeResult {
                component_slug: self.component_slug.clone(),
                sub_component_slug: self.sub_component_slug.clone(),
                status: Status::Healthy,
                reasons,
                error: None,
            };
        }

        let severity = failed
            .iter()
            .map(|q| q.severity)
            .max()
            .unwrap_or(Severity::Down);

        let mut reasons = Vec::with_capacity(failed.len());
        for query in &failed {
            reasons.push(self.failure_reason(query).await);
        }

        ProbeResult {
            component_slug: self.component_slug.clone(),
            sub_component_slug: self.sub_component_slug.clone(),
            status: severity.to_status(),
            reasons,
            error: None,
        }
    }
}
