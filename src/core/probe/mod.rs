//! Prober capability surface.
//!
//! A prober executes one configured check against one sub-component and
//! produces exactly one [`ProbeResult`]. The orchestrator holds probers as
//! trait objects and never cares which kind it is driving.

pub mod http;
pub mod prometheus;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::core::status::ProbeResult;

/// One configured check. Implementations must complete, fail, or observe the
/// cancellation token; every invocation yields a result.
#[async_trait]
pub trait Prober: Send + Sync {
    async fn probe(&self, cancel: &CancellationToken) -> ProbeResult;
}

pub use http::{HttpProbeClient, HttpProber, IsahcProbeClient};
pub use prometheus::{
    PromHttpClient, PrometheusProber, QueryClient, QueryError, QueryValue, RangeSeries,
    VectorSample,
};
