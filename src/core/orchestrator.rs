//! Fixed-cadence probe orchestration.
//!
//! One orchestrator generation owns its probers, the results channel and the
//! report sink. Each cycle fans every prober out as its own task, collects
//! until all have reported or the cycle period elapses, merges, submits, and
//! paces to `frequency`. Probers that outlive their cycle are not awaited:
//! their late writes land in the channel and are drained (and logged) at the
//! start of the next cycle.
//!
//! Cancellation policy: a cancelled cycle abandons its report entirely, so a
//! submitted report always reflects one complete collection window.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::types::MonitoringConfig;
use crate::core::merge::merge;
use crate::core::probe::http::{HttpProbeClient, HttpProber};
use crate::core::probe::prometheus::PrometheusProber;
use crate::core::probe::Prober;
use crate::core::report::ReportSink;
use crate::core::resolver::{ClientPool, ResolveError};
use crate::core::status::ProbeResult;

/// Instantiate one prober per configured monitor. Components may contribute
/// up to two probers each (HTTP and Prometheus).
pub fn build_probers(
    config: &MonitoringConfig,
    pool: &ClientPool,
    http_client: &Arc<dyn HttpProbeClient>,
) -> Result<Vec<Arc<dyn Prober>>, ResolveError> {
    let mut probers: Vec<Arc<dyn Prober>> = Vec::new();
    for component in &config.components {
        if let Some(monitor) = &component.http_monitor {
            probers.push(Arc::new(HttpProber::new(
                component.component_slug.clone(),
                component.sub_component_slug.clone(),
                monitor.clone(),
                Arc::clone(http_client),
            )));
        }
        if let Some(monitor) = &component.prometheus_monitor {
            let client = pool
                .get(&monitor.prometheus_location)
                .ok_or_else(|| ResolveError::MissingClient(monitor.prometheus_location.key()))?;
            probers.push(Arc::new(PrometheusProber::new(
                component.component_slug.clone(),
                component.sub_component_slug.clone(),
                monitor.queries.clone(),
                client,
            )));
        }
    }
    Ok(probers)
}

pub struct Orchestrator {
    probers: Vec<Arc<dyn Prober>>,
    frequency: Duration,
    sink: Arc<dyn ReportSink>,
    tx: mpsc::UnboundedSender<ProbeResult>,
    rx: mpsc::UnboundedReceiver<ProbeResult>,
}

impl Orchestrator {
    pub fn new(
        probers: Vec<Arc<dyn Prober>>,
        frequency: Duration,
        sink: Arc<dyn ReportSink>,
    ) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            probers,
            frequency,
            sink,
            tx,
            rx,
        }
    }

    /// Run cycles until cancelled.
    pub async fn run(&mut self, cancel: CancellationToken) {
        info!(
            probers = self.probers.len(),
            frequency = ?self.frequency,
            "orchestrator running"
        );
        loop {
            let cycle_start = Instant::now();
            if !self.run_once(&cancel).await {
                info!("orchestrator cancelled");
                return;
            }

            let elapsed = cycle_start.elapsed();
            if elapsed < self.frequency {
                tokio::select! {
                    _ = cancel.cancelled() => {
                        info!("orchestrator cancelled");
                        return;
                    }
                    _ = tokio::time::sleep(self.frequency - elapsed) => {}
                }
            }
        }
    }

    /// Execute exactly one cycle: drain, fan out, collect, merge, submit.
    /// Returns `false` when the cycle was cancelled (nothing submitted).
    pub async fn run_once(&mut self, cancel: &CancellationToken) -> bool {
        self.drain_late_results();

        let Some(results) = self.collect(cancel).await else {
            return false;
        };
        // Collection and cancellation can race; a cancelled cycle never
        // submits, even a complete one.
        if cancel.is_cancelled() {
            return false;
        }

        let merged = merge(results);
        debug!(statuses = merged.len(), "cycle merged");
        if let Err(err) = self.sink.submit(&merged).await {
            error!(error = %err, "failed to submit report, retrying next cycle");
        }
        true
    }

    /// Discard results written by probers of a prior cycle after that cycle
    /// timed out.
    fn drain_late_results(&mut self) {
        while let Ok(result) = self.rx.try_recv() {
            warn!(
                component = %result.component_slug,
                sub_component = %result.sub_component_slug,
                "discarding late probe result from previous cycle"
            );
        }
    }

    /// Fan out all probers and collect their results. Collection ends when
    /// every prober reported, the cycle period elapsed (partial results are
    /// kept), or the token was cancelled (`None`: the cycle is abandoned).
    async fn collect(&mut self, cancel: &CancellationToken) -> Option<Vec<ProbeResult>> {
        let total = self.probers.len();
        for prober in &self.probers {
            let prober = Arc::clone(prober);
            let tx = self.tx.clone();
            let token = cancel.clone();
            tokio::spawn(async move {
                let result = prober.probe(&token).await;
                // The receiver only goes away with the whole orchestrator.
                let _ = tx.send(result);
            });
        }

        let deadline = tokio::time::sleep(self.frequency);
        tokio::pin!(deadline);

        let mut results = Vec::with_capacity(total);
        while results.len() < total {
            tokio::select! {
                received = self.rx.recv() => {
                    match received {
                        Some(result) => results.push(result),
                        None => break,
                    }
                }
                _ = cancel.cancelled() => return None,
                _ = &mut deadline => {
                    warn!(
                        completed = results.len(),
                        total,
                        timeout = ?self.frequency,
                        "cycle timed out before all probers returned"
                    );
                    break;
                }
            }
        }
        Some(results)
    }
}
