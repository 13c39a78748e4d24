//! Configuration schema for the component monitor.
//!
//! The configuration file is a YAML mapping; durations are humantime strings
//! (`"30s"`, `"5m"`, `"1h"`). Loading goes through three stages: parse,
//! default-fill (query steps, severities), and validation (see
//! [`crate::config::validation`]). Only configurations that pass all three
//! are ever handed to an orchestrator.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::config::validation::validate;
use crate::core::status::Severity;

/// Default step for range queries spanning at most one hour.
pub const DEFAULT_RANGE_STEP: Duration = Duration::from_secs(15);

/// Range queries longer than this derive their step as `duration / 250`.
pub const DEFAULT_STEP_CUTOFF: Duration = Duration::from_secs(3600);

/// Top-level monitoring configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MonitoringConfig {
    /// Probe cycle period. Every configured probe runs once per cycle.
    #[serde(with = "humantime_serde")]
    pub frequency: Duration,
    pub components: Vec<MonitoringComponent>,
}

/// One monitored sub-component and its checks.
///
/// The `(component_slug, sub_component_slug)` pair need not be unique across
/// entries; results for the same pair are merged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MonitoringComponent {
    pub component_slug: String,
    pub sub_component_slug: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub http_monitor: Option<HttpMonitor>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prometheus_monitor: Option<PrometheusMonitor>,
}

/// HTTP GET check with confirm-retry semantics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HttpMonitor {
    pub url: String,
    /// Expected HTTP status code.
    pub code: u16,
    /// Wait between the first miss and the confirming second request.
    /// Must not exceed the cycle `frequency`.
    #[serde(with = "humantime_serde")]
    pub retry_after: Duration,
    #[serde(default)]
    pub severity: Severity,
}

/// Prometheus check: one endpoint, an ordered list of queries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PrometheusMonitor {
    pub prometheus_location: PrometheusLocation,
    pub queries: Vec<PrometheusQuery>,
}

/// Where the Prometheus endpoint lives.
///
/// Matches the flat YAML shape: either `url` alone, or the
/// `cluster`/`namespace`/`route` triple. Exclusivity is enforced by
/// validation; [`PrometheusLocation::kind`] yields the resolved variant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct PrometheusLocation {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cluster: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub route: Option<String>,
}

/// Resolved variant of a [`PrometheusLocation`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LocationKind<'a> {
    Url(&'a str),
    Cluster {
        cluster: &'a str,
        namespace: &'a str,
        route: &'a str,
    },
}

impl PrometheusLocation {
    /// The populated variant, or `None` when neither variant is complete.
    /// Validation rejects ambiguous or incomplete locations before any
    /// caller relies on this.
    pub fn kind(&self) -> Option<LocationKind<'_>> {
        if let Some(url) = &self.url {
            if self.cluster.is_none() && self.namespace.is_none() && self.route.is_none() {
                return Some(LocationKind::Url(url));
            }
            return None;
        }
        match (&self.cluster, &self.namespace, &self.route) {
            (Some(cluster), Some(namespace), Some(route)) => Some(LocationKind::Cluster {
                cluster,
                namespace,
                route,
            }),
            _ => None,
        }
    }

    /// Uniqueness key for client sharing: the URL itself, or
    /// `cluster/namespace/route`. Probers whose locations share a key share
    /// one query client.
    pub fn key(&self) -> String {
        match self.kind() {
            Some(LocationKind::Url(url)) => url.to_string(),
            Some(LocationKind::Cluster {
                cluster,
                namespace,
                route,
            }) => format!("{}/{}/{}", cluster, namespace, route),
            None => String::new(),
        }
    }
}

/// One PromQL check.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PrometheusQuery {
    pub query: String,
    /// Optional diagnostic query, run only when `query` reports unhealthy,
    /// to enrich the human-readable reason.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure_query: Option<String>,
    /// When set the check runs as a range query over `[now - duration, now]`.
    #[serde(default, with = "humantime_serde", skip_serializing_if = "Option::is_none")]
    pub duration: Option<Duration>,
    /// Sample spacing for range queries. Only legal together with
    /// `duration`; defaulted when absent.
    #[serde(default, with = "humantime_serde", skip_serializing_if = "Option::is_none")]
    pub step: Option<Duration>,
    #[serde(default)]
    pub severity: Severity,
}

impl MonitoringConfig {
    /// Read, parse, default-fill and validate a configuration file.
    pub fn load(path: &Path) -> Result<Self, crate::config::validation::ConfigError> {
        use crate::config::validation::ConfigError;

        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: PathBuf::from(path),
            source,
        })?;
        Self::from_yaml(&raw).map_err(|err| err.with_path(path))
    }

    /// Parse and validate configuration from a YAML document.
    pub fn from_yaml(raw: &str) -> Result<Self, crate::config::validation::ConfigError> {
        use crate::config::validation::ConfigError;

        let mut config: MonitoringConfig =
            serde_yaml::from_str(raw).map_err(|source| ConfigError::Parse {
                path: PathBuf::new(),
                source,
            })?;
        config.fill_defaults();
        validate(&config)?;
        Ok(config)
    }

    /// Fill derived defaults before validation: a range query without an
    /// explicit step gets `15s` for spans up to one hour, else
    /// `duration / 250` floored to whole nanoseconds.
    pub fn fill_defaults(&mut self) {
        for component in &mut self.components {
            let Some(prometheus) = component.prometheus_monitor.as_mut() else {
                continue;
            };
            for query in &mut prometheus.queries {
                if query.step.is_some() {
                    continue;
                }
                if let Some(duration) = query.duration {
                    query.step = Some(default_step(duration));
                }
            }
        }
    }
}

fn default_step(duration: Duration) -> Duration {
    if duration <= DEFAULT_STEP_CUTOFF {
        DEFAULT_RANGE_STEP
    } else {
        Duration::from_nanos((duration.as_nanos() / 250) as u64)
    }
}
