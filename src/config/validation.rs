//! Configuration validation.
//!
//! Validation never stops at the first problem: every violation in the file
//! is collected and returned as one aggregated [`ConfigError::Invalid`], so
//! an operator fixes the file in one pass instead of replaying the loader.

use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::config::types::{HttpMonitor, MonitoringConfig, PrometheusLocation, PrometheusMonitor};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read configuration at {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse configuration at {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
    #[error("invalid configuration: {}", .errors.join("; "))]
    Invalid { errors: Vec<String> },
}

impl ConfigError {
    /// Attach the file path to a parse error produced from raw YAML.
    pub(crate) fn with_path(self, path: &Path) -> Self {
        match self {
            ConfigError::Parse { source, .. } => ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            },
            other => other,
        }
    }
}

/// Check every invariant of a parsed, default-filled configuration.
pub fn validate(config: &MonitoringConfig) -> Result<(), ConfigError> {
    let mut errors = Vec::new();

    if config.frequency.is_zero() {
        errors.push("frequency must be a positive duration".to_string());
    }

    for (index, component) in config.components.iter().enumerate() {
        let label = format!(
            "components[{}] ({}/{})",
            index, component.component_slug, component.sub_component_slug
        );

        if component.component_slug.trim().is_empty() {
            errors.push(format!("{label}: component_slug must not be empty"));
        }
        if component.sub_component_slug.trim().is_empty() {
            errors.push(format!("{label}: sub_component_slug must not be empty"));
        }
        if component.http_monitor.is_none() && component.prometheus_monitor.is_none() {
            errors.push(format!(
                "{label}: at least one of http_monitor or prometheus_monitor is required"
            ));
        }
        if let Some(http) = &component.http_monitor {
            validate_http(&label, http, config.frequency, &mut errors);
        }
        if let Some(prometheus) = &component.prometheus_monitor {
            validate_prometheus(&label, prometheus, &mut errors);
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(ConfigError::Invalid { errors })
    }
}

fn validate_http(label: &str, http: &HttpMonitor, frequency: Duration, errors: &mut Vec<String>) {
    if let Some(problem) = check_url(&http.url) {
        errors.push(format!("{label}: http_monitor.url {problem}"));
    }
    if http.retry_after.is_zero() {
        errors.push(format!(
            "{label}: http_monitor.retry_after must be a positive duration"
        ));
    }
    if http.retry_after > frequency {
        errors.push(format!(
            "{label}: http_monitor.retry_after ({}) must not exceed frequency ({})",
            humantime::format_duration(http.retry_after),
            humantime::format_duration(frequency)
        ));
    }
}

fn validate_prometheus(label: &str, prometheus: &PrometheusMonitor, errors: &mut Vec<String>) {
    validate_location(label, &prometheus.prometheus_location, errors);

    if prometheus.queries.is_empty() {
        errors.push(format!(
            "{label}: prometheus_monitor.queries must not be empty"
        ));
    }
    for (index, query) in prometheus.queries.iter().enumerate() {
        if query.query.trim().is_empty() {
            errors.push(format!(
                "{label}: prometheus_monitor.queries[{index}].query must not be empty"
            ));
        }
        if query.step.is_some() && query.duration.is_none() {
            errors.push(format!(
                "{label}: prometheus_monitor.queries[{index}].step requires duration"
            ));
        }
    }
}

fn validate_location(label: &str, location: &PrometheusLocation, errors: &mut Vec<String>) {
    let has_cluster_fields =
        location.cluster.is_some() || location.namespace.is_some() || location.route.is_some();

    match (&location.url, has_cluster_fields) {
        (Some(_), true) => {
            errors.push(format!(
                "{label}: prometheus_location.url is mutually exclusive with cluster/namespace/route"
            ));
        }
        (Some(url), false) => {
            if let Some(problem) = check_url(url) {
                errors.push(format!("{label}: prometheus_location.url {problem}"));
            }
        }
        (None, true) => {
            if location.cluster.is_none() || location.namespace.is_none() || location.route.is_none()
            {
                errors.push(format!(
                    "{label}: prometheus_location cluster, namespace and route are required together"
                ));
            }
        }
        (None, false) => {
            errors.push(format!(
                "{label}: prometheus_location requires a url or a cluster/namespace/route triple"
            ));
        }
    }
}

fn check_url(raw: &str) -> Option<String> {
    match url::Url::parse(raw) {
        Ok(parsed) if matches!(parsed.scheme(), "http" | "https") => None,
        Ok(parsed) => Some(format!(
            "must use http or https, got scheme {:?}",
            parsed.scheme()
        )),
        Err(err) => Some(format!("is not a valid URL: {err}")),
    }
}
