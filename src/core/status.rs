//! Core status types shared by probers, merge and reporting.
//!
//! The severity lattice is a strict total order used when several probe
//! verdicts for the same sub-component disagree:
//!
//! `Suspected (1) < CapacityExhausted (2) < Degraded (3) < Down (4)`
//!
//! `Healthy` sits outside the lattice: it is a [`Status`] but has no
//! [`Severity`]. Probers emit one [`ProbeResult`] per execution; the merge
//! collapses them into [`MergedStatus`] entries carried by the [`Report`]
//! envelope that goes to the dashboard.

use serde::{Deserialize, Serialize};

/// How critical a failed check is considered.
///
/// The derived `Ord` follows declaration order, which is exactly the
/// lattice order: a later variant outranks an earlier one.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
pub enum Severity {
    Suspected,
    CapacityExhausted,
    Degraded,
    #[default]
    Down,
}

impl Severity {
    /// Numeric rank in the lattice, 1 (least critical) to 4 (most critical).
    pub fn level(&self) -> u8 {
        match self {
            Severity::Suspected => 1,
            Severity::CapacityExhausted => 2,
            Severity::Degraded => 3,
            Severity::Down => 4,
        }
    }

    /// The status reported when a check fails at this severity.
    pub fn to_status(&self) -> Status {
        match self {
            Severity::Suspected => Status::Suspected,
            Severity::CapacityExhausted => Status::CapacityExhausted,
            Severity::Degraded => Status::Degraded,
            Severity::Down => Status::Down,
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Severity::Suspected => write!(f, "Suspected"),
            Severity::CapacityExhausted => write!(f, "CapacityExhausted"),
            Severity::Degraded => write!(f, "Degraded"),
            Severity::Down => write!(f, "Down"),
        }
    }
}

/// Health verdict for one sub-component.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Status {
    Healthy,
    Degraded,
    Down,
    CapacityExhausted,
    Suspected,
}

impl Status {
    /// The canonical severity of a non-healthy status. `Healthy` has none.
    pub fn to_severity(&self) -> Option<Severity> {
        match self {
            Status::Healthy => None,
            Status::Degraded => Some(Severity::Degraded),
            Status::Down => Some(Severity::Down),
            Status::CapacityExhausted => Some(Severity::CapacityExhausted),
            Status::Suspected => Some(Severity::Suspected),
        }
    }

    pub fn is_healthy(&self) -> bool {
        matches!(self, Status::Healthy)
    }
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Status::Healthy => write!(f, "Healthy"),
            Status::Degraded => write!(f, "Degraded"),
            Status::Down => write!(f, "Down"),
            Status::CapacityExhausted => write!(f, "CapacityExhausted"),
            Status::Suspected => write!(f, "Suspected"),
        }
    }
}

/// Which kind of check produced a reason.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReasonType {
    #[serde(rename = "HTTP")]
    Http,
    Prometheus,
}

/// Free-form explanation tied to one executed check.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reason {
    #[serde(rename = "type")]
    pub reason_type: ReasonType,
    /// The check that was executed: the probed URL or the PromQL expression.
    pub check: String,
    /// Human-readable outcome of the check.
    pub results: String,
}

impl Reason {
    pub fn http(check: impl Into<String>, results: impl Into<String>) -> Self {
        Self {
            reason_type: ReasonType::Http,
            check: check.into(),
            results: results.into(),
        }
    }

    pub fn prometheus(check: impl Into<String>, results: impl Into<String>) -> Self {
        Self {
            reason_type: ReasonType::Prometheus,
            check: check.into(),
            results: results.into(),
        }
    }
}

/// Error raised while executing a single probe.
///
/// A set `error` on a [`ProbeResult`] means the probe could not produce a
/// trustworthy verdict; the merge treats such results specially instead of
/// forwarding their status.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ProbeError {
    #[error("probe cancelled: {0}")]
    Cancelled(String),
    #[error("transport error: {0}")]
    Transport(String),
    #[error("query failed for {component}/{sub_component} ({query}): {detail}")]
    Query {
        component: String,
        sub_component: String,
        query: String,
        detail: String,
    },
}

/// Outcome of one probe execution, internal to a cycle.
#[derive(Debug, Clone)]
pub struct ProbeResult {
    pub component_slug: String,
    pub sub_component_slug: String,
    /// Meaningless when `error` is set.
    pub status: Status,
    pub reasons: Vec<Reason>,
    pub error: Option<ProbeError>,
}

impl ProbeResult {
    pub fn is_errored(&self) -> bool {
        self.error.is_some()
    }
}

/// One merged verdict per `(component, sub_component)` pair per cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MergedStatus {
    pub component_slug: String,
    pub sub_component_slug: String,
    pub status: Status,
    pub reasons: Vec<Reason>,
}

/// Outbound report envelope POSTed to the dashboard.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Report {
    /// Identifier of this monitor instance (`--name`).
    pub component_monitor: String,
    pub statuses: Vec<MergedStatus>,
}
