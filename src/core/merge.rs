//! Reduction of one cycle's probe results into per-sub-component verdicts.
//!
//! Several probes may target the same `(component, sub_component)` pair, and
//! a pair may be probed by both an HTTP and a Prometheus check. The merge
//! collapses each group into at most one [`MergedStatus`]:
//!
//! - errored results never contribute a verdict; a group whose clean results
//!   are all healthy but that also contains an errored result is omitted
//!   entirely, leaving the dashboard's absent-report detector to act if the
//!   condition persists;
//! - otherwise the most critical clean severity wins, ties broken by arrival
//!   order, and the reasons of all non-healthy clean results are carried
//!   along in arrival order.

use std::collections::HashMap;

use crate::core::status::{MergedStatus, ProbeResult, Severity, Status};

/// Merge one cycle's probe results, ordered lexicographically by
/// `(component_slug, sub_component_slug)`.
pub fn merge(results: Vec<ProbeResult>) -> Vec<MergedStatus> {
    let mut order: Vec<(String, String)> = Vec::new();
    let mut groups: HashMap<(String, String), Vec<ProbeResult>> = HashMap::new();

    for result in results {
        let key = (
            result.component_slug.clone(),
            result.sub_component_slug.clone(),
        );
        if !groups.contains_key(&key) {
            order.push(key.clone());
        }
        groups.entry(key).or_default().push(result);
    }

    let mut merged: Vec<MergedStatus> = order
        .into_iter()
        .filter_map(|key| {
            let group = groups.remove(&key)?;
            merge_group(&key.0, &key.1, &group)
        })
        .collect();

    merged.sort_by(|a, b| {
        (a.component_slug.as_str(), a.sub_component_slug.as_str())
            .cmp(&(b.component_slug.as_str(), b.sub_component_slug.as_str()))
    });
    merged
}

/// Reduce one group of results for a single pair. `None` means the pair is
/// omitted from the report this cycle.
fn merge_group(
    component_slug: &str,
    sub_component_slug: &str,
    group: &[ProbeResult],
) -> Option<MergedStatus> {
    let (clean, errored): (Vec<&ProbeResult>, Vec<&ProbeResult>) =
        group.iter().partition(|r| !r.is_errored());

    if clean.is_empty() {
        return None;
    }

    let all_clean_healthy = clean.iter().all(|r| r.status.is_healthy());
    if all_clean_healthy && !errored.is_empty() {
        return None;
    }

    if all_clean_healthy {
        return Some(MergedStatus {
            component_slug: component_slug.to_string(),
            sub_component_slug: sub_component_slug.to_string(),
            status: Status::Healthy,
            reasons: Vec::new(),
        });
    }

    // Strictly-greater comparison keeps the first arrival on severity ties.
    let mut winner: Option<Severity> = None;
    for result in &clean {
        if let Some(severity) = result.status.to_severity() {
            if winner.map_or(true, |current| severity > current) {
                winner = Some(severity);
            }
        }
    }

    let reasons = clean
        .iter()
        .filter(|r| !r.status.is_healthy())
        .flat_map(|r| r.reasons.iter().cloned())
        .collect();

    Some(MergedStatus {
        component_slug: component_slug.to_string(),
        sub_component_slug: sub_component_slug.to_string(),
        status: winner.map(|s| s.to_status()).unwrap_or(Status::Healthy),
        reasons,
    })
}
