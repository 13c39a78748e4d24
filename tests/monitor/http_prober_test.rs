//! HTTP prober behaviour: confirm-retry, classification, transport errors,
//! and cancellation during the retry wait.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use component_monitor::core::probe::http::HttpProber;
use component_monitor::core::probe::Prober;
use component_monitor::core::status::{ProbeError, ReasonType, Severity, Status};

use crate::common::{http_monitor, ScriptedHttpClient};

const URL: &str = "http://gateway.example.com/healthz";

fn prober(client: Arc<ScriptedHttpClient>, severity: Severity) -> HttpProber {
    HttpProber::new(
        "api".to_string(),
        "gateway".to_string(),
        http_monitor(URL, severity),
        client,
    )
}

#[tokio::test(start_paused = true)]
async fn matching_status_is_healthy_with_one_reason() {
    let client = Arc::new(ScriptedHttpClient::new());
    client.script(URL, vec![Ok(200)]);

    let result = prober(Arc::clone(&client), Severity::Down)
        .probe(&CancellationToken::new())
        .await;

    assert_eq!(result.status, Status::Healthy);
    assert!(result.error.is_none());
    assert_eq!(result.reasons.len(), 1);
    assert_eq!(result.reasons[0].reason_type, ReasonType::Http);
    assert_eq!(result.reasons[0].check, URL);
    assert_eq!(result.reasons[0].results, "Status code 200 (expected 200)");
    // A match on the first request never triggers the confirming retry.
    assert_eq!(client.calls().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn two_misses_confirm_the_configured_severity() {
    let client = Arc::new(ScriptedHttpClient::new());
    client.script(URL, vec![Ok(500), Ok(500)]);

    let result = prober(Arc::clone(&client), Severity::Down)
        .probe(&CancellationToken::new())
        .await;

    assert_eq!(result.status, Status::Down);
    assert!(result.error.is_none());
    assert_eq!(result.reasons.len(), 1);
    assert_eq!(result.reasons[0].results, "Status code 500 (expected 200)");
    assert_eq!(client.calls().len(), 2);
}

#[tokio::test(start_paused = true)]
async fn custom_severity_is_reported_on_confirmed_miss() {
    let client = Arc::new(ScriptedHttpClient::new());
    client.script(URL, vec![Ok(429), Ok(429)]);

    let result = prober(Arc::clone(&client), Severity::Degraded)
        .probe(&CancellationToken::new())
        .await;

    assert_eq!(result.status, Status::Degraded);
}

#[tokio::test(start_paused = true)]
async fn transient_miss_recovers_to_healthy() {
    let client = Arc::new(ScriptedHttpClient::new());
    client.script(URL, vec![Ok(500), Ok(200)]);

    let result = prober(Arc::clone(&client), Severity::Down)
        .probe(&CancellationToken::new())
        .await;

    assert_eq!(result.status, Status::Healthy);
    assert_eq!(result.reasons[0].results, "Status code 200 (expected 200)");
    assert_eq!(client.calls().len(), 2);
}

#[tokio::test(start_paused = true)]
async fn transport_error_sets_error_and_severity_status() {
    let client = Arc::new(ScriptedHttpClient::new());
    client.script(URL, vec![Err("connection refused".to_string())]);

    let result = prober(Arc::clone(&client), Severity::Down)
        .probe(&CancellationToken::new())
        .await;

    assert_eq!(result.status, Status::Down);
    assert!(matches!(result.error, Some(ProbeError::Transport(_))));
    assert_eq!(result.reasons.len(), 1);
    assert!(result.reasons[0].results.contains("connection refused"));
    // A transport error on the first request is not retried.
    assert_eq!(client.calls().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn transport_error_on_retry_sets_error() {
    let client = Arc::new(ScriptedHttpClient::new());
    client.script(URL, vec![Ok(500), Err("timeout".to_string())]);

    let result = prober(Arc::clone(&client), Severity::Down)
        .probe(&CancellationToken::new())
        .await;

    assert!(matches!(result.error, Some(ProbeError::Transport(_))));
    assert_eq!(client.calls().len(), 2);
}

#[tokio::test(start_paused = true)]
async fn cancellation_during_retry_wait_yields_error_without_classification() {
    let client = Arc::new(ScriptedHttpClient::new());
    client.script(URL, vec![Ok(500), Ok(500)]);

    let cancel = CancellationToken::new();
    cancel.cancel();
    let result = prober(Arc::clone(&client), Severity::Down).probe(&cancel).await;

    assert!(matches!(result.error, Some(ProbeError::Cancelled(_))));
    assert!(result.reasons.is_empty());
    // The confirming request never happened.
    assert_eq!(client.calls().len(), 1);
}
