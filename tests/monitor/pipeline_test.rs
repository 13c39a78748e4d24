//! End-to-end cycles: configuration through probers, merge and report.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use component_monitor::config::MonitoringConfig;
use component_monitor::core::orchestrator::{build_probers, Orchestrator};
use component_monitor::core::probe::http::HttpProbeClient;
use component_monitor::core::probe::prometheus::{QueryValue, VectorSample};
use component_monitor::core::resolver::ClientPool;
use component_monitor::core::status::Status;

use crate::common::{RecordingSink, ScriptedHttpClient, ScriptedQueryClient};

const CONFIG: &str = r#"
frequency: 1s
components:
  - component_slug: api
    sub_component_slug: gateway
    http_monitor:
      url: http://gateway.example.com/healthz
      code: 200
      retry_after: 10ms
  - component_slug: api
    sub_component_slug: errors
    prometheus_monitor:
      prometheus_location:
        url: http://prometheus.example.com
      queries:
        - query: rate(errors[5m]) < 1
"#;

#[tokio::test(start_paused = true)]
async fn full_cycle_reports_merged_statuses_for_all_components() {
    let config = MonitoringConfig::from_yaml(CONFIG).unwrap();

    let http = Arc::new(ScriptedHttpClient::new());
    http.script("http://gateway.example.com/healthz", vec![Ok(200)]);
    let queries = Arc::new(ScriptedQueryClient::new());
    queries.script(
        "rate(errors[5m]) < 1",
        Ok(QueryValue::Vector(vec![VectorSample {
            labels: Default::default(),
            value: 1.0,
        }])),
    );

    let mut pool = ClientPool::default();
    pool.insert("http://prometheus.example.com".to_string(), queries);
    let http_client: Arc<dyn HttpProbeClient> = http;
    let probers = build_probers(&config, &pool, &http_client).unwrap();
    assert_eq!(probers.len(), 2);

    let sink = RecordingSink::new();
    let mut orchestrator = Orchestrator::new(probers, config.frequency, sink.clone());
    assert!(orchestrator.run_once(&CancellationToken::new()).await);

    let batches = sink.batches();
    assert_eq!(batches.len(), 1);
    let batch = &batches[0];
    assert_eq!(batch.len(), 2);
    assert_eq!(batch[0].sub_component_slug, "errors");
    assert_eq!(batch[1].sub_component_slug, "gateway");
    assert!(batch.iter().all(|m| m.status == Status::Healthy));
    assert!(batch.iter().all(|m| m.reasons.is_empty()));
}

#[tokio::test(start_paused = true)]
async fn errored_probe_with_healthy_sibling_omits_the_pair() {
    let yaml = r#"
frequency: 1s
components:
  - component_slug: api
    sub_component_slug: gateway
    http_monitor:
      url: http://replica-a.example.com/healthz
      code: 200
      retry_after: 10ms
  - component_slug: api
    sub_component_slug: gateway
    http_monitor:
      url: http://replica-b.example.com/healthz
      code: 200
      retry_after: 10ms
"#;
    let config = MonitoringConfig::from_yaml(yaml).unwrap();

    let http = Arc::new(ScriptedHttpClient::new());
    http.script(
        "http://replica-a.example.com/healthz",
        vec![Err("connection reset".to_string())],
    );
    http.script("http://replica-b.example.com/healthz", vec![Ok(200)]);

    let pool = ClientPool::default();
    let http_client: Arc<dyn HttpProbeClient> = http;
    let probers = build_probers(&config, &pool, &http_client).unwrap();

    let sink = RecordingSink::new();
    let mut orchestrator = Orchestrator::new(probers, config.frequency, sink.clone());
    assert!(orchestrator.run_once(&CancellationToken::new()).await);

    // The errored probe plus an otherwise-healthy sibling withholds the pair
    // entirely; the dashboard's absent-report detector takes it from there.
    let batches = sink.batches();
    assert_eq!(batches.len(), 1);
    assert!(batches[0].is_empty());
}

#[tokio::test(start_paused = true)]
async fn confirmed_miss_reports_the_configured_severity_end_to_end() {
    let yaml = r#"
frequency: 1s
components:
  - component_slug: api
    sub_component_slug: gateway
    http_monitor:
      url: http://gateway.example.com/healthz
      code: 200
      retry_after: 10ms
      severity: CapacityExhausted
"#;
    let config = MonitoringConfig::from_yaml(yaml).unwrap();

    let http = Arc::new(ScriptedHttpClient::new());
    http.script(
        "http://gateway.example.com/healthz",
        vec![Ok(503), Ok(503)],
    );

    let pool = ClientPool::default();
    let http_client: Arc<dyn HttpProbeClient> = http;
    let probers = build_probers(&config, &pool, &http_client).unwrap();

    let sink = RecordingSink::new();
    let mut orchestrator = Orchestrator::new(probers, config.frequency, sink.clone());
    assert!(orchestrator.run_once(&CancellationToken::new()).await);

    let batches = sink.batches();
    let batch = &batches[0];
    assert_eq!(batch.len(), 1);
    assert_eq!(batch[0].status, Status::CapacityExhausted);
    assert_eq!(batch[0].reasons.len(), 1);
    assert_eq!(batch[0].reasons[0].results, "Status code 503 (expected 200)");
}
