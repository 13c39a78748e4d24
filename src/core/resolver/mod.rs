//! Resolution of configured Prometheus locations into ready query clients.
//!
//! A location is either a bare URL or a `cluster/namespace/route` triple
//! naming an OpenShift Route fronting the cluster's query endpoint. The
//! resolver turns each unique location into a `(base_url, transport)` pair;
//! the [`ClientPool`] builds one query client per unique location so probers
//! sharing a location share the client.

pub mod kubeconfig;

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::config::types::{LocationKind, MonitoringConfig, PrometheusLocation};
use crate::core::probe::prometheus::{PromHttpClient, QueryClient};
use crate::core::resolver::kubeconfig::ClusterCredentials;

/// Cluster name selecting in-process service-account credentials.
pub const IN_CLUSTER: &str = "in-cluster";

/// Transport-level timeout for query and route-resolution requests.
const TRANSPORT_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, thiserror::Error)]
pub enum ResolveError {
    #[error("invalid prometheus_location: {0}")]
    InvalidLocation(String),
    #[error("credentials for cluster {cluster:?} not usable: {detail}")]
    Credentials { cluster: String, detail: String },
    #[error("failed to build HTTP transport: {0}")]
    Transport(String),
    #[error("failed to resolve route {namespace}/{route} on cluster {cluster:?}: {detail}")]
    Route {
        cluster: String,
        namespace: String,
        route: String,
        detail: String,
    },
    #[error("failed to construct query client for {key}: {detail}")]
    Client { key: String, detail: String },
    #[error("no query client for location {0}")]
    MissingClient(String),
}

/// A resolved endpoint: where to query and the transport to query it with.
pub struct ResolvedEndpoint {
    pub base_url: String,
    pub transport: reqwest::Client,
}

/// Maps a [`PrometheusLocation`] to a ready-to-use endpoint.
#[async_trait]
pub trait PrometheusEndpointResolver: Send + Sync {
    async fn resolve(&self, location: &PrometheusLocation)
        -> Result<ResolvedEndpoint, ResolveError>;
}

/// Production resolver: URL locations pass through; cluster locations load
/// credentials (kubeconfig file or in-cluster service account) and look the
/// route's host up via the cluster API.
pub struct KubeResolver {
    kubeconfig_dir: Option<PathBuf>,
}

impl KubeResolver {
    pub fn new(kubeconfig_dir: Option<PathBuf>) -> Self {
        Self { kubeconfig_dir }
    }

    fn credentials(&self, cluster: &str) -> Result<ClusterCredentials, ResolveError> {
        if cluster == IN_CLUSTER {
            return ClusterCredentials::in_cluster().map_err(|detail| ResolveError::Credentials {
                cluster: cluster.to_string(),
                detail,
            });
        }
        let dir = self
            .kubeconfig_dir
            .as_ref()
            .ok_or_else(|| ResolveError::Credentials {
                cluster: cluster.to_string(),
                detail: "--kubeconfig-dir is required for non in-cluster locations".to_string(),
            })?;
        ClusterCredentials::from_kubeconfig(&dir.join(format!("{cluster}.config"))).map_err(
            |detail| ResolveError::Credentials {
                cluster: cluster.to_string(),
                detail,
            },
        )
    }
}

#[async_trait]
impl PrometheusEndpointResolver for KubeResolver {
    async fn resolve(
        &self,
        location: &PrometheusLocation,
    ) -> Result<ResolvedEndpoint, ResolveError> {
        match location.kind() {
            Some(LocationKind::Url(url)) => Ok(ResolvedEndpoint {
                base_url: url.to_string(),
                transport: plain_transport()?,
            }),
            Some(LocationKind::Cluster {
                cluster,
                namespace,
                route,
            }) => {
                let credentials = self.credentials(cluster)?;
                let transport = credentials
                    .build_transport(TRANSPORT_TIMEOUT)
                    .map_err(ResolveError::Transport)?;
                let base_url =
                    resolve_route_url(&transport, &credentials.server, cluster, namespace, route)
                        .await?;
                tracing::info!(cluster, namespace, route, base_url = %base_url, "resolved prometheus route");
                Ok(ResolvedEndpoint {
                    base_url,
                    transport,
                })
            }
            None => Err(ResolveError::InvalidLocation(format!("{location:?}"))),
        }
    }
}

fn plain_transport() -> Result<reqwest::Client, ResolveError> {
    reqwest::Client::builder()
        .timeout(TRANSPORT_TIMEOUT)
        .build()
        .map_err(|e| ResolveError::Transport(e.to_string()))
}

/// Look up an OpenShift Route and derive the external query URL from its
/// host and TLS configuration.
async fn resolve_route_url(
    transport: &reqwest::Client,
    api_server: &str,
    cluster: &str,
    namespace: &str,
    route: &str,
) -> Result<String, ResolveError> {
    let route_err = |detail: String| ResolveError::Route {
        cluster: cluster.to_string(),
        namespace: namespace.to_string(),
        route: route.to_string(),
        detail,
    };

    let url = format!(
        "{}/apis/route.openshift.io/v1/namespaces/{}/routes/{}",
        api_server.trim_end_matches('/'),
        namespace,
        route
    );
    let response = transport
        .get(&url)
        .send()
        .await
        .map_err(|e| route_err(e.to_string()))?;
    if !response.status().is_success() {
        return Err(route_err(format!("cluster API returned {}", response.status())));
    }

    let body: serde_json::Value = response
        .json()
        .await
        .map_err(|e| route_err(format!("invalid route object: {e}")))?;
    let host = body
        .pointer("/spec/host")
        .and_then(|v| v.as_str())
        .ok_or_else(|| route_err("route has no spec.host".to_string()))?;
    let scheme = if body.pointer("/spec/tls").map_or(false, |v| !v.is_null()) {
        "https"
    } else {
        "http"
    };
    Ok(format!("{scheme}://{host}"))
}

/// One query client per unique location key, shared across probers.
#[derive(Default)]
pub struct ClientPool {
    clients: HashMap<String, Arc<dyn QueryClient>>,
}

impl ClientPool {
    /// Resolve every unique location in the configuration. Any resolution
    /// failure fails the whole build; callers decide whether that kills the
    /// process (startup) or keeps the previous generation (reload).
    pub async fn build(
        config: &MonitoringConfig,
        resolver: &dyn PrometheusEndpointResolver,
    ) -> Result<Self, ResolveError> {
        let mut pool = Self::default();
        for component in &config.components {
            let Some(prometheus) = &component.prometheus_monitor else {
                continue;
            };
            let key = prometheus.prometheus_location.key();
            if pool.clients.contains_key(&key) {
                continue;
            }
            let endpoint = resolver.resolve(&prometheus.prometheus_location).await?;
            let client = PromHttpClient::new(&endpoint.base_url, endpoint.transport).map_err(
                |e| ResolveError::Client {
                    key: key.clone(),
                    detail: e.to_string(),
                },
            )?;
            pool.clients.insert(key, Arc::new(client));
        }
        Ok(pool)
    }

    /// Insert a pre-built client under a location key. Used by tests and by
    /// callers wiring custom query clients.
    pub fn insert(&mut self, key: String, client: Arc<dyn QueryClient>) {
        self.clients.insert(key, client);
    }

    pub fn get(&self, location: &PrometheusLocation) -> Option<Arc<dyn QueryClient>> {
        self.clients.get(&location.key()).cloned()
    }

    pub fn len(&self) -> usize {
        self.clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }
}
