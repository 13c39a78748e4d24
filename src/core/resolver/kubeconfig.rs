//! Cluster credential loading for the route-based Prometheus locations.
//!
//! Two sources are supported: a per-cluster kubeconfig file named
//! `<cluster>.config` inside `--kubeconfig-dir`, and the in-cluster
//! service-account mount. Only bearer-token credentials are usable here;
//! client-certificate kubeconfigs are rejected with a descriptive error so
//! the process fails at startup rather than mid-cycle.

use std::path::Path;
use std::time::Duration;

use base64::Engine;
use serde::Deserialize;

const SERVICE_ACCOUNT_DIR: &str = "/var/run/secrets/kubernetes.io/serviceaccount";

/// Credentials and endpoint of one cluster API server.
#[derive(Debug, Clone)]
pub struct ClusterCredentials {
    pub server: String,
    pub token: String,
    pub ca_pem: Option<Vec<u8>>,
    pub insecure_skip_tls_verify: bool,
}

#[derive(Debug, Deserialize)]
struct Kubeconfig {
    #[serde(default)]
    clusters: Vec<NamedCluster>,
    #[serde(default)]
    users: Vec<NamedUser>,
}

#[derive(Debug, Deserialize)]
struct NamedCluster {
    cluster: ClusterEntry,
}

#[derive(Debug, Deserialize)]
struct ClusterEntry {
    server: String,
    #[serde(rename = "certificate-authority-data")]
    certificate_authority_data: Option<String>,
    #[serde(rename = "certificate-authority")]
    certificate_authority: Option<String>,
    #[serde(rename = "insecure-skip-tls-verify", default)]
    insecure_skip_tls_verify: bool,
}

#[derive(Debug, Deserialize)]
struct NamedUser {
    user: UserEntry,
}

#[derive(Debug, Deserialize, Default)]
struct UserEntry {
    token: Option<String>,
    #[serde(rename = "client-certificate-data")]
    client_certificate_data: Option<String>,
}

impl ClusterCredentials {
    /// Load from a kubeconfig file holding one cluster and one bearer-token
    /// user (the shape `--kubeconfig-dir` files are provisioned in).
    pub fn from_kubeconfig(path: &Path) -> Result<Self, String> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| format!("failed to read {}: {e}", path.display()))?;
        let kubeconfig: Kubeconfig = serde_yaml::from_str(&raw)
            .map_err(|e| format!("failed to parse {}: {e}", path.display()))?;

        let cluster = kubeconfig
            .clusters
            .first()
            .map(|c| &c.cluster)
            .ok_or_else(|| format!("{} defines no clusters", path.display()))?;
        let user = kubeconfig
            .users
            .first()
            .map(|u| &u.user)
            .ok_or_else(|| format!("{} defines no users", path.display()))?;

        if user.client_certificate_data.is_some() {
            return Err(format!(
                "{} uses client-certificate credentials; only bearer tokens are supported",
                path.display()
            ));
        }
        let token = user
            .token
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or_else(|| format!("{} has no bearer token", path.display()))?
            .to_string();

        let ca_pem = match (&cluster.certificate_authority_data, &cluster.certificate_authority) {
            (Some(data), _) => Some(
                base64::engine::general_purpose::STANDARD
                    .decode(data.trim())
                    .map_err(|e| format!("invalid certificate-authority-data: {e}"))?,
            ),
            (None, Some(ca_path)) => Some(
                std::fs::read(ca_path)
                    .map_err(|e| format!("failed to read certificate-authority {ca_path}: {e}"))?,
            ),
            (None, None) => None,
        };

        Ok(Self {
            server: cluster.server.trim_end_matches('/').to_string(),
            token,
            ca_pem,
            insecure_skip_tls_verify: cluster.insecure_skip_tls_verify,
        })
    }

    /// Load the in-cluster service-account credentials.
    pub fn in_cluster() -> Result<Self, String> {
        let dir = Path::new(SERVICE_ACCOUNT_DIR);
        let token = std::fs::read_to_string(dir.join("token"))
            .map_err(|e| format!("failed to read service-account token: {e}"))?
            .trim()
            .to_string();
        if token.is_empty() {
            return Err("service-account token file is empty".to_string());
        }
        let ca_pem = std::fs::read(dir.join("ca.crt"))
            .map_err(|e| format!("failed to read service-account CA: {e}"))?;

        let host = std::env::var("KUBERNETES_SERVICE_HOST")
            .map_err(|_| "KUBERNETES_SERVICE_HOST is not set".to_string())?;
        let port = std::env::var("KUBERNETES_SERVICE_PORT").unwrap_or_else(|_| "443".to_string());

        Ok(Self {
            server: format!("https://{host}:{port}"),
            token,
            ca_pem: Some(ca_pem),
            insecure_skip_tls_verify: false,
        })
    }

    /// Build the authenticated transport used both for route resolution and
    /// for the queries that follow.
    pub fn build_transport(&self, timeout: Duration) -> Result<reqwest::Client, String> {
        use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};

        let mut headers = HeaderMap::new();
        let mut bearer = HeaderValue::from_str(&format!("Bearer {}", self.token))
            .map_err(|e| format!("token is not a valid header value: {e}"))?;
        bearer.set_sensitive(true);
        headers.insert(AUTHORIZATION, bearer);

        let mut builder = reqwest::Client::builder()
            .timeout(timeout)
            .default_headers(headers);
        if let Some(ca_pem) = &self.ca_pem {
            let certificate = reqwest::Certificate::from_pem(ca_pem)
                .map_err(|e| format!("invalid CA certificate: {e}"))?;
            builder = builder.add_root_certificate(certificate);
        }
        if self.insecure_skip_tls_verify {
            builder = builder.danger_accept_invalid_certs(true);
        }
        builder.build().map_err(|e| e.to_string())
    }
}
