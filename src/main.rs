use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use component_monitor::cli::Cli;
use component_monitor::config::{ConfigManager, MonitoringConfig};
use component_monitor::core::orchestrator::{build_probers, Orchestrator};
use component_monitor::core::probe::http::{HttpProbeClient, IsahcProbeClient};
use component_monitor::core::report::{
    read_token_file, DashboardClient, ReportSink, StdoutReporter,
};
use component_monitor::core::resolver::{ClientPool, KubeResolver};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse_args();
    run(cli).await
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let manager = Arc::new(ConfigManager::new(cli.config_path.clone())?);
    let resolver = KubeResolver::new(cli.kubeconfig_dir.clone());
    let http_client: Arc<dyn HttpProbeClient> = Arc::new(IsahcProbeClient::new()?);

    // Dry run: one cycle against stdout, then exit.
    if cli.dry_run {
        let sink: Arc<dyn ReportSink> = Arc::new(StdoutReporter::new(cli.name.clone()));
        let mut orchestrator =
            prepare_orchestrator(manager.get(), &resolver, &http_client, &sink).await?;
        orchestrator.run_once(&CancellationToken::new()).await;
        return Ok(());
    }

    let dashboard_url = cli
        .dashboard_url
        .as_deref()
        .ok_or("--dashboard-url is required unless --dry-run is set")?;
    let token_path = cli
        .report_auth_token_file
        .as_deref()
        .ok_or("--report-auth-token-file is required unless --dry-run is set")?;
    let token = read_token_file(token_path)?;
    let sink: Arc<dyn ReportSink> =
        Arc::new(DashboardClient::new(dashboard_url, cli.name.clone(), token)?);

    let root = CancellationToken::new();

    // The watcher signals updates; the supervisor always applies the manager's
    // latest snapshot, so coalescing pending signals is safe.
    let (update_tx, mut update_rx) = mpsc::channel::<()>(1);
    manager.on_update(move |_| {
        let _ = update_tx.try_send(());
    });
    let watcher = {
        let manager = Arc::clone(&manager);
        let cancel = root.child_token();
        let poll_interval = cli.config_update_poll_interval;
        tokio::spawn(async move { manager.watch(cancel, poll_interval).await })
    };

    let orchestrator =
        prepare_orchestrator(manager.get(), &resolver, &http_client, &sink).await?;
    let mut generation = Generation::spawn(orchestrator, &root);
    info!(name = %cli.name, "component monitor started");

    let mut sigterm = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())?;
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("received interrupt, shutting down");
                break;
            }
            _ = sigterm.recv() => {
                info!("received SIGTERM, shutting down");
                break;
            }
            received = update_rx.recv() => {
                if received.is_none() {
                    break;
                }
                let config = manager.get();
                match prepare_orchestrator(Arc::clone(&config), &resolver, &http_client, &sink).await {
                    Ok(next) => {
                        // Old generation stops before the new one starts so
                        // reports never interleave.
                        generation.shutdown().await;
                        generation = Generation::spawn(next, &root);
                        info!("applied updated configuration");
                    }
                    Err(err) => {
                        error!(error = %err, "failed to apply updated configuration, keeping previous orchestrator");
                    }
                }
            }
        }
    }

    generation.shutdown().await;
    root.cancel();
    let _ = watcher.await;
    Ok(())
}

/// Build everything a generation needs from one config snapshot. Fallible
/// without side effects: a failure here leaves any running generation alone.
async fn prepare_orchestrator(
    config: Arc<MonitoringConfig>,
    resolver: &KubeResolver,
    http_client: &Arc<dyn HttpProbeClient>,
    sink: &Arc<dyn ReportSink>,
) -> Result<Orchestrator, Box<dyn std::error::Error>> {
    let pool = ClientPool::build(&config, resolver).await?;
    let probers = build_probers(&config, &pool, http_client)?;
    info!(
        probers = probers.len(),
        prometheus_endpoints = pool.len(),
        frequency = ?config.frequency,
        "prepared orchestrator"
    );
    Ok(Orchestrator::new(
        probers,
        config.frequency,
        Arc::clone(sink),
    ))
}

/// One running orchestrator with its cancellation scope.
struct Generation {
    cancel: CancellationToken,
    handle: tokio::task::JoinHandle<()>,
}

impl Generation {
    fn spawn(mut orchestrator: Orchestrator, parent: &CancellationToken) -> Self {
        let cancel = parent.child_token();
        let token = cancel.clone();
        let handle = tokio::spawn(async move { orchestrator.run(token).await });
        Self { cancel, handle }
    }

    async fn shutdown(self) {
        self.cancel.cancel();
        if let Err(err) = self.handle.await {
            error!(error = %err, "orchestrator task failed");
        }
    }
}
