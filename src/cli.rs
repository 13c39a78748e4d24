use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

#[derive(Parser, Debug)]
#[command(name = "component-monitor")]
#[command(version)]
#[command(about = "Probes configured sub-components and reports their health to the status dashboard")]
pub struct Cli {
    /// Path to the monitoring configuration file
    #[arg(long = "config-path")]
    pub config_path: PathBuf,

    /// Base URL of the status dashboard (required unless --dry-run)
    #[arg(long = "dashboard-url")]
    pub dashboard_url: Option<String>,

    /// Identifier of this monitor instance
    #[arg(long = "name")]
    pub name: String,

    /// Directory holding one <cluster>.config kubeconfig per cluster
    /// referenced by the configuration
    #[arg(long = "kubeconfig-dir")]
    pub kubeconfig_dir: Option<PathBuf>,

    /// File containing the dashboard bearer token (required unless --dry-run)
    #[arg(long = "report-auth-token-file")]
    pub report_auth_token_file: Option<PathBuf>,

    /// Run a single probe cycle, print the report to stdout, and exit
    #[arg(long = "dry-run")]
    pub dry_run: bool,

    /// How often to poll the configuration file for changes
    #[arg(long = "config-update-poll-interval", default_value = "30s", value_parser = humantime::parse_duration)]
    pub config_update_poll_interval: Duration,
}

impl Cli {
    pub fn parse_args() -> Self {
        Self::parse()
    }
}
