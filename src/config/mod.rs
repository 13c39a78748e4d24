pub mod manager;
pub mod types;
pub mod validation;

pub use manager::ConfigManager;
pub use types::{
    HttpMonitor, LocationKind, MonitoringComponent, MonitoringConfig, PrometheusLocation,
    PrometheusMonitor, PrometheusQuery,
};
pub use validation::{validate, ConfigError};
