//! Configuration ownership and hot-reload.
//!
//! The [`ConfigManager`] owns the only mutable configuration state in the
//! process. Readers take cheap `Arc` snapshots; the watcher task is the
//! single writer and swaps the snapshot only after a candidate file has
//! parsed, default-filled and validated. A failed reload keeps the prior
//! configuration in place.

use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::types::MonitoringConfig;
use crate::config::validation::ConfigError;

type UpdateCallback = Box<dyn Fn(Arc<MonitoringConfig>) + Send + Sync>;

pub struct ConfigManager {
    path: PathBuf,
    current: Mutex<Arc<MonitoringConfig>>,
    on_update: Mutex<Option<UpdateCallback>>,
}

impl ConfigManager {
    /// Load the configuration file and take ownership of it. Fails when the
    /// initial file does not parse or validate.
    pub fn new(path: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        let path = path.into();
        let config = MonitoringConfig::load(&path)?;
        Ok(Self {
            path,
            current: Mutex::new(Arc::new(config)),
            on_update: Mutex::new(None),
        })
    }

    /// Snapshot of the current configuration. The snapshot is immutable;
    /// a reload publishes a new `Arc` rather than mutating in place.
    pub fn get(&self) -> Arc<MonitoringConfig> {
        self.current
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Register the update callback. A single subscriber is supported;
    /// registering again replaces the previous callback.
    pub fn on_update<F>(&self, callback: F)
    where
        F: Fn(Arc<MonitoringConfig>) + Send + Sync + 'static,
    {
        let mut slot = self
            .on_update
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        *slot = Some(Box::new(callback));
    }

    /// Poll the configuration file until cancelled. On a content change that
    /// parses and validates, swap the snapshot and invoke the registered
    /// callback with the new value. The callback runs on the watcher task
    /// and is never invoked concurrently with itself.
    pub async fn watch(&self, cancel: CancellationToken, poll_interval: Duration) {
        loop {
            tokio::select! {
                _ = cancel.cancelled() => return,
                _ = tokio::time::sleep(poll_interval) => {}
            }
            self.reload_once();
        }
    }

    fn reload_once(&self) {
        match MonitoringConfig::load(&self.path) {
            Ok(candidate) => {
                let candidate = Arc::new(candidate);
                let changed = {
                    let mut current = self
                        .current
                        .lock()
                        .unwrap_or_else(|poisoned| poisoned.into_inner());
                    if **current != *candidate {
                        *current = Arc::clone(&candidate);
                        true
                    } else {
                        false
                    }
                };
                if changed {
                    info!(path = %self.path.display(), "configuration changed, publishing update");
                    let slot = self
                        .on_update
                        .lock()
                        .unwrap_or_else(|poisoned| poisoned.into_inner());
                    if let Some(callback) = slot.as_ref() {
                        callback(candidate);
                    }
                } else {
                    debug!(path = %self.path.display(), "configuration unchanged");
                }
            }
            Err(err) => {
                warn!(
                    path = %self.path.display(),
                    error = %err,
                    "configuration reload failed, keeping previous configuration"
                );
            }
        }
    }
}
