//! Hot reload for the cache config file.
//!
//! The watcher polls the file's mtime on a fixed interval and forwards every
//! config that loads and passes [`CacheConfig::validate`]; the host applies
//! it with [`ResponseCache::reconfigure`](crate::ResponseCache::reconfigure).
//! Rejected edits are logged and the running configuration stays in place.

use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use tokio::sync::{mpsc, watch};
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::config::CacheConfig;
use crate::error::Result;

pub struct ConfigWatcher {
    path: PathBuf,
    poll_interval: Duration,
    last_mtime: Option<SystemTime>,
}

impl ConfigWatcher {
    pub fn new(path: PathBuf, poll_interval: Duration) -> Self {
        Self {
            path,
            poll_interval,
            last_mtime: None,
        }
    }

    /// Check the file once. `None` when its mtime has not moved since the
    /// last check, otherwise the outcome of loading it.
    pub fn poll(&mut self) -> Option<Result<CacheConfig>> {
        let current = read_mtime(&self.path);
        let moved = match (self.last_mtime, current) {
            (Some(prev), Some(next)) => next != prev,
            (None, Some(_)) => true,
            _ => false,
        };
        self.last_mtime = current;
        moved.then(|| CacheConfig::load_from_path(&self.path))
    }

    /// Forward reloaded configs to `tx` until shutdown.
    ///
    /// Stops when `shutdown_rx` sees `true`, when its sender is dropped, or
    /// when `tx` has no receiver left.
    pub async fn watch(
        mut self,
        tx: mpsc::UnboundedSender<CacheConfig>,
        mut shutdown_rx: watch::Receiver<bool>,
    ) {
        if *shutdown_rx.borrow() {
            return;
        }
        self.last_mtime = read_mtime(&self.path);

        let mut ticker = tokio::time::interval(self.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        ticker.tick().await;

        loop {
            tokio::select! {
                changed = shutdown_rx.changed() => match changed {
                    Ok(()) if *shutdown_rx.borrow() => {
                        info!("Cache config watcher shutting down");
                        return;
                    }
                    Ok(()) => continue,
                    Err(_) => {
                        debug!("Shutdown handle dropped, stopping cache config watcher");
                        return;
                    }
                },
                _ = ticker.tick() => {}
            }

            if tx.is_closed() {
                debug!("Cache config receiver dropped, stopping watcher");
                return;
            }

            match self.poll() {
                None => {}
                Some(Ok(config)) => {
                    debug!(path = %self.path.display(), "Cache config changed, reloading");
                    if tx.send(config).is_err() {
                        return;
                    }
                }
                Some(Err(err)) => warn!(
                    path = %self.path.display(),
                    error = %err,
                    "Cache config reload rejected; keeping running configuration"
                ),
            }
        }
    }
}

fn read_mtime(path: &Path) -> Option<SystemTime> {
    std::fs::metadata(path).ok().and_then(|m| m.modified().ok())
}
