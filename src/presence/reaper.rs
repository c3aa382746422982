//! Periodic sweep of the presence cache.
//!
//! Evicted identities are marked offline in the durable store, which also
//! clears their channel assignment. An identity that sent a heartbeat
//! between the sweep and the write is left alone.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::observability::metrics;

use super::cache::{PresenceCache, mirror_online};

/// Default interval between sweeps.
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(10);

/// Background job that sweeps a [`PresenceCache`].
#[derive(Debug)]
pub struct PresenceReaper {
    cache: Arc<PresenceCache>,
    interval: Duration,
    cancel: CancellationToken,
}

impl PresenceReaper {
    /// Creates a reaper; nothing runs until [`spawn`](Self::spawn).
    #[must_use]
    pub const fn new(cache: Arc<PresenceCache>, interval: Duration, cancel: CancellationToken) -> Self {
        Self {
            cache,
            interval,
            cancel,
        }
    }

    /// Runs one sweep and returns how many identities were marked offline.
    pub async fn run_once(&self) -> usize {
        let evicted = self.cache.sweep();
        let store = self.cache.store();
        let policy = self.cache.mirror_policy();

        let mut marked = 0;
        for identity in evicted {
            if self.cache.contains(&identity) {
                debug!(identity = %identity, "identity came back before offline write");
                continue;
            }
            match mirror_online(store.as_ref(), &identity, false, policy).await {
                Ok(()) => marked += 1,
                Err(e) => {
                    warn!(identity = %identity, error = %e, "could not mark user offline");
                    metrics::record_mirror_failure(false);
                }
            }
        }
        marked
    }

    /// Starts the sweep loop; it stops when the token is cancelled.
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(self.interval);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    () = self.cancel.cancelled() => {
                        debug!("presence reaper cancelled");
                        break;
                    }
                    _ = interval.tick() => {
                        let marked = self.run_once().await;
                        if marked > 0 {
                            debug!(marked, "marked idle users offline");
                        }
                    }
                }
            }
        })
    }
}
