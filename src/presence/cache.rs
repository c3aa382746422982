//! Liveness registry keyed by session identity.
//!
//! Each heartbeat stores the time it was seen. "Online" is computed on
//! read against a caller-supplied window, so entries never need an explicit
//! delete. Old entries are dropped by [`PresenceCache::sweep`].
//!
//! The durable `online` flag is a best-effort mirror written from a
//! spawned task after the map update returns. Its failures are logged and
//! counted, and never reach the caller.

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::durable::UserStore;
use crate::error::StoreError;
use crate::observability::metrics;

/// Default staleness bound for "is online".
pub const DEFAULT_ONLINE_WINDOW: Duration = Duration::from_secs(30);

/// Default age after which an entry is swept.
pub const DEFAULT_RETENTION: Duration = Duration::from_secs(300);

/// Retry policy for durable online-flag writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MirrorPolicy {
    /// Per-attempt timeout.
    pub timeout: Duration,
    /// Attempts before giving up (at least one is always made).
    pub max_attempts: u32,
    /// Pause between attempts.
    pub backoff: Duration,
}

impl Default for MirrorPolicy {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(2),
            max_attempts: 3,
            backoff: Duration::from_millis(100),
        }
    }
}

/// Writes the durable online flag under `policy`.
///
/// # Errors
///
/// Returns the last error once every attempt failed or timed out.
pub async fn mirror_online(
    store: &dyn UserStore,
    identity: &str,
    online: bool,
    policy: MirrorPolicy,
) -> Result<(), StoreError> {
    let attempts = policy.max_attempts.max(1);
    let mut last_error = StoreError::Timeout(policy.timeout);

    for attempt in 1..=attempts {
        match tokio::time::timeout(policy.timeout, store.set_online(identity, online)).await {
            Ok(Ok(())) => return Ok(()),
            Ok(Err(StoreError::NotFound(id))) => return Err(StoreError::NotFound(id)),
            Ok(Err(e)) => last_error = e,
            Err(_) => last_error = StoreError::Timeout(policy.timeout),
        }
        debug!(identity, online, attempt, error = %last_error, "online flag write failed");
        if attempt < attempts {
            tokio::time::sleep(policy.backoff).await;
        }
    }

    Err(last_error)
}

/// Registry of last-seen heartbeats.
pub struct PresenceCache {
    entries: DashMap<String, Instant>,
    retention: Duration,
    store: Arc<dyn UserStore>,
    mirror: MirrorPolicy,
}

impl PresenceCache {
    /// Creates an empty cache mirroring into `store`.
    #[must_use]
    pub fn new(store: Arc<dyn UserStore>, retention: Duration, mirror: MirrorPolicy) -> Self {
        Self {
            entries: DashMap::new(),
            retention,
            store,
            mirror,
        }
    }

    /// Records a heartbeat for `identity`.
    ///
    /// The in-memory update is synchronous. When called inside a tokio
    /// runtime, the durable write is then dispatched on its own task.
    pub fn touch(&self, identity: &str) {
        let now = Instant::now();
        self.entries
            .entry(identity.to_string())
            .and_modify(|seen| *seen = (*seen).max(now))
            .or_insert(now);

        metrics::record_heartbeat();
        metrics::set_presence_entries(self.entries.len());

        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            debug!(identity, "no runtime, skipping online flag write");
            return;
        };
        let store = Arc::clone(&self.store);
        let policy = self.mirror;
        let identity = identity.to_string();
        runtime.spawn(async move {
            if let Err(e) = mirror_online(store.as_ref(), &identity, true, policy).await {
                warn!(identity = %identity, error = %e, "could not mark user online");
                metrics::record_mirror_failure(true);
            }
        });
    }

    /// Whether `identity` sent a heartbeat within `window`.
    #[must_use]
    pub fn is_online(&self, identity: &str, window: Duration) -> bool {
        let now = Instant::now();
        self.entries
            .get(identity)
            .is_some_and(|seen| now.saturating_duration_since(*seen) <= window)
    }

    /// Every identity seen within `window`, sorted.
    #[must_use]
    pub fn online(&self, window: Duration) -> Vec<String> {
        let now = Instant::now();
        let mut list: Vec<String> = self
            .entries
            .iter()
            .filter(|e| now.saturating_duration_since(*e.value()) <= window)
            .map(|e| e.key().clone())
            .collect();
        list.sort_unstable();
        list
    }

    /// Drops entries older than the retention period and returns them.
    pub fn sweep(&self) -> Vec<String> {
        let now = Instant::now();
        let mut evicted = Vec::new();
        self.entries.retain(|identity, seen| {
            let keep = now.saturating_duration_since(*seen) < self.retention;
            if !keep {
                evicted.push(identity.clone());
            }
            keep
        });

        if !evicted.is_empty() {
            debug!(count = evicted.len(), "swept stale presence entries");
            metrics::record_presence_evictions(evicted.len());
        }
        metrics::set_presence_entries(self.entries.len());
        evicted
    }

    /// Whether an entry exists for `identity`, however old.
    #[must_use]
    pub fn contains(&self, identity: &str) -> bool {
        self.entries.contains_key(identity)
    }

    /// Number of held entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the cache holds no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Durable store the cache mirrors into.
    #[must_use]
    pub fn store(&self) -> &Arc<dyn UserStore> {
        &self.store
    }

    /// Write policy used for the durable mirror.
    #[must_use]
    pub const fn mirror_policy(&self) -> MirrorPolicy {
        self.mirror
    }
}

impl std::fmt::Debug for PresenceCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PresenceCache")
            .field("entries", &self.entries.len())
            .field("retention", &self.retention)
            .field("mirror", &self.mirror)
            .finish_non_exhaustive()
    }
}
