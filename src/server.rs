//! Server runtime wiring fights, presence and the HTTP router.
//!
//! The [`Server`] owns every long-lived component explicitly: the
//! encounter store, the presence cache, the durable collaborators, and the
//! two periodic jobs (finished-fight sweeper and presence reaper). A single
//! [`CancellationToken`] stops all of them.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::schema::{CatalogSection, ServerConfig, StoreKind, StoreSection};
use crate::durable::{HttpUserStore, MemorySlimeCatalog, MemoryUserStore, SlimeCatalog, UserStore};
use crate::error::{ConfigError, SlimyError};
use crate::fight::{EncounterStore, FightEngine};
use crate::observability::metrics;
use crate::presence::{PresenceCache, PresenceReaper};
use crate::transport::{self, HttpConfig};

/// Shared state behind every request handler.
pub struct AppState {
    /// Active encounters
    pub fights: EncounterStore,
    /// Heartbeat registry
    pub presence: Arc<PresenceCache>,
    /// Source of combat stats for new encounters
    pub catalog: Arc<dyn SlimeCatalog>,
    /// Default staleness bound for online queries
    pub online_window: Duration,
}

impl AppState {
    /// Builds state from configuration and the durable collaborators.
    #[must_use]
    pub fn new(
        config: &ServerConfig,
        users: Arc<dyn UserStore>,
        catalog: Arc<dyn SlimeCatalog>,
    ) -> Self {
        let engine = FightEngine::new(config.fight.rules());
        Self {
            fights: EncounterStore::new(engine, config.fight.terminal_grace)
                .with_idle_timeout(config.fight.idle_timeout),
            presence: Arc::new(PresenceCache::new(
                users,
                config.presence.retention,
                config.presence.mirror_policy(),
            )),
            catalog,
            online_window: config.presence.online_window,
        }
    }
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("fights", &self.fights)
            .field("presence", &self.presence)
            .field("online_window", &self.online_window)
            .finish_non_exhaustive()
    }
}

/// Builds the durable user store selected by the `store:` section.
///
/// # Errors
///
/// Returns [`ConfigError::InvalidValue`] for an unusable HTTP store URL.
pub fn user_store(section: &StoreSection) -> Result<Arc<dyn UserStore>, ConfigError> {
    match (section.kind, section.url.as_deref()) {
        (StoreKind::Memory, _) => Ok(Arc::new(MemoryUserStore::new())),
        (StoreKind::Http, Some(url)) => Ok(Arc::new(HttpUserStore::new(url, section.timeout)?)),
        (StoreKind::Http, None) => Err(ConfigError::InvalidValue {
            field: "store.url".to_string(),
            value: String::new(),
            expected: "a base URL for the http store".to_string(),
        }),
    }
}

/// Builds the in-memory slime catalog from the `catalog:` section.
#[must_use]
pub fn slime_catalog(section: &CatalogSection) -> MemorySlimeCatalog {
    let catalog = MemorySlimeCatalog::new();
    for (id, stats) in &section.wild {
        catalog.insert_wild(*id, stats.to_fight());
    }
    for owned in &section.hunters {
        catalog.set_hunter_slime(&owned.hunter, owned.slime_id, owned.stats.to_fight());
    }
    catalog
}

/// Running server: HTTP listener plus background jobs.
pub struct Server {
    state: Arc<AppState>,
    http: HttpConfig,
    fight_sweep_interval: Duration,
    presence_sweep_interval: Duration,
    cancel: CancellationToken,
}

impl Server {
    /// Creates a server; nothing is bound until [`run`](Self::run).
    #[must_use]
    pub fn new(
        config: &ServerConfig,
        http: HttpConfig,
        state: Arc<AppState>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            state,
            http,
            fight_sweep_interval: config.fight.sweep_interval,
            presence_sweep_interval: config.presence.sweep_interval,
            cancel,
        }
    }

    /// Shared handler state.
    #[must_use]
    pub const fn state(&self) -> &Arc<AppState> {
        &self.state
    }

    /// Binds the listener and starts the background jobs.
    ///
    /// Returns the bound address and a handle that resolves once everything
    /// has stopped after cancellation.
    ///
    /// # Errors
    ///
    /// Returns a transport error if the listener cannot be bound.
    pub async fn start(self) -> Result<(SocketAddr, JoinHandle<()>), SlimyError> {
        let (http_handle, bound_addr) =
            transport::serve(&self.http, Arc::clone(&self.state), self.cancel.clone()).await?;

        let sweeper = spawn_fight_sweeper(
            Arc::clone(&self.state),
            self.fight_sweep_interval,
            self.cancel.clone(),
        );
        let reaper = PresenceReaper::new(
            Arc::clone(&self.state.presence),
            self.presence_sweep_interval,
            self.cancel.clone(),
        )
        .spawn();

        let done = tokio::spawn(async move {
            if let Err(e) = http_handle.await {
                warn!(error = %e, "HTTP server task panicked");
            }
            for (name, handle) in [("fight sweeper", sweeper), ("presence reaper", reaper)] {
                match tokio::time::timeout(Duration::from_secs(2), handle).await {
                    Ok(Ok(())) => {}
                    Ok(Err(e)) if e.is_cancelled() => {}
                    Ok(Err(e)) => warn!(task = name, error = %e, "background task panicked"),
                    Err(_) => warn!(task = name, "background task did not finish within 2s"),
                }
            }
            debug!("server stopped");
        });

        Ok((bound_addr, done))
    }

    /// Serves until the cancellation token fires.
    ///
    /// # Errors
    ///
    /// Returns a transport error if the listener cannot be bound.
    pub async fn run(self) -> Result<(), SlimyError> {
        let (bound_addr, done) = self.start().await?;
        info!(%bound_addr, "slimy listening");
        done.await
            .map_err(|e| SlimyError::Io(std::io::Error::other(e.to_string())))
    }
}

impl std::fmt::Debug for Server {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Server")
            .field("http", &self.http)
            .field("fight_sweep_interval", &self.fight_sweep_interval)
            .field("presence_sweep_interval", &self.presence_sweep_interval)
            .finish_non_exhaustive()
    }
}

/// Periodically evicts finished and abandoned fights and refreshes the active gauge.
fn spawn_fight_sweeper(
    state: Arc<AppState>,
    interval: Duration,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                () = cancel.cancelled() => {
                    debug!("fight sweeper cancelled");
                    break;
                }
                _ = ticker.tick() => {
                    let evicted = state.fights.evict_finished();
                    if evicted > 0 {
                        debug!(evicted, "swept finished fights");
                    }
                    metrics::set_fights_active(state.fights.active_count());
                }
            }
        }
    })
}
