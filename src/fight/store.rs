//! Encounter registry.
//!
//! Fights live in a `DashMap` keyed by encounter, each behind its own
//! mutex. The map shard lock is only held long enough to clone the entry
//! handle, so moves on different encounters never wait on each other,
//! while two moves on the same encounter run strictly one after another.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use rand::Rng;
use tokio::time::Instant;
use tracing::{debug, info};

use crate::error::FightError;
use crate::observability::metrics;

use super::engine::{FightEngine, TurnOutcome};
use super::types::{Fight, Move, SlimeFight};

/// Identifier handed back by [`EncounterStore::create`].
pub type FightId = u64;

/// Default time a finished fight stays readable.
pub const DEFAULT_TERMINAL_GRACE: Duration = Duration::from_secs(60);

/// Default time an unfinished fight may sit without a move or
/// acknowledgment before it is treated as abandoned.
pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(600);

/// A fight plus its activity timestamps.
#[derive(Debug)]
struct FightEntry {
    fight: Fight,
    last_activity: Instant,
    finished_at: Option<Instant>,
}

impl FightEntry {
    fn new(fight: Fight) -> Self {
        Self {
            fight,
            last_activity: Instant::now(),
            finished_at: None,
        }
    }

    /// Stores `fight` as the latest state, stamping activity and finish time.
    fn commit(&mut self, fight: Fight) {
        let now = Instant::now();
        self.last_activity = now;
        if fight.status.is_terminal() && self.finished_at.is_none() {
            self.finished_at = Some(now);
        }
        self.fight = fight;
    }

    /// Finished fights expire after `grace`; unfinished ones after `idle`
    /// without activity.
    fn is_expired(&self, now: Instant, grace: Duration, idle: Duration) -> bool {
        match self.finished_at {
            Some(at) => now.saturating_duration_since(at) >= grace,
            None => now.saturating_duration_since(self.last_activity) >= idle,
        }
    }
}

/// Locks an entry, recovering the guard if a previous holder panicked.
fn lock(entry: &Mutex<FightEntry>) -> MutexGuard<'_, FightEntry> {
    entry.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Registry of active fights with per-encounter serialization.
pub struct EncounterStore {
    fights: DashMap<FightId, Arc<Mutex<FightEntry>>>,
    engine: FightEngine,
    terminal_grace: Duration,
    idle_timeout: Duration,
}

impl EncounterStore {
    /// Creates an empty store with the default idle timeout.
    #[must_use]
    pub fn new(engine: FightEngine, terminal_grace: Duration) -> Self {
        Self {
            fights: DashMap::new(),
            engine,
            terminal_grace,
            idle_timeout: DEFAULT_IDLE_TIMEOUT,
        }
    }

    /// Sets how long an unfinished fight may go untouched.
    #[must_use]
    pub const fn with_idle_timeout(mut self, idle_timeout: Duration) -> Self {
        self.idle_timeout = idle_timeout;
        self
    }

    /// Returns the engine used to resolve turns.
    #[must_use]
    pub const fn engine(&self) -> &FightEngine {
        &self.engine
    }

    /// Registers a new fight at `key`.
    ///
    /// A finished fight still inside its grace period is replaced, as is an
    /// unfinished one idle past the idle timeout.
    ///
    /// # Errors
    ///
    /// Returns [`FightError::Conflict`] if a live, non-terminal fight holds
    /// `key`.
    pub fn create(
        &self,
        key: FightId,
        wild: SlimeFight,
        attacker: SlimeFight,
        hunter: &str,
    ) -> Result<FightId, FightError> {
        let entry = Arc::new(Mutex::new(FightEntry::new(Fight::new(wild, attacker, hunter))));

        match self.fights.entry(key) {
            Entry::Occupied(mut occupied) => {
                let replaceable = {
                    let current = lock(occupied.get());
                    current.fight.status.is_terminal() || self.is_expired(&current)
                };
                if !replaceable {
                    debug!(key, hunter, "encounter already in progress");
                    return Err(FightError::Conflict { key });
                }
                occupied.insert(entry);
            }
            Entry::Vacant(vacant) => {
                vacant.insert(entry);
            }
        }

        info!(key, hunter, "fight started");
        metrics::record_fight_started();
        Ok(key)
    }

    /// Applies the hunter's move and returns the resolved fight.
    ///
    /// # Errors
    ///
    /// `NotFound` when no fight exists at `key` or it has expired; otherwise
    /// any rejection from [`FightEngine::validate`], carrying the unchanged
    /// fight.
    pub fn apply_move(&self, key: FightId, hunter: &str, mv: Move) -> Result<Fight, FightError> {
        self.apply_move_with(key, hunter, mv, &mut rand::rng())
            .map(|outcome| outcome.fight)
    }

    /// Same as [`apply_move`](Self::apply_move) with a caller-supplied RNG,
    /// returning the full turn report.
    ///
    /// # Errors
    ///
    /// See [`apply_move`](Self::apply_move).
    pub fn apply_move_with<R: Rng + ?Sized>(
        &self,
        key: FightId,
        hunter: &str,
        mv: Move,
        rng: &mut R,
    ) -> Result<TurnOutcome, FightError> {
        let handle = self.handle(key)?;
        let mut entry = lock(&handle);
        if self.is_expired(&entry) {
            return Err(FightError::NotFound { key });
        }

        let outcome = match self.engine.resolve(key, &entry.fight, hunter, mv, rng) {
            Ok(outcome) => outcome,
            Err(err) => {
                debug!(
                    key,
                    hunter,
                    action = mv.as_str(),
                    error = err.code(),
                    "move rejected"
                );
                metrics::record_move(mv.as_str(), err.code());
                return Err(err);
            }
        };

        entry.commit(outcome.fight.clone());
        drop(entry);

        debug!(
            key,
            hunter,
            action = mv.as_str(),
            damage_dealt = outcome.damage_dealt,
            damage_taken = outcome.damage_taken,
            status = %outcome.fight.status,
            "move applied"
        );
        metrics::record_move(mv.as_str(), "applied");
        if outcome.fight.status.is_terminal() {
            info!(
                key,
                hunter,
                status = %outcome.fight.status,
                captured = outcome.captured,
                "fight finished"
            );
            metrics::record_fight_finished(outcome.fight.status.as_str());
        }

        Ok(outcome)
    }

    /// Releases the acknowledgment barrier on a held turn.
    ///
    /// # Errors
    ///
    /// `NotFound` (also for an expired fight), `Unauthorized`, or
    /// `InvalidState` (unless `WaitingOnTx`).
    pub fn acknowledge(&self, key: FightId, hunter: &str) -> Result<Fight, FightError> {
        let handle = self.handle(key)?;
        let mut entry = lock(&handle);
        if self.is_expired(&entry) {
            return Err(FightError::NotFound { key });
        }
        let next = self.engine.acknowledge(key, &entry.fight, hunter)?;
        entry.commit(next.clone());
        drop(entry);

        debug!(key, hunter, "turn acknowledged");
        Ok(next)
    }

    /// Returns a snapshot of the fight at `key`.
    ///
    /// # Errors
    ///
    /// Returns [`FightError::NotFound`] if there is no fight, if it
    /// finished longer ago than the grace period, or if it was abandoned.
    pub fn get(&self, key: FightId) -> Result<Fight, FightError> {
        let handle = self.handle(key)?;
        let entry = lock(&handle);
        if self.is_expired(&entry) {
            return Err(FightError::NotFound { key });
        }
        Ok(entry.fight.clone())
    }

    /// Removes finished fights whose grace period has elapsed and
    /// unfinished fights idle past the idle timeout.
    ///
    /// Returns the number of fights removed.
    pub fn evict_finished(&self) -> usize {
        let now = Instant::now();
        let mut evicted = 0;
        self.fights.retain(|_, entry| {
            let expired = lock(entry).is_expired(now, self.terminal_grace, self.idle_timeout);
            if expired {
                evicted += 1;
            }
            !expired
        });
        if evicted > 0 {
            debug!(evicted, "evicted finished fights");
        }
        evicted
    }

    /// Number of fights held, finished ones included.
    #[must_use]
    pub fn len(&self) -> usize {
        self.fights.len()
    }

    /// Whether the store holds no fights.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fights.is_empty()
    }

    /// Number of fights that have not reached a terminal status.
    #[must_use]
    pub fn active_count(&self) -> usize {
        self.fights
            .iter()
            .filter(|item| !lock(item.value()).fight.status.is_terminal())
            .count()
    }

    fn is_expired(&self, entry: &FightEntry) -> bool {
        entry.is_expired(Instant::now(), self.terminal_grace, self.idle_timeout)
    }

    fn handle(&self, key: FightId) -> Result<Arc<Mutex<FightEntry>>, FightError> {
        self.fights
            .get(&key)
            .map(|item| Arc::clone(item.value()))
            .ok_or(FightError::NotFound { key })
    }
}

impl Default for EncounterStore {
    fn default() -> Self {
        Self::new(FightEngine::default(), DEFAULT_TERMINAL_GRACE)
    }
}

impl std::fmt::Debug for EncounterStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EncounterStore")
            .field("fights", &self.fights.len())
            .field("terminal_grace", &self.terminal_grace)
            .field("idle_timeout", &self.idle_timeout)
            .finish_non_exhaustive()
    }
}
