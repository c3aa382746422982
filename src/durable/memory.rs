//! In-memory durable collaborators.
//!
//! Used when no remote store is configured and throughout the tests.
//! `MemoryUserStore` can be switched into a failing mode to exercise the
//! best-effort paths.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use async_trait::async_trait;
use dashmap::DashMap;

use crate::error::StoreError;
use crate::fight::types::SlimeFight;

use super::{SlimeCatalog, UserId, UserStore};

#[derive(Debug, Clone)]
struct UserRecord {
    id: UserId,
    username: String,
    online: bool,
    channel: Option<String>,
}

/// User table held in process memory.
///
/// `set_online` registers identities it has not seen, with the identity
/// doubling as the username.
#[derive(Debug)]
pub struct MemoryUserStore {
    users: DashMap<String, UserRecord>,
    next_id: AtomicU64,
    failing: AtomicBool,
    writes: AtomicU64,
}

impl MemoryUserStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self {
            users: DashMap::new(),
            next_id: AtomicU64::new(1),
            failing: AtomicBool::new(false),
            writes: AtomicU64::new(0),
        }
    }

    /// Registers `identity` (or returns its existing id).
    pub fn register(&self, identity: &str, username: &str) -> UserId {
        self.users
            .entry(identity.to_string())
            .or_insert_with(|| UserRecord {
                id: self.next_id.fetch_add(1, Ordering::SeqCst),
                username: username.to_string(),
                online: false,
                channel: None,
            })
            .id
    }

    /// Records the channel an identity last posted to.
    pub fn set_channel(&self, identity: &str, channel: &str) {
        if let Some(mut user) = self.users.get_mut(identity) {
            user.channel = Some(channel.to_string());
        }
    }

    /// Durable online flag, or `None` for an unknown identity.
    #[must_use]
    pub fn online_flag(&self, identity: &str) -> Option<bool> {
        self.users.get(identity).map(|u| u.online)
    }

    /// Channel assignment of an identity.
    #[must_use]
    pub fn channel(&self, identity: &str) -> Option<String> {
        self.users.get(identity).and_then(|u| u.channel.clone())
    }

    /// Makes every subsequent call fail with a network error.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Number of `set_online` calls that reached the store, failed ones included.
    #[must_use]
    pub fn write_attempts(&self) -> u64 {
        self.writes.load(Ordering::SeqCst)
    }

    fn check_available(&self) -> Result<(), StoreError> {
        if self.failing.load(Ordering::SeqCst) {
            Err(StoreError::Network("store unavailable".to_string()))
        } else {
            Ok(())
        }
    }
}

impl Default for MemoryUserStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl UserStore for MemoryUserStore {
    async fn get_user_id(&self, identity: &str) -> Result<UserId, StoreError> {
        self.check_available()?;
        self.users
            .get(identity)
            .map(|u| u.id)
            .ok_or_else(|| StoreError::NotFound(identity.to_string()))
    }

    async fn get_username(&self, identity: &str) -> Result<String, StoreError> {
        self.check_available()?;
        self.users
            .get(identity)
            .map(|u| u.username.clone())
            .ok_or_else(|| StoreError::NotFound(identity.to_string()))
    }

    async fn set_online(&self, identity: &str, online: bool) -> Result<(), StoreError> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        self.check_available()?;
        let mut user = self.users.entry(identity.to_string()).or_insert_with(|| UserRecord {
            id: self.next_id.fetch_add(1, Ordering::SeqCst),
            username: identity.to_string(),
            online: false,
            channel: None,
        });
        user.online = online;
        if !online {
            user.channel = None;
        }
        Ok(())
    }
}

/// Slime stats held in process memory.
#[derive(Debug, Default)]
pub struct MemorySlimeCatalog {
    wild: DashMap<u64, SlimeFight>,
    hunters: DashMap<(String, u64), SlimeFight>,
}

impl MemorySlimeCatalog {
    /// Creates an empty catalog.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces a generated wild slime.
    pub fn insert_wild(&self, slime_id: u64, stats: SlimeFight) {
        self.wild.insert(slime_id, stats);
    }

    /// Gives `hunter` ownership of a slime.
    pub fn set_hunter_slime(&self, hunter: &str, slime_id: u64, stats: SlimeFight) {
        self.hunters.insert((hunter.to_string(), slime_id), stats);
    }
}

#[async_trait]
impl SlimeCatalog for MemorySlimeCatalog {
    async fn wild_slime(&self, slime_id: u64) -> Result<SlimeFight, StoreError> {
        self.wild
            .get(&slime_id)
            .map(|s| *s)
            .ok_or_else(|| StoreError::NotFound(format!("wild slime {slime_id}")))
    }

    async fn hunter_slime(&self, hunter: &str, slime_id: u64) -> Result<SlimeFight, StoreError> {
        self.hunters
            .get(&(hunter.to_string(), slime_id))
            .map(|s| *s)
            .ok_or_else(|| StoreError::NotFound(format!("slime {slime_id} of hunter {hunter}")))
    }
}
