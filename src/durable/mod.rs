//! External durable collaborators
//!
//! The fight and presence cores only talk to persistent storage through
//! these traits. Calls are best-effort side channels: a failing store must
//! never corrupt in-memory fight or presence state.
//!
//! - [`UserStore`]: user identity lookup and the durable `online` flag
//! - [`SlimeCatalog`]: combat stats for wild slimes and hunters' slimes

pub mod http;
pub mod memory;

use async_trait::async_trait;

use crate::error::StoreError;
use crate::fight::types::SlimeFight;

pub use http::HttpUserStore;
pub use memory::{MemorySlimeCatalog, MemoryUserStore};

/// Durable user identifier.
pub type UserId = u64;

/// Account lookups and the mirrored online flag.
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Resolves a session identity to its user id.
    async fn get_user_id(&self, identity: &str) -> Result<UserId, StoreError>;

    /// Resolves a session identity to its display name.
    async fn get_username(&self, identity: &str) -> Result<String, StoreError>;

    /// Writes the durable online flag.
    ///
    /// Going offline also clears the identity's channel assignment.
    async fn set_online(&self, identity: &str, online: bool) -> Result<(), StoreError>;
}

/// Source of combat stats for new encounters.
#[async_trait]
pub trait SlimeCatalog: Send + Sync {
    /// Stats of a generated wild slime.
    async fn wild_slime(&self, slime_id: u64) -> Result<SlimeFight, StoreError>;

    /// Stats of a slime owned by `hunter`.
    ///
    /// Returns [`StoreError::NotFound`] when the hunter does not own it.
    async fn hunter_slime(&self, hunter: &str, slime_id: u64) -> Result<SlimeFight, StoreError>;
}
