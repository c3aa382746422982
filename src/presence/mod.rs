//! Presence tracking
//!
//! Ephemeral "who is online" registry fed by chat heartbeats.
//!
//! - [`PresenceCache`]: last-seen timestamps with a read-time staleness bound
//! - [`PresenceReaper`]: periodic eviction that marks idle users offline

pub mod cache;
pub mod reaper;

pub use cache::{DEFAULT_ONLINE_WINDOW, DEFAULT_RETENTION, MirrorPolicy, PresenceCache};
pub use reaper::{DEFAULT_SWEEP_INTERVAL, PresenceReaper};
