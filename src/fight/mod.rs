//! Fight engine and encounter registry
//!
//! Turn-based combat between a hunter's slime and a wild slime.
//!
//! # Architecture
//!
//! - [`types`]: Fight record, combat stats, enum codes, request payloads
//! - [`FightEngine`]: Pure turn resolution under configurable [`FightRules`]
//! - [`EncounterStore`]: Keyed registry with per-encounter serialization

pub mod engine;
pub mod store;
pub mod types;

pub use engine::{FightEngine, FightRules, TurnOutcome};
pub use store::{EncounterStore, FightId};
pub use types::{Fight, FightAck, FightInit, FightMove, FightStatus, Move, SlimeFight, WildSlimeStatus};
