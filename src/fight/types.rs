//! Fight data model and request/response payloads.
//!
//! Enum-coded fields travel as their small-integer codes on the wire
//! (`Move`, `FightStatus`, `WildSlimeStatus`), but are closed Rust enums
//! everywhere else.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error for an integer code that maps to no enum variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("unknown {kind} code {code}")]
pub struct UnknownCode {
    /// Enum being decoded
    pub kind: &'static str,
    /// Offending code
    pub code: u8,
}

// ============================================================================
// Combat stats
// ============================================================================

/// Combat stats of one slime taking part in a fight.
///
/// `current_hp` never exceeds `max_hp`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlimeFight {
    /// Attack stat (temporarily raised by `Buff`)
    pub attack: u8,
    /// Defense stat
    #[serde(rename = "def")]
    pub defense: u8,
    /// Maximum hit points
    pub max_hp: u8,
    /// Current hit points
    #[serde(rename = "curr_hp")]
    pub current_hp: u8,
}

impl SlimeFight {
    /// Creates a slime at full health.
    #[must_use]
    pub const fn new(attack: u8, defense: u8, max_hp: u8) -> Self {
        Self {
            attack,
            defense,
            max_hp,
            current_hp: max_hp,
        }
    }

    /// Returns a copy with `current_hp` set, clamped to `max_hp`.
    #[must_use]
    pub fn with_current_hp(mut self, hp: u8) -> Self {
        self.current_hp = hp.min(self.max_hp);
        self
    }

    /// Whether this slime has no hit points left.
    #[must_use]
    pub const fn is_down(&self) -> bool {
        self.current_hp == 0
    }
}

// ============================================================================
// Enum codes
// ============================================================================

/// Turn-based fight state machine.
///
/// `PlayerLost` and `PlayerWon` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum FightStatus {
    /// Accepting the hunter's next move
    WaitingOnPlayer = 0,
    /// Turn resolved, held until acknowledged
    WaitingOnTx = 1,
    /// Attacker was defeated
    PlayerLost = 2,
    /// Wild slime was captured
    PlayerWon = 3,
}

impl FightStatus {
    /// Whether the fight is over.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::PlayerLost | Self::PlayerWon)
    }

    /// Snake-case name for logs, errors, and metric labels.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::WaitingOnPlayer => "waiting_on_player",
            Self::WaitingOnTx => "waiting_on_tx",
            Self::PlayerLost => "player_lost",
            Self::PlayerWon => "player_won",
        }
    }
}

impl From<FightStatus> for u8 {
    fn from(status: FightStatus) -> Self {
        status as Self
    }
}

impl TryFrom<u8> for FightStatus {
    type Error = UnknownCode;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        match code {
            0 => Ok(Self::WaitingOnPlayer),
            1 => Ok(Self::WaitingOnTx),
            2 => Ok(Self::PlayerLost),
            3 => Ok(Self::PlayerWon),
            _ => Err(UnknownCode {
                kind: "fight status",
                code,
            }),
        }
    }
}

impl std::fmt::Display for FightStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Combat state of the wild slime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum WildSlimeStatus {
    /// Still combat-active
    Fighting = 0,
    /// Weakened; the hunter may attempt a capture
    CanCatch = 1,
}

impl From<WildSlimeStatus> for u8 {
    fn from(status: WildSlimeStatus) -> Self {
        status as Self
    }
}

impl TryFrom<u8> for WildSlimeStatus {
    type Error = UnknownCode;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        match code {
            0 => Ok(Self::Fighting),
            1 => Ok(Self::CanCatch),
            _ => Err(UnknownCode {
                kind: "wild slime status",
                code,
            }),
        }
    }
}

/// A hunter's action for one turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum Move {
    /// Damage the wild slime
    Attack = 0,
    /// Raise the attacker's attack for the rest of the fight
    Buff = 1,
    /// Restore some of the attacker's hit points
    Heal = 2,
    /// Attempt to capture a weakened wild slime
    Catch = 3,
}

impl Move {
    /// All moves, in code order.
    pub const ALL: [Self; 4] = [Self::Attack, Self::Buff, Self::Heal, Self::Catch];

    /// Snake-case name for logs and metric labels.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Attack => "attack",
            Self::Buff => "buff",
            Self::Heal => "heal",
            Self::Catch => "catch",
        }
    }
}

impl From<Move> for u8 {
    fn from(mv: Move) -> Self {
        mv as Self
    }
}

impl TryFrom<u8> for Move {
    type Error = UnknownCode;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        Self::ALL
            .get(usize::from(code))
            .copied()
            .ok_or(UnknownCode { kind: "move", code })
    }
}

// ============================================================================
// Fight record
// ============================================================================

/// One encounter between a hunter's slime and a wild slime.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fight {
    /// The wild slime
    pub wild: SlimeFight,
    /// The hunter's slime
    pub attacker: SlimeFight,
    /// Identity of the hunter allowed to submit moves
    pub hunter: String,
    /// Turn state
    pub status: FightStatus,
    /// Wild slime combat state
    pub wild_status: WildSlimeStatus,
}

impl Fight {
    /// Starts a fight waiting on the hunter's first move.
    #[must_use]
    pub fn new(wild: SlimeFight, attacker: SlimeFight, hunter: impl Into<String>) -> Self {
        Self {
            wild,
            attacker,
            hunter: hunter.into(),
            status: FightStatus::WaitingOnPlayer,
            wild_status: WildSlimeStatus::Fighting,
        }
    }
}

// ============================================================================
// Request payloads
// ============================================================================

/// Request to start an encounter against a generated wild slime.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FightInit {
    /// Hunter identity
    pub hunter: String,
    /// Hunter-owned slime brought into the fight
    pub slime_id: u64,
}

/// Request to submit one turn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FightMove {
    /// Hunter identity
    pub hunter: String,
    /// Chosen move
    #[serde(rename = "move")]
    pub move_picked: Move,
}

/// Request to release the acknowledgment barrier after a resolved turn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FightAck {
    /// Hunter identity
    pub hunter: String,
}
