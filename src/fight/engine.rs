//! Turn resolution for a single fight.
//!
//! The engine is pure: it reads one [`Fight`], validates the submission,
//! and returns the next state. It never touches the encounter registry,
//! so callers decide how access to a fight is serialized.

use rand::Rng;

use crate::error::FightError;

use super::types::{Fight, FightStatus, Move, WildSlimeStatus};

/// Default attack multiplier applied by `Buff`, in percent.
pub const DEFAULT_BUFF_PERCENT: u16 = 150;

/// Default hit points restored by `Heal`.
pub const DEFAULT_HEAL_AMOUNT: u8 = 5;

/// Tunable combat rules.
#[derive(Debug, Clone, PartialEq)]
pub struct FightRules {
    /// Attack multiplier applied by `Buff`, in percent (at least 100).
    pub buff_percent: u16,
    /// Hit points restored by `Heal`.
    pub heal_amount: u8,
    /// Probability that `Catch` succeeds, within `[0, 1]`.
    pub catch_probability: f64,
    /// Hold every non-terminal turn in `WaitingOnTx` until acknowledged.
    pub require_acknowledgment: bool,
}

impl Default for FightRules {
    fn default() -> Self {
        Self {
            buff_percent: DEFAULT_BUFF_PERCENT,
            heal_amount: DEFAULT_HEAL_AMOUNT,
            catch_probability: 1.0,
            require_acknowledgment: true,
        }
    }
}

impl FightRules {
    /// Attack value after one `Buff`.
    ///
    /// Always raises a stat below 255 by at least one point.
    #[must_use]
    pub fn buffed(&self, attack: u8) -> u8 {
        let scaled = u32::from(attack) * u32::from(self.buff_percent) / 100;
        let raised = scaled.max(u32::from(attack) + 1).min(u32::from(u8::MAX));
        u8::try_from(raised).unwrap_or(u8::MAX)
    }
}

/// Damage dealt by `attack` against `defense`; never less than one.
#[must_use]
pub const fn damage(attack: u8, defense: u8) -> u8 {
    let raw = attack.saturating_sub(defense);
    if raw == 0 { 1 } else { raw }
}

/// Result of resolving one submitted move.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TurnOutcome {
    /// Fight state after the turn
    pub fight: Fight,
    /// Hit points removed from the wild slime
    pub damage_dealt: u8,
    /// Hit points removed from the attacker
    pub damage_taken: u8,
    /// Whether the wild slime struck back this turn
    pub wild_countered: bool,
    /// Whether the wild slime was captured
    pub captured: bool,
}

/// Stateless turn resolver parameterized by [`FightRules`].
#[derive(Debug, Clone, Default)]
pub struct FightEngine {
    rules: FightRules,
}

impl FightEngine {
    /// Creates an engine with the given rules.
    #[must_use]
    pub const fn new(rules: FightRules) -> Self {
        Self { rules }
    }

    /// Returns the active rules.
    #[must_use]
    pub const fn rules(&self) -> &FightRules {
        &self.rules
    }

    /// Checks that `hunter` may submit `mv` against `fight` right now.
    ///
    /// # Errors
    ///
    /// `Unauthorized` for a foreign identity, `InvalidState` unless the fight
    /// is `WaitingOnPlayer`, `IllegalMove` for `Catch` while the wild slime is
    /// still fighting. Checked in that order.
    pub fn validate(&self, key: u64, fight: &Fight, hunter: &str, mv: Move) -> Result<(), FightError> {
        check_hunter(key, fight, hunter)?;
        if fight.status != FightStatus::WaitingOnPlayer {
            return Err(invalid_state(key, fight));
        }
        if mv == Move::Catch && fight.wild_status != WildSlimeStatus::CanCatch {
            return Err(FightError::IllegalMove {
                key,
                current: Box::new(fight.clone()),
            });
        }
        Ok(())
    }

    /// Resolves one turn: the hunter's move, then the wild counter-response.
    ///
    /// `rng` is only consulted for a `Catch` whose probability is strictly
    /// between zero and one.
    ///
    /// # Errors
    ///
    /// Returns the [`validate`](Self::validate) error; `fight` is untouched.
    pub fn resolve<R: Rng + ?Sized>(
        &self,
        key: u64,
        fight: &Fight,
        hunter: &str,
        mv: Move,
        rng: &mut R,
    ) -> Result<TurnOutcome, FightError> {
        self.validate(key, fight, hunter, mv)?;

        let mut next = fight.clone();
        let mut damage_dealt = 0;
        let mut skip_counter = false;

        match mv {
            Move::Attack => {
                damage_dealt = damage(next.attacker.attack, next.wild.defense).min(next.wild.current_hp);
                next.wild.current_hp -= damage_dealt;
                if next.wild.is_down() {
                    next.wild_status = WildSlimeStatus::CanCatch;
                    skip_counter = true;
                }
            }
            Move::Buff => {
                next.attacker.attack = self.rules.buffed(next.attacker.attack);
            }
            Move::Heal => {
                next.attacker.current_hp = next
                    .attacker
                    .current_hp
                    .saturating_add(self.rules.heal_amount)
                    .min(next.attacker.max_hp);
            }
            Move::Catch => {
                if self.roll_catch(rng) {
                    next.status = FightStatus::PlayerWon;
                    return Ok(TurnOutcome {
                        fight: next,
                        damage_dealt,
                        damage_taken: 0,
                        wild_countered: false,
                        captured: true,
                    });
                }
            }
        }

        let mut damage_taken = 0;
        if !skip_counter {
            damage_taken = damage(next.wild.attack, next.attacker.defense).min(next.attacker.current_hp);
            next.attacker.current_hp -= damage_taken;
        }

        // Attacker defeat wins over anything else that happened this turn.
        next.status = if next.attacker.is_down() {
            FightStatus::PlayerLost
        } else if self.rules.require_acknowledgment {
            FightStatus::WaitingOnTx
        } else {
            FightStatus::WaitingOnPlayer
        };

        Ok(TurnOutcome {
            fight: next,
            damage_dealt,
            damage_taken,
            wild_countered: !skip_counter,
            captured: false,
        })
    }

    /// Releases the acknowledgment barrier, returning the fight to
    /// `WaitingOnPlayer`.
    ///
    /// # Errors
    ///
    /// `Unauthorized` for a foreign identity, `InvalidState` unless the fight
    /// is `WaitingOnTx`.
    pub fn acknowledge(&self, key: u64, fight: &Fight, hunter: &str) -> Result<Fight, FightError> {
        check_hunter(key, fight, hunter)?;
        if fight.status != FightStatus::WaitingOnTx {
            return Err(invalid_state(key, fight));
        }
        let mut next = fight.clone();
        next.status = FightStatus::WaitingOnPlayer;
        Ok(next)
    }

    fn roll_catch<R: Rng + ?Sized>(&self, rng: &mut R) -> bool {
        let p = self.rules.catch_probability;
        if p >= 1.0 {
            true
        } else if p <= 0.0 {
            false
        } else {
            rng.random_bool(p)
        }
    }
}

fn check_hunter(key: u64, fight: &Fight, hunter: &str) -> Result<(), FightError> {
    if fight.hunter == hunter {
        Ok(())
    } else {
        Err(FightError::Unauthorized {
            key,
            hunter: hunter.to_string(),
            current: Box::new(fight.clone()),
        })
    }
}

fn invalid_state(key: u64, fight: &Fight) -> FightError {
    FightError::InvalidState {
        key,
        status: fight.status.as_str(),
        current: Box::new(fight.clone()),
    }
}
