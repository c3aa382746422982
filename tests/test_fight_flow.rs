mod common;

use std::time::Duration;

use proptest::prelude::*;
use rand::SeedableRng;
use rand::rngs::StdRng;

use common::{HUNTER, WILD_ID, attacker_stats, wild_stats};
use slimy::error::FightError;
use slimy::fight::{
    EncounterStore, FightEngine, FightRules, FightStatus, Move, SlimeFight, WildSlimeStatus,
};

fn store(rules: FightRules) -> EncounterStore {
    EncounterStore::new(FightEngine::new(rules), Duration::from_secs(60))
}

fn no_ack_rules() -> FightRules {
    FightRules {
        require_acknowledgment: false,
        ..FightRules::default()
    }
}

// ============================================================================
// Reference encounter
// ============================================================================

#[test]
fn reference_encounter_with_acknowledgment() {
    let fights = store(FightRules::default());
    fights
        .create(WILD_ID, wild_stats(), attacker_stats(), HUNTER)
        .unwrap();

    // Turn 1: 10 - 3 = 7 dealt, 5 - 2 = 3 taken.
    let fight = fights.apply_move(WILD_ID, HUNTER, Move::Attack).unwrap();
    assert_eq!(fight.wild.current_hp, 8);
    assert_eq!(fight.attacker.current_hp, 17);
    assert_eq!(fight.status, FightStatus::WaitingOnTx);
    assert_eq!(fight.wild_status, WildSlimeStatus::Fighting);

    // Held turn: a second submission is rejected and changes nothing.
    let err = fights
        .apply_move(WILD_ID, HUNTER, Move::Attack)
        .unwrap_err();
    assert!(matches!(err, FightError::InvalidState { .. }));
    assert_eq!(err.current(), Some(&fight));

    let fight = fights.acknowledge(WILD_ID, HUNTER).unwrap();
    assert_eq!(fight.status, FightStatus::WaitingOnPlayer);

    // Turn 2
    let fight = fights.apply_move(WILD_ID, HUNTER, Move::Attack).unwrap();
    assert_eq!(fight.wild.current_hp, 1);
    assert_eq!(fight.attacker.current_hp, 14);
    fights.acknowledge(WILD_ID, HUNTER).unwrap();

    // Turn 3: the wild slime goes down and does not counter.
    let fight = fights.apply_move(WILD_ID, HUNTER, Move::Attack).unwrap();
    assert_eq!(fight.wild.current_hp, 0);
    assert_eq!(fight.wild_status, WildSlimeStatus::CanCatch);
    assert_eq!(fight.attacker.current_hp, 14);
    fights.acknowledge(WILD_ID, HUNTER).unwrap();

    let fight = fights.apply_move(WILD_ID, HUNTER, Move::Catch).unwrap();
    assert_eq!(fight.status, FightStatus::PlayerWon);
    assert_eq!(fights.active_count(), 0);
    assert_eq!(fights.get(WILD_ID).unwrap(), fight);
}

#[test]
fn reference_encounter_without_acknowledgment() {
    let fights = store(no_ack_rules());
    fights
        .create(WILD_ID, wild_stats(), attacker_stats(), HUNTER)
        .unwrap();

    for _ in 0..3 {
        let fight = fights.apply_move(WILD_ID, HUNTER, Move::Attack).unwrap();
        assert_eq!(fight.status, FightStatus::WaitingOnPlayer);
    }
    let fight = fights.apply_move(WILD_ID, HUNTER, Move::Catch).unwrap();
    assert_eq!(fight.status, FightStatus::PlayerWon);
}

// ============================================================================
// Rejections
// ============================================================================

#[test]
fn foreign_hunter_never_mutates() {
    let fights = store(FightRules::default());
    fights
        .create(WILD_ID, wild_stats(), attacker_stats(), HUNTER)
        .unwrap();
    let before = fights.get(WILD_ID).unwrap();

    for mv in Move::ALL {
        let err = fights.apply_move(WILD_ID, "mallory", mv).unwrap_err();
        assert_eq!(err.code(), "unauthorized", "move {mv:?}");
    }
    assert!(matches!(
        fights.acknowledge(WILD_ID, "mallory"),
        Err(FightError::Unauthorized { .. })
    ));
    assert_eq!(fights.get(WILD_ID).unwrap(), before);
}

#[test]
fn catch_rejected_while_fighting() {
    let fights = store(no_ack_rules());
    fights
        .create(WILD_ID, wild_stats(), attacker_stats(), HUNTER)
        .unwrap();
    let before = fights.get(WILD_ID).unwrap();

    let err = fights.apply_move(WILD_ID, HUNTER, Move::Catch).unwrap_err();
    assert!(matches!(err, FightError::IllegalMove { .. }));
    assert_eq!(err.current(), Some(&before));
    assert_eq!(fights.get(WILD_ID).unwrap(), before);
}

#[test]
fn moves_on_missing_fight() {
    let fights = store(FightRules::default());
    assert!(matches!(
        fights.apply_move(99, HUNTER, Move::Attack),
        Err(FightError::NotFound { key: 99 })
    ));
    assert!(matches!(
        fights.acknowledge(99, HUNTER),
        Err(FightError::NotFound { key: 99 })
    ));
}

#[test]
fn create_conflicts_only_while_active() {
    let fights = store(no_ack_rules());
    fights
        .create(WILD_ID, wild_stats(), attacker_stats(), HUNTER)
        .unwrap();
    assert!(matches!(
        fights.create(WILD_ID, wild_stats(), attacker_stats(), "bob"),
        Err(FightError::Conflict { key: WILD_ID })
    ));

    for _ in 0..3 {
        fights.apply_move(WILD_ID, HUNTER, Move::Attack).unwrap();
    }
    fights.apply_move(WILD_ID, HUNTER, Move::Catch).unwrap();

    // Finished fights make room for a rematch.
    fights
        .create(WILD_ID, wild_stats(), attacker_stats(), "bob")
        .unwrap();
    assert_eq!(fights.get(WILD_ID).unwrap().hunter, "bob");
}

#[test]
fn attacker_defeat_ends_fight() {
    let fights = store(no_ack_rules());
    // The wild slime survives the hit with 1 HP and counters for the kill.
    let attacker = SlimeFight::new(5, 0, 10).with_current_hp(5);
    let wild = SlimeFight::new(5, 0, 6);
    fights.create(WILD_ID, wild, attacker, HUNTER).unwrap();

    let fight = fights.apply_move(WILD_ID, HUNTER, Move::Attack).unwrap();
    assert_eq!(fight.wild.current_hp, 1);
    assert_eq!(fight.attacker.current_hp, 0);
    assert_eq!(fight.status, FightStatus::PlayerLost);

    let err = fights.apply_move(WILD_ID, HUNTER, Move::Heal).unwrap_err();
    assert!(matches!(err, FightError::InvalidState { .. }));
}

#[test]
fn finished_fight_expires_after_grace() {
    let fights = EncounterStore::new(FightEngine::new(no_ack_rules()), Duration::from_millis(20));
    let attacker = SlimeFight::new(1, 0, 1);
    fights.create(WILD_ID, wild_stats(), attacker, HUNTER).unwrap();
    fights.create(8, wild_stats(), attacker_stats(), HUNTER).unwrap();

    let fight = fights.apply_move(WILD_ID, HUNTER, Move::Heal).unwrap();
    assert_eq!(fight.status, FightStatus::PlayerLost);
    assert!(fights.get(WILD_ID).is_ok());

    std::thread::sleep(Duration::from_millis(60));
    assert!(matches!(
        fights.get(WILD_ID),
        Err(FightError::NotFound { .. })
    ));
    assert_eq!(fights.evict_finished(), 1);
    assert_eq!(fights.len(), 1);
    // Active fights are never evicted.
    assert!(fights.get(8).is_ok());
}

#[test]
fn abandoned_fight_frees_wild_slime() {
    let fights = EncounterStore::new(FightEngine::new(FightRules::default()), Duration::ZERO)
        .with_idle_timeout(Duration::from_millis(20));
    fights
        .create(WILD_ID, wild_stats(), attacker_stats(), HUNTER)
        .unwrap();
    let held = fights.apply_move(WILD_ID, HUNTER, Move::Attack).unwrap();
    assert_eq!(held.status, FightStatus::WaitingOnTx);

    // The hunter never acknowledges or moves again.
    std::thread::sleep(Duration::from_millis(50));
    assert!(matches!(
        fights.acknowledge(WILD_ID, HUNTER),
        Err(FightError::NotFound { .. })
    ));
    assert_eq!(fights.evict_finished(), 1);
    assert!(fights.is_empty());

    fights
        .create(WILD_ID, wild_stats(), attacker_stats(), "bob")
        .unwrap();
    assert_eq!(fights.get(WILD_ID).unwrap().hunter, "bob");
}

// ============================================================================
// Properties
// ============================================================================

fn stats() -> impl Strategy<Value = SlimeFight> {
    (0u8..=40, 0u8..=40, 1u8..=60).prop_map(|(attack, defense, max_hp)| {
        SlimeFight::new(attack, defense, max_hp)
    })
}

fn moves() -> impl Strategy<Value = Vec<Move>> {
    prop::collection::vec(prop::sample::select(Move::ALL.to_vec()), 1..40)
}

proptest! {
    #[test]
    fn hp_stays_within_bounds(
        wild in stats(),
        attacker in stats(),
        sequence in moves(),
        catch_probability in prop::sample::select(vec![0.0, 0.5, 1.0]),
        seed in any::<u64>(),
    ) {
        let fights = store(FightRules {
            catch_probability,
            ..no_ack_rules()
        });
        let mut rng = StdRng::seed_from_u64(seed);
        fights.create(WILD_ID, wild, attacker, HUNTER).unwrap();

        for mv in sequence {
            let before = fights.get(WILD_ID).unwrap();
            match fights.apply_move_with(WILD_ID, HUNTER, mv, &mut rng) {
                Ok(outcome) => {
                    let after = outcome.fight;
                    prop_assert!(after.wild.current_hp <= after.wild.max_hp);
                    prop_assert!(after.attacker.current_hp <= after.attacker.max_hp);
                    prop_assert!(after.attacker.attack >= before.attacker.attack);

                    if after.status == FightStatus::PlayerWon {
                        prop_assert_eq!(mv, Move::Catch);
                        prop_assert_eq!(before.wild_status, WildSlimeStatus::CanCatch);
                    }
                    if after.attacker.current_hp == 0 {
                        prop_assert_eq!(after.status, FightStatus::PlayerLost);
                    }
                    if after.wild_status == WildSlimeStatus::CanCatch {
                        prop_assert_eq!(after.wild.current_hp, 0);
                    }
                }
                Err(err) => {
                    prop_assert_eq!(err.current(), Some(&before));
                    prop_assert_eq!(fights.get(WILD_ID).unwrap(), before.clone());
                    if mv == Move::Catch && before.status == FightStatus::WaitingOnPlayer {
                        prop_assert_eq!(before.wild_status, WildSlimeStatus::Fighting);
                    }
                }
            }
            if fights.get(WILD_ID).unwrap().status.is_terminal() {
                break;
            }
        }
    }
}
