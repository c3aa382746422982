#![no_main]

use std::time::Duration;

use libfuzzer_sys::fuzz_target;
use slimy::fight::{EncounterStore, FightEngine, FightMove, FightRules, Move, SlimeFight};

fuzz_target!(|data: &[u8]| {
    if data.len() < 6 {
        return;
    }
    let (stats, payload) = data.split_at(6);

    let store = EncounterStore::new(
        FightEngine::new(FightRules {
            require_acknowledgment: false,
            ..FightRules::default()
        }),
        Duration::from_secs(60),
    );
    let wild = SlimeFight::new(stats[0], stats[1], stats[2]);
    let attacker = SlimeFight::new(stats[3], stats[4], stats[5]);
    if store.create(0, wild, attacker, "fuzz").is_err() {
        return;
    }

    // Either a JSON move payload, or raw bytes read as move codes.
    let moves: Vec<Move> = match serde_json::from_slice::<FightMove>(payload) {
        Ok(submission) => vec![submission.move_picked],
        Err(_) => payload
            .iter()
            .filter_map(|b| Move::try_from(b % 4).ok())
            .collect(),
    };

    for mv in moves {
        if let Ok(fight) = store.apply_move(0, "fuzz", mv) {
            assert!(fight.wild.current_hp <= fight.wild.max_hp);
            assert!(fight.attacker.current_hp <= fight.attacker.max_hp);
        }
    }
});
