//! THE MOST IMPORTANT TEST IN THE PROJECT.
//!
//! Two engines, same seed, same bots.
//! They must produce byte-identical event logs and send byte-identical
//! observations. Any divergence is a blocker.

use arena_core::{
    channel::{ScriptHandle, ScriptedBot},
    config::ArenaConfig,
    engine::SimEngine,
    event::SimEvent,
    maze::StaticMaze,
    stats::RoundOutcome,
};

const MAZE: &str = "
#########
#.......#
#.#.#.#.#
#.......#
#.##.##.#
#.......#
#.#.#.#.#
#.......#
#########
";

/// Walks a fixed loop of moves, independent of what it is told.
fn walker(label: &str, offset: usize) -> ScriptedBot {
    let moves = ["N", "E", "E", "S", "W", "S", "WAIT", "W", "N"];
    let mut step = offset;
    ScriptedBot::from_fn(label, move |_| {
        step += 1;
        moves[step % moves.len()].to_string()
    })
}

fn play(seed: u64) -> (Vec<String>, Vec<String>, RoundOutcome) {
    let maze = StaticMaze::parse(MAZE).expect("maze");
    let config = ArenaConfig {
        seed,
        max_ticks: 120,
        beacon_noise: 0.3,
        beacon_fade: 3,
        beacon_quantization: 16,
        profile: true,
        ..ArenaConfig::default_test()
    };
    let mut engine = SimEngine::setup(config, &maze, None).expect("setup");
    let a = walker("a", 0);
    let transcript: ScriptHandle = a.handle();
    engine.add_bot(Box::new(a)).expect("bot a");
    engine.add_bot(Box::new(walker("b", 4))).expect("bot b");

    let outcome = engine.run().expect("run");
    let log = engine
        .events()
        .iter()
        .map(|e| serde_json::to_string(e).expect("serialize event"))
        .collect();
    (log, transcript.requests(), outcome)
}

#[test]
fn same_seed_produces_identical_event_logs() {
    const SEED: u64 = 0xDEAD_BEEF;

    let (log_a, seen_a, outcome_a) = play(SEED);
    let (log_b, seen_b, outcome_b) = play(SEED);

    assert_eq!(
        log_a.len(), log_b.len(),
        "Event log lengths differ: {} vs {}",
        log_a.len(), log_b.len()
    );
    for (i, (a, b)) in log_a.iter().zip(log_b.iter()).enumerate() {
        assert_eq!(a, b, "Event log diverged at entry {i}:\n  A: {a}\n  B: {b}");
    }
    assert_eq!(seen_a, seen_b, "observations diverged");
    assert_eq!(outcome_a, outcome_b);
}

#[test]
fn beacons_actually_spawn() {
    let (log, _, _) = play(1);
    let spawned = log.iter().filter(|e| e.contains("\"beacon_spawned\"")).count();
    assert!(spawned > 0, "a busy config should spawn beacons in 120 ticks");
}

#[test]
fn different_seeds_diverge() {
    let beacon_spawns = |seed: u64| -> Vec<String> {
        let maze = StaticMaze::parse(MAZE).expect("maze");
        let config = ArenaConfig { seed, max_ticks: 120, ..ArenaConfig::default_test() };
        let mut engine = SimEngine::setup(config, &maze, None).expect("setup");
        engine.add_bot(Box::new(walker("a", 0))).expect("bot");
        engine.run().expect("run");
        engine
            .events()
            .iter()
            .filter(|e| matches!(e, SimEvent::BeaconSpawned { .. } | SimEvent::RoundInitialized { .. }))
            .map(|e| serde_json::to_string(e).expect("serialize"))
            .collect()
    };
    assert_ne!(beacon_spawns(1), beacon_spawns(2));
}
