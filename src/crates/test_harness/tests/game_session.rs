#![cfg(feature = "test-support")]

#[path = "fake_engine_support.rs"]
mod support;

use std::time::{Duration, Instant};

use bomberman_harness::{
    play, play_observed, Action, DisplayType, HarnessError, Outcome, RoundRecord, Snapshot,
    Termination,
};
use support::{winning_game, Levels, Transcript};

#[test]
fn winning_game_is_reconstructed() {
    let levels = Levels::new().with_level(1, &winning_game());
    let config = levels
        .game(1)
        .with_diagnostics(true)
        .with_timeout(Duration::from_secs(10));

    let mut seen = Vec::new();
    let termination = play_observed(&config, |snapshot: &Snapshot, record: &RoundRecord| {
        seen.push((snapshot.rows.len(), record.action));
    })
    .expect("fake engine should start");

    let Termination::Finished(telemetry) = termination else {
        panic!("game should finish on its own");
    };
    assert_eq!(seen, vec![(3, Action::East), (3, Action::West)]);
    assert_eq!(telemetry.outcome, Outcome::Win);
    assert_eq!(telemetry.seed, Some(7));
    assert_eq!(telemetry.level, Some(1));
    assert_eq!(telemetry.score, Some(60));
    assert_eq!(telemetry.rounds, 2);
    assert_eq!(telemetry.round_counter, Some(2));
    assert_eq!(telemetry.remaining_bombs, Some(3));
    assert_eq!(telemetry.total_breakable_wall, Some(2));
    assert_eq!(telemetry.broken_wall, Some(1));
    assert_eq!(
        telemetry.diagnostics,
        vec!["round one\n".to_string(), "round two\n".to_string()]
    );
    assert_eq!(telemetry.diagnostics_for(1), Some("round two\n"));
}

#[test]
fn diagnostics_are_off_by_default() {
    let levels = Levels::new().with_level(1, &winning_game());

    let telemetry = play(&levels.game(1)).expect("start").into_inner();

    assert_eq!(telemetry.outcome, Outcome::Win);
    assert!(telemetry.diagnostics.is_empty());
}

#[test]
fn silent_engine_times_out() {
    let transcript = Transcript::new().sleep(5_000).start();
    let levels = Levels::new().with_level(2, &transcript);
    let started = Instant::now();

    let termination = play(&levels.game(2).with_timeout(Duration::from_millis(300)))
        .expect("start");

    assert!(started.elapsed() < Duration::from_secs(4));
    assert!(termination.is_timed_out());
    let telemetry = termination.into_inner();
    assert_eq!(telemetry.outcome, Outcome::Timeout);
    assert_eq!(telemetry.rounds, 0);
    assert_eq!(telemetry.records, Some(Vec::new()));
}

#[test]
fn rounds_before_a_timeout_are_kept() {
    let transcript = Transcript::new()
        .start()
        .grid(&["*@..=.........*"])
        .round(1, 2, "NORTH")
        .sleep(5_000);
    let levels = Levels::new().with_level(1, &transcript);

    let termination = play(&levels.game(1).with_timeout(Duration::from_millis(800)))
        .expect("start");

    assert!(termination.is_timed_out());
    let telemetry = termination.into_inner();
    assert_eq!(telemetry.outcome, Outcome::Timeout);
    assert_eq!(telemetry.rounds, 1);
    assert_eq!(telemetry.actions, Some(vec![Action::North]));
}

#[test]
fn crash_is_reported_with_signal_and_frame() {
    let transcript = Transcript::new()
        .start()
        .grid(&["*@..=.........*"])
        .out("Rounds: 1")
        .out("Program received signal SIGSEGV, Segmentation fault.")
        .out("0x000055555555a1b2 in checkCollision ()")
        .exit(139);
    let levels = Levels::new().with_level(3, &transcript);

    let termination = play(&levels.game(3).with_timeout(Duration::from_secs(10))).expect("start");

    assert!(!termination.is_timed_out());
    let telemetry = termination.into_inner();
    assert_eq!(telemetry.outcome, Outcome::Error);
    assert_eq!(telemetry.signal.as_deref(), Some("SIGSEGV"));
    assert_eq!(telemetry.signal_trace.as_deref(), Some("checkCollision"));
    assert!(telemetry.outcome.is_problematic());
}

#[test]
fn colored_grids_are_kept_for_replay() {
    let transcript = Transcript::new()
        .start()
        .grid(&["*\\e[31m@\\e[0m.=...........*"])
        .round(1, 1, "BOMBING");
    let levels = Levels::new().with_level(1, &transcript);
    let config = levels
        .game(1)
        .with_display(DisplayType::Color)
        .with_full_insight();

    let telemetry = play(&config).expect("start").into_inner();

    let history = telemetry.history.expect("history kept");
    let snapshot = &history[0];
    assert_eq!(snapshot.rows[1], "*@.=...........*");
    let raw = snapshot.raw_rows.as_ref().expect("raw rows kept");
    assert!(raw[1].contains('\u{1b}'));
    assert_eq!(telemetry.total_breakable_wall, Some(1));
}

#[test]
fn missing_engine_is_a_start_error() {
    let levels = Levels::new().with_level(1, &winning_game());
    let mut config = levels.game(1);
    config.executable = levels.path().join("no-such-engine");

    let err = play(&config).err().expect("spawn must fail");

    assert!(matches!(err, HarnessError::EngineStart { .. }));
}
