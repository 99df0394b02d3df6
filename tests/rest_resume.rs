use std::sync::mpsc;
use std::time::Duration;

use chrono::{TimeZone, Utc};
use setwise::clock::ManualClock;
use setwise::engine::{SessionEngine, SetInput};
use setwise::identity::StaticIdentity;
use setwise::model::{Block, Exercise, WorkoutDay, WorkoutPlan};
use setwise::rest_timer::TickOutcome;
use setwise::runtime::{FixedTicker, RestEvent, Runner, TestEventSource};
use setwise::storage::{JsonFileStore, MemoryStore};

fn plan(rest_seconds: u32) -> WorkoutPlan {
    let t0 = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
    WorkoutPlan {
        id: "p".into(),
        owner_id: "me".into(),
        name: "Press".into(),
        gym_type: None,
        created_at: t0,
        updated_at: t0,
        dirty: false,
        days: vec![WorkoutDay {
            id: "d".into(),
            name: "Upper".into(),
            weekday: None,
            order: 1,
            blocks: vec![Block {
                id: "b".into(),
                title: "Strength".into(),
                order: 1,
                duration_minutes: 20,
                exercises: vec![Exercise {
                    id: "ohp".into(),
                    name: "Overhead Press".into(),
                    order: 1,
                    reps_min: Some(5),
                    reps_max: None,
                    time_seconds: None,
                    sets: 5,
                    rest_seconds,
                }],
            }],
        }],
    }
}

fn clock() -> ManualClock {
    ManualClock::new(Utc.with_ymd_and_hms(2025, 8, 20, 6, 30, 0).unwrap())
}

// Drives the countdown the way the `rest` command does: one second of
// wall-clock time per Tick, stopping on Finished or Dismiss.
#[test]
fn runner_counts_rest_down_to_finished() {
    let clock = clock();
    let mut engine = SessionEngine::new(MemoryStore::new(), clock.clone())
        .with_identity(Box::new(StaticIdentity("me".into())));
    engine.import_plans(vec![plan(10)]).unwrap();
    engine.start_session("p", "d").unwrap();
    engine.complete_set(SetInput::default()).unwrap();

    let (_tx, rx) = mpsc::channel();
    let runner = Runner::new(
        TestEventSource::new(rx),
        FixedTicker::new(Duration::from_millis(1)),
    );

    let mut seen = Vec::new();
    for _ in 0..20u32 {
        if let RestEvent::Tick = runner.step() {
            clock.advance_secs(1);
            match engine.tick().unwrap() {
                TickOutcome::Running(left) => seen.push(left),
                TickOutcome::Finished => break,
                TickOutcome::Idle => panic!("rest went idle before finishing"),
            }
        }
    }

    assert_eq!(seen, (1..=9).rev().collect::<Vec<u64>>());
    assert!(!engine.rest().resting);
    assert_eq!(engine.repo().load_rest_state(), None);
}

#[test]
fn runner_dismiss_and_lifecycle_events() {
    let clock = clock();
    let mut engine = SessionEngine::new(MemoryStore::new(), clock.clone())
        .with_identity(Box::new(StaticIdentity("me".into())));
    engine.import_plans(vec![plan(120)]).unwrap();
    engine.start_session("p", "d").unwrap();
    engine.complete_set(SetInput::default()).unwrap();

    let (tx, rx) = mpsc::channel();
    let runner = Runner::new(
        TestEventSource::new(rx),
        FixedTicker::new(Duration::from_millis(1)),
    );

    tx.send(RestEvent::Background).unwrap();
    assert_eq!(runner.step(), RestEvent::Background);
    engine.on_background();

    clock.advance_secs(100);
    assert_eq!(engine.tick().unwrap(), TickOutcome::Idle);
    assert_eq!(engine.rest().remaining, 120);

    tx.send(RestEvent::Foreground).unwrap();
    assert_eq!(runner.step(), RestEvent::Foreground);
    engine.on_foreground().unwrap();
    assert_eq!(engine.rest().remaining, 20);

    tx.send(RestEvent::Dismiss).unwrap();
    assert_eq!(runner.step(), RestEvent::Dismiss);
    engine.dismiss_rest().unwrap();
    assert!(!engine.rest().resting);
    assert_eq!(engine.repo().load_rest_state(), None);
}

#[test]
fn restart_after_deadline_clears_rest() {
    let dir = tempfile::tempdir().unwrap();
    let clock = clock();
    {
        let mut engine = SessionEngine::new(JsonFileStore::new(dir.path()).unwrap(), clock.clone());
        engine.import_plans(vec![plan(90)]).unwrap();
        engine.start_session("Press", "Upper").unwrap();
        engine.complete_set(SetInput::default()).unwrap();
        assert!(dir.path().join("rest-state.json").exists());
    }

    clock.advance_secs(3600);
    let mut engine = SessionEngine::new(JsonFileStore::new(dir.path()).unwrap(), clock.clone());
    let rest = engine.mount().unwrap();
    assert!(!rest.resting);
    assert_eq!(rest.remaining, 0);
    assert!(!dir.path().join("rest-state.json").exists());

    // The session itself is still there, waiting on set 2.
    let current = engine.current_set().unwrap();
    assert_eq!(current.set.set_number, 2);
}

#[test]
fn anonymous_owner_is_stable_across_restarts() {
    let dir = tempfile::tempdir().unwrap();
    let clock = clock();

    let mut engine = SessionEngine::new(JsonFileStore::new(dir.path()).unwrap(), clock.clone());
    engine.import_plans(vec![plan(0)]).unwrap();
    let first = engine.start_session("p", "d").unwrap();
    drop(engine);

    let mut engine = SessionEngine::new(JsonFileStore::new(dir.path()).unwrap(), clock.clone());
    let second = engine.start_session("p", "d").unwrap();

    assert!(first.owner_id.starts_with("anon-"));
    assert_eq!(first.owner_id, second.owner_id);
}
