//! Integration tests for session recording and replay.
//!
//! A scripted session mixes recorded and unrecorded waits, the log goes
//! through JSON, and `verify_replay` must reproduce every recorded outcome.

use cue_engine::prelude::*;

const TICK_MS: u64 = 40;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn key_a() -> Keycode {
    Keycode::from_char('a')
}

fn press_of(key: Keycode) -> Predicate {
    Predicate::queued(
        EventKind::Keyboard,
        key.channel(),
        Condition::scalar(symbol::PRESSED, ScalarTest::Equal),
    )
}

fn left_click() -> Predicate {
    Predicate::queued(
        EventKind::MouseButton,
        channel::LEFT_BUTTON,
        Condition::interval(0, 0, IntervalTest::AlwaysTrue),
    )
}

fn deadline(ms: i64) -> Predicate {
    Predicate::polled(
        DeviceKind::Timer,
        channel::ELAPSED_MS,
        Condition::scalar(ms, ScalarTest::GreaterOrEqual),
    )
}

fn scripted_input() -> ScriptedPlatform {
    ScriptedPlatform::new(TICK_MS)
        .key_down_at(2, key_a())
        .record_at(
            5,
            EventPayload::MouseButton(MouseButtonEvent {
                x: 12,
                y: 34,
                button: channel::LEFT_BUTTON,
                state: KeyState::Pressed,
            }),
        )
        .key_up_at(6, key_a())
        .at(
            8,
            ScriptedInput::Resize {
                width: 1024,
                height: 768,
            },
        )
}

/// Four recorded waits with one unrecorded wait in between.
fn record_session() -> ReplayLog {
    let platform = RecordingPlatform::new(scripted_input());
    let mut s = Session::new(platform, EngineConfig::simulated());

    let first = s.recorded_run(vec![press_of(key_a()), deadline(1_000)]).unwrap();
    assert_eq!(first.created_ms(), 80);

    // Not recorded: consumes tick 3.
    s.wait(40).unwrap();

    let click = s.recorded_run(vec![left_click()]).unwrap();
    assert_eq!(click.created_ms(), 200);

    let released = Predicate::polled(
        DeviceKind::Keyboard,
        key_a().channel(),
        Condition::scalar(symbol::RELEASED, ScalarTest::Equal),
    );
    let up = s.recorded_run(vec![released]).unwrap();
    assert_eq!(up.created_ms(), 240);

    let resize = Predicate::queued(
        EventKind::WindowResize,
        channel::WINDOW_WIDTH,
        Condition::scalar(1_000, ScalarTest::Greater),
    );
    let resized = s.recorded_run(vec![resize]).unwrap();
    assert_eq!(resized.window_resize_or_default().width, 1024);

    s.finish_recording()
}

// ---------------------------------------------------------------------------
// 1. Recording
// ---------------------------------------------------------------------------

#[test]
fn recording_keeps_every_pump_and_only_recorded_runs() {
    let log = record_session();
    assert_eq!(log.frames.len(), 8);
    assert_eq!(log.runs.len(), 4);

    let starts: Vec<usize> = log.runs.iter().map(|r| r.first_frame).collect();
    assert_eq!(starts, vec![0, 3, 5, 6]);
    let ticks: Vec<u64> = log.runs.iter().map(|r| r.ticks).collect();
    assert_eq!(ticks, vec![2, 2, 1, 2]);

    assert_eq!(log.frames[1].keys, vec![(key_a(), KeyState::Pressed)]);
    assert_eq!(log.frames[5].keys, vec![(key_a(), KeyState::Released)]);
    assert_eq!(log.frames[7].window, Some((1024, 768)));
    assert!(log.frames.iter().all(|f| !f.quit));
}

// ---------------------------------------------------------------------------
// 2. Replay
// ---------------------------------------------------------------------------

#[test]
fn replay_through_json_reproduces_every_run() {
    let log = record_session();
    let json = log.to_json().unwrap();
    let restored = ReplayLog::from_json(&json).unwrap();
    assert_eq!(restored, log);

    let result = verify_replay(&restored).unwrap();
    assert!(result.completed);
    assert_eq!(result.runs_checked, 4);
    assert_eq!(result.first_divergence, None);
}

#[test]
fn replay_is_repeatable() {
    let log = record_session();
    let a = verify_replay(&log).unwrap();
    let b = verify_replay(&log).unwrap();
    assert_eq!(a, b);
}

#[test]
fn altered_input_diverges_at_the_affected_run() {
    let mut log = record_session();
    let click_frame = &mut log.frames[4];
    assert_eq!(click_frame.records.len(), 1);
    click_frame.records[0].set_payload(EventPayload::MouseButton(MouseButtonEvent {
        x: 99,
        y: 34,
        button: channel::LEFT_BUTTON,
        state: KeyState::Pressed,
    }));

    let result = verify_replay(&log).unwrap();
    assert!(!result.completed);
    assert_eq!(result.runs_checked, 1);
    let divergence = result.first_divergence.unwrap();
    assert_eq!(divergence.run_index, 1);
    assert_eq!(divergence.expected_hash, log.runs[1].outcome_hash);
    assert!(divergence.actual_hash.is_some());
}

#[test]
fn removed_input_runs_out_of_frames() {
    let mut log = record_session();
    // Without the resize the last run never ends.
    log.frames[7].window = None;
    log.frames[7].records.clear();

    let result = verify_replay(&log).unwrap();
    let divergence = result.first_divergence.unwrap();
    assert_eq!(divergence.run_index, 3);
    assert_eq!(divergence.actual_hash, None);
    assert_eq!(result.runs_checked, 3);
}

#[test]
fn truncated_log_is_rejected_before_replay() {
    let mut log = record_session();
    log.frames.truncate(6);
    let err = verify_replay(&log).unwrap_err();
    assert!(err.to_string().contains("run 3"), "unexpected error: {err}");
}

#[test]
fn replay_uses_the_recorded_configuration() {
    let mut log = record_session();
    log.config.tick_order = TickOrder::QueueFirst;
    // Same frames, same single-source runs: ordering does not change them.
    assert!(verify_replay(&log).unwrap().completed);

    log.config.journal_capacity = 0;
    assert!(verify_replay(&log).is_err());
}
