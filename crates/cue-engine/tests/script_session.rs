//! A trial script driven end to end: string registration, callbacks, the
//! wait primitives and the inner mini-loop pattern, against one session.

use std::cell::RefCell;
use std::rc::Rc;

use cue_engine::prelude::*;

const TICK_MS: u64 = 10;

fn text(s: &str) -> ScriptValue {
    ScriptValue::from(s)
}

fn int(n: i64) -> ScriptValue {
    ScriptValue::Integer(n)
}

fn wheel(dy: i64, direction: i64) -> EventPayload {
    EventPayload::MouseWheel(MouseWheelEvent {
        x: 7,
        y: 8,
        dx: 1,
        dy,
        direction,
    })
}

// ---------------------------------------------------------------------------
// 1. Registration surface
// ---------------------------------------------------------------------------

#[test]
fn fixation_then_response_with_deadline() {
    let hits: Rc<RefCell<Vec<ScriptValue>>> = Rc::default();
    let sink = Rc::clone(&hits);
    let host = move |call: CallbackCall<'_>| -> Result<(), BoxError> {
        let entry = vec![call.parameter.clone(), call.trigger.to_script_value()];
        sink.borrow_mut().push(ScriptValue::List(entry));
        Ok(())
    };

    let platform = ScriptedPlatform::new(TICK_MS)
        .key_down_at(3, Keycode::SPACE)
        .key_down_at(6, Keycode::from_char('j'));
    let mut s = Session::new(platform, EngineConfig::simulated()).with_callbacks(host);

    // Space is only logged; 'j' or 'f' answers; 500 ms is the deadline.
    s.register_event("<KEY_PRESS>", &text(" "), &int(0), "<EQUAL>", "log_space", int(1))
        .unwrap();
    for answer in ["j", "f"] {
        s.register_event("<KEY_PRESS>", &text(answer), &int(0), "<EQUAL>", "", int(0))
            .unwrap();
    }
    s.register_event("<TIMER>", &int(1), &int(500), "<GEQ>", "", int(0))
        .unwrap();

    let result = s.start_event_loop().unwrap();
    assert_eq!(result.value, text("j"));
    assert_eq!(result.created_ms, 60);
    assert_eq!(*hits.borrow(), vec![ScriptValue::List(vec![int(1), text(" ")])]);

    // The callback predicate is gone; the three others remain until cleared.
    assert_eq!(s.event_loop().len(), 3);
    s.clear_event_loop();
    assert!(s.event_loop().is_empty());
    assert!(s.queue().is_empty());
}

#[test]
fn unknown_names_leave_the_registry_untouched() {
    let mut s = Session::new(ScriptedPlatform::new(TICK_MS), EngineConfig::simulated());
    assert!(matches!(
        s.register_event("<GAMEPAD>", &int(0), &int(0), "<EQUAL>", "", int(0)),
        Err(EngineError::Event(EventError::UnknownDevice(_)))
    ));
    assert!(matches!(
        s.register_event("<TIMER>", &int(1), &int(0), "<ABOUT>", "", int(0)),
        Err(EngineError::Event(EventError::UnknownComparator(_)))
    ));
    assert!(s.event_loop().is_empty());
}

// ---------------------------------------------------------------------------
// 2. Wait primitives in sequence
// ---------------------------------------------------------------------------

#[test]
fn a_trial_of_consecutive_waits() {
    let platform = ScriptedPlatform::new(TICK_MS)
        .key_down_at(2, Keycode::RETURN)
        .key_up_at(4, Keycode::RETURN)
        .record_at(9, wheel(3, -1))
        .at(
            12,
            ScriptedInput::Resize {
                width: 640,
                height: 480,
            },
        )
        .key_down_at(15, Keycode::from_char('k'));
    let mut s = Session::new(platform, EngineConfig::simulated());

    let pressed = s.wait_for_key_press(Keycode::RETURN).unwrap();
    assert_eq!((pressed.value, pressed.created_ms), (text("<return>"), 20));

    // Held from tick 2; the release is a live-table change on tick 4.
    let up = s.wait_for_key_up(Keycode::RETURN).unwrap();
    assert_eq!(up.created_ms, 40);

    s.wait(30).unwrap();
    assert_eq!(s.now_ms(), 70);

    let scroll = s.wait_for_mouse_button_with_timeout(1_000).unwrap();
    assert_eq!(
        scroll.value,
        ScriptValue::List(vec![int(7), int(8), int(0), text("<wheel>"), int(1), int(-3)])
    );

    let size = s.wait_for_window_resize().unwrap();
    assert_eq!(size.value, ScriptValue::from(vec![640i64, 480]));

    let xy = [Keycode::from_char('x'), Keycode::from_char('y')];
    let none = s.wait_for_list_key_press_with_timeout(&xy, 20).unwrap();
    assert_eq!((none.value, none.created_ms), (text("<timeout>"), 140));

    let any = s.wait_for_any_key_press().unwrap();
    assert_eq!((any.value, any.created_ms), (text("k"), 150));

    assert!(s.event_loop().is_empty());
    assert!(s.queue().is_empty());
}

#[test]
fn empty_key_list_is_an_argument_error() {
    let mut s = Session::new(ScriptedPlatform::new(TICK_MS), EngineConfig::simulated());
    assert!(matches!(
        s.wait_for_list_key_press(&[]),
        Err(EngineError::InvalidArgument(_))
    ));
}

// ---------------------------------------------------------------------------
// 3. Inner mini-loop
// ---------------------------------------------------------------------------

#[test]
fn mini_loop_polls_until_the_cursor_enters_a_region() {
    let moves = (1..=6).map(|i| {
        EventPayload::MouseMove(MouseMoveEvent {
            x: i * 20,
            y: 50,
            rel_x: 20,
            rel_y: 0,
        })
    });
    let platform = moves
        .enumerate()
        .fold(ScriptedPlatform::new(TICK_MS), |p, (i, m)| p.record_at(i as u64 + 1, m));
    let mut s = Session::new(platform, EngineConfig::simulated());

    let region = ScriptValue::List(vec![
        ScriptValue::from(vec![90i64, 0]),
        ScriptValue::from(vec![200i64, 100]),
    ]);
    let mut frames = 0;
    let entered = loop {
        frames += 1;
        s.register_event("<MOUSE_MOVEMENT>", &int(0), &region, "<INSIDE>", "", int(0))
            .unwrap();
        let outcome = s.tick().unwrap();
        s.clear_event_loop();
        if let Some(record) = outcome {
            break record;
        }
    };
    assert_eq!(frames, 5);
    assert_eq!(entered.mouse_move_or_default().x, 100);
}
