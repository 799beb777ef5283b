//! Script-facing wait primitives.
//!
//! Each primitive arms one or more predicates, runs the session until one
//! fires, clears both the registry and the queue whether or not the run
//! succeeded, and converts the winning record into the value a script sees.
//! Timeouts are a polled timer predicate armed next to the real condition;
//! when the timer wins the result is `"<timeout>"`.
//!
//! # Example
//!
//! ```
//! use cue_engine::prelude::*;
//!
//! let platform = ScriptedPlatform::new(10);
//! let mut session = Session::new(platform, EngineConfig::simulated());
//!
//! let result = session.wait_for_any_key_press_with_timeout(50).unwrap();
//! assert_eq!(result.value, ScriptValue::from("<timeout>"));
//! assert_eq!(result.created_ms, 50);
//! ```

use cue_events::device::{channel, DeviceKind};
use cue_events::keys::{symbol, Keycode};
use cue_events::predicate::{Condition, IntervalTest, Predicate, ScalarTest};
use cue_events::record::{EventKind, EventPayload, EventRecord};
use cue_events::value::{ScriptValue, StampedValue};

use crate::platform::Platform;
use crate::session::Session;
use crate::EngineError;

const WHEEL_MARKER: &str = "<wheel>";

impl<P: Platform> Session<P> {
    // -- timer --------------------------------------------------------------

    /// Block for `ms` milliseconds, counted from the call.
    ///
    /// # Errors
    ///
    /// Quit, abort and callback failures from the run.
    pub fn wait(&mut self, ms: u64) -> Result<(), EngineError> {
        let timer = self.timeout_predicate(ms);
        self.await_record(vec![timer]).map(drop)
    }

    // -- live keyboard state ------------------------------------------------

    /// Wait until `key` is held down. Returns immediately if it already is.
    ///
    /// # Errors
    ///
    /// Quit, abort and callback failures from the run.
    pub fn wait_for_key_down(&mut self, key: Keycode) -> Result<StampedValue, EngineError> {
        let record = self.await_record(vec![key_state(key, symbol::PRESSED)])?;
        Ok(self.result_value(&record))
    }

    /// Wait until `key` is up. Returns immediately if it already is.
    ///
    /// # Errors
    ///
    /// Quit, abort and callback failures from the run.
    pub fn wait_for_key_up(&mut self, key: Keycode) -> Result<StampedValue, EngineError> {
        let record = self.await_record(vec![key_state(key, symbol::RELEASED)])?;
        Ok(self.result_value(&record))
    }

    /// Wait until any key is held down.
    ///
    /// # Errors
    ///
    /// Quit, abort and callback failures from the run.
    pub fn wait_for_any_key_down(&mut self) -> Result<StampedValue, EngineError> {
        self.wait_for_key_down(Keycode::ANY_KEY)
    }

    /// # Errors
    ///
    /// Quit, abort and callback failures from the run.
    pub fn wait_for_any_key_down_with_timeout(
        &mut self,
        ms: u64,
    ) -> Result<StampedValue, EngineError> {
        let timer = self.timeout_predicate(ms);
        let record =
            self.await_record(vec![key_state(Keycode::ANY_KEY, symbol::PRESSED), timer])?;
        Ok(self.result_value(&record))
    }

    /// Wait until any key in `keys` is held down. The result names the key;
    /// when several are down, the first listed wins.
    ///
    /// # Errors
    ///
    /// [`EngineError::InvalidArgument`] for an empty list; otherwise failures
    /// from the run.
    pub fn wait_for_key_list_down(
        &mut self,
        keys: &[Keycode],
    ) -> Result<StampedValue, EngineError> {
        let predicates = non_empty(keys)?
            .iter()
            .map(|&key| key_state(key, symbol::PRESSED))
            .collect();
        let record = self.await_record(predicates)?;
        Ok(self.result_value(&record))
    }

    /// Wait until no key is held. Returns on the next tick if none is.
    ///
    /// The result is the keyboard reading that ended the wait, stamped with
    /// the time it was taken.
    ///
    /// # Errors
    ///
    /// Quit, abort and callback failures from the run.
    pub fn wait_for_all_keys_up(&mut self) -> Result<StampedValue, EngineError> {
        let none_down = Predicate::polled(
            DeviceKind::Keyboard,
            channel::ANY,
            Condition::scalar(symbol::PRESSED, ScalarTest::NotEqual),
        );
        let record = self.await_record(vec![none_down])?;
        Ok(record.to_script_value())
    }

    /// Whether `key` was held at the last pump. Does not tick.
    pub fn is_key_down(&self, key: Keycode) -> bool {
        self.devices().keyboard.is_down(key)
    }

    /// The negation of [`is_key_down`](Self::is_key_down).
    pub fn is_key_up(&self, key: Keycode) -> bool {
        !self.is_key_down(key)
    }

    pub fn is_any_key_down(&self) -> bool {
        self.is_key_down(Keycode::ANY_KEY)
    }

    /// The lowest held keycode at the last pump, if any key is down.
    pub fn first_key_down(&self) -> Option<Keycode> {
        self.devices().keyboard.first_down()
    }

    // -- queued key transitions ---------------------------------------------

    /// Wait for a press of `key` that happens after the call.
    ///
    /// # Errors
    ///
    /// Quit, abort and callback failures from the run.
    pub fn wait_for_key_press(&mut self, key: Keycode) -> Result<StampedValue, EngineError> {
        let record = self.await_record(vec![key_transition(key, symbol::PRESSED)])?;
        Ok(self.result_value(&record))
    }

    /// # Errors
    ///
    /// Quit, abort and callback failures from the run.
    pub fn wait_for_key_release(&mut self, key: Keycode) -> Result<StampedValue, EngineError> {
        let record = self.await_record(vec![key_transition(key, symbol::RELEASED)])?;
        Ok(self.result_value(&record))
    }

    /// # Errors
    ///
    /// Quit, abort and callback failures from the run.
    pub fn wait_for_any_key_press(&mut self) -> Result<StampedValue, EngineError> {
        self.wait_for_key_press(Keycode::ANY_KEY)
    }

    /// # Errors
    ///
    /// Quit, abort and callback failures from the run.
    pub fn wait_for_any_key_press_with_timeout(
        &mut self,
        ms: u64,
    ) -> Result<StampedValue, EngineError> {
        let timer = self.timeout_predicate(ms);
        let record =
            self.await_record(vec![key_transition(Keycode::ANY_KEY, symbol::PRESSED), timer])?;
        Ok(self.result_value(&record))
    }

    /// Wait for a press of any key in `keys`. The result names the key.
    ///
    /// # Errors
    ///
    /// [`EngineError::InvalidArgument`] for an empty list, which could never
    /// match; otherwise failures from the run.
    pub fn wait_for_list_key_press(
        &mut self,
        keys: &[Keycode],
    ) -> Result<StampedValue, EngineError> {
        let predicates = key_list(keys)?;
        let record = self.await_record(predicates)?;
        Ok(self.result_value(&record))
    }

    /// # Errors
    ///
    /// [`EngineError::InvalidArgument`] for an empty list; otherwise failures
    /// from the run.
    pub fn wait_for_list_key_press_with_timeout(
        &mut self,
        keys: &[Keycode],
        ms: u64,
    ) -> Result<StampedValue, EngineError> {
        let mut predicates = key_list(keys)?;
        predicates.push(self.timeout_predicate(ms));
        let record = self.await_record(predicates)?;
        Ok(self.result_value(&record))
    }

    // -- mouse and window ---------------------------------------------------

    /// Wait for a button press or release, or a wheel movement.
    ///
    /// Buttons yield `[x, y, button, "<pressed>" | "<released>"]`; the wheel
    /// yields `[x, y, 0, "<wheel>", dx, dy]` with `dy` already corrected for
    /// flipped scrolling.
    ///
    /// # Errors
    ///
    /// Quit, abort and callback failures from the run.
    pub fn wait_for_mouse_button(&mut self) -> Result<StampedValue, EngineError> {
        let record = self.await_record(mouse_predicates())?;
        Ok(self.result_value(&record))
    }

    /// # Errors
    ///
    /// Quit, abort and callback failures from the run.
    pub fn wait_for_mouse_button_with_timeout(
        &mut self,
        ms: u64,
    ) -> Result<StampedValue, EngineError> {
        let mut predicates = mouse_predicates();
        predicates.push(self.timeout_predicate(ms));
        let record = self.await_record(predicates)?;
        Ok(self.result_value(&record))
    }

    /// Wait for the window to be resized. Yields `[width, height]`.
    ///
    /// # Errors
    ///
    /// Quit, abort and callback failures from the run.
    pub fn wait_for_window_resize(&mut self) -> Result<StampedValue, EngineError> {
        let resize = Predicate::queued(
            EventKind::WindowResize,
            channel::WINDOW_WIDTH,
            Condition::scalar(0, ScalarTest::AlwaysTrue),
        );
        let record = self.await_record(vec![resize])?;
        Ok(record.to_script_value())
    }

    // -- helpers ------------------------------------------------------------

    /// Arm, run, then clear registry and queue regardless of the outcome.
    pub(crate) fn await_record(
        &mut self,
        predicates: Vec<Predicate>,
    ) -> Result<EventRecord, EngineError> {
        let outcome = self.arm(predicates).and_then(|()| self.run());
        self.clear_all();
        outcome
    }

    fn arm(&mut self, predicates: Vec<Predicate>) -> Result<(), EngineError> {
        for predicate in predicates {
            self.register(predicate)?;
        }
        Ok(())
    }

    /// A timer predicate `ms` after the platform's current time.
    fn timeout_predicate(&mut self, ms: u64) -> Predicate {
        let deadline = i64::try_from(self.sync_clock().saturating_add(ms)).unwrap_or(i64::MAX);
        Predicate::polled(
            DeviceKind::Timer,
            channel::ELAPSED_MS,
            Condition::scalar(deadline, ScalarTest::GreaterOrEqual),
        )
    }

    /// The value a script receives for the record that ended a wait: key
    /// names for keyboard results, mouse lists with a state marker, and
    /// `"<timeout>"` for the timer.
    pub(crate) fn result_value(&self, record: &EventRecord) -> StampedValue {
        let Some(dummy) = record.as_dummy().filter(|d| d.device == DeviceKind::Keyboard) else {
            return mouse_value(record);
        };
        let key = if dummy.channel == channel::ANY {
            self.devices().keyboard.first_down().unwrap_or(Keycode::ANY_KEY)
        } else {
            Keycode(dummy.channel)
        };
        StampedValue {
            value: ScriptValue::Text(key.name()),
            created_ms: record.created_ms(),
        }
    }
}

fn key_state(key: Keycode, target: i64) -> Predicate {
    Predicate::polled(
        DeviceKind::Keyboard,
        key.channel(),
        Condition::scalar(target, ScalarTest::Equal),
    )
}

fn key_transition(key: Keycode, target: i64) -> Predicate {
    Predicate::queued(
        EventKind::Keyboard,
        key.channel(),
        Condition::scalar(target, ScalarTest::Equal),
    )
}

fn non_empty(keys: &[Keycode]) -> Result<&[Keycode], EngineError> {
    if keys.is_empty() {
        return Err(EngineError::InvalidArgument(
            "key list must not be empty".to_owned(),
        ));
    }
    Ok(keys)
}

fn key_list(keys: &[Keycode]) -> Result<Vec<Predicate>, EngineError> {
    Ok(non_empty(keys)?
        .iter()
        .map(|&key| key_transition(key, symbol::PRESSED))
        .collect())
}

fn mouse_predicates() -> Vec<Predicate> {
    vec![
        Predicate::queued(
            EventKind::MouseButton,
            channel::LEFT_BUTTON,
            Condition::interval(0, 0, IntervalTest::AlwaysTrue),
        ),
        Predicate::queued(
            EventKind::MouseWheel,
            channel::WHEEL_Y,
            Condition::interval(0, 0, IntervalTest::AlwaysTrue),
        ),
    ]
}

fn mouse_value(record: &EventRecord) -> StampedValue {
    let value = match record.payload() {
        EventPayload::MouseButton(e) => ScriptValue::List(vec![
            e.x.into(),
            e.y.into(),
            e.button.into(),
            e.state.marker().into(),
        ]),
        EventPayload::MouseWheel(e) => ScriptValue::List(vec![
            e.x.into(),
            e.y.into(),
            ScriptValue::Integer(0),
            WHEEL_MARKER.into(),
            e.dx.into(),
            (e.dy * e.direction).into(),
        ]),
        _ => return record.to_script_value(),
    };
    StampedValue {
        value,
        created_ms: record.created_ms(),
    }
}
