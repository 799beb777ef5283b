//! String-based event registration for script interpreters.
//!
//! Scripts describe predicates with bracketed names instead of Rust types:
//!
//! ```text
//! register_event("<KEY_PRESS>", "a", 0, "<EQUAL>", "on_a", [])
//! register_event("<MOUSE_MOVEMENT>", 0, [[0, 0], [100, 100]], "<INSIDE>", "", 0)
//! register_event("<TIMER>", 1, 5000, "<GEQ>", "", 0)
//! start_event_loop()
//! clear_event_loop()
//! ```
//!
//! Device and test names are case-insensitive. Bounds are a number (scalar
//! test), `[low, high]` (interval test) or `[[x1, y1], [x2, y2]]` (region
//! test). Key and mouse-button devices ignore the bounds and test for
//! pressed or released. `<TIMER>` is polled; every other device is matched
//! against queued records. An empty function name makes the predicate end
//! the wait.
//!
//! # Example
//!
//! ```
//! use cue_engine::prelude::*;
//!
//! let platform = ScriptedPlatform::new(10).key_down_at(2, Keycode::from_char('q'));
//! let mut session = Session::new(platform, EngineConfig::simulated());
//!
//! let (key, bounds) = (ScriptValue::from("q"), ScriptValue::Integer(0));
//! session
//!     .register_event("<key_press>", &key, &bounds, "<equal>", "", ScriptValue::default())
//!     .unwrap();
//! let result = session.start_event_loop().unwrap();
//! assert_eq!(result.value, ScriptValue::from("q"));
//! session.clear_event_loop();
//! ```

use cue_events::device::{channel, DeviceKind, Point};
use cue_events::keys::{symbol, Keycode};
use cue_events::predicate::{Comparator, Condition, Predicate, PredicateId};
use cue_events::record::EventKind;
use cue_events::value::{ScriptValue, StampedValue};
use cue_events::EventError;

use crate::platform::Platform;
use crate::session::Session;
use crate::EngineError;

/// Where a named device sends its predicates, and what it tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Target {
    /// Queued key records, target forced to the given state.
    Key(i64),
    /// Queued mouse-button records, target forced to the given state.
    Button(i64),
    Queue(EventKind),
    Timer,
}

fn parse_device(name: &str) -> Result<Target, EventError> {
    let target = match name.to_ascii_uppercase().as_str() {
        "<KEY_PRESS>" => Target::Key(symbol::PRESSED),
        "<KEY_RELEASE>" => Target::Key(symbol::RELEASED),
        "<TEXT_INPUT>" => Target::Queue(EventKind::TextInput),
        "<MOUSE_MOVEMENT>" => Target::Queue(EventKind::MouseMove),
        "<MOUSE_BUTTON>" | "<MOUSE_BUTTON_PRESS>" => Target::Button(symbol::PRESSED),
        "<MOUSE_BUTTON_RELEASE>" => Target::Button(symbol::RELEASED),
        "<MOUSE_WHEEL>" => Target::Queue(EventKind::MouseWheel),
        "<TIMER>" => Target::Timer,
        "<WINDOW_RESIZE>" => Target::Queue(EventKind::WindowResize),
        "<MOVIE_END>" => Target::Queue(EventKind::MovieEnd),
        _ => return Err(EventError::UnknownDevice(name.to_owned())),
    };
    Ok(target)
}

impl<P: Platform> Session<P> {
    /// Register a predicate described by script values.
    ///
    /// `interface` is the key name (or keycode) for key devices, the button
    /// number for mouse buttons, and the channel for everything else.
    ///
    /// # Errors
    ///
    /// - [`EventError::UnknownDevice`] or [`EventError::UnknownComparator`]
    ///   for names not listed in the module docs.
    /// - [`EventError::InvalidComparator`] when the test does not apply to
    ///   the shape of `bounds`.
    /// - [`EngineError::InvalidArgument`] for malformed bounds or interface.
    /// - Any registration error from [`Session::register`].
    pub fn register_event(
        &mut self,
        device: &str,
        interface: &ScriptValue,
        bounds: &ScriptValue,
        test: &str,
        function: &str,
        parameter: ScriptValue,
    ) -> Result<PredicateId, EngineError> {
        let target = parse_device(device)?;
        let comparator: Comparator = test.to_ascii_uppercase().parse()?;

        let predicate = match target {
            Target::Key(state) => Predicate::queued(
                EventKind::Keyboard,
                key_interface(interface)?.channel(),
                Condition::scalar_with(state, comparator)?,
            ),
            Target::Button(state) => Predicate::queued(
                EventKind::MouseButton,
                integer_interface(interface)?,
                Condition::scalar_with(state, comparator)?,
            ),
            Target::Queue(kind) => Predicate::queued(
                kind,
                interface.as_integer().unwrap_or_else(|| default_channel(kind)),
                parse_bounds(bounds, comparator)?,
            ),
            Target::Timer => Predicate::polled(
                DeviceKind::Timer,
                interface.as_integer().unwrap_or(channel::ELAPSED_MS),
                parse_bounds(bounds, comparator)?,
            ),
        }
        .with_callback(function, parameter);

        tracing::debug!(device, test, function, "script event registered");
        self.register(predicate)
    }

    /// Run until a registered terminating predicate fires and convert the
    /// record the way the wait primitives do. The registry is left as is;
    /// call [`clear_event_loop`](Self::clear_event_loop) afterwards.
    ///
    /// # Errors
    ///
    /// Quit, abort and callback failures from the run.
    pub fn start_event_loop(&mut self) -> Result<StampedValue, EngineError> {
        let record = self.run()?;
        Ok(self.result_value(&record))
    }

    /// Drop every registered predicate and buffered record.
    pub fn clear_event_loop(&mut self) {
        self.clear_all();
    }
}

fn key_interface(interface: &ScriptValue) -> Result<Keycode, EngineError> {
    match interface {
        ScriptValue::Integer(code) => Ok(Keycode(*code)),
        ScriptValue::Text(name) => Keycode::from_name(name)
            .ok_or_else(|| EngineError::InvalidArgument(format!("unknown key name '{name}'"))),
        ScriptValue::List(_) => Err(EngineError::InvalidArgument(
            "key interface must be a key name or keycode".to_owned(),
        )),
    }
}

fn integer_interface(interface: &ScriptValue) -> Result<i64, EngineError> {
    interface.as_integer().ok_or_else(|| {
        EngineError::InvalidArgument(format!("interface must be an integer, got {interface}"))
    })
}

fn default_channel(kind: EventKind) -> i64 {
    match kind {
        EventKind::MouseWheel => channel::WHEEL_Y,
        EventKind::WindowResize => channel::WINDOW_WIDTH,
        _ => channel::CURSOR,
    }
}

fn parse_bounds(bounds: &ScriptValue, comparator: Comparator) -> Result<Condition, EngineError> {
    let malformed = || {
        EngineError::InvalidArgument(format!(
            "bounds must be a number, [low, high] or [[x1, y1], [x2, y2]], got {bounds}"
        ))
    };
    let condition = match bounds {
        ScriptValue::Integer(target) => Condition::scalar_with(*target, comparator)?,
        ScriptValue::List(items) if items.len() == 2 => match (&items[0], &items[1]) {
            (ScriptValue::Integer(low), ScriptValue::Integer(high)) => {
                Condition::interval_with(*low, *high, comparator)?
            }
            (ScriptValue::List(a), ScriptValue::List(b)) => {
                let a = parse_point(a).ok_or_else(malformed)?;
                let b = parse_point(b).ok_or_else(malformed)?;
                Condition::region_with(a, b, comparator)?
            }
            _ => return Err(malformed()),
        },
        _ => return Err(malformed()),
    };
    Ok(condition)
}

fn parse_point(items: &[ScriptValue]) -> Option<Point> {
    match items {
        [x, y] => Some(Point::new(x.as_integer()?, y.as_integer()?)),
        _ => None,
    }
}
