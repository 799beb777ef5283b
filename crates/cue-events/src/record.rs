//! Event records: immutable snapshots of one discrete occurrence.
//!
//! An [`EventRecord`] wraps an [`EventPayload`], a closed sum type over the
//! eleven event kinds. The discriminant is the payload variant itself, so a
//! record can never carry a payload that disagrees with its kind.
//!
//! Most callers pattern-match on [`EventRecord::payload`]. For the call sites
//! that branch on the kind first and then read fields unconditionally, each
//! payload has an `*_or_default` accessor returning a documented neutral value
//! when the record is of another kind:
//!
//! | accessor                 | default when kind differs                        |
//! |--------------------------|--------------------------------------------------|
//! | `keyboard_or_default`    | scancode 0, key `UNKNOWN`, state unknown, no mods |
//! | `text_editing_or_default`| window 0, empty text                              |
//! | `text_input_or_default`  | window 0, empty text, start 0, length 0           |
//! | `mouse_move_or_default`  | all zero                                          |
//! | `mouse_button_or_default`| all zero, state unknown                           |
//! | `mouse_wheel_or_default` | all zero, direction 1                             |
//! | `movie_or_default`       | `true`                                            |
//! | `window_resize_or_default` | 0 x 0                                           |
//! | `dummy_or_default`       | value 0 from the timer                            |
//!
//! # Example
//!
//! ```
//! use cue_events::keys::{symbol, KeyState, Keycode, Modifiers};
//! use cue_events::record::{EventPayload, EventRecord, KeyboardEvent};
//!
//! let a = Keycode::from_char('a');
//! let record = EventRecord::with_payload(
//!     EventPayload::Keyboard(KeyboardEvent {
//!         scancode: 4,
//!         key: a,
//!         state: KeyState::Pressed,
//!         modifiers: Modifiers::empty(),
//!     }),
//!     120,
//! );
//!
//! assert_eq!(record.derive_scalar(a.channel()).unwrap(), symbol::PRESSED);
//! assert_eq!(record.derive_scalar(Keycode::from_char('b').channel()).unwrap(), symbol::UNKNOWN);
//! assert_eq!(record.to_script_value().value.as_text(), Some("a"));
//! assert_eq!(record.mouse_wheel_or_default().direction, 1);
//! ```

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::device::{channel, DeviceKind, Point};
use crate::keys::{symbol, KeyState, Keycode, Modifiers};
use crate::value::{ScriptValue, StampedValue};
use crate::EventError;

// ---------------------------------------------------------------------------
// EventKind
// ---------------------------------------------------------------------------

/// Discriminant of an [`EventRecord`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EventKind {
    Keyboard,
    TextEditing,
    TextInput,
    MouseMove,
    MouseButton,
    MouseWheel,
    MovieRefresh,
    MovieEnd,
    WindowResize,
    Timer,
    Dummy,
}

impl EventKind {
    /// All kinds, in declaration order.
    pub const ALL: [EventKind; 11] = [
        EventKind::Keyboard,
        EventKind::TextEditing,
        EventKind::TextInput,
        EventKind::MouseMove,
        EventKind::MouseButton,
        EventKind::MouseWheel,
        EventKind::MovieRefresh,
        EventKind::MovieEnd,
        EventKind::WindowResize,
        EventKind::Timer,
        EventKind::Dummy,
    ];

    /// Whether records of this kind carry a cursor position.
    pub fn is_planar(self) -> bool {
        matches!(
            self,
            EventKind::MouseMove | EventKind::MouseButton | EventKind::MouseWheel
        )
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

// ---------------------------------------------------------------------------
// Payloads
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyboardEvent {
    pub scancode: i64,
    pub key: Keycode,
    pub state: KeyState,
    pub modifiers: Modifiers,
}

impl Default for KeyboardEvent {
    fn default() -> Self {
        Self {
            scancode: 0,
            key: Keycode::UNKNOWN,
            state: KeyState::Unknown,
            modifiers: Modifiers::empty(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TextEditingEvent {
    pub window_id: u32,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TextInputEvent {
    pub window_id: u32,
    pub text: String,
    pub start: i64,
    pub length: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct MouseMoveEvent {
    pub x: i64,
    pub y: i64,
    pub rel_x: i64,
    pub rel_y: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct MouseButtonEvent {
    pub x: i64,
    pub y: i64,
    pub button: i64,
    pub state: KeyState,
}

/// Wheel motion. `direction` is `-1` when the platform reports flipped
/// (natural) scrolling; script-facing deltas are multiplied by it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MouseWheelEvent {
    pub x: i64,
    pub y: i64,
    pub dx: i64,
    pub dy: i64,
    pub direction: i64,
}

impl Default for MouseWheelEvent {
    fn default() -> Self {
        Self {
            x: 0,
            y: 0,
            dx: 0,
            dy: 0,
            direction: 1,
        }
    }
}

/// Media refresh or media end.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MovieEvent {
    pub value: bool,
}

impl Default for MovieEvent {
    fn default() -> Self {
        Self { value: true }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct WindowResizeEvent {
    pub width: i64,
    pub height: i64,
}

/// Result synthesized by the scheduler when a polled predicate matches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DummyEvent {
    /// The reading that satisfied the predicate.
    pub value: i64,
    /// Planar reading, for region predicates.
    pub point: Option<Point>,
    /// Channel the predicate was tested on.
    pub channel: i64,
    /// Device the reading came from.
    pub device: DeviceKind,
}

impl Default for DummyEvent {
    fn default() -> Self {
        Self {
            value: 0,
            point: None,
            channel: 0,
            device: DeviceKind::Timer,
        }
    }
}

/// Kind-specific payload. The variant is the record's discriminant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventPayload {
    Keyboard(KeyboardEvent),
    TextEditing(TextEditingEvent),
    TextInput(TextInputEvent),
    MouseMove(MouseMoveEvent),
    MouseButton(MouseButtonEvent),
    MouseWheel(MouseWheelEvent),
    MovieRefresh(MovieEvent),
    MovieEnd(MovieEvent),
    WindowResize(WindowResizeEvent),
    Timer,
    Dummy(DummyEvent),
}

impl EventPayload {
    /// The neutral payload for `kind`.
    pub fn neutral(kind: EventKind) -> Self {
        match kind {
            EventKind::Keyboard => EventPayload::Keyboard(KeyboardEvent::default()),
            EventKind::TextEditing => EventPayload::TextEditing(TextEditingEvent::default()),
            EventKind::TextInput => EventPayload::TextInput(TextInputEvent::default()),
            EventKind::MouseMove => EventPayload::MouseMove(MouseMoveEvent::default()),
            EventKind::MouseButton => EventPayload::MouseButton(MouseButtonEvent::default()),
            EventKind::MouseWheel => EventPayload::MouseWheel(MouseWheelEvent::default()),
            EventKind::MovieRefresh => EventPayload::MovieRefresh(MovieEvent::default()),
            EventKind::MovieEnd => EventPayload::MovieEnd(MovieEvent::default()),
            EventKind::WindowResize => EventPayload::WindowResize(WindowResizeEvent::default()),
            EventKind::Timer => EventPayload::Timer,
            EventKind::Dummy => EventPayload::Dummy(DummyEvent::default()),
        }
    }

    pub fn kind(&self) -> EventKind {
        match self {
            EventPayload::Keyboard(_) => EventKind::Keyboard,
            EventPayload::TextEditing(_) => EventKind::TextEditing,
            EventPayload::TextInput(_) => EventKind::TextInput,
            EventPayload::MouseMove(_) => EventKind::MouseMove,
            EventPayload::MouseButton(_) => EventKind::MouseButton,
            EventPayload::MouseWheel(_) => EventKind::MouseWheel,
            EventPayload::MovieRefresh(_) => EventKind::MovieRefresh,
            EventPayload::MovieEnd(_) => EventKind::MovieEnd,
            EventPayload::WindowResize(_) => EventKind::WindowResize,
            EventPayload::Timer => EventKind::Timer,
            EventPayload::Dummy(_) => EventKind::Dummy,
        }
    }
}

// ---------------------------------------------------------------------------
// EventRecord
// ---------------------------------------------------------------------------

/// One discrete occurrence, stamped with its creation time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventRecord {
    payload: EventPayload,
    /// Milliseconds on the session clock when the record was produced.
    created_ms: u64,
    window_id: Option<u32>,
}

impl EventRecord {
    /// A record of `kind` with the neutral payload for that kind.
    pub fn new(kind: EventKind, created_ms: u64, window_id: Option<u32>) -> Self {
        Self {
            payload: EventPayload::neutral(kind),
            created_ms,
            window_id,
        }
    }

    pub fn with_payload(payload: EventPayload, created_ms: u64) -> Self {
        Self {
            payload,
            created_ms,
            window_id: None,
        }
    }

    /// Builder-style window id.
    pub fn in_window(mut self, window_id: u32) -> Self {
        self.window_id = Some(window_id);
        self
    }

    /// A dummy record reporting a polled reading.
    pub fn dummy(event: DummyEvent, created_ms: u64) -> Self {
        Self::with_payload(EventPayload::Dummy(event), created_ms)
    }

    /// Replace the payload. The kind changes with it.
    pub fn set_payload(&mut self, payload: EventPayload) {
        self.payload = payload;
    }

    pub fn kind(&self) -> EventKind {
        self.payload.kind()
    }

    pub fn payload(&self) -> &EventPayload {
        &self.payload
    }

    pub fn created_ms(&self) -> u64 {
        self.created_ms
    }

    pub fn window_id(&self) -> Option<u32> {
        self.window_id
    }

    // -- typed accessors ----------------------------------------------------

    pub fn as_keyboard(&self) -> Option<&KeyboardEvent> {
        match &self.payload {
            EventPayload::Keyboard(e) => Some(e),
            _ => None,
        }
    }

    pub fn as_mouse_button(&self) -> Option<&MouseButtonEvent> {
        match &self.payload {
            EventPayload::MouseButton(e) => Some(e),
            _ => None,
        }
    }

    pub fn as_mouse_wheel(&self) -> Option<&MouseWheelEvent> {
        match &self.payload {
            EventPayload::MouseWheel(e) => Some(e),
            _ => None,
        }
    }

    pub fn as_dummy(&self) -> Option<&DummyEvent> {
        match &self.payload {
            EventPayload::Dummy(e) => Some(e),
            _ => None,
        }
    }

    // -- defaulting accessors -----------------------------------------------

    pub fn keyboard_or_default(&self) -> KeyboardEvent {
        self.as_keyboard().copied().unwrap_or_default()
    }

    pub fn text_editing_or_default(&self) -> TextEditingEvent {
        match &self.payload {
            EventPayload::TextEditing(e) => e.clone(),
            _ => TextEditingEvent::default(),
        }
    }

    pub fn text_input_or_default(&self) -> TextInputEvent {
        match &self.payload {
            EventPayload::TextInput(e) => e.clone(),
            _ => TextInputEvent::default(),
        }
    }

    pub fn mouse_move_or_default(&self) -> MouseMoveEvent {
        match &self.payload {
            EventPayload::MouseMove(e) => *e,
            _ => MouseMoveEvent::default(),
        }
    }

    pub fn mouse_button_or_default(&self) -> MouseButtonEvent {
        self.as_mouse_button().copied().unwrap_or_default()
    }

    pub fn mouse_wheel_or_default(&self) -> MouseWheelEvent {
        self.as_mouse_wheel().copied().unwrap_or_default()
    }

    /// Media refresh and media end share one payload shape.
    pub fn movie_or_default(&self) -> MovieEvent {
        match &self.payload {
            EventPayload::MovieRefresh(e) | EventPayload::MovieEnd(e) => *e,
            _ => MovieEvent::default(),
        }
    }

    pub fn window_resize_or_default(&self) -> WindowResizeEvent {
        match &self.payload {
            EventPayload::WindowResize(e) => *e,
            _ => WindowResizeEvent::default(),
        }
    }

    pub fn dummy_or_default(&self) -> DummyEvent {
        self.as_dummy().copied().unwrap_or_default()
    }

    // -- derivations ----------------------------------------------------------

    /// One canonical integer describing this record relative to `channel`.
    ///
    /// | kind            | result                                                    |
    /// |-----------------|-----------------------------------------------------------|
    /// | keyboard        | key state if `channel` is the key or `ANY_KEY`, else unknown |
    /// | text editing/input | 1                                                      |
    /// | mouse button    | button state if `channel` is the button, else unknown      |
    /// | mouse wheel     | dx on channel 1, dy on channel 2, else unknown             |
    /// | window resize   | width on `WINDOW_WIDTH`, height otherwise                  |
    /// | move, timer, movie | unknown                                                 |
    /// | dummy           | error                                                      |
    ///
    /// # Errors
    ///
    /// [`EventError::NoScalarDerivation`] for dummy records; a dummy reaching
    /// this path means a polled result was pushed back into the queue.
    pub fn derive_scalar(&self, channel: i64) -> Result<i64, EventError> {
        let value = match &self.payload {
            EventPayload::Keyboard(e) => {
                if channel == channel::ANY || channel == e.key.channel() {
                    e.state.as_scalar()
                } else {
                    symbol::UNKNOWN
                }
            }
            EventPayload::TextEditing(_) | EventPayload::TextInput(_) => 1,
            EventPayload::MouseButton(e) => {
                if channel == e.button {
                    e.state.as_scalar()
                } else {
                    symbol::UNKNOWN
                }
            }
            EventPayload::MouseWheel(e) => match channel {
                channel::WHEEL_X => e.dx,
                channel::WHEEL_Y => e.dy,
                _ => symbol::UNKNOWN,
            },
            EventPayload::WindowResize(e) => {
                if channel == channel::WINDOW_WIDTH {
                    e.width
                } else {
                    e.height
                }
            }
            EventPayload::MouseMove(_)
            | EventPayload::Timer
            | EventPayload::MovieRefresh(_)
            | EventPayload::MovieEnd(_) => symbol::UNKNOWN,
            EventPayload::Dummy(_) => {
                return Err(EventError::NoScalarDerivation { kind: self.kind() })
            }
        };
        Ok(value)
    }

    /// Cursor position for mouse records, `None` for everything else.
    pub fn derive_point(&self) -> Option<Point> {
        match &self.payload {
            EventPayload::MouseMove(e) => Some(Point::new(e.x, e.y)),
            EventPayload::MouseButton(e) => Some(Point::new(e.x, e.y)),
            EventPayload::MouseWheel(e) => Some(Point::new(e.x, e.y)),
            _ => None,
        }
    }

    /// Convert to the generic value a script receives, stamped with the
    /// record's creation time.
    pub fn to_script_value(&self) -> StampedValue {
        let value = match &self.payload {
            EventPayload::MouseMove(e) => {
                ScriptValue::from(vec![e.x, e.y, e.rel_x, e.rel_y])
            }
            EventPayload::MouseButton(e) => {
                ScriptValue::from(vec![e.x, e.y, e.button, e.state.as_scalar()])
            }
            EventPayload::MouseWheel(e) => {
                ScriptValue::from(vec![e.x, e.y, e.dx, e.dy, e.direction])
            }
            EventPayload::Keyboard(e) => ScriptValue::Text(e.key.name()),
            EventPayload::TextInput(e) => ScriptValue::Text(e.text.clone()),
            EventPayload::Timer => ScriptValue::from("<timeout>"),
            EventPayload::WindowResize(e) => ScriptValue::from(vec![e.width, e.height]),
            EventPayload::Dummy(e) if e.device == DeviceKind::Timer => {
                ScriptValue::from("<timeout>")
            }
            EventPayload::Dummy(e) => ScriptValue::Integer(e.value),
            EventPayload::TextEditing(_)
            | EventPayload::MovieRefresh(_)
            | EventPayload::MovieEnd(_) => ScriptValue::from("<UNKNOWN_EVENT>"),
        };
        StampedValue {
            value,
            created_ms: self.created_ms,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
