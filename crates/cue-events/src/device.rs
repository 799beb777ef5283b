//! The device contract: anything that can report the current value of a
//! numbered channel.
//!
//! Keyboards report key state per keycode channel, the timer reports elapsed
//! milliseconds, a window reports its dimensions, a joystick reports axes and
//! buttons. The scheduler never knows which concrete device it is talking to;
//! it only reads channels through [`Device`].
//!
//! # Example
//!
//! ```
//! use cue_events::device::{Device, DeviceKind};
//! use cue_events::EventError;
//!
//! struct Constant(i64);
//!
//! impl Device for Constant {
//!     fn kind(&self) -> DeviceKind {
//!         DeviceKind::Custom(7)
//!     }
//!     fn read_value(&self, _channel: i64) -> Result<i64, EventError> {
//!         Ok(self.0)
//!     }
//! }
//!
//! let device = Constant(42);
//! assert_eq!(device.read_value(3), Ok(42));
//! assert_eq!(device.read_point(3), None);
//! ```

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::EventError;

// ---------------------------------------------------------------------------
// Channels
// ---------------------------------------------------------------------------

/// Well-known channel ids.
///
/// Keyboard channels are keycodes (see [`Keycode::channel`](crate::keys::Keycode::channel)),
/// mouse-button channels are button ids.
pub mod channel {
    use crate::keys::{symbol, Keycode};

    /// Any key on a keyboard or any record of a kind.
    pub const ANY: i64 = Keycode::ANY_KEY.0;
    /// Elapsed milliseconds on the timer.
    pub const ELAPSED_MS: i64 = 1;
    /// Horizontal wheel delta.
    pub const WHEEL_X: i64 = 1;
    /// Vertical wheel delta.
    pub const WHEEL_Y: i64 = 2;
    /// Cursor position on mouse records.
    pub const CURSOR: i64 = 0;
    pub const LEFT_BUTTON: i64 = 1;
    pub const MIDDLE_BUTTON: i64 = 2;
    pub const RIGHT_BUTTON: i64 = 3;
    pub const WINDOW_WIDTH: i64 = symbol::WINDOW_WIDTH;
    pub const WINDOW_HEIGHT: i64 = symbol::WINDOW_HEIGHT;
}

// ---------------------------------------------------------------------------
// DeviceKind
// ---------------------------------------------------------------------------

/// Identity of a polled device within a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum DeviceKind {
    Timer,
    Keyboard,
    Window,
    /// A joystick, by index.
    Joystick(u8),
    /// Any other backend (eye tracker, port, serial line), by host-chosen id.
    Custom(u16),
    /// The event queue, read through the record it last matched.
    Queue,
}

impl DeviceKind {
    /// Devices every session owns. Hosts cannot register these.
    pub fn is_built_in(self) -> bool {
        matches!(
            self,
            DeviceKind::Timer | DeviceKind::Keyboard | DeviceKind::Window | DeviceKind::Queue
        )
    }

    /// Whether the device only ever produces scalar readings, so region
    /// predicates against it can never be evaluated.
    pub fn is_scalar_only(self) -> bool {
        matches!(self, DeviceKind::Timer | DeviceKind::Keyboard | DeviceKind::Window)
    }
}

impl fmt::Display for DeviceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeviceKind::Timer => f.write_str("timer"),
            DeviceKind::Keyboard => f.write_str("keyboard"),
            DeviceKind::Window => f.write_str("window"),
            DeviceKind::Joystick(i) => write!(f, "joystick#{i}"),
            DeviceKind::Custom(i) => write!(f, "custom#{i}"),
            DeviceKind::Queue => f.write_str("queue"),
        }
    }
}

// ---------------------------------------------------------------------------
// Point
// ---------------------------------------------------------------------------

/// A planar reading (cursor, gaze, joystick ball).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: i64,
    pub y: i64,
}

impl Point {
    /// A point at `(x, y)` in window pixels.
    ///
    /// ```
    /// use cue_events::device::Point;
    ///
    /// let p = Point::new(3, -4);
    /// assert_eq!((p.x, p.y), (3, -4));
    /// ```
    pub fn new(x: i64, y: i64) -> Self {
        Self { x, y }
    }
}

// ---------------------------------------------------------------------------
// Device
// ---------------------------------------------------------------------------

/// A source of current readings, addressed by channel.
///
/// Reads are synchronous and never block. The engine accepts any returned
/// integer; devices with no meaningful reading for a channel return
/// [`symbol::UNKNOWN`](crate::keys::symbol::UNKNOWN). An `Err` is reserved
/// for readings that cannot exist at all, and ends the wait that asked.
pub trait Device {
    /// Which device this is.
    fn kind(&self) -> DeviceKind;

    /// Current scalar value of `channel`.
    ///
    /// # Errors
    ///
    /// [`EventError::NoScalarDerivation`] when the device holds something
    /// with no scalar form.
    fn read_value(&self, channel: i64) -> Result<i64, EventError>;

    /// Current planar value of `channel`, for devices that have one.
    fn read_point(&self, _channel: i64) -> Option<Point> {
        None
    }
}
