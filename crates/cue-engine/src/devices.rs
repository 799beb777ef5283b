//! Built-in polled devices and the per-session device set.
//!
//! A session always has a [`Timer`], a [`Keyboard`] live-state table and a
//! [`Window`]. Hosts add joysticks and other backends with
//! [`DeviceSet::insert`]. The platform pump refreshes these between ticks;
//! the scheduler only reads them.
//!
//! # Example
//!
//! ```
//! use cue_engine::devices::DeviceSet;
//! use cue_events::prelude::*;
//!
//! let mut devices = DeviceSet::new();
//! let a = Keycode::from_char('a');
//! devices.keyboard.set(a, KeyState::Pressed);
//!
//! let keyboard = devices.get(DeviceKind::Keyboard).unwrap();
//! assert_eq!(keyboard.read_value(a.channel()), Ok(symbol::PRESSED));
//! assert_eq!(keyboard.read_value(channel::ANY), Ok(symbol::PRESSED));
//! ```

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use cue_events::device::{channel, Device, DeviceKind};
use cue_events::keys::{symbol, KeyState, Keycode, Modifiers};
use cue_events::EventError;

// ---------------------------------------------------------------------------
// Timer
// ---------------------------------------------------------------------------

/// Session clock in milliseconds. Every channel reads the current time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Timer {
    now_ms: u64,
}

impl Timer {
    /// Milliseconds since the session epoch, as of the last update.
    pub fn now_ms(&self) -> u64 {
        self.now_ms
    }

    /// Move the clock to `ms`. The platform pump calls this once per tick,
    /// and the session calls it again when a timeout is armed so the
    /// deadline counts from the host's real time.
    ///
    /// Attempts to move the clock backwards are ignored with a warning; a
    /// deadline already armed must never come closer.
    ///
    /// ```
    /// use cue_engine::devices::Timer;
    ///
    /// let mut timer = Timer::default();
    /// timer.set_ms(40);
    /// timer.set_ms(30);
    /// assert_eq!(timer.now_ms(), 40);
    /// ```
    pub fn set_ms(&mut self, ms: u64) {
        if ms < self.now_ms {
            tracing::warn!(now = self.now_ms, requested = ms, "timer cannot run backwards");
            return;
        }
        self.now_ms = ms;
    }

    /// Move the clock forward by `ms`, saturating at `u64::MAX`.
    pub fn advance_ms(&mut self, ms: u64) {
        self.now_ms = self.now_ms.saturating_add(ms);
    }
}

impl Device for Timer {
    fn kind(&self) -> DeviceKind {
        DeviceKind::Timer
    }

    fn read_value(&self, _channel: i64) -> Result<i64, EventError> {
        Ok(i64::try_from(self.now_ms).unwrap_or(i64::MAX))
    }
}

// ---------------------------------------------------------------------------
// Keyboard
// ---------------------------------------------------------------------------

/// Live up/down table of every key.
///
/// Read as a [`Device`], channel `k` is [`symbol::PRESSED`] while keycode
/// `k` is held and [`symbol::RELEASED`] otherwise. The
/// [`channel::ANY`] channel reads pressed while any key at all is held.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Keyboard {
    down: BTreeSet<Keycode>,
    modifiers: Modifiers,
}

impl Keyboard {
    /// Record a transition of `key`. [`KeyState::Unknown`] counts as up.
    pub fn set(&mut self, key: Keycode, state: KeyState) {
        match state {
            KeyState::Pressed => {
                self.down.insert(key);
            }
            KeyState::Released | KeyState::Unknown => {
                self.down.remove(&key);
            }
        }
    }

    /// Whether `key` is held. [`Keycode::ANY_KEY`] asks about every key.
    pub fn is_down(&self, key: Keycode) -> bool {
        if key == Keycode::ANY_KEY {
            !self.down.is_empty()
        } else {
            self.down.contains(&key)
        }
    }

    /// Up or down, in the form queued key records carry.
    ///
    /// ```
    /// use cue_engine::devices::Keyboard;
    /// use cue_events::keys::{KeyState, Keycode};
    ///
    /// let mut keyboard = Keyboard::default();
    /// let q = Keycode::from_char('q');
    /// assert_eq!(keyboard.state(q), KeyState::Released);
    /// keyboard.set(q, KeyState::Pressed);
    /// assert_eq!(keyboard.state(Keycode::ANY_KEY), KeyState::Pressed);
    /// ```
    pub fn state(&self, key: Keycode) -> KeyState {
        if self.is_down(key) {
            KeyState::Pressed
        } else {
            KeyState::Released
        }
    }

    /// Lowest keycode currently down.
    pub fn first_down(&self) -> Option<Keycode> {
        self.down.iter().next().copied()
    }

    /// Every held key, in keycode order.
    pub fn pressed(&self) -> impl Iterator<Item = Keycode> + '_ {
        self.down.iter().copied()
    }

    /// Modifier bits carried by the last key transition.
    pub fn modifiers(&self) -> Modifiers {
        self.modifiers
    }

    /// Replace the modifier bits. The platform does this with every key
    /// transition it queues.
    pub fn set_modifiers(&mut self, modifiers: Modifiers) {
        self.modifiers = modifiers;
    }

    /// Mark every key up and clear the modifiers, e.g. after the window
    /// loses focus.
    pub fn release_all(&mut self) {
        self.down.clear();
        self.modifiers = Modifiers::empty();
    }
}

impl Device for Keyboard {
    fn kind(&self) -> DeviceKind {
        DeviceKind::Keyboard
    }

    fn read_value(&self, channel: i64) -> Result<i64, EventError> {
        Ok(self.state(Keycode(channel)).as_scalar())
    }
}

// ---------------------------------------------------------------------------
// Window
// ---------------------------------------------------------------------------

/// Current dimensions of the host window.
///
/// Channel [`channel::WINDOW_WIDTH`] reads the width; every other channel
/// reads the height.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Window {
    pub width: i64,
    pub height: i64,
}

impl Device for Window {
    fn kind(&self) -> DeviceKind {
        DeviceKind::Window
    }

    fn read_value(&self, channel: i64) -> Result<i64, EventError> {
        Ok(if channel == channel::WINDOW_WIDTH {
            self.width
        } else {
            self.height
        })
    }
}

// ---------------------------------------------------------------------------
// DeviceSet
// ---------------------------------------------------------------------------

/// Every polled device available to one session.
#[derive(Default)]
pub struct DeviceSet {
    pub timer: Timer,
    pub keyboard: Keyboard,
    pub window: Window,
    extra: BTreeMap<DeviceKind, Box<dyn Device>>,
}

impl fmt::Debug for DeviceSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeviceSet")
            .field("timer", &self.timer)
            .field("keyboard", &self.keyboard)
            .field("window", &self.window)
            .field("extra", &self.extra.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl DeviceSet {
    /// A stopped timer at zero, no keys down, a zero-sized window and no
    /// extra backends.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a backend under its own [`Device::kind`], replacing any earlier
    /// backend of that kind.
    ///
    /// Returns `false`, leaving the set unchanged, for the built-in kinds
    /// (see [`DeviceKind::is_built_in`]). The event queue is one of them,
    /// so no host id can shadow it.
    ///
    /// ```
    /// use cue_engine::devices::{DeviceSet, Timer};
    ///
    /// let mut devices = DeviceSet::new();
    /// assert!(!devices.insert(Box::new(Timer::default())));
    /// ```
    pub fn insert(&mut self, device: Box<dyn Device>) -> bool {
        let kind = device.kind();
        if kind.is_built_in() {
            tracing::warn!(%kind, "built-in device cannot be replaced");
            return false;
        }
        self.extra.insert(kind, device);
        true
    }

    /// Take a host backend out of the set. Built-in devices are never
    /// removed.
    pub fn remove(&mut self, kind: DeviceKind) -> Option<Box<dyn Device>> {
        self.extra.remove(&kind)
    }

    /// Look a device up by kind. The queue is not held here; the scheduler
    /// reads it from the session directly, so `DeviceKind::Queue` yields
    /// `None`.
    pub fn get(&self, kind: DeviceKind) -> Option<&dyn Device> {
        match kind {
            DeviceKind::Timer => Some(&self.timer),
            DeviceKind::Keyboard => Some(&self.keyboard),
            DeviceKind::Window => Some(&self.window),
            DeviceKind::Queue => None,
            other => self.extra.get(&other).map(|d| d.as_ref()),
        }
    }

    /// Whether [`get`](Self::get) would find a device of this kind.
    pub fn contains(&self, kind: DeviceKind) -> bool {
        self.get(kind).is_some()
    }

    /// Shorthand for `self.timer.now_ms()`.
    pub fn now_ms(&self) -> u64 {
        self.timer.now_ms()
    }
}
