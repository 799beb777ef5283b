//! The platform pump: the once-per-tick hook that feeds the engine.
//!
//! A [`Platform`] is called at the top of every scheduler tick with a
//! [`PumpFrame`]. It appends newly observed occurrences to the event queue and
//! refreshes polled devices (clock, keyboard table, window size). Two
//! implementations ship with the engine:
//!
//! - [`ScriptedPlatform`]: simulated time advancing a fixed number of
//!   milliseconds per tick, with inputs scheduled on chosen ticks. Used by
//!   tests and demos; fully deterministic.
//! - [`HeadlessPlatform`]: the wall clock and no input. Waits that only
//!   involve the timer work as they would with a window.
//!
//! # Example
//!
//! ```
//! use cue_engine::prelude::*;
//!
//! let platform = ScriptedPlatform::new(40).key_down_at(3, Keycode::from_char('a'));
//! let mut session = Session::new(platform, EngineConfig::simulated());
//!
//! let key = session.wait_for_key_press(Keycode::from_char('a')).unwrap();
//! assert_eq!(key.value, ScriptValue::from("a"));
//! assert_eq!(key.created_ms, 120);
//! ```

use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use cue_events::keys::{KeyState, Keycode, Modifiers};
use cue_events::queue::EventQueue;
use cue_events::record::{EventPayload, EventRecord, KeyboardEvent, WindowResizeEvent};

use crate::devices::DeviceSet;

// ---------------------------------------------------------------------------
// PumpFrame
// ---------------------------------------------------------------------------

/// What a platform may touch during one pump.
pub struct PumpFrame<'a> {
    pub devices: &'a mut DeviceSet,
    pub queue: &'a mut EventQueue,
}

impl PumpFrame<'_> {
    pub fn now_ms(&self) -> u64 {
        self.devices.timer.now_ms()
    }

    pub fn set_time(&mut self, ms: u64) {
        self.devices.timer.set_ms(ms);
    }

    /// Queue a record stamped with the current clock.
    pub fn push(&mut self, payload: EventPayload) {
        let record = EventRecord::with_payload(payload, self.now_ms());
        self.queue.push(record);
    }

    /// Update the live keyboard table only.
    pub fn set_key(&mut self, key: Keycode, state: KeyState) {
        self.devices.keyboard.set(key, state);
    }

    /// Update the live keyboard table and queue the matching key record.
    pub fn key_event(&mut self, key: Keycode, state: KeyState, modifiers: Modifiers) {
        self.devices.keyboard.set(key, state);
        self.devices.keyboard.set_modifiers(modifiers);
        self.push(EventPayload::Keyboard(KeyboardEvent {
            scancode: 0,
            key,
            state,
            modifiers,
        }));
    }

    /// Update the window size and queue a resize record.
    pub fn resize(&mut self, width: i64, height: i64) {
        self.devices.window.width = width;
        self.devices.window.height = height;
        self.push(EventPayload::WindowResize(WindowResizeEvent { width, height }));
    }
}

// ---------------------------------------------------------------------------
// Platform
// ---------------------------------------------------------------------------

/// Whether the host wants the run to keep going.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PumpStatus {
    Continue,
    /// The host is shutting down (window closed, input exhausted).
    Quit,
}

/// Host integration invoked by the scheduler.
pub trait Platform {
    /// Observe input once. Must not block.
    fn pump(&mut self, frame: &mut PumpFrame<'_>) -> PumpStatus;

    /// The host clock right now, read outside a pump.
    ///
    /// A session reads this when it arms a timeout, so the deadline counts
    /// from the moment of the call rather than from the last pump. Platforms
    /// whose clock only moves when pumped return `None`, which keeps the
    /// session clock as it is.
    fn clock_ms(&self) -> Option<u64> {
        None
    }

    /// Yield between ticks that matched nothing (redraw, sleep).
    fn idle(&mut self, hint: Duration) {
        std::thread::sleep(hint);
    }
}

impl<P: Platform + ?Sized> Platform for Box<P> {
    fn pump(&mut self, frame: &mut PumpFrame<'_>) -> PumpStatus {
        (**self).pump(frame)
    }

    fn clock_ms(&self) -> Option<u64> {
        (**self).clock_ms()
    }

    fn idle(&mut self, hint: Duration) {
        (**self).idle(hint)
    }
}

// ---------------------------------------------------------------------------
// ScriptedPlatform
// ---------------------------------------------------------------------------

/// An input scheduled on a [`ScriptedPlatform`] tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScriptedInput {
    /// Key transition: live table plus a queued key record.
    Key {
        key: Keycode,
        state: KeyState,
        modifiers: Modifiers,
    },
    /// Live-table change with no queued record (a key held before the wait).
    KeyLive { key: Keycode, state: KeyState },
    Resize { width: i64, height: i64 },
    /// Any other record, queued as-is.
    Record(EventPayload),
    Quit,
}

/// Deterministic platform with simulated time.
///
/// Ticks are numbered from 1. On tick `n` the clock reads
/// `start_ms + n * ms_per_tick`, then the inputs scheduled for `n` are
/// applied in the order they were added.
#[derive(Debug, Clone)]
pub struct ScriptedPlatform {
    ms_per_tick: u64,
    start_ms: u64,
    ticks: u64,
    schedule: BTreeMap<u64, Vec<ScriptedInput>>,
}

impl ScriptedPlatform {
    /// # Panics
    ///
    /// Panics if `ms_per_tick` is zero.
    pub fn new(ms_per_tick: u64) -> Self {
        assert!(ms_per_tick > 0, "ms_per_tick must be positive, got {ms_per_tick}");
        Self {
            ms_per_tick,
            start_ms: 0,
            ticks: 0,
            schedule: BTreeMap::new(),
        }
    }

    pub fn starting_at(mut self, ms: u64) -> Self {
        self.start_ms = ms;
        self
    }

    pub fn at(mut self, tick: u64, input: ScriptedInput) -> Self {
        self.schedule.entry(tick).or_default().push(input);
        self
    }

    pub fn key_down_at(self, tick: u64, key: Keycode) -> Self {
        self.at(
            tick,
            ScriptedInput::Key {
                key,
                state: KeyState::Pressed,
                modifiers: Modifiers::empty(),
            },
        )
    }

    pub fn key_up_at(self, tick: u64, key: Keycode) -> Self {
        self.at(
            tick,
            ScriptedInput::Key {
                key,
                state: KeyState::Released,
                modifiers: Modifiers::empty(),
            },
        )
    }

    pub fn record_at(self, tick: u64, payload: EventPayload) -> Self {
        self.at(tick, ScriptedInput::Record(payload))
    }

    pub fn quit_at(self, tick: u64) -> Self {
        self.at(tick, ScriptedInput::Quit)
    }

    /// Schedule more input on an existing platform.
    pub fn schedule(&mut self, tick: u64, input: ScriptedInput) {
        self.schedule.entry(tick).or_default().push(input);
    }

    /// Ticks pumped so far.
    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    pub fn ms_per_tick(&self) -> u64 {
        self.ms_per_tick
    }

    /// Clock value the next pump will set.
    pub fn next_ms(&self) -> u64 {
        self.start_ms + (self.ticks + 1) * self.ms_per_tick
    }
}

impl Platform for ScriptedPlatform {
    fn pump(&mut self, frame: &mut PumpFrame<'_>) -> PumpStatus {
        frame.set_time(self.next_ms());
        self.ticks += 1;

        let mut status = PumpStatus::Continue;
        for input in self.schedule.remove(&self.ticks).unwrap_or_default() {
            match input {
                ScriptedInput::Key {
                    key,
                    state,
                    modifiers,
                } => frame.key_event(key, state, modifiers),
                ScriptedInput::KeyLive { key, state } => frame.set_key(key, state),
                ScriptedInput::Resize { width, height } => frame.resize(width, height),
                ScriptedInput::Record(payload) => frame.push(payload),
                ScriptedInput::Quit => status = PumpStatus::Quit,
            }
        }
        status
    }

    fn idle(&mut self, _hint: Duration) {}
}

// ---------------------------------------------------------------------------
// HeadlessPlatform
// ---------------------------------------------------------------------------

/// Wall-clock platform with no input devices.
#[derive(Debug, Clone)]
pub struct HeadlessPlatform {
    epoch: Instant,
}

impl Default for HeadlessPlatform {
    fn default() -> Self {
        Self::new()
    }
}

impl HeadlessPlatform {
    /// Start the clock at zero now.
    pub fn new() -> Self {
        Self {
            epoch: Instant::now(),
        }
    }

    fn elapsed_ms(&self) -> u64 {
        u64::try_from(self.epoch.elapsed().as_millis()).unwrap_or(u64::MAX)
    }
}

impl Platform for HeadlessPlatform {
    fn pump(&mut self, frame: &mut PumpFrame<'_>) -> PumpStatus {
        frame.set_time(self.elapsed_ms());
        PumpStatus::Continue
    }

    fn clock_ms(&self) -> Option<u64> {
        Some(self.elapsed_ms())
    }
}
