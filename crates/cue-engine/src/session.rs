//! Engine state for one script run.
//!
//! A [`Session`] owns the polled devices, the event queue, the
//! [`EventLoop`] and the platform that feeds them. Sessions are ordinary
//! values: several can coexist in one process, each with its own clock and
//! queue.
//!
//! The script-facing wait primitives live in [`crate::wait`] and the
//! string-based registration surface in [`crate::script`]; both are methods
//! on `Session`.

use std::fmt;

use cue_events::predicate::{Predicate, PredicateId};
use cue_events::queue::EventQueue;
use cue_events::record::EventRecord;
use cue_journal::DispatchJournal;

use crate::callback::{CallbackHost, ListenerHandle, NoCallbacks};
use crate::config::EngineConfig;
use crate::devices::DeviceSet;
use crate::event_loop::{EventLoop, TickContext};
use crate::platform::Platform;
use crate::EngineError;

/// Devices, queue, scheduler and platform for one script run.
pub struct Session<P: Platform> {
    devices: DeviceSet,
    queue: EventQueue,
    event_loop: EventLoop,
    platform: P,
    host: Box<dyn CallbackHost>,
}

impl<P: Platform> fmt::Debug for Session<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("devices", &self.devices)
            .field("queue", &self.queue.len())
            .field("event_loop", &self.event_loop)
            .finish_non_exhaustive()
    }
}

impl<P: Platform> Session<P> {
    /// Create a session with fresh devices, an empty queue and no callback
    /// host.
    ///
    /// # Panics
    ///
    /// Panics if `config` enables the journal with zero capacity. Use
    /// [`Session::try_new`] for settings loaded at runtime.
    pub fn new(platform: P, config: EngineConfig) -> Self {
        tracing::info!(?config, "session started");
        Self {
            devices: DeviceSet::new(),
            queue: EventQueue::new(),
            event_loop: EventLoop::new(config),
            platform,
            host: Box::new(NoCallbacks),
        }
    }

    /// Like [`new`](Self::new), with the configuration checked first.
    ///
    /// # Errors
    ///
    /// [`EngineError::Config`] if `config` fails validation.
    pub fn try_new(platform: P, config: EngineConfig) -> Result<Self, EngineError> {
        config.validate()?;
        Ok(Self::new(platform, config))
    }

    /// Builder form of [`set_callback_host`](Self::set_callback_host).
    pub fn with_callbacks(mut self, host: impl CallbackHost + 'static) -> Self {
        self.set_callback_host(host);
        self
    }

    /// Route callback predicates and listener samples to `host`. Until this
    /// is called, callbacks are dropped with a debug log.
    pub fn set_callback_host(&mut self, host: impl CallbackHost + 'static) {
        self.host = Box::new(host);
    }

    // -- scheduling ---------------------------------------------------------

    /// Add a predicate to the registry.
    ///
    /// # Errors
    ///
    /// See [`EventLoop::register`].
    pub fn register(&mut self, predicate: Predicate) -> Result<PredicateId, EngineError> {
        self.event_loop.register(predicate, &self.devices)
    }

    /// Run until a terminating predicate fires. Never returns if nothing
    /// can match.
    ///
    /// # Errors
    ///
    /// See [`EventLoop::tick`].
    pub fn run(&mut self) -> Result<EventRecord, EngineError> {
        let (event_loop, mut ctx) = self.split();
        event_loop.run(&mut ctx)
    }

    /// Run at most `max_ticks` ticks.
    ///
    /// # Errors
    ///
    /// See [`EventLoop::tick`].
    pub fn run_for(&mut self, max_ticks: u64) -> Result<Option<EventRecord>, EngineError> {
        let (event_loop, mut ctx) = self.split();
        event_loop.run_for(&mut ctx, max_ticks)
    }

    /// One tick, for callers that drive their own loop and clear between
    /// iterations.
    ///
    /// # Errors
    ///
    /// See [`EventLoop::tick`].
    pub fn tick(&mut self) -> Result<Option<EventRecord>, EngineError> {
        let (event_loop, mut ctx) = self.split();
        event_loop.tick(&mut ctx)
    }

    /// Drop every registered predicate.
    pub fn clear(&mut self) {
        self.event_loop.clear();
    }

    /// Drop buffered records.
    pub fn clear_queue(&mut self) {
        self.queue.clear();
    }

    /// Registry and queue together; what every wait does on the way out.
    pub fn clear_all(&mut self) {
        self.clear();
        self.clear_queue();
    }

    fn split(&mut self) -> (&mut EventLoop, TickContext<'_>) {
        (
            &mut self.event_loop,
            TickContext {
                devices: &mut self.devices,
                queue: &mut self.queue,
                platform: &mut self.platform,
                host: self.host.as_mut(),
            },
        )
    }

    // -- accessors ----------------------------------------------------------

    /// A cloneable, `Send` handle for a backend thread to deliver samples
    /// to named callbacks. Samples are handed over at the start of the next
    /// tick.
    ///
    /// # Example
    ///
    /// ```
    /// use cue_engine::prelude::*;
    ///
    /// let session = Session::new(ScriptedPlatform::new(10), EngineConfig::simulated());
    /// let handle = session.listener();
    /// std::thread::spawn(move || handle.deliver("on_gaze", ScriptValue::Integer(1)))
    ///     .join()
    ///     .unwrap()
    ///     .unwrap();
    /// ```
    pub fn listener(&self) -> ListenerHandle {
        self.event_loop.listener()
    }

    /// Session clock as of the last pump or [`sync_clock`](Self::sync_clock).
    pub fn now_ms(&self) -> u64 {
        self.devices.now_ms()
    }

    /// Bring the session clock up to the platform's clock and return it.
    ///
    /// Hosts may spend any amount of time between waits; a deadline built
    /// from the last pumped time would already be partly spent. Platforms
    /// with no clock of their own (see [`Platform::clock_ms`]) leave the
    /// session clock unchanged.
    ///
    /// ```
    /// use cue_engine::prelude::*;
    ///
    /// let mut session = Session::new(HeadlessPlatform::new(), EngineConfig::default());
    /// std::thread::sleep(std::time::Duration::from_millis(5));
    /// assert!(session.sync_clock() >= 5);
    /// ```
    pub fn sync_clock(&mut self) -> u64 {
        if let Some(ms) = self.platform.clock_ms() {
            self.devices.timer.set_ms(ms);
        }
        self.devices.now_ms()
    }

    /// Read-only access to the polled devices.
    pub fn devices(&self) -> &DeviceSet {
        &self.devices
    }

    /// Mutable access to the polled devices, for adding backends with
    /// [`DeviceSet::insert`] before a wait.
    pub fn devices_mut(&mut self) -> &mut DeviceSet {
        &mut self.devices
    }

    /// Records buffered since the last match or clear.
    pub fn queue(&self) -> &EventQueue {
        &self.queue
    }

    /// Mutable access to the queue, e.g. to re-push a record one handler
    /// did not want so the next wait sees it.
    pub fn queue_mut(&mut self) -> &mut EventQueue {
        &mut self.queue
    }

    /// The scheduler: registry, state and diagnostics.
    pub fn event_loop(&self) -> &EventLoop {
        &self.event_loop
    }

    /// Shorthand for `self.event_loop().journal()`.
    pub fn journal(&self) -> Option<&DispatchJournal> {
        self.event_loop.journal()
    }

    /// The settings the session was built with.
    pub fn config(&self) -> &EngineConfig {
        self.event_loop.config()
    }

    /// The platform feeding this session.
    pub fn platform(&self) -> &P {
        &self.platform
    }

    /// Mutable access to the platform, e.g. to schedule more scripted input
    /// between waits.
    pub fn platform_mut(&mut self) -> &mut P {
        &mut self.platform
    }

    /// End the session and hand back the platform, e.g. to collect a
    /// recording.
    pub fn into_platform(self) -> P {
        self.platform
    }
}
