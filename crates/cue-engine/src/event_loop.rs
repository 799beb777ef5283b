//! The scheduler: registry of active predicates and the per-tick algorithm.
//!
//! Each [`EventLoop::tick`]:
//!
//! 1. Hands pending listener samples to the callback host.
//! 2. Pumps the platform once (new records, fresh clock and keyboard table).
//! 3. Tests every device-polled predicate, in registration order, against its
//!    device. A satisfied terminating predicate ends the tick with a
//!    synthesized dummy record; a satisfied callback predicate invokes its
//!    callback, is removed, and evaluation moves on.
//! 4. Pops queued records oldest-first and tests each against the queue
//!    predicates of the same kind, with the same terminating/callback split.
//!    Records that match nothing are discarded. After a terminating match the
//!    remaining records stay buffered.
//!
//! Steps 3 and 4 swap when [`TickOrder::QueueFirst`] is configured.
//! [`EventLoop::run`] repeats ticks, yielding to the platform between them,
//! until one returns a record. With no predicates registered it never
//! returns; use [`EventLoop::run_for`] for a bounded run.
//!
//! # Example
//!
//! ```
//! use cue_engine::prelude::*;
//!
//! let mut devices = DeviceSet::new();
//! let mut queue = EventQueue::new();
//! let mut platform = ScriptedPlatform::new(10);
//! let mut host = NoCallbacks;
//!
//! let mut event_loop = EventLoop::new(EngineConfig::simulated());
//! let timeout = Predicate::polled(
//!     DeviceKind::Timer,
//!     channel::ELAPSED_MS,
//!     Condition::scalar(30, ScalarTest::GreaterOrEqual),
//! );
//! event_loop.register(timeout, &devices).unwrap();
//!
//! let mut ctx = TickContext {
//!     devices: &mut devices,
//!     queue: &mut queue,
//!     platform: &mut platform,
//!     host: &mut host,
//! };
//! let record = event_loop.run(&mut ctx).unwrap();
//! assert_eq!(record.created_ms(), 30);
//! assert_eq!(event_loop.tick_count(), 3);
//! ```

use std::time::{Duration, Instant};

use cue_events::device::{Device, DeviceKind};
use cue_events::keys::{symbol, KeyState, Keycode};
use cue_events::predicate::{Predicate, PredicateId, Reading, Shape, Source};
use cue_events::queue::EventQueue;
use cue_events::record::{DummyEvent, EventKind, EventRecord};
use cue_events::EventError;
use cue_journal::{DispatchAction, DispatchEntry, DispatchJournal};

use crate::callback::{CallbackCall, CallbackHost, Inbox, ListenerHandle, Trigger};
use crate::config::{EngineConfig, TickOrder};
use crate::devices::DeviceSet;
use crate::platform::{Platform, PumpFrame, PumpStatus};
use crate::EngineError;

// ---------------------------------------------------------------------------
// TickContext
// ---------------------------------------------------------------------------

/// Everything a tick reads or writes besides the registry itself.
pub struct TickContext<'a> {
    pub devices: &'a mut DeviceSet,
    pub queue: &'a mut EventQueue,
    pub platform: &'a mut dyn Platform,
    pub host: &'a mut dyn CallbackHost,
}

// ---------------------------------------------------------------------------
// Diagnostics
// ---------------------------------------------------------------------------

/// Counters for the last tick.
#[derive(Debug, Clone, Default)]
pub struct TickDiagnostics {
    pub tick: u64,
    pub records_drained: usize,
    pub callbacks_invoked: usize,
    pub listener_deliveries: usize,
    pub total_time: Duration,
}

/// Counters for the last run (or bounded run).
#[derive(Debug, Clone, Default)]
pub struct RunDiagnostics {
    pub ticks: u64,
    pub records_drained: u64,
    pub callbacks_invoked: u64,
    pub listener_deliveries: u64,
    pub wall_time: Duration,
    /// Predicate that ended the run, if one did.
    pub matched: Option<PredicateId>,
}

// ---------------------------------------------------------------------------
// LoopState
// ---------------------------------------------------------------------------

/// Lifecycle of the registry between waits.
///
/// `Idle -> Armed` on the first registration, `Armed -> Running` for the
/// length of a tick, `Running -> Matched` when a terminating predicate fires,
/// and back to `Idle` on [`EventLoop::clear`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    /// No predicates registered.
    Idle,
    /// Predicates registered, not running.
    Armed,
    /// Inside a tick or run.
    Running,
    /// A terminating predicate fired; clear before the next wait.
    Matched,
}

// ---------------------------------------------------------------------------
// EventLoop
// ---------------------------------------------------------------------------

#[derive(Debug)]
struct Registered {
    id: PredicateId,
    predicate: Predicate,
}

enum Dispatch {
    /// Keep evaluating; the predicate at the index was removed.
    Removed,
    Finished(PredicateId, EventRecord),
}

/// Registry of active predicates plus the tick algorithm.
///
/// The loop owns no devices, queue or platform; each tick borrows them
/// through a [`TickContext`]. [`Session`](crate::session::Session) wires
/// the two together for the usual case.
#[derive(Debug)]
pub struct EventLoop {
    registry: Vec<Registered>,
    next_id: u64,
    state: LoopState,
    tick_counter: u64,
    config: EngineConfig,
    journal: Option<DispatchJournal>,
    inbox: Inbox,
    last_tick: TickDiagnostics,
    last_run: RunDiagnostics,
}

impl EventLoop {
    /// # Panics
    ///
    /// Panics if the journal is enabled with zero capacity. Use
    /// [`EngineConfig::validate`] to check untrusted settings first.
    pub fn new(config: EngineConfig) -> Self {
        let journal = config
            .journal_enabled
            .then(|| DispatchJournal::with_capacity(config.journal_capacity));
        Self {
            registry: Vec::new(),
            next_id: 0,
            state: LoopState::Idle,
            tick_counter: 0,
            config,
            journal,
            inbox: Inbox::new(),
            last_tick: TickDiagnostics::default(),
            last_run: RunDiagnostics::default(),
        }
    }

    // -- registry -----------------------------------------------------------

    /// Add a predicate. Predicates are evaluated in registration order.
    ///
    /// # Errors
    ///
    /// - [`EngineError::DeviceUnavailable`] if a polled predicate names a
    ///   device `devices` does not have. [`DeviceKind::Queue`] is always
    ///   available.
    /// - [`EventError::MissingPoint`] for a region predicate on a source that
    ///   never produces planar readings.
    /// - [`EventError::NoScalarDerivation`] for a queue predicate on dummy
    ///   records, which are never queued.
    pub fn register(
        &mut self,
        predicate: Predicate,
        devices: &DeviceSet,
    ) -> Result<PredicateId, EngineError> {
        let planar = predicate.condition.shape() == Shape::Region;
        match predicate.source {
            Source::Polled(kind) => {
                if kind != DeviceKind::Queue && !devices.contains(kind) {
                    return Err(EngineError::DeviceUnavailable { kind });
                }
                if planar && kind.is_scalar_only() {
                    return Err(EventError::MissingPoint {
                        channel: predicate.channel,
                    }
                    .into());
                }
            }
            Source::Queue(EventKind::Dummy) => {
                return Err(EventError::NoScalarDerivation {
                    kind: EventKind::Dummy,
                }
                .into());
            }
            Source::Queue(kind) => {
                if planar && !kind.is_planar() {
                    return Err(EventError::MissingPoint {
                        channel: predicate.channel,
                    }
                    .into());
                }
            }
        }

        let id = PredicateId(self.next_id);
        self.next_id += 1;
        tracing::debug!(
            predicate = %id,
            source = ?predicate.source,
            channel = predicate.channel,
            callback = ?predicate.callback,
            "predicate registered"
        );
        self.registry.push(Registered { id, predicate });
        if self.state == LoopState::Idle {
            self.state = LoopState::Armed;
        }
        Ok(id)
    }

    /// Remove one predicate.
    pub fn unregister(&mut self, id: PredicateId) -> Option<Predicate> {
        let index = self.registry.iter().position(|r| r.id == id)?;
        let removed = self.registry.remove(index);
        if self.registry.is_empty() && self.state == LoopState::Armed {
            self.state = LoopState::Idle;
        }
        Some(removed.predicate)
    }

    /// Drop every predicate and any listener samples not yet delivered.
    pub fn clear(&mut self) {
        let dropped = self.inbox.take().len();
        tracing::debug!(
            predicates = self.registry.len(),
            dropped_samples = dropped,
            "event loop cleared"
        );
        self.registry.clear();
        self.state = LoopState::Idle;
    }

    // -- running ------------------------------------------------------------

    /// Run one tick. Returns the record that ended the wait, if any.
    ///
    /// # Errors
    ///
    /// [`EngineError::Quit`] and [`EngineError::Aborted`] end the tick
    /// early; predicate contract violations and callback failures are
    /// propagated unchanged.
    pub fn tick(&mut self, ctx: &mut TickContext<'_>) -> Result<Option<EventRecord>, EngineError> {
        self.state = LoopState::Running;
        let outcome = self.tick_inner(ctx);
        self.state = match &outcome {
            Ok(Some(_)) => LoopState::Matched,
            _ => self.resting_state(),
        };
        outcome
    }

    /// Tick until a terminating predicate fires.
    ///
    /// Blocks forever if nothing ever matches, including when no predicates
    /// are registered.
    ///
    /// # Errors
    ///
    /// See [`tick`](Self::tick).
    pub fn run(&mut self, ctx: &mut TickContext<'_>) -> Result<EventRecord, EngineError> {
        loop {
            if let Some(record) = self.run_for(ctx, u64::MAX)? {
                return Ok(record);
            }
        }
    }

    /// Tick at most `max_ticks` times. Returns `None` if nothing ended the
    /// wait in that budget.
    ///
    /// # Errors
    ///
    /// See [`tick`](Self::tick).
    pub fn run_for(
        &mut self,
        ctx: &mut TickContext<'_>,
        max_ticks: u64,
    ) -> Result<Option<EventRecord>, EngineError> {
        let start = Instant::now();
        self.last_run = RunDiagnostics::default();

        let mut result = Ok(None);
        for _ in 0..max_ticks {
            match self.tick(ctx) {
                Ok(None) => {
                    if self.config.sleep_between_ticks {
                        ctx.platform.idle(self.config.idle_sleep());
                    }
                }
                other => {
                    result = other;
                    break;
                }
            }
        }

        self.last_run.wall_time = start.elapsed();
        match &result {
            Ok(Some(record)) => tracing::debug!(
                kind = %record.kind(),
                ticks = self.last_run.ticks,
                "run matched"
            ),
            Ok(None) => tracing::debug!(ticks = self.last_run.ticks, "run budget exhausted"),
            Err(err) => tracing::debug!(%err, "run ended with error"),
        }
        result
    }

    fn resting_state(&self) -> LoopState {
        if self.registry.is_empty() {
            LoopState::Idle
        } else {
            LoopState::Armed
        }
    }

    fn tick_inner(
        &mut self,
        ctx: &mut TickContext<'_>,
    ) -> Result<Option<EventRecord>, EngineError> {
        let start = Instant::now();
        self.tick_counter += 1;
        self.last_run.ticks += 1;
        self.last_tick = TickDiagnostics {
            tick: self.tick_counter,
            ..Default::default()
        };

        self.deliver_samples(ctx.host)?;

        let status = ctx.platform.pump(&mut PumpFrame {
            devices: &mut *ctx.devices,
            queue: &mut *ctx.queue,
        });
        if status == PumpStatus::Quit {
            tracing::info!(tick = self.tick_counter, "platform quit during wait");
            return Err(EngineError::Quit);
        }

        let matched = match self.config.tick_order {
            TickOrder::PolledFirst => match self.poll_devices(ctx)? {
                Some(found) => Some(found),
                None => self.drain_queue(ctx)?,
            },
            TickOrder::QueueFirst => match self.drain_queue(ctx)? {
                Some(found) => Some(found),
                None => self.poll_devices(ctx)?,
            },
        };

        self.last_tick.total_time = start.elapsed();
        tracing::trace!(
            tick = self.tick_counter,
            records = self.last_tick.records_drained,
            callbacks = self.last_tick.callbacks_invoked,
            "tick"
        );

        Ok(matched.map(|(id, record)| {
            self.last_run.matched = Some(id);
            record
        }))
    }

    /// Step 3: device-polled predicates.
    fn poll_devices(
        &mut self,
        ctx: &mut TickContext<'_>,
    ) -> Result<Option<(PredicateId, EventRecord)>, EngineError> {
        let mut i = 0;
        while i < self.registry.len() {
            let predicate = &self.registry[i].predicate;
            let Source::Polled(kind) = predicate.source else {
                i += 1;
                continue;
            };
            let device: &dyn Device = match kind {
                DeviceKind::Queue => &*ctx.queue,
                _ => ctx
                    .devices
                    .get(kind)
                    .ok_or(EngineError::DeviceUnavailable { kind })?,
            };
            let reading = predicate.read(device)?;
            if !predicate.condition.evaluate(reading)? {
                i += 1;
                continue;
            }

            let (value, point) = match reading {
                Reading::Scalar(v) => (v, None),
                Reading::Point(p) => (symbol::UNKNOWN, Some(p)),
            };
            let record = EventRecord::dummy(
                DummyEvent {
                    value,
                    point,
                    channel: predicate.channel,
                    device: kind,
                },
                ctx.devices.now_ms(),
            );
            if let Dispatch::Finished(id, record) = self.dispatch(i, record, ctx.host)? {
                return Ok(Some((id, record)));
            }
        }
        Ok(None)
    }

    /// Step 4: queued records against queue predicates.
    fn drain_queue(
        &mut self,
        ctx: &mut TickContext<'_>,
    ) -> Result<Option<(PredicateId, EventRecord)>, EngineError> {
        while let Some(record) = ctx.queue.pop() {
            self.last_tick.records_drained += 1;
            self.last_run.records_drained += 1;

            if self.config.abort_combo && is_abort_combo(&record) {
                tracing::info!(tick = self.tick_counter, "abort key combination pressed");
                return Err(EngineError::Aborted);
            }

            let mut i = 0;
            while i < self.registry.len() {
                let predicate = &self.registry[i].predicate;
                if !predicate.accepts(&record) {
                    i += 1;
                    continue;
                }
                let reading = predicate.read_record(&record)?;
                if !predicate.condition.evaluate(reading)? {
                    i += 1;
                    continue;
                }
                ctx.queue.mark_matched(record.clone());
                if let Dispatch::Finished(id, matched) =
                    self.dispatch(i, record.clone(), ctx.host)?
                {
                    return Ok(Some((id, matched)));
                }
            }
        }
        Ok(None)
    }

    /// Act on the satisfied predicate at `index`.
    ///
    /// A callback predicate that leaves the registry empty also finishes the
    /// run, with the record that triggered it.
    fn dispatch(
        &mut self,
        index: usize,
        record: EventRecord,
        host: &mut dyn CallbackHost,
    ) -> Result<Dispatch, EngineError> {
        let id = self.registry[index].id;
        let source = self.registry[index].predicate.source;

        let Some(name) = self.registry[index].predicate.callback.clone() else {
            tracing::debug!(
                predicate = %id,
                kind = %record.kind(),
                "terminating predicate matched"
            );
            self.journal_record(id, source, DispatchAction::Terminated, Some(record.clone()));
            return Ok(Dispatch::Finished(id, record));
        };

        let removed = self.registry.remove(index);
        tracing::debug!(predicate = %id, callback = %name, "callback predicate matched");
        host.invoke(CallbackCall {
            name: &name,
            parameter: &removed.predicate.parameter,
            trigger: Trigger::Record(&record),
        })
        .map_err(|err| EngineError::Callback {
            name: name.clone(),
            source: err,
        })?;
        self.last_tick.callbacks_invoked += 1;
        self.last_run.callbacks_invoked += 1;
        self.journal_record(
            id,
            source,
            DispatchAction::CallbackInvoked { name },
            Some(record.clone()),
        );

        if self.registry.is_empty() {
            return Ok(Dispatch::Finished(id, record));
        }
        Ok(Dispatch::Removed)
    }

    /// Step 1: listener samples, delivered between registry walks.
    fn deliver_samples(&mut self, host: &mut dyn CallbackHost) -> Result<(), EngineError> {
        for sample in self.inbox.take() {
            let Some(entry) = self
                .registry
                .iter()
                .find(|r| r.predicate.callback.as_deref() == Some(sample.callback.as_str()))
            else {
                tracing::warn!(
                    callback = %sample.callback,
                    "listener sample for unregistered callback dropped"
                );
                continue;
            };
            let (id, source) = (entry.id, entry.predicate.source);
            host.invoke(CallbackCall {
                name: &sample.callback,
                parameter: &entry.predicate.parameter,
                trigger: Trigger::Sample(&sample.value),
            })
            .map_err(|err| EngineError::Callback {
                name: sample.callback.clone(),
                source: err,
            })?;
            self.last_tick.listener_deliveries += 1;
            self.last_run.listener_deliveries += 1;
            self.journal_record(
                id,
                source,
                DispatchAction::ListenerDelivered {
                    name: sample.callback,
                },
                None,
            );
        }
        Ok(())
    }

    fn journal_record(
        &mut self,
        predicate: PredicateId,
        source: Source,
        action: DispatchAction,
        record: Option<EventRecord>,
    ) {
        if let Some(journal) = &mut self.journal {
            journal.record(DispatchEntry {
                tick: self.tick_counter,
                predicate,
                source,
                action,
                record,
            });
        }
    }

    // -- accessors ----------------------------------------------------------

    /// Where the loop is in its arm/run/clear cycle.
    pub fn state(&self) -> LoopState {
        self.state
    }

    /// Ticks run over the loop's lifetime.
    pub fn tick_count(&self) -> u64 {
        self.tick_counter
    }

    /// The number of registered predicates.
    pub fn len(&self) -> usize {
        self.registry.len()
    }

    /// Whether nothing is registered. A run in this state never returns.
    pub fn is_empty(&self) -> bool {
        self.registry.is_empty()
    }

    /// Registered predicates in evaluation order.
    pub fn predicates(&self) -> impl Iterator<Item = (PredicateId, &Predicate)> {
        self.registry.iter().map(|r| (r.id, &r.predicate))
    }

    /// The settings this loop was built with.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Every dispatch so far, oldest first, up to the configured capacity.
    /// `None` when the journal is disabled.
    pub fn journal(&self) -> Option<&DispatchJournal> {
        self.journal.as_ref()
    }

    /// A handle external threads use to deliver samples.
    pub fn listener(&self) -> ListenerHandle {
        self.inbox.handle()
    }

    /// Counters and timing from the most recent tick.
    pub fn last_tick_diagnostics(&self) -> &TickDiagnostics {
        &self.last_tick
    }

    /// Counters from the most recent [`run`](Self::run) or
    /// [`run_for`](Self::run_for), including the predicate that ended it.
    ///
    /// A bare [`tick`](Self::tick) adds to these counters without resetting
    /// them.
    pub fn last_run_diagnostics(&self) -> &RunDiagnostics {
        &self.last_run
    }
}

fn is_abort_combo(record: &EventRecord) -> bool {
    record.as_keyboard().is_some_and(|k| {
        k.key == Keycode::BACKSLASH
            && k.state == KeyState::Pressed
            && k.modifiers.has_shift_ctrl_alt()
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::callback::BoxError;
    use crate::platform::{ScriptedInput, ScriptedPlatform};
    use cue_events::prelude::*;

    // -- helpers ------------------------------------------------------------

    #[derive(Default)]
    struct Recorder {
        calls: Vec<(String, ScriptValue, ScriptValue)>,
        fail: bool,
    }

    impl CallbackHost for Recorder {
        fn invoke(&mut self, call: CallbackCall<'_>) -> Result<(), BoxError> {
            if self.fail {
                return Err("script raised".into());
            }
            self.calls.push((
                call.name.to_owned(),
                call.parameter.clone(),
                call.trigger.to_script_value(),
            ));
            Ok(())
        }
    }

    struct Rig {
        devices: DeviceSet,
        queue: EventQueue,
        platform: ScriptedPlatform,
        host: Recorder,
        event_loop: EventLoop,
    }

    impl Rig {
        fn new(platform: ScriptedPlatform) -> Self {
            Self::with_config(platform, EngineConfig::simulated())
        }

        fn with_config(platform: ScriptedPlatform, config: EngineConfig) -> Self {
            Self {
                devices: DeviceSet::new(),
                queue: EventQueue::new(),
                platform,
                host: Recorder::default(),
                event_loop: EventLoop::new(config),
            }
        }

        fn register(&mut self, predicate: Predicate) -> PredicateId {
            self.event_loop.register(predicate, &self.devices).unwrap()
        }

        fn run_for(&mut self, max_ticks: u64) -> Result<Option<EventRecord>, EngineError> {
            let mut ctx = TickContext {
                devices: &mut self.devices,
                queue: &mut self.queue,
                platform: &mut self.platform,
                host: &mut self.host,
            };
            self.event_loop.run_for(&mut ctx, max_ticks)
        }
    }

    fn key_pressed(key: Keycode) -> Predicate {
        Predicate::queued(
            EventKind::Keyboard,
            key.channel(),
            Condition::scalar(symbol::PRESSED, ScalarTest::Equal),
        )
    }

    fn key_held(key: Keycode) -> Predicate {
        Predicate::polled(
            DeviceKind::Keyboard,
            key.channel(),
            Condition::scalar(symbol::PRESSED, ScalarTest::Equal),
        )
    }

    fn timer_at(ms: i64) -> Predicate {
        Predicate::polled(
            DeviceKind::Timer,
            channel::ELAPSED_MS,
            Condition::scalar(ms, ScalarTest::GreaterOrEqual),
        )
    }

    // -- 1. Registration and state ------------------------------------------

    #[test]
    fn new_loop_is_idle() {
        let rig = Rig::new(ScriptedPlatform::new(10));
        assert_eq!(rig.event_loop.state(), LoopState::Idle);
        assert!(rig.event_loop.is_empty());
        assert_eq!(rig.event_loop.tick_count(), 0);
    }

    #[test]
    fn register_arms_and_clear_idles() {
        let mut rig = Rig::new(ScriptedPlatform::new(10));
        let a = rig.register(timer_at(10));
        let b = rig.register(key_held(Keycode::SPACE));
        assert_ne!(a, b);
        assert_eq!(rig.event_loop.state(), LoopState::Armed);
        let ids: Vec<_> = rig.event_loop.predicates().map(|(id, _)| id).collect();
        assert_eq!(ids, vec![a, b]);

        rig.event_loop.clear();
        assert_eq!(rig.event_loop.state(), LoopState::Idle);
        assert!(rig.event_loop.is_empty());
    }

    #[test]
    fn unregister_removes_one() {
        let mut rig = Rig::new(ScriptedPlatform::new(10));
        let a = rig.register(timer_at(10));
        assert!(rig.event_loop.unregister(a).is_some());
        assert!(rig.event_loop.unregister(a).is_none());
        assert_eq!(rig.event_loop.state(), LoopState::Idle);
    }

    #[test]
    fn missing_device_is_rejected_at_registration() {
        let mut rig = Rig::new(ScriptedPlatform::new(10));
        let stick = Predicate::polled(
            DeviceKind::Joystick(0),
            0,
            Condition::scalar(0, ScalarTest::AlwaysTrue),
        );
        let err = rig.event_loop.register(stick, &rig.devices).unwrap_err();
        assert!(matches!(
            err,
            EngineError::DeviceUnavailable {
                kind: DeviceKind::Joystick(0)
            }
        ));
    }

    #[test]
    fn region_on_scalar_source_is_rejected() {
        let rig = Rig::new(ScriptedPlatform::new(10));
        let mut event_loop = EventLoop::new(EngineConfig::simulated());
        let region = Condition::region(Point::new(0, 0), Point::new(5, 5), RegionTest::Inside);
        let on_timer = Predicate::polled(DeviceKind::Timer, 1, region.clone());
        let on_resize = Predicate::queued(EventKind::WindowResize, 0, region.clone());
        let on_click = Predicate::queued(EventKind::MouseButton, 0, region);
        assert!(matches!(
            event_loop.register(on_timer, &rig.devices),
            Err(EngineError::Event(EventError::MissingPoint { .. }))
        ));
        assert!(event_loop.register(on_resize, &rig.devices).is_err());
        assert!(event_loop.register(on_click, &rig.devices).is_ok());
    }

    #[test]
    fn dummy_queue_predicate_is_rejected() {
        let rig = Rig::new(ScriptedPlatform::new(10));
        let mut event_loop = EventLoop::new(EngineConfig::simulated());
        let always = Condition::scalar(0, ScalarTest::AlwaysTrue);
        let p = Predicate::queued(EventKind::Dummy, 0, always);
        assert!(matches!(
            event_loop.register(p, &rig.devices),
            Err(EngineError::Event(EventError::NoScalarDerivation { .. }))
        ));
    }

    // -- 2. Polled predicates -----------------------------------------------

    #[test]
    fn polled_match_returns_dummy_with_reading() {
        let mut rig = Rig::new(ScriptedPlatform::new(25));
        rig.register(timer_at(100));
        let record = rig.run_for(10).unwrap().unwrap();
        let dummy = record.as_dummy().unwrap();
        assert_eq!(dummy.value, 100);
        assert_eq!(dummy.device, DeviceKind::Timer);
        assert_eq!(dummy.channel, channel::ELAPSED_MS);
        assert_eq!(record.created_ms(), 100);
        assert_eq!(rig.event_loop.state(), LoopState::Matched);
        assert_eq!(rig.event_loop.last_run_diagnostics().ticks, 4);
    }

    #[test]
    fn first_satisfied_polled_predicate_wins() {
        let mut rig = Rig::new(ScriptedPlatform::new(10));
        let first = rig.register(timer_at(10));
        rig.register(timer_at(0));
        rig.run_for(1).unwrap().unwrap();
        assert_eq!(rig.event_loop.last_run_diagnostics().matched, Some(first));
    }

    // -- 3. Queue predicates ------------------------------------------------

    #[test]
    fn queued_match_returns_the_record_itself() {
        let a = Keycode::from_char('a');
        let mut rig = Rig::new(ScriptedPlatform::new(10).key_down_at(2, a));
        rig.register(key_pressed(a));
        let record = rig.run_for(5).unwrap().unwrap();
        assert_eq!(record.keyboard_or_default().key, a);
        assert_eq!(record.created_ms(), 20);
    }

    #[test]
    fn unmatched_records_are_discarded_and_remainder_stays() {
        let a = Keycode::from_char('a');
        let b = Keycode::from_char('b');
        let c = Keycode::from_char('c');
        let platform = ScriptedPlatform::new(10)
            .key_down_at(1, b)
            .key_down_at(1, a)
            .key_down_at(1, c);
        let mut rig = Rig::new(platform);
        rig.register(key_pressed(a));

        let record = rig.run_for(1).unwrap().unwrap();
        assert_eq!(record.keyboard_or_default().key, a);
        assert_eq!(rig.queue.len(), 1);
        assert_eq!(rig.queue.peek().map(|r| r.keyboard_or_default().key), Some(c));
        assert_eq!(rig.event_loop.last_tick_diagnostics().records_drained, 2);
    }

    #[test]
    fn polled_beats_queued_on_the_same_tick() {
        let a = Keycode::from_char('a');
        let mut rig = Rig::new(ScriptedPlatform::new(10).key_down_at(1, a));
        rig.register(key_pressed(a));
        rig.register(timer_at(10));
        let record = rig.run_for(1).unwrap().unwrap();
        assert_eq!(record.kind(), EventKind::Dummy);
    }

    #[test]
    fn queue_first_order_flips_the_tie_break() {
        let a = Keycode::from_char('a');
        let config = EngineConfig {
            tick_order: TickOrder::QueueFirst,
            ..EngineConfig::simulated()
        };
        let mut rig = Rig::with_config(ScriptedPlatform::new(10).key_down_at(1, a), config);
        rig.register(timer_at(10));
        rig.register(key_pressed(a));
        let record = rig.run_for(1).unwrap().unwrap();
        assert_eq!(record.kind(), EventKind::Keyboard);
    }

    fn queue_reads(key: Keycode) -> Predicate {
        Predicate::polled(
            DeviceKind::Queue,
            key.channel(),
            Condition::scalar(symbol::PRESSED, ScalarTest::Equal),
        )
    }

    #[test]
    fn polled_queue_predicate_reads_the_last_matched_record() {
        let a = Keycode::from_char('a');
        let mut rig = Rig::new(ScriptedPlatform::new(10).key_down_at(1, a));
        rig.register(key_pressed(a).with_callback("seen", ScriptValue::default()));
        rig.register(queue_reads(a));

        let record = rig.run_for(5).unwrap().unwrap();
        let dummy = record.as_dummy().unwrap();
        assert_eq!(dummy.device, DeviceKind::Queue);
        assert_eq!(dummy.value, symbol::PRESSED);
        // Tick 1 matched the press; tick 2 polled it back from the queue.
        assert_eq!(record.created_ms(), 20);
        assert_eq!(rig.host.calls.len(), 1);
    }

    #[test]
    fn unmatched_records_do_not_become_current() {
        let (a, b) = (Keycode::from_char('a'), Keycode::from_char('b'));
        let platform = ScriptedPlatform::new(10).key_down_at(1, a).key_down_at(2, b);
        let mut rig = Rig::new(platform);
        rig.register(key_pressed(a).with_callback("seen", ScriptValue::default()));
        rig.register(timer_at(1000));

        assert!(rig.run_for(3).unwrap().is_none());
        let current = rig.queue.current().map(|r| r.keyboard_or_default().key);
        assert_eq!(current, Some(a));
    }

    #[test]
    fn queue_read_without_a_scalar_ends_the_run() {
        let mut rig = Rig::new(ScriptedPlatform::new(10));
        rig.queue.mark_matched(EventRecord::dummy(DummyEvent::default(), 0));
        rig.register(queue_reads(Keycode::SPACE));
        assert!(matches!(
            rig.run_for(1),
            Err(EngineError::Event(EventError::NoScalarDerivation {
                kind: EventKind::Dummy
            }))
        ));
    }

    // -- 4. Callbacks -------------------------------------------------------

    #[test]
    fn callback_predicate_fires_once_and_run_continues() {
        let a = Keycode::from_char('a');
        let mut rig = Rig::new(ScriptedPlatform::new(10).key_down_at(1, a));
        rig.register(key_pressed(a).with_callback("on_a", ScriptValue::from("param")));
        rig.register(timer_at(50));

        let record = rig.run_for(10).unwrap().unwrap();
        assert_eq!(record.kind(), EventKind::Dummy);
        assert_eq!(rig.host.calls.len(), 1);
        assert_eq!(rig.host.calls[0].0, "on_a");
        assert_eq!(rig.host.calls[0].1, ScriptValue::from("param"));
        assert_eq!(rig.host.calls[0].2, ScriptValue::from("a"));
        assert_eq!(rig.event_loop.len(), 1);
        assert_eq!(rig.event_loop.last_run_diagnostics().callbacks_invoked, 1);
    }

    #[test]
    fn callback_on_polled_predicate_continues_to_next() {
        let mut rig = Rig::new(ScriptedPlatform::new(10));
        rig.register(timer_at(0).with_callback("tick", ScriptValue::default()));
        let second = rig.register(timer_at(0));
        rig.run_for(1).unwrap().unwrap();
        assert_eq!(rig.host.calls.len(), 1);
        assert_eq!(rig.event_loop.last_run_diagnostics().matched, Some(second));
    }

    #[test]
    fn last_callback_emptying_registry_ends_run() {
        let mut rig = Rig::new(ScriptedPlatform::new(10));
        let only = rig.register(timer_at(20).with_callback("done", ScriptValue::default()));
        let record = rig.run_for(10).unwrap().unwrap();
        assert_eq!(record.created_ms(), 20);
        assert_eq!(rig.event_loop.last_run_diagnostics().matched, Some(only));
    }

    #[test]
    fn callback_failure_ends_the_run() {
        let mut rig = Rig::new(ScriptedPlatform::new(10));
        rig.host.fail = true;
        rig.register(timer_at(0).with_callback("boom", ScriptValue::default()));
        rig.register(timer_at(1000));
        let err = rig.run_for(3).unwrap_err();
        assert!(matches!(err, EngineError::Callback { ref name, .. } if name == "boom"));
    }

    // -- 5. Listener inbox --------------------------------------------------

    #[test]
    fn listener_samples_reach_registered_callbacks_only() {
        let mut rig = Rig::new(ScriptedPlatform::new(10));
        rig.register(timer_at(i64::MAX).with_callback("on_gaze", ScriptValue::Integer(7)));
        let handle = rig.event_loop.listener();
        handle.deliver("on_gaze", ScriptValue::from(vec![3i64, 4])).unwrap();
        handle.deliver("on_nothing", ScriptValue::Integer(1)).unwrap();

        assert!(rig.run_for(2).unwrap().is_none());
        assert_eq!(rig.host.calls.len(), 1);
        assert_eq!(rig.host.calls[0].1, ScriptValue::Integer(7));
        assert_eq!(rig.host.calls[0].2, ScriptValue::from(vec![3i64, 4]));
        // Deliveries never remove the predicate.
        assert_eq!(rig.event_loop.len(), 1);
        assert_eq!(rig.event_loop.last_run_diagnostics().listener_deliveries, 1);
    }

    #[test]
    fn clear_drops_pending_samples() {
        let mut rig = Rig::new(ScriptedPlatform::new(10));
        rig.register(timer_at(i64::MAX).with_callback("f", ScriptValue::default()));
        rig.event_loop.listener().deliver("f", ScriptValue::default()).unwrap();
        rig.event_loop.clear();
        rig.register(timer_at(i64::MAX).with_callback("f", ScriptValue::default()));
        rig.run_for(1).unwrap();
        assert!(rig.host.calls.is_empty());
    }

    // -- 6. Termination paths -----------------------------------------------

    #[test]
    fn empty_registry_never_matches() {
        let mut rig = Rig::new(ScriptedPlatform::new(10).key_down_at(1, Keycode::SPACE));
        assert!(rig.run_for(50).unwrap().is_none());
        assert_eq!(rig.event_loop.tick_count(), 50);
    }

    #[test]
    fn quit_ends_the_run() {
        let mut rig = Rig::new(ScriptedPlatform::new(10).quit_at(2));
        rig.register(timer_at(1000));
        assert!(matches!(rig.run_for(10), Err(EngineError::Quit)));
        assert_eq!(rig.event_loop.state(), LoopState::Armed);
    }

    #[test]
    fn abort_combo_ends_the_run() {
        let combo = ScriptedInput::Key {
            key: Keycode::BACKSLASH,
            state: KeyState::Pressed,
            modifiers: Modifiers::LCTRL | Modifiers::LALT | Modifiers::RSHIFT,
        };
        let mut rig = Rig::new(ScriptedPlatform::new(10).at(2, combo.clone()));
        rig.register(timer_at(1000));
        assert!(matches!(rig.run_for(10), Err(EngineError::Aborted)));

        let config = EngineConfig {
            abort_combo: false,
            ..EngineConfig::simulated()
        };
        let mut rig = Rig::with_config(ScriptedPlatform::new(10).at(2, combo), config);
        rig.register(timer_at(1000));
        assert!(rig.run_for(10).unwrap().is_none());
    }

    #[test]
    fn records_of_other_kinds_are_discarded() {
        let mut rig = Rig::new(
            ScriptedPlatform::new(10).record_at(1, EventPayload::Dummy(DummyEvent::default())),
        );
        rig.register(Predicate::queued(
            EventKind::Keyboard,
            0,
            Condition::scalar(0, ScalarTest::AlwaysTrue),
        ));
        assert!(rig.run_for(1).unwrap().is_none());
        assert!(rig.queue.is_empty());
    }

    // -- 7. Journal ---------------------------------------------------------

    #[test]
    fn journal_records_callbacks_and_termination() {
        let mut rig = Rig::new(ScriptedPlatform::new(10));
        let cb = rig.register(timer_at(10).with_callback("f", ScriptValue::default()));
        let end = rig.register(timer_at(20));
        rig.run_for(5).unwrap().unwrap();

        let journal = rig.event_loop.journal().unwrap();
        assert_eq!(journal.len(), 2);
        assert_eq!(journal.callbacks_named("f").count(), 1);
        assert_eq!(journal.entries_for_predicate(cb).count(), 1);
        let last = journal.last().unwrap();
        assert_eq!(last.predicate, end);
        assert_eq!(last.action, DispatchAction::Terminated);
        assert_eq!(last.tick, 2);
    }

    #[test]
    fn journal_can_be_disabled() {
        let config = EngineConfig {
            journal_enabled: false,
            ..EngineConfig::simulated()
        };
        let rig = Rig::with_config(ScriptedPlatform::new(10), config);
        assert!(rig.event_loop.journal().is_none());
    }
}
