//! Cue Events -- devices, event records, state predicates and the event queue.
//!
//! This crate holds the data model of the stimulus/response wait engine. It
//! has no scheduler and no clock; `cue-engine` builds those on top.
//!
//! - [`device`]: the single-operation device contract and channel ids.
//! - [`keys`]: keycodes, modifier bits and the shared symbolic scalars.
//! - [`record`]: the event record, a closed sum type over eleven kinds.
//! - [`predicate`]: scalar/interval/region conditions and their routing.
//! - [`queue`]: the FIFO buffer the platform pump fills each tick.
//!
//! # Quick Start
//!
//! ```
//! use cue_events::prelude::*;
//!
//! let space = Keycode::SPACE;
//! let predicate = Predicate::queued(
//!     EventKind::Keyboard,
//!     space.channel(),
//!     Condition::scalar(symbol::PRESSED, ScalarTest::Equal),
//! );
//!
//! let mut queue = EventQueue::new();
//! queue.push(EventRecord::with_payload(
//!     EventPayload::Keyboard(KeyboardEvent {
//!         scancode: 44,
//!         key: space,
//!         state: KeyState::Pressed,
//!         modifiers: Modifiers::empty(),
//!     }),
//!     250,
//! ));
//!
//! let record = queue.pop().unwrap();
//! let reading = predicate.read_record(&record).unwrap();
//! assert!(predicate.condition.evaluate(reading).unwrap());
//! ```

#![deny(unsafe_code)]

pub mod device;
pub mod keys;
pub mod predicate;
pub mod queue;
pub mod record;
pub mod value;

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Caller-contract violations detected while building or evaluating
/// predicates.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EventError {
    /// A scalar was requested from a record kind that has none.
    #[error("no scalar derivation for {kind} records")]
    NoScalarDerivation { kind: record::EventKind },

    /// The comparator does not belong to the condition's shape.
    #[error("comparator {comparator} is not valid for {shape} conditions")]
    InvalidComparator {
        shape: predicate::Shape,
        comparator: predicate::Comparator,
    },

    /// A reading of the wrong shape reached the evaluator.
    #[error("{shape} condition cannot evaluate this reading")]
    ReadingMismatch { shape: predicate::Shape },

    /// A region condition found no planar reading.
    #[error("no planar reading available on channel {channel}")]
    MissingPoint { channel: i64 },

    #[error("unknown comparator name {0:?}")]
    UnknownComparator(String),

    #[error("unknown device name {0:?}")]
    UnknownDevice(String),
}

// ---------------------------------------------------------------------------
// Prelude
// ---------------------------------------------------------------------------

/// Convenience re-exports for common usage.
pub mod prelude {
    pub use crate::device::{channel, Device, DeviceKind, Point};
    pub use crate::keys::{symbol, KeyState, Keycode, Modifiers};
    pub use crate::predicate::{
        Comparator, Condition, IntervalTest, Predicate, PredicateId, Reading, Rect, RegionTest,
        ScalarTest, Shape, Source,
    };
    pub use crate::queue::EventQueue;
    pub use crate::record::{
        DummyEvent, EventKind, EventPayload, EventRecord, KeyboardEvent, MouseButtonEvent,
        MouseMoveEvent, MouseWheelEvent, MovieEvent, TextEditingEvent, TextInputEvent,
        WindowResizeEvent,
    };
    pub use crate::value::{ScriptValue, StampedValue};
    pub use crate::EventError;
}
