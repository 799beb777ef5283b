//! The event queue: an ordered buffer of records awaiting predicate tests.
//!
//! The platform pump appends records once per tick; the scheduler pops them
//! oldest-first. The last record a predicate matched is kept as the queue's
//! *current* record, which is what the queue reports when it is read as a
//! [`Device`] of kind [`DeviceKind::Queue`].
//!
//! # Example
//!
//! ```
//! use cue_events::queue::EventQueue;
//! use cue_events::record::{EventKind, EventRecord};
//!
//! let mut queue = EventQueue::new();
//! queue.push(EventRecord::new(EventKind::MouseMove, 1, None));
//! queue.push(EventRecord::new(EventKind::Timer, 2, None));
//!
//! let kinds: Vec<_> = queue.drain().map(|r| r.kind()).collect();
//! assert_eq!(kinds, vec![EventKind::MouseMove, EventKind::Timer]);
//! assert!(queue.is_empty());
//! ```

use std::collections::VecDeque;

use crate::device::{Device, DeviceKind, Point};
use crate::keys::symbol;
use crate::record::EventRecord;
use crate::EventError;

/// FIFO buffer of event records.
#[derive(Debug, Default, Clone)]
pub struct EventQueue {
    records: VecDeque<EventRecord>,
    current: Option<EventRecord>,
}

impl EventQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a record at the back.
    pub fn push(&mut self, record: EventRecord) {
        self.records.push_back(record);
    }

    /// Remove and return the oldest record. The current record is left
    /// alone until a predicate matches the popped one.
    pub fn pop(&mut self) -> Option<EventRecord> {
        self.records.pop_front()
    }

    /// Remember `record` as the last one a predicate matched.
    pub fn mark_matched(&mut self, record: EventRecord) {
        self.current = Some(record);
    }

    /// Remove and yield every buffered record, oldest first.
    pub fn drain(&mut self) -> impl Iterator<Item = EventRecord> + '_ {
        self.records.drain(..)
    }

    /// Discard all buffered records and forget the current one.
    pub fn clear(&mut self) {
        if !self.records.is_empty() {
            tracing::trace!(discarded = self.records.len(), "event queue cleared");
        }
        self.records.clear();
        self.current = None;
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Oldest buffered record, without removing it.
    pub fn peek(&self) -> Option<&EventRecord> {
        self.records.front()
    }

    pub fn iter(&self) -> impl Iterator<Item = &EventRecord> {
        self.records.iter()
    }

    /// The record a predicate matched most recently, if any since the last
    /// [`clear`](Self::clear).
    pub fn current(&self) -> Option<&EventRecord> {
        self.current.as_ref()
    }

    /// Scalar value of the current record on `channel`, or
    /// [`symbol::UNKNOWN`] before anything has matched.
    ///
    /// # Errors
    ///
    /// Propagates [`EventError::NoScalarDerivation`] from the record.
    pub fn current_value(&self, channel: i64) -> Result<i64, EventError> {
        match &self.current {
            Some(record) => record.derive_scalar(channel),
            None => Ok(symbol::UNKNOWN),
        }
    }
}

impl Extend<EventRecord> for EventQueue {
    fn extend<T: IntoIterator<Item = EventRecord>>(&mut self, iter: T) {
        self.records.extend(iter);
    }
}

impl Device for EventQueue {
    fn kind(&self) -> DeviceKind {
        DeviceKind::Queue
    }

    fn read_value(&self, channel: i64) -> Result<i64, EventError> {
        self.current_value(channel)
    }

    fn read_point(&self, _channel: i64) -> Option<Point> {
        self.current.as_ref().and_then(EventRecord::derive_point)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::channel;
    use crate::record::{DummyEvent, EventKind, EventPayload, MouseWheelEvent};

    fn wheel(dy: i64) -> EventRecord {
        EventRecord::with_payload(
            EventPayload::MouseWheel(MouseWheelEvent {
                x: 3,
                y: 4,
                dy,
                ..Default::default()
            }),
            0,
        )
    }

    #[test]
    fn pop_is_fifo() {
        let mut queue = EventQueue::new();
        queue.push(EventRecord::new(EventKind::Keyboard, 1, None));
        queue.push(EventRecord::new(EventKind::MouseMove, 2, None));
        assert_eq!(queue.len(), 2);

        let first = queue.pop().unwrap();
        assert_eq!(first.created_ms(), 1);
        assert_eq!(queue.peek().map(EventRecord::kind), Some(EventKind::MouseMove));
    }

    #[test]
    fn popping_alone_does_not_change_the_current_record() {
        let mut queue = EventQueue::new();
        queue.push(wheel(-1));
        queue.push(wheel(5));

        let matched = queue.pop().unwrap();
        queue.mark_matched(matched);
        // Popped for testing, matched nothing.
        queue.pop();

        assert_eq!(queue.current_value(channel::WHEEL_Y), Ok(-1));
        assert!(queue.is_empty());
    }

    #[test]
    fn clear_discards_everything() {
        let mut queue = EventQueue::new();
        queue.extend((0..5).map(|t| EventRecord::new(EventKind::Timer, t, None)));
        let first = queue.pop().unwrap();
        queue.mark_matched(first);
        queue.clear();
        assert!(queue.is_empty());
        assert!(queue.current().is_none());
    }

    #[test]
    fn reads_as_device_through_the_matched_record() {
        let mut queue = EventQueue::new();
        assert_eq!(queue.kind(), DeviceKind::Queue);
        assert_eq!(queue.read_value(channel::WHEEL_Y), Ok(symbol::UNKNOWN));
        assert_eq!(queue.read_point(0), None);

        queue.mark_matched(wheel(-1));
        assert_eq!(queue.read_value(channel::WHEEL_Y), Ok(-1));
        assert_eq!(queue.read_point(0), Some(Point::new(3, 4)));
    }

    #[test]
    fn dummy_current_record_is_a_read_error() {
        let mut queue = EventQueue::new();
        queue.mark_matched(EventRecord::dummy(DummyEvent::default(), 0));
        let expected = Err(EventError::NoScalarDerivation {
            kind: EventKind::Dummy,
        });
        assert_eq!(queue.current_value(1), expected);
        assert_eq!(queue.read_value(1), expected);
    }
}
