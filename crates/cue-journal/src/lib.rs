//! Cue Journal -- a queryable log of every dispatch decision.
//!
//! The [`DispatchJournal`] records what the scheduler did with each satisfied
//! predicate: ended the wait with a record, invoked a named callback, or
//! delivered a listener sample to a callback. Each [`DispatchEntry`] carries
//! the tick it happened on, the predicate, where the reading came from and the
//! record involved.
//!
//! The journal keeps at most `capacity` entries; when full, the oldest entry
//! is dropped and counted in [`DispatchJournal::dropped`].
//!
//! # Query API
//!
//! - **Predicate**: [`DispatchJournal::entries_for_predicate`]
//! - **Tick**: [`DispatchJournal::entries_in_tick`]
//! - **Callback name**: [`DispatchJournal::callbacks_named`]
//! - **Terminations**: [`DispatchJournal::terminations`]
//!
//! # Example
//!
//! ```
//! use cue_events::prelude::*;
//! use cue_journal::{DispatchAction, DispatchEntry, DispatchJournal};
//!
//! let mut journal = DispatchJournal::with_capacity(16);
//! journal.record(DispatchEntry {
//!     tick: 3,
//!     predicate: PredicateId(0),
//!     source: Source::Polled(DeviceKind::Keyboard),
//!     action: DispatchAction::Terminated,
//!     record: Some(EventRecord::new(EventKind::Dummy, 120, None)),
//! });
//!
//! assert_eq!(journal.len(), 1);
//! assert_eq!(journal.terminations().count(), 1);
//! assert_eq!(journal.entries_in_tick(3).count(), 1);
//! ```

#![deny(unsafe_code)]

use std::collections::VecDeque;

use cue_events::predicate::{PredicateId, Source};
use cue_events::record::EventRecord;
use serde::{Deserialize, Serialize};

/// Entries kept when no capacity is given.
pub const DEFAULT_CAPACITY: usize = 4096;

// ---------------------------------------------------------------------------
// DispatchEntry
// ---------------------------------------------------------------------------

/// What the scheduler did with a satisfied predicate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DispatchAction {
    /// The predicate had no callback; the wait ended.
    Terminated,
    /// The predicate's callback was invoked and the predicate removed.
    CallbackInvoked { name: String },
    /// An external listener sample was handed to the callback.
    ListenerDelivered { name: String },
}

impl DispatchAction {
    pub fn callback_name(&self) -> Option<&str> {
        match self {
            DispatchAction::Terminated => None,
            DispatchAction::CallbackInvoked { name }
            | DispatchAction::ListenerDelivered { name } => Some(name),
        }
    }
}

/// A single recorded dispatch decision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatchEntry {
    /// Scheduler tick during which the decision was made.
    pub tick: u64,
    pub predicate: PredicateId,
    pub source: Source,
    pub action: DispatchAction,
    /// The matched queue record or synthesized dummy record. Listener
    /// deliveries carry none.
    pub record: Option<EventRecord>,
}

// ---------------------------------------------------------------------------
// DispatchJournal
// ---------------------------------------------------------------------------

/// Bounded, insertion-ordered log of [`DispatchEntry`] values.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatchJournal {
    entries: VecDeque<DispatchEntry>,
    capacity: usize,
    dropped: u64,
}

impl Default for DispatchJournal {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }
}

impl DispatchJournal {
    pub fn new() -> Self {
        Self::default()
    }

    /// # Panics
    ///
    /// Panics if `capacity` is zero.
    pub fn with_capacity(capacity: usize) -> Self {
        assert!(capacity > 0, "journal capacity must be positive");
        Self {
            entries: VecDeque::new(),
            capacity,
            dropped: 0,
        }
    }

    /// Append an entry, dropping the oldest one when full.
    pub fn record(&mut self, entry: DispatchEntry) {
        if self.entries.len() == self.capacity {
            self.entries.pop_front();
            self.dropped += 1;
        }
        tracing::trace!(
            tick = entry.tick,
            predicate = %entry.predicate,
            action = ?entry.action,
            "dispatch recorded"
        );
        self.entries.push_back(entry);
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.dropped = 0;
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of entries discarded because the journal was full.
    pub fn dropped(&self) -> u64 {
        self.dropped
    }

    /// All retained entries, oldest first.
    pub fn entries(&self) -> impl Iterator<Item = &DispatchEntry> {
        self.entries.iter()
    }

    pub fn last(&self) -> Option<&DispatchEntry> {
        self.entries.back()
    }

    pub fn entries_for_predicate(&self, id: PredicateId) -> impl Iterator<Item = &DispatchEntry> {
        self.entries.iter().filter(move |e| e.predicate == id)
    }

    pub fn entries_in_tick(&self, tick: u64) -> impl Iterator<Item = &DispatchEntry> {
        self.entries.iter().filter(move |e| e.tick == tick)
    }

    /// Callback invocations and listener deliveries naming `name`.
    pub fn callbacks_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a DispatchEntry> {
        self.entries
            .iter()
            .filter(move |e| e.action.callback_name() == Some(name))
    }

    pub fn terminations(&self) -> impl Iterator<Item = &DispatchEntry> {
        self.entries
            .iter()
            .filter(|e| e.action == DispatchAction::Terminated)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
