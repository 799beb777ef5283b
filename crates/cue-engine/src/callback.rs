//! Named-callback dispatch and the external listener inbox.
//!
//! When a predicate with a callback name is satisfied, the scheduler calls the
//! session's [`CallbackHost`] instead of ending the wait. The host is usually
//! the script interpreter; tests use closures.
//!
//! Backends that produce samples on their own thread (an eye tracker, a
//! network trigger) hold a [`ListenerHandle`]. Samples sent through it wait in
//! the scheduler's inbox and are handed to the host at the start of the next
//! tick, never while the registry is being walked.
//!
//! # Example
//!
//! ```
//! use cue_engine::callback::{BoxError, CallbackCall, CallbackHost, Trigger};
//! use cue_events::value::ScriptValue;
//!
//! let mut seen = Vec::new();
//! let mut host = |call: CallbackCall<'_>| -> Result<(), BoxError> {
//!     seen.push(call.name.to_owned());
//!     Ok(())
//! };
//! let param = ScriptValue::Integer(3);
//! let sample = ScriptValue::from("x");
//! host.invoke(CallbackCall {
//!     name: "on_gaze",
//!     parameter: &param,
//!     trigger: Trigger::Sample(&sample),
//! })
//! .unwrap();
//! assert_eq!(seen, vec!["on_gaze"]);
//! ```

use std::sync::mpsc::{self, Receiver, Sender};

use cue_events::record::EventRecord;
use cue_events::value::ScriptValue;

use crate::EngineError;

/// Error type callback hosts report.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

// ---------------------------------------------------------------------------
// CallbackHost
// ---------------------------------------------------------------------------

/// What satisfied a callback predicate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger<'a> {
    /// A queued record or a synthesized dummy record.
    Record(&'a EventRecord),
    /// A value delivered through a [`ListenerHandle`].
    Sample(&'a ScriptValue),
}

impl Trigger<'_> {
    /// Script value appended to the callback's arguments.
    pub fn to_script_value(&self) -> ScriptValue {
        match self {
            Trigger::Record(record) => record.to_script_value().value,
            Trigger::Sample(value) => (*value).clone(),
        }
    }
}

/// One callback invocation.
#[derive(Debug, Clone, Copy)]
pub struct CallbackCall<'a> {
    pub name: &'a str,
    /// The predicate's parameter, unchanged.
    pub parameter: &'a ScriptValue,
    pub trigger: Trigger<'a>,
}

/// Invokes named script functions.
pub trait CallbackHost {
    /// # Errors
    ///
    /// Any error ends the current run with [`EngineError::Callback`].
    fn invoke(&mut self, call: CallbackCall<'_>) -> Result<(), BoxError>;
}

impl<F> CallbackHost for F
where
    F: FnMut(CallbackCall<'_>) -> Result<(), BoxError>,
{
    fn invoke(&mut self, call: CallbackCall<'_>) -> Result<(), BoxError> {
        self(call)
    }
}

/// Host for sessions without a script interpreter: logs and succeeds.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoCallbacks;

impl CallbackHost for NoCallbacks {
    fn invoke(&mut self, call: CallbackCall<'_>) -> Result<(), BoxError> {
        tracing::debug!(name = call.name, "no callback host; call dropped");
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Listener inbox
// ---------------------------------------------------------------------------

/// A value delivered by an external listener.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListenerSample {
    /// Callback name of the registered predicate to deliver to.
    pub callback: String,
    pub value: ScriptValue,
}

/// Cloneable sending side of a scheduler's inbox. Safe to move to another
/// thread.
#[derive(Debug, Clone)]
pub struct ListenerHandle {
    tx: Sender<ListenerSample>,
}

impl ListenerHandle {
    /// # Errors
    ///
    /// [`EngineError::ListenerClosed`] once the scheduler has been dropped.
    pub fn deliver(
        &self,
        callback: impl Into<String>,
        value: ScriptValue,
    ) -> Result<(), EngineError> {
        self.tx
            .send(ListenerSample {
                callback: callback.into(),
                value,
            })
            .map_err(|_| EngineError::ListenerClosed)
    }
}

/// Receiving side, owned by the event loop.
#[derive(Debug)]
pub(crate) struct Inbox {
    tx: Sender<ListenerSample>,
    rx: Receiver<ListenerSample>,
}

impl Inbox {
    pub(crate) fn new() -> Self {
        let (tx, rx) = mpsc::channel();
        Self { tx, rx }
    }

    pub(crate) fn handle(&self) -> ListenerHandle {
        ListenerHandle {
            tx: self.tx.clone(),
        }
    }

    /// Everything delivered so far, in arrival order.
    pub(crate) fn take(&self) -> Vec<ListenerSample> {
        self.rx.try_iter().collect()
    }
}
