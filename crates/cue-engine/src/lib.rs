//! Cue Engine -- the event/predicate scheduler behind blocking script waits.
//!
//! This crate builds on [`cue_events`] to provide the part of a stimulus/
//! response platform that turns "wait for a key press or two seconds" into a
//! single result. A [`Session`](session::Session) owns the devices, the event
//! queue and the [`EventLoop`](event_loop::EventLoop); each wait arms a few
//! predicates, runs the loop until one terminating predicate is satisfied,
//! clears the registry and converts the winning record into a script value.
//!
//! # Quick Start
//!
//! ```
//! use cue_engine::prelude::*;
//!
//! // 40 ms per simulated tick; the 'a' key goes down on tick 3.
//! let platform = ScriptedPlatform::new(40).key_down_at(3, Keycode::from_char('a'));
//! let mut session = Session::new(platform, EngineConfig::simulated());
//!
//! let result = session.wait_for_any_key_press_with_timeout(500).unwrap();
//! assert_eq!(result.value, ScriptValue::from("a"));
//! assert_eq!(result.created_ms, 120);
//! ```

#![deny(unsafe_code)]

pub mod callback;
pub mod config;
pub mod devices;
pub mod event_loop;
pub mod platform;
pub mod replay;
pub mod script;
pub mod session;
pub mod wait;

use cue_events::device::DeviceKind;
use cue_events::EventError;

/// Re-export the events crate for convenience.
pub use cue_events;

/// Re-export the journal crate for convenience.
pub use cue_journal;

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Errors that end a registration or a run.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// A predicate violated its shape or derivation contract.
    #[error(transparent)]
    Event(#[from] EventError),

    /// A polled predicate names a device the session does not have.
    #[error("device {kind} is not available in this session")]
    DeviceUnavailable { kind: DeviceKind },

    /// The callback host failed.
    #[error("callback '{name}' failed: {source}")]
    Callback {
        name: String,
        #[source]
        source: callback::BoxError,
    },

    /// The abort key combination was pressed.
    #[error("run aborted by Ctrl+Alt+Shift+Backslash")]
    Aborted,

    /// The platform asked to shut down.
    #[error("platform requested quit")]
    Quit,

    /// A script argument had the wrong form.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("invalid configuration: {0}")]
    Config(String),

    /// The event loop that owned this listener handle is gone.
    #[error("listener inbox closed")]
    ListenerClosed,

    #[error("serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),
}

// ---------------------------------------------------------------------------
// Prelude
// ---------------------------------------------------------------------------

/// Convenience re-exports for common engine usage.
pub mod prelude {
    // Re-export everything from the events prelude.
    pub use cue_events::prelude::*;

    pub use crate::callback::{
        BoxError, CallbackCall, CallbackHost, ListenerHandle, ListenerSample, NoCallbacks, Trigger,
    };
    pub use crate::config::{EngineConfig, TickOrder};
    pub use crate::devices::{DeviceSet, Keyboard, Timer, Window};
    pub use crate::event_loop::{EventLoop, LoopState, RunDiagnostics, TickContext, TickDiagnostics};
    pub use crate::platform::{
        HeadlessPlatform, Platform, PumpFrame, PumpStatus, ScriptedInput, ScriptedPlatform,
    };
    pub use crate::replay::{
        outcome_hash, verify_replay, RecordingPlatform, ReplayDivergence, ReplayFrame, ReplayLog,
        ReplayPlatform, ReplayResult, RunRecord,
    };
    pub use crate::session::Session;
    pub use crate::EngineError;

    pub use cue_journal::{DispatchAction, DispatchEntry, DispatchJournal};
}
