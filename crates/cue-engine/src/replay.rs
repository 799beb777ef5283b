//! Session recording and deterministic replay.
//!
//! A [`RecordingPlatform`] wraps any platform and writes down what each pump
//! did: the clock value, keyboard transitions, window size changes and the
//! records it queued. Waits run through [`Session::recorded_run`] also store
//! the predicates they armed and a BLAKE3 checkpoint of their outcome. The
//! resulting [`ReplayLog`] serializes to JSON.
//!
//! [`verify_replay`] feeds the frames back through a [`ReplayPlatform`],
//! re-arms each recorded run and compares outcome hashes. Listener samples
//! and callback side effects are not part of the log.
//!
//! # Example
//!
//! ```
//! use cue_engine::prelude::*;
//!
//! let a = Keycode::from_char('a');
//! let inner = ScriptedPlatform::new(10).key_down_at(2, a).key_down_at(5, a);
//! let mut session = Session::new(RecordingPlatform::new(inner), EngineConfig::simulated());
//!
//! let press = Predicate::queued(
//!     EventKind::Keyboard,
//!     a.channel(),
//!     Condition::scalar(symbol::PRESSED, ScalarTest::Equal),
//! );
//! session.recorded_run(vec![press.clone()]).unwrap();
//! session.recorded_run(vec![press]).unwrap();
//!
//! let log = session.finish_recording();
//! let result = verify_replay(&log).unwrap();
//! assert!(result.completed);
//! assert_eq!(result.runs_checked, 2);
//! assert!(result.first_divergence.is_none());
//! ```

use std::collections::{BTreeSet, VecDeque};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use cue_events::keys::{KeyState, Keycode};
use cue_events::predicate::Predicate;
use cue_events::record::EventRecord;

use crate::config::EngineConfig;
use crate::platform::{Platform, PumpFrame, PumpStatus};
use crate::session::Session;
use crate::EngineError;

// ---------------------------------------------------------------------------
// ReplayLog
// ---------------------------------------------------------------------------

/// What one pump did.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplayFrame {
    pub now_ms: u64,
    /// Live keyboard transitions, in keycode order.
    pub keys: Vec<(Keycode, KeyState)>,
    /// New window size, if it changed.
    pub window: Option<(i64, i64)>,
    /// Records queued during the pump, as queued.
    pub records: Vec<EventRecord>,
    pub quit: bool,
}

/// One recorded wait.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunRecord {
    /// Index of the first frame the run consumed. Frames before it belong
    /// to unrecorded activity and are replayed with an empty registry.
    #[serde(default)]
    pub first_frame: usize,
    /// Predicates armed, in registration order.
    pub predicates: Vec<Predicate>,
    /// Ticks the run took.
    pub ticks: u64,
    /// [`outcome_hash`] of the record that ended the run.
    pub outcome_hash: String,
}

/// A recorded session: settings, every pump, and every recorded run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplayLog {
    #[serde(default)]
    pub config: EngineConfig,
    pub frames: Vec<ReplayFrame>,
    pub runs: Vec<RunRecord>,
}

impl ReplayLog {
    /// # Errors
    ///
    /// [`EngineError::Serialize`] if encoding fails.
    pub fn to_json(&self) -> Result<String, EngineError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// # Errors
    ///
    /// [`EngineError::Serialize`] if the document is not a replay log.
    pub fn from_json(json: &str) -> Result<Self, EngineError> {
        Ok(serde_json::from_str(json)?)
    }
}

/// BLAKE3 hex digest of a run outcome: the winning record and the number of
/// ticks it took.
///
/// # Errors
///
/// [`EngineError::Serialize`] if the record cannot be encoded.
pub fn outcome_hash(record: &EventRecord, ticks: u64) -> Result<String, EngineError> {
    #[derive(Serialize)]
    struct HashableOutcome<'a> {
        record: &'a EventRecord,
        ticks: u64,
    }

    let json_bytes = serde_json::to_vec(&HashableOutcome { record, ticks })?;
    Ok(blake3::hash(&json_bytes).to_hex().to_string())
}

// ---------------------------------------------------------------------------
// RecordingPlatform
// ---------------------------------------------------------------------------

/// Records every pump of the wrapped platform.
#[derive(Debug, Clone)]
pub struct RecordingPlatform<P> {
    inner: P,
    frames: Vec<ReplayFrame>,
    runs: Vec<RunRecord>,
}

impl<P: Platform> RecordingPlatform<P> {
    pub fn new(inner: P) -> Self {
        Self {
            inner,
            frames: Vec::new(),
            runs: Vec::new(),
        }
    }

    pub fn inner(&self) -> &P {
        &self.inner
    }

    pub fn frames(&self) -> &[ReplayFrame] {
        &self.frames
    }

    pub fn runs(&self) -> &[RunRecord] {
        &self.runs
    }

    /// Consume the recorder and produce the log.
    pub fn finish(self, config: EngineConfig) -> ReplayLog {
        ReplayLog {
            config,
            frames: self.frames,
            runs: self.runs,
        }
    }
}

impl<P: Platform> Platform for RecordingPlatform<P> {
    fn pump(&mut self, frame: &mut PumpFrame<'_>) -> PumpStatus {
        let queued_before = frame.queue.len();
        let down_before: BTreeSet<Keycode> = frame.devices.keyboard.pressed().collect();
        let window_before = frame.devices.window;

        let status = self.inner.pump(frame);

        let down_after: BTreeSet<Keycode> = frame.devices.keyboard.pressed().collect();
        let mut keys: Vec<(Keycode, KeyState)> = down_after
            .difference(&down_before)
            .map(|&k| (k, KeyState::Pressed))
            .chain(
                down_before
                    .difference(&down_after)
                    .map(|&k| (k, KeyState::Released)),
            )
            .collect();
        keys.sort_by_key(|&(k, _)| k);

        let window = frame.devices.window;
        self.frames.push(ReplayFrame {
            now_ms: frame.now_ms(),
            keys,
            window: (window != window_before).then_some((window.width, window.height)),
            records: frame.queue.iter().skip(queued_before).cloned().collect(),
            quit: status == PumpStatus::Quit,
        });
        status
    }

    fn clock_ms(&self) -> Option<u64> {
        self.inner.clock_ms()
    }

    fn idle(&mut self, hint: Duration) {
        self.inner.idle(hint);
    }
}

impl<P: Platform> Session<RecordingPlatform<P>> {
    /// Arm `predicates`, run, clear, and store the run with a checkpoint of
    /// its outcome. Failed runs are not stored.
    ///
    /// # Errors
    ///
    /// Any error from arming or running.
    pub fn recorded_run(&mut self, predicates: Vec<Predicate>) -> Result<EventRecord, EngineError> {
        let first_frame = self.platform().frames.len();
        let ticks_before = self.event_loop().tick_count();
        let record = self.await_record(predicates.clone())?;
        let ticks = self.event_loop().tick_count() - ticks_before;
        let hash = outcome_hash(&record, ticks)?;
        tracing::debug!(ticks, hash = %hash, "run recorded");
        self.platform_mut().runs.push(RunRecord {
            first_frame,
            predicates,
            ticks,
            outcome_hash: hash,
        });
        Ok(record)
    }

    /// End the session and return its replay log.
    pub fn finish_recording(self) -> ReplayLog {
        let config = self.config().clone();
        self.into_platform().finish(config)
    }
}

// ---------------------------------------------------------------------------
// ReplayPlatform
// ---------------------------------------------------------------------------

/// Feeds recorded frames back, one per pump. Reports quit once they run out.
#[derive(Debug, Clone, Default)]
pub struct ReplayPlatform {
    frames: VecDeque<ReplayFrame>,
    pumped: usize,
}

impl ReplayPlatform {
    pub fn new(frames: impl IntoIterator<Item = ReplayFrame>) -> Self {
        Self {
            frames: frames.into_iter().collect(),
            pumped: 0,
        }
    }

    pub fn remaining(&self) -> usize {
        self.frames.len()
    }

    /// Frames applied so far.
    pub fn pumped(&self) -> usize {
        self.pumped
    }
}

impl Platform for ReplayPlatform {
    fn pump(&mut self, frame: &mut PumpFrame<'_>) -> PumpStatus {
        let Some(recorded) = self.frames.pop_front() else {
            return PumpStatus::Quit;
        };
        self.pumped += 1;
        frame.set_time(recorded.now_ms);
        for (key, state) in recorded.keys {
            frame.set_key(key, state);
        }
        if let Some((width, height)) = recorded.window {
            frame.devices.window.width = width;
            frame.devices.window.height = height;
        }
        frame.queue.extend(recorded.records);
        if recorded.quit {
            PumpStatus::Quit
        } else {
            PumpStatus::Continue
        }
    }

    fn idle(&mut self, _hint: Duration) {}
}

// ---------------------------------------------------------------------------
// verify_replay()
// ---------------------------------------------------------------------------

/// Details about the first run whose replayed outcome differs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplayDivergence {
    pub run_index: usize,
    pub expected_hash: String,
    /// `None` if the replayed run never ended before the frames ran out.
    pub actual_hash: Option<String>,
}

/// The outcome of [`verify_replay`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplayResult {
    /// Every recorded run was replayed and matched.
    pub completed: bool,
    /// Runs replayed with a matching outcome.
    pub runs_checked: usize,
    pub first_divergence: Option<ReplayDivergence>,
}

/// Replay a log in a fresh session and compare every run's outcome hash.
///
/// Stops at the first divergence. Replayed sessions have only the built-in
/// devices and no callback host.
///
/// # Errors
///
/// Returns an error if the log is malformed (invalid configuration, a run
/// with no predicates, a hash that is not BLAKE3 hex, runs that overlap or
/// reach past the last frame) or a run fails for a reason other than
/// running out of frames. Validation happens before anything is replayed.
pub fn verify_replay(log: &ReplayLog) -> Result<ReplayResult, anyhow::Error> {
    log.config
        .validate()
        .map_err(|e| anyhow::anyhow!("replay log has an invalid configuration: {e}"))?;
    let mut covered = 0usize;
    for (index, run) in log.runs.iter().enumerate() {
        if run.predicates.is_empty() {
            anyhow::bail!("run {index} has no predicates");
        }
        if !is_blake3_hex(&run.outcome_hash) {
            anyhow::bail!("run {index} has a malformed outcome hash '{}'", run.outcome_hash);
        }
        if run.first_frame < covered {
            anyhow::bail!(
                "run {index} starts at frame {} inside the previous run",
                run.first_frame
            );
        }
        let end = usize::try_from(run.ticks)
            .ok()
            .and_then(|ticks| run.first_frame.checked_add(ticks))
            .filter(|&end| end <= log.frames.len())
            .ok_or_else(|| {
                anyhow::anyhow!(
                    "run {index} covers {} ticks from frame {} but the log has {} frames",
                    run.ticks,
                    run.first_frame,
                    log.frames.len()
                )
            })?;
        covered = end;
    }

    let platform = ReplayPlatform::new(log.frames.iter().cloned());
    let mut session = Session::new(platform, log.config.clone());

    for (index, run) in log.runs.iter().enumerate() {
        let diverged = |actual_hash| ReplayResult {
            completed: false,
            runs_checked: index,
            first_divergence: Some(ReplayDivergence {
                run_index: index,
                expected_hash: run.outcome_hash.clone(),
                actual_hash,
            }),
        };

        while session.platform().pumped() < run.first_frame {
            match session.tick() {
                Ok(_) => {}
                Err(EngineError::Quit) if session.platform().remaining() == 0 => {
                    return Ok(diverged(None));
                }
                Err(e) => return Err(anyhow::anyhow!("replay before run {index} failed: {e}")),
            }
        }
        session.clear_all();

        let ticks_before = session.event_loop().tick_count();
        let record = match session.await_record(run.predicates.clone()) {
            Ok(record) => record,
            Err(EngineError::Quit) if session.platform().remaining() == 0 => {
                tracing::warn!(run = index, "frames ran out during replayed run");
                return Ok(diverged(None));
            }
            Err(e) => return Err(anyhow::anyhow!("replayed run {index} failed: {e}")),
        };
        let ticks = session.event_loop().tick_count() - ticks_before;
        let actual = outcome_hash(&record, ticks)
            .map_err(|e| anyhow::anyhow!("failed to hash outcome of run {index}: {e}"))?;
        if actual != run.outcome_hash {
            tracing::warn!(
                run = index,
                expected = %run.outcome_hash,
                actual = %actual,
                "replay diverged"
            );
            return Ok(diverged(Some(actual)));
        }
    }

    Ok(ReplayResult {
        completed: true,
        runs_checked: log.runs.len(),
        first_divergence: None,
    })
}

fn is_blake3_hex(hash: &str) -> bool {
    hash.len() == 64 && hash.bytes().all(|b| b.is_ascii_hexdigit())
}
