//! Engine configuration.
//!
//! [`EngineConfig`] is plain data with serde support so hosts can load it from
//! a JSON settings file. Missing fields take their defaults.
//!
//! # Example
//!
//! ```
//! use cue_engine::config::{EngineConfig, TickOrder};
//!
//! let config = EngineConfig::from_json(r#"{ "idle_sleep_ms": 2 }"#).unwrap();
//! assert_eq!(config.idle_sleep_ms, 2);
//! assert!(config.abort_combo);
//! assert_eq!(config.tick_order, TickOrder::PolledFirst);
//! ```

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::EngineError;

/// Which predicate group a tick evaluates first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum TickOrder {
    /// Device-polled predicates, then queued records.
    #[default]
    PolledFirst,
    /// Queued records, then device-polled predicates.
    QueueFirst,
}

/// Scheduler settings shared by every wait in a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Yield to the platform between ticks that matched nothing.
    pub sleep_between_ticks: bool,
    /// Length of that yield, in milliseconds.
    pub idle_sleep_ms: u64,
    /// End a run with [`EngineError::Aborted`] on Ctrl+Alt+Shift+Backslash.
    pub abort_combo: bool,
    pub tick_order: TickOrder,
    /// Keep a [`DispatchJournal`](cue_journal::DispatchJournal).
    pub journal_enabled: bool,
    pub journal_capacity: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            sleep_between_ticks: true,
            idle_sleep_ms: 1,
            abort_combo: true,
            tick_order: TickOrder::PolledFirst,
            journal_enabled: true,
            journal_capacity: cue_journal::DEFAULT_CAPACITY,
        }
    }
}

impl EngineConfig {
    /// Settings for simulated platforms: no idle sleep.
    pub fn simulated() -> Self {
        Self {
            sleep_between_ticks: false,
            ..Self::default()
        }
    }

    /// Parse and validate a JSON document.
    ///
    /// # Errors
    ///
    /// [`EngineError::Config`] if the document does not parse or a value is
    /// out of range.
    pub fn from_json(json: &str) -> Result<Self, EngineError> {
        let config: EngineConfig =
            serde_json::from_str(json).map_err(|e| EngineError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// # Errors
    ///
    /// [`EngineError::Config`] when the journal is enabled with zero capacity.
    pub fn validate(&self) -> Result<(), EngineError> {
        if self.journal_enabled && self.journal_capacity == 0 {
            return Err(EngineError::Config(
                "journal_capacity must be positive when the journal is enabled".to_owned(),
            ));
        }
        Ok(())
    }

    pub fn idle_sleep(&self) -> Duration {
        Duration::from_millis(self.idle_sleep_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = EngineConfig::default();
        assert!(config.sleep_between_ticks);
        assert_eq!(config.idle_sleep(), Duration::from_millis(1));
        assert!(config.journal_enabled);
        assert_eq!(config.journal_capacity, 4096);
    }

    #[test]
    fn empty_document_is_default() {
        assert_eq!(EngineConfig::from_json("{}").unwrap(), EngineConfig::default());
    }

    #[test]
    fn tick_order_parses() {
        let config = EngineConfig::from_json(r#"{ "tick_order": "QueueFirst" }"#).unwrap();
        assert_eq!(config.tick_order, TickOrder::QueueFirst);
    }

    #[test]
    fn zero_capacity_with_journal_is_rejected() {
        let err = EngineConfig::from_json(r#"{ "journal_capacity": 0 }"#).unwrap_err();
        assert!(matches!(err, EngineError::Config(_)));

        let ok = EngineConfig::from_json(r#"{ "journal_enabled": false, "journal_capacity": 0 }"#);
        assert!(ok.is_ok());
    }

    #[test]
    fn malformed_json_is_a_config_error() {
        assert!(matches!(
            EngineConfig::from_json("{ not json"),
            Err(EngineError::Config(_))
        ));
    }
}
