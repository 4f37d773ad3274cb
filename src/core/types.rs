//! Core data types for cwboost.
//!
//! Type aliases and small enumerations shared by the loss, base-learner,
//! logger and engine modules.

use crate::core::constants::DEFAULT_TIME_UNIT;
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Iteration number type for boosting iterations (1-based once training started).
pub type IterationIndex = usize;

/// Numeric vector used for responses, predictions and pseudo residuals.
pub type Vector = Array1<f64>;

/// Numeric matrix used for design matrices and raw feature blocks.
pub type Matrix = Array2<f64>;

/// Cumulative parameter vectors keyed by base-learner identifier.
///
/// A `BTreeMap` keeps the key order stable, which makes parameter matrices
/// and snapshots reproducible.
pub type ParameterMap = BTreeMap<String, Vector>;

/// Lifecycle of a boosting engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EngineState {
    /// Constructed, `train` not called yet
    Uninitialized,
    /// Inside the boosting loop
    Running,
    /// Reached the iteration bound without any stopper firing
    StoppedSuccess,
    /// A stopper logger signalled stop
    StoppedByLogger,
    /// Cancelled from the outside between two iterations
    StoppedByCancellation,
    /// All candidates failed in one iteration
    Aborted,
}

impl Default for EngineState {
    fn default() -> Self {
        EngineState::Uninitialized
    }
}

impl EngineState {
    /// Check if the engine finished a training call (successfully or not).
    pub fn is_stopped(&self) -> bool {
        matches!(
            self,
            EngineState::StoppedSuccess
                | EngineState::StoppedByLogger
                | EngineState::StoppedByCancellation
                | EngineState::Aborted
        )
    }

    /// Check if the engine can be resumed with `continue_training`.
    pub fn is_resumable(&self) -> bool {
        self.is_stopped()
    }
}

impl fmt::Display for EngineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EngineState::Uninitialized => write!(f, "uninitialized"),
            EngineState::Running => write!(f, "running"),
            EngineState::StoppedSuccess => write!(f, "stopped(success)"),
            EngineState::StoppedByLogger => write!(f, "stopped(by-logger)"),
            EngineState::StoppedByCancellation => write!(f, "stopped(by-cancellation)"),
            EngineState::Aborted => write!(f, "aborted(error)"),
        }
    }
}

/// Time unit used by the time logger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TimeUnit {
    /// Whole minutes
    Minutes,
    /// Whole seconds
    Seconds,
    /// Microseconds
    Microseconds,
}

impl Default for TimeUnit {
    fn default() -> Self {
        DEFAULT_TIME_UNIT
    }
}

impl TimeUnit {
    /// Convert a duration into this unit, truncating like integer clocks do.
    pub fn convert(&self, duration: std::time::Duration) -> u64 {
        match self {
            TimeUnit::Minutes => duration.as_secs() / 60,
            TimeUnit::Seconds => duration.as_secs(),
            TimeUnit::Microseconds => duration.as_micros() as u64,
        }
    }
}

impl fmt::Display for TimeUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TimeUnit::Minutes => write!(f, "minutes"),
            TimeUnit::Seconds => write!(f, "seconds"),
            TimeUnit::Microseconds => write!(f, "microseconds"),
        }
    }
}

impl std::str::FromStr for TimeUnit {
    type Err = crate::core::error::CwBoostError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "minutes" => Ok(TimeUnit::Minutes),
            "seconds" => Ok(TimeUnit::Seconds),
            "microseconds" => Ok(TimeUnit::Microseconds),
            other => Err(crate::core::error::CwBoostError::invalid_parameter(
                "time_unit",
                other,
                "must be one of minutes, seconds, microseconds",
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_engine_state_transitions() {
        assert_eq!(EngineState::default(), EngineState::Uninitialized);
        assert!(!EngineState::Uninitialized.is_resumable());
        assert!(!EngineState::Running.is_stopped());
        assert!(EngineState::StoppedByLogger.is_resumable());
        assert!(EngineState::Aborted.is_stopped());
        assert_eq!(EngineState::StoppedSuccess.to_string(), "stopped(success)");
    }

    #[test]
    fn test_time_unit_conversion() {
        let d = Duration::from_millis(125_500);
        assert_eq!(TimeUnit::Minutes.convert(d), 2);
        assert_eq!(TimeUnit::Seconds.convert(d), 125);
        assert_eq!(TimeUnit::Microseconds.convert(d), 125_500_000);
    }

    #[test]
    fn test_time_unit_parsing() {
        assert_eq!("Seconds".parse::<TimeUnit>().unwrap(), TimeUnit::Seconds);
        assert!("hours".parse::<TimeUnit>().is_err());
    }
}
