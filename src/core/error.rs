//! Error handling and error types for cwboost.
//!
//! Every fallible operation in the crate returns [`Result`], which carries a
//! [`CwBoostError`]. The variants follow the failure classes of the boosting
//! engine: configuration errors raised at construction, per-candidate fit
//! errors that only exclude a single base learner, iteration-fatal errors,
//! logger errors and query errors.

use std::io;
use thiserror::Error;

/// Main error type for the cwboost library.
#[derive(Error, Debug)]
pub enum CwBoostError {
    /// Configuration and validation errors
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// Invalid input parameters
    #[error("Invalid parameter: {parameter} = {value}, {reason}")]
    InvalidParameter {
        parameter: String,
        value: String,
        reason: String,
    },

    /// A factory with the same name was already registered
    #[error("Factory '{name}' is already registered")]
    DuplicateFactory { name: String },

    /// Training was requested without any registered factory
    #[error("Could not train without any registered base-learner factory")]
    EmptyRegistry,

    /// A single base learner could not be fitted (singular or ill-conditioned system)
    #[error("Degenerate fit for base learner '{learner}': {reason}")]
    DegenerateFit { learner: String, reason: String },

    /// Every candidate failed in the same iteration
    #[error("All {failures} candidate base learners failed in iteration {iteration}")]
    AllCandidatesFailed { iteration: usize, failures: usize },

    /// Logger configuration or logger runtime errors
    #[error("Logger error: {message}")]
    Logger { message: String },

    /// Requested iteration is not available in the track
    #[error("Iteration {iteration} out of range, {available} iterations available")]
    IterationOutOfRange { iteration: usize, available: usize },

    /// Dimension mismatch errors
    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: String, actual: String },

    /// Externally supplied function returned something unusable
    #[error("Custom function error in '{function}': {reason}")]
    CustomFunction { function: String, reason: String },

    /// Lookup of an unknown data key, factory or logger
    #[error("Unknown identifier: {identifier}")]
    UnknownIdentifier { identifier: String },

    /// Operation is not allowed in the current engine state
    #[error("Invalid engine state: {message}")]
    State { message: String },

    /// Numerical computation errors (overflow, underflow, NaN)
    #[error("Numerical error: {message}")]
    Numerical { message: String },

    /// Snapshot serialization/deserialization errors
    #[error("Serialization error: {message}")]
    Serialization { message: String },

    /// File I/O errors
    #[error("I/O error: {source}")]
    IO {
        #[from]
        source: io::Error,
    },

    /// JSON serialization errors
    #[error("JSON error: {source}")]
    Json {
        #[from]
        source: serde_json::Error,
    },

    /// Bincode serialization errors
    #[error("Bincode error: {source}")]
    Bincode {
        #[from]
        source: bincode::Error,
    },

    /// Internal library errors (should not occur in normal usage)
    #[error("Internal error: {message}")]
    Internal { message: String },
}

/// Type alias for Results using CwBoostError
pub type Result<T> = std::result::Result<T, CwBoostError>;

impl CwBoostError {
    /// Create a configuration error
    pub fn config<S: Into<String>>(message: S) -> Self {
        CwBoostError::Config {
            message: message.into(),
        }
    }

    /// Create an invalid parameter error
    pub fn invalid_parameter<P, V, R>(parameter: P, value: V, reason: R) -> Self
    where
        P: Into<String>,
        V: Into<String>,
        R: Into<String>,
    {
        CwBoostError::InvalidParameter {
            parameter: parameter.into(),
            value: value.into(),
            reason: reason.into(),
        }
    }

    /// Create a degenerate fit error
    pub fn degenerate_fit<L: Into<String>, R: Into<String>>(learner: L, reason: R) -> Self {
        CwBoostError::DegenerateFit {
            learner: learner.into(),
            reason: reason.into(),
        }
    }

    /// Create a logger error
    pub fn logger<S: Into<String>>(message: S) -> Self {
        CwBoostError::Logger {
            message: message.into(),
        }
    }

    /// Create a dimension mismatch error
    pub fn dimension_mismatch<E, A>(expected: E, actual: A) -> Self
    where
        E: Into<String>,
        A: Into<String>,
    {
        CwBoostError::DimensionMismatch {
            expected: expected.into(),
            actual: actual.into(),
        }
    }

    /// Create a custom function error
    pub fn custom_function<F: Into<String>, R: Into<String>>(function: F, reason: R) -> Self {
        CwBoostError::CustomFunction {
            function: function.into(),
            reason: reason.into(),
        }
    }

    /// Create an unknown identifier error
    pub fn unknown_identifier<S: Into<String>>(identifier: S) -> Self {
        CwBoostError::UnknownIdentifier {
            identifier: identifier.into(),
        }
    }

    /// Create an invalid state error
    pub fn state<S: Into<String>>(message: S) -> Self {
        CwBoostError::State {
            message: message.into(),
        }
    }

    /// Create a numerical error
    pub fn numerical<S: Into<String>>(message: S) -> Self {
        CwBoostError::Numerical {
            message: message.into(),
        }
    }

    /// Create a serialization error
    pub fn serialization<S: Into<String>>(message: S) -> Self {
        CwBoostError::Serialization {
            message: message.into(),
        }
    }

    /// Create an internal error (should be used sparingly)
    pub fn internal<S: Into<String>>(message: S) -> Self {
        CwBoostError::Internal {
            message: message.into(),
        }
    }

    /// Check if this error is recoverable.
    ///
    /// Recoverable errors leave the engine in a consistent state: a degenerate
    /// fit only drops one candidate, an aborted iteration keeps every committed
    /// track entry queryable.
    pub fn is_recoverable(&self) -> bool {
        match self {
            CwBoostError::Config { .. } => false,
            CwBoostError::InvalidParameter { .. } => false,
            CwBoostError::DuplicateFactory { .. } => false,
            CwBoostError::EmptyRegistry => false,
            CwBoostError::DegenerateFit { .. } => true,
            CwBoostError::AllCandidatesFailed { .. } => true,
            CwBoostError::Logger { .. } => false,
            CwBoostError::IterationOutOfRange { .. } => true,
            CwBoostError::DimensionMismatch { .. } => false,
            CwBoostError::CustomFunction { .. } => false,
            CwBoostError::UnknownIdentifier { .. } => true,
            CwBoostError::State { .. } => true,
            CwBoostError::Numerical { .. } => true,
            CwBoostError::Serialization { .. } => false,
            CwBoostError::IO { .. } => false,
            CwBoostError::Json { .. } => false,
            CwBoostError::Bincode { .. } => false,
            CwBoostError::Internal { .. } => false,
        }
    }

    /// Get error category for logging
    pub fn category(&self) -> &'static str {
        match self {
            CwBoostError::Config { .. } => "config",
            CwBoostError::InvalidParameter { .. } => "invalid_parameter",
            CwBoostError::DuplicateFactory { .. } => "duplicate_factory",
            CwBoostError::EmptyRegistry => "empty_registry",
            CwBoostError::DegenerateFit { .. } => "degenerate_fit",
            CwBoostError::AllCandidatesFailed { .. } => "all_candidates_failed",
            CwBoostError::Logger { .. } => "logger",
            CwBoostError::IterationOutOfRange { .. } => "iteration_out_of_range",
            CwBoostError::DimensionMismatch { .. } => "dimension_mismatch",
            CwBoostError::CustomFunction { .. } => "custom_function",
            CwBoostError::UnknownIdentifier { .. } => "unknown_identifier",
            CwBoostError::State { .. } => "state",
            CwBoostError::Numerical { .. } => "numerical",
            CwBoostError::Serialization { .. } => "serialization",
            CwBoostError::IO { .. } => "io",
            CwBoostError::Json { .. } => "json",
            CwBoostError::Bincode { .. } => "bincode",
            CwBoostError::Internal { .. } => "internal",
        }
    }
}

impl From<toml::de::Error> for CwBoostError {
    fn from(err: toml::de::Error) -> Self {
        CwBoostError::Serialization {
            message: err.to_string(),
        }
    }
}

impl From<toml::ser::Error> for CwBoostError {
    fn from(err: toml::ser::Error) -> Self {
        CwBoostError::Serialization {
            message: err.to_string(),
        }
    }
}

/// Convenience macros for error creation
#[macro_export]
macro_rules! config_error {
    ($msg:expr) => {
        $crate::core::error::CwBoostError::config($msg)
    };
    ($fmt:expr, $($arg:tt)*) => {
        $crate::core::error::CwBoostError::config(format!($fmt, $($arg)*))
    };
}

#[macro_export]
macro_rules! logger_error {
    ($msg:expr) => {
        $crate::core::error::CwBoostError::logger($msg)
    };
    ($fmt:expr, $($arg:tt)*) => {
        $crate::core::error::CwBoostError::logger(format!($fmt, $($arg)*))
    };
}

#[macro_export]
macro_rules! ensure {
    ($cond:expr, $err:expr) => {
        if !($cond) {
            return Err($err.into());
        }
    };
}
