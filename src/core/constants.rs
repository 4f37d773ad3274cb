//! Default values for cwboost configuration.

use crate::core::types::TimeUnit;

/// Library version reported by [`crate::VERSION`].
pub const CWBOOST_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default learning rate (shrinkage) applied to every selected base learner.
pub const DEFAULT_LEARNING_RATE: f64 = 0.05;

/// Default number of boosting iterations.
pub const DEFAULT_MAX_ITERATIONS: usize = 100;

/// Default polynomial degree.
pub const DEFAULT_POLYNOMIAL_DEGREE: usize = 1;

/// Default B-spline degree (cubic).
pub const DEFAULT_SPLINE_DEGREE: usize = 3;

/// Default number of interior knots.
pub const DEFAULT_N_KNOTS: usize = 20;

/// Default P-spline penalty strength.
pub const DEFAULT_SPLINE_PENALTY: f64 = 2.0;

/// Default order of the P-spline difference penalty.
pub const DEFAULT_DIFFERENCES: usize = 2;

/// Default relative improvement threshold for risk stoppers.
pub const DEFAULT_EPS_FOR_BREAK: f64 = 1e-5;

/// Default number of consecutive non-improving iterations before a risk stopper fires.
pub const DEFAULT_PATIENCE: usize = 5;

/// Default time unit for the time logger.
pub const DEFAULT_TIME_UNIT: TimeUnit = TimeUnit::Seconds;

/// Reciprocal condition number below which a normal-equation system is treated as singular.
pub const CONDITION_EPSILON: f64 = 1e-13;

/// Share of the penalty added to `XᵗX` before the Demmler-Reinsch decomposition.
pub const DEMMLER_REINSCH_EPSILON: f64 = 1e-9;

/// Search interval of `log10(penalty)` when a penalty is derived from degrees of freedom.
pub const DF_PENALTY_LOG10_RANGE: (f64, f64) = (-12.0, 15.0);

/// Default search interval of the line-search step size.
pub const DEFAULT_STEP_SIZE_RANGE: (f64, f64) = (0.0, 10.0);

/// Relative tolerance used by the golden-section line search.
pub const LINE_SEARCH_TOLERANCE: f64 = 1e-8;

/// Logger id used for the hidden iteration logger added on retraining.
pub const RETRAIN_ITERATION_LOGGER_ID: &str = "_iteration";

/// Prefix of environment variables read by the configuration layer.
pub const ENV_PREFIX: &str = "CWBOOST_";
