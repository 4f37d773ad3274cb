//! # cwboost
//!
//! Component-wise gradient boosting in pure Rust.
//!
//! Component-wise boosting builds an additive model one simple base learner
//! at a time. Every iteration fits each candidate (a polynomial or P-spline
//! on a single feature, or a user-defined learner) to the negative gradient
//! of the loss and adds only the best one, scaled by the learning rate. The
//! result is a sparse, interpretable model whose coefficient path can be
//! replayed for any iteration.
//!
//! ## Features
//!
//! - **Losses**: quadratic, absolute, quantile, Huber, binomial and custom
//!   closures with shape checks.
//! - **Base learners**: polynomials, P-splines with difference penalties,
//!   categorical ridge and single-class indicators, and custom learners from
//!   closures or plain function pointers. Penalties can be set directly or
//!   through target degrees of freedom.
//! - **Resumable training**: `continue_training` extends a stopped run and
//!   yields the same model as one longer run.
//! - **Loggers and stoppers**: iteration bound, in-bag and out-of-bag risk
//!   plateaus and time budgets.
//! - **Parallel fitting**: candidates of one iteration are fitted with Rayon.
//! - **Line search**: optionally scale each update by the risk-minimizing
//!   step size.
//! - **Snapshots**: engine state round-trips through JSON or bincode.
//!
//! ## Quick Start
//!
//! ```rust
//! use cwboost::{
//!     BoostingConfigBuilder, Engine, FactoryRegistry, GreedyOptimizer, InMemoryData,
//!     IterationLogger, LoggerList, PSplineConfig, PSplineFactory, PolynomialConfig,
//!     PolynomialFactory, QuadraticLoss,
//! };
//! use ndarray::Array1;
//! use std::sync::Arc;
//!
//! # fn main() -> cwboost::Result<()> {
//! let x = Array1::linspace(0.0, 1.0, 50);
//! let y = x.mapv(|v: f64| (6.0 * v).sin());
//! let data = InMemoryData::new().with_column("x", x)?;
//!
//! let mut registry = FactoryRegistry::new();
//! registry.register(PSplineFactory::new(&data, "x", PSplineConfig::default())?)?;
//! registry.register(PolynomialFactory::new(&data, "x", PolynomialConfig::default())?)?;
//!
//! let mut loggers = LoggerList::new();
//! loggers.register(IterationLogger::new("iterations", true, 200)?)?;
//!
//! let config = BoostingConfigBuilder::new().learning_rate(0.1).build()?;
//! let mut engine = Engine::new(
//!     config,
//!     y.view(),
//!     Arc::new(QuadraticLoss::new()),
//!     Box::new(GreedyOptimizer::new()),
//!     loggers,
//!     registry,
//! )?;
//! engine.train(100)?;
//! engine.continue_training(50)?;
//!
//! let fitted = engine.predict(&data.to_new_data(), true)?;
//! assert_eq!(fitted.len(), 50);
//! println!("{}", engine.summary());
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! - [`core`]: error type, type aliases, constants, linear algebra and statistics helpers
//! - [`config`]: engine and base-learner settings
//! - [`dataset`]: data provider abstraction and hold-out splits
//! - [`loss`]: loss functions
//! - [`baselearner`]: base learners, their factories and the factory registry
//! - [`optimizer`]: greedy candidate selection and line search
//! - [`logger`]: per-iteration loggers and stopping rules
//! - [`boosting`]: the engine, the base-learner track and snapshots

#![warn(missing_docs)]
#![warn(
    missing_debug_implementations,
    rust_2018_idioms,
    non_snake_case,
    non_upper_case_globals
)]

pub mod core;

pub mod config;

pub mod dataset;

pub mod loss;

pub mod baselearner;

pub mod optimizer;

pub mod logger;

pub mod boosting;

pub use crate::core::{
    constants::*,
    error::{CwBoostError, Result},
    types::{EngineState, IterationIndex, Matrix, ParameterMap, TimeUnit, Vector},
};

pub use config::{
    BoostingConfig, BoostingConfigBuilder, CategoricalRidgeConfig, PSplineConfig, PolynomialConfig,
};

pub use dataset::{DataProvider, HoldoutSplit, InMemoryData, NewData};

pub use loss::{
    create_loss, AbsoluteLoss, BinomialLoss, CustomLoss, HuberLoss, Loss, LossConfig, LossType,
    QuadraticLoss, QuantileLoss, SharedLoss, TaskType,
};

pub use baselearner::{
    BaseLearner, BaseLearnerFactory, CategoricalBinaryFactory, CategoricalRidgeFactory,
    CustomFactory, FactoryRegistry, PSplineFactory, PolynomialFactory,
};

pub use optimizer::{GreedyOptimizer, LineSearchOptimizer, Optimizer, Selection};

pub use logger::{
    InbagRiskLogger, IterationLogger, Logger, LoggerContext, LoggerInit, LoggerKind, LoggerList,
    LoggerTable, OobRiskLogger, PlateauConfig, TimeLogger,
};

pub use boosting::{
    BaselearnerTrack, CancellationToken, Engine, EngineSnapshot, ParameterMatrix, TrackEntry,
};

pub use crate::core::constants::CWBOOST_VERSION as VERSION;

/// Initialize the library.
///
/// Installs an `env_logger` honouring `RUST_LOG`. Calling it is optional and
/// repeated calls are harmless.
///
/// # Examples
///
/// ```rust
/// fn main() -> cwboost::Result<()> {
///     cwboost::init()?;
///     Ok(())
/// }
/// ```
pub fn init() -> Result<()> {
    crate::core::initialize_core()
}

/// Check if the library has been initialized.
pub fn is_initialized() -> bool {
    crate::core::is_core_initialized()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_library_initialization() {
        assert!(init().is_ok());
        assert!(is_initialized());
    }

    #[test]
    fn test_config_builder() {
        let config = BoostingConfigBuilder::new()
            .learning_rate(0.2)
            .max_iterations(500)
            .use_offset(false)
            .build()
            .unwrap();

        assert_eq!(config.learning_rate, 0.2);
        assert_eq!(config.max_iterations, 500);
        assert!(!config.use_offset);
    }

    #[test]
    fn test_config_validation() {
        assert!(BoostingConfig::default().validate().is_ok());

        let mut invalid = BoostingConfig::default();
        invalid.learning_rate = 1.5;
        assert!(invalid.validate().is_err());
    }

    #[test]
    fn test_version_info() {
        assert!(!VERSION.is_empty());
    }

    #[test]
    fn test_error_integration() {
        let err = CwBoostError::config("test error");
        assert_eq!(err.category(), "config");
        assert!(!err.is_recoverable());
    }
}
