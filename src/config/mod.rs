//! Configuration for cwboost.
//!
//! [`BoostingConfig`] carries the engine settings (learning rate, iteration
//! bound, stop policy, parallelism, tracing). The built-in base-learner
//! factories take their own small settings structs. Every struct is serde
//! serializable and validates itself before use.

pub mod core;
pub mod learner;

pub use self::core::{BoostingConfig, BoostingConfigBuilder};
pub use learner::{CategoricalRidgeConfig, PSplineConfig, PolynomialConfig};
