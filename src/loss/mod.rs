//! Loss functions for component-wise boosting.
//!
//! A loss exposes three operations: the point-wise loss, its gradient with
//! respect to the prediction, and the constant that minimizes the empirical
//! risk. The boosting target of every iteration is the pseudo residual, the
//! negative gradient.
//!
//! Built-in variants:
//!
//! - [`QuadraticLoss`]: `(y - f)^2 / 2`, initialized with the mean
//! - [`AbsoluteLoss`]: `|y - f|`, initialized with the median
//! - [`QuantileLoss`]: asymmetric absolute loss, initialized with the quantile
//! - [`HuberLoss`]: quadratic near zero, linear in the tails
//! - [`BinomialLoss`]: `log(1 + exp(-2 y f))` for labels in `{-1, 1}`
//! - [`CustomLoss`]: user supplied closures, shape-checked

pub mod classification;
pub mod custom;
pub mod regression;

pub use classification::BinomialLoss;
pub use custom::{ConstantInitFn, CustomLoss, GradientFn, LossFn};
pub use regression::{AbsoluteLoss, HuberLoss, QuadraticLoss, QuantileLoss};

use crate::core::error::{CwBoostError, Result};
use crate::core::stats;
use crate::core::types::Vector;
use ndarray::ArrayView1;
use serde::{Deserialize, Serialize};
use std::fmt::{self, Debug};
use std::sync::Arc;

/// Task a loss is meant for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TaskType {
    /// Continuous response
    Regression,
    /// Binary classification with labels encoded as `{-1, 1}`
    BinaryClassification,
    /// User-defined
    Custom,
}

impl fmt::Display for TaskType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskType::Regression => write!(f, "regression"),
            TaskType::BinaryClassification => write!(f, "binary_classif"),
            TaskType::Custom => write!(f, "custom"),
        }
    }
}

/// Capability set every loss provides.
pub trait Loss: Send + Sync + Debug {
    /// Short name used in logs and snapshots.
    fn name(&self) -> &str;

    /// Task this loss is meant for.
    fn task(&self) -> TaskType;

    /// Point-wise loss `L(y_i, f_i)`.
    fn evaluate(&self, truth: &ArrayView1<'_, f64>, prediction: &ArrayView1<'_, f64>)
        -> Result<Vector>;

    /// Point-wise derivative `dL/df` at `(y_i, f_i)`.
    fn gradient(&self, truth: &ArrayView1<'_, f64>, prediction: &ArrayView1<'_, f64>)
        -> Result<Vector>;

    /// Constant prediction minimizing the empirical risk.
    fn constant_initializer(&self, truth: &ArrayView1<'_, f64>) -> Result<f64>;

    /// Pseudo residuals, the negative gradient.
    fn pseudo_residuals(
        &self,
        truth: &ArrayView1<'_, f64>,
        prediction: &ArrayView1<'_, f64>,
    ) -> Result<Vector> {
        Ok(-self.gradient(truth, prediction)?)
    }

    /// Empirical risk, the mean point-wise loss.
    fn empirical_risk(
        &self,
        truth: &ArrayView1<'_, f64>,
        prediction: &ArrayView1<'_, f64>,
    ) -> Result<f64> {
        let loss = self.evaluate(truth, prediction)?;
        stats::mean(&loss.view())
    }

    /// Map scores to the response scale. Identity unless overridden.
    fn response_transform(&self, scores: &ArrayView1<'_, f64>) -> Vector {
        scores.to_owned()
    }

    /// Validate and, if needed, re-encode the response before training.
    fn prepare_response(&self, truth: &ArrayView1<'_, f64>) -> Result<Vector> {
        if truth.is_empty() {
            return Err(CwBoostError::config("response must not be empty"));
        }
        if truth.iter().any(|v| !v.is_finite()) {
            return Err(CwBoostError::numerical("response contains non-finite values"));
        }
        Ok(truth.to_owned())
    }
}

/// Shared handle to a loss, used by the engine and the risk loggers.
pub type SharedLoss = Arc<dyn Loss>;

/// Built-in loss kinds that can be described by configuration.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum LossType {
    /// Squared error
    Quadratic,
    /// Absolute error
    Absolute,
    /// Quantile (pinball) loss with the given quantile
    Quantile(f64),
    /// Huber loss with the given delta
    Huber(f64),
    /// Binomial deviance
    Binomial,
}

/// Serializable description of a built-in loss.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LossConfig {
    /// Loss kind
    pub loss_type: LossType,
    /// Offset overriding the constant initializer
    pub custom_offset: Option<f64>,
}

impl LossConfig {
    /// Describe a loss without custom offset.
    pub fn new(loss_type: LossType) -> Self {
        LossConfig {
            loss_type,
            custom_offset: None,
        }
    }

    /// Set a custom offset.
    pub fn with_offset(mut self, offset: f64) -> Self {
        self.custom_offset = Some(offset);
        self
    }
}

impl Default for LossConfig {
    fn default() -> Self {
        LossConfig::new(LossType::Quadratic)
    }
}

/// Create a loss from its configuration.
pub fn create_loss(config: &LossConfig) -> Result<SharedLoss> {
    let loss: SharedLoss = match (config.loss_type, config.custom_offset) {
        (LossType::Quadratic, None) => Arc::new(QuadraticLoss::new()),
        (LossType::Quadratic, Some(o)) => Arc::new(QuadraticLoss::with_offset(o)?),
        (LossType::Absolute, None) => Arc::new(AbsoluteLoss::new()),
        (LossType::Absolute, Some(o)) => Arc::new(AbsoluteLoss::with_offset(o)?),
        (LossType::Quantile(q), None) => Arc::new(QuantileLoss::new(q)?),
        (LossType::Quantile(q), Some(o)) => Arc::new(QuantileLoss::new(q)?.with_offset(o)?),
        (LossType::Huber(d), None) => Arc::new(HuberLoss::new(d)?),
        (LossType::Huber(d), Some(o)) => Arc::new(HuberLoss::new(d)?.with_offset(o)?),
        (LossType::Binomial, None) => Arc::new(BinomialLoss::new()),
        (LossType::Binomial, Some(o)) => Arc::new(BinomialLoss::with_offset(o)),
    };
    Ok(loss)
}

/// Check that truth and prediction have the same length.
pub(crate) fn check_lengths(
    truth: &ArrayView1<'_, f64>,
    prediction: &ArrayView1<'_, f64>,
) -> Result<()> {
    if truth.len() != prediction.len() {
        return Err(CwBoostError::dimension_mismatch(
            format!("prediction of length {}", truth.len()),
            format!("length {}", prediction.len()),
        ));
    }
    Ok(())
}

/// Validate a custom offset value.
pub(crate) fn check_offset(offset: f64) -> Result<f64> {
    if !offset.is_finite() {
        return Err(CwBoostError::invalid_parameter(
            "custom_offset",
            offset.to_string(),
            "must be finite",
        ));
    }
    Ok(offset)
}
