//! Regression losses: quadratic, absolute, quantile and Huber.

use crate::core::error::{CwBoostError, Result};
use crate::core::stats;
use crate::core::types::Vector;
use crate::loss::{check_lengths, check_offset, Loss, TaskType};
use ndarray::{ArrayView1, Zip};

/// Squared error `(y - f)^2 / 2`.
#[derive(Debug, Clone, Default)]
pub struct QuadraticLoss {
    custom_offset: Option<f64>,
}

impl QuadraticLoss {
    /// Quadratic loss initialized with the mean of the response.
    pub fn new() -> Self {
        Self::default()
    }

    /// Quadratic loss with a fixed offset.
    pub fn with_offset(offset: f64) -> Result<Self> {
        Ok(QuadraticLoss {
            custom_offset: Some(check_offset(offset)?),
        })
    }
}

impl Loss for QuadraticLoss {
    fn name(&self) -> &str {
        "quadratic"
    }

    fn task(&self) -> TaskType {
        TaskType::Regression
    }

    fn evaluate(&self, truth: &ArrayView1<'_, f64>, prediction: &ArrayView1<'_, f64>) -> Result<Vector> {
        check_lengths(truth, prediction)?;
        Ok(Zip::from(truth)
            .and(prediction)
            .map_collect(|&y, &f| 0.5 * (y - f).powi(2)))
    }

    fn gradient(&self, truth: &ArrayView1<'_, f64>, prediction: &ArrayView1<'_, f64>) -> Result<Vector> {
        check_lengths(truth, prediction)?;
        Ok(Zip::from(truth).and(prediction).map_collect(|&y, &f| f - y))
    }

    fn constant_initializer(&self, truth: &ArrayView1<'_, f64>) -> Result<f64> {
        match self.custom_offset {
            Some(offset) => Ok(offset),
            None => stats::mean(truth),
        }
    }
}

/// Absolute error `|y - f|`.
#[derive(Debug, Clone, Default)]
pub struct AbsoluteLoss {
    custom_offset: Option<f64>,
}

impl AbsoluteLoss {
    /// Absolute loss initialized with the median of the response.
    pub fn new() -> Self {
        Self::default()
    }

    /// Absolute loss with a fixed offset.
    pub fn with_offset(offset: f64) -> Result<Self> {
        Ok(AbsoluteLoss {
            custom_offset: Some(check_offset(offset)?),
        })
    }
}

impl Loss for AbsoluteLoss {
    fn name(&self) -> &str {
        "absolute"
    }

    fn task(&self) -> TaskType {
        TaskType::Regression
    }

    fn evaluate(&self, truth: &ArrayView1<'_, f64>, prediction: &ArrayView1<'_, f64>) -> Result<Vector> {
        check_lengths(truth, prediction)?;
        Ok(Zip::from(truth).and(prediction).map_collect(|&y, &f| (y - f).abs()))
    }

    fn gradient(&self, truth: &ArrayView1<'_, f64>, prediction: &ArrayView1<'_, f64>) -> Result<Vector> {
        check_lengths(truth, prediction)?;
        Ok(Zip::from(truth)
            .and(prediction)
            .map_collect(|&y, &f| -sign(y - f)))
    }

    fn constant_initializer(&self, truth: &ArrayView1<'_, f64>) -> Result<f64> {
        match self.custom_offset {
            Some(offset) => Ok(offset),
            None => stats::median(truth),
        }
    }
}

/// Pinball loss for quantile `q`.
///
/// Residuals above the prediction are weighted with `2q`, residuals below with
/// `2(1 - q)`, so `q = 0.5` coincides with [`AbsoluteLoss`].
#[derive(Debug, Clone)]
pub struct QuantileLoss {
    quantile: f64,
    custom_offset: Option<f64>,
}

impl QuantileLoss {
    /// Quantile loss for `q` in `[0, 1]`.
    pub fn new(quantile: f64) -> Result<Self> {
        if !(0.0..=1.0).contains(&quantile) {
            return Err(CwBoostError::invalid_parameter(
                "quantile",
                quantile.to_string(),
                "must be in [0, 1]",
            ));
        }
        Ok(QuantileLoss {
            quantile,
            custom_offset: None,
        })
    }

    /// Replace the initializer with a fixed offset.
    pub fn with_offset(mut self, offset: f64) -> Result<Self> {
        self.custom_offset = Some(check_offset(offset)?);
        Ok(self)
    }

    /// Target quantile.
    pub fn quantile(&self) -> f64 {
        self.quantile
    }

    fn weight(&self, residual: f64) -> f64 {
        if residual >= 0.0 {
            2.0 * self.quantile
        } else {
            2.0 * (1.0 - self.quantile)
        }
    }
}

impl Loss for QuantileLoss {
    fn name(&self) -> &str {
        "quantile"
    }

    fn task(&self) -> TaskType {
        TaskType::Regression
    }

    fn evaluate(&self, truth: &ArrayView1<'_, f64>, prediction: &ArrayView1<'_, f64>) -> Result<Vector> {
        check_lengths(truth, prediction)?;
        Ok(Zip::from(truth).and(prediction).map_collect(|&y, &f| {
            let r = y - f;
            r.abs() * self.weight(r)
        }))
    }

    fn gradient(&self, truth: &ArrayView1<'_, f64>, prediction: &ArrayView1<'_, f64>) -> Result<Vector> {
        check_lengths(truth, prediction)?;
        Ok(Zip::from(truth).and(prediction).map_collect(|&y, &f| {
            let r = y - f;
            -sign(r) * self.weight(r)
        }))
    }

    fn constant_initializer(&self, truth: &ArrayView1<'_, f64>) -> Result<f64> {
        match self.custom_offset {
            Some(offset) => Ok(offset),
            None => stats::quantile(truth, self.quantile),
        }
    }
}

/// Huber loss with threshold `delta`.
///
/// `(y - f)^2 / 2` for `|y - f| < delta`, `delta * (|y - f| - delta / 2)` otherwise.
#[derive(Debug, Clone)]
pub struct HuberLoss {
    delta: f64,
    custom_offset: Option<f64>,
}

impl HuberLoss {
    /// Huber loss for a positive `delta`.
    pub fn new(delta: f64) -> Result<Self> {
        if !(delta.is_finite() && delta > 0.0) {
            return Err(CwBoostError::invalid_parameter(
                "delta",
                delta.to_string(),
                "must be positive and finite",
            ));
        }
        Ok(HuberLoss {
            delta,
            custom_offset: None,
        })
    }

    /// Replace the initializer with a fixed offset.
    pub fn with_offset(mut self, offset: f64) -> Result<Self> {
        self.custom_offset = Some(check_offset(offset)?);
        Ok(self)
    }

    /// Threshold between quadratic and linear regime.
    pub fn delta(&self) -> f64 {
        self.delta
    }

    fn point_loss(&self, y: f64, f: f64) -> f64 {
        let r = (y - f).abs();
        if r < self.delta {
            0.5 * r * r
        } else {
            self.delta * (r - 0.5 * self.delta)
        }
    }
}

impl Loss for HuberLoss {
    fn name(&self) -> &str {
        "huber"
    }

    fn task(&self) -> TaskType {
        TaskType::Regression
    }

    fn evaluate(&self, truth: &ArrayView1<'_, f64>, prediction: &ArrayView1<'_, f64>) -> Result<Vector> {
        check_lengths(truth, prediction)?;
        Ok(Zip::from(truth)
            .and(prediction)
            .map_collect(|&y, &f| self.point_loss(y, f)))
    }

    fn gradient(&self, truth: &ArrayView1<'_, f64>, prediction: &ArrayView1<'_, f64>) -> Result<Vector> {
        check_lengths(truth, prediction)?;
        Ok(Zip::from(truth).and(prediction).map_collect(|&y, &f| {
            let r = y - f;
            if r.abs() < self.delta {
                -r
            } else {
                -self.delta * sign(r)
            }
        }))
    }

    fn constant_initializer(&self, truth: &ArrayView1<'_, f64>) -> Result<f64> {
        if let Some(offset) = self.custom_offset {
            return Ok(offset);
        }
        if truth.is_empty() {
            return Err(CwBoostError::numerical("offset of an empty response"));
        }
        let lower = truth.iter().copied().fold(f64::INFINITY, f64::min);
        let upper = truth.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let risk = |c: f64| truth.iter().map(|&y| self.point_loss(y, c)).sum::<f64>();
        Ok(stats::golden_section_minimize(risk, lower, upper))
    }
}

fn sign(x: f64) -> f64 {
    if x > 0.0 {
        1.0
    } else if x < 0.0 {
        -1.0
    } else {
        0.0
    }
}
