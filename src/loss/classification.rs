//! Binomial loss for binary classification.

use crate::core::error::{CwBoostError, Result};
use crate::core::stats;
use crate::core::types::Vector;
use crate::loss::{check_lengths, Loss, TaskType};
use ndarray::{ArrayView1, Zip};

/// Binomial deviance `log(1 + exp(-2 y f))` for labels `y` in `{-1, 1}`.
///
/// Scores live on the half log-odds scale, so the response transform is
/// `1 / (1 + exp(-2 f))`.
#[derive(Debug, Clone, Default)]
pub struct BinomialLoss {
    custom_offset: Option<f64>,
}

impl BinomialLoss {
    /// Binomial loss initialized with the half log-odds of the positive class.
    pub fn new() -> Self {
        Self::default()
    }

    /// Binomial loss with a fixed offset.
    ///
    /// Offsets outside `[-1, 1]` are ignored with a warning and the default
    /// initializer is used instead.
    pub fn with_offset(offset: f64) -> Self {
        if offset.is_finite() && (-1.0..=1.0).contains(&offset) {
            BinomialLoss {
                custom_offset: Some(offset),
            }
        } else {
            log::warn!(
                "binomial offset {} is outside [-1, 1], using the log-odds initializer",
                offset
            );
            BinomialLoss::default()
        }
    }

    /// Offset passed at construction, if accepted.
    pub fn custom_offset(&self) -> Option<f64> {
        self.custom_offset
    }
}

impl Loss for BinomialLoss {
    fn name(&self) -> &str {
        "binomial"
    }

    fn task(&self) -> TaskType {
        TaskType::BinaryClassification
    }

    fn evaluate(&self, truth: &ArrayView1<'_, f64>, prediction: &ArrayView1<'_, f64>) -> Result<Vector> {
        check_lengths(truth, prediction)?;
        Ok(Zip::from(truth)
            .and(prediction)
            .map_collect(|&y, &f| softplus(-2.0 * y * f)))
    }

    fn gradient(&self, truth: &ArrayView1<'_, f64>, prediction: &ArrayView1<'_, f64>) -> Result<Vector> {
        check_lengths(truth, prediction)?;
        Ok(Zip::from(truth)
            .and(prediction)
            .map_collect(|&y, &f| -2.0 * y * stats::sigmoid(-2.0 * y * f)))
    }

    fn constant_initializer(&self, truth: &ArrayView1<'_, f64>) -> Result<f64> {
        if let Some(offset) = self.custom_offset {
            return Ok(offset);
        }
        if truth.is_empty() {
            return Err(CwBoostError::numerical("offset of an empty response"));
        }
        let positives = truth.iter().filter(|&&y| y > 0.0).count();
        let p = positives as f64 / truth.len() as f64;
        if positives == 0 || positives == truth.len() {
            return Err(CwBoostError::numerical(format!(
                "log-odds offset undefined for a response with only one class (p = {p})"
            )));
        }
        Ok(0.5 * (p / (1.0 - p)).ln())
    }

    fn response_transform(&self, scores: &ArrayView1<'_, f64>) -> Vector {
        scores.mapv(|f| stats::sigmoid(2.0 * f))
    }

    fn prepare_response(&self, truth: &ArrayView1<'_, f64>) -> Result<Vector> {
        if truth.is_empty() {
            return Err(CwBoostError::config("response must not be empty"));
        }
        let plus_minus = truth.iter().all(|&y| y == 1.0 || y == -1.0);
        if plus_minus {
            return Ok(truth.to_owned());
        }
        let zero_one = truth.iter().all(|&y| y == 0.0 || y == 1.0);
        if zero_one {
            log::debug!("re-encoding {{0, 1}} labels as {{-1, 1}}");
            return Ok(truth.mapv(|y| 2.0 * y - 1.0));
        }
        Err(CwBoostError::invalid_parameter(
            "response",
            "non-binary labels",
            "binomial loss needs labels in {-1, 1} or {0, 1}",
        ))
    }
}

/// `log(1 + exp(x))` without overflow.
fn softplus(x: f64) -> f64 {
    if x > 0.0 {
        x + (-x).exp().ln_1p()
    } else {
        x.exp().ln_1p()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    #[test]
    fn test_binomial_initializer_is_half_log_odds() {
        let loss = BinomialLoss::new();
        let y = array![1.0, 1.0, 1.0, -1.0];
        let offset = loss.constant_initializer(&y.view()).unwrap();
        assert_abs_diff_eq!(offset, 0.5 * 3.0_f64.ln(), epsilon = 1e-12);
        let p = loss.response_transform(&array![offset].view());
        assert_abs_diff_eq!(p[0], 0.75, epsilon = 1e-12);
    }

    #[test]
    fn test_binomial_gradient_is_derivative() {
        let loss = BinomialLoss::new();
        let y = array![1.0, -1.0, 1.0];
        let f = array![0.3, -0.7, -1.2];
        let g = loss.gradient(&y.view(), &f.view()).unwrap();
        let h = 1e-6;
        for i in 0..3 {
            let mut up = f.clone();
            let mut down = f.clone();
            up[i] += h;
            down[i] -= h;
            let lu = loss.evaluate(&y.view(), &up.view()).unwrap()[i];
            let ld = loss.evaluate(&y.view(), &down.view()).unwrap()[i];
            assert_abs_diff_eq!(g[i], (lu - ld) / (2.0 * h), epsilon = 1e-6);
        }
    }

    #[test]
    fn test_binomial_prepare_response() {
        let loss = BinomialLoss::new();
        let encoded = loss.prepare_response(&array![0.0, 1.0, 1.0].view()).unwrap();
        assert_eq!(encoded, array![-1.0, 1.0, 1.0]);
        let kept = loss.prepare_response(&array![-1.0, 1.0].view()).unwrap();
        assert_eq!(kept, array![-1.0, 1.0]);
        assert!(loss.prepare_response(&array![0.0, 2.0].view()).is_err());
    }

    #[test]
    fn test_binomial_offset_range() {
        assert_eq!(BinomialLoss::with_offset(0.25).custom_offset(), Some(0.25));
        assert_eq!(BinomialLoss::with_offset(3.0).custom_offset(), None);
    }

    #[test]
    fn test_binomial_single_class_fails() {
        let loss = BinomialLoss::new();
        assert!(loss.constant_initializer(&array![1.0, 1.0].view()).is_err());
    }

    #[test]
    fn test_softplus_is_stable() {
        assert_abs_diff_eq!(softplus(0.0), 2.0_f64.ln());
        assert!(softplus(800.0).is_finite());
        assert!(softplus(-800.0) >= 0.0);
    }
}
