//! Loss assembled from externally supplied functions.

use crate::core::error::{CwBoostError, Result};
use crate::core::types::Vector;
use crate::loss::{check_lengths, Loss, TaskType};
use ndarray::{array, ArrayView1};
use std::fmt;
use std::sync::Arc;

/// Point-wise loss `(truth, prediction) -> loss`.
pub type LossFn = Arc<dyn Fn(&ArrayView1<'_, f64>, &ArrayView1<'_, f64>) -> Vector + Send + Sync>;

/// Point-wise gradient `(truth, prediction) -> dL/df`.
pub type GradientFn =
    Arc<dyn Fn(&ArrayView1<'_, f64>, &ArrayView1<'_, f64>) -> Vector + Send + Sync>;

/// Constant initializer `truth -> offset`.
pub type ConstantInitFn = Arc<dyn Fn(&ArrayView1<'_, f64>) -> f64 + Send + Sync>;

/// User-defined loss.
///
/// The three functions are called once at construction with a short dummy
/// response. The loss and gradient must return vectors of matching length and
/// the initializer a finite offset. Every later call is checked again for
/// length and finiteness.
#[derive(Clone)]
pub struct CustomLoss {
    name: String,
    loss: LossFn,
    gradient: GradientFn,
    initializer: ConstantInitFn,
}

impl CustomLoss {
    /// Wrap the three functions into a loss, failing fast on shape mismatches.
    pub fn new<S: Into<String>>(
        name: S,
        loss: LossFn,
        gradient: GradientFn,
        initializer: ConstantInitFn,
    ) -> Result<Self> {
        let custom = CustomLoss {
            name: name.into(),
            loss,
            gradient,
            initializer,
        };
        custom.check_functions()?;
        Ok(custom)
    }

    fn check_functions(&self) -> Result<()> {
        let truth = array![1.0, -1.0, 1.0];
        let prediction = array![0.5, 0.0, -0.5];
        let (t, p) = (truth.view(), prediction.view());

        let loss = (self.loss)(&t, &p);
        if loss.len() != truth.len() {
            return Err(self.shape_error("loss", truth.len(), loss.len()));
        }
        let gradient = (self.gradient)(&t, &p);
        if gradient.len() != truth.len() {
            return Err(self.shape_error("gradient", truth.len(), gradient.len()));
        }
        self.constant_initializer(&t)?;
        Ok(())
    }

    fn shape_error(&self, function: &str, expected: usize, actual: usize) -> CwBoostError {
        CwBoostError::custom_function(
            format!("{}::{}", self.name, function),
            format!("returned {actual} values for an input of length {expected}"),
        )
    }

    fn checked(&self, function: &str, expected: usize, values: Vector) -> Result<Vector> {
        if values.len() != expected {
            return Err(self.shape_error(function, expected, values.len()));
        }
        if values.iter().any(|v| !v.is_finite()) {
            return Err(CwBoostError::custom_function(
                format!("{}::{}", self.name, function),
                "returned non-finite values",
            ));
        }
        Ok(values)
    }
}

impl fmt::Debug for CustomLoss {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CustomLoss").field("name", &self.name).finish()
    }
}

impl Loss for CustomLoss {
    fn name(&self) -> &str {
        &self.name
    }

    fn task(&self) -> TaskType {
        TaskType::Custom
    }

    fn evaluate(&self, truth: &ArrayView1<'_, f64>, prediction: &ArrayView1<'_, f64>) -> Result<Vector> {
        check_lengths(truth, prediction)?;
        self.checked("loss", truth.len(), (self.loss)(truth, prediction))
    }

    fn gradient(&self, truth: &ArrayView1<'_, f64>, prediction: &ArrayView1<'_, f64>) -> Result<Vector> {
        check_lengths(truth, prediction)?;
        self.checked("gradient", truth.len(), (self.gradient)(truth, prediction))
    }

    fn constant_initializer(&self, truth: &ArrayView1<'_, f64>) -> Result<f64> {
        let offset = (self.initializer)(truth);
        if !offset.is_finite() {
            return Err(CwBoostError::custom_function(
                format!("{}::initializer", self.name),
                format!("returned {offset}"),
            ));
        }
        Ok(offset)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loss::QuadraticLoss;
    use approx::assert_abs_diff_eq;
    use ndarray::{Array1, Zip};

    fn half_squares(y: &ArrayView1<'_, f64>, f: &ArrayView1<'_, f64>) -> Vector {
        Zip::from(y).and(f).map_collect(|&y, &f| 0.5 * (y - f).powi(2))
    }

    fn differences(y: &ArrayView1<'_, f64>, f: &ArrayView1<'_, f64>) -> Vector {
        Zip::from(y).and(f).map_collect(|&y, &f| f - y)
    }

    fn average(y: &ArrayView1<'_, f64>) -> f64 {
        y.mean().unwrap_or(0.0)
    }

    fn single_value(_: &ArrayView1<'_, f64>, _: &ArrayView1<'_, f64>) -> Vector {
        Array1::zeros(1)
    }

    fn nan_above_five(y: &ArrayView1<'_, f64>, _: &ArrayView1<'_, f64>) -> Vector {
        y.mapv(|v| if v > 5.0 { f64::NAN } else { v })
    }

    fn undefined_offset(_: &ArrayView1<'_, f64>) -> f64 {
        f64::NAN
    }

    fn quadratic_parts() -> (LossFn, GradientFn, ConstantInitFn) {
        (Arc::new(half_squares), Arc::new(differences), Arc::new(average))
    }

    #[test]
    fn test_custom_loss_matches_builtin() {
        let (l, g, i) = quadratic_parts();
        let custom = CustomLoss::new("my_quadratic", l, g, i).unwrap();
        let builtin = QuadraticLoss::new();
        let y = array![1.0, 4.0, -2.0];
        let f = array![0.0, 1.0, 1.0];
        assert_eq!(
            custom.gradient(&y.view(), &f.view()).unwrap(),
            builtin.gradient(&y.view(), &f.view()).unwrap()
        );
        assert_abs_diff_eq!(
            custom.constant_initializer(&y.view()).unwrap(),
            builtin.constant_initializer(&y.view()).unwrap()
        );
        assert_eq!(custom.task(), TaskType::Custom);
    }

    #[test]
    fn test_custom_loss_rejects_bad_shape_at_construction() {
        let (l, _, i) = quadratic_parts();
        let bad_gradient: GradientFn = Arc::new(single_value);
        let result = CustomLoss::new("broken", l, bad_gradient, i);
        assert!(matches!(result, Err(CwBoostError::CustomFunction { .. })));
    }

    #[test]
    fn test_custom_loss_rejects_non_finite_offset_at_construction() {
        let (l, g, _) = quadratic_parts();
        let bad_init: ConstantInitFn = Arc::new(undefined_offset);
        match CustomLoss::new("no_offset", l, g, bad_init) {
            Err(CwBoostError::CustomFunction { function, .. }) => {
                assert_eq!(function, "no_offset::initializer");
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn test_custom_loss_rejects_non_finite_values() {
        let (_, g, i) = quadratic_parts();
        let nan_loss: LossFn = Arc::new(nan_above_five);
        let custom = CustomLoss::new("nan", nan_loss, g, i).unwrap();
        let y = array![10.0];
        let f = array![0.0];
        assert!(custom.evaluate(&y.view(), &f.view()).is_err());
    }
}
