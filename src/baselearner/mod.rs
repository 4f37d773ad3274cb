//! Base learners and the factories that create them.
//!
//! A [`BaseLearnerFactory`] is bound to one data key. At construction it turns
//! the raw data of that key into a basis (polynomial powers, B-splines, class
//! dummies or a user-defined representation) and caches everything a fit needs. Each
//! iteration the optimizer asks every factory for a fresh [`BaseLearner`]
//! fitted to the current pseudo residuals.
//!
//! Identifiers have the form `"{data_key}_{learner_type}"`, e.g.
//! `x1_spline_degree_3`. The track groups contributions by this identifier.

pub mod categorical;
pub mod custom;
pub mod polynomial;
pub mod pspline;
pub mod registry;
pub mod splines;

pub use categorical::{CategoricalBinaryFactory, CategoricalRidgeFactory};
pub use custom::{
    CustomFactory, CustomInstantiateFn, CustomPredictFn, CustomTrainFn, NativeInstantiateFn,
    NativePredictFn, NativeTrainFn,
};
pub use polynomial::PolynomialFactory;
pub use pspline::PSplineFactory;
pub use registry::FactoryRegistry;

use crate::core::error::{CwBoostError, Result};
use crate::core::linalg::SpdSolver;
use crate::core::types::{Matrix, Vector};
use crate::dataset::NewData;
use ndarray::{ArrayView1, Zip};
use std::fmt::Debug;
use std::sync::Arc;

/// A fitted base learner.
pub trait BaseLearner: Send + Sync + Debug {
    /// Identifier shared with the factory that created this learner.
    fn identifier(&self) -> &str;

    /// Fitted parameter vector.
    fn parameter(&self) -> &Vector;

    /// Fitted values on the training basis.
    fn predict(&self) -> Result<Vector>;

    /// Sum of squared deviations between fitted values and `residual`.
    fn sse(&self, residual: &ArrayView1<'_, f64>) -> Result<f64> {
        let fitted = self.predict()?;
        if fitted.len() != residual.len() {
            return Err(CwBoostError::dimension_mismatch(
                format!("{} fitted values", residual.len()),
                fitted.len().to_string(),
            ));
        }
        Ok(Zip::from(&fitted)
            .and(residual)
            .fold(0.0, |acc, &f, &r| acc + (r - f) * (r - f)))
    }

    /// Clone into a new box.
    fn clone_box(&self) -> Box<dyn BaseLearner>;
}

impl Clone for Box<dyn BaseLearner> {
    fn clone(&self) -> Self {
        self.clone_box()
    }
}

/// Creates base learners bound to one cached basis.
pub trait BaseLearnerFactory: Send + Sync + Debug {
    /// Identifier of the created learners, `"{data_key}_{learner_type}"`.
    fn factory_id(&self) -> &str;

    /// Learner type, e.g. `polynomial_degree_2`.
    fn learner_type(&self) -> &str;

    /// Key of the raw data the basis was built from.
    fn data_identifier(&self) -> &str;

    /// Cached basis matrix of the training data.
    fn data(&self) -> &Arc<Matrix>;

    /// Fit a fresh learner to `residual`.
    fn create_baselearner(&self, residual: &ArrayView1<'_, f64>) -> Result<Box<dyn BaseLearner>>;

    /// Transform new raw data into this factory's basis.
    fn instantiate_data(&self, raw: &Matrix) -> Result<Matrix>;

    /// Look up this factory's key in `new_data` and transform it.
    ///
    /// Factories on categorical data override this to read label columns.
    fn instantiate_new_data(&self, new_data: &NewData) -> Result<Matrix> {
        let key = self.data_identifier();
        let raw = new_data.get(key).ok_or_else(|| {
            CwBoostError::unknown_identifier(format!(
                "new data is missing key '{key}' needed by '{}'",
                self.factory_id()
            ))
        })?;
        self.instantiate_data(raw)
    }

    /// Evaluate a (possibly accumulated) parameter on a basis.
    fn linear_predictor(&self, basis: &Matrix, parameter: &Vector) -> Result<Vector> {
        if basis.ncols() != parameter.len() {
            return Err(CwBoostError::dimension_mismatch(
                format!("{} basis columns", parameter.len()),
                basis.ncols().to_string(),
            ));
        }
        Ok(basis.dot(parameter))
    }
}

/// Learner whose prediction is `basis · parameter`.
#[derive(Debug, Clone)]
pub struct LinearBaseLearner {
    identifier: String,
    design: Arc<Matrix>,
    parameter: Vector,
}

impl LinearBaseLearner {
    pub(crate) fn new(identifier: String, design: Arc<Matrix>, parameter: Vector) -> Self {
        LinearBaseLearner {
            identifier,
            design,
            parameter,
        }
    }
}

impl BaseLearner for LinearBaseLearner {
    fn identifier(&self) -> &str {
        &self.identifier
    }

    fn parameter(&self) -> &Vector {
        &self.parameter
    }

    fn predict(&self) -> Result<Vector> {
        Ok(self.design.dot(&self.parameter))
    }

    fn clone_box(&self) -> Box<dyn BaseLearner> {
        Box::new(self.clone())
    }
}

/// Cached solver for `(XᵗX + λP) β = Xᵗr`.
///
/// The factorization is computed once per factory. A failed factorization is
/// kept as the reason so that every fit of a degenerate basis reports a
/// [`CwBoostError::DegenerateFit`] instead of aborting registration.
#[derive(Debug, Clone)]
pub(crate) struct NormalEquations {
    factor: std::result::Result<Arc<SpdSolver>, String>,
}

impl NormalEquations {
    pub(crate) fn new(system: &Matrix) -> Self {
        let factor = SpdSolver::factorize(&system.view())
            .map(Arc::new)
            .map_err(|e| e.to_string());
        NormalEquations { factor }
    }

    pub(crate) fn is_degenerate(&self) -> bool {
        self.factor.is_err()
    }

    pub(crate) fn solve(
        &self,
        learner: &str,
        design: &Matrix,
        residual: &ArrayView1<'_, f64>,
    ) -> Result<Vector> {
        let factor = self
            .factor
            .as_ref()
            .map_err(|reason| CwBoostError::degenerate_fit(learner, reason.clone()))?;
        if residual.len() != design.nrows() {
            return Err(CwBoostError::dimension_mismatch(
                format!("residual of length {}", design.nrows()),
                residual.len().to_string(),
            ));
        }
        let rhs = design.t().dot(residual);
        let parameter = factor
            .solve(&rhs.view())
            .map_err(|e| CwBoostError::degenerate_fit(learner, e.to_string()))?;
        if parameter.iter().any(|v| !v.is_finite()) {
            return Err(CwBoostError::degenerate_fit(
                learner,
                "solution contains non-finite values",
            ));
        }
        Ok(parameter)
    }
}

/// Extract the single column of a raw feature matrix.
pub(crate) fn single_column(key: &str, raw: &Matrix) -> Result<Vector> {
    if raw.ncols() != 1 {
        return Err(CwBoostError::dimension_mismatch(
            format!("one column for '{key}'"),
            format!("{} columns", raw.ncols()),
        ));
    }
    if raw.iter().any(|v| !v.is_finite()) {
        return Err(CwBoostError::numerical(format!(
            "data '{key}' contains non-finite values"
        )));
    }
    Ok(raw.column(0).to_owned())
}
