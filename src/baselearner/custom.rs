//! Base learners built from user supplied functions.
//!
//! Two flavors exist. [`CustomFactory::new`] takes reference-counted closures
//! that may capture state. [`CustomFactory::native`] takes plain function
//! pointers. Both go through the same three hooks:
//!
//! - `instantiate(raw) -> basis`, called once for the training data and for
//!   every prediction on new data
//! - `train(residual, basis) -> parameter`
//! - `predict(basis, parameter) -> fitted values`
//!
//! The engine sums parameters of the same learner across iterations and calls
//! `predict` with the sum, so `predict` has to be linear in the parameter and
//! `train` has to return the same number of parameters on every call.

use crate::baselearner::{BaseLearner, BaseLearnerFactory};
use crate::core::error::{CwBoostError, Result};
use crate::core::types::{Matrix, Vector};
use crate::dataset::DataProvider;
use ndarray::ArrayView1;
use std::fmt;
use std::sync::{Arc, OnceLock};

/// Raw data to basis.
pub type CustomInstantiateFn = Arc<dyn Fn(&Matrix) -> Matrix + Send + Sync>;
/// Fit a parameter to a residual.
pub type CustomTrainFn = Arc<dyn Fn(&ArrayView1<'_, f64>, &Matrix) -> Vector + Send + Sync>;
/// Evaluate a parameter on a basis.
pub type CustomPredictFn = Arc<dyn Fn(&Matrix, &Vector) -> Vector + Send + Sync>;

/// Raw data to basis.
pub type NativeInstantiateFn = fn(&Matrix) -> Matrix;
/// Fit a parameter to a residual.
pub type NativeTrainFn = fn(&ArrayView1<'_, f64>, &Matrix) -> Vector;
/// Evaluate a parameter on a basis.
pub type NativePredictFn = fn(&Matrix, &Vector) -> Vector;

enum CustomFunctions {
    Closures {
        instantiate: CustomInstantiateFn,
        train: CustomTrainFn,
        predict: CustomPredictFn,
    },
    Native {
        instantiate: NativeInstantiateFn,
        train: NativeTrainFn,
        predict: NativePredictFn,
    },
}

impl CustomFunctions {
    fn instantiate(&self, raw: &Matrix) -> Matrix {
        match self {
            CustomFunctions::Closures { instantiate, .. } => instantiate(raw),
            CustomFunctions::Native { instantiate, .. } => instantiate(raw),
        }
    }

    fn train(&self, residual: &ArrayView1<'_, f64>, basis: &Matrix) -> Vector {
        match self {
            CustomFunctions::Closures { train, .. } => train(residual, basis),
            CustomFunctions::Native { train, .. } => train(residual, basis),
        }
    }

    fn predict(&self, basis: &Matrix, parameter: &Vector) -> Vector {
        match self {
            CustomFunctions::Closures { predict, .. } => predict(basis, parameter),
            CustomFunctions::Native { predict, .. } => predict(basis, parameter),
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            CustomFunctions::Closures { .. } => "closures",
            CustomFunctions::Native { .. } => "native",
        }
    }

    fn checked_predict(&self, learner: &str, basis: &Matrix, parameter: &Vector) -> Result<Vector> {
        let fitted = self.predict(basis, parameter);
        if fitted.len() != basis.nrows() {
            return Err(CwBoostError::custom_function(
                format!("{learner}::predict"),
                format!(
                    "returned {} values for a basis with {} rows",
                    fitted.len(),
                    basis.nrows()
                ),
            ));
        }
        Ok(fitted)
    }
}

impl fmt::Debug for CustomFunctions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CustomFunctions({})", self.kind())
    }
}

/// Factory for user-defined base learners.
#[derive(Debug, Clone)]
pub struct CustomFactory {
    data_identifier: String,
    learner_type: String,
    factory_id: String,
    functions: Arc<CustomFunctions>,
    design: Arc<Matrix>,
    parameter_len: Arc<OnceLock<usize>>,
}

impl CustomFactory {
    /// Factory from closures.
    pub fn new(
        data: &dyn DataProvider,
        key: &str,
        learner_type: &str,
        instantiate: CustomInstantiateFn,
        train: CustomTrainFn,
        predict: CustomPredictFn,
    ) -> Result<Self> {
        let functions = CustomFunctions::Closures {
            instantiate,
            train,
            predict,
        };
        Self::build(data, key, learner_type, functions)
    }

    /// Factory from plain function pointers.
    pub fn native(
        data: &dyn DataProvider,
        key: &str,
        learner_type: &str,
        instantiate: NativeInstantiateFn,
        train: NativeTrainFn,
        predict: NativePredictFn,
    ) -> Result<Self> {
        let functions = CustomFunctions::Native {
            instantiate,
            train,
            predict,
        };
        Self::build(data, key, learner_type, functions)
    }

    fn build(
        data: &dyn DataProvider,
        key: &str,
        learner_type: &str,
        functions: CustomFunctions,
    ) -> Result<Self> {
        if learner_type.is_empty() {
            return Err(CwBoostError::invalid_parameter(
                "learner_type",
                "\"\"",
                "custom learners need a non-empty type name",
            ));
        }
        let raw = data.get(key)?;
        let factory_id = format!("{key}_{learner_type}");
        let design = functions.instantiate(&raw);
        if design.nrows() != raw.nrows() {
            return Err(CwBoostError::custom_function(
                format!("{factory_id}::instantiate"),
                format!(
                    "returned {} rows for {} observations",
                    design.nrows(),
                    raw.nrows()
                ),
            ));
        }

        Ok(CustomFactory {
            data_identifier: key.to_string(),
            learner_type: learner_type.to_string(),
            factory_id,
            functions: Arc::new(functions),
            design: Arc::new(design),
            parameter_len: Arc::new(OnceLock::new()),
        })
    }

    /// `true` for function-pointer factories.
    pub fn is_native(&self) -> bool {
        matches!(*self.functions, CustomFunctions::Native { .. })
    }

    /// Run `train` and `predict` once on a zero residual and check shapes.
    ///
    /// Returns the parameter length every later fit must have.
    fn validate_functions(&self) -> Result<usize> {
        let residual = Vector::zeros(self.design.nrows());
        let parameter = self.functions.train(&residual.view(), &self.design);
        self.functions
            .checked_predict(&self.factory_id, &self.design, &parameter)?;
        log::debug!(
            "validated custom learner '{}' ({} parameters, {})",
            self.factory_id,
            parameter.len(),
            self.functions.kind()
        );
        Ok(parameter.len())
    }

    fn expected_parameter_len(&self) -> Result<usize> {
        match self.parameter_len.get() {
            Some(&len) => Ok(len),
            None => {
                let len = self.validate_functions()?;
                Ok(*self.parameter_len.get_or_init(|| len))
            }
        }
    }
}

impl BaseLearnerFactory for CustomFactory {
    fn factory_id(&self) -> &str {
        &self.factory_id
    }

    fn learner_type(&self) -> &str {
        &self.learner_type
    }

    fn data_identifier(&self) -> &str {
        &self.data_identifier
    }

    fn data(&self) -> &Arc<Matrix> {
        &self.design
    }

    fn create_baselearner(&self, residual: &ArrayView1<'_, f64>) -> Result<Box<dyn BaseLearner>> {
        let expected = self.expected_parameter_len()?;
        let parameter = self.functions.train(residual, &self.design);
        if parameter.len() != expected {
            return Err(CwBoostError::custom_function(
                format!("{}::train", self.factory_id),
                format!(
                    "returned {} parameters, earlier fits returned {}",
                    parameter.len(),
                    expected
                ),
            ));
        }
        if parameter.iter().any(|v| !v.is_finite()) {
            return Err(CwBoostError::degenerate_fit(
                self.factory_id.as_str(),
                "custom train returned non-finite parameters",
            ));
        }
        Ok(Box::new(CustomBaseLearner {
            identifier: self.factory_id.clone(),
            design: Arc::clone(&self.design),
            parameter,
            functions: Arc::clone(&self.functions),
        }))
    }

    fn instantiate_data(&self, raw: &Matrix) -> Result<Matrix> {
        let basis = self.functions.instantiate(raw);
        if basis.nrows() != raw.nrows() {
            return Err(CwBoostError::custom_function(
                format!("{}::instantiate", self.factory_id),
                format!("returned {} rows for {} observations", basis.nrows(), raw.nrows()),
            ));
        }
        Ok(basis)
    }

    fn linear_predictor(&self, basis: &Matrix, parameter: &Vector) -> Result<Vector> {
        self.functions
            .checked_predict(&self.factory_id, basis, parameter)
    }
}

/// Learner fitted by a [`CustomFactory`].
#[derive(Debug, Clone)]
struct CustomBaseLearner {
    identifier: String,
    design: Arc<Matrix>,
    parameter: Vector,
    functions: Arc<CustomFunctions>,
}

impl BaseLearner for CustomBaseLearner {
    fn identifier(&self) -> &str {
        &self.identifier
    }

    fn parameter(&self) -> &Vector {
        &self.parameter
    }

    fn predict(&self) -> Result<Vector> {
        self.functions
            .checked_predict(&self.identifier, &self.design, &self.parameter)
    }

    fn clone_box(&self) -> Box<dyn BaseLearner> {
        Box::new(self.clone())
    }
}
