//! Polynomial base learner.

use crate::baselearner::{
    single_column, BaseLearner, BaseLearnerFactory, LinearBaseLearner, NormalEquations,
};
use crate::config::PolynomialConfig;
use crate::core::error::Result;
use crate::core::linalg;
use crate::core::types::Matrix;
use crate::dataset::DataProvider;
use ndarray::{Array2, ArrayView1};
use std::sync::Arc;

/// Factory for polynomial learners on a single feature.
///
/// The basis holds an optional constant column followed by the powers
/// `x, x^2, ..., x^degree`. Fits are (ridge-penalized) least squares. With
/// `config.df > 0` the ridge penalty is chosen so that the smoother has that
/// many effective degrees of freedom.
#[derive(Debug, Clone)]
pub struct PolynomialFactory {
    data_identifier: String,
    learner_type: String,
    factory_id: String,
    config: PolynomialConfig,
    penalty: f64,
    design: Arc<Matrix>,
    solver: NormalEquations,
}

impl PolynomialFactory {
    /// Build the polynomial basis of the column stored under `key`.
    pub fn new(data: &dyn DataProvider, key: &str, config: PolynomialConfig) -> Result<Self> {
        config.validate()?;
        let raw = data.get(key)?;
        let learner_type = format!("polynomial_degree_{}", config.degree);
        let factory_id = format!("{key}_{learner_type}");

        let x = single_column(key, &raw)?;
        let design = polynomial_basis(&x.view(), config.degree, config.intercept);

        let mut system = linalg::gram(&design.view());
        let penalty = if config.df > 0.0 {
            let identity = Array2::eye(design.ncols());
            linalg::penalty_from_df(&system.view(), &identity.view(), config.df)?
        } else {
            config.penalty
        };
        if penalty > 0.0 {
            system.diag_mut().mapv_inplace(|d| d + penalty);
        }
        let solver = NormalEquations::new(&system);
        if solver.is_degenerate() {
            log::warn!("base learner '{}' has a singular design matrix", factory_id);
        }

        Ok(PolynomialFactory {
            data_identifier: key.to_string(),
            learner_type,
            factory_id,
            config,
            penalty,
            design: Arc::new(design),
            solver,
        })
    }

    /// Settings this factory was built with.
    pub fn config(&self) -> &PolynomialConfig {
        &self.config
    }

    /// Ridge penalty used by the fits, derived from `df` when set.
    pub fn penalty(&self) -> f64 {
        self.penalty
    }
}

fn polynomial_basis(x: &ArrayView1<'_, f64>, degree: usize, intercept: bool) -> Matrix {
    let shift = usize::from(intercept);
    Array2::from_shape_fn((x.len(), degree + shift), |(i, j)| {
        let power = j + 1 - shift;
        x[i].powi(power as i32)
    })
}

impl BaseLearnerFactory for PolynomialFactory {
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
        let parameter = self.solver.solve(&self.factory_id, &self.design, residual)?;
        Ok(Box::new(LinearBaseLearner::new(
            self.factory_id.clone(),
            Arc::clone(&self.design),
            parameter,
        )))
    }

    fn instantiate_data(&self, raw: &Matrix) -> Result<Matrix> {
        let x = single_column(&self.data_identifier, raw)?;
        Ok(polynomial_basis(&x.view(), self.config.degree, self.config.intercept))
    }
}

/// Basis column names, `intercept` first when present.
pub fn parameter_names(config: &PolynomialConfig) -> Vec<String> {
    let mut names = Vec::with_capacity(config.degree + 1);
    if config.intercept {
        names.push("intercept".to_string());
    }
    names.extend((1..=config.degree).map(|p| format!("x^{p}")));
    names
}
