//! Penalized B-spline (P-spline) base learner.

use crate::baselearner::splines::{clamp_to_range, create_knots, create_spline_basis};
use crate::baselearner::{
    single_column, BaseLearner, BaseLearnerFactory, LinearBaseLearner, NormalEquations,
};
use crate::config::PSplineConfig;
use crate::core::error::Result;
use crate::core::linalg;
use crate::core::types::{Matrix, Vector};
use crate::dataset::DataProvider;
use ndarray::ArrayView1;
use std::sync::Arc;

/// Factory for P-spline learners on a single feature.
///
/// Knots are equidistant over the observed range and the fit solves
/// `(BᵗB + λ DᵗD) β = Bᵗr` with a difference penalty of order
/// `config.differences`. With `config.df > 0` the smoothing parameter λ is
/// chosen so that the smoother has that many effective degrees of freedom.
/// New data is clamped to the training range.
#[derive(Debug, Clone)]
pub struct PSplineFactory {
    data_identifier: String,
    learner_type: String,
    factory_id: String,
    config: PSplineConfig,
    knots: Vector,
    range: (f64, f64),
    penalty: f64,
    design: Arc<Matrix>,
    solver: NormalEquations,
}

impl PSplineFactory {
    /// Build the spline basis of the column stored under `key`.
    pub fn new(data: &dyn DataProvider, key: &str, config: PSplineConfig) -> Result<Self> {
        config.validate()?;
        let raw = data.get(key)?;
        let learner_type = format!("spline_degree_{}", config.degree);
        let factory_id = format!("{key}_{learner_type}");

        let x = single_column(key, &raw)?;
        let min = x.iter().copied().fold(f64::INFINITY, f64::min);
        let max = x.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let knots = create_knots(min, max, config.n_knots, config.degree)?;
        let design = create_spline_basis(&x.view(), config.degree, &knots)?;

        let difference = linalg::difference_penalty(design.ncols(), config.differences)?;
        let gram = linalg::gram(&design.view());
        let penalty = if config.df > 0.0 {
            linalg::penalty_from_df(&gram.view(), &difference.view(), config.df)?
        } else {
            config.penalty
        };
        let system = gram + difference * penalty;
        let solver = NormalEquations::new(&system);
        if solver.is_degenerate() {
            log::warn!(
                "base learner '{}' has a singular penalized system, consider a larger penalty",
                factory_id
            );
        }

        log::debug!(
            "built '{}' with {} basis functions over [{}, {}], penalty {}",
            factory_id,
            design.ncols(),
            min,
            max,
            penalty
        );

        Ok(PSplineFactory {
            data_identifier: key.to_string(),
            learner_type,
            factory_id,
            config,
            knots,
            range: (min, max),
            penalty,
            design: Arc::new(design),
            solver,
        })
    }

    /// Full knot sequence including the boundary extension.
    pub fn knots(&self) -> &Vector {
        &self.knots
    }

    /// Observed `(min, max)` of the training feature.
    pub fn range(&self) -> (f64, f64) {
        self.range
    }

    /// Settings this factory was built with.
    pub fn config(&self) -> &PSplineConfig {
        &self.config
    }

    /// Smoothing parameter λ used by the fits.
    pub fn penalty(&self) -> f64 {
        self.penalty
    }
}

impl BaseLearnerFactory for PSplineFactory {
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
        let (min, max) = self.range;
        let clamped = clamp_to_range(&x.view(), min, max);
        create_spline_basis(&clamped.view(), self.config.degree, &self.knots)
    }
}
