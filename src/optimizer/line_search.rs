//! Greedy selection followed by a line search on the step size.

use super::{GreedyOptimizer, Optimizer, Selection};
use crate::baselearner::FactoryRegistry;
use crate::config::BoostingConfig;
use crate::core::constants::DEFAULT_STEP_SIZE_RANGE;
use crate::core::error::{CwBoostError, Result};
use crate::core::stats::golden_section_minimize;
use crate::loss::Loss;
use ndarray::ArrayView1;

/// Component-wise selection with an optimal step size.
///
/// Candidates are ranked by [`GreedyOptimizer`]. The winner's fitted values
/// `f` are then scaled by the step `s` in `range` minimizing the empirical
/// risk of `prediction + s·f`, so the update is `learning_rate · s · f`.
#[derive(Debug, Clone)]
pub struct LineSearchOptimizer {
    inner: GreedyOptimizer,
    range: (f64, f64),
}

impl Default for LineSearchOptimizer {
    fn default() -> Self {
        LineSearchOptimizer {
            inner: GreedyOptimizer::new(),
            range: DEFAULT_STEP_SIZE_RANGE,
        }
    }
}

impl LineSearchOptimizer {
    /// Parallel greedy selection and the default step range.
    pub fn new() -> Self {
        Self::default()
    }

    /// Use `inner` to rank the candidates.
    pub fn with_inner(inner: GreedyOptimizer) -> Self {
        LineSearchOptimizer {
            inner,
            ..Self::default()
        }
    }

    /// Search the step size in `[lower, upper]`.
    pub fn with_range(self, lower: f64, upper: f64) -> Result<Self> {
        if !(lower.is_finite() && upper.is_finite() && lower < upper) {
            return Err(CwBoostError::invalid_parameter(
                "step_size_range",
                format!("[{lower}, {upper}]"),
                "bounds must be finite with lower < upper",
            ));
        }
        Ok(LineSearchOptimizer {
            range: (lower, upper),
            ..self
        })
    }

    /// Optimizer matching the parallelism settings of a configuration.
    pub fn from_config(config: &BoostingConfig) -> Result<Self> {
        Ok(Self::with_inner(GreedyOptimizer::from_config(config)?))
    }

    /// Interval searched for the step size.
    pub fn range(&self) -> (f64, f64) {
        self.range
    }
}

impl Optimizer for LineSearchOptimizer {
    fn name(&self) -> &str {
        "line_search"
    }

    fn select(
        &self,
        iteration: usize,
        residual: &ArrayView1<'_, f64>,
        registry: &FactoryRegistry,
    ) -> Result<Selection> {
        self.inner.select(iteration, residual, registry)
    }

    fn step_size(
        &self,
        loss: &dyn Loss,
        truth: &ArrayView1<'_, f64>,
        prediction: &ArrayView1<'_, f64>,
        fitted: &ArrayView1<'_, f64>,
    ) -> Result<f64> {
        if fitted.len() != prediction.len() {
            return Err(CwBoostError::dimension_mismatch(
                format!("{} fitted values", prediction.len()),
                fitted.len().to_string(),
            ));
        }
        let risk = |step: f64| -> Result<f64> {
            let mut candidate = prediction.to_owned();
            candidate.scaled_add(step, fitted);
            loss.empirical_risk(truth, &candidate.view())
        };
        // Surface loss errors once; inside the search they rank as infinite.
        risk(1.0)?;

        let (lower, upper) = self.range;
        let step = golden_section_minimize(
            |s| risk(s).ok().filter(|r| !r.is_nan()).unwrap_or(f64::INFINITY),
            lower,
            upper,
        );
        if !step.is_finite() {
            return Err(CwBoostError::numerical(format!(
                "line search returned step size {step}"
            )));
        }
        log::trace!("line search step size {:.6}", step);
        Ok(step)
    }
}
