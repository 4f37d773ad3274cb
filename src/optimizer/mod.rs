//! Candidate selection for one boosting iteration.
//!
//! The [`GreedyOptimizer`] fits one candidate per registered factory against
//! the current pseudo residuals and keeps the one with the smallest sum of
//! squared deviations. Fits are independent and may run on rayon threads; the
//! selection itself is a sequential pass in registration order, so the first
//! registered candidate wins ties.
//!
//! The [`LineSearchOptimizer`] selects the same way and then scales the
//! winner by the step size that minimizes the empirical risk.

pub mod line_search;

pub use line_search::LineSearchOptimizer;

use crate::baselearner::{BaseLearner, BaseLearnerFactory, FactoryRegistry};
use crate::config::BoostingConfig;
use crate::core::error::{CwBoostError, Result};
use crate::loss::Loss;
use ndarray::ArrayView1;
use rayon::prelude::*;
use std::fmt::Debug;
use std::sync::Arc;

/// Winner of one iteration.
#[derive(Debug)]
pub struct Selection {
    /// Fitted learner, unscaled
    pub learner: Box<dyn BaseLearner>,
    /// Sum of squared deviations from the residuals
    pub sse: f64,
    /// Ids of the candidates excluded because their fit failed
    pub excluded: Vec<String>,
}

/// Picks the base learner added in an iteration.
pub trait Optimizer: Send + Sync + Debug {
    /// Short name for logs and summaries.
    fn name(&self) -> &str;

    /// Fit all candidates of `registry` to `residual` and return the best one.
    ///
    /// Fails with [`CwBoostError::AllCandidatesFailed`] if no candidate could
    /// be fitted and [`CwBoostError::EmptyRegistry`] without candidates.
    fn select(
        &self,
        iteration: usize,
        residual: &ArrayView1<'_, f64>,
        registry: &FactoryRegistry,
    ) -> Result<Selection>;

    /// Factor applied to the selected learner on top of the learning rate.
    ///
    /// `fitted` holds the unscaled fitted values of the selected learner and
    /// `prediction` the training scores before the update.
    fn step_size(
        &self,
        _loss: &dyn Loss,
        _truth: &ArrayView1<'_, f64>,
        _prediction: &ArrayView1<'_, f64>,
        _fitted: &ArrayView1<'_, f64>,
    ) -> Result<f64> {
        Ok(1.0)
    }
}

/// Component-wise greedy selection by sum of squared errors.
#[derive(Debug, Clone)]
pub struct GreedyOptimizer {
    parallel: bool,
    pool: Option<Arc<rayon::ThreadPool>>,
}

impl Default for GreedyOptimizer {
    fn default() -> Self {
        GreedyOptimizer {
            parallel: true,
            pool: None,
        }
    }
}

impl GreedyOptimizer {
    /// Parallel fits on the global rayon pool.
    pub fn new() -> Self {
        Self::default()
    }

    /// Fit candidates one after another on the calling thread.
    pub fn sequential() -> Self {
        GreedyOptimizer {
            parallel: false,
            pool: None,
        }
    }

    /// Parallel fits on a dedicated pool with `num_threads` threads.
    pub fn with_threads(num_threads: usize) -> Result<Self> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(num_threads)
            .thread_name(|i| format!("cwboost-fit-{i}"))
            .build()
            .map_err(|e| CwBoostError::config(format!("Failed to create thread pool: {}", e)))?;
        Ok(GreedyOptimizer {
            parallel: true,
            pool: Some(Arc::new(pool)),
        })
    }

    /// Optimizer matching `parallel_fit` and `num_threads` of a configuration.
    pub fn from_config(config: &BoostingConfig) -> Result<Self> {
        match (config.parallel_fit, config.num_threads) {
            (false, _) => Ok(Self::sequential()),
            (true, 0) => Ok(Self::new()),
            (true, n) => Self::with_threads(n),
        }
    }

    /// Check if candidates are fitted in parallel.
    pub fn is_parallel(&self) -> bool {
        self.parallel
    }

    fn fit_all(
        &self,
        residual: &ArrayView1<'_, f64>,
        factories: &[Arc<dyn BaseLearnerFactory>],
    ) -> Vec<Result<(Box<dyn BaseLearner>, f64)>> {
        if !self.parallel || factories.len() < 2 {
            return factories.iter().map(|f| fit_candidate(f.as_ref(), residual)).collect();
        }
        let run = || -> Vec<Result<(Box<dyn BaseLearner>, f64)>> {
            factories
                .par_iter()
                .map(|f| fit_candidate(f.as_ref(), residual))
                .collect()
        };
        match &self.pool {
            Some(pool) => pool.install(run),
            None => run(),
        }
    }
}

fn fit_candidate(
    factory: &dyn BaseLearnerFactory,
    residual: &ArrayView1<'_, f64>,
) -> Result<(Box<dyn BaseLearner>, f64)> {
    let learner = factory.create_baselearner(residual)?;
    let sse = learner.sse(residual)?;
    if sse.is_nan() {
        return Err(CwBoostError::degenerate_fit(
            factory.factory_id(),
            "sum of squared errors is NaN",
        ));
    }
    Ok((learner, sse))
}

impl Optimizer for GreedyOptimizer {
    fn name(&self) -> &str {
        "greedy"
    }

    fn select(
        &self,
        iteration: usize,
        residual: &ArrayView1<'_, f64>,
        registry: &FactoryRegistry,
    ) -> Result<Selection> {
        if registry.is_empty() {
            return Err(CwBoostError::EmptyRegistry);
        }
        let factories = registry.factories();
        let results = self.fit_all(residual, factories);

        let mut best: Option<(Box<dyn BaseLearner>, f64)> = None;
        let mut excluded = Vec::new();
        for (factory, result) in factories.iter().zip(results) {
            match result {
                Ok((learner, sse)) => {
                    let better = match &best {
                        Some((_, best_sse)) => sse < *best_sse,
                        None => true,
                    };
                    if better {
                        best = Some((learner, sse));
                    }
                }
                Err(err) => {
                    log::warn!(
                        "iteration {}: excluding '{}' ({})",
                        iteration,
                        factory.factory_id(),
                        err
                    );
                    excluded.push(factory.factory_id().to_string());
                }
            }
        }

        match best {
            Some((learner, sse)) => Ok(Selection {
                learner,
                sse,
                excluded,
            }),
            None => Err(CwBoostError::AllCandidatesFailed {
                iteration,
                failures: excluded.len(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::baselearner::PolynomialFactory;
    use crate::config::PolynomialConfig;
    use crate::dataset::InMemoryData;
    use ndarray::{array, Array1};

    fn data() -> InMemoryData {
        InMemoryData::new()
            .with_column("x", array![0.0, 1.0, 2.0, 3.0, 4.0, 5.0])
            .unwrap()
            .with_column("z", array![1.0, -1.0, 1.0, -1.0, 1.0, -1.0])
            .unwrap()
            .with_column("x_copy", array![0.0, 1.0, 2.0, 3.0, 4.0, 5.0])
            .unwrap()
            .with_column("c", Array1::from_elem(6, 3.0))
            .unwrap()
    }

    fn registry(keys: &[&str]) -> FactoryRegistry {
        let data = data();
        let mut registry = FactoryRegistry::new();
        for key in keys {
            registry
                .register(PolynomialFactory::new(&data, key, PolynomialConfig::default()).unwrap())
                .unwrap();
        }
        registry
    }

    #[test]
    fn test_selects_best_candidate() {
        let registry = registry(&["z", "x"]);
        let residual = array![0.0, 2.0, 4.0, 6.0, 8.0, 10.0];
        for optimizer in [GreedyOptimizer::new(), GreedyOptimizer::sequential()] {
            let selection = optimizer.select(1, &residual.view(), &registry).unwrap();
            assert_eq!(selection.learner.identifier(), "x_polynomial_degree_1");
            assert!(selection.sse < 1e-12);
            assert!(selection.excluded.is_empty());
        }
    }

    #[test]
    fn test_first_registered_wins_ties() {
        let residual = array![1.0, 3.0, 5.0, 7.0, 9.0, 11.0];
        let selection = GreedyOptimizer::new()
            .select(1, &residual.view(), &registry(&["x_copy", "x"]))
            .unwrap();
        assert_eq!(selection.learner.identifier(), "x_copy_polynomial_degree_1");

        let selection = GreedyOptimizer::new()
            .select(1, &residual.view(), &registry(&["x", "x_copy"]))
            .unwrap();
        assert_eq!(selection.learner.identifier(), "x_polynomial_degree_1");
    }

    #[test]
    fn test_failed_candidate_is_excluded() {
        let residual = array![1.0, 2.0, 1.0, 2.0, 1.0, 2.0];
        let selection = GreedyOptimizer::new()
            .select(4, &residual.view(), &registry(&["c", "z", "x"]))
            .unwrap();
        assert_eq!(selection.excluded, vec!["c_polynomial_degree_1".to_string()]);
        assert_eq!(selection.learner.identifier(), "z_polynomial_degree_1");
    }

    #[test]
    fn test_all_candidates_failed() {
        let residual = Array1::from_elem(6, 1.0);
        let result = GreedyOptimizer::new().select(7, &residual.view(), &registry(&["c"]));
        match result {
            Err(CwBoostError::AllCandidatesFailed { iteration, failures }) => {
                assert_eq!(iteration, 7);
                assert_eq!(failures, 1);
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn test_empty_registry() {
        let residual = Array1::zeros(6);
        let result = GreedyOptimizer::new().select(1, &residual.view(), &FactoryRegistry::new());
        assert!(matches!(result, Err(CwBoostError::EmptyRegistry)));
    }

    #[test]
    fn test_dedicated_pool() {
        let optimizer = GreedyOptimizer::with_threads(2).unwrap();
        assert!(optimizer.is_parallel());
        let residual = array![0.0, 2.0, 4.0, 6.0, 8.0, 10.0];
        let selection = optimizer.select(1, &residual.view(), &registry(&["z", "x"])).unwrap();
        assert_eq!(selection.learner.identifier(), "x_polynomial_degree_1");
    }
}
