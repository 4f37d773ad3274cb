//! Per-iteration loggers and stopping control.
//!
//! Every logger records one value per iteration. Loggers flagged as stoppers
//! also decide whether training should end. The [`LoggerList`] runs the
//! loggers in registration order and combines their stop decisions.
//!
//! | logger | value | stops when |
//! |---|---|---|
//! | [`IterationLogger`] | iteration number | `iteration >= max_iterations` |
//! | [`InbagRiskLogger`] | empirical risk on the training data | risk plateaus |
//! | [`OobRiskLogger`] | empirical risk on held-out data | risk plateaus |
//! | [`TimeLogger`] | elapsed time | `elapsed >= max_time` |

pub mod iteration;
pub mod list;
pub mod risk;
pub mod stopping;
pub mod time;

pub use iteration::IterationLogger;
pub use list::{LoggerList, LoggerTable};
pub use risk::{InbagRiskLogger, OobRiskLogger};
pub use stopping::{PlateauConfig, RiskPlateau};
pub use time::TimeLogger;

use crate::baselearner::{BaseLearner, FactoryRegistry};
use crate::core::error::Result;
use crate::core::types::{IterationIndex, ParameterMap};
use crate::loss::Loss;
use ndarray::ArrayView1;
use std::fmt::{self, Debug};

/// Kind of a logger, used to find loggers with special roles.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoggerKind {
    /// Counts iterations
    Iteration,
    /// Risk on the training data
    InbagRisk,
    /// Risk on held-out data
    OobRisk,
    /// Elapsed time
    Time,
    /// User-defined logger
    Custom,
}

impl fmt::Display for LoggerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoggerKind::Iteration => write!(f, "iteration"),
            LoggerKind::InbagRisk => write!(f, "inbag_risk"),
            LoggerKind::OobRisk => write!(f, "oob_risk"),
            LoggerKind::Time => write!(f, "time"),
            LoggerKind::Custom => write!(f, "custom"),
        }
    }
}

/// Engine state handed to the loggers once before training.
#[derive(Clone, Copy)]
pub struct LoggerInit<'a> {
    /// Constant initial score
    pub offset: f64,
    /// Training loss
    pub loss: &'a dyn Loss,
    /// Candidate pool, for loggers that predict on other data
    pub registry: &'a FactoryRegistry,
}

/// Engine state handed to the loggers after every iteration.
#[derive(Clone, Copy)]
pub struct LoggerContext<'a> {
    /// Iteration that was just completed (1-based)
    pub iteration: IterationIndex,
    /// Training response
    pub truth: ArrayView1<'a, f64>,
    /// Training scores after the update
    pub prediction: ArrayView1<'a, f64>,
    /// Pseudo residuals the selected learner was fitted to
    pub residual: ArrayView1<'a, f64>,
    /// Training loss
    pub loss: &'a dyn Loss,
    /// Learner selected in this iteration, unscaled
    pub selected: &'a dyn BaseLearner,
    /// Learning rate applied to the selected learner
    pub learning_rate: f64,
    /// Step size chosen by the optimizer, applied on top of the learning rate
    pub step_size: f64,
}

/// Observer of the boosting loop.
pub trait Logger: Send + Sync + Debug {
    /// Unique id within a logger list.
    fn id(&self) -> &str;

    /// What this logger records.
    fn kind(&self) -> LoggerKind;

    /// Check if this logger takes part in stopping decisions.
    fn is_stopper(&self) -> bool;

    /// Enable or disable the stop predicate.
    fn set_stopper(&mut self, stopper: bool);

    /// Prepare for a fresh training run.
    fn initialize(&mut self, _init: &LoggerInit<'_>) -> Result<()> {
        Ok(())
    }

    /// Record the value of one iteration.
    fn log(&mut self, context: &LoggerContext<'_>) -> Result<()>;

    /// Evaluate the stop predicate on the recorded values.
    fn reached_stop_criteria(&self) -> bool;

    /// Recorded `(iteration, value)` pairs.
    fn values(&self) -> &[(IterationIndex, f64)];

    /// Short status fragment for trace output.
    fn status(&self) -> String;

    /// Adjust before `continue_training` extends the run to `new_max` iterations.
    ///
    /// The default drops out of the stopping decision.
    fn prepare_for_retraining(&mut self, _new_max: IterationIndex) {
        self.set_stopper(false);
    }

    /// Reinstate recorded values and internal state after loading a snapshot.
    ///
    /// `parameters` holds the cumulative, already scaled parameters of the
    /// restored track.
    fn restore(
        &mut self,
        init: &LoggerInit<'_>,
        parameters: &ParameterMap,
        values: &[(IterationIndex, f64)],
    ) -> Result<()>;

    /// Forget all recorded values.
    fn clear(&mut self);

    /// Most recent value.
    fn last_value(&self) -> Option<f64> {
        self.values().last().map(|&(_, v)| v)
    }
}

#[cfg(test)]
pub(crate) mod tests_support {
    use super::LoggerContext;
    use crate::baselearner::{BaseLearner, LinearBaseLearner};
    use crate::loss::QuadraticLoss;
    use ndarray::{array, Array1, Array2};
    use std::sync::Arc;

    /// Run `f` with a context for `iteration` on a tiny quadratic problem.
    pub(crate) fn context_at<R>(iteration: usize, f: impl FnOnce(&LoggerContext<'_>) -> R) -> R {
        let truth = array![1.0, 2.0, 3.0];
        let prediction = array![1.0, 2.0, 2.0];
        context_with(iteration, &truth, &prediction, None, f)
    }

    /// Run `f` with a context using the given response, scores and learner.
    pub(crate) fn context_with<R>(
        iteration: usize,
        truth: &Array1<f64>,
        prediction: &Array1<f64>,
        selected: Option<&dyn BaseLearner>,
        f: impl FnOnce(&LoggerContext<'_>) -> R,
    ) -> R {
        let loss = QuadraticLoss::new();
        let residual = truth - prediction;
        let fallback = LinearBaseLearner::new(
            "x_polynomial_degree_1".to_string(),
            Arc::new(Array2::zeros((truth.len(), 1))),
            array![0.0],
        );
        let context = LoggerContext {
            iteration,
            truth: truth.view(),
            prediction: prediction.view(),
            residual: residual.view(),
            loss: &loss,
            selected: selected.unwrap_or(&fallback),
            learning_rate: 0.1,
            step_size: 1.0,
        };
        f(&context)
    }
}
