//! Iteration counter logger.

use crate::core::error::{CwBoostError, Result};
use crate::core::types::{IterationIndex, ParameterMap};
use crate::logger::{Logger, LoggerContext, LoggerInit, LoggerKind};

/// Records the iteration number and stops at `max_iterations`.
#[derive(Debug, Clone)]
pub struct IterationLogger {
    id: String,
    stopper: bool,
    max_iterations: IterationIndex,
    configured_max: IterationIndex,
    values: Vec<(IterationIndex, f64)>,
}

impl IterationLogger {
    /// Create an iteration logger with bound `max_iterations`.
    pub fn new<S: Into<String>>(id: S, stopper: bool, max_iterations: IterationIndex) -> Result<Self> {
        if max_iterations == 0 {
            return Err(CwBoostError::invalid_parameter(
                "max_iterations",
                "0",
                "iteration logger needs a positive bound",
            ));
        }
        Ok(IterationLogger {
            id: id.into(),
            stopper,
            max_iterations,
            configured_max: max_iterations,
            values: Vec::new(),
        })
    }

    /// Current bound.
    pub fn max_iterations(&self) -> IterationIndex {
        self.max_iterations
    }

    fn current(&self) -> IterationIndex {
        self.values.last().map(|&(i, _)| i).unwrap_or(0)
    }
}

impl Logger for IterationLogger {
    fn id(&self) -> &str {
        &self.id
    }

    fn kind(&self) -> LoggerKind {
        LoggerKind::Iteration
    }

    fn is_stopper(&self) -> bool {
        self.stopper
    }

    fn set_stopper(&mut self, stopper: bool) {
        self.stopper = stopper;
    }

    fn initialize(&mut self, _init: &LoggerInit<'_>) -> Result<()> {
        self.max_iterations = self.configured_max;
        self.values.clear();
        Ok(())
    }

    fn log(&mut self, context: &LoggerContext<'_>) -> Result<()> {
        self.values.push((context.iteration, context.iteration as f64));
        Ok(())
    }

    fn reached_stop_criteria(&self) -> bool {
        self.stopper && self.max_iterations <= self.current()
    }

    fn values(&self) -> &[(IterationIndex, f64)] {
        &self.values
    }

    fn status(&self) -> String {
        let width = digits(self.max_iterations);
        format!("{:>width$}/{}", self.current(), self.max_iterations)
    }

    fn prepare_for_retraining(&mut self, new_max: IterationIndex) {
        self.max_iterations = new_max;
        self.stopper = true;
    }

    fn restore(
        &mut self,
        _init: &LoggerInit<'_>,
        _parameters: &ParameterMap,
        values: &[(IterationIndex, f64)],
    ) -> Result<()> {
        self.values = values.to_vec();
        Ok(())
    }

    fn clear(&mut self) {
        self.values.clear();
    }
}

fn digits(n: usize) -> usize {
    n.to_string().len()
}
