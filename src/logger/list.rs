//! Ordered collection of loggers.

use crate::core::constants::RETRAIN_ITERATION_LOGGER_ID;
use crate::core::error::{CwBoostError, Result};
use crate::core::types::{IterationIndex, ParameterMap};
use crate::logger::iteration::IterationLogger;
use crate::logger::{Logger, LoggerContext, LoggerInit, LoggerKind};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::fmt;

/// Recorded values of all loggers, one row per iteration.
///
/// A cell is `None` when a logger did not record that iteration, e.g. a
/// logger added when training was continued.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LoggerTable {
    /// Column names
    pub logger_ids: Vec<String>,
    /// Row keys in increasing order
    pub iterations: Vec<IterationIndex>,
    /// `values[row][column]`
    pub values: Vec<Vec<Option<f64>>>,
}

impl LoggerTable {
    /// Number of rows.
    pub fn num_rows(&self) -> usize {
        self.iterations.len()
    }

    /// Check if the table has no rows.
    pub fn is_empty(&self) -> bool {
        self.iterations.is_empty()
    }

    /// Column of `logger_id`, one cell per row.
    pub fn column(&self, logger_id: &str) -> Option<Vec<Option<f64>>> {
        let col = self.logger_ids.iter().position(|id| id == logger_id)?;
        Some(self.values.iter().map(|row| row[col]).collect())
    }

    /// Recorded `(iteration, value)` pairs of `logger_id`.
    pub fn recorded(&self, logger_id: &str) -> Option<Vec<(IterationIndex, f64)>> {
        let column = self.column(logger_id)?;
        Some(
            self.iterations
                .iter()
                .zip(column)
                .filter_map(|(&i, v)| v.map(|v| (i, v)))
                .collect(),
        )
    }
}

impl fmt::Display for LoggerTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "iteration")?;
        for id in &self.logger_ids {
            write!(f, "\t{id}")?;
        }
        writeln!(f)?;
        for (iteration, row) in self.iterations.iter().zip(&self.values) {
            write!(f, "{iteration}")?;
            for cell in row {
                match cell {
                    Some(v) => write!(f, "\t{v}")?,
                    None => write!(f, "\tNA")?,
                }
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

/// Loggers in registration order plus the rule combining their stop signals.
#[derive(Debug, Default)]
pub struct LoggerList {
    loggers: Vec<Box<dyn Logger>>,
    configured_stoppers: HashMap<String, bool>,
    stop_if_all: bool,
}

impl LoggerList {
    /// Create an empty list that stops as soon as any stopper fires.
    pub fn new() -> Self {
        Self::default()
    }

    /// Stop only when every stopper fires (`true`) or when any does (`false`).
    pub fn with_stop_if_all(mut self, stop_if_all: bool) -> Self {
        self.stop_if_all = stop_if_all;
        self
    }

    /// Change the stop policy.
    pub fn set_stop_if_all(&mut self, stop_if_all: bool) {
        self.stop_if_all = stop_if_all;
    }

    /// Check if all stoppers must fire.
    pub fn stop_if_all(&self) -> bool {
        self.stop_if_all
    }

    /// Append a logger; ids must be unique.
    pub fn register<L: Logger + 'static>(&mut self, logger: L) -> Result<()> {
        self.register_boxed(Box::new(logger))
    }

    /// Append a boxed logger; ids must be unique.
    pub fn register_boxed(&mut self, logger: Box<dyn Logger>) -> Result<()> {
        if self.get(logger.id()).is_some() {
            return Err(CwBoostError::logger(format!(
                "logger '{}' is already registered",
                logger.id()
            )));
        }
        self.configured_stoppers
            .insert(logger.id().to_string(), logger.is_stopper());
        self.loggers.push(logger);
        Ok(())
    }

    /// Logger with the given id.
    pub fn get(&self, id: &str) -> Option<&dyn Logger> {
        self.loggers.iter().find(|l| l.id() == id).map(|l| l.as_ref())
    }

    /// Ids in registration order.
    pub fn ids(&self) -> Vec<String> {
        self.loggers.iter().map(|l| l.id().to_string()).collect()
    }

    /// Number of loggers.
    pub fn len(&self) -> usize {
        self.loggers.len()
    }

    /// Check if no logger is registered.
    pub fn is_empty(&self) -> bool {
        self.loggers.is_empty()
    }

    /// Iterate in registration order.
    pub fn iter(&self) -> impl Iterator<Item = &dyn Logger> {
        self.loggers.iter().map(|l| l.as_ref())
    }

    /// Check if at least one logger takes part in stopping.
    pub fn has_stoppers(&self) -> bool {
        self.loggers.iter().any(|l| l.is_stopper())
    }

    /// Prepare every logger for a fresh run.
    ///
    /// Internal loggers added by [`prepare_for_retraining`](Self::prepare_for_retraining)
    /// are removed and every logger gets its registered stopper flag back.
    pub fn initialize(&mut self, init: &LoggerInit<'_>) -> Result<()> {
        let configured = &mut self.configured_stoppers;
        self.loggers.retain(|l| {
            let internal = l.id().starts_with('_');
            if internal {
                configured.remove(l.id());
            }
            !internal
        });
        for logger in &mut self.loggers {
            let stopper = self
                .configured_stoppers
                .get(logger.id())
                .copied()
                .unwrap_or(false);
            logger.set_stopper(stopper);
            logger.initialize(init)?;
        }
        Ok(())
    }

    /// Let every logger record the finished iteration.
    pub fn log_all(&mut self, context: &LoggerContext<'_>) -> Result<()> {
        for logger in &mut self.loggers {
            logger.log(context)?;
        }
        Ok(())
    }

    /// Combine the stop signals of all stoppers.
    ///
    /// Without any stopper the list never asks to stop.
    pub fn should_stop(&self) -> bool {
        let mut stoppers = self.loggers.iter().filter(|l| l.is_stopper()).peekable();
        if stoppers.peek().is_none() {
            return false;
        }
        if self.stop_if_all {
            stoppers.all(|l| l.reached_stop_criteria())
        } else {
            stoppers.any(|l| l.reached_stop_criteria())
        }
    }

    /// Id of the first stopper whose criterion is met.
    pub fn stop_reason(&self) -> Option<&str> {
        self.loggers
            .iter()
            .find(|l| l.is_stopper() && l.reached_stop_criteria())
            .map(|l| l.id())
    }

    /// Recorded values of every visible logger aligned by iteration.
    ///
    /// Loggers whose id starts with `_` are internal and left out.
    pub fn logger_data(&self) -> LoggerTable {
        let visible: Vec<&dyn Logger> = self
            .loggers
            .iter()
            .map(|l| l.as_ref())
            .filter(|l| !l.id().starts_with('_'))
            .collect();

        let iterations: Vec<IterationIndex> = visible
            .iter()
            .flat_map(|l| l.values().iter().map(|&(i, _)| i))
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();

        let mut values = vec![vec![None; visible.len()]; iterations.len()];
        for (col, logger) in visible.iter().enumerate() {
            for &(iteration, value) in logger.values() {
                if let Ok(row) = iterations.binary_search(&iteration) {
                    values[row][col] = Some(value);
                }
            }
        }

        LoggerTable {
            logger_ids: visible.iter().map(|l| l.id().to_string()).collect(),
            iterations,
            values,
        }
    }

    /// One status line combining all logger fragments.
    pub fn status(&self) -> String {
        self.loggers
            .iter()
            .filter(|l| !l.id().starts_with('_'))
            .map(|l| format!("{}: {}", l.id(), l.status()))
            .collect::<Vec<_>>()
            .join(" | ")
    }

    /// Switch to a pure iteration bound of `new_max` before training is continued.
    ///
    /// Every logger drops out of stopping except iteration loggers, which take
    /// the new bound. A hidden iteration logger is added if none exists.
    pub fn prepare_for_retraining(&mut self, new_max: IterationIndex) -> Result<()> {
        for logger in &mut self.loggers {
            logger.prepare_for_retraining(new_max);
        }
        let has_iteration = self.loggers.iter().any(|l| l.kind() == LoggerKind::Iteration);
        if !has_iteration {
            log::debug!("adding hidden iteration logger with bound {new_max}");
            self.register(IterationLogger::new(
                RETRAIN_ITERATION_LOGGER_ID,
                true,
                new_max,
            )?)?;
        }
        Ok(())
    }

    /// Reinstate the values of every visible logger from `table`.
    pub fn restore(
        &mut self,
        init: &LoggerInit<'_>,
        parameters: &ParameterMap,
        table: &LoggerTable,
    ) -> Result<()> {
        for logger in &mut self.loggers {
            if logger.id().starts_with('_') {
                logger.clear();
                continue;
            }
            let values = table.recorded(logger.id()).ok_or_else(|| {
                CwBoostError::logger(format!(
                    "snapshot has no values for logger '{}'",
                    logger.id()
                ))
            })?;
            logger.restore(init, parameters, &values)?;
        }
        Ok(())
    }

    /// Forget the values of every logger.
    pub fn clear(&mut self) {
        for logger in &mut self.loggers {
            logger.clear();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::TimeUnit;
    use crate::logger::tests_support::context_at;
    use crate::logger::{InbagRiskLogger, PlateauConfig, TimeLogger};

    fn list() -> LoggerList {
        let mut list = LoggerList::new();
        list.register(IterationLogger::new("iterations", true, 3).unwrap())
            .unwrap();
        list.register(InbagRiskLogger::new("risk", false, PlateauConfig::default(), None).unwrap())
            .unwrap();
        list
    }

    fn run(list: &mut LoggerList, iterations: std::ops::RangeInclusive<usize>) {
        for i in iterations {
            context_at(i, |ctx| list.log_all(ctx)).unwrap();
        }
    }

    #[test]
    fn test_duplicate_id_rejected() {
        let mut list = list();
        let result = list.register(IterationLogger::new("risk", false, 1).unwrap());
        assert!(matches!(result, Err(CwBoostError::Logger { .. })));
        assert_eq!(list.ids(), vec!["iterations", "risk"]);
    }

    #[test]
    fn test_any_stopper_policy() {
        let mut list = list();
        run(&mut list, 1..=2);
        assert!(!list.should_stop());
        run(&mut list, 3..=3);
        assert!(list.should_stop());
        assert_eq!(list.stop_reason(), Some("iterations"));
    }

    #[test]
    fn test_all_stoppers_policy() {
        let mut list = LoggerList::new().with_stop_if_all(true);
        list.register(IterationLogger::new("short", true, 1).unwrap())
            .unwrap();
        list.register(IterationLogger::new("long", true, 2).unwrap())
            .unwrap();
        run(&mut list, 1..=1);
        assert!(!list.should_stop());
        run(&mut list, 2..=2);
        assert!(list.should_stop());
        assert_eq!(list.stop_reason(), Some("short"));
    }

    #[test]
    fn test_without_stoppers_never_stops() {
        let mut list = LoggerList::new();
        list.register(InbagRiskLogger::new("risk", false, PlateauConfig::default(), None).unwrap())
            .unwrap();
        run(&mut list, 1..=10);
        assert!(!list.should_stop());
    }

    #[test]
    fn test_logger_data_table() {
        let mut list = list();
        run(&mut list, 1..=2);
        let table = list.logger_data();
        assert_eq!(table.logger_ids, vec!["iterations", "risk"]);
        assert_eq!(table.iterations, vec![1, 2]);
        assert_eq!(table.values[1][0], Some(2.0));
        assert_eq!(table.recorded("iterations").unwrap(), vec![(1, 1.0), (2, 2.0)]);
        assert!(table.to_string().starts_with("iteration\titerations\trisk\n"));
    }

    #[test]
    fn test_prepare_for_retraining_adds_hidden_iteration_logger() {
        let mut list = LoggerList::new();
        list.register(InbagRiskLogger::new("risk", true, PlateauConfig::default(), None).unwrap())
            .unwrap();
        list.register(TimeLogger::new("time", true, 100, TimeUnit::Seconds).unwrap())
            .unwrap();
        run(&mut list, 1..=2);

        list.prepare_for_retraining(4).unwrap();
        assert_eq!(list.len(), 3);
        assert!(!list.get("risk").unwrap().is_stopper());
        assert!(!list.get("time").unwrap().is_stopper());
        assert!(list.get(RETRAIN_ITERATION_LOGGER_ID).unwrap().is_stopper());

        run(&mut list, 3..=4);
        assert!(list.should_stop());
        assert_eq!(list.logger_data().logger_ids, vec!["risk", "time"]);

        // A second call reuses the hidden logger.
        list.prepare_for_retraining(6).unwrap();
        assert_eq!(list.len(), 3);
    }

    #[test]
    fn test_initialize_restores_registered_setup() {
        use crate::baselearner::FactoryRegistry;
        use crate::loss::QuadraticLoss;

        let mut list = LoggerList::new();
        list.register(InbagRiskLogger::new("risk", true, PlateauConfig::default(), None).unwrap())
            .unwrap();
        run(&mut list, 1..=2);
        list.prepare_for_retraining(4).unwrap();
        assert_eq!(list.len(), 2);

        let loss = QuadraticLoss::new();
        let registry = FactoryRegistry::new();
        let init = LoggerInit {
            offset: 0.0,
            loss: &loss,
            registry: &registry,
        };
        list.initialize(&init).unwrap();
        assert_eq!(list.ids(), vec!["risk"]);
        assert!(list.get("risk").unwrap().is_stopper());
        assert!(list.get("risk").unwrap().values().is_empty());
    }

    #[test]
    fn test_prepare_for_retraining_rebounds_iteration_logger() {
        let mut list = list();
        run(&mut list, 1..=3);
        assert!(list.should_stop());
        list.prepare_for_retraining(5).unwrap();
        assert_eq!(list.len(), 2);
        assert!(!list.should_stop());
        run(&mut list, 4..=5);
        assert!(list.should_stop());
    }

    #[test]
    fn test_status_line() {
        let mut list = list();
        run(&mut list, 1..=1);
        assert_eq!(list.status(), "iterations: 1/3 | risk: 0.166667");
    }
}
