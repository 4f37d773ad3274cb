//! Elapsed time logger.

use crate::core::error::{CwBoostError, Result};
use crate::core::types::{IterationIndex, ParameterMap, TimeUnit};
use crate::logger::{Logger, LoggerContext, LoggerInit, LoggerKind};
use std::time::Instant;

/// Records the time since training started and stops once `max_time` is used up.
///
/// When training is continued the clock restarts and the time already spent
/// is carried over, so the recorded values keep increasing.
#[derive(Debug, Clone)]
pub struct TimeLogger {
    id: String,
    stopper: bool,
    max_time: u64,
    unit: TimeUnit,
    start: Option<Instant>,
    carried: u64,
    values: Vec<(IterationIndex, f64)>,
}

impl TimeLogger {
    /// Create a time logger with budget `max_time` measured in `unit`.
    pub fn new<S: Into<String>>(id: S, stopper: bool, max_time: u64, unit: TimeUnit) -> Result<Self> {
        if stopper && max_time == 0 {
            return Err(CwBoostError::invalid_parameter(
                "max_time",
                "0",
                "a stopping time logger needs a positive budget",
            ));
        }
        Ok(TimeLogger {
            id: id.into(),
            stopper,
            max_time,
            unit,
            start: None,
            carried: 0,
            values: Vec::new(),
        })
    }

    /// Unit of the recorded values.
    pub fn unit(&self) -> TimeUnit {
        self.unit
    }

    /// Time budget.
    pub fn max_time(&self) -> u64 {
        self.max_time
    }

    fn elapsed(&self) -> u64 {
        let running = self
            .start
            .map(|start| self.unit.convert(start.elapsed()))
            .unwrap_or(0);
        self.carried + running
    }
}

impl Logger for TimeLogger {
    fn id(&self) -> &str {
        &self.id
    }

    fn kind(&self) -> LoggerKind {
        LoggerKind::Time
    }

    fn is_stopper(&self) -> bool {
        self.stopper
    }

    fn set_stopper(&mut self, stopper: bool) {
        self.stopper = stopper;
    }

    fn initialize(&mut self, _init: &LoggerInit<'_>) -> Result<()> {
        self.start = Some(Instant::now());
        self.carried = 0;
        self.values.clear();
        Ok(())
    }

    fn log(&mut self, context: &LoggerContext<'_>) -> Result<()> {
        if self.start.is_none() {
            self.start = Some(Instant::now());
        }
        let elapsed = self.elapsed();
        self.values.push((context.iteration, elapsed as f64));
        Ok(())
    }

    fn reached_stop_criteria(&self) -> bool {
        self.stopper
            && self
                .last_value()
                .map(|v| v >= self.max_time as f64)
                .unwrap_or(false)
    }

    fn values(&self) -> &[(IterationIndex, f64)] {
        &self.values
    }

    fn status(&self) -> String {
        format!("{}/{} {}", self.last_value().unwrap_or(0.0), self.max_time, self.unit)
    }

    fn prepare_for_retraining(&mut self, _new_max: IterationIndex) {
        self.stopper = false;
        self.carried = self.last_value().map(|v| v as u64).unwrap_or(0);
        self.start = Some(Instant::now());
    }

    fn restore(
        &mut self,
        _init: &LoggerInit<'_>,
        _parameters: &ParameterMap,
        values: &[(IterationIndex, f64)],
    ) -> Result<()> {
        self.values = values.to_vec();
        self.carried = self.last_value().map(|v| v as u64).unwrap_or(0);
        self.start = Some(Instant::now());
        Ok(())
    }

    fn clear(&mut self) {
        self.values.clear();
        self.start = None;
        self.carried = 0;
    }
}
