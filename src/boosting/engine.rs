//! Component-wise boosting engine.
//!
//! The engine owns the running score vector, the offset, the base-learner
//! track and the logger list. Training is an explicit state machine:
//!
//! ```text
//! uninitialized --train--> running --> stopped(success)
//!                                  --> stopped(by-logger)
//!                                  --> stopped(by-cancellation)
//!                                  --> aborted(error)
//! stopped(*) --continue_training--> running
//! ```
//!
//! Every iteration computes the pseudo residuals, lets the optimizer pick one
//! base learner, adds its scaled fit to the scores, appends it to the track
//! and runs the loggers. Continuing a stopped run picks up exactly where it
//! ended, so `train(n)` followed by `continue_training(k)` equals `train(n + k)`
//! as long as no stopper fires in between.

use crate::baselearner::FactoryRegistry;
use crate::boosting::snapshot::EngineSnapshot;
use crate::boosting::track::{BaselearnerTrack, ParameterMatrix};
use crate::config::BoostingConfig;
use crate::core::error::{CwBoostError, Result};
use crate::core::types::{EngineState, IterationIndex, ParameterMap, Vector};
use crate::dataset::NewData;
use crate::ensure;
use crate::logger::{LoggerContext, LoggerInit, LoggerList, LoggerTable};
use crate::loss::SharedLoss;
use crate::optimizer::Optimizer;
use ndarray::{s, Array1, ArrayView1};
use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Flag to stop a training run from another thread.
///
/// The engine checks the flag once per iteration, before the next learner is
/// selected. Completed iterations stay valid.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    /// Create a token that is not cancelled.
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    /// Check if cancellation was requested.
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Clear a previous request.
    pub fn reset(&self) {
        self.cancelled.store(false, Ordering::SeqCst);
    }
}

/// Component-wise gradient boosting engine.
#[derive(Debug)]
pub struct Engine {
    config: BoostingConfig,
    response: Vector,
    loss: SharedLoss,
    optimizer: Box<dyn Optimizer>,
    loggers: LoggerList,
    registry: FactoryRegistry,
    track: BaselearnerTrack,
    offset: f64,
    prediction: Vector,
    iteration: IterationIndex,
    risk: Vec<f64>,
    state: EngineState,
    cancellation: CancellationToken,
}

impl Engine {
    /// Assemble an engine from its collaborators.
    ///
    /// Fails if the configuration is invalid, the registry is empty, the
    /// response does not pass the loss' checks or a factory's basis has a
    /// different number of rows than the response.
    pub fn new(
        config: BoostingConfig,
        response: ArrayView1<'_, f64>,
        loss: SharedLoss,
        optimizer: Box<dyn Optimizer>,
        mut loggers: LoggerList,
        registry: FactoryRegistry,
    ) -> Result<Self> {
        config.validate()?;
        ensure!(!registry.is_empty(), CwBoostError::EmptyRegistry);
        let response = loss.prepare_response(&response)?;
        for factory in registry.iter() {
            let rows = factory.data().nrows();
            if rows != response.len() {
                return Err(CwBoostError::dimension_mismatch(
                    format!("{} rows in the basis of '{}'", response.len(), factory.factory_id()),
                    rows.to_string(),
                ));
            }
        }
        loggers.set_stop_if_all(config.stop_if_all_stoppers);

        let n = response.len();
        Ok(Engine {
            config,
            response,
            loss,
            optimizer,
            loggers,
            registry,
            track: BaselearnerTrack::new(),
            offset: 0.0,
            prediction: Vector::zeros(n),
            iteration: 0,
            risk: Vec::new(),
            state: EngineState::Uninitialized,
            cancellation: CancellationToken::new(),
        })
    }

    /// Use `token` instead of the engine's own cancellation flag.
    pub fn with_cancellation_token(mut self, token: CancellationToken) -> Self {
        self.cancellation = token;
        self
    }

    /// Train from scratch for at most `max_iterations` iterations.
    ///
    /// Any earlier training state is discarded. Returns the state the run
    /// ended in. An error from the loop leaves the engine `Aborted` with every
    /// completed iteration still queryable. If a logger fails to initialize
    /// the engine is left `Uninitialized` with an empty track.
    pub fn train(&mut self, max_iterations: IterationIndex) -> Result<EngineState> {
        ensure!(
            self.state != EngineState::Running,
            CwBoostError::state("training is already running")
        );
        if max_iterations == 0 {
            return Err(CwBoostError::invalid_parameter(
                "max_iterations",
                "0",
                "must be at least 1",
            ));
        }

        let offset = if self.config.use_offset {
            self.loss.constant_initializer(&self.response.view())?
        } else {
            0.0
        };
        let prediction = Array1::from_elem(self.response.len(), offset);
        let initial_risk = self
            .loss
            .empirical_risk(&self.response.view(), &prediction.view())?;

        self.loggers.clear();
        let init = LoggerInit {
            offset,
            loss: self.loss.as_ref(),
            registry: &self.registry,
        };
        if let Err(err) = self.loggers.initialize(&init) {
            self.discard_training();
            return Err(err);
        }

        self.offset = offset;
        self.prediction = prediction;
        self.track.clear();
        self.iteration = 0;
        self.risk = vec![initial_risk];

        log::info!(
            "training {} iterations with {} candidates, {} loss, offset {:.6}",
            max_iterations,
            self.registry.len(),
            self.loss.name(),
            offset
        );
        self.run(max_iterations)
    }

    fn discard_training(&mut self) {
        self.track.clear();
        self.offset = 0.0;
        self.prediction.fill(0.0);
        self.iteration = 0;
        self.risk.clear();
        self.state = EngineState::Uninitialized;
    }

    /// Train from scratch for the configured `max_iterations`.
    pub fn train_configured(&mut self) -> Result<EngineState> {
        self.train(self.config.max_iterations)
    }

    /// Resume a stopped run for `additional_iterations` more iterations.
    ///
    /// Offset, track and loggers are kept. Stoppers are disabled and the
    /// iteration bound becomes `trained + additional_iterations`. If the
    /// engine was set back with [`set_to_iteration`](Self::set_to_iteration),
    /// training resumes from the end of the track.
    pub fn continue_training(&mut self, additional_iterations: IterationIndex) -> Result<EngineState> {
        if !self.state.is_resumable() {
            return Err(CwBoostError::state(format!(
                "cannot continue training in state {}, call train first",
                self.state
            )));
        }
        if additional_iterations == 0 {
            return Ok(self.state);
        }
        if self.iteration < self.track.len() {
            let parameters = self.track.parameter_map()?;
            self.prediction = self.training_scores(&parameters)?;
            self.iteration = self.track.len();
        }

        let bound = self.track.len() + additional_iterations;
        self.loggers.prepare_for_retraining(bound)?;
        log::info!(
            "continuing training from iteration {} to {}",
            self.track.len(),
            bound
        );
        self.run(bound)
    }

    /// Make `iteration` the active iteration.
    ///
    /// Going back replays the state from the track without deleting entries.
    /// Going past the end of the track trains the missing iterations.
    pub fn set_to_iteration(&mut self, iteration: IterationIndex) -> Result<EngineState> {
        if !self.state.is_stopped() {
            return Err(CwBoostError::state(format!(
                "cannot set the iteration in state {}",
                self.state
            )));
        }
        if iteration > self.track.len() {
            let missing = iteration - self.track.len();
            return self.continue_training(missing);
        }
        let parameters = self.track.parameter_of_iteration(iteration)?;
        self.prediction = self.training_scores(&parameters)?;
        self.iteration = iteration;
        log::debug!("active iteration set to {}", iteration);
        Ok(self.state)
    }

    fn run(&mut self, bound: IterationIndex) -> Result<EngineState> {
        self.state = EngineState::Running;
        while self.track.len() < bound {
            if self.cancellation.is_cancelled() {
                log::warn!("training cancelled after iteration {}", self.track.len());
                self.state = EngineState::StoppedByCancellation;
                return Ok(self.state);
            }
            match self.step(bound) {
                Ok(Some(state)) => {
                    self.state = state;
                    break;
                }
                Ok(None) => {}
                Err(err) => {
                    log::error!(
                        "training aborted in iteration {}: {}",
                        self.track.len() + 1,
                        err
                    );
                    self.state = EngineState::Aborted;
                    return Err(err);
                }
            }
        }
        if self.state == EngineState::Running {
            self.state = EngineState::StoppedSuccess;
        }
        log::info!(
            "training finished after {} iterations: {}",
            self.track.len(),
            self.state
        );
        Ok(self.state)
    }

    fn step(&mut self, bound: IterationIndex) -> Result<Option<EngineState>> {
        let iteration = self.track.len() + 1;
        let residual = self
            .loss
            .pseudo_residuals(&self.response.view(), &self.prediction.view())?;
        let selection = self
            .optimizer
            .select(iteration, &residual.view(), &self.registry)?;
        let fitted = selection.learner.predict()?;
        if fitted.len() != self.prediction.len() {
            return Err(CwBoostError::dimension_mismatch(
                format!("{} fitted values", self.prediction.len()),
                fitted.len().to_string(),
            ));
        }

        let step_size = self.optimizer.step_size(
            self.loss.as_ref(),
            &self.response.view(),
            &self.prediction.view(),
            &fitted.view(),
        )?;
        let learning_rate = self.config.learning_rate;
        self.track
            .insert(selection.learner.as_ref(), learning_rate, step_size)?;
        self.prediction.scaled_add(learning_rate * step_size, &fitted);
        self.iteration = iteration;

        let risk = self
            .loss
            .empirical_risk(&self.response.view(), &self.prediction.view())?;
        self.risk.push(risk);
        log::debug!(
            "iteration {}: selected '{}' (sse {:.6}, step {:.4}, risk {:.6})",
            iteration,
            selection.learner.identifier(),
            selection.sse,
            step_size,
            risk
        );

        let context = LoggerContext {
            iteration,
            truth: self.response.view(),
            prediction: self.prediction.view(),
            residual: residual.view(),
            loss: self.loss.as_ref(),
            selected: selection.learner.as_ref(),
            learning_rate,
            step_size,
        };
        self.loggers.log_all(&context)?;

        if self.config.trace > 0 && iteration % self.config.trace == 0 {
            let width = bound.to_string().len();
            log::info!(
                "{:>width$}: risk = {:.6} | {}",
                iteration,
                risk,
                self.loggers.status()
            );
        }

        if iteration >= bound {
            return Ok(Some(EngineState::StoppedSuccess));
        }
        if self.loggers.should_stop() {
            log::info!(
                "stopper '{}' fired after iteration {}",
                self.loggers.stop_reason().unwrap_or("?"),
                iteration
            );
            return Ok(Some(EngineState::StoppedByLogger));
        }
        Ok(None)
    }

    fn training_scores(&self, parameters: &ParameterMap) -> Result<Vector> {
        let mut scores = Vector::from_elem(self.response.len(), self.offset);
        for (id, parameter) in parameters {
            let factory = self
                .registry
                .get(id)
                .ok_or_else(|| CwBoostError::unknown_identifier(id.clone()))?;
            let contribution = factory.linear_predictor(factory.data(), parameter)?;
            scores += &contribution;
        }
        Ok(scores)
    }

    fn require_trained(&self) -> Result<()> {
        ensure!(
            self.state != EngineState::Uninitialized,
            CwBoostError::state("the engine has not been trained")
        );
        Ok(())
    }

    /// Scores on new data at the active iteration.
    ///
    /// `new_data` maps data keys to raw matrices, like the provider the
    /// factories were built from. Only keys of selected learners are needed.
    /// With `as_response` the scores are mapped through the loss' response
    /// transform.
    pub fn predict(&self, new_data: &NewData, as_response: bool) -> Result<Vector> {
        self.require_trained()?;
        let n = new_data
            .num_rows()
            .ok_or_else(|| CwBoostError::config("new data must contain at least one entry"))?;

        let mut scores = Vector::from_elem(n, self.offset);
        for (id, parameter) in self.parameter()? {
            let factory = self
                .registry
                .get(&id)
                .ok_or_else(|| CwBoostError::unknown_identifier(id.clone()))?;
            let key = factory.data_identifier();
            let basis = factory.instantiate_new_data(new_data)?;
            let contribution = factory.linear_predictor(&basis, &parameter)?;
            if contribution.len() != n {
                return Err(CwBoostError::dimension_mismatch(
                    format!("{n} rows for '{key}'"),
                    contribution.len().to_string(),
                ));
            }
            scores += &contribution;
        }

        Ok(if as_response {
            self.loss.response_transform(&scores.view())
        } else {
            scores
        })
    }

    /// Scores of the training data at the active iteration.
    pub fn prediction(&self, as_response: bool) -> Vector {
        if as_response {
            self.loss.response_transform(&self.prediction.view())
        } else {
            self.prediction.clone()
        }
    }

    /// Cumulative parameters at the active iteration.
    pub fn parameter(&self) -> Result<ParameterMap> {
        self.track.parameter_of_iteration(self.iteration)
    }

    /// Cumulative parameters after `iteration`.
    pub fn parameter_of_iteration(&self, iteration: IterationIndex) -> Result<ParameterMap> {
        self.track.parameter_of_iteration(iteration)
    }

    /// Parameter path up to the active iteration, one row per iteration.
    pub fn parameter_matrix(&self) -> Result<ParameterMatrix> {
        let mut matrix = self.track.parameter_matrix()?;
        if self.iteration < matrix.values.nrows() {
            matrix.values = matrix.values.slice(s![..self.iteration, ..]).to_owned();
        }
        Ok(matrix)
    }

    /// Ids of the selected learners up to the active iteration.
    pub fn selected_learner_ids(&self) -> Vec<String> {
        self.track.entries()[..self.iteration]
            .iter()
            .map(|e| e.learner_id.clone())
            .collect()
    }

    /// Id of the learner selected in `iteration`.
    pub fn selected_learner_of_iteration(&self, iteration: IterationIndex) -> Result<&str> {
        Ok(self.track.entry(iteration)?.learner_id.as_str())
    }

    /// Training risk at the offset followed by the risk after each iteration
    /// up to the active one.
    pub fn risk_vector(&self) -> Vec<f64> {
        let end = (self.iteration + 1).min(self.risk.len());
        self.risk[..end].to_vec()
    }

    /// Recorded logger values.
    pub fn logger_data(&self) -> LoggerTable {
        self.loggers.logger_data()
    }

    /// Constant initial score.
    pub fn offset(&self) -> f64 {
        self.offset
    }

    /// Current lifecycle state.
    pub fn state(&self) -> EngineState {
        self.state
    }

    /// Active iteration.
    pub fn iteration(&self) -> IterationIndex {
        self.iteration
    }

    /// Number of iterations in the track.
    pub fn trained_iterations(&self) -> IterationIndex {
        self.track.len()
    }

    /// Engine configuration.
    pub fn config(&self) -> &BoostingConfig {
        &self.config
    }

    /// Training response after the loss' preparation.
    pub fn response(&self) -> &Vector {
        &self.response
    }

    /// Training loss.
    pub fn loss(&self) -> &SharedLoss {
        &self.loss
    }

    /// Candidate pool.
    pub fn registry(&self) -> &FactoryRegistry {
        &self.registry
    }

    /// Registered loggers.
    pub fn loggers(&self) -> &LoggerList {
        &self.loggers
    }

    /// Full base-learner track.
    pub fn track(&self) -> &BaselearnerTrack {
        &self.track
    }

    /// Token that cancels this engine's training from another thread.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancellation.clone()
    }

    /// Human readable overview of the engine.
    pub fn summary(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "Component-wise boosting engine");
        let _ = writeln!(out, "  state:          {}", self.state);
        let _ = writeln!(out, "  loss:           {} ({})", self.loss.name(), self.loss.task());
        let _ = writeln!(out, "  optimizer:      {}", self.optimizer.name());
        let _ = writeln!(out, "  learning rate:  {}", self.config.learning_rate);
        let _ = writeln!(out, "  offset:         {:.6}", self.offset);
        let _ = writeln!(out, "  stop policy:    {}", self.config.stop_policy());
        let _ = writeln!(
            out,
            "  iterations:     {} active, {} trained",
            self.iteration,
            self.track.len()
        );
        let _ = writeln!(out, "  candidates:     {}", self.registry.len());
        if let Some(risk) = self.risk_vector().last() {
            let _ = writeln!(out, "  training risk:  {risk:.6}");
        }

        let mut counts: BTreeMap<String, usize> = BTreeMap::new();
        for id in self.selected_learner_ids() {
            *counts.entry(id).or_insert(0) += 1;
        }
        if !counts.is_empty() {
            let _ = writeln!(out, "  selected learners:");
            for (id, count) in counts {
                let share = 100.0 * count as f64 / self.iteration.max(1) as f64;
                let _ = writeln!(out, "    {id}: {count} ({share:.1}%)");
            }
        }
        out
    }

    /// Capture the serializable state.
    pub fn snapshot(&self) -> EngineSnapshot {
        EngineSnapshot {
            version: EngineSnapshot::current_version(),
            config: self.config.clone(),
            loss_name: self.loss.name().to_string(),
            state: self.state,
            iteration: self.iteration,
            offset: self.offset,
            entries: self.track.entries().to_vec(),
            risk: self.risk.clone(),
            logger_table: self.loggers.logger_data(),
        }
    }

    /// Write [`snapshot`](Self::snapshot) to `path` as JSON or bincode, by extension.
    pub fn save_snapshot<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        self.snapshot().save(path)
    }

    /// Rebuild an engine from a snapshot and the collaborators it was trained with.
    ///
    /// Loggers get their recorded values back and the out-of-bag loggers
    /// replay their scores, so the restored engine continues training like
    /// the original one.
    pub fn restore(
        snapshot: EngineSnapshot,
        response: ArrayView1<'_, f64>,
        loss: SharedLoss,
        optimizer: Box<dyn Optimizer>,
        loggers: LoggerList,
        registry: FactoryRegistry,
    ) -> Result<Self> {
        snapshot.check()?;
        if snapshot.loss_name != loss.name() {
            return Err(CwBoostError::serialization(format!(
                "snapshot was trained with loss '{}', got '{}'",
                snapshot.loss_name,
                loss.name()
            )));
        }
        let mut engine = Engine::new(
            snapshot.config.clone(),
            response,
            loss,
            optimizer,
            loggers,
            registry,
        )?;
        if snapshot.state == EngineState::Uninitialized {
            return Ok(engine);
        }

        for entry in snapshot.entries {
            if !engine.registry.contains(&entry.learner_id) {
                return Err(CwBoostError::unknown_identifier(entry.learner_id));
            }
            engine.track.push_entry(entry)?;
        }
        engine.offset = snapshot.offset;
        engine.risk = snapshot.risk;

        let parameters = engine.track.parameter_map()?;
        let init = LoggerInit {
            offset: engine.offset,
            loss: engine.loss.as_ref(),
            registry: &engine.registry,
        };
        engine
            .loggers
            .restore(&init, &parameters, &snapshot.logger_table)?;

        engine.state = match snapshot.state {
            EngineState::Running => EngineState::StoppedByCancellation,
            other => other,
        };
        let active = engine.track.parameter_of_iteration(snapshot.iteration)?;
        engine.prediction = engine.training_scores(&active)?;
        engine.iteration = snapshot.iteration;
        log::info!(
            "restored engine at iteration {} of {}",
            engine.iteration,
            engine.track.len()
        );
        Ok(engine)
    }
}
