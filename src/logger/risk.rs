//! In-bag and out-of-bag risk loggers.

use crate::baselearner::BaseLearnerFactory;
use crate::core::error::{CwBoostError, Result};
use crate::core::types::{IterationIndex, Matrix, ParameterMap, Vector};
use crate::dataset::NewData;
use crate::logger::stopping::{PlateauConfig, RiskPlateau};
use crate::logger::{Logger, LoggerContext, LoggerInit, LoggerKind};
use crate::loss::{Loss, SharedLoss};
use std::collections::HashMap;
use std::sync::Arc;

/// Empirical risk of the training scores after every iteration.
///
/// The risk uses the training loss unless a separate evaluation loss is
/// given, e.g. absolute loss to monitor a quadratic fit.
#[derive(Debug, Clone)]
pub struct InbagRiskLogger {
    id: String,
    stopper: bool,
    loss: Option<SharedLoss>,
    plateau: RiskPlateau,
    values: Vec<(IterationIndex, f64)>,
}

impl InbagRiskLogger {
    /// Create an in-bag risk logger.
    pub fn new<S: Into<String>>(
        id: S,
        stopper: bool,
        plateau: PlateauConfig,
        loss: Option<SharedLoss>,
    ) -> Result<Self> {
        plateau.validate()?;
        Ok(InbagRiskLogger {
            id: id.into(),
            stopper,
            loss,
            plateau: RiskPlateau::new(plateau),
            values: Vec::new(),
        })
    }

    /// Plateau detector state.
    pub fn plateau(&self) -> &RiskPlateau {
        &self.plateau
    }
}

impl Logger for InbagRiskLogger {
    fn id(&self) -> &str {
        &self.id
    }

    fn kind(&self) -> LoggerKind {
        LoggerKind::InbagRisk
    }

    fn is_stopper(&self) -> bool {
        self.stopper
    }

    fn set_stopper(&mut self, stopper: bool) {
        self.stopper = stopper;
    }

    fn initialize(&mut self, _init: &LoggerInit<'_>) -> Result<()> {
        self.values.clear();
        self.plateau.reset();
        Ok(())
    }

    fn log(&mut self, context: &LoggerContext<'_>) -> Result<()> {
        let loss: &dyn Loss = match &self.loss {
            Some(loss) => loss.as_ref(),
            None => context.loss,
        };
        let risk = loss.empirical_risk(&context.truth, &context.prediction)?;
        self.plateau.update(risk);
        self.values.push((context.iteration, risk));
        Ok(())
    }

    fn reached_stop_criteria(&self) -> bool {
        self.stopper && self.plateau.is_reached()
    }

    fn values(&self) -> &[(IterationIndex, f64)] {
        &self.values
    }

    fn status(&self) -> String {
        risk_status(self.last_value())
    }

    fn restore(
        &mut self,
        _init: &LoggerInit<'_>,
        _parameters: &ParameterMap,
        values: &[(IterationIndex, f64)],
    ) -> Result<()> {
        self.plateau.reset();
        for &(_, risk) in values {
            self.plateau.update(risk);
        }
        self.values = values.to_vec();
        Ok(())
    }

    fn clear(&mut self) {
        self.values.clear();
        self.plateau.reset();
    }
}

/// Empirical risk on held-out data.
///
/// The logger keeps its own score vector for the hold-out rows. It starts at
/// the engine offset and receives the scaled contribution of every selected
/// learner, evaluated on the hold-out basis of the matching factory.
#[derive(Debug, Clone)]
pub struct OobRiskLogger {
    id: String,
    stopper: bool,
    loss: Option<SharedLoss>,
    plateau: RiskPlateau,
    oob_data: NewData,
    raw_response: Vector,
    response: Vector,
    prediction: Vector,
    bases: HashMap<String, (Arc<dyn BaseLearnerFactory>, Matrix)>,
    values: Vec<(IterationIndex, f64)>,
}

impl OobRiskLogger {
    /// Create an out-of-bag risk logger on `oob_data` with response `response`.
    ///
    /// Every matrix of `oob_data` must have one row per response value.
    pub fn new<S: Into<String>>(
        id: S,
        stopper: bool,
        oob_data: NewData,
        response: Vector,
        plateau: PlateauConfig,
        loss: Option<SharedLoss>,
    ) -> Result<Self> {
        let id = id.into();
        plateau.validate()?;
        if oob_data.is_empty() || response.is_empty() {
            return Err(CwBoostError::logger(format!(
                "out-of-bag logger '{id}' needs held-out data"
            )));
        }
        if let Some((key, rows)) = oob_data.row_counts().find(|&(_, n)| n != response.len()) {
            return Err(CwBoostError::logger(format!(
                "out-of-bag logger '{id}': data '{key}' has {rows} rows, response has {}",
                response.len()
            )));
        }
        let n = response.len();
        Ok(OobRiskLogger {
            id,
            stopper,
            loss,
            plateau: RiskPlateau::new(plateau),
            oob_data,
            response: response.clone(),
            raw_response: response,
            prediction: Vector::zeros(n),
            bases: HashMap::new(),
            values: Vec::new(),
        })
    }

    /// Current scores on the hold-out rows.
    pub fn prediction(&self) -> &Vector {
        &self.prediction
    }

    /// Plateau detector state.
    pub fn plateau(&self) -> &RiskPlateau {
        &self.plateau
    }

    fn add_contribution(&mut self, learner_id: &str, parameter: &Vector) -> Result<()> {
        let (factory, basis) = self.bases.get(learner_id).ok_or_else(|| {
            CwBoostError::logger(format!(
                "out-of-bag logger '{}' has no basis for '{learner_id}'",
                self.id
            ))
        })?;
        let contribution = factory.linear_predictor(basis, parameter)?;
        self.prediction += &contribution;
        Ok(())
    }

    fn risk(&self, fallback: &dyn Loss) -> Result<f64> {
        let loss: &dyn Loss = match &self.loss {
            Some(loss) => loss.as_ref(),
            None => fallback,
        };
        loss.empirical_risk(&self.response.view(), &self.prediction.view())
    }
}

impl Logger for OobRiskLogger {
    fn id(&self) -> &str {
        &self.id
    }

    fn kind(&self) -> LoggerKind {
        LoggerKind::OobRisk
    }

    fn is_stopper(&self) -> bool {
        self.stopper
    }

    fn set_stopper(&mut self, stopper: bool) {
        self.stopper = stopper;
    }

    fn initialize(&mut self, init: &LoggerInit<'_>) -> Result<()> {
        let loss: &dyn Loss = match &self.loss {
            Some(loss) => loss.as_ref(),
            None => init.loss,
        };
        self.response = loss.prepare_response(&self.raw_response.view())?;

        self.bases.clear();
        for factory in init.registry.iter() {
            let key = factory.data_identifier();
            if !self.oob_data.contains(key) {
                return Err(CwBoostError::logger(format!(
                    "out-of-bag logger '{}' is missing data '{key}' needed by '{}'",
                    self.id,
                    factory.factory_id()
                )));
            }
            let basis = factory.instantiate_new_data(&self.oob_data)?;
            self.bases
                .insert(factory.factory_id().to_string(), (Arc::clone(factory), basis));
        }

        self.prediction = Vector::from_elem(self.response.len(), init.offset);
        self.values.clear();
        self.plateau.reset();
        Ok(())
    }

    fn log(&mut self, context: &LoggerContext<'_>) -> Result<()> {
        let scaled = context.selected.parameter() * (context.learning_rate * context.step_size);
        self.add_contribution(context.selected.identifier(), &scaled)?;
        let risk = self.risk(context.loss)?;
        self.plateau.update(risk);
        self.values.push((context.iteration, risk));
        Ok(())
    }

    fn reached_stop_criteria(&self) -> bool {
        self.stopper && self.plateau.is_reached()
    }

    fn values(&self) -> &[(IterationIndex, f64)] {
        &self.values
    }

    fn status(&self) -> String {
        risk_status(self.last_value())
    }

    fn restore(
        &mut self,
        init: &LoggerInit<'_>,
        parameters: &ParameterMap,
        values: &[(IterationIndex, f64)],
    ) -> Result<()> {
        self.initialize(init)?;
        for (learner_id, parameter) in parameters {
            self.add_contribution(learner_id, parameter)?;
        }
        for &(_, risk) in values {
            self.plateau.update(risk);
        }
        self.values = values.to_vec();
        Ok(())
    }

    fn clear(&mut self) {
        self.values.clear();
        self.plateau.reset();
    }
}

fn risk_status(value: Option<f64>) -> String {
    match value {
        Some(risk) => format!("{risk:.6}"),
        None => "-".to_string(),
    }
}
