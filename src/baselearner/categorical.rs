//! Base learners on categorical features.
//!
//! Class labels are read with [`DataProvider::get_categorical`]. The ridge
//! learner estimates one effect per class, the binary learner a single effect
//! for one chosen class. Both have closed-form fits, so no factorization is
//! cached.

use crate::baselearner::{BaseLearner, BaseLearnerFactory, LinearBaseLearner};
use crate::config::CategoricalRidgeConfig;
use crate::core::error::{CwBoostError, Result};
use crate::core::linalg;
use crate::core::types::{Matrix, Vector};
use crate::dataset::{DataProvider, NewData};
use ndarray::{Array2, ArrayView1};
use std::collections::HashMap;
use std::sync::Arc;

fn check_residual(design: &Matrix, residual: &ArrayView1<'_, f64>) -> Result<()> {
    if residual.len() != design.nrows() {
        return Err(CwBoostError::dimension_mismatch(
            format!("residual of length {}", design.nrows()),
            residual.len().to_string(),
        ));
    }
    Ok(())
}

fn new_labels<'a>(new_data: &'a NewData, key: &str, factory_id: &str) -> Result<&'a [String]> {
    new_data.get_categorical(key).ok_or_else(|| {
        CwBoostError::unknown_identifier(format!(
            "new data is missing categorical key '{key}' needed by '{factory_id}'"
        ))
    })
}

fn numeric_input_error(factory_id: &str, key: &str) -> CwBoostError {
    CwBoostError::config(format!(
        "'{factory_id}' is built on categorical data '{key}' and needs class labels"
    ))
}

/// Factory for ridge-penalized class effects.
///
/// The basis is the dummy matrix with one column per class, in order of first
/// appearance. The penalized least squares estimate of class `k` is
/// `Σ_{i in k} r_i / (n_k + λ)`. With `config.df > 0`, λ is chosen so that
/// the class effects have that many effective degrees of freedom.
///
/// Labels unseen in training get an all-zero basis row, so their
/// contribution is zero.
#[derive(Debug, Clone)]
pub struct CategoricalRidgeFactory {
    data_identifier: String,
    factory_id: String,
    classes: Vec<String>,
    index: HashMap<String, usize>,
    counts: Vec<usize>,
    codes: Vec<usize>,
    penalty: f64,
    inverse: Vector,
    design: Arc<Matrix>,
}

impl CategoricalRidgeFactory {
    /// Build the dummy basis of the labels stored under `key`.
    pub fn new(data: &dyn DataProvider, key: &str, config: CategoricalRidgeConfig) -> Result<Self> {
        config.validate()?;
        let labels = data.get_categorical(key)?;
        if labels.is_empty() {
            return Err(CwBoostError::config(format!(
                "categorical data '{key}' is empty"
            )));
        }
        let factory_id = format!("{key}_categorical_ridge");

        let mut classes = Vec::new();
        let mut index = HashMap::new();
        let mut counts = Vec::new();
        let mut codes = Vec::with_capacity(labels.len());
        for label in labels.iter() {
            let code = *index.entry(label.clone()).or_insert_with(|| {
                classes.push(label.clone());
                counts.push(0);
                classes.len() - 1
            });
            counts[code] += 1;
            codes.push(code);
        }

        let penalty = if config.df > 0.0 {
            if config.df > classes.len() as f64 {
                return Err(CwBoostError::invalid_parameter(
                    "df",
                    config.df.to_string(),
                    format!("must not exceed the {} classes of '{key}'", classes.len()),
                ));
            }
            let gram = Array2::from_diag(&counts.iter().map(|&c| c as f64).collect::<Vector>());
            let identity = Array2::eye(classes.len());
            linalg::penalty_from_df(&gram.view(), &identity.view(), config.df)?
        } else {
            config.penalty
        };

        let inverse: Vector = counts.iter().map(|&c| 1.0 / (c as f64 + penalty)).collect();
        let mut design = Matrix::zeros((codes.len(), classes.len()));
        for (row, &code) in codes.iter().enumerate() {
            design[[row, code]] = 1.0;
        }
        log::debug!(
            "built '{}' with {} classes, penalty {}",
            factory_id,
            classes.len(),
            penalty
        );

        Ok(CategoricalRidgeFactory {
            data_identifier: key.to_string(),
            factory_id,
            classes,
            index,
            counts,
            codes,
            penalty,
            inverse,
            design: Arc::new(design),
        })
    }

    /// Classes in order of first appearance; parameter `k` belongs to class `k`.
    pub fn classes(&self) -> &[String] {
        &self.classes
    }

    /// Number of training rows per class.
    pub fn class_counts(&self) -> &[usize] {
        &self.counts
    }

    /// Ridge penalty λ, derived from `df` when set.
    pub fn penalty(&self) -> f64 {
        self.penalty
    }

    fn dummy_matrix(&self, labels: &[String]) -> Matrix {
        let mut basis = Matrix::zeros((labels.len(), self.classes.len()));
        let mut unknown = 0usize;
        for (row, label) in labels.iter().enumerate() {
            match self.index.get(label) {
                Some(&code) => basis[[row, code]] = 1.0,
                None => unknown += 1,
            }
        }
        if unknown > 0 {
            log::debug!(
                "'{}': {} rows of new data have classes unseen in training",
                self.factory_id,
                unknown
            );
        }
        basis
    }
}

impl BaseLearnerFactory for CategoricalRidgeFactory {
    fn factory_id(&self) -> &str {
        &self.factory_id
    }

    fn learner_type(&self) -> &str {
        "categorical_ridge"
    }

    fn data_identifier(&self) -> &str {
        &self.data_identifier
    }

    fn data(&self) -> &Arc<Matrix> {
        &self.design
    }

    fn create_baselearner(&self, residual: &ArrayView1<'_, f64>) -> Result<Box<dyn BaseLearner>> {
        check_residual(&self.design, residual)?;
        let mut parameter = Vector::zeros(self.classes.len());
        for (&code, &r) in self.codes.iter().zip(residual.iter()) {
            parameter[code] += r;
        }
        parameter *= &self.inverse;
        Ok(Box::new(LinearBaseLearner::new(
            self.factory_id.clone(),
            Arc::clone(&self.design),
            parameter,
        )))
    }

    fn instantiate_data(&self, _raw: &Matrix) -> Result<Matrix> {
        Err(numeric_input_error(&self.factory_id, &self.data_identifier))
    }

    fn instantiate_new_data(&self, new_data: &NewData) -> Result<Matrix> {
        let labels = new_labels(new_data, &self.data_identifier, &self.factory_id)?;
        Ok(self.dummy_matrix(labels))
    }
}

/// Factory for the effect of a single class against all others.
///
/// The basis is the indicator column of `class` and the fit is the mean
/// residual within the class.
#[derive(Debug, Clone)]
pub struct CategoricalBinaryFactory {
    data_identifier: String,
    class: String,
    learner_type: String,
    factory_id: String,
    members: Vec<usize>,
    design: Arc<Matrix>,
}

impl CategoricalBinaryFactory {
    /// Indicator learner for `class` of the labels stored under `key`.
    pub fn new(data: &dyn DataProvider, key: &str, class: &str) -> Result<Self> {
        let labels = data.get_categorical(key)?;
        Self::from_labels(key, &labels, class)
    }

    /// One indicator learner per class of `key`, in order of first appearance.
    pub fn for_all_classes(data: &dyn DataProvider, key: &str) -> Result<Vec<Self>> {
        let labels = data.get_categorical(key)?;
        let mut seen = std::collections::HashSet::new();
        labels
            .iter()
            .filter(|label| seen.insert(label.as_str()))
            .map(|class| Self::from_labels(key, &labels, class))
            .collect()
    }

    fn from_labels(key: &str, labels: &[String], class: &str) -> Result<Self> {
        let members: Vec<usize> = labels
            .iter()
            .enumerate()
            .filter(|(_, label)| label.as_str() == class)
            .map(|(i, _)| i)
            .collect();
        if members.is_empty() {
            return Err(CwBoostError::invalid_parameter(
                "class",
                class,
                format!("does not occur in categorical data '{key}'"),
            ));
        }
        let learner_type = format!("{class}_categorical_binary");
        let factory_id = format!("{key}_{learner_type}");
        let mut design = Matrix::zeros((labels.len(), 1));
        for &row in &members {
            design[[row, 0]] = 1.0;
        }
        Ok(CategoricalBinaryFactory {
            data_identifier: key.to_string(),
            class: class.to_string(),
            learner_type,
            factory_id,
            members,
            design: Arc::new(design),
        })
    }

    /// The class this learner separates.
    pub fn class(&self) -> &str {
        &self.class
    }
}

impl BaseLearnerFactory for CategoricalBinaryFactory {
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
        check_residual(&self.design, residual)?;
        let sum: f64 = self.members.iter().map(|&i| residual[i]).sum();
        let parameter = Vector::from_elem(1, sum / self.members.len() as f64);
        Ok(Box::new(LinearBaseLearner::new(
            self.factory_id.clone(),
            Arc::clone(&self.design),
            parameter,
        )))
    }

    fn instantiate_data(&self, _raw: &Matrix) -> Result<Matrix> {
        Err(numeric_input_error(&self.factory_id, &self.data_identifier))
    }

    fn instantiate_new_data(&self, new_data: &NewData) -> Result<Matrix> {
        let labels = new_labels(new_data, &self.data_identifier, &self.factory_id)?;
        Ok(Matrix::from_shape_fn((labels.len(), 1), |(i, _)| {
            if labels[i] == self.class {
                1.0
            } else {
                0.0
            }
        }))
    }
}
