//! Data provider abstraction for cwboost.
//!
//! Base-learner factories never read raw input directly. They ask a
//! [`DataProvider`] for the raw matrix stored under a key (usually a feature
//! name) and build their basis from it once. Providers must be stable: the
//! same key yields the same matrix for the whole training run.
//!
//! Categorical features are stored as one class label per row and read with
//! [`DataProvider::get_categorical`].

pub mod memory;

pub use memory::InMemoryData;

use crate::core::error::{CwBoostError, Result};
use crate::core::types::Matrix;
use ndarray::{Array1, Axis};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use std::collections::HashMap;
use std::fmt::Debug;
use std::sync::Arc;

/// New raw data for prediction, keyed like the training provider.
///
/// Numeric matrices and categorical label columns live in separate maps, so
/// a key names either a matrix or a label column.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NewData {
    numeric: HashMap<String, Matrix>,
    categorical: HashMap<String, Vec<String>>,
}

impl NewData {
    /// Create an empty set of new data.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a raw numeric matrix, returning the one it replaces.
    pub fn insert<S: Into<String>>(&mut self, key: S, matrix: Matrix) -> Option<Matrix> {
        self.numeric.insert(key.into(), matrix)
    }

    /// Insert a column of class labels, returning the one it replaces.
    pub fn insert_categorical<S: Into<String>>(
        &mut self,
        key: S,
        labels: Vec<String>,
    ) -> Option<Vec<String>> {
        self.categorical.insert(key.into(), labels)
    }

    /// Remove `key` of either kind, returning whether it was present.
    pub fn remove(&mut self, key: &str) -> bool {
        self.numeric.remove(key).is_some() | self.categorical.remove(key).is_some()
    }

    /// Raw numeric matrix stored under `key`.
    pub fn get(&self, key: &str) -> Option<&Matrix> {
        self.numeric.get(key)
    }

    /// Class labels stored under `key`.
    pub fn get_categorical(&self, key: &str) -> Option<&[String]> {
        self.categorical.get(key).map(Vec::as_slice)
    }

    /// Check if `key` names a numeric or a categorical entry.
    pub fn contains(&self, key: &str) -> bool {
        self.numeric.contains_key(key) || self.categorical.contains_key(key)
    }

    /// Number of stored entries of both kinds.
    pub fn len(&self) -> usize {
        self.numeric.len() + self.categorical.len()
    }

    /// Check if nothing is stored.
    pub fn is_empty(&self) -> bool {
        self.numeric.is_empty() && self.categorical.is_empty()
    }

    /// Row count of every entry, keyed by data key.
    pub fn row_counts(&self) -> impl Iterator<Item = (&str, usize)> + '_ {
        self.numeric
            .iter()
            .map(|(k, m)| (k.as_str(), m.nrows()))
            .chain(self.categorical.iter().map(|(k, l)| (k.as_str(), l.len())))
    }

    /// Row count of an arbitrary entry, `None` when empty.
    pub fn num_rows(&self) -> Option<usize> {
        self.row_counts().next().map(|(_, n)| n)
    }
}

/// Source of raw feature data keyed by a string identifier.
pub trait DataProvider: Send + Sync + Debug {
    /// Return the raw matrix stored under `key`.
    fn get(&self, key: &str) -> Result<Arc<Matrix>>;

    /// Return the class labels stored under `key`.
    fn get_categorical(&self, key: &str) -> Result<Arc<Vec<String>>> {
        Err(CwBoostError::unknown_identifier(format!(
            "categorical data key '{key}'"
        )))
    }

    /// Number of observations (rows) every matrix of this provider has.
    fn num_observations(&self) -> usize;

    /// All keys known to this provider.
    fn keys(&self) -> Vec<String>;

    /// Check if `key` is available.
    fn contains(&self, key: &str) -> bool {
        self.keys().iter().any(|k| k == key)
    }
}

/// Row indices of a reproducible train/hold-out split.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HoldoutSplit {
    /// Rows used for training
    pub train: Vec<usize>,
    /// Rows held out (out-of-bag)
    pub holdout: Vec<usize>,
}

impl HoldoutSplit {
    /// Shuffle `num_rows` indices with `seed` and hold out `fraction` of them.
    pub fn new(num_rows: usize, fraction: f64, seed: u64) -> Result<Self> {
        if !(fraction > 0.0 && fraction < 1.0) {
            return Err(CwBoostError::invalid_parameter(
                "holdout_fraction",
                fraction.to_string(),
                "must be in (0, 1)",
            ));
        }
        let num_holdout = ((num_rows as f64) * fraction).round() as usize;
        if num_holdout == 0 || num_holdout >= num_rows {
            return Err(CwBoostError::invalid_parameter(
                "holdout_fraction",
                fraction.to_string(),
                format!("leaves an empty train or hold-out set for {num_rows} rows"),
            ));
        }

        let mut indices: Vec<usize> = (0..num_rows).collect();
        let mut rng = StdRng::seed_from_u64(seed);
        indices.shuffle(&mut rng);

        let mut holdout = indices.split_off(num_rows - num_holdout);
        let mut train = indices;
        train.sort_unstable();
        holdout.sort_unstable();
        Ok(HoldoutSplit { train, holdout })
    }

    /// Select the training rows of a matrix.
    pub fn train_rows(&self, matrix: &Matrix) -> Matrix {
        matrix.select(Axis(0), &self.train)
    }

    /// Select the hold-out rows of a matrix.
    pub fn holdout_rows(&self, matrix: &Matrix) -> Matrix {
        matrix.select(Axis(0), &self.holdout)
    }

    /// Select the training rows of a label column.
    pub fn train_labels(&self, labels: &[String]) -> Vec<String> {
        self.train.iter().map(|&i| labels[i].clone()).collect()
    }

    /// Select the hold-out rows of a label column.
    pub fn holdout_labels(&self, labels: &[String]) -> Vec<String> {
        self.holdout.iter().map(|&i| labels[i].clone()).collect()
    }

    /// Split a response vector into (train, hold-out).
    pub fn split_response(&self, response: &Array1<f64>) -> (Array1<f64>, Array1<f64>) {
        (
            response.select(Axis(0), &self.train),
            response.select(Axis(0), &self.holdout),
        )
    }
}
