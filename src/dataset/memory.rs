//! In-memory data provider.

use crate::core::error::{CwBoostError, Result};
use crate::core::types::Matrix;
use crate::dataset::{DataProvider, NewData};
use ndarray::{Array1, Array2};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Named raw feature blocks held in memory.
///
/// Every block, numeric or categorical, has the same number of rows. Blocks
/// are stored behind an `Arc`, so `get` hands out the same matrix on every
/// call.
#[derive(Debug, Clone, Default)]
pub struct InMemoryData {
    blocks: BTreeMap<String, Arc<Matrix>>,
    labels: BTreeMap<String, Arc<Vec<String>>>,
    num_observations: Option<usize>,
}

impl InMemoryData {
    /// Create an empty provider.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a single numeric column under `key`.
    pub fn with_column<S: Into<String>>(self, key: S, values: Array1<f64>) -> Result<Self> {
        let n = values.len();
        let matrix = values
            .into_shape_with_order((n, 1))
            .map_err(|e| CwBoostError::internal(format!("column reshape failed: {e}")))?;
        self.with_matrix(key, matrix)
    }

    /// Add a raw matrix under `key`.
    pub fn with_matrix<S: Into<String>>(mut self, key: S, matrix: Array2<f64>) -> Result<Self> {
        self.insert(key, matrix)?;
        Ok(self)
    }

    /// Add a column of class labels under `key`.
    pub fn with_categorical<S, L>(mut self, key: S, labels: impl IntoIterator<Item = L>) -> Result<Self>
    where
        S: Into<String>,
        L: Into<String>,
    {
        self.insert_categorical(key, labels.into_iter().map(Into::into).collect())?;
        Ok(self)
    }

    /// Insert a raw matrix under `key`, failing on duplicates and row mismatches.
    pub fn insert<S: Into<String>>(&mut self, key: S, matrix: Array2<f64>) -> Result<()> {
        let key = key.into();
        self.check_new_key(&key, matrix.nrows())?;
        self.blocks.insert(key, Arc::new(matrix));
        Ok(())
    }

    /// Insert class labels under `key`, failing on duplicates and row mismatches.
    pub fn insert_categorical<S: Into<String>>(&mut self, key: S, labels: Vec<String>) -> Result<()> {
        let key = key.into();
        self.check_new_key(&key, labels.len())?;
        self.labels.insert(key, Arc::new(labels));
        Ok(())
    }

    fn check_new_key(&mut self, key: &str, rows: usize) -> Result<()> {
        if self.contains(key) {
            return Err(CwBoostError::config(format!(
                "data key '{key}' is already present"
            )));
        }
        match self.num_observations {
            Some(n) if n != rows => Err(CwBoostError::dimension_mismatch(
                format!("{n} rows"),
                format!("{rows} rows for '{key}'"),
            )),
            Some(_) => Ok(()),
            None => {
                self.num_observations = Some(rows);
                Ok(())
            }
        }
    }

    /// Number of stored blocks.
    pub fn len(&self) -> usize {
        self.blocks.len() + self.labels.len()
    }

    /// Check if no block is stored.
    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty() && self.labels.is_empty()
    }

    /// Copy all blocks into a [`NewData`] map, e.g. to predict on the training sample.
    pub fn to_new_data(&self) -> NewData {
        let mut new_data = NewData::new();
        for (key, matrix) in &self.blocks {
            new_data.insert(key.clone(), matrix.as_ref().clone());
        }
        for (key, labels) in &self.labels {
            new_data.insert_categorical(key.clone(), labels.as_ref().clone());
        }
        new_data
    }
}

impl DataProvider for InMemoryData {
    fn get(&self, key: &str) -> Result<Arc<Matrix>> {
        self.blocks
            .get(key)
            .cloned()
            .ok_or_else(|| CwBoostError::unknown_identifier(format!("data key '{key}'")))
    }

    fn get_categorical(&self, key: &str) -> Result<Arc<Vec<String>>> {
        self.labels.get(key).cloned().ok_or_else(|| {
            CwBoostError::unknown_identifier(format!("categorical data key '{key}'"))
        })
    }

    fn num_observations(&self) -> usize {
        self.num_observations.unwrap_or(0)
    }

    fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.blocks.keys().chain(self.labels.keys()).cloned().collect();
        keys.sort_unstable();
        keys
    }

    fn contains(&self, key: &str) -> bool {
        self.blocks.contains_key(key) || self.labels.contains_key(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_get_returns_same_matrix() {
        let data = InMemoryData::new()
            .with_column("x", array![1.0, 2.0, 3.0])
            .unwrap();
        let a = data.get("x").unwrap();
        let b = data.get("x").unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(a.dim(), (3, 1));
        assert_eq!(data.num_observations(), 3);
    }

    #[test]
    fn test_row_mismatch_rejected() {
        let result = InMemoryData::new()
            .with_column("x", array![1.0, 2.0, 3.0])
            .unwrap()
            .with_column("z", array![1.0, 2.0]);
        assert!(matches!(
            result,
            Err(CwBoostError::DimensionMismatch { .. })
        ));
    }

    #[test]
    fn test_duplicate_and_unknown_keys() {
        let data = InMemoryData::new()
            .with_column("x", array![1.0, 2.0])
            .unwrap();
        assert!(data.clone().with_column("x", array![3.0, 4.0]).is_err());
        assert!(matches!(
            data.get("missing"),
            Err(CwBoostError::UnknownIdentifier { .. })
        ));
        assert!(data.contains("x"));
        assert_eq!(data.keys(), vec!["x".to_string()]);
    }

    #[test]
    fn test_categorical_columns() {
        let data = InMemoryData::new()
            .with_column("x", array![1.0, 2.0, 3.0])
            .unwrap()
            .with_categorical("g", ["a", "b", "a"])
            .unwrap();
        assert_eq!(data.len(), 2);
        assert_eq!(data.keys(), vec!["g".to_string(), "x".to_string()]);
        assert_eq!(data.get_categorical("g").unwrap().as_slice(), ["a", "b", "a"]);
        assert!(data.get("g").is_err());
        assert!(data.get_categorical("x").is_err());

        assert!(data.clone().with_categorical("x", ["a", "b", "c"]).is_err());
        assert!(matches!(
            data.clone().with_categorical("h", ["a"]),
            Err(CwBoostError::DimensionMismatch { .. })
        ));

        let new_data = data.to_new_data();
        assert_eq!(new_data.len(), 2);
        assert_eq!(new_data.get_categorical("g").map(<[String]>::len), Some(3));
    }
}
