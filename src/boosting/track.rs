//! Append-only history of selected base learners.
//!
//! Every iteration adds one entry holding the id of the selected learner and
//! its parameter already multiplied by the learning rate and step size. The cumulative
//! parameter of a learner at iteration `k` is the sum of its entries up to
//! `k`, so any historical state can be replayed exactly.

use crate::baselearner::BaseLearner;
use crate::core::error::{CwBoostError, Result};
use crate::core::types::{Matrix, ParameterMap, Vector};
use ndarray::Array2;
use serde::{Deserialize, Serialize};

/// One iteration of the track.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackEntry {
    /// 1-based iteration index
    pub iteration: usize,
    /// Id of the selected learner, `"{data_key}_{learner_type}"`
    pub learner_id: String,
    /// Parameter scaled by the learning rate and step size
    pub parameter: Vector,
    /// Step size chosen by the optimizer, `1` without line search
    #[serde(default = "unit_step")]
    pub step_size: f64,
}

fn unit_step() -> f64 {
    1.0
}

/// Cumulative parameters of all learners per iteration.
#[derive(Debug, Clone, PartialEq)]
pub struct ParameterMatrix {
    /// Learner ids in column order
    pub learner_ids: Vec<String>,
    /// One name per column, `"{learner_id}"` or `"{learner_id}_{j}"`
    pub column_names: Vec<String>,
    /// Row `i` holds the state after iteration `i + 1`
    pub values: Matrix,
}

/// Ordered record of selected learners.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BaselearnerTrack {
    entries: Vec<TrackEntry>,
}

impl BaselearnerTrack {
    /// Create an empty track.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append the selected learner with its parameter multiplied by
    /// `learning_rate * step_size`.
    ///
    /// Fails if the learner was selected before with a different number of
    /// parameters.
    pub fn insert(
        &mut self,
        learner: &dyn BaseLearner,
        learning_rate: f64,
        step_size: f64,
    ) -> Result<()> {
        let entry = TrackEntry {
            iteration: self.entries.len() + 1,
            learner_id: learner.identifier().to_string(),
            parameter: learner.parameter() * (learning_rate * step_size),
            step_size,
        };
        self.check_width(&entry)?;
        self.entries.push(entry);
        Ok(())
    }

    /// Append a stored entry, e.g. when restoring a snapshot.
    pub fn push_entry(&mut self, entry: TrackEntry) -> Result<()> {
        let expected = self.entries.len() + 1;
        if entry.iteration != expected {
            return Err(CwBoostError::serialization(format!(
                "track entry for iteration {} found where iteration {} was expected",
                entry.iteration, expected
            )));
        }
        self.check_width(&entry)?;
        self.entries.push(entry);
        Ok(())
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if nothing was recorded yet.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// All entries in iteration order.
    pub fn entries(&self) -> &[TrackEntry] {
        &self.entries
    }

    /// Entry of 1-based `iteration`.
    pub fn entry(&self, iteration: usize) -> Result<&TrackEntry> {
        self.check_iteration(iteration)?;
        Ok(&self.entries[iteration - 1])
    }

    /// Step sizes in iteration order.
    pub fn step_sizes(&self) -> Vec<f64> {
        self.entries.iter().map(|e| e.step_size).collect()
    }

    /// Ids of the selected learners in iteration order.
    pub fn selected_ids(&self) -> Vec<String> {
        self.entries.iter().map(|e| e.learner_id.clone()).collect()
    }

    /// Cumulative parameter of every selected learner after the last entry.
    pub fn parameter_map(&self) -> Result<ParameterMap> {
        accumulate(&self.entries)
    }

    /// Cumulative parameters after `iteration`; `0` yields an empty map.
    pub fn parameter_of_iteration(&self, iteration: usize) -> Result<ParameterMap> {
        if iteration == 0 {
            return Ok(ParameterMap::new());
        }
        self.check_iteration(iteration)?;
        accumulate(&self.entries[..iteration])
    }

    /// Cumulative parameters of every iteration as one matrix.
    ///
    /// Columns are grouped by learner id in lexical order.
    pub fn parameter_matrix(&self) -> Result<ParameterMatrix> {
        let final_state = self.parameter_map()?;
        let mut learner_ids = Vec::with_capacity(final_state.len());
        let mut column_names = Vec::new();
        let mut offsets = ParameterMapOffsets::new();
        for (id, parameter) in &final_state {
            offsets.insert(id.clone(), (column_names.len(), parameter.len()));
            learner_ids.push(id.clone());
            if parameter.len() == 1 {
                column_names.push(id.clone());
            } else {
                column_names.extend((0..parameter.len()).map(|j| format!("{id}_{j}")));
            }
        }

        let mut values = Array2::zeros((self.entries.len(), column_names.len()));
        let mut running = vec![0.0; column_names.len()];
        for (row, entry) in self.entries.iter().enumerate() {
            if let Some(&(start, width)) = offsets.get(&entry.learner_id) {
                for (j, value) in entry.parameter.iter().take(width).enumerate() {
                    running[start + j] += value;
                }
            }
            for (col, value) in running.iter().enumerate() {
                values[[row, col]] = *value;
            }
        }

        Ok(ParameterMatrix {
            learner_ids,
            column_names,
            values,
        })
    }

    /// Remove every entry.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    fn check_width(&self, entry: &TrackEntry) -> Result<()> {
        let earlier = self
            .entries
            .iter()
            .find(|e| e.learner_id == entry.learner_id);
        match earlier {
            Some(e) if e.parameter.len() != entry.parameter.len() => {
                Err(CwBoostError::dimension_mismatch(
                    format!("{} parameters for '{}'", e.parameter.len(), entry.learner_id),
                    entry.parameter.len().to_string(),
                ))
            }
            _ => Ok(()),
        }
    }

    fn check_iteration(&self, iteration: usize) -> Result<()> {
        if iteration == 0 || iteration > self.entries.len() {
            return Err(CwBoostError::IterationOutOfRange {
                iteration,
                available: self.entries.len(),
            });
        }
        Ok(())
    }
}

type ParameterMapOffsets = std::collections::HashMap<String, (usize, usize)>;

fn accumulate(entries: &[TrackEntry]) -> Result<ParameterMap> {
    let mut map = ParameterMap::new();
    for entry in entries {
        match map.get_mut(&entry.learner_id) {
            Some(sum) if sum.len() == entry.parameter.len() => *sum += &entry.parameter,
            Some(sum) => {
                return Err(CwBoostError::dimension_mismatch(
                    format!("{} parameters for '{}'", sum.len(), entry.learner_id),
                    format!("{} in iteration {}", entry.parameter.len(), entry.iteration),
                ));
            }
            None => {
                map.insert(entry.learner_id.clone(), entry.parameter.clone());
            }
        }
    }
    Ok(map)
}
