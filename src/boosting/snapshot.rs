//! Serializable engine state.
//!
//! A snapshot holds everything needed to rebuild a trained engine except the
//! parts that cannot be serialized: the data, the loss object, the optimizer,
//! the loggers and the factory registry. Those are handed to
//! [`Engine::restore`](crate::boosting::Engine::restore) again.

use crate::boosting::track::TrackEntry;
use crate::config::BoostingConfig;
use crate::core::constants::CWBOOST_VERSION;
use crate::core::error::{CwBoostError, Result};
use crate::core::types::{EngineState, IterationIndex};
use crate::logger::LoggerTable;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

/// On-disk encoding of a snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnapshotFormat {
    /// Pretty printed JSON
    Json,
    /// Compact bincode
    Bincode,
}

impl SnapshotFormat {
    /// Pick the format from a file extension: `.json`, `.bin` or `.bincode`.
    pub fn from_path(path: &Path) -> Result<Self> {
        match path.extension().and_then(|e| e.to_str()) {
            Some("json") => Ok(SnapshotFormat::Json),
            Some("bin") | Some("bincode") => Ok(SnapshotFormat::Bincode),
            other => Err(CwBoostError::serialization(format!(
                "unsupported snapshot extension {:?}, use .json, .bin or .bincode",
                other.unwrap_or("")
            ))),
        }
    }
}

/// Persisted state of an [`Engine`](crate::boosting::Engine).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineSnapshot {
    /// Library version that wrote the snapshot
    pub version: String,
    /// Engine configuration
    pub config: BoostingConfig,
    /// Name of the training loss
    pub loss_name: String,
    /// Engine state when the snapshot was taken
    pub state: EngineState,
    /// Active iteration
    pub iteration: IterationIndex,
    /// Constant initial score
    pub offset: f64,
    /// Every track entry, including those after the active iteration
    pub entries: Vec<TrackEntry>,
    /// Training risk, element `k` after iteration `k`
    pub risk: Vec<f64>,
    /// Recorded logger values
    pub logger_table: LoggerTable,
}

impl EngineSnapshot {
    pub(crate) fn current_version() -> String {
        CWBOOST_VERSION.to_string()
    }

    /// Number of stored iterations.
    pub fn num_entries(&self) -> usize {
        self.entries.len()
    }

    /// Write the snapshot; the format follows the file extension.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let format = SnapshotFormat::from_path(path)?;
        let mut writer = BufWriter::new(File::create(path)?);
        match format {
            SnapshotFormat::Json => serde_json::to_writer_pretty(&mut writer, self)?,
            SnapshotFormat::Bincode => bincode::serialize_into(&mut writer, self)?,
        }
        writer.flush()?;
        log::debug!("saved snapshot with {} entries to {}", self.entries.len(), path.display());
        Ok(())
    }

    /// Read a snapshot; the format follows the file extension.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let format = SnapshotFormat::from_path(path)?;
        let reader = BufReader::new(File::open(path)?);
        let snapshot: EngineSnapshot = match format {
            SnapshotFormat::Json => serde_json::from_reader(reader)?,
            SnapshotFormat::Bincode => bincode::deserialize_from(reader)?,
        };
        if snapshot.version != CWBOOST_VERSION {
            log::warn!(
                "snapshot written by cwboost {}, reading with {}",
                snapshot.version,
                CWBOOST_VERSION
            );
        }
        snapshot.check()?;
        Ok(snapshot)
    }

    /// Check the internal consistency of the stored state.
    pub fn check(&self) -> Result<()> {
        if self.iteration > self.entries.len() {
            return Err(CwBoostError::serialization(format!(
                "active iteration {} exceeds the {} stored entries",
                self.iteration,
                self.entries.len()
            )));
        }
        if self.risk.len() != self.entries.len() + 1 && self.state != EngineState::Uninitialized {
            return Err(CwBoostError::serialization(format!(
                "risk vector has {} values for {} entries",
                self.risk.len(),
                self.entries.len()
            )));
        }
        for (k, entry) in self.entries.iter().enumerate() {
            if entry.iteration != k + 1 {
                return Err(CwBoostError::serialization(format!(
                    "entry {} is labelled iteration {}",
                    k + 1,
                    entry.iteration
                )));
            }
        }
        Ok(())
    }
}
