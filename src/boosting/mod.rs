//! Boosting engine, base-learner track and engine snapshots.
//!
//! - [`engine`]: the training state machine and its queries
//! - [`track`]: append-only history of selected learners
//! - [`snapshot`]: serializable engine state

pub mod engine;
pub mod snapshot;
pub mod track;

pub use engine::{CancellationToken, Engine};
pub use snapshot::{EngineSnapshot, SnapshotFormat};
pub use track::{BaselearnerTrack, ParameterMatrix, TrackEntry};
