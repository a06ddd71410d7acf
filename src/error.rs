//! Error types for the mixgraph engine.
//!
//! Invalid input is rejected when a [`Track`](crate::track::Track) or a
//! configuration is built. Empty pools, short sequences and unsatisfiable
//! filters are not errors; they produce empty or trivial results.

use thiserror::Error;
use uuid::Uuid;

/// Result alias for validation of tracks and configs
pub type Result<T> = std::result::Result<T, ValidationError>;

/// Rejected track records and configuration values
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    /// Key string is not `1`-`12` followed by `A` or `B`
    #[error("Invalid Camelot key: '{0}'")]
    InvalidCamelotKey(String),

    /// Tempo must be strictly positive
    #[error("BPM must be positive, got {0}")]
    NonPositiveBpm(f64),

    /// A normalized feature fell outside `[0, 1]`
    #[error("Field '{field}' must be within [0, 1], got {value}")]
    OutOfUnitRange { field: &'static str, value: f64 },

    /// Track durations cannot be negative
    #[error("Duration must be non-negative, got {0}")]
    NegativeDuration(f64),

    /// Scoring weights are negative, non-finite or sum to zero
    #[error("Invalid scoring weights: {0}")]
    InvalidWeights(String),

    /// `bpm_min` is greater than `bpm_max`
    #[error("Invalid BPM range: min {min} > max {max}")]
    InvalidBpmRange { min: f64, max: f64 },

    /// Set builder parameters out of range
    #[error("Invalid set builder config: {0}")]
    InvalidSetConfig(String),

    /// `eps` must be positive and `min_samples` at least 1
    #[error("Invalid cluster config: {0}")]
    InvalidClusterConfig(String),

    /// Custom energy curve points are out of range or unordered
    #[error("Invalid energy curve: {0}")]
    InvalidEnergyCurve(String),
}

/// Failures of the checked ordering entry point
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SequenceError {
    /// The same track appears more than once in a sequence
    #[error("Track {0} appears more than once in the sequence")]
    DuplicateTrack(Uuid),
}

/// Graph operations referring to tracks that are not nodes
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GraphError {
    #[error("Track {0} is not in the graph")]
    UnknownNode(Uuid),

    /// Edges from a track to itself are never stored
    #[error("Refusing to create a self-edge on {0}")]
    SelfEdge(Uuid),
}

/// Check that `value` lies in `[0, 1]`.
pub(crate) fn check_unit(field: &'static str, value: f64) -> Result<()> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(ValidationError::OutOfUnitRange { field, value })
    }
}
