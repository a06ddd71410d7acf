//! Summary statistics for an ordered set.

use crate::scoring::{compatibility, ScoringWeights};
use crate::set_generator::CROSSFADE_OVERLAP_SECONDS;
use crate::track::Track;
use serde::Serialize;
use uuid::Uuid;

/// Score of one transition in a set.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Transition {
    pub from: Uuid,
    pub to: Uuid,
    pub score: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SetSummary {
    pub track_ids: Vec<Uuid>,
    pub track_count: usize,
    /// Sum of track durations, ignoring overlaps
    pub total_duration_seconds: f64,
    /// Play time with every transition overlapped
    pub mixed_duration_seconds: f64,
    /// `H:MM:SS` or `M:SS` rendering of the mixed duration
    pub duration: String,
    pub total_compatibility: f64,
    pub avg_compatibility: f64,
    pub transitions: Vec<Transition>,
}

impl SetSummary {
    #[must_use]
    /// Summarize `sequence` as played in order.
    ///
    /// Every transition is scored with `weights`; an empty or single-track
    /// sequence has no transitions and zero compatibility.
    pub fn new(sequence: &[Track], weights: &ScoringWeights) -> Self {
        let weights = weights.normalized();
        let transitions: Vec<Transition> = sequence
            .windows(2)
            .map(|pair| Transition {
                from: pair[0].id,
                to: pair[1].id,
                score: compatibility(&pair[0], &pair[1], &weights),
            })
            .collect();

        let total_compatibility: f64 = transitions.iter().map(|t| t.score).sum();
        #[allow(clippy::cast_precision_loss)]
        let avg_compatibility = if transitions.is_empty() {
            0.0
        } else {
            total_compatibility / transitions.len() as f64
        };

        let total_duration_seconds: f64 = sequence.iter().map(|t| t.duration_seconds).sum();
        #[allow(clippy::cast_precision_loss)]
        let overlap = transitions.len() as f64 * CROSSFADE_OVERLAP_SECONDS;
        let mixed_duration_seconds = (total_duration_seconds - overlap).max(0.0);

        Self {
            track_ids: sequence.iter().map(|t| t.id).collect(),
            track_count: sequence.len(),
            total_duration_seconds,
            mixed_duration_seconds,
            duration: format_duration(mixed_duration_seconds),
            total_compatibility,
            avg_compatibility,
            transitions,
        }
    }

    /// The weakest transition, if the set has any.
    #[must_use]
    pub fn weakest_transition(&self) -> Option<&Transition> {
        self.transitions.iter().min_by(|a, b| a.score.total_cmp(&b.score))
    }
}

/// `3725.0` -> `"1:02:05"`, `245.0` -> `"4:05"`. Fractions are dropped.
#[must_use]
pub fn format_duration(seconds: f64) -> String {
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let total = seconds.max(0.0) as u64;
    let (hours, minutes, secs) = (total / 3600, (total % 3600) / 60, total % 60);
    if hours > 0 {
        format!("{hours}:{minutes:02}:{secs:02}")
    } else {
        format!("{minutes}:{secs:02}")
    }
}
