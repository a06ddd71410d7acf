//! Candidate filters, AND-combined and applied before scoring.

use super::SuggestionConfig;
use crate::scoring::key_compatibility;
use crate::track::Track;

/// Minimum full-confidence harmonic score kept by key lock.
pub const KEY_LOCK_MIN_HARMONIC: f64 = 0.4;

/// Inclusive tempo bounds; a missing bound does not filter.
#[must_use]
pub fn in_bpm_range(track: &Track, min: Option<f64>, max: Option<f64>) -> bool {
    min.map_or(true, |min| track.bpm >= min) && max.map_or(true, |max| track.bpm <= max)
}

/// Neighbours, diagonals and parallel keys pass; distant keys do not.
#[must_use]
pub fn key_locked(candidate: &Track, current: &Track) -> bool {
    key_compatibility(current.key, candidate.key) >= KEY_LOCK_MIN_HARMONIC
}

#[must_use]
pub fn groove_locked(candidate: &Track, current: &Track) -> bool {
    candidate.groove_type == current.groove_type
}

/// Unclustered tracks are never excluded.
#[must_use]
pub fn outside_excluded_clusters(track: &Track, excluded: &[u32]) -> bool {
    track.cluster_id.map_or(true, |id| !excluded.contains(&id))
}

/// Keep only candidates passing every enabled filter.
#[must_use]
pub fn apply_filters<'a>(
    candidates: Vec<&'a Track>,
    current: &Track,
    config: &SuggestionConfig,
) -> Vec<&'a Track> {
    candidates
        .into_iter()
        .filter(|t| in_bpm_range(t, config.bpm_min, config.bpm_max))
        .filter(|t| !config.key_lock || key_locked(t, current))
        .filter(|t| !config.groove_lock || groove_locked(t, current))
        .filter(|t| outside_excluded_clusters(t, &config.exclude_cluster_ids))
        .collect()
}
