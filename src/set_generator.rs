//! Whole-set generation following an energy curve.
//!
//! The set is grown one track at a time. Each step looks up the target
//! energy for the current position in the set and picks the candidate with
//! the best mix of transition score, energy fit and key distance. Sets of
//! four or more tracks are then reordered with [`crate::sequence`], keeping
//! the opener in place.

use crate::error::{Result, ValidationError};
use crate::scoring::{compatibility, ScoringWeights};
use crate::sequence::refine_order;
use crate::track::{CamelotKey, Track};
use clap::ValueEnum;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use uuid::Uuid;

/// Seconds two consecutive tracks overlap during a transition.
pub const CROSSFADE_OVERLAP_SECONDS: f64 = 8.0;
pub const DEFAULT_REFINE_ITERATIONS: usize = 500;

/// Sets shorter than this are not reordered.
const MIN_REFINE_LEN: usize = 4;

/// `(set progress, target energy)`, both in `[0, 1]`.
pub type CurvePoint = (f64, f64);

const WARM_UP_PEAK_COOL: &[CurvePoint] = &[(0.0, 0.4), (0.3, 0.65), (0.7, 0.9), (1.0, 0.5)];
const HIGH_ENERGY: &[CurvePoint] = &[(0.0, 0.7), (0.5, 0.85), (1.0, 0.75)];
const CHILL_LOUNGE: &[CurvePoint] = &[(0.0, 0.3), (0.5, 0.45), (1.0, 0.35)];
const ROLLERCOASTER: &[CurvePoint] = &[(0.0, 0.4), (0.25, 0.9), (0.5, 0.5), (0.75, 0.85), (1.0, 0.4)];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum EnergyProfile {
    #[default]
    WarmUpPeakCool,
    HighEnergy,
    ChillLounge,
    Rollercoaster,
    /// Uses `custom_energy_points`; falls back to warm-up/peak/cool without them
    Custom,
}

impl EnergyProfile {
    /// Built-in control points; `Custom` has none of its own.
    #[must_use]
    pub const fn builtin_curve(self) -> &'static [CurvePoint] {
        match self {
            Self::WarmUpPeakCool | Self::Custom => WARM_UP_PEAK_COOL,
            Self::HighEnergy => HIGH_ENERGY,
            Self::ChillLounge => CHILL_LOUNGE,
            Self::Rollercoaster => ROLLERCOASTER,
        }
    }
}

/// Piecewise-linear energy target, clamped to the first and last points.
///
/// An empty curve targets 0.5 everywhere.
#[must_use]
pub fn interpolate_energy(curve: &[CurvePoint], progress: f64) -> f64 {
    let (Some(&(first_pos, first_energy)), Some(&(last_pos, last_energy))) = (curve.first(), curve.last()) else {
        return 0.5;
    };
    if progress <= first_pos {
        return first_energy;
    }
    if progress >= last_pos {
        return last_energy;
    }
    for pair in curve.windows(2) {
        let ((p0, e0), (p1, e1)) = (pair[0], pair[1]);
        if (p0..=p1).contains(&progress) {
            if p1 <= p0 {
                return e0;
            }
            return e0 + (progress - p0) / (p1 - p0) * (e1 - e0);
        }
    }
    last_energy
}

/// Camelot distance with a one-step penalty for changing mode.
///
/// A parallel key (same number, other mode) is one step.
#[must_use]
pub fn camelot_distance(a: CamelotKey, b: CamelotKey) -> u8 {
    let steps = a.wheel_distance(b);
    if a.mode() == b.mode() {
        steps
    } else {
        steps + 1
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SetBuilderConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_track_id: Option<Uuid>,
    pub target_minutes: f64,
    pub energy_profile: EnergyProfile,
    /// Largest allowed `|bpm ratio - 1|` between consecutive tracks
    pub bpm_tolerance: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub custom_energy_points: Option<Vec<CurvePoint>>,
}

impl Default for SetBuilderConfig {
    fn default() -> Self {
        Self {
            start_track_id: None,
            target_minutes: 60.0,
            energy_profile: EnergyProfile::default(),
            bpm_tolerance: 0.06,
            custom_energy_points: None,
        }
    }
}

impl SetBuilderConfig {
    /// # Errors
    ///
    /// Rejects a non-positive length, a negative tolerance and custom curves
    /// whose points leave `[0, 1]` or whose positions go backwards.
    pub fn validate(&self) -> Result<()> {
        if !self.target_minutes.is_finite() || self.target_minutes <= 0.0 {
            return Err(ValidationError::InvalidSetConfig(format!(
                "target_minutes must be positive, got {}",
                self.target_minutes
            )));
        }
        if !self.bpm_tolerance.is_finite() || self.bpm_tolerance < 0.0 {
            return Err(ValidationError::InvalidSetConfig(format!(
                "bpm_tolerance must be non-negative, got {}",
                self.bpm_tolerance
            )));
        }
        if let Some(points) = &self.custom_energy_points {
            let in_range = |v: f64| (0.0..=1.0).contains(&v);
            if let Some(bad) = points.iter().find(|(p, e)| !in_range(*p) || !in_range(*e)) {
                return Err(ValidationError::InvalidEnergyCurve(format!(
                    "point {bad:?} is outside [0, 1]"
                )));
            }
            if points.windows(2).any(|w| w[1].0 < w[0].0) {
                return Err(ValidationError::InvalidEnergyCurve(
                    "positions must be non-decreasing".to_string(),
                ));
            }
        }
        Ok(())
    }

    /// The curve this configuration follows.
    #[must_use]
    pub fn curve(&self) -> &[CurvePoint] {
        match (&self.energy_profile, &self.custom_energy_points) {
            (EnergyProfile::Custom, Some(points)) if !points.is_empty() => points.as_slice(),
            (profile, _) => profile.builtin_curve(),
        }
    }
}

fn key_bonus(distance: u8) -> f64 {
    match distance {
        0 | 1 => 1.0,
        2 => 0.7,
        _ => 0.4,
    }
}

fn closest_energy<'a>(tracks: impl Iterator<Item = &'a Track>, target: f64) -> Option<&'a Track> {
    let mut best: Option<(&Track, f64)> = None;
    for track in tracks {
        let diff = (track.energy - target).abs();
        if best.map_or(true, |(_, d)| diff < d) {
            best = Some((track, diff));
        }
    }
    best.map(|(track, _)| track)
}

/// Builds sets from a track pool.
#[derive(Debug, Clone, Copy)]
pub struct SetGenerator {
    weights: ScoringWeights,
    refine_iterations: usize,
}

impl Default for SetGenerator {
    fn default() -> Self {
        Self::new(ScoringWeights::default())
    }
}

impl SetGenerator {
    /// A generator scoring transitions with `weights`, normalized.
    #[must_use]
    pub fn new(weights: ScoringWeights) -> Self {
        Self {
            weights: weights.normalized(),
            refine_iterations: DEFAULT_REFINE_ITERATIONS,
        }
    }

    /// Cap the 2-opt sweeps used to refine generated sets.
    #[must_use]
    pub fn with_refine_iterations(mut self, iterations: usize) -> Self {
        self.refine_iterations = iterations;
        self
    }

    /// Pick the track following `current`, or `None` if nothing passes the
    /// BPM guardrail.
    fn best_next<'a>(
        &self,
        current: &Track,
        candidates: &[&'a Track],
        target_energy: f64,
        bpm_tolerance: f64,
    ) -> Option<&'a Track> {
        let mut best: Option<&Track> = None;
        let mut best_score = -1.0;
        for &candidate in candidates {
            let ratio = current.bpm.max(candidate.bpm) / current.bpm.min(candidate.bpm);
            if (ratio - 1.0).abs() > bpm_tolerance {
                continue;
            }
            let compat = compatibility(current, candidate, &self.weights);
            let energy_fit = (1.0 - 2.0 * (candidate.energy - target_energy).abs()).max(0.0);
            let key = key_bonus(camelot_distance(current.key, candidate.key));
            let score = 0.4 * compat + 0.4 * energy_fit + 0.2 * key;
            if score > best_score {
                best_score = score;
                best = Some(candidate);
            }
        }
        best
    }

    /// Generate a set of roughly `target_minutes` from `pool`.
    ///
    /// An empty pool gives an empty set. When no candidate is within the BPM
    /// tolerance the guardrail is dropped for that step and the closest
    /// energy wins.
    ///
    /// # Errors
    ///
    /// Fails only when `config` does not validate.
    pub fn generate(&self, config: &SetBuilderConfig, pool: &[Track]) -> Result<Vec<Track>> {
        config.validate()?;
        let curve = config.curve();

        let start = config
            .start_track_id
            .and_then(|id| pool.iter().find(|t| t.id == id))
            .or_else(|| closest_energy(pool.iter(), interpolate_energy(curve, 0.0)));
        let Some(start) = start else {
            return Ok(Vec::new());
        };

        let target_seconds = config.target_minutes * 60.0;
        let mut sequence: Vec<&Track> = vec![start];
        let mut used: HashSet<Uuid> = HashSet::from([start.id]);
        let mut elapsed = start.duration_seconds;

        while elapsed < target_seconds {
            let candidates: Vec<&Track> = pool.iter().filter(|t| !used.contains(&t.id)).collect();
            let Some(&current) = sequence.last() else { break };
            if candidates.is_empty() {
                break;
            }
            let target_energy = interpolate_energy(curve, elapsed / target_seconds);

            let next = match self.best_next(current, &candidates, target_energy, config.bpm_tolerance) {
                Some(track) => track,
                None => {
                    debug!(
                        "No track within {:.0}% of {:.1} BPM; picking by energy",
                        config.bpm_tolerance * 100.0,
                        current.bpm
                    );
                    match closest_energy(candidates.iter().copied(), target_energy) {
                        Some(track) => track,
                        None => break,
                    }
                }
            };

            used.insert(next.id);
            sequence.push(next);
            elapsed += next.duration_seconds - CROSSFADE_OVERLAP_SECONDS;
        }

        let greedy: Vec<Track> = sequence.into_iter().cloned().collect();
        info!(
            "Built {} track set ({:.1} of {:.0} minutes, {:?})",
            greedy.len(),
            elapsed.max(0.0) / 60.0,
            config.target_minutes,
            config.energy_profile
        );

        Ok(self.refine_or_keep(greedy))
    }

    /// Reorder a built set with the opener pinned, or return it unchanged
    /// when it is too short or refinement rejects it.
    fn refine_or_keep(&self, greedy: Vec<Track>) -> Vec<Track> {
        let Some(opener) = greedy.first().map(|t| t.id) else {
            return greedy;
        };
        if greedy.len() < MIN_REFINE_LEN {
            return greedy;
        }
        match refine_order(&greedy, Some(opener), &self.weights, self.refine_iterations) {
            Ok(refined) => refined,
            Err(err) => {
                warn!("Set refinement failed, keeping greedy order: {err}");
                greedy
            }
        }
    }
}
