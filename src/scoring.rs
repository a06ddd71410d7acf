//! Directional compatibility scoring between track pairs.
//!
//! Six independent sub-scores, each in `[0, 1]`, are combined with
//! normalized weights:
//!
//! | Component     | Default weight | Basis                                   |
//! |---------------|----------------|-----------------------------------------|
//! | `harmonic`    | 0.30           | Camelot wheel relationship              |
//! | `bpm`         | 0.25           | Tempo ratio, half/double time aware     |
//! | `energy`      | 0.15           | Energy level difference                 |
//! | `groove`      | 0.10           | Groove type lookup table                |
//! | `frequency`   | 0.10           | Frequency weight lookup table           |
//! | `mix_quality` | 0.10           | `mix_out` of A and `mix_in` of B        |
//!
//! `mix_quality` is the only asymmetric component, which is why
//! `score(a, b)` and `score(b, a)` generally differ.

use crate::error::{Result, ValidationError};
use crate::track::{CamelotKey, FrequencyWeight, GrooveType, Track};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Relative importance of each sub-score.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringWeights {
    pub harmonic: f64,
    pub bpm: f64,
    pub energy: f64,
    pub groove: f64,
    pub frequency: f64,
    pub mix_quality: f64,
}

impl Default for ScoringWeights {
    fn default() -> Self {
        Self {
            harmonic: 0.30,
            bpm: 0.25,
            energy: 0.15,
            groove: 0.10,
            frequency: 0.10,
            mix_quality: 0.10,
        }
    }
}

impl ScoringWeights {
    fn as_array(&self) -> [f64; 6] {
        [
            self.harmonic,
            self.bpm,
            self.energy,
            self.groove,
            self.frequency,
            self.mix_quality,
        ]
    }

    /// Sum of all six weights.
    #[must_use]
    pub fn total(&self) -> f64 {
        self.as_array().iter().sum()
    }

    /// Weights must be finite, non-negative and not all zero.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::InvalidWeights`] describing the problem.
    pub fn validate(&self) -> Result<()> {
        if self.as_array().iter().any(|w| !w.is_finite() || *w < 0.0) {
            return Err(ValidationError::InvalidWeights(format!(
                "weights must be finite and non-negative: {self:?}"
            )));
        }
        if self.total() <= 0.0 {
            return Err(ValidationError::InvalidWeights(
                "weights must not all be zero".to_string(),
            ));
        }
        Ok(())
    }

    /// Scale the weights so they sum to 1.
    ///
    /// Weights that already sum to 1 are returned untouched so the defaults
    /// stay bit-exact.
    #[must_use]
    pub fn normalized(&self) -> Self {
        let total = self.total();
        if (total - 1.0).abs() <= 4.0 * f64::EPSILON {
            return *self;
        }
        if total.is_nan() || total <= 0.0 {
            log::warn!("Scoring weights sum to {total}; using defaults");
            return Self::default();
        }
        Self {
            harmonic: self.harmonic / total,
            bpm: self.bpm / total,
            energy: self.energy / total,
            groove: self.groove / total,
            frequency: self.frequency / total,
            mix_quality: self.mix_quality / total,
        }
    }
}

/// Per-component breakdown of a directional compatibility score.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EdgeScores {
    pub harmonic: f64,
    pub bpm: f64,
    pub energy: f64,
    pub groove: f64,
    pub frequency: f64,
    pub mix_quality: f64,
}

impl EdgeScores {
    /// Weighted sum using already-normalized weights.
    #[must_use]
    pub fn aggregate(&self, weights: &ScoringWeights) -> f64 {
        self.harmonic * weights.harmonic
            + self.bpm * weights.bpm
            + self.energy * weights.energy
            + self.groove * weights.groove
            + self.frequency * weights.frequency
            + self.mix_quality * weights.mix_quality
    }
}

/// How energy difference maps to a score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EnergyMode {
    /// Stepped thresholds, used by the aggregate score
    #[default]
    Smooth,
    /// `1 - diff`, used by strategy logic
    Arc,
}

/// Camelot wheel compatibility.
///
/// When the weaker of the two key confidences is below 0.7 the result is
/// scaled by it.
#[must_use]
pub fn harmonic_score(key_a: CamelotKey, key_b: CamelotKey, conf_a: f64, conf_b: f64) -> f64 {
    let distance = key_a.wheel_distance(key_b);
    let same_mode = key_a.mode() == key_b.mode();

    let score = match (same_mode, distance) {
        (true, 0) => 1.0,
        (false, 0) => 0.80,
        (true, 1) => 0.85,
        (true, 2) => 0.50,
        (false, 1) => 0.40,
        _ => 0.10,
    };

    let min_conf = conf_a.min(conf_b);
    if min_conf < 0.7 {
        score * min_conf
    } else {
        score
    }
}

/// Harmonic score at full key confidence.
#[must_use]
pub fn key_compatibility(key_a: CamelotKey, key_b: CamelotKey) -> f64 {
    harmonic_score(key_a, key_b, 1.0, 1.0)
}

/// Tempo compatibility, checking half/double time before proximity.
///
/// An unstable tempo on either side costs 20%, once.
#[must_use]
pub fn bpm_score(bpm_a: f64, bpm_b: f64, stability_a: f64, stability_b: f64) -> f64 {
    let ratio = bpm_a.max(bpm_b) / bpm_a.min(bpm_b);

    let score = if (1.95..=2.05).contains(&ratio) {
        0.6
    } else {
        match (ratio - 1.0).abs() {
            d if d <= 0.02 => 1.0,
            d if d <= 0.04 => 0.8,
            d if d <= 0.06 => 0.5,
            d if d <= 0.10 => 0.2,
            _ => 0.05,
        }
    };

    if stability_a < 0.8 || stability_b < 0.8 {
        score * 0.8
    } else {
        score
    }
}

/// Energy compatibility.
///
/// [`EnergyMode::Smooth`] rewards small steps in bands; [`EnergyMode::Arc`]
/// falls off linearly with the difference.
///
/// ```
/// use mixgraph::scoring::{energy_score, EnergyMode};
///
/// assert_eq!(energy_score(0.5, 0.55, EnergyMode::Smooth), 1.0);
/// assert_eq!(energy_score(0.2, 0.9, EnergyMode::Smooth), 0.2);
/// assert!((energy_score(0.2, 0.7, EnergyMode::Arc) - 0.5).abs() < 1e-12);
/// ```
#[must_use]
pub fn energy_score(energy_a: f64, energy_b: f64, mode: EnergyMode) -> f64 {
    let diff = (energy_a - energy_b).abs();
    match mode {
        EnergyMode::Smooth => match diff {
            d if d <= 0.10 => 1.0,
            d if d <= 0.20 => 0.8,
            d if d <= 0.35 => 0.5,
            _ => 0.2,
        },
        EnergyMode::Arc => 1.0 - diff,
    }
}

/// Order a pair so that `(a, b)` and `(b, a)` share one table entry.
fn canonical<T: Ord + Copy>(a: T, b: T) -> (T, T) {
    if a <= b {
        (a, b)
    } else {
        (b, a)
    }
}

lazy_static::lazy_static! {
    static ref GROOVE_COMPATIBILITY: HashMap<(GrooveType, GrooveType), f64> = {
        use GrooveType::*;
        [
            (FourOnFloor, Straight, 0.7),
            (Breakbeat, Syncopated, 0.7),
            (Breakbeat, Complex, 0.6),
            (FourOnFloor, HalfTime, 0.5),
            (Straight, HalfTime, 0.5),
            (Syncopated, Complex, 0.5),
            (FourOnFloor, Breakbeat, 0.3),
            (FourOnFloor, Syncopated, 0.3),
            (HalfTime, Breakbeat, 0.3),
            (Straight, Syncopated, 0.3),
            (Straight, Breakbeat, 0.3),
            (FourOnFloor, Complex, 0.2),
            (HalfTime, Complex, 0.2),
            (HalfTime, Syncopated, 0.2),
            (Straight, Complex, 0.2),
        ]
        .into_iter()
        .map(|(a, b, score)| (canonical(a, b), score))
        .collect()
    };

    static ref FREQUENCY_COMPATIBILITY: HashMap<(FrequencyWeight, FrequencyWeight), f64> = {
        use FrequencyWeight::*;
        [
            (Balanced, BassHeavy, 0.7),
            (Balanced, Bright, 0.7),
            (Balanced, MidFocused, 0.7),
            (MidFocused, BassHeavy, 0.5),
            (MidFocused, Bright, 0.5),
            (BassHeavy, Bright, 0.3),
        ]
        .into_iter()
        .map(|(a, b, score)| (canonical(a, b), score))
        .collect()
    };
}

/// Groove compatibility; unlisted pairs score 0.3.
#[must_use]
pub fn groove_score(groove_a: GrooveType, groove_b: GrooveType) -> f64 {
    if groove_a == groove_b {
        return 1.0;
    }
    GROOVE_COMPATIBILITY
        .get(&canonical(groove_a, groove_b))
        .copied()
        .unwrap_or(0.3)
}

/// Frequency weight compatibility; unlisted pairs score 0.5.
#[must_use]
pub fn frequency_score(freq_a: FrequencyWeight, freq_b: FrequencyWeight) -> f64 {
    if freq_a == freq_b {
        return 1.0;
    }
    FREQUENCY_COMPATIBILITY
        .get(&canonical(freq_a, freq_b))
        .copied()
        .unwrap_or(0.5)
}

/// Directional: how well A leaves and B enters.
#[inline]
#[must_use]
pub fn mix_quality_score(mix_out_a: f64, mix_in_b: f64) -> f64 {
    (mix_out_a + mix_in_b) / 2.0
}

/// All six sub-scores for the transition `a -> b`.
#[must_use]
pub fn edge_scores(a: &Track, b: &Track) -> EdgeScores {
    EdgeScores {
        harmonic: harmonic_score(a.key, b.key, a.key_confidence, b.key_confidence),
        bpm: bpm_score(a.bpm, b.bpm, a.bpm_stability, b.bpm_stability),
        energy: energy_score(a.energy, b.energy, EnergyMode::Smooth),
        groove: groove_score(a.groove_type, b.groove_type),
        frequency: frequency_score(a.frequency_weight, b.frequency_weight),
        mix_quality: mix_quality_score(a.mix_out_score, b.mix_in_score),
    }
}

/// Weighted compatibility of the transition `a -> b` plus its breakdown.
///
/// ```
/// use mixgraph::scoring::{compute_compatibility, ScoringWeights};
/// use mixgraph::track::Track;
///
/// let a = Track::builder(128.0, "8A").build()?;
/// let b = Track::builder(128.0, "8A").build()?;
/// let (score, breakdown) = compute_compatibility(&a, &b, &ScoringWeights::default());
/// assert_eq!(breakdown.harmonic, 1.0);
/// assert!(score > 0.9);
/// # Ok::<(), mixgraph::error::ValidationError>(())
/// ```
#[must_use]
pub fn compute_compatibility(a: &Track, b: &Track, weights: &ScoringWeights) -> (f64, EdgeScores) {
    let scores = edge_scores(a, b);
    let aggregate = scores.aggregate(&weights.normalized());
    log::trace!(
        "Scored {} -> {}: {aggregate:.3}",
        a.display_name(),
        b.display_name()
    );
    (aggregate, scores)
}

/// Aggregate score only.
#[inline]
#[must_use]
pub fn compatibility(a: &Track, b: &Track, weights: &ScoringWeights) -> f64 {
    compute_compatibility(a, b, weights).0
}

/// Score every candidate as the track following `from`.
#[must_use = "Iterator should be consumed to calculate scores"]
pub fn batch_compatibility<'a>(
    from: &'a Track,
    candidates: &'a [Track],
    weights: &'a ScoringWeights,
) -> impl Iterator<Item = (&'a Track, f64)> + 'a {
    let normalized = weights.normalized();
    candidates
        .iter()
        .map(move |candidate| (candidate, edge_scores(from, candidate).aggregate(&normalized)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(s: &str) -> CamelotKey {
        s.parse().unwrap()
    }

    fn harmonic(a: &str, b: &str) -> f64 {
        key_compatibility(key(a), key(b))
    }

    const EPS: f64 = 1e-9;

    #[test]
    fn test_harmonic_rules() {
        assert_eq!(harmonic("8A", "8A"), 1.0);
        assert_eq!(harmonic("8A", "8B"), 0.80);
        assert_eq!(harmonic("8A", "9A"), 0.85);
        assert_eq!(harmonic("8A", "7A"), 0.85);
        assert_eq!(harmonic("8A", "10A"), 0.50);
        assert_eq!(harmonic("8A", "9B"), 0.40);
        assert_eq!(harmonic("8A", "2A"), 0.10);
        assert_eq!(harmonic("8A", "10B"), 0.10);
    }

    #[test]
    fn test_harmonic_wraps_around_wheel() {
        assert_eq!(harmonic("12A", "1A"), 0.85);
        assert_eq!(harmonic("1B", "12B"), 0.85);
        assert_eq!(harmonic("11A", "1A"), 0.50);
        assert_eq!(harmonic("12B", "1A"), 0.40);
    }

    #[test]
    fn test_harmonic_confidence_modifier() {
        let full = harmonic_score(key("8A"), key("9A"), 0.9, 0.7);
        assert_eq!(full, 0.85);
        let reduced = harmonic_score(key("8A"), key("9A"), 0.9, 0.5);
        assert!((reduced - 0.425).abs() < EPS);
    }

    #[test]
    fn test_bpm_thresholds() {
        assert_eq!(bpm_score(128.0, 128.0, 1.0, 1.0), 1.0);
        assert_eq!(bpm_score(128.0, 130.0, 1.0, 1.0), 1.0);
        assert_eq!(bpm_score(128.0, 133.0, 1.0, 1.0), 0.8);
        assert_eq!(bpm_score(128.0, 135.0, 1.0, 1.0), 0.5);
        assert_eq!(bpm_score(128.0, 140.0, 1.0, 1.0), 0.2);
        assert_eq!(bpm_score(128.0, 150.0, 1.0, 1.0), 0.05);
    }

    #[test]
    fn test_bpm_half_double_band() {
        assert_eq!(bpm_score(128.0, 64.0, 1.0, 1.0), 0.6);
        assert_eq!(bpm_score(128.0, 260.0, 1.0, 1.0), 0.6);
        assert_ne!(bpm_score(128.0, 280.0, 1.0, 1.0), 0.6);
        assert_eq!(bpm_score(128.0, 280.0, 1.0, 1.0), 0.05);
    }

    #[test]
    fn test_bpm_stability_penalty_is_flat() {
        let one = bpm_score(128.0, 128.0, 0.5, 1.0);
        let both = bpm_score(128.0, 128.0, 0.5, 0.3);
        assert!((one - 0.8).abs() < EPS);
        assert_eq!(one, both);
    }

    #[test]
    fn test_energy_modes() {
        assert_eq!(energy_score(0.5, 0.55, EnergyMode::Smooth), 1.0);
        assert_eq!(energy_score(0.5, 0.65, EnergyMode::Smooth), 0.8);
        assert_eq!(energy_score(0.5, 0.8, EnergyMode::Smooth), 0.5);
        assert_eq!(energy_score(0.1, 0.9, EnergyMode::Smooth), 0.2);
        assert!((energy_score(0.2, 0.9, EnergyMode::Arc) - 0.3).abs() < EPS);
    }

    #[test]
    fn test_lookup_tables_are_symmetric() {
        for a in GrooveType::ALL {
            for b in GrooveType::ALL {
                assert_eq!(groove_score(a, b), groove_score(b, a), "{a:?} / {b:?}");
            }
        }
        for a in FrequencyWeight::ALL {
            for b in FrequencyWeight::ALL {
                assert_eq!(frequency_score(a, b), frequency_score(b, a), "{a:?} / {b:?}");
            }
        }
    }

    #[test]
    fn test_lookup_values() {
        use FrequencyWeight::*;
        use GrooveType::*;
        assert_eq!(groove_score(Straight, FourOnFloor), 0.7);
        assert_eq!(groove_score(Complex, Breakbeat), 0.6);
        assert_eq!(groove_score(Complex, Straight), 0.2);
        assert_eq!(groove_score(Syncopated, Syncopated), 1.0);
        assert_eq!(frequency_score(BassHeavy, Balanced), 0.7);
        assert_eq!(frequency_score(Bright, MidFocused), 0.5);
        assert_eq!(frequency_score(Bright, BassHeavy), 0.3);
    }

    #[test]
    fn test_mix_quality_is_directional() {
        let a = Track::builder(128.0, "8A").mix_scores(0.2, 0.9).build().unwrap();
        let b = Track::builder(128.0, "8A").mix_scores(0.6, 0.4).build().unwrap();
        let weights = ScoringWeights::default();

        let (ab, sab) = compute_compatibility(&a, &b, &weights);
        let (ba, sba) = compute_compatibility(&b, &a, &weights);
        assert!((sab.mix_quality - 0.75).abs() < EPS);
        assert!((sba.mix_quality - 0.3).abs() < EPS);
        assert_ne!(ab, ba);

        let (_, saa) = compute_compatibility(&a, &a, &weights);
        assert!((saa.mix_quality - 0.55).abs() < EPS);
    }

    #[test]
    fn test_reference_pair_scores_088() {
        let a = Track::builder(128.0, "8A")
            .energy(0.82)
            .key_confidence(0.85)
            .bpm_stability(0.97)
            .mix_scores(0.90, 0.85)
            .frequency_weight(FrequencyWeight::BassHeavy)
            .build()
            .unwrap();
        let b = Track::builder(127.0, "9A")
            .energy(0.70)
            .key_confidence(0.80)
            .bpm_stability(0.95)
            .mix_scores(0.85, 0.80)
            .frequency_weight(FrequencyWeight::Balanced)
            .build()
            .unwrap();

        let (score, s) = compute_compatibility(&a, &b, &ScoringWeights::default());
        assert_eq!(s.harmonic, 0.85);
        assert_eq!(s.bpm, 1.0);
        assert_eq!(s.energy, 0.8);
        assert_eq!(s.groove, 1.0);
        assert_eq!(s.frequency, 0.7);
        assert!((s.mix_quality - 0.85).abs() < EPS);
        assert!((score - 0.88).abs() < EPS, "got {score}");
    }

    #[test]
    fn test_weights_normalization() {
        let doubled = ScoringWeights {
            harmonic: 0.6,
            bpm: 0.5,
            energy: 0.3,
            groove: 0.2,
            frequency: 0.2,
            mix_quality: 0.2,
        };
        let n = doubled.normalized();
        assert!((n.total() - 1.0).abs() < EPS);
        assert!((n.harmonic - 0.30).abs() < EPS);
        assert_eq!(ScoringWeights::default().normalized(), ScoringWeights::default());
    }

    #[test]
    fn test_weights_validation() {
        assert!(ScoringWeights::default().validate().is_ok());
        let negative = ScoringWeights { bpm: -0.1, ..ScoringWeights::default() };
        assert!(negative.validate().is_err());
        let zero = ScoringWeights {
            harmonic: 0.0,
            bpm: 0.0,
            energy: 0.0,
            groove: 0.0,
            frequency: 0.0,
            mix_quality: 0.0,
        };
        assert!(zero.validate().is_err());
    }

    #[test]
    fn test_batch_matches_individual() {
        let from = Track::builder(128.0, "8A").build().unwrap();
        let candidates = vec![
            Track::builder(126.0, "9A").energy(0.7).build().unwrap(),
            Track::builder(140.0, "3B").groove(GrooveType::Breakbeat).build().unwrap(),
        ];
        let weights = ScoringWeights::default();
        for (candidate, score) in batch_compatibility(&from, &candidates, &weights) {
            assert_eq!(score, compatibility(&from, candidate, &weights));
            assert!((0.0..=1.0).contains(&score));
        }
    }
}
