//! Strategy modifiers applied as a multiplier on the base score.

use crate::track::Track;
use clap::ValueEnum;
use serde::{Deserialize, Serialize};

/// How suggestions are biased beyond raw compatibility.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum SuggestionStrategy {
    /// Pure compatibility
    #[default]
    HarmonicFlow,
    /// Follow a build, peak, cool-down energy arc
    EnergyArc,
    /// Favour tracks that have rarely been played
    Discovery,
    /// Strongly prefer the current groove
    GrooveLock,
    /// Reward energy and frequency changes
    Contrast,
}

/// Where the set stands when a suggestion is requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StrategyContext {
    /// Number of tracks already in the sequence
    pub sequence_position: usize,
    pub estimated_set_length: usize,
}

impl SuggestionStrategy {
    /// Multiplier applied to the base compatibility of `current -> candidate`.
    ///
    /// `HarmonicFlow` is always 1.0.
    #[must_use]
    pub fn modifier(self, candidate: &Track, current: &Track, ctx: &StrategyContext) -> f64 {
        match self {
            Self::HarmonicFlow => 1.0,
            Self::EnergyArc => energy_arc(candidate, ctx),
            Self::Discovery => discovery(candidate),
            Self::GrooveLock => groove_lock(candidate, current),
            Self::Contrast => contrast(candidate, current),
        }
    }
}

/// Target energy for a point in the set, in `[0, 1]`.
#[must_use]
pub fn energy_arc_target(progress: f64) -> f64 {
    let target = if progress < 0.3 {
        0.5 + progress * 0.5
    } else if progress < 0.7 {
        0.7 + progress * 0.3
    } else {
        0.9 - (progress - 0.7) * 1.5
    };
    target.clamp(0.0, 1.0)
}

#[allow(clippy::cast_precision_loss)]
fn energy_arc(candidate: &Track, ctx: &StrategyContext) -> f64 {
    if ctx.estimated_set_length == 0 {
        return 1.0;
    }
    let progress = (ctx.sequence_position as f64 / ctx.estimated_set_length as f64).min(1.0);
    let fit = 1.0 - (candidate.energy - energy_arc_target(progress)).abs();
    0.5 + 0.5 * fit
}

fn discovery(candidate: &Track) -> f64 {
    match candidate.times_used {
        0 => 1.3,
        1 | 2 => 1.15,
        _ => 1.0,
    }
}

fn groove_lock(candidate: &Track, current: &Track) -> f64 {
    if candidate.groove_type == current.groove_type {
        1.2
    } else {
        0.6
    }
}

fn contrast(candidate: &Track, current: &Track) -> f64 {
    let mut modifier = if (candidate.energy - current.energy).abs() > 0.3 {
        1.2
    } else {
        1.0
    };
    if candidate.frequency_weight != current.frequency_weight {
        modifier *= 1.1;
    }
    modifier
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::track::{FrequencyWeight, GrooveType};

    const EPS: f64 = 1e-9;

    fn ctx(position: usize) -> StrategyContext {
        StrategyContext {
            sequence_position: position,
            estimated_set_length: 20,
        }
    }

    fn with_energy(energy: f64) -> Track {
        Track::builder(128.0, "8A").energy(energy).build().unwrap()
    }

    #[test]
    fn test_harmonic_flow_is_neutral() {
        let t = with_energy(0.5);
        assert_eq!(SuggestionStrategy::HarmonicFlow.modifier(&t, &t, &ctx(3)), 1.0);
    }

    #[test]
    fn test_energy_arc_schedule() {
        assert!((energy_arc_target(0.0) - 0.5).abs() < EPS);
        assert!((energy_arc_target(0.5) - 0.85).abs() < EPS);
        assert!((energy_arc_target(1.0) - 0.45).abs() < EPS);

        let current = with_energy(0.5);
        // position 10 of 20 targets 0.85
        let on_target = SuggestionStrategy::EnergyArc.modifier(&with_energy(0.85), &current, &ctx(10));
        assert!((on_target - 1.0).abs() < EPS);
        let off = SuggestionStrategy::EnergyArc.modifier(&with_energy(0.45), &current, &ctx(10));
        assert!((off - 0.8).abs() < EPS);

        let no_length = StrategyContext { sequence_position: 4, estimated_set_length: 0 };
        assert_eq!(SuggestionStrategy::EnergyArc.modifier(&current, &current, &no_length), 1.0);
    }

    #[test]
    fn test_energy_arc_progress_saturates() {
        let current = with_energy(0.5);
        let late = SuggestionStrategy::EnergyArc.modifier(&with_energy(0.45), &current, &ctx(60));
        assert!((late - 1.0).abs() < EPS);
    }

    #[test]
    fn test_discovery_tiers() {
        let current = with_energy(0.5);
        let used = |n: u32| Track::builder(128.0, "8A").times_used(n).build().unwrap();
        let m = |t: &Track| SuggestionStrategy::Discovery.modifier(t, &current, &ctx(0));
        assert_eq!(m(&used(0)), 1.3);
        assert_eq!(m(&used(2)), 1.15);
        assert_eq!(m(&used(3)), 1.0);
    }

    #[test]
    fn test_groove_lock_strategy() {
        let current = with_energy(0.5);
        let broken = Track::builder(128.0, "8A").groove(GrooveType::Breakbeat).build().unwrap();
        assert_eq!(SuggestionStrategy::GrooveLock.modifier(&current, &current, &ctx(0)), 1.2);
        assert_eq!(SuggestionStrategy::GrooveLock.modifier(&broken, &current, &ctx(0)), 0.6);
    }

    #[test]
    fn test_contrast_compounds() {
        let current = with_energy(0.2);
        let jump = Track::builder(128.0, "8A")
            .energy(0.8)
            .frequency_weight(FrequencyWeight::Bright)
            .build()
            .unwrap();
        let m = SuggestionStrategy::Contrast.modifier(&jump, &current, &ctx(0));
        assert!((m - 1.32).abs() < EPS);
        assert_eq!(SuggestionStrategy::Contrast.modifier(&with_energy(0.3), &current, &ctx(0)), 1.0);
    }

    #[test]
    fn test_strategy_serde_names() {
        let json = serde_json::to_string(&SuggestionStrategy::EnergyArc).unwrap();
        assert_eq!(json, "\"energy_arc\"");
    }
}
