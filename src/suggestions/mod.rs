//! Ranked next-track suggestions.
//!
//! Pipeline for one call:
//!
//! 1. candidates are the pool minus the sequence and the current track
//! 2. enabled filters drop candidates
//! 3. each survivor gets the base compatibility score from the current track
//! 4. the score is multiplied by the strategy and sequence-context modifiers
//! 5. a flat diversity bonus is added
//! 6. results are sorted best first and truncated
//!
//! An empty pool, or filters that remove everything, yield an empty list.

pub mod filters;
pub mod strategies;

pub use strategies::{StrategyContext, SuggestionStrategy};

use crate::error::{Result, ValidationError};
use crate::scoring::{compute_compatibility, EdgeScores, ScoringWeights};
use crate::track::Track;
use log::debug;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use uuid::Uuid;

/// How many trailing tracks each context rule looks at.
const RECENT_KEYS: usize = 2;
const RECENT_CLUSTERS: usize = 3;
const RECENT_GROOVES: usize = 4;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SuggestionConfig {
    pub weights: ScoringWeights,
    pub strategy: SuggestionStrategy,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bpm_min: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bpm_max: Option<f64>,
    pub key_lock: bool,
    pub groove_lock: bool,
    pub exclude_cluster_ids: Vec<u32>,
    pub num_suggestions: usize,
    pub diversity_bonus: f64,
    /// Set length assumed by the energy arc strategy
    pub estimated_set_length: usize,
}

impl Default for SuggestionConfig {
    fn default() -> Self {
        Self {
            weights: ScoringWeights::default(),
            strategy: SuggestionStrategy::default(),
            bpm_min: None,
            bpm_max: None,
            key_lock: false,
            groove_lock: false,
            exclude_cluster_ids: Vec::new(),
            num_suggestions: 8,
            diversity_bonus: 0.1,
            estimated_set_length: 20,
        }
    }
}

impl SuggestionConfig {
    /// # Errors
    ///
    /// Rejects invalid weights, an inverted BPM range and a non-finite
    /// diversity bonus.
    pub fn validate(&self) -> Result<()> {
        self.weights.validate()?;
        if let (Some(min), Some(max)) = (self.bpm_min, self.bpm_max) {
            if min > max {
                return Err(ValidationError::InvalidBpmRange { min, max });
            }
        }
        if !self.diversity_bonus.is_finite() {
            return Err(ValidationError::InvalidWeights(format!(
                "diversity_bonus must be finite, got {}",
                self.diversity_bonus
            )));
        }
        Ok(())
    }
}

/// One ranked candidate with every factor that went into its score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SuggestionResult {
    pub track_id: Uuid,
    pub final_score: f64,
    pub base_compatibility: f64,
    pub strategy_modifier: f64,
    pub context_modifier: f64,
    pub diversity_bonus: f64,
    pub score_breakdown: EdgeScores,
}

fn tail<T>(items: &[T], n: usize) -> &[T] {
    &items[items.len().saturating_sub(n)..]
}

fn recent_clusters(sequence: &[Track]) -> Vec<u32> {
    tail(sequence, RECENT_CLUSTERS)
        .iter()
        .filter_map(|t| t.cluster_id)
        .collect()
}

/// Multiplicative penalty for repeating recent keys, clusters and grooves.
#[must_use]
pub fn sequence_context_modifier(candidate: &Track, sequence: &[Track]) -> f64 {
    let mut modifier = 1.0;

    if tail(sequence, RECENT_KEYS).iter().any(|t| t.key == candidate.key) {
        modifier *= 0.8;
    }
    if candidate
        .cluster_id
        .is_some_and(|id| recent_clusters(sequence).contains(&id))
    {
        modifier *= 0.85;
    }
    if sequence.len() >= RECENT_GROOVES
        && tail(sequence, RECENT_GROOVES)
            .iter()
            .all(|t| t.groove_type == candidate.groove_type)
    {
        modifier *= 0.9;
    }
    modifier
}

/// Flat bonus for a clustered candidate from an island not heard recently.
///
/// Nothing is awarded before the first track of the sequence.
#[must_use]
pub fn diversity_bonus(candidate: &Track, sequence: &[Track], bonus: f64) -> f64 {
    if bonus <= 0.0 || sequence.is_empty() {
        return 0.0;
    }
    match candidate.cluster_id {
        Some(id) if !recent_clusters(sequence).contains(&id) => bonus,
        _ => 0.0,
    }
}

/// Rank candidates from `pool` to follow `current`.
///
/// `current` and every track in `sequence` are never suggested. The result
/// holds at most `config.num_suggestions` entries, best first; equal scores
/// keep pool order.
///
/// # Examples
///
/// ```
/// use mixgraph::suggestions::{suggest, SuggestionConfig};
/// use mixgraph::track::Track;
///
/// let current = Track::builder(128.0, "8A").build()?;
/// let pool = vec![
///     Track::builder(128.0, "9A").build()?,
///     Track::builder(128.0, "3B").build()?,
/// ];
///
/// let ranked = suggest(&current, &[], &pool, &SuggestionConfig::default());
/// assert_eq!(ranked[0].track_id, pool[0].id);
/// # Ok::<(), mixgraph::error::ValidationError>(())
/// ```
#[must_use]
pub fn suggest(
    current: &Track,
    sequence: &[Track],
    pool: &[Track],
    config: &SuggestionConfig,
) -> Vec<SuggestionResult> {
    let mut excluded: HashSet<Uuid> = sequence.iter().map(|t| t.id).collect();
    excluded.insert(current.id);

    let candidates: Vec<&Track> = pool.iter().filter(|t| !excluded.contains(&t.id)).collect();
    let pool_size = candidates.len();
    let candidates = filters::apply_filters(candidates, current, config);
    if candidates.is_empty() {
        debug!("No candidates left after filtering {pool_size} tracks");
        return Vec::new();
    }

    let weights = config.weights.normalized();
    let ctx = StrategyContext {
        sequence_position: sequence.len(),
        estimated_set_length: config.estimated_set_length,
    };

    let mut results: Vec<SuggestionResult> = candidates
        .into_iter()
        .map(|candidate| {
            let (base, breakdown) = compute_compatibility(current, candidate, &weights);
            let strategy_modifier = config.strategy.modifier(candidate, current, &ctx);
            let context_modifier = sequence_context_modifier(candidate, sequence);
            let bonus = diversity_bonus(candidate, sequence, config.diversity_bonus);
            SuggestionResult {
                track_id: candidate.id,
                final_score: base * strategy_modifier * context_modifier + bonus,
                base_compatibility: base,
                strategy_modifier,
                context_modifier,
                diversity_bonus: bonus,
                score_breakdown: breakdown,
            }
        })
        .collect();

    results.sort_by(|a, b| b.final_score.total_cmp(&a.final_score));
    results.truncate(config.num_suggestions);
    debug!(
        "Suggested {} of {pool_size} candidates for {} ({:?})",
        results.len(),
        current.display_name(),
        config.strategy
    );
    results
}

/// A track pool bound to a suggestion call site.
///
/// # Examples
///
/// ```
/// use mixgraph::suggestions::{SuggestionConfig, SuggestionEngine};
/// use mixgraph::track::Track;
///
/// let current = Track::builder(128.0, "8A").build()?;
/// let engine = SuggestionEngine::new(vec![
///     Track::builder(127.0, "9A").build()?,
///     Track::builder(126.0, "8B").build()?,
/// ]);
///
/// let ranked = engine.suggest(&current, &[], &SuggestionConfig::default());
/// assert_eq!(ranked.len(), 2);
/// # Ok::<(), mixgraph::error::ValidationError>(())
/// ```
#[derive(Debug, Clone, Default)]
pub struct SuggestionEngine {
    tracks: Vec<Track>,
}

impl SuggestionEngine {
    /// An engine over `tracks`.
    #[must_use]
    pub fn new(tracks: Vec<Track>) -> Self {
        Self { tracks }
    }

    /// Replace the pool, e.g. after the library was re-analysed.
    pub fn set_tracks(&mut self, tracks: Vec<Track>) {
        self.tracks = tracks;
    }

    /// The current candidate pool.
    #[must_use]
    pub fn tracks(&self) -> &[Track] {
        &self.tracks
    }

    /// [`suggest`] against this engine's pool.
    #[must_use]
    pub fn suggest(&self, current: &Track, sequence: &[Track], config: &SuggestionConfig) -> Vec<SuggestionResult> {
        suggest(current, sequence, &self.tracks, config)
    }
}
