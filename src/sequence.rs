//! Set ordering: greedy nearest-neighbour construction plus 2-opt refinement.
//!
//! The objective is the sum of consecutive transition scores. Scores are
//! directional, so reversing a segment changes every transition inside it,
//! not only the two at its ends.

use crate::error::SequenceError;
use crate::scoring::{compatibility, ScoringWeights};
use crate::track::Track;
use log::debug;
use rayon::prelude::*;
use std::collections::HashSet;
use uuid::Uuid;

pub const DEFAULT_TWO_OPT_ITERATIONS: usize = 1000;

/// Pairwise transition scores, computed once per ordering run.
struct ScoreMatrix {
    n: usize,
    scores: Vec<f64>,
}

impl ScoreMatrix {
    fn new(tracks: &[Track], weights: &ScoringWeights) -> Self {
        let n = tracks.len();
        let weights = weights.normalized();
        let scores = (0..n * n)
            .into_par_iter()
            .map(|cell| {
                let (from, to) = (cell / n, cell % n);
                if from == to {
                    0.0
                } else {
                    compatibility(&tracks[from], &tracks[to], &weights)
                }
            })
            .collect();
        Self { n, scores }
    }

    #[inline]
    fn get(&self, from: usize, to: usize) -> f64 {
        self.scores[from * self.n + to]
    }

    fn total(&self, order: &[usize]) -> f64 {
        order.windows(2).map(|w| self.get(w[0], w[1])).sum()
    }
}

/// Sum of consecutive transition scores. Zero for fewer than two tracks.
#[must_use]
pub fn total_compatibility(sequence: &[Track], weights: &ScoringWeights) -> f64 {
    let weights = weights.normalized();
    sequence
        .windows(2)
        .map(|w| compatibility(&w[0], &w[1], &weights))
        .sum()
}

/// Start index: the requested track if present, else the highest energy.
fn start_index(tracks: &[Track], start: Option<Uuid>) -> usize {
    if let Some(i) = start.and_then(|id| tracks.iter().position(|t| t.id == id)) {
        return i;
    }
    let mut best = 0;
    for (i, track) in tracks.iter().enumerate().skip(1) {
        if track.energy > tracks[best].energy {
            best = i;
        }
    }
    best
}

fn greedy_indices(matrix: &ScoreMatrix, first: usize) -> Vec<usize> {
    let n = matrix.n;
    let mut visited = vec![false; n];
    let mut order = Vec::with_capacity(n);
    visited[first] = true;
    order.push(first);

    while order.len() < n {
        let last = order[order.len() - 1];
        let mut best: Option<(usize, f64)> = None;
        for candidate in (0..n).filter(|&c| !visited[c]) {
            let score = matrix.get(last, candidate);
            if best.map_or(true, |(_, s)| score > s) {
                best = Some((candidate, score));
            }
        }
        let Some((next, _)) = best else { break };
        visited[next] = true;
        order.push(next);
    }
    order
}

/// Score change from reversing `order[i..=j]`.
fn reversal_gain(matrix: &ScoreMatrix, order: &[usize], i: usize, j: usize) -> f64 {
    let mut before = 0.0;
    let mut after = 0.0;
    if i > 0 {
        before += matrix.get(order[i - 1], order[i]);
        after += matrix.get(order[i - 1], order[j]);
    }
    if j + 1 < order.len() {
        before += matrix.get(order[j], order[j + 1]);
        after += matrix.get(order[i], order[j + 1]);
    }
    for k in i..j {
        before += matrix.get(order[k], order[k + 1]);
        after += matrix.get(order[k + 1], order[k]);
    }
    after - before
}

/// The first position never moves, so a chosen opener stays first.
fn two_opt_indices(matrix: &ScoreMatrix, mut order: Vec<usize>, max_iterations: usize) -> Vec<usize> {
    let len = order.len();
    if len < 3 {
        return order;
    }
    let mut best = matrix.total(&order);
    let mut sweeps = 0;
    let mut accepted = 0;
    let mut improved = true;

    while improved && sweeps < max_iterations {
        improved = false;
        for i in 1..len - 1 {
            for j in i + 1..len {
                if reversal_gain(matrix, &order, i, j) <= 0.0 {
                    continue;
                }
                order[i..=j].reverse();
                let total = matrix.total(&order);
                if total > best {
                    best = total;
                    improved = true;
                    accepted += 1;
                } else {
                    order[i..=j].reverse();
                }
            }
        }
        sweeps += 1;
    }
    debug!("2-opt: {sweeps} sweeps, {accepted} reversals, total {best:.3}");
    order
}

fn reorder(tracks: &[Track], order: &[usize]) -> Vec<Track> {
    order.iter().map(|&i| tracks[i].clone()).collect()
}

/// Nearest-neighbour ordering in O(n²).
///
/// Starts at `start` when it is one of `tracks`, otherwise at the highest
/// energy track, then keeps appending the unvisited track with the best
/// transition from the current last one.
///
/// # Examples
///
/// ```
/// use mixgraph::scoring::ScoringWeights;
/// use mixgraph::sequence::greedy_order;
/// use mixgraph::track::Track;
///
/// let tracks = vec![
///     Track::builder(126.0, "8A").energy(0.5).build()?,
///     Track::builder(128.0, "9A").energy(0.9).build()?,
///     Track::builder(127.0, "8B").energy(0.7).build()?,
/// ];
/// let order = greedy_order(&tracks, None, &ScoringWeights::default());
/// assert_eq!(order[0].id, tracks[1].id);
/// assert_eq!(order.len(), 3);
/// # Ok::<(), mixgraph::error::ValidationError>(())
/// ```
#[must_use]
pub fn greedy_order(tracks: &[Track], start: Option<Uuid>, weights: &ScoringWeights) -> Vec<Track> {
    if tracks.len() <= 1 {
        return tracks.to_vec();
    }
    let matrix = ScoreMatrix::new(tracks, weights);
    reorder(tracks, &greedy_indices(&matrix, start_index(tracks, start)))
}

/// Improve an ordering by segment reversal.
///
/// Only strictly improving reversals are kept, so the total never drops.
/// Stops after a sweep without improvement or `max_iterations` sweeps.
#[must_use]
pub fn two_opt_improve(sequence: &[Track], max_iterations: usize, weights: &ScoringWeights) -> Vec<Track> {
    if sequence.len() < 3 {
        return sequence.to_vec();
    }
    let matrix = ScoreMatrix::new(sequence, weights);
    let order = two_opt_indices(&matrix, (0..sequence.len()).collect(), max_iterations);
    reorder(sequence, &order)
}

/// Greedy construction followed by 2-opt, sharing one score matrix.
///
/// The first track of the greedy order stays first. Fewer than two tracks
/// are returned as given.
#[must_use]
pub fn optimal_order(
    tracks: &[Track],
    start: Option<Uuid>,
    weights: &ScoringWeights,
    max_iterations: usize,
) -> Vec<Track> {
    if tracks.len() <= 1 {
        return tracks.to_vec();
    }
    let matrix = ScoreMatrix::new(tracks, weights);
    let greedy = greedy_indices(&matrix, start_index(tracks, start));
    reorder(tracks, &two_opt_indices(&matrix, greedy, max_iterations))
}

/// [`optimal_order`] for callers holding a generated set.
///
/// # Errors
///
/// Returns [`SequenceError::DuplicateTrack`] if a track id repeats.
pub fn refine_order(
    tracks: &[Track],
    start: Option<Uuid>,
    weights: &ScoringWeights,
    max_iterations: usize,
) -> Result<Vec<Track>, SequenceError> {
    let mut seen = HashSet::with_capacity(tracks.len());
    if let Some(dup) = tracks.iter().find(|t| !seen.insert(t.id)) {
        return Err(SequenceError::DuplicateTrack(dup.id));
    }
    Ok(optimal_order(tracks, start, weights, max_iterations))
}
