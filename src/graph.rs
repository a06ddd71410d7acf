//! Track compatibility graph.
//!
//! Nodes are tracks keyed by id; edges are directional and weighted by the
//! compatibility score of the transition. At most one edge is stored per
//! ordered `(source, target)` pair.
//!
//! Full edge computation is quadratic, so pairs are first run through a
//! cheap tempo-ratio check ([`bpm_compatible`]). Surviving pairs are scored
//! in parallel with rayon and inserted serially.

use crate::error::GraphError;
use crate::scoring::{compute_compatibility, EdgeScores, ScoringWeights};
use crate::track::Track;
use log::{debug, info};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use uuid::Uuid;

/// Pairs whose tempo ratio is within this bound are always scored.
pub const PREFILTER_MAX_RATIO: f64 = 1.12;
/// Half/double-time band that is also scored.
pub const PREFILTER_DOUBLE_TIME: (f64, f64) = (1.90, 2.10);
/// Default minimum score for a computed edge to be stored.
pub const DEFAULT_EDGE_THRESHOLD: f64 = 0.3;

/// A weighted directional transition between two tracks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Edge {
    pub source_id: Uuid,
    pub target_id: Uuid,
    pub compatibility_score: f64,
    pub scores: EdgeScores,
    /// Drawn by hand; never replaced by computed edges.
    #[serde(default)]
    pub is_user_created: bool,
}

impl Edge {
    /// The `(source, target)` pair identifying this edge.
    #[must_use]
    pub fn key(&self) -> (Uuid, Uuid) {
        (self.source_id, self.target_id)
    }
}

/// Summary numbers for a graph.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GraphStats {
    pub node_count: usize,
    pub edge_count: usize,
    pub user_edge_count: usize,
    pub avg_score: f64,
    /// Stored edges over possible directed edges.
    pub density: f64,
}

/// Cheap tempo check run before full scoring.
///
/// Non-positive tempos cannot be judged and always pass.
#[must_use]
pub fn bpm_compatible(bpm_a: f64, bpm_b: f64) -> bool {
    if bpm_a <= 0.0 || bpm_b <= 0.0 {
        return true;
    }
    let ratio = bpm_a.max(bpm_b) / bpm_a.min(bpm_b);
    ratio <= PREFILTER_MAX_RATIO
        || (PREFILTER_DOUBLE_TIME.0..=PREFILTER_DOUBLE_TIME.1).contains(&ratio)
}

/// Directed compatibility graph over a track library.
#[derive(Debug, Clone, Default)]
pub struct CompatibilityGraph {
    nodes: HashMap<Uuid, Track>,
    /// Insertion order, so pair enumeration is deterministic.
    order: Vec<Uuid>,
    edges: HashMap<(Uuid, Uuid), Edge>,
    outgoing: HashMap<Uuid, HashSet<Uuid>>,
    incoming: HashMap<Uuid, HashSet<Uuid>>,
}

impl CompatibilityGraph {
    /// An empty graph.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a graph holding `tracks` as nodes, without edges.
    #[must_use]
    pub fn from_tracks(tracks: impl IntoIterator<Item = Track>) -> Self {
        let mut graph = Self::new();
        for track in tracks {
            graph.add_node(track);
        }
        graph
    }

    // ---------------------------------------------------------------------
    // Nodes
    // ---------------------------------------------------------------------

    /// Insert a track, replacing the stored record if the id already exists.
    ///
    /// Existing edges of a replaced node are kept.
    pub fn add_node(&mut self, track: Track) {
        let id = track.id;
        if self.nodes.insert(id, track).is_none() {
            self.order.push(id);
        }
    }

    /// Remove a node and every edge touching it. Returns the removed track.
    pub fn remove_node(&mut self, id: Uuid) -> Option<Track> {
        let track = self.nodes.remove(&id)?;
        self.order.retain(|other| *other != id);

        for target in self.outgoing.remove(&id).unwrap_or_default() {
            self.edges.remove(&(id, target));
            if let Some(sources) = self.incoming.get_mut(&target) {
                sources.remove(&id);
            }
        }
        for source in self.incoming.remove(&id).unwrap_or_default() {
            self.edges.remove(&(source, id));
            if let Some(targets) = self.outgoing.get_mut(&source) {
                targets.remove(&id);
            }
        }
        debug!("Removed node {id} and its edges");
        Some(track)
    }

    /// Look up a node by track id.
    #[must_use]
    pub fn get_node(&self, id: Uuid) -> Option<&Track> {
        self.nodes.get(&id)
    }

    /// Whether `id` is a node of this graph.
    #[must_use]
    pub fn has_node(&self, id: Uuid) -> bool {
        self.nodes.contains_key(&id)
    }

    /// Tracks in insertion order.
    pub fn nodes(&self) -> impl Iterator<Item = &Track> + '_ {
        self.order.iter().filter_map(|id| self.nodes.get(id))
    }

    /// Mutable access for write-back of graph state such as `cluster_id`.
    pub fn nodes_mut(&mut self) -> impl Iterator<Item = &mut Track> + '_ {
        self.nodes.values_mut()
    }

    /// Number of tracks in the graph.
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    // ---------------------------------------------------------------------
    // Edges
    // ---------------------------------------------------------------------

    /// Number of stored directed edges, user-created ones included.
    #[must_use]
    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    /// Whether an edge `source -> target` is stored. Direction matters.
    #[must_use]
    pub fn has_edge(&self, source: Uuid, target: Uuid) -> bool {
        self.edges.contains_key(&(source, target))
    }

    /// The edge `source -> target`, if stored.
    #[must_use]
    pub fn get_edge(&self, source: Uuid, target: Uuid) -> Option<&Edge> {
        self.edges.get(&(source, target))
    }

    /// All stored edges in no particular order.
    pub fn edges(&self) -> impl Iterator<Item = &Edge> + '_ {
        self.edges.values()
    }

    /// Outgoing and incoming edges of a node.
    #[must_use]
    pub fn edges_for_node(&self, id: Uuid) -> Vec<&Edge> {
        let outgoing = self
            .outgoing
            .get(&id)
            .into_iter()
            .flatten()
            .filter_map(|target| self.edges.get(&(id, *target)));
        let incoming = self
            .incoming
            .get(&id)
            .into_iter()
            .flatten()
            .filter_map(|source| self.edges.get(&(*source, id)));
        outgoing.chain(incoming).collect()
    }

    /// Outgoing edges of `id`, best first.
    #[must_use]
    pub fn neighbors_by_score(&self, id: Uuid, limit: usize) -> Vec<&Edge> {
        let mut out: Vec<&Edge> = self
            .outgoing
            .get(&id)
            .into_iter()
            .flatten()
            .filter_map(|target| self.edges.get(&(id, *target)))
            .collect();
        out.sort_by(|a, b| {
            b.compatibility_score
                .total_cmp(&a.compatibility_score)
                .then_with(|| a.target_id.cmp(&b.target_id))
        });
        out.truncate(limit);
        out
    }

    /// Edges scoring at least `threshold`.
    #[must_use]
    pub fn edges_above(&self, threshold: f64) -> Vec<&Edge> {
        self.edges
            .values()
            .filter(|edge| edge.compatibility_score >= threshold)
            .collect()
    }

    /// Insert a pre-computed edge, e.g. one loaded from storage.
    ///
    /// A user-created edge already on the pair is never replaced by a
    /// computed one. Returns whether the edge was stored.
    ///
    /// # Errors
    ///
    /// Both endpoints must be nodes and must differ.
    pub fn add_edge(&mut self, edge: Edge) -> Result<bool, GraphError> {
        self.check_endpoints(edge.source_id, edge.target_id)?;
        if let Some(existing) = self.edges.get(&edge.key()) {
            if existing.is_user_created && !edge.is_user_created {
                return Ok(false);
            }
        }
        self.insert_edge(edge);
        Ok(true)
    }

    /// Draw an edge by hand, replacing any computed edge on the pair.
    ///
    /// The stored score and breakdown are informational only. Insertion is
    /// never gated on them: user edges skip both the edge threshold and the
    /// tempo pre-filter.
    ///
    /// # Errors
    ///
    /// Both endpoints must be nodes and must differ.
    pub fn add_user_edge(
        &mut self,
        source: Uuid,
        target: Uuid,
        weights: &ScoringWeights,
    ) -> Result<Edge, GraphError> {
        self.check_endpoints(source, target)?;
        let (score, scores) = match (self.nodes.get(&source), self.nodes.get(&target)) {
            (Some(a), Some(b)) => compute_compatibility(a, b, weights),
            _ => return Err(GraphError::UnknownNode(source)),
        };
        let edge = Edge {
            source_id: source,
            target_id: target,
            compatibility_score: score,
            scores,
            is_user_created: true,
        };
        self.insert_edge(edge.clone());
        info!("User edge {source} -> {target} (score {score:.2})");
        Ok(edge)
    }

    /// Remove one directed edge.
    pub fn remove_edge(&mut self, source: Uuid, target: Uuid) -> Option<Edge> {
        let edge = self.edges.remove(&(source, target))?;
        if let Some(targets) = self.outgoing.get_mut(&source) {
            targets.remove(&target);
        }
        if let Some(sources) = self.incoming.get_mut(&target) {
            sources.remove(&source);
        }
        Some(edge)
    }

    fn check_endpoints(&self, source: Uuid, target: Uuid) -> Result<(), GraphError> {
        if source == target {
            return Err(GraphError::SelfEdge(source));
        }
        for id in [source, target] {
            if !self.nodes.contains_key(&id) {
                return Err(GraphError::UnknownNode(id));
            }
        }
        Ok(())
    }

    fn insert_edge(&mut self, edge: Edge) {
        let (source, target) = edge.key();
        self.outgoing.entry(source).or_default().insert(target);
        self.incoming.entry(target).or_default().insert(source);
        self.edges.insert((source, target), edge);
    }

    // ---------------------------------------------------------------------
    // Edge computation
    // ---------------------------------------------------------------------

    /// Score every ordered pair of distinct nodes that has no edge yet.
    ///
    /// Pairs rejected by [`bpm_compatible`] are never scored. Only edges
    /// scoring at least `threshold` are stored. Returns the new edges in
    /// node insertion order.
    ///
    /// Sources are spread over the rayon pool and each source streams its
    /// targets, so memory grows with the edges kept, not with n².
    ///
    /// # Examples
    ///
    /// ```
    /// use mixgraph::graph::CompatibilityGraph;
    /// use mixgraph::scoring::ScoringWeights;
    /// use mixgraph::track::Track;
    ///
    /// let a = Track::builder(128.0, "8A").build()?;
    /// let b = Track::builder(127.0, "9A").build()?;
    /// let mut graph = CompatibilityGraph::from_tracks([a, b]);
    ///
    /// let created = graph.compute_edges(0.3, &ScoringWeights::default());
    /// assert_eq!(created.len(), 2);
    /// assert!(graph.compute_edges(0.3, &ScoringWeights::default()).is_empty());
    /// # Ok::<(), mixgraph::error::ValidationError>(())
    /// ```
    pub fn compute_edges(&mut self, threshold: f64, weights: &ScoringWeights) -> Vec<Edge> {
        let scorer = PairScorer::new(threshold, weights);
        let scored = self.score_missing_pairs(&scorer);
        let created = self.insert_computed(scored);
        info!(
            "Computed edges over {} nodes: scored {} pairs, pre-filter skipped {}, created {}",
            self.node_count(),
            scorer.scored(),
            scorer.skipped(),
            created.len()
        );
        created
    }

    /// Incremental edge computation for tracks added since the last run.
    ///
    /// Tracks not yet in the graph are inserted. Only pairs with at least one
    /// new endpoint are considered, in both directions. The resulting edge
    /// set matches a fresh [`compute_edges`](Self::compute_edges) over the
    /// same nodes. Repeated ids in `new_tracks` are handled once.
    pub fn compute_edges_for_new_tracks(
        &mut self,
        new_tracks: &[Track],
        threshold: f64,
        weights: &ScoringWeights,
    ) -> Vec<Edge> {
        for track in new_tracks {
            if !self.has_node(track.id) {
                self.add_node(track.clone());
            }
        }

        let mut seen = HashSet::with_capacity(new_tracks.len());
        let new_ids: Vec<Uuid> = new_tracks
            .iter()
            .map(|t| t.id)
            .filter(|id| seen.insert(*id))
            .collect();

        let scorer = PairScorer::new(threshold, weights);
        let scored = self.score_new_pairs(&new_ids, &seen, &scorer);
        let created = self.insert_computed(scored);
        info!(
            "Incremental edges for {} new tracks: scored {} pairs, pre-filter skipped {}, created {}",
            new_ids.len(),
            scorer.scored(),
            scorer.skipped(),
            created.len()
        );
        created
    }

    /// The edge `source -> target` if the pair is distinct, has no edge yet
    /// and passes the scorer.
    fn score_if_missing(&self, scorer: &PairScorer, source: &Track, target: &Track) -> Option<Edge> {
        if source.id == target.id || self.has_edge(source.id, target.id) {
            return None;
        }
        scorer.score(source, target)
    }

    fn score_missing_pairs(&self, scorer: &PairScorer) -> Vec<Edge> {
        self.order
            .par_iter()
            .filter_map(|id| self.nodes.get(id))
            .flat_map_iter(|source| {
                self.nodes()
                    .filter_map(move |target| self.score_if_missing(scorer, source, target))
            })
            .collect()
    }

    fn score_new_pairs(&self, new_ids: &[Uuid], is_new: &HashSet<Uuid>, scorer: &PairScorer) -> Vec<Edge> {
        new_ids
            .par_iter()
            .filter_map(|id| self.nodes.get(id))
            .flat_map_iter(|fresh| {
                self.nodes().flat_map(move |existing| {
                    let outgoing = self.score_if_missing(scorer, fresh, existing);
                    // new x new pairs are covered by the other side's outgoing pass
                    let incoming = if is_new.contains(&existing.id) {
                        None
                    } else {
                        self.score_if_missing(scorer, existing, fresh)
                    };
                    outgoing.into_iter().chain(incoming)
                })
            })
            .collect()
    }

    /// Serial insertion step shared by both compute paths.
    fn insert_computed(&mut self, scored: Vec<Edge>) -> Vec<Edge> {
        let mut created = Vec::with_capacity(scored.len());
        for edge in scored {
            if self.has_edge(edge.source_id, edge.target_id) {
                continue;
            }
            self.insert_edge(edge.clone());
            created.push(edge);
        }
        created
    }

    /// Node and edge counts, mean edge score and density.
    ///
    /// Density is stored edges over the `n * (n - 1)` possible directed
    /// edges, and zero for graphs with fewer than two nodes.
    ///
    /// # Examples
    ///
    /// ```
    /// use mixgraph::graph::CompatibilityGraph;
    ///
    /// let stats = CompatibilityGraph::new().stats();
    /// assert_eq!(stats.node_count, 0);
    /// assert_eq!(stats.density, 0.0);
    /// ```
    #[must_use]
    pub fn stats(&self) -> GraphStats {
        let node_count = self.node_count();
        let edge_count = self.edge_count();
        #[allow(clippy::cast_precision_loss)]
        let avg_score = if edge_count == 0 {
            0.0
        } else {
            self.edges.values().map(|e| e.compatibility_score).sum::<f64>() / edge_count as f64
        };
        let possible = node_count.saturating_mul(node_count.saturating_sub(1));
        #[allow(clippy::cast_precision_loss)]
        let density = if possible == 0 {
            0.0
        } else {
            edge_count as f64 / possible as f64
        };
        GraphStats {
            node_count,
            edge_count,
            user_edge_count: self.edges.values().filter(|e| e.is_user_created).count(),
            avg_score,
            density,
        }
    }
}

/// Shared scoring state for one compute pass. Counters are updated from
/// rayon workers.
struct PairScorer {
    threshold: f64,
    weights: ScoringWeights,
    scored: AtomicUsize,
    skipped: AtomicUsize,
}

impl PairScorer {
    fn new(threshold: f64, weights: &ScoringWeights) -> Self {
        Self {
            threshold,
            weights: weights.normalized(),
            scored: AtomicUsize::new(0),
            skipped: AtomicUsize::new(0),
        }
    }

    fn score(&self, source: &Track, target: &Track) -> Option<Edge> {
        if !bpm_compatible(source.bpm, target.bpm) {
            self.skipped.fetch_add(1, Ordering::Relaxed);
            return None;
        }
        self.scored.fetch_add(1, Ordering::Relaxed);
        let (score, scores) = compute_compatibility(source, target, &self.weights);
        (score >= self.threshold).then(|| Edge {
            source_id: source.id,
            target_id: target.id,
            compatibility_score: score,
            scores,
            is_user_created: false,
        })
    }

    fn scored(&self) -> usize {
        self.scored.load(Ordering::Relaxed)
    }

    fn skipped(&self) -> usize {
        self.skipped.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::track::{FrequencyWeight, GrooveType};

    fn track(bpm: f64, key: &str, energy: f64) -> Track {
        Track::builder(bpm, key).energy(energy).build().unwrap()
    }

    fn edge_map(graph: &CompatibilityGraph) -> HashMap<(Uuid, Uuid), f64> {
        graph.edges().map(|e| (e.key(), e.compatibility_score)).collect()
    }

    #[test]
    fn test_bpm_prefilter() {
        assert!(bpm_compatible(128.0, 128.0));
        assert!(bpm_compatible(128.0, 140.0));
        assert!(!bpm_compatible(128.0, 150.0));
        assert!(bpm_compatible(128.0, 64.0));
        assert!(bpm_compatible(70.0, 140.0));
        assert!(!bpm_compatible(128.0, 235.0));
        assert!(!bpm_compatible(100.0, 211.0));
        assert!(bpm_compatible(0.0, 140.0));
    }

    #[test]
    fn test_add_and_remove_node_cascades() {
        let a = track(128.0, "8A", 0.8);
        let b = track(127.0, "9A", 0.7);
        let c = track(126.0, "8B", 0.6);
        let (ida, idb, idc) = (a.id, b.id, c.id);
        let mut graph = CompatibilityGraph::from_tracks([a, b, c]);

        graph.compute_edges(0.0, &ScoringWeights::default());
        assert_eq!(graph.edge_count(), 6);
        assert_eq!(graph.edges_for_node(ida).len(), 4);

        assert!(graph.remove_node(ida).is_some());
        assert!(!graph.has_node(ida));
        assert_eq!(graph.edge_count(), 2);
        assert!(graph.has_edge(idb, idc));
        assert!(graph.has_edge(idc, idb));
        assert!(graph.edges_for_node(ida).is_empty());
        assert!(graph.remove_node(ida).is_none());
    }

    #[test]
    fn test_no_self_edges_and_threshold() {
        let tracks = vec![track(128.0, "8A", 0.8), track(128.0, "2B", 0.1)];
        let mut graph = CompatibilityGraph::from_tracks(tracks.clone());
        let created = graph.compute_edges(0.99, &ScoringWeights::default());
        assert!(created.is_empty());

        graph.compute_edges(0.0, &ScoringWeights::default());
        for edge in graph.edges() {
            assert_ne!(edge.source_id, edge.target_id);
            assert!((0.0..=1.0).contains(&edge.compatibility_score));
        }
    }

    #[test]
    fn test_compute_edges_is_idempotent() {
        let tracks: Vec<Track> = (0..12_u32)
            .map(|i| track(120.0 + f64::from(i), if i % 2 == 0 { "8A" } else { "9A" }, 0.5))
            .collect();
        let mut graph = CompatibilityGraph::from_tracks(tracks);
        let first = graph.compute_edges(0.3, &ScoringWeights::default());
        assert!(!first.is_empty());
        let second = graph.compute_edges(0.3, &ScoringWeights::default());
        assert!(second.is_empty());
        assert_eq!(graph.edge_count(), first.len());
    }

    #[test]
    fn test_prefiltered_pair_never_gets_an_edge() {
        let mut graph = CompatibilityGraph::from_tracks([track(128.0, "8A", 0.5), track(150.0, "8A", 0.5)]);
        let created = graph.compute_edges(0.0, &ScoringWeights::default());
        assert!(created.is_empty());
        assert_eq!(graph.edge_count(), 0);
    }

    #[test]
    fn test_incremental_matches_full_computation() {
        let tracks: Vec<Track> = (0..16_u32)
            .map(|i| {
                let key = format!("{}{}", (i % 12) + 1, if i % 3 == 0 { 'B' } else { 'A' });
                Track::builder(118.0 + f64::from(i) * 1.5, &key)
                    .energy(0.3 + f64::from(i) * 0.04)
                    .mix_scores(0.5 + f64::from(i % 5) * 0.1, 0.9 - f64::from(i % 4) * 0.1)
                    .groove(GrooveType::ALL[i as usize % 6])
                    .build()
                    .unwrap()
            })
            .collect();
        let weights = ScoringWeights::default();

        let mut full = CompatibilityGraph::from_tracks(tracks.clone());
        full.compute_edges(0.3, &weights);

        let mut incremental = CompatibilityGraph::from_tracks(tracks[..9].iter().cloned());
        incremental.compute_edges(0.3, &weights);
        incremental.compute_edges_for_new_tracks(&tracks[9..13], 0.3, &weights);
        incremental.compute_edges_for_new_tracks(&tracks[13..], 0.3, &weights);

        assert_eq!(edge_map(&incremental), edge_map(&full));
    }

    #[test]
    fn test_incremental_from_empty_matches_full() {
        let tracks: Vec<Track> = (0..8_u32).map(|i| track(124.0 + f64::from(i), "5A", 0.6)).collect();
        let weights = ScoringWeights::default();

        let mut full = CompatibilityGraph::from_tracks(tracks.clone());
        full.compute_edges(0.3, &weights);

        let mut incremental = CompatibilityGraph::new();
        incremental.compute_edges_for_new_tracks(&tracks[..4], 0.3, &weights);
        incremental.compute_edges_for_new_tracks(&tracks[4..], 0.3, &weights);
        assert_eq!(edge_map(&incremental), edge_map(&full));
        assert_eq!(incremental.edge_count(), 8 * 7);
    }

    #[test]
    fn test_incremental_does_not_duplicate() {
        let a = track(128.0, "8A", 0.8);
        let b = track(128.0, "8A", 0.7);
        let mut graph = CompatibilityGraph::from_tracks([a.clone()]);
        let first = graph.compute_edges_for_new_tracks(&[b.clone(), b.clone()], 0.0, &ScoringWeights::default());
        assert_eq!(first.len(), 2);
        let again = graph.compute_edges_for_new_tracks(&[b], 0.0, &ScoringWeights::default());
        assert!(again.is_empty());
        assert_eq!(graph.edge_count(), 2);
    }

    #[test]
    fn test_user_edges_survive_recomputation() {
        let a = track(128.0, "8A", 0.8);
        let b = track(175.0, "2B", 0.1);
        let (ida, idb) = (a.id, b.id);
        let mut graph = CompatibilityGraph::from_tracks([a, b]);

        let user = graph.add_user_edge(ida, idb, &ScoringWeights::default()).unwrap();
        assert!(user.is_user_created);

        let created = graph.compute_edges(0.0, &ScoringWeights::default());
        assert!(created.is_empty(), "pre-filter still applies to computed edges");
        assert!(graph.get_edge(ida, idb).unwrap().is_user_created);

        let computed = Edge { is_user_created: false, compatibility_score: 0.9, ..user.clone() };
        assert_eq!(graph.add_edge(computed), Ok(false));
        assert_eq!(graph.get_edge(ida, idb), Some(&user));
        assert_eq!(graph.stats().user_edge_count, 1);
    }

    #[test]
    fn test_user_edge_ignores_threshold_and_prefilter() {
        let a = Track::builder(128.0, "8A")
            .energy(0.9)
            .mix_scores(0.8, 0.1)
            .frequency_weight(FrequencyWeight::BassHeavy)
            .build()
            .unwrap();
        let b = Track::builder(150.0, "3B")
            .energy(0.1)
            .mix_scores(0.1, 0.8)
            .groove(GrooveType::Complex)
            .frequency_weight(FrequencyWeight::Bright)
            .build()
            .unwrap();
        let (ida, idb) = (a.id, b.id);
        let mut graph = CompatibilityGraph::from_tracks([a, b]);

        let user = graph.add_user_edge(ida, idb, &ScoringWeights::default()).unwrap();
        assert!(!bpm_compatible(128.0, 150.0));
        assert!(user.compatibility_score < DEFAULT_EDGE_THRESHOLD, "got {}", user.compatibility_score);
        assert!(graph.has_edge(ida, idb));
    }

    #[test]
    fn test_compute_edges_matches_pairwise_scoring() {
        let tracks: Vec<Track> = (0..14_u32)
            .map(|i| {
                let key = format!("{}{}", (i % 12) + 1, if i % 2 == 0 { 'A' } else { 'B' });
                Track::builder(100.0 + f64::from(i) * 6.0, &key)
                    .energy(0.2 + f64::from(i) * 0.05)
                    .groove(GrooveType::ALL[i as usize % 6])
                    .build()
                    .unwrap()
            })
            .collect();
        let weights = ScoringWeights::default();
        let mut graph = CompatibilityGraph::from_tracks(tracks.clone());
        let created = graph.compute_edges(0.4, &weights);

        let mut expected = Vec::new();
        for a in &tracks {
            for b in &tracks {
                if a.id == b.id || !bpm_compatible(a.bpm, b.bpm) {
                    continue;
                }
                let (score, _) = compute_compatibility(a, b, &weights.normalized());
                if score >= 0.4 {
                    expected.push((a.id, b.id));
                }
            }
        }
        assert!(!expected.is_empty());
        let created_keys: Vec<_> = created.iter().map(Edge::key).collect();
        assert_eq!(created_keys, expected);
        assert_eq!(graph.edge_count(), expected.len());
    }

    #[test]
    fn test_nodes_mut_writes_back_cluster_ids() {
        let tracks: Vec<Track> = (0..4_u32).map(|i| track(126.0 + f64::from(i), "8A", 0.5)).collect();
        let mut graph = CompatibilityGraph::from_tracks(tracks.clone());
        let clustering = crate::cluster::Clustering {
            clusters: Vec::new(),
            assignments: tracks.iter().map(|t| (t.id, Some(7))).collect(),
        };

        clustering.apply(graph.nodes_mut());
        assert!(graph.nodes().all(|t| t.cluster_id == Some(7)));
        assert_eq!(graph.node_count(), 4);
    }

    #[test]
    fn test_edge_endpoint_errors() {
        let a = track(128.0, "8A", 0.8);
        let ida = a.id;
        let mut graph = CompatibilityGraph::from_tracks([a]);
        let stranger = Uuid::new_v4();
        assert_eq!(
            graph.add_user_edge(ida, stranger, &ScoringWeights::default()),
            Err(GraphError::UnknownNode(stranger))
        );
        assert_eq!(
            graph.add_user_edge(ida, ida, &ScoringWeights::default()),
            Err(GraphError::SelfEdge(ida))
        );
    }

    #[test]
    fn test_neighbors_and_stats() {
        let a = track(128.0, "8A", 0.8);
        let b = track(128.0, "8A", 0.8);
        let c = track(128.0, "3B", 0.2);
        let (ida, idb) = (a.id, b.id);
        let mut graph = CompatibilityGraph::from_tracks([a, b, c]);
        graph.compute_edges(0.0, &ScoringWeights::default());

        let best = graph.neighbors_by_score(ida, 1);
        assert_eq!(best.len(), 1);
        assert_eq!(best[0].target_id, idb);

        let stats = graph.stats();
        assert_eq!(stats.node_count, 3);
        assert_eq!(stats.edge_count, 6);
        assert!((stats.density - 1.0).abs() < 1e-12);
        assert!(stats.avg_score > 0.0);
        assert!(graph.edges_above(0.99).len() <= stats.edge_count);

        assert!(graph.remove_edge(ida, idb).is_some());
        assert!(!graph.has_edge(ida, idb));
        assert!(graph.has_edge(idb, ida));
    }
}
