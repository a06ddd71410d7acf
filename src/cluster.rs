//! Vibe islands: density-based clustering of tracks.
//!
//! Each track becomes a 7-dimensional feature vector:
//!
//! ```text
//! [energy, danceability, valence, bpm / 200, acousticness, instrumentalness, groove_ordinal]
//! ```
//!
//! Vectors are standardized per dimension and clustered with DBSCAN under
//! cosine distance. Points that no core point reaches are noise and get no
//! cluster. Every run is a full recompute.

use crate::error::{Result, ValidationError};
use crate::track::{title_case, CamelotKey, FrequencyWeight, GrooveType, Track};
use log::{debug, info};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::hash::Hash;
use uuid::Uuid;

pub const FEATURE_DIMENSIONS: usize = 7;

pub type FeatureVector = [f64; FEATURE_DIMENSIONS];

/// DBSCAN parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClusterConfig {
    /// Neighborhood radius in cosine distance
    pub eps: f64,
    /// Neighbors (the point included) needed for a core point
    pub min_samples: usize,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            eps: 0.5,
            min_samples: 3,
        }
    }
}

impl ClusterConfig {
    /// # Errors
    ///
    /// `eps` must be finite and positive, `min_samples` at least 1.
    pub fn validate(&self) -> Result<()> {
        if !self.eps.is_finite() || self.eps <= 0.0 {
            return Err(ValidationError::InvalidClusterConfig(format!(
                "eps must be positive, got {}",
                self.eps
            )));
        }
        if self.min_samples == 0 {
            return Err(ValidationError::InvalidClusterConfig(
                "min_samples must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// A vibe island and its aggregate traits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cluster {
    pub id: u32,
    pub label: String,
    pub track_ids: Vec<Uuid>,
    /// Mean of the members' unstandardized feature vectors
    pub centroid: FeatureVector,
    pub avg_bpm: f64,
    pub avg_energy: f64,
    pub dominant_key: CamelotKey,
    pub dominant_groove: GrooveType,
    pub dominant_frequency_weight: FrequencyWeight,
    pub track_count: usize,
}

impl Cluster {
    /// Whether the track is a member of this cluster.
    #[must_use]
    pub fn contains(&self, id: Uuid) -> bool {
        self.track_ids.contains(&id)
    }
}

/// Result of one clustering run.
///
/// Tracks are not touched; the caller writes the assignments back with
/// [`Clustering::apply`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Clustering {
    pub clusters: Vec<Cluster>,
    /// Every input track mapped to its cluster, `None` for noise
    pub assignments: BTreeMap<Uuid, Option<u32>>,
}

impl Clustering {
    /// Tracks assigned to no cluster.
    #[must_use]
    pub fn noise_count(&self) -> usize {
        self.assignments.values().filter(|a| a.is_none()).count()
    }

    /// Cluster of `id`, or `None` for noise and for tracks not in this run.
    #[must_use]
    pub fn cluster_of(&self, id: Uuid) -> Option<u32> {
        self.assignments.get(&id).copied().flatten()
    }

    /// Write `cluster_id` onto every track this run assigned.
    ///
    /// Tracks that were not part of the run keep their current value.
    pub fn apply<'a>(&self, tracks: impl IntoIterator<Item = &'a mut Track>) {
        for track in tracks {
            if let Some(assignment) = self.assignments.get(&track.id) {
                track.cluster_id = *assignment;
            }
        }
    }
}

/// Fixed ordinal encoding of groove types, evenly spaced in `[0, 0.83]`.
#[must_use]
pub const fn groove_ordinal(groove: GrooveType) -> f64 {
    match groove {
        GrooveType::FourOnFloor => 0.0,
        GrooveType::Straight => 0.17,
        GrooveType::HalfTime => 0.33,
        GrooveType::Breakbeat => 0.50,
        GrooveType::Syncopated => 0.67,
        GrooveType::Complex => 0.83,
    }
}

/// Raw (unstandardized) feature vector in the module's dimension order.
#[must_use]
pub fn track_to_vector(track: &Track) -> FeatureVector {
    [
        track.energy,
        track.danceability,
        track.valence,
        track.bpm / 200.0,
        track.acousticness,
        track.instrumentalness,
        groove_ordinal(track.groove_type),
    ]
}

/// Zero mean and unit population variance per dimension.
///
/// Dimensions without variance are centered only.
#[must_use]
pub fn standardize(vectors: &[FeatureVector]) -> Vec<FeatureVector> {
    if vectors.is_empty() {
        return Vec::new();
    }
    #[allow(clippy::cast_precision_loss)]
    let n = vectors.len() as f64;

    let mut mean = [0.0; FEATURE_DIMENSIONS];
    for v in vectors {
        for (m, x) in mean.iter_mut().zip(v) {
            *m += x;
        }
    }
    mean.iter_mut().for_each(|m| *m /= n);

    let mut scale = [0.0; FEATURE_DIMENSIONS];
    for v in vectors {
        for d in 0..FEATURE_DIMENSIONS {
            scale[d] += (v[d] - mean[d]).powi(2);
        }
    }
    for s in &mut scale {
        let std = (*s / n).sqrt();
        *s = if std > 0.0 { std } else { 1.0 };
    }

    vectors
        .iter()
        .map(|v| std::array::from_fn(|d| (v[d] - mean[d]) / scale[d]))
        .collect()
}

/// `1 - cos(a, b)`. A zero vector is at distance 1 from everything.
#[must_use]
pub fn cosine_distance(a: &FeatureVector, b: &FeatureVector) -> f64 {
    let dot: f64 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a = a.iter().map(|x| x * x).sum::<f64>().sqrt();
    let norm_b = b.iter().map(|x| x * x).sum::<f64>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 1.0;
    }
    1.0 - dot / (norm_a * norm_b)
}

/// DBSCAN over cosine distance. Returns one label per point, `None` for noise.
///
/// A point always counts itself as a neighbor. Clusters are numbered in the
/// order their first core point appears; a border point joins the first
/// cluster that reaches it.
#[must_use]
pub fn dbscan(points: &[FeatureVector], eps: f64, min_samples: usize) -> Vec<Option<u32>> {
    let n = points.len();
    let neighborhoods: Vec<Vec<usize>> = (0..n)
        .into_par_iter()
        .map(|i| {
            (0..n)
                .filter(|&j| i == j || cosine_distance(&points[i], &points[j]) <= eps)
                .collect()
        })
        .collect();
    let core: Vec<bool> = neighborhoods.iter().map(|nb| nb.len() >= min_samples).collect();

    let mut labels: Vec<Option<u32>> = vec![None; n];
    let mut next_cluster = 0u32;

    for i in 0..n {
        if labels[i].is_some() || !core[i] {
            continue;
        }
        let mut stack = vec![i];
        while let Some(current) = stack.pop() {
            if labels[current].is_some() {
                continue;
            }
            labels[current] = Some(next_cluster);
            for &j in &neighborhoods[current] {
                if labels[j].is_some() {
                    continue;
                }
                if core[j] {
                    stack.push(j);
                } else {
                    labels[j] = Some(next_cluster);
                }
            }
        }
        next_cluster += 1;
    }
    labels
}

/// Most frequent value; ties go to whichever appeared first.
fn mode<T: Copy + Eq + Hash>(values: impl IntoIterator<Item = T>) -> Option<T> {
    let mut counts: HashMap<T, usize> = HashMap::new();
    let mut order = Vec::new();
    for value in values {
        let count = counts.entry(value).or_insert(0);
        if *count == 0 {
            order.push(value);
        }
        *count += 1;
    }
    let mut best: Option<(T, usize)> = None;
    for value in order {
        let count = counts[&value];
        if best.map_or(true, |(_, c)| count > c) {
            best = Some((value, count));
        }
    }
    best.map(|(value, _)| value)
}

#[allow(clippy::cast_precision_loss)]
fn mean_of(tracks: &[&Track], f: impl Fn(&Track) -> f64) -> f64 {
    if tracks.is_empty() {
        return 0.0;
    }
    tracks.iter().map(|t| f(*t)).sum::<f64>() / tracks.len() as f64
}

/// Human-readable label, e.g. `"High Energy 128 BPM Four On Floor Bass Heavy"`.
#[must_use]
pub fn label_cluster(tracks: &[&Track]) -> String {
    let (Some(groove), Some(frequency)) = (
        mode(tracks.iter().map(|t| t.groove_type)),
        mode(tracks.iter().map(|t| t.frequency_weight)),
    ) else {
        return "Empty Cluster".to_string();
    };

    let avg_energy = mean_of(tracks, |t| t.energy);
    let avg_bpm = mean_of(tracks, |t| t.bpm);
    let tier = if avg_energy > 0.7 {
        "High Energy"
    } else if avg_energy > 0.4 {
        "Mid Energy"
    } else {
        "Low Energy"
    };

    #[allow(clippy::cast_possible_truncation)]
    let bpm = avg_bpm.floor() as i64;
    format!(
        "{tier} {bpm} BPM {} {}",
        title_case(groove.as_str()),
        title_case(frequency.as_str())
    )
}

fn build_cluster(id: u32, members: &[&Track], vectors: &[FeatureVector]) -> Option<Cluster> {
    let dominant_key = mode(members.iter().map(|t| t.key))?;
    let dominant_groove = mode(members.iter().map(|t| t.groove_type))?;
    let dominant_frequency_weight = mode(members.iter().map(|t| t.frequency_weight))?;

    #[allow(clippy::cast_precision_loss)]
    let count = vectors.len() as f64;
    let centroid: FeatureVector =
        std::array::from_fn(|d| vectors.iter().map(|v| v[d]).sum::<f64>() / count);

    Some(Cluster {
        id,
        label: label_cluster(members),
        track_ids: members.iter().map(|t| t.id).collect(),
        centroid,
        avg_bpm: mean_of(members, |t| t.bpm),
        avg_energy: mean_of(members, |t| t.energy),
        dominant_key,
        dominant_groove,
        dominant_frequency_weight,
        track_count: members.len(),
    })
}

/// Cluster `tracks` without mutating them.
///
/// With fewer than `min_samples` tracks there are no clusters and every
/// track is assigned `None`.
///
/// # Examples
///
/// ```
/// use mixgraph::cluster::{cluster, ClusterConfig};
/// use mixgraph::track::Track;
///
/// let tracks = vec![Track::builder(128.0, "8A").build()?];
/// let result = cluster(&tracks, &ClusterConfig::default());
/// assert!(result.clusters.is_empty());
/// assert_eq!(result.cluster_of(tracks[0].id), None);
/// # Ok::<(), mixgraph::error::ValidationError>(())
/// ```
#[must_use]
pub fn cluster(tracks: &[Track], config: &ClusterConfig) -> Clustering {
    if tracks.len() < config.min_samples {
        info!(
            "Too few tracks ({}) for clustering (min_samples={})",
            tracks.len(),
            config.min_samples
        );
        return Clustering {
            clusters: Vec::new(),
            assignments: tracks.iter().map(|t| (t.id, None)).collect(),
        };
    }

    let vectors: Vec<FeatureVector> = tracks.iter().map(track_to_vector).collect();
    let scaled = standardize(&vectors);
    let labels = dbscan(&scaled, config.eps, config.min_samples);

    let mut members: BTreeMap<u32, (Vec<&Track>, Vec<FeatureVector>)> = BTreeMap::new();
    for ((track, vector), label) in tracks.iter().zip(&vectors).zip(&labels) {
        if let Some(id) = label {
            let entry = members.entry(*id).or_default();
            entry.0.push(track);
            entry.1.push(*vector);
        }
    }

    let clusters: Vec<Cluster> = members
        .iter()
        .filter_map(|(id, (group, group_vectors))| build_cluster(*id, group, group_vectors))
        .collect();
    for c in &clusters {
        debug!("Cluster {} '{}' with {} tracks", c.id, c.label, c.track_count);
    }

    let clustering = Clustering {
        clusters,
        assignments: tracks.iter().zip(&labels).map(|(t, l)| (t.id, *l)).collect(),
    };
    info!(
        "Clustered {} tracks into {} clusters ({} noise)",
        tracks.len(),
        clustering.clusters.len(),
        clustering.noise_count()
    );
    clustering
}

/// Cluster and write `cluster_id` back onto `tracks` in one step.
pub fn cluster_tracks(tracks: &mut [Track], config: &ClusterConfig) -> Vec<Cluster> {
    let clustering = cluster(tracks, config);
    clustering.apply(tracks.iter_mut());
    clustering.clusters
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Two well separated groups of four, interleaved.
    fn two_groups() -> Vec<Track> {
        let loud = |bpm: f64, energy: f64| {
            Track::builder(bpm, "8A")
                .energy(energy)
                .danceability(0.9)
                .valence(0.8)
                .acousticness(0.05)
                .instrumentalness(0.8)
                .groove(GrooveType::FourOnFloor)
                .frequency_weight(FrequencyWeight::BassHeavy)
                .build()
                .unwrap()
        };
        let quiet = |bpm: f64, energy: f64, key: &str| {
            Track::builder(bpm, key)
                .energy(energy)
                .danceability(0.3)
                .valence(0.2)
                .acousticness(0.8)
                .instrumentalness(0.1)
                .groove(GrooveType::Complex)
                .frequency_weight(FrequencyWeight::Bright)
                .build()
                .unwrap()
        };
        vec![
            loud(140.0, 0.90),
            quiet(90.0, 0.20, "3B"),
            loud(140.5, 0.88),
            quiet(90.5, 0.22, "4B"),
            loud(141.0, 0.92),
            quiet(91.0, 0.18, "4B"),
            loud(141.5, 0.91),
            quiet(91.5, 0.21, "3B"),
        ]
    }

    #[test]
    fn test_vector_layout() {
        let track = Track::builder(150.0, "8A")
            .energy(0.9)
            .danceability(0.8)
            .valence(0.7)
            .acousticness(0.2)
            .instrumentalness(0.3)
            .groove(GrooveType::Breakbeat)
            .build()
            .unwrap();
        assert_eq!(track_to_vector(&track), [0.9, 0.8, 0.7, 0.75, 0.2, 0.3, 0.5]);
    }

    #[test]
    fn test_groove_ordinals_are_distinct() {
        let mut ordinals: Vec<f64> = GrooveType::ALL.iter().map(|g| groove_ordinal(*g)).collect();
        ordinals.sort_by(f64::total_cmp);
        ordinals.dedup();
        assert_eq!(ordinals.len(), 6);
        assert_eq!(ordinals[0], 0.0);
        assert_eq!(ordinals[5], 0.83);
    }

    #[test]
    fn test_standardize_handles_constant_dimension() {
        let vectors = vec![[1.0, 2.0, 0.0, 0.0, 0.0, 0.0, 0.0], [3.0, 2.0, 0.0, 0.0, 0.0, 0.0, 0.0]];
        let scaled = standardize(&vectors);
        assert!((scaled[0][0] + 1.0).abs() < 1e-12);
        assert!((scaled[1][0] - 1.0).abs() < 1e-12);
        assert_eq!(scaled[0][1], 0.0);
        assert!(standardize(&[]).is_empty());
    }

    #[test]
    fn test_cosine_distance() {
        let a = [1.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0];
        let b = [0.0, 1.0, 0.0, 0.0, 0.0, 0.0, 0.0];
        let c = [-2.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0];
        assert!(cosine_distance(&a, &a).abs() < 1e-12);
        assert!((cosine_distance(&a, &b) - 1.0).abs() < 1e-12);
        assert!((cosine_distance(&a, &c) - 2.0).abs() < 1e-12);
        assert_eq!(cosine_distance(&a, &[0.0; 7]), 1.0);
    }

    #[test]
    fn test_too_few_tracks_returns_no_clusters() {
        let mut tracks = vec![
            Track::builder(128.0, "8A").cluster(Some(4)).build().unwrap(),
            Track::builder(129.0, "8A").build().unwrap(),
        ];
        let clusters = cluster_tracks(&mut tracks, &ClusterConfig::default());
        assert!(clusters.is_empty());
        assert!(tracks.iter().all(|t| t.cluster_id.is_none()));
    }

    #[test]
    fn test_separates_two_groups() {
        let mut tracks = two_groups();
        let clusters = cluster_tracks(&mut tracks, &ClusterConfig::default());
        assert_eq!(clusters.len(), 2, "expected two islands: {clusters:?}");

        let loud = &clusters[0];
        assert_eq!(loud.id, 0);
        assert_eq!(loud.track_count, 4);
        assert_eq!(loud.label, "High Energy 140 BPM Four On Floor Bass Heavy");
        assert_eq!(loud.dominant_key.to_string(), "8A");
        assert!((loud.avg_bpm - 140.75).abs() < 1e-9);
        assert!((loud.centroid[3] - 140.75 / 200.0).abs() < 1e-9);

        let quiet = &clusters[1];
        assert_eq!(quiet.label, "Low Energy 90 BPM Complex Bright");
        assert_eq!(quiet.dominant_groove, GrooveType::Complex);
        // 3B and 4B tie; 3B is seen first
        assert_eq!(quiet.dominant_key.to_string(), "3B");

        for (i, track) in tracks.iter().enumerate() {
            assert_eq!(track.cluster_id, Some(u32::try_from(i % 2).unwrap()));
        }
    }

    #[test]
    fn test_noise_tracks_are_in_no_cluster() {
        let tracks = two_groups();
        let strict = ClusterConfig { eps: 0.5, min_samples: 5 };
        let result = cluster(&tracks, &strict);
        assert!(result.clusters.is_empty());
        assert_eq!(result.noise_count(), tracks.len());

        let loose = cluster(&tracks, &ClusterConfig::default());
        for (id, assignment) in &loose.assignments {
            if assignment.is_none() {
                assert!(loose.clusters.iter().all(|c| !c.contains(*id)));
            }
        }
    }

    #[test]
    fn test_apply_only_touches_known_tracks() {
        let tracks = two_groups();
        let result = cluster(&tracks, &ClusterConfig::default());
        let mut outsider = Track::builder(100.0, "1A").cluster(Some(9)).build().unwrap();
        result.apply(std::iter::once(&mut outsider));
        assert_eq!(outsider.cluster_id, Some(9));
    }

    #[test]
    fn test_label_tiers() {
        let make = |energy: f64| Track::builder(127.9, "8A").energy(energy).build().unwrap();
        let mid = make(0.5);
        let low = make(0.4);
        assert_eq!(label_cluster(&[&mid]), "Mid Energy 127 BPM Four On Floor Balanced");
        assert!(label_cluster(&[&low]).starts_with("Low Energy"));
        assert_eq!(label_cluster(&[]), "Empty Cluster");
    }

    #[test]
    fn test_config_validation() {
        assert!(ClusterConfig::default().validate().is_ok());
        assert!(ClusterConfig { eps: 0.0, min_samples: 3 }.validate().is_err());
        assert!(ClusterConfig { eps: 0.5, min_samples: 0 }.validate().is_err());
    }
}
