//! Track feature records consumed by every engine component.
//!
//! Tracks are produced by an external analysis pipeline. The engine only ever
//! writes `cluster_id` (through [`crate::cluster::Clustering::apply`]) and
//! reads `times_used`.

use crate::error::{check_unit, Result, ValidationError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Camelot mode letter: `A` is minor, `B` is major.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum CamelotMode {
    A,
    B,
}

/// A position on the 24-key Camelot wheel, e.g. `8A`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CamelotKey {
    number: u8,
    mode: CamelotMode,
}

impl CamelotKey {
    /// Build a key from its wheel number (1-12) and mode.
    pub fn new(number: u8, mode: CamelotMode) -> Result<Self> {
        if (1..=12).contains(&number) {
            Ok(Self { number, mode })
        } else {
            Err(ValidationError::InvalidCamelotKey(format!("{number}{mode:?}")))
        }
    }

    /// Wheel number, `1`-`12`.
    #[must_use]
    pub const fn number(self) -> u8 {
        self.number
    }

    #[must_use]
    pub const fn mode(self) -> CamelotMode {
        self.mode
    }

    /// Circular distance between wheel numbers, ignoring mode.
    ///
    /// `12` and `1` are one step apart, not eleven.
    #[must_use]
    pub fn wheel_distance(self, other: Self) -> u8 {
        let diff = self.number.abs_diff(other.number);
        diff.min(12 - diff)
    }
}

impl FromStr for CamelotKey {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self> {
        let invalid = || ValidationError::InvalidCamelotKey(s.to_string());
        let mode = match s.chars().last() {
            Some('A') => CamelotMode::A,
            Some('B') => CamelotMode::B,
            _ => return Err(invalid()),
        };
        let digits = &s[..s.len() - 1];
        if digits.is_empty() || digits.len() > 2 || !digits.chars().all(|c| c.is_ascii_digit()) {
            return Err(invalid());
        }
        let number: u8 = digits.parse().map_err(|_| invalid())?;
        Self::new(number, mode).map_err(|_| invalid())
    }
}

impl TryFrom<String> for CamelotKey {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<CamelotKey> for String {
    fn from(key: CamelotKey) -> Self {
        key.to_string()
    }
}

impl fmt::Display for CamelotKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let letter = match self.mode {
            CamelotMode::A => 'A',
            CamelotMode::B => 'B',
        };
        write!(f, "{}{}", self.number, letter)
    }
}

/// Where the spectral weight of a track sits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FrequencyWeight {
    BassHeavy,
    Bright,
    MidFocused,
    Balanced,
}

impl FrequencyWeight {
    pub const ALL: [FrequencyWeight; 4] = [
        Self::BassHeavy,
        Self::Bright,
        Self::MidFocused,
        Self::Balanced,
    ];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::BassHeavy => "bass_heavy",
            Self::Bright => "bright",
            Self::MidFocused => "mid_focused",
            Self::Balanced => "balanced",
        }
    }
}

/// Rhythmic feel of a track.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GrooveType {
    FourOnFloor,
    Breakbeat,
    HalfTime,
    Complex,
    Syncopated,
    Straight,
}

impl GrooveType {
    pub const ALL: [GrooveType; 6] = [
        Self::FourOnFloor,
        Self::Breakbeat,
        Self::HalfTime,
        Self::Complex,
        Self::Syncopated,
        Self::Straight,
    ];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::FourOnFloor => "four_on_floor",
            Self::Breakbeat => "breakbeat",
            Self::HalfTime => "half_time",
            Self::Complex => "complex",
            Self::Syncopated => "syncopated",
            Self::Straight => "straight",
        }
    }
}

/// `"four_on_floor"` -> `"Four On Floor"`
#[must_use]
pub fn title_case(snake: &str) -> String {
    snake
        .split('_')
        .filter(|word| !word.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// An analysed track and everything the engine scores it by.
///
/// Deserialization runs [`Track::validate`], so a record that parses is
/// always in range.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "TrackRecord")]
pub struct Track {
    pub id: Uuid,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub artist: Option<String>,

    pub bpm: f64,
    pub bpm_stability: f64,
    pub key: CamelotKey,
    pub key_confidence: f64,
    pub mix_in_score: f64,
    pub mix_out_score: f64,
    pub frequency_weight: FrequencyWeight,
    pub groove_type: GrooveType,

    pub energy: f64,
    pub danceability: f64,
    pub acousticness: f64,
    pub instrumentalness: f64,
    pub valence: f64,
    pub liveness: f64,

    pub duration_seconds: f64,

    /// Vibe island the track belongs to; `None` is unclustered or noise.
    pub cluster_id: Option<u32>,
    /// How many finished sets this track has been placed in.
    pub times_used: u32,
}

/// Unchecked wire form of [`Track`].
#[derive(Deserialize)]
struct TrackRecord {
    id: Uuid,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    artist: Option<String>,
    bpm: f64,
    bpm_stability: f64,
    key: CamelotKey,
    key_confidence: f64,
    mix_in_score: f64,
    mix_out_score: f64,
    frequency_weight: FrequencyWeight,
    groove_type: GrooveType,
    energy: f64,
    danceability: f64,
    acousticness: f64,
    instrumentalness: f64,
    valence: f64,
    liveness: f64,
    duration_seconds: f64,
    #[serde(default)]
    cluster_id: Option<u32>,
    #[serde(default)]
    times_used: u32,
}

impl TryFrom<TrackRecord> for Track {
    type Error = ValidationError;

    fn try_from(r: TrackRecord) -> Result<Self> {
        let track = Self {
            id: r.id,
            title: r.title,
            artist: r.artist,
            bpm: r.bpm,
            bpm_stability: r.bpm_stability,
            key: r.key,
            key_confidence: r.key_confidence,
            mix_in_score: r.mix_in_score,
            mix_out_score: r.mix_out_score,
            frequency_weight: r.frequency_weight,
            groove_type: r.groove_type,
            energy: r.energy,
            danceability: r.danceability,
            acousticness: r.acousticness,
            instrumentalness: r.instrumentalness,
            valence: r.valence,
            liveness: r.liveness,
            duration_seconds: r.duration_seconds,
            cluster_id: r.cluster_id,
            times_used: r.times_used,
        };
        track.validate()?;
        Ok(track)
    }
}

impl Track {
    /// Start building a track with neutral defaults for every feature.
    pub fn builder(bpm: f64, key: &str) -> TrackBuilder {
        TrackBuilder::new(bpm, key)
    }

    /// Reject records that would break scoring assumptions.
    ///
    /// # Errors
    ///
    /// Returns the first out-of-range field found.
    pub fn validate(&self) -> Result<()> {
        if !self.bpm.is_finite() || self.bpm <= 0.0 {
            return Err(ValidationError::NonPositiveBpm(self.bpm));
        }
        if self.duration_seconds.is_nan() || self.duration_seconds < 0.0 {
            return Err(ValidationError::NegativeDuration(self.duration_seconds));
        }
        [
            ("bpm_stability", self.bpm_stability),
            ("key_confidence", self.key_confidence),
            ("mix_in_score", self.mix_in_score),
            ("mix_out_score", self.mix_out_score),
            ("energy", self.energy),
            ("danceability", self.danceability),
            ("acousticness", self.acousticness),
            ("instrumentalness", self.instrumentalness),
            ("valence", self.valence),
            ("liveness", self.liveness),
        ]
        .into_iter()
        .try_for_each(|(field, value)| check_unit(field, value))
    }

    /// Short human label for logs and CLI output.
    #[must_use]
    pub fn display_name(&self) -> String {
        match (&self.artist, &self.title) {
            (Some(artist), Some(title)) => format!("{artist} - {title}"),
            (None, Some(title)) => title.clone(),
            _ => self.id.to_string(),
        }
    }
}

/// Validated construction of [`Track`] records.
#[derive(Debug, Clone)]
pub struct TrackBuilder {
    key: String,
    track: TrackDraft,
}

#[derive(Debug, Clone)]
struct TrackDraft {
    id: Uuid,
    title: Option<String>,
    artist: Option<String>,
    bpm: f64,
    bpm_stability: f64,
    key_confidence: f64,
    mix_in_score: f64,
    mix_out_score: f64,
    frequency_weight: FrequencyWeight,
    groove_type: GrooveType,
    energy: f64,
    danceability: f64,
    acousticness: f64,
    instrumentalness: f64,
    valence: f64,
    liveness: f64,
    duration_seconds: f64,
    cluster_id: Option<u32>,
    times_used: u32,
}

impl TrackBuilder {
    fn new(bpm: f64, key: &str) -> Self {
        Self {
            key: key.to_string(),
            track: TrackDraft {
                id: Uuid::new_v4(),
                title: None,
                artist: None,
                bpm,
                bpm_stability: 1.0,
                key_confidence: 1.0,
                mix_in_score: 0.8,
                mix_out_score: 0.8,
                frequency_weight: FrequencyWeight::Balanced,
                groove_type: GrooveType::FourOnFloor,
                energy: 0.5,
                danceability: 0.5,
                acousticness: 0.1,
                instrumentalness: 0.5,
                valence: 0.5,
                liveness: 0.1,
                duration_seconds: 300.0,
                cluster_id: None,
                times_used: 0,
            },
        }
    }

    #[must_use]
    pub fn id(mut self, id: Uuid) -> Self {
        self.track.id = id;
        self
    }

    #[must_use]
    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.track.title = Some(title.into());
        self
    }

    #[must_use]
    pub fn artist(mut self, artist: impl Into<String>) -> Self {
        self.track.artist = Some(artist.into());
        self
    }

    #[must_use]
    pub fn bpm_stability(mut self, value: f64) -> Self {
        self.track.bpm_stability = value;
        self
    }

    #[must_use]
    pub fn key_confidence(mut self, value: f64) -> Self {
        self.track.key_confidence = value;
        self
    }

    #[must_use]
    pub fn mix_scores(mut self, mix_in: f64, mix_out: f64) -> Self {
        self.track.mix_in_score = mix_in;
        self.track.mix_out_score = mix_out;
        self
    }

    #[must_use]
    pub fn frequency_weight(mut self, weight: FrequencyWeight) -> Self {
        self.track.frequency_weight = weight;
        self
    }

    #[must_use]
    pub fn groove(mut self, groove: GrooveType) -> Self {
        self.track.groove_type = groove;
        self
    }

    #[must_use]
    pub fn energy(mut self, value: f64) -> Self {
        self.track.energy = value;
        self
    }

    #[must_use]
    pub fn danceability(mut self, value: f64) -> Self {
        self.track.danceability = value;
        self
    }

    #[must_use]
    pub fn acousticness(mut self, value: f64) -> Self {
        self.track.acousticness = value;
        self
    }

    #[must_use]
    pub fn instrumentalness(mut self, value: f64) -> Self {
        self.track.instrumentalness = value;
        self
    }

    #[must_use]
    pub fn valence(mut self, value: f64) -> Self {
        self.track.valence = value;
        self
    }

    #[must_use]
    pub fn liveness(mut self, value: f64) -> Self {
        self.track.liveness = value;
        self
    }

    #[must_use]
    pub fn duration(mut self, seconds: f64) -> Self {
        self.track.duration_seconds = seconds;
        self
    }

    #[must_use]
    pub fn cluster(mut self, cluster_id: Option<u32>) -> Self {
        self.track.cluster_id = cluster_id;
        self
    }

    #[must_use]
    pub fn times_used(mut self, count: u32) -> Self {
        self.track.times_used = count;
        self
    }

    /// Parse the key and validate every field.
    ///
    /// # Errors
    ///
    /// Fails on a malformed Camelot key, non-positive BPM, negative duration
    /// or any unit-range feature outside `[0, 1]`.
    pub fn build(self) -> Result<Track> {
        let key: CamelotKey = self.key.parse()?;
        let d = self.track;
        let track = Track {
            id: d.id,
            title: d.title,
            artist: d.artist,
            bpm: d.bpm,
            bpm_stability: d.bpm_stability,
            key,
            key_confidence: d.key_confidence,
            mix_in_score: d.mix_in_score,
            mix_out_score: d.mix_out_score,
            frequency_weight: d.frequency_weight,
            groove_type: d.groove_type,
            energy: d.energy,
            danceability: d.danceability,
            acousticness: d.acousticness,
            instrumentalness: d.instrumentalness,
            valence: d.valence,
            liveness: d.liveness,
            duration_seconds: d.duration_seconds,
            cluster_id: d.cluster_id,
            times_used: d.times_used,
        };
        track.validate()?;
        Ok(track)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_rejects_out_of_range_fields() {
        let track = Track::builder(128.0, "8A").title("Valid").build().unwrap();
        let value = serde_json::to_value(&track).unwrap();
        assert_eq!(serde_json::from_value::<Track>(value.clone()).unwrap(), track);

        let mut loud = value.clone();
        loud["energy"] = serde_json::json!(1.5);
        let err = serde_json::from_value::<Track>(loud).unwrap_err();
        assert!(err.to_string().contains("energy"), "unexpected error: {err}");

        let mut stopped = value;
        stopped["bpm"] = serde_json::json!(0.0);
        assert!(serde_json::from_value::<Track>(stopped).is_err());
    }

    #[test]
    fn test_deserialize_fills_optional_fields() {
        let track = Track::builder(124.0, "5B").cluster(Some(2)).times_used(3).build().unwrap();
        let mut value = serde_json::to_value(&track).unwrap();
        let object = value.as_object_mut().unwrap();
        object.remove("cluster_id");
        object.remove("times_used");

        let parsed: Track = serde_json::from_value(value).unwrap();
        assert_eq!(parsed.cluster_id, None);
        assert_eq!(parsed.times_used, 0);
        assert_eq!(parsed.title, None);
    }

    #[test]
    fn test_camelot_parsing() {
        let key: CamelotKey = "8A".parse().unwrap();
        assert_eq!(key.number(), 8);
        assert_eq!(key.mode(), CamelotMode::A);
        assert_eq!(key.to_string(), "8A");

        let key: CamelotKey = "12B".parse().unwrap();
        assert_eq!(key.number(), 12);
        assert_eq!(key.mode(), CamelotMode::B);
    }

    #[test]
    fn test_camelot_rejects_malformed_keys() {
        for bad in ["", "A", "0A", "13B", "8C", "8a", "+8A", "108A", "8 A", "-1A"] {
            assert!(bad.parse::<CamelotKey>().is_err(), "'{bad}' should be rejected");
        }
    }

    #[test]
    fn test_wheel_distance_wraps() {
        let k = |s: &str| s.parse::<CamelotKey>().unwrap();
        assert_eq!(k("12A").wheel_distance(k("1A")), 1);
        assert_eq!(k("11A").wheel_distance(k("1B")), 2);
        assert_eq!(k("3A").wheel_distance(k("9A")), 6);
        assert_eq!(k("5B").wheel_distance(k("5B")), 0);
    }

    #[test]
    fn test_builder_validates() {
        assert!(Track::builder(128.0, "8A").build().is_ok());
        assert_eq!(
            Track::builder(0.0, "8A").build(),
            Err(ValidationError::NonPositiveBpm(0.0))
        );
        assert!(matches!(
            Track::builder(128.0, "8A").energy(1.5).build(),
            Err(ValidationError::OutOfUnitRange { field: "energy", .. })
        ));
        assert!(matches!(
            Track::builder(128.0, "14A").build(),
            Err(ValidationError::InvalidCamelotKey(_))
        ));
        assert!(matches!(
            Track::builder(128.0, "8A").duration(-1.0).build(),
            Err(ValidationError::NegativeDuration(_))
        ));
    }

    #[test]
    fn test_serde_uses_snake_case_and_key_strings() {
        let track = Track::builder(124.0, "5B")
            .groove(GrooveType::HalfTime)
            .frequency_weight(FrequencyWeight::MidFocused)
            .build()
            .unwrap();
        let json = serde_json::to_value(&track).unwrap();
        assert_eq!(json["key"], "5B");
        assert_eq!(json["groove_type"], "half_time");
        assert_eq!(json["frequency_weight"], "mid_focused");

        let back: Track = serde_json::from_value(json).unwrap();
        assert_eq!(back, track);
    }

    #[test]
    fn test_deserialize_rejects_bad_key() {
        let track = Track::builder(124.0, "5B").build().unwrap();
        let mut json = serde_json::to_value(&track).unwrap();
        json["key"] = serde_json::Value::String("15A".to_string());
        assert!(serde_json::from_value::<Track>(json).is_err());
    }

    #[test]
    fn test_title_case() {
        assert_eq!(title_case(GrooveType::FourOnFloor.as_str()), "Four On Floor");
        assert_eq!(title_case(FrequencyWeight::BassHeavy.as_str()), "Bass Heavy");
        assert_eq!(title_case("straight"), "Straight");
    }
}
