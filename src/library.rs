//! Track libraries as JSON files.
//!
//! A library file is either a bare array of tracks or an object with a
//! `tracks` array. Every track is validated on load.

use crate::track::Track;
use anyhow::{bail, Context, Result};
use log::info;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::Path;
use uuid::Uuid;

/// Tracks are kept raw here so a bad record can be reported by position.
#[derive(Deserialize)]
#[serde(untagged)]
enum LibraryFile {
    Bare(Vec<serde_json::Value>),
    Wrapped { tracks: Vec<serde_json::Value> },
}

#[derive(Serialize)]
struct LibraryOut<'a> {
    tracks: &'a [Track],
}

/// Parse and validate a library from JSON text.
///
/// # Errors
///
/// Fails on malformed JSON, an invalid track or a repeated id.
pub fn parse_library(text: &str) -> Result<Vec<Track>> {
    let records = match serde_json::from_str::<LibraryFile>(text).context("Library is not a valid track list")? {
        LibraryFile::Bare(records) | LibraryFile::Wrapped { tracks: records } => records,
    };
    let mut tracks = Vec::with_capacity(records.len());
    let mut seen = HashSet::with_capacity(records.len());
    for (index, record) in records.into_iter().enumerate() {
        let track: Track =
            serde_json::from_value(record).with_context(|| format!("Track #{index} is invalid"))?;
        if !seen.insert(track.id) {
            bail!("Track id {} appears more than once", track.id);
        }
        tracks.push(track);
    }
    Ok(tracks)
}

/// # Errors
///
/// Fails if the file cannot be read or does not parse.
pub fn load_library(path: &Path) -> Result<Vec<Track>> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("Failed to read library {}", path.display()))?;
    let tracks = parse_library(&text).with_context(|| format!("Failed to load library {}", path.display()))?;
    info!("Loaded {} tracks from {}", tracks.len(), path.display());
    Ok(tracks)
}

/// Write `{"tracks": [...]}` as pretty JSON.
///
/// # Errors
///
/// Fails on any I/O problem.
pub fn save_library(path: &Path, tracks: &[Track]) -> Result<()> {
    let text = serde_json::to_string_pretty(&LibraryOut { tracks })?;
    fs::write(path, text).with_context(|| format!("Failed to write library {}", path.display()))
}

/// Look a track up by id.
///
/// # Errors
///
/// Fails when no track has that id.
pub fn find_track(tracks: &[Track], id: Uuid) -> Result<&Track> {
    tracks
        .iter()
        .find(|t| t.id == id)
        .with_context(|| format!("Track {id} is not in the library"))
}
