//! # Mixgraph - DJ Set Planning
//!
//! Command-line front end for the mixgraph engine. Track libraries are JSON
//! files produced by an external analysis pipeline; every command prints
//! JSON to stdout.
//!
//! ## Usage
//!
//! ```bash
//! # Score all transitions in a library
//! mixgraph edges library.json
//!
//! # Find vibe islands and store them in the library
//! mixgraph cluster library.json --write
//!
//! # What to play next
//! mixgraph suggest library.json <track-id> --strategy discovery
//!
//! # A 90 minute set
//! mixgraph build-set library.json --minutes 90
//! ```

use anyhow::{Context, Result};
use clap::{CommandFactory, Parser};
use log::{debug, info};
use mixgraph::cli;
use mixgraph::cluster::{self, ClusterConfig};
use mixgraph::completion;
use mixgraph::config::EngineConfig;
use mixgraph::graph::CompatibilityGraph;
use mixgraph::library::{find_track, load_library, save_library};
use mixgraph::playlist::SetSummary;
use mixgraph::sequence::optimal_order;
use mixgraph::set_generator::{SetBuilderConfig, SetGenerator};
use mixgraph::suggestions;
use mixgraph::track::Track;
use serde::Serialize;
use serde_json::json;
use std::path::Path;

fn load_config(path: Option<&Path>) -> Result<EngineConfig> {
    match path {
        Some(path) => EngineConfig::load(path),
        None => EngineConfig::load_or_default(),
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn track_entries(tracks: &[Track]) -> Vec<serde_json::Value> {
    tracks
        .iter()
        .map(|t| {
            json!({
                "id": t.id,
                "name": t.display_name(),
                "bpm": t.bpm,
                "key": t.key,
                "energy": t.energy,
            })
        })
        .collect()
}

/// Main entry point for the mixgraph binary.
///
/// Logging is controlled via `RUST_LOG`:
/// - `RUST_LOG=info mixgraph edges lib.json` - Progress summaries
/// - `RUST_LOG=mixgraph::sequence=debug mixgraph order lib.json` - 2-opt details
fn main() -> Result<()> {
    env_logger::init();

    let args = cli::Args::parse();

    match args.command {
        cli::Command::Edges { library, threshold } => {
            let config = load_config(args.config.as_deref())?;
            let tracks = load_library(&library)?;
            let threshold = threshold.unwrap_or(config.edge_threshold);

            let mut graph = CompatibilityGraph::from_tracks(tracks);
            let mut edges = graph.compute_edges(threshold, &config.suggestion.weights);
            edges.sort_by(|a, b| {
                b.compatibility_score
                    .total_cmp(&a.compatibility_score)
                    .then_with(|| a.key().cmp(&b.key()))
            });
            print_json(&json!({ "stats": graph.stats(), "edges": edges }))?;
        }
        cli::Command::Cluster { library, eps, min_samples, write } => {
            let config = load_config(args.config.as_deref())?;
            let cluster_config = ClusterConfig {
                eps: eps.unwrap_or(config.cluster.eps),
                min_samples: min_samples.unwrap_or(config.cluster.min_samples),
            };
            cluster_config.validate()?;

            let mut tracks = load_library(&library)?;
            let clustering = cluster::cluster(&tracks, &cluster_config);
            if write {
                clustering.apply(tracks.iter_mut());
                save_library(&library, &tracks)?;
                info!("Wrote cluster ids to {}", library.display());
            }
            print_json(&clustering)?;
        }
        cli::Command::Suggest {
            library,
            track,
            sequence,
            strategy,
            count,
            key_lock,
            groove_lock,
            bpm_min,
            bpm_max,
        } => {
            let config = load_config(args.config.as_deref())?;
            let tracks = load_library(&library)?;
            let current = find_track(&tracks, track)?;
            let played = sequence
                .iter()
                .map(|id| find_track(&tracks, *id).cloned())
                .collect::<Result<Vec<_>>>()
                .context("Unknown track in --sequence")?;

            let mut suggestion = config.suggestion.clone();
            if let Some(strategy) = strategy {
                suggestion.strategy = strategy;
            }
            if let Some(count) = count {
                suggestion.num_suggestions = count;
            }
            suggestion.key_lock |= key_lock;
            suggestion.groove_lock |= groove_lock;
            suggestion.bpm_min = bpm_min.or(suggestion.bpm_min);
            suggestion.bpm_max = bpm_max.or(suggestion.bpm_max);
            suggestion.validate()?;

            let results = suggestions::suggest(current, &played, &tracks, &suggestion);
            debug!("{} suggestions for {}", results.len(), current.display_name());
            let entries: Vec<_> = results
                .iter()
                .map(|r| {
                    let name = find_track(&tracks, r.track_id).map(Track::display_name).unwrap_or_default();
                    json!({ "name": name, "suggestion": r })
                })
                .collect();
            print_json(&json!({ "current": current.display_name(), "suggestions": entries }))?;
        }
        cli::Command::Order { library, start } => {
            let config = load_config(args.config.as_deref())?;
            let tracks = load_library(&library)?;
            let weights = &config.suggestion.weights;
            let ordered = optimal_order(&tracks, start, weights, config.two_opt_iterations);
            let summary = SetSummary::new(&ordered, weights);
            print_json(&json!({ "order": track_entries(&ordered), "summary": summary }))?;
        }
        cli::Command::BuildSet { library, minutes, profile, start, bpm_tolerance } => {
            let config = load_config(args.config.as_deref())?;
            let tracks = load_library(&library)?;
            let builder = SetBuilderConfig {
                start_track_id: start,
                target_minutes: minutes,
                energy_profile: profile,
                bpm_tolerance,
                custom_energy_points: None,
            };
            let weights = &config.suggestion.weights;
            let set = SetGenerator::new(*weights)
                .with_refine_iterations(config.set_refine_iterations)
                .generate(&builder, &tracks)?;
            let summary = SetSummary::new(&set, weights);
            print_json(&json!({ "set": track_entries(&set), "summary": summary }))?;
        }
        cli::Command::Completion { shell } => {
            let mut cmd = cli::Args::command();
            completion::generate_completions(completion::shell_to_completion_shell(shell), &mut cmd);
        }
    }

    Ok(())
}
