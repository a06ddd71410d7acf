//! # Command-Line Interface Module
//!
//! Clap derive definitions for the `mixgraph` binary. Every command reads a
//! track library (JSON) and prints its result as JSON on stdout, so output
//! can be piped into other tools.
//!
//! ## Commands
//!
//! - `edges`: Build the compatibility graph and print its edges
//! - `cluster`: Group the library into vibe islands
//! - `suggest`: Rank next tracks after a given one
//! - `order`: Find a strong play order for the whole library
//! - `build-set`: Generate a set that follows an energy curve
//!
//! ## Examples
//!
//! ```bash
//! mixgraph edges library.json --threshold 0.5
//! mixgraph suggest library.json 6f1c...e2 --strategy energy-arc --count 5
//! mixgraph build-set library.json --minutes 90 --profile rollercoaster
//! ```

use crate::set_generator::EnergyProfile;
use crate::suggestions::SuggestionStrategy;
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use uuid::Uuid;

/// Shell types supported for completion generation
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, ValueEnum, Debug)]
#[allow(clippy::enum_variant_names)]
pub enum Shell {
    /// Bash shell
    Bash,
    /// Zsh shell
    Zsh,
    /// Fish shell
    Fish,
    /// PowerShell
    PowerShell,
    /// Elvish shell
    Elvish,
}

/// Main application arguments structure.
#[derive(Parser, Debug)]
#[command(name = "mixgraph")]
#[command(about = "Mixgraph: track compatibility graphs, vibe islands and DJ set ordering")]
#[command(version)]
pub struct Args {
    /// Engine config file (defaults to the platform config directory)
    #[arg(long, short, global = true, env = "MIXGRAPH_CONFIG")]
    pub config: Option<PathBuf>,

    /// The subcommand to execute
    #[command(subcommand)]
    pub command: Command,
}

/// Enumeration of all available subcommands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Compute compatibility edges for a library
    ///
    /// Prints every stored edge with its score breakdown, followed by graph
    /// statistics. Pairs whose tempos cannot be mixed are never scored.
    Edges {
        /// Track library (JSON)
        library: PathBuf,

        /// Minimum score for an edge to be kept
        #[arg(long)]
        threshold: Option<f64>,
    },

    /// Group tracks into vibe islands
    Cluster {
        /// Track library (JSON)
        library: PathBuf,

        /// Neighborhood radius in cosine distance
        #[arg(long)]
        eps: Option<f64>,

        /// Tracks needed to seed an island
        #[arg(long)]
        min_samples: Option<usize>,

        /// Write the resulting cluster ids back into the library file
        #[arg(long)]
        write: bool,
    },

    /// Suggest what to play after a track
    Suggest {
        /// Track library (JSON)
        library: PathBuf,

        /// Id of the track currently playing
        track: Uuid,

        /// Tracks already played, oldest first
        #[arg(long, value_delimiter = ',')]
        sequence: Vec<Uuid>,

        /// Suggestion strategy
        #[arg(long, value_enum)]
        strategy: Option<SuggestionStrategy>,

        /// Number of suggestions
        #[arg(long, short = 'n')]
        count: Option<usize>,

        /// Only keep harmonically compatible keys
        #[arg(long)]
        key_lock: bool,

        /// Only keep the current groove type
        #[arg(long)]
        groove_lock: bool,

        /// Lowest BPM to consider
        #[arg(long)]
        bpm_min: Option<f64>,

        /// Highest BPM to consider
        #[arg(long)]
        bpm_max: Option<f64>,
    },

    /// Order the whole library for the best transitions
    Order {
        /// Track library (JSON)
        library: PathBuf,

        /// Track to open with (defaults to the highest energy)
        #[arg(long)]
        start: Option<Uuid>,
    },

    /// Generate a set following an energy curve
    BuildSet {
        /// Track library (JSON)
        library: PathBuf,

        /// Target set length in minutes
        #[arg(long, default_value = "60")]
        minutes: f64,

        /// Energy curve to follow
        #[arg(long, value_enum, default_value_t = EnergyProfile::WarmUpPeakCool)]
        profile: EnergyProfile,

        /// Track to open with
        #[arg(long)]
        start: Option<Uuid>,

        /// Largest relative BPM change between consecutive tracks
        #[arg(long, default_value = "0.06")]
        bpm_tolerance: f64,
    },

    /// Generate shell completions
    ///
    /// Outputs completion script for the specified shell to stdout.
    /// Redirect to appropriate file for your shell to enable completions.
    Completion {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}
