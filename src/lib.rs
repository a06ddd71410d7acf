//! Track compatibility engine for planning DJ sets.
//!
//! Core modules:
//! - [`track`] - Track records and Camelot keys
//! - [`scoring`] - Pairwise transition scoring
//! - [`graph`] - Directed compatibility graph with incremental edges
//! - [`cluster`] - Vibe islands via cosine DBSCAN
//! - [`sequence`] - Greedy and 2-opt play order optimization
//! - [`suggestions`] - Next-track ranking with filters and strategies
//! - [`set_generator`] - Energy-curve driven set building
//!
//! ### Supporting Modules
//!
//! - [`playlist`] - Set summaries and transition reports
//! - [`library`] - JSON track libraries
//! - [`config`] - Engine configuration file
//! - [`error`] - Validation and graph errors
//! - [`cli`] - Command-line interface definitions with clap integration
//! - [`completion`] - Shell completion generation
//!
//! ## Quick Start Example
//!
//! ```no_run
//! use mixgraph::graph::CompatibilityGraph;
//! use mixgraph::scoring::ScoringWeights;
//! use mixgraph::sequence::optimal_order;
//! use mixgraph::track::Track;
//!
//! let tracks = vec![
//!     Track::builder(128.0, "8A").title("Opener").energy(0.6).build()?,
//!     Track::builder(127.0, "9A").title("Builder").energy(0.75).build()?,
//!     Track::builder(129.0, "8B").title("Peak").energy(0.9).build()?,
//! ];
//! let weights = ScoringWeights::default();
//!
//! let mut graph = CompatibilityGraph::from_tracks(tracks.clone());
//! let edges = graph.compute_edges(0.3, &weights);
//! println!("{} transitions above threshold", edges.len());
//!
//! let order = optimal_order(&tracks, None, &weights, 1000);
//! for track in &order {
//!     println!("{}", track.display_name());
//! }
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! ## Scoring
//!
//! A transition `A -> B` is scored on six factors, each in `[0, 1]`:
//! harmonic distance on the Camelot wheel, tempo ratio, energy change,
//! groove pairing, frequency balance and the mix-out/mix-in quality of the
//! two tracks. The weighted sum is the edge's compatibility score. Mix
//! quality is directional, so `A -> B` and `B -> A` usually differ.
//!
//! ## Error Handling
//!
//! Library code returns typed errors from [`error`]; the binary and the file
//! loaders wrap them in `anyhow::Error` with context.
//!
//! ## Testing
//!
//! ```bash
//! cargo test
//! cargo bench
//! ```

pub mod cli;
pub mod cluster;
pub mod completion;
pub mod config;
pub mod error;
pub mod graph;
pub mod library;
pub mod playlist;
pub mod scoring;
pub mod sequence;
pub mod set_generator;
pub mod suggestions;
pub mod track;
