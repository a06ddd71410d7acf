//! # Configuration Module
//!
//! Engine tuning lives in a single JSON file in the platform config directory:
//! - Linux: `~/.config/mixgraph/config.json`
//! - macOS: `~/Library/Application Support/mixgraph/config.json`
//! - Windows: `%APPDATA%\mixgraph\config.json`
//!
//! Every field is optional. Missing fields take their defaults, so an empty
//! object `{}` is a valid configuration.
//!
//! ```json
//! {
//!   "edge_threshold": 0.35,
//!   "suggestion": { "strategy": "energy_arc", "num_suggestions": 12 },
//!   "cluster": { "eps": 0.4 }
//! }
//! ```

use crate::cluster::ClusterConfig;
use crate::graph::DEFAULT_EDGE_THRESHOLD;
use crate::sequence::DEFAULT_TWO_OPT_ITERATIONS;
use crate::set_generator::DEFAULT_REFINE_ITERATIONS;
use crate::suggestions::SuggestionConfig;
use anyhow::{Context, Result};
use log::debug;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

const CONFIG_FILE: &str = "config.json";

/// Returns the platform-appropriate config file path.
///
/// The file itself does not have to exist; nothing is created here.
///
/// # Errors
///
/// Fails when the platform has no standard config directory.
///
/// # Examples
///
/// ```no_run
/// use mixgraph::config::default_config_path;
///
/// let path = default_config_path()?;
/// println!("Config location: {}", path.display());
/// # Ok::<(), anyhow::Error>(())
/// ```
pub fn default_config_path() -> Result<PathBuf> {
    let config_dir = dirs::config_dir().ok_or_else(|| {
        anyhow::anyhow!(
            "Could not determine system config directory. Pass an explicit config file with --config."
        )
    })?;
    Ok(config_dir.join("mixgraph").join(CONFIG_FILE))
}

/// Tunables for every engine component
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Minimum score for a computed edge to be stored
    pub edge_threshold: f64,
    pub suggestion: SuggestionConfig,
    pub cluster: ClusterConfig,
    /// Sweep cap for standalone ordering
    pub two_opt_iterations: usize,
    /// Sweep cap when refining a generated set
    pub set_refine_iterations: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            edge_threshold: DEFAULT_EDGE_THRESHOLD,
            suggestion: SuggestionConfig::default(),
            cluster: ClusterConfig::default(),
            two_opt_iterations: DEFAULT_TWO_OPT_ITERATIONS,
            set_refine_iterations: DEFAULT_REFINE_ITERATIONS,
        }
    }
}

impl EngineConfig {
    /// Read and validate a config file.
    ///
    /// # Errors
    ///
    /// Fails if the file cannot be read, is not valid JSON or holds values
    /// that do not validate.
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config: Self = serde_json::from_str(&text)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;
        config
            .validate()
            .with_context(|| format!("Invalid configuration in {}", path.display()))?;
        debug!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// Load the default config file, or defaults when there is none.
    ///
    /// # Errors
    ///
    /// A config file that exists but is broken is still an error.
    pub fn load_or_default() -> Result<Self> {
        match default_config_path() {
            Ok(path) if path.exists() => Self::load(&path),
            _ => {
                debug!("No config file found, using defaults");
                Ok(Self::default())
            }
        }
    }

    /// Write the config as pretty JSON, creating parent directories.
    ///
    /// # Errors
    ///
    /// Fails on any I/O problem.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create config directory {}", parent.display()))?;
        }
        let text = serde_json::to_string_pretty(self)?;
        fs::write(path, text).with_context(|| format!("Failed to write config file {}", path.display()))
    }

    /// # Errors
    ///
    /// Returns the first invalid value found.
    pub fn validate(&self) -> crate::error::Result<()> {
        crate::error::check_unit("edge_threshold", self.edge_threshold)?;
        self.suggestion.validate()?;
        self.cluster.validate()
    }
}
