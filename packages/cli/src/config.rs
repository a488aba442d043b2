//! Model configuration.
//!
//! Parameters resolve in three layers: the embedded `config/default.toml`,
//! an optional user TOML file, then command-line overrides.

use std::path::{Path, PathBuf};

use near_repeat_risk_models::{ModelParams, NeighborhoodSize, RecentWindow};
use serde::Deserialize;

const DEFAULT_CONFIG: &str = include_str!("../config/default.toml");

/// Errors that can occur while loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The config file could not be read.
    #[error("failed to read config {}: {source}", path.display())]
    Io {
        /// Path that was requested.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// The config file is not valid TOML for [`Config`].
    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Settings for the `hotspots` command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct HotspotConfig {
    /// Rows shown in the hotspot table.
    pub limit: usize,
}

impl Default for HotspotConfig {
    fn default() -> Self {
        Self { limit: 20 }
    }
}

/// Complete configuration file.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct Config {
    pub model: ModelParams,
    pub hotspots: HotspotConfig,
}

/// Parses a TOML config. Missing keys take their default values.
///
/// # Errors
///
/// Returns [`ConfigError::Parse`] if the TOML is malformed or a value has
/// the wrong type.
pub fn parse_config(toml: &str) -> Result<Config, ConfigError> {
    Ok(toml::from_str(toml)?)
}

/// Loads the user config at `path`, or the embedded defaults.
///
/// # Errors
///
/// Returns [`ConfigError`] if the file cannot be read or parsed.
pub fn load(path: Option<&Path>) -> Result<Config, ConfigError> {
    let Some(path) = path else {
        return parse_config(DEFAULT_CONFIG);
    };

    let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    log::info!("Loaded config from {}", path.display());
    parse_config(&contents)
}

/// Per-parameter command-line overrides.
#[derive(Debug, Clone, Default, clap::Args)]
pub struct Overrides {
    /// Grid cell size in meters
    #[arg(long)]
    pub cell_size: Option<f64>,
    /// Neighborhood size preset: small (300 m), medium (600 m), large (900 m)
    #[arg(long)]
    pub spread: Option<NeighborhoodSize>,
    /// Spatial decay length in meters (takes precedence over --spread)
    #[arg(long)]
    pub sigma: Option<f64>,
    /// Temporal decay constant in days
    #[arg(long)]
    pub tau: Option<f64>,
    /// Recent window preset: last7, last14, last21
    #[arg(long)]
    pub window: Option<RecentWindow>,
    /// Lookback window in days (takes precedence over --window)
    #[arg(long)]
    pub lookback: Option<u32>,
    /// Scoring radius in meters
    #[arg(long)]
    pub radius: Option<f64>,
    /// Number of cells flagged per prediction
    #[arg(long)]
    pub topk: Option<usize>,
}

impl Overrides {
    /// Applies every override that was given on top of `params`.
    #[must_use]
    pub fn apply(&self, mut params: ModelParams) -> ModelParams {
        if let Some(spread) = self.spread {
            params.sigma_m = spread.sigma_m();
        }
        if let Some(window) = self.window {
            params.lookback_days = window.days();
        }
        params.cell_size_m = self.cell_size.unwrap_or(params.cell_size_m);
        params.sigma_m = self.sigma.unwrap_or(params.sigma_m);
        params.tau_days = self.tau.unwrap_or(params.tau_days);
        params.lookback_days = self.lookback.unwrap_or(params.lookback_days);
        params.radius_m = self.radius.unwrap_or(params.radius_m);
        params.topk = self.topk.unwrap_or(params.topk);
        params
    }
}
