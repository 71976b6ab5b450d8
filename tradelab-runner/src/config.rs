//! Serializable run configuration with a content-addressed run id.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

use tradelab_core::{ConfigError, ScorerParams, SimConfig};

/// Content-addressable identifier for a run: two identical configs share a
/// run id and therefore an artifact directory.
pub type RunId = String;

#[derive(Debug, Error)]
pub enum ConfigLoadError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse config {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("invalid config: {0}")]
    Invalid(#[from] ConfigError),
}

/// Named scorer preset. `Paper` reproduces the permissive historical
/// behavior, `Live` the conservative one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SignalPreset {
    Paper,
    Live,
}

impl SignalPreset {
    pub fn params(self) -> ScorerParams {
        match self {
            SignalPreset::Paper => ScorerParams::paper(),
            SignalPreset::Live => ScorerParams::live(),
        }
    }
}

/// One backtest run: universe, data locations, and engine parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    pub name: String,
    pub universe: Vec<String>,
    /// Directory of per-symbol CSV files. Symbols without a file fall back
    /// to the seeded synthetic generator.
    pub data_dir: Option<PathBuf>,
    pub output_dir: PathBuf,
    /// Base seed for synthetic data; each symbol derives its own stream.
    pub seed: u64,
    /// When set, replaces `sim.scorer` wholesale with the named preset.
    pub preset: Option<SignalPreset>,
    pub sim: SimConfig,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            name: "backtest".to_string(),
            universe: vec!["AAPL".to_string(), "MSFT".to_string()],
            data_dir: None,
            output_dir: PathBuf::from("runs"),
            seed: 42,
            preset: None,
            sim: SimConfig::default(),
        }
    }
}

impl RunConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigLoadError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigLoadError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let mut config: RunConfig =
            toml::from_str(&text).map_err(|source| ConfigLoadError::Parse {
                path: path.to_path_buf(),
                source,
            })?;
        if let Some(preset) = config.preset {
            config.sim.scorer = preset.params();
        }
        config.sim.validate()?;
        Ok(config)
    }

    /// Deterministic blake3 hash over the serialized config.
    pub fn run_id(&self) -> RunId {
        // Serialization of an in-memory config cannot fail.
        let json = serde_json::to_string(self).unwrap_or_default();
        blake3::hash(json.as_bytes()).to_hex().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_id_is_stable_and_content_addressed() {
        let a = RunConfig::default();
        let b = RunConfig::default();
        assert_eq!(a.run_id(), b.run_id());

        let mut c = RunConfig::default();
        c.sim.initial_capital = 20_000.0;
        assert_ne!(a.run_id(), c.run_id());
    }

    #[test]
    fn preset_replaces_scorer_params() {
        let text = r#"
            name = "live-check"
            universe = ["NVDA"]
            preset = "live"
        "#;
        let mut config: RunConfig = toml::from_str(text).unwrap();
        if let Some(preset) = config.preset {
            config.sim.scorer = preset.params();
        }
        assert_eq!(config.sim.scorer.buy_threshold, 4.5);
        assert_eq!(config.sim.scorer.rsi_oversold, 25.0);
    }

    #[test]
    fn minimal_toml_fills_defaults() {
        let config: RunConfig = toml::from_str("name = \"x\"").unwrap();
        assert_eq!(config.sim.initial_capital, 10_000.0);
        assert!(config.preset.is_none());
        config.sim.validate().unwrap();
    }
}
