//! Configuration file support for tiltguard
//!
//! Loads user configuration from JSON files.
//!
//! Search order:
//! 1. Explicit path (--config CLI flag)
//! 2. `.tiltguardrc.json` in the working directory
//! 3. `tiltguard.config.json` in the working directory
//!
//! All fields are optional. CLI flags take precedence over config file values.

use crate::advice::{DEFAULT_OLLAMA_HOST, DEFAULT_OLLAMA_MODEL};
use crate::risk::{RiskThresholds, RiskWeights};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Data file used when neither the config nor the CLI names one
pub const DEFAULT_DATA_FILE: &str = "tiltguard-accounts.json";

/// tiltguard configuration loaded from a JSON config file
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TiltguardConfig {
    /// Path of the accounts data file (relative to the config file's directory)
    #[serde(default)]
    pub data_file: Option<PathBuf>,

    /// Custom risk level thresholds
    #[serde(default)]
    pub thresholds: Option<ThresholdConfig>,

    /// Custom risk rule weights
    #[serde(default)]
    pub weights: Option<WeightConfig>,

    /// Advice provider settings
    #[serde(default)]
    pub advice: Option<AdviceConfig>,
}

/// Custom risk thresholds
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ThresholdConfig {
    /// Scores above this get the mild-risk description (default: 20)
    pub mild: Option<u8>,
    /// Scores at or above this are WARNING (default: 45)
    pub warning: Option<u8>,
    /// Scores at or above this are DANGER (default: 75)
    pub danger: Option<u8>,
}

/// Custom risk rule weights
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WeightConfig {
    /// Points per loss in the current streak (default: 15)
    pub per_streak_loss: Option<u32>,
    /// Recent win rate <= 20% (default: 50)
    pub very_low_win_rate: Option<u32>,
    /// Recent win rate <= 40% (default: 30)
    pub low_win_rate: Option<u32>,
    /// 4+ losses in last 5 (default: 35)
    pub dense_losses: Option<u32>,
}

/// Advice provider settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AdviceConfig {
    /// Ollama host (default: http://127.0.0.1:11434)
    pub host: Option<String>,
    /// Model name (default: llama3.2)
    pub model: Option<String>,
    /// When false, only offline fallback text is used (default: true)
    pub enabled: Option<bool>,
}

/// Resolved configuration with defaults filled in
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedConfig {
    pub data_file: PathBuf,
    pub thresholds: RiskThresholds,
    pub weights: RiskWeights,
    pub advice_host: String,
    pub advice_model: String,
    pub advice_enabled: bool,
    /// Path the config was loaded from (None if defaults)
    pub config_path: Option<PathBuf>,
}

impl TiltguardConfig {
    /// Validate the configuration for logical errors
    pub fn validate(&self) -> Result<()> {
        if let Some(ref t) = self.thresholds {
            let defaults = RiskThresholds::default();
            let mild = t.mild.unwrap_or(defaults.mild);
            let warning = t.warning.unwrap_or(defaults.warning);
            let danger = t.danger.unwrap_or(defaults.danger);

            for (name, val) in [("mild", mild), ("warning", warning), ("danger", danger)] {
                if val > 100 {
                    anyhow::bail!("thresholds.{} must be at most 100 (got {})", name, val);
                }
            }
            if mild >= warning {
                anyhow::bail!(
                    "thresholds.mild ({}) must be less than thresholds.warning ({})",
                    mild,
                    warning
                );
            }
            if warning >= danger {
                anyhow::bail!(
                    "thresholds.warning ({}) must be less than thresholds.danger ({})",
                    warning,
                    danger
                );
            }
        }

        if let Some(ref w) = self.weights {
            for (name, val) in [
                ("per_streak_loss", w.per_streak_loss),
                ("very_low_win_rate", w.very_low_win_rate),
                ("low_win_rate", w.low_win_rate),
                ("dense_losses", w.dense_losses),
            ] {
                if let Some(v) = val {
                    if v > 100 {
                        anyhow::bail!("weights.{} must be at most 100 (got {})", name, v);
                    }
                }
            }
        }

        if let Some(ref a) = self.advice {
            if let Some(ref host) = a.host {
                crate::advice::parse_host(host)
                    .map_err(|e| anyhow::anyhow!("advice.host is invalid ({}): {}", host, e))?;
            }
            if let Some(ref model) = a.model {
                if model.trim().is_empty() {
                    anyhow::bail!("advice.model must not be empty");
                }
            }
        }

        if let Some(ref data_file) = self.data_file {
            if data_file.as_os_str().is_empty() {
                anyhow::bail!("data_file must not be empty");
            }
        }

        Ok(())
    }

    /// Resolve config into the form used at runtime
    pub fn resolve(&self) -> Result<ResolvedConfig> {
        self.validate()?;

        let thresholds = match &self.thresholds {
            Some(t) => {
                let defaults = RiskThresholds::default();
                RiskThresholds {
                    mild: t.mild.unwrap_or(defaults.mild),
                    warning: t.warning.unwrap_or(defaults.warning),
                    danger: t.danger.unwrap_or(defaults.danger),
                }
            }
            None => RiskThresholds::default(),
        };

        let weights = match &self.weights {
            Some(w) => {
                let defaults = RiskWeights::default();
                RiskWeights {
                    per_streak_loss: w.per_streak_loss.unwrap_or(defaults.per_streak_loss),
                    very_low_win_rate: w.very_low_win_rate.unwrap_or(defaults.very_low_win_rate),
                    low_win_rate: w.low_win_rate.unwrap_or(defaults.low_win_rate),
                    dense_losses: w.dense_losses.unwrap_or(defaults.dense_losses),
                }
            }
            None => RiskWeights::default(),
        };

        let (advice_host, advice_model, advice_enabled) = match &self.advice {
            Some(a) => (
                a.host.clone().unwrap_or_else(|| DEFAULT_OLLAMA_HOST.to_string()),
                a.model.clone().unwrap_or_else(|| DEFAULT_OLLAMA_MODEL.to_string()),
                a.enabled.unwrap_or(true),
            ),
            None => (
                DEFAULT_OLLAMA_HOST.to_string(),
                DEFAULT_OLLAMA_MODEL.to_string(),
                true,
            ),
        };

        Ok(ResolvedConfig {
            data_file: self
                .data_file
                .clone()
                .unwrap_or_else(|| PathBuf::from(DEFAULT_DATA_FILE)),
            thresholds,
            weights,
            advice_host,
            advice_model,
            advice_enabled,
            config_path: None,
        })
    }
}

impl ResolvedConfig {
    /// Build a ResolvedConfig with all defaults (no config file)
    pub fn defaults() -> Result<Self> {
        TiltguardConfig::default().resolve()
    }
}

/// Discover and load a config file from `dir`
///
/// Search order:
/// 1. `.tiltguardrc.json`
/// 2. `tiltguard.config.json`
///
/// Returns `None` if no config file is found (use defaults).
pub fn discover_config(dir: &Path) -> Result<Option<(TiltguardConfig, PathBuf)>> {
    for name in [".tiltguardrc.json", "tiltguard.config.json"] {
        let path = dir.join(name);
        if path.exists() {
            let config = load_config_file(&path)?;
            return Ok(Some((config, path)));
        }
    }
    Ok(None)
}

/// Load config from an explicit file path
pub fn load_config_file(path: &Path) -> Result<TiltguardConfig> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config file: {}", path.display()))?;

    let config: TiltguardConfig = serde_json::from_str(&content)
        .with_context(|| format!("failed to parse config file: {}", path.display()))?;

    config
        .validate()
        .with_context(|| format!("invalid config in: {}", path.display()))?;

    Ok(config)
}

/// Load and resolve config
///
/// If `config_path` is provided, loads from that file.
/// Otherwise, discovers config in `dir`.
/// Returns default config if nothing is found. A relative `data_file` is
/// resolved against the directory of the config file it came from.
pub fn load_and_resolve(dir: &Path, config_path: Option<&Path>) -> Result<ResolvedConfig> {
    let (config, source_path) = if let Some(path) = config_path {
        let config = load_config_file(path)?;
        (config, Some(path.to_path_buf()))
    } else {
        match discover_config(dir)? {
            Some((config, path)) => (config, Some(path)),
            None => (TiltguardConfig::default(), None),
        }
    };

    let mut resolved = config.resolve()?;
    if let Some(ref source) = source_path {
        if config.data_file.is_some() && resolved.data_file.is_relative() {
            if let Some(parent) = source.parent() {
                resolved.data_file = parent.join(&resolved.data_file);
            }
        }
    }
    resolved.config_path = source_path;
    Ok(resolved)
}
