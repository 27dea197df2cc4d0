use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::Deserialize;

const DEFAULT_CONFIG_NAME: &str = "seizure-training.toml";
const CONFIG_ENV: &str = "SEIZURE_TRAINING_CONFIG";

/// Experiment-level settings that are not command-line arguments.
#[derive(Debug, Clone, PartialEq)]
pub struct TrainingConfig {
    pub segments: usize,
    pub max_segments_in_history: usize,
    pub sampling_rate: u32,
    pub num_classes: usize,
    pub experiments_root: PathBuf,
    /// Seconds per batch used for the training-time estimate.
    pub estimated_batch_seconds: f64,
    pub hidden: usize,
    pub layers: usize,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            segments: 10,
            max_segments_in_history: 3,
            sampling_rate: 256,
            num_classes: 2,
            experiments_root: PathBuf::from("experiments"),
            estimated_batch_seconds: 2.5,
            hidden: 128,
            layers: 1,
        }
    }
}

#[derive(Debug, Deserialize, Default)]
struct TrainingConfigFile {
    segments: Option<usize>,
    max_segments_in_history: Option<usize>,
    sampling_rate: Option<u32>,
    num_classes: Option<usize>,
    experiments_root: Option<String>,
    estimated_batch_seconds: Option<f64>,
    hidden: Option<usize>,
    layers: Option<usize>,
    /// Older layout: `hidden`/`layers` under a `[model]` table.
    model: Option<ModelSection>,
    #[serde(flatten)]
    unknown: BTreeMap<String, toml::Value>,
}

#[derive(Debug, Deserialize, Default)]
struct ModelSection {
    hidden: Option<usize>,
    layers: Option<usize>,
    #[serde(flatten)]
    unknown: BTreeMap<String, toml::Value>,
}

impl TrainingConfig {
    /// Resolve the config from an explicit path, `$SEIZURE_TRAINING_CONFIG`,
    /// or `seizure-training.toml` in the working directory, in that order.
    pub fn load(explicit: Option<&Path>) -> Self {
        let path = match explicit {
            Some(p) => p.to_path_buf(),
            None => match std::env::var(CONFIG_ENV) {
                Ok(p) if !p.trim().is_empty() => expand_path(&p),
                _ => PathBuf::from(DEFAULT_CONFIG_NAME),
            },
        };
        let cfg = match Self::from_path(&path) {
            Ok(Some(cfg)) => {
                log::info!("loaded training config from {}", path.display());
                cfg
            }
            Ok(None) => {
                if explicit.is_some() {
                    log::warn!("config {} not found; using defaults", path.display());
                }
                Self::default()
            }
            Err(e) => {
                log::warn!("config {} unusable ({e}); using defaults", path.display());
                Self::default()
            }
        };
        cfg.warn_if_invalid();
        cfg
    }

    /// `Ok(None)` when the file does not exist.
    pub fn from_path(path: &Path) -> anyhow::Result<Option<Self>> {
        if !path.exists() {
            return Ok(None);
        }
        let raw = std::fs::read_to_string(path)?;
        Ok(Some(Self::from_toml_str(&raw)?))
    }

    /// Parse a TOML document; unknown keys are logged and ignored.
    pub fn from_toml_str(raw: &str) -> anyhow::Result<Self> {
        let (cfg, unknown) = Self::parse(raw)?;
        for key in &unknown {
            log::warn!("training config: unknown key `{key}` ignored");
        }
        Ok(cfg)
    }

    /// Config plus the dotted names of keys that were not recognised.
    fn parse(raw: &str) -> anyhow::Result<(Self, Vec<String>)> {
        let file: TrainingConfigFile = toml::from_str(raw)?;
        let mut unknown: Vec<String> = file.unknown.keys().cloned().collect();
        if let Some(model) = &file.model {
            unknown.extend(model.unknown.keys().map(|k| format!("model.{k}")));
            if (file.hidden.is_some() && model.hidden.is_some())
                || (file.layers.is_some() && model.layers.is_some())
            {
                log::warn!("training config: top-level hidden/layers override the [model] table");
            }
        }
        Ok((Self::from_file(file), unknown))
    }

    fn from_file(file: TrainingConfigFile) -> Self {
        let defaults = Self::default();
        let model = file.model.unwrap_or_default();
        Self {
            segments: file.segments.unwrap_or(defaults.segments),
            max_segments_in_history: file
                .max_segments_in_history
                .unwrap_or(defaults.max_segments_in_history),
            sampling_rate: file.sampling_rate.unwrap_or(defaults.sampling_rate),
            num_classes: file.num_classes.unwrap_or(defaults.num_classes),
            experiments_root: file
                .experiments_root
                .map(|v| expand_path(&v))
                .unwrap_or(defaults.experiments_root),
            estimated_batch_seconds: file
                .estimated_batch_seconds
                .unwrap_or(defaults.estimated_batch_seconds),
            hidden: file.hidden.or(model.hidden).unwrap_or(defaults.hidden),
            layers: file.layers.or(model.layers).unwrap_or(defaults.layers),
        }
    }

    fn warn_if_invalid(&self) {
        if self.segments == 0 {
            log::warn!("training config: segments is 0; training will refuse to start");
        }
        if self.segments == 1 {
            log::warn!("training config: a single segment disables validation");
        }
        if self.num_classes != 2 {
            log::warn!(
                "training config: num_classes = {}; seizure labels only use classes 0 and 1",
                self.num_classes
            );
        }
    }
}

fn expand_path(raw: &str) -> PathBuf {
    if let Some(stripped) = raw.strip_prefix('~') {
        if let Ok(home) = std::env::var("HOME") {
            return PathBuf::from(format!("{home}{stripped}"));
        }
    }
    PathBuf::from(raw)
}
