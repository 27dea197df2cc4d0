//! Experiment directory layout, progress state, metrics log and checkpoints.
//!
//! ```text
//! <exp>/
//!   model.json          classifier config used to rebuild the network
//!   state.json          resume point and score history
//!   training.log        per-segment metrics (CSV)
//!   models/
//!     <model>_last.bin
//!     <model>_last_optim.bin
//!     <model>_best_epoch_<seg>_<acc>.bin
//! ```

use anyhow::Context;
use burn::module::Module;
use burn::record::{BinFileRecorder, FullPrecisionSettings, Recorder};
use burn::tensor::backend::Backend;
use models::{RecurrentClassifier, RecurrentClassifierConfig};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

pub const METRICS_HEADER: [&str; 8] = [
    "segment",
    "train_acc",
    "train_loss",
    "val_acc",
    "val_loss",
    "val_f1score",
    "val_acc_combined_channels",
    "val_f1score_combined_channels",
];

/// Scores of one validated segment.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SegmentScore {
    pub epoch: usize,
    pub segment: usize,
    pub accuracy: f64,
    pub macro_f1: f64,
    pub seizure_f1: f64,
}

/// Where to continue and what has been achieved so far.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrainingState {
    pub epoch: usize,
    pub next_segment: usize,
    pub best_val_score: f64,
    pub optimizer: String,
    pub learning_rate: f64,
    pub scores: Vec<SegmentScore>,
}

/// One row of `training.log`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MetricsRow {
    pub segment: usize,
    pub train_acc: f64,
    pub train_loss: f64,
    pub val_acc: f64,
    pub val_loss: f64,
    pub val_f1: f64,
    pub val_acc_combined: f64,
    pub val_f1_combined: f64,
}

#[derive(Debug, Clone)]
pub struct ExperimentDir {
    pub root: PathBuf,
    pub models: PathBuf,
}

impl ExperimentDir {
    /// `detection_recurrent_<id>_<model>_<opt>_<lr>`, without the timestamp suffix.
    pub fn base_name(patient_id: &str, model: &str, opt: &str, lr: f64) -> String {
        format!("detection_recurrent_{patient_id}_{model}_{opt}_{lr}")
    }

    /// Create a fresh experiment directory stamped with the local time.
    pub fn create(
        experiments_root: &Path,
        patient_id: &str,
        model: &str,
        opt: &str,
        lr: f64,
    ) -> anyhow::Result<Self> {
        let stamp = chrono::Local::now().format("%d-%b_%H:%M").to_string();
        let name = format!("{}_{stamp}", Self::base_name(patient_id, model, opt, lr));
        Self::create_at(&experiments_root.join(name))
    }

    pub fn create_at(root: &Path) -> anyhow::Result<Self> {
        if root.exists() {
            anyhow::bail!("experiment directory {} already exists", root.display());
        }
        let models = root.join("models");
        fs::create_dir_all(&models)
            .with_context(|| format!("failed to create {}", models.display()))?;
        Ok(Self {
            root: root.to_path_buf(),
            models,
        })
    }

    /// Open an existing experiment for resuming.
    pub fn open(root: &Path) -> anyhow::Result<Self> {
        let models = root.join("models");
        if !models.is_dir() {
            anyhow::bail!("Last model not found in {}", models.display());
        }
        Ok(Self {
            root: root.to_path_buf(),
            models,
        })
    }

    /// The model checkpoint whose file name contains `last`.
    pub fn find_last_model(&self) -> anyhow::Result<PathBuf> {
        let mut found = None;
        for entry in fs::read_dir(&self.models)
            .with_context(|| format!("failed to list {}", self.models.display()))?
        {
            let path = entry?.path();
            let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            if name.contains("last") && !name.contains("optim") {
                found = Some(path);
            }
        }
        found.ok_or_else(|| anyhow::anyhow!("Last model not found in {}", self.models.display()))
    }

    pub fn last_model_path(&self, model: &str) -> PathBuf {
        self.models.join(format!("{model}_last.bin"))
    }

    pub fn last_optim_path(&self, model: &str) -> PathBuf {
        self.models.join(format!("{model}_last_optim.bin"))
    }

    pub fn best_model_path(&self, model: &str, segment: usize, accuracy: f64) -> PathBuf {
        self.models
            .join(format!("{model}_best_epoch_{segment:04}_{accuracy:.4}.bin"))
    }

    pub fn metrics_log_path(&self) -> PathBuf {
        self.root.join("training.log")
    }

    fn model_config_path(&self) -> PathBuf {
        self.root.join("model.json")
    }

    fn state_path(&self) -> PathBuf {
        self.root.join("state.json")
    }

    pub fn save_model_config(&self, cfg: &RecurrentClassifierConfig) -> anyhow::Result<()> {
        let path = self.model_config_path();
        fs::write(&path, serde_json::to_vec_pretty(cfg)?)
            .with_context(|| format!("failed to write {}", path.display()))
    }

    pub fn load_model_config(&self) -> anyhow::Result<RecurrentClassifierConfig> {
        let path = self.model_config_path();
        let raw = fs::read(&path).with_context(|| format!("failed to read {}", path.display()))?;
        Ok(serde_json::from_slice(&raw)?)
    }

    pub fn save_state(&self, state: &TrainingState) -> anyhow::Result<()> {
        let path = self.state_path();
        fs::write(&path, serde_json::to_vec_pretty(state)?)
            .with_context(|| format!("failed to write {}", path.display()))
    }

    pub fn load_state(&self) -> anyhow::Result<Option<TrainingState>> {
        let path = self.state_path();
        if !path.exists() {
            return Ok(None);
        }
        let raw = fs::read(&path).with_context(|| format!("failed to read {}", path.display()))?;
        Ok(Some(serde_json::from_slice(&raw)?))
    }

    pub fn metrics_log(&self) -> anyhow::Result<MetricsLog> {
        MetricsLog::open(&self.metrics_log_path())
    }
}

/// Append-only CSV of per-segment metrics.
pub struct MetricsLog {
    writer: csv::Writer<fs::File>,
}

impl MetricsLog {
    /// Open for appending; the header is written only to a new or empty file.
    pub fn open(path: &Path) -> anyhow::Result<Self> {
        let is_new = fs::metadata(path).map(|m| m.len() == 0).unwrap_or(true);
        let file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .with_context(|| format!("failed to open {}", path.display()))?;
        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(file);
        if is_new {
            writer.write_record(METRICS_HEADER)?;
            writer.flush()?;
        }
        Ok(Self { writer })
    }

    pub fn append(&mut self, row: &MetricsRow) -> anyhow::Result<()> {
        self.writer.write_record([
            row.segment.to_string(),
            format!("{}", row.train_acc),
            format!("{}", row.train_loss),
            format!("{}", row.val_acc),
            format!("{}", row.val_loss),
            format!("{}", row.val_f1),
            format!("{}", row.val_acc_combined),
            format!("{}", row.val_f1_combined),
        ])?;
        self.writer.flush()?;
        Ok(())
    }
}

pub fn save_model<B: Backend>(model: &RecurrentClassifier<B>, path: &Path) -> anyhow::Result<()> {
    let recorder = BinFileRecorder::<FullPrecisionSettings>::new();
    model
        .clone()
        .save_file(path, &recorder)
        .map_err(|e| anyhow::anyhow!("failed to save checkpoint {}: {e}", path.display()))
}

pub fn load_model<B: Backend>(
    cfg: &RecurrentClassifierConfig,
    path: &Path,
    device: &B::Device,
) -> anyhow::Result<RecurrentClassifier<B>> {
    let recorder = BinFileRecorder::<FullPrecisionSettings>::new();
    RecurrentClassifier::<B>::new(cfg, device)
        .load_file(path, &recorder, device)
        .map_err(|e| anyhow::anyhow!("failed to load checkpoint {}: {e}", path.display()))
}

pub fn save_record<B: Backend, R: burn::record::Record<B>>(
    record: R,
    path: &Path,
) -> anyhow::Result<()> {
    let recorder = BinFileRecorder::<FullPrecisionSettings>::new();
    Recorder::<B>::record(&recorder, record, path.to_path_buf())
        .map_err(|e| anyhow::anyhow!("failed to save {}: {e}", path.display()))
}

pub fn load_record<B: Backend, R: burn::record::Record<B>>(
    path: &Path,
    device: &B::Device,
) -> anyhow::Result<R> {
    let recorder = BinFileRecorder::<FullPrecisionSettings>::new();
    Recorder::<B>::load(&recorder, path.to_path_buf(), device)
        .map_err(|e| anyhow::anyhow!("failed to load {}: {e}", path.display()))
}
