use anyhow::Context;
use burn::module::{AutodiffModule, Module};
use burn::optim::{AdamConfig, SgdConfig};
use clap::{Parser, ValueEnum};
use eeg_dataset::{GeneratorConfig, RecurrentBatchGenerator};
use models::{create_model, CellKind};
use std::path::PathBuf;

use crate::config::TrainingConfig;
use crate::evaluate::{evaluate_range, ValidationReport};
use crate::experiment::{load_model, ExperimentDir, SegmentScore, TrainingState};
use crate::schedule::SegmentSchedule;
use crate::trainer::SegmentRun;
use crate::{ADBackend, TrainBackend};

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelKind {
    Lstm,
    Gru,
}

impl ModelKind {
    pub fn cell(self) -> CellKind {
        match self {
            ModelKind::Lstm => CellKind::Lstm,
            ModelKind::Gru => CellKind::Gru,
        }
    }
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum OptimizerKind {
    Adam,
    Sgd,
}

impl OptimizerKind {
    pub fn as_str(self) -> &'static str {
        match self {
            OptimizerKind::Adam => "adam",
            OptimizerKind::Sgd => "sgd",
        }
    }

    fn parse(name: &str) -> Option<Self> {
        match name {
            "adam" => Some(OptimizerKind::Adam),
            "sgd" => Some(OptimizerKind::Sgd),
            _ => None,
        }
    }
}

#[derive(ValueEnum, Debug, Clone, Copy)]
pub enum BackendKind {
    NdArray,
    Wgpu,
}

#[derive(Parser, Debug, Clone)]
#[command(
    name = "train",
    about = "Train recurrent models to detect epilepsy seizures on EEG windows"
)]
pub struct TrainArgs {
    /// Index of recordings to use for training, e.g. "indexes_detection/chb01/train.txt".
    #[arg(long)]
    pub index: PathBuf,
    /// Index of recordings for a held-out evaluation after training.
    #[arg(long = "index-val")]
    pub index_val: Option<PathBuf>,
    /// Id of the patient, e.g. "chb01".
    #[arg(long)]
    pub id: String,
    /// Recurrent cell to use.
    #[arg(long, value_enum, default_value_t = ModelKind::Lstm)]
    pub model: ModelKind,
    /// Number of passes over the segment schedule.
    #[arg(long, default_value_t = 1)]
    pub epochs: usize,
    /// Batch size.
    #[arg(long, default_value_t = 64)]
    pub batch_size: usize,
    /// Initial learning rate.
    #[arg(long, default_value_t = 1e-4)]
    pub lr: f64,
    /// Optimizer.
    #[arg(long, value_enum, default_value_t = OptimizerKind::Adam)]
    pub opt: OptimizerKind,
    /// Index of the GPU to use (wgpu backend only).
    #[arg(long, default_value_t = 0)]
    pub gpu: usize,
    /// Backend to use (ndarray or wgpu if enabled).
    #[arg(long, value_enum, default_value_t = BackendKind::NdArray)]
    pub backend: BackendKind,
    /// Window length in seconds.
    #[arg(long, default_value_t = 1.0)]
    pub window_length: f64,
    /// Window shift in seconds.
    #[arg(long, default_value_t = 0.5)]
    pub shift: f64,
    /// Windows per sequence.
    #[arg(long, default_value_t = 19)]
    pub timesteps: usize,
    /// Experiment directory to resume.
    #[arg(long)]
    pub resume: Option<PathBuf>,
    /// Epoch to restart from (`--epochs` counts the epochs done before resuming).
    #[arg(long, default_value_t = 0)]
    pub starting_epoch: usize,
    /// Seed for shuffling the training sequences.
    #[arg(long)]
    pub seed: Option<u64>,
    /// Training config file (TOML).
    #[arg(long)]
    pub config: Option<PathBuf>,
    /// Directory that holds experiment directories (overrides the config).
    #[arg(long)]
    pub experiments_root: Option<PathBuf>,
}

/// Mean scores over every validated segment.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RunSummary {
    pub mean_accuracy: f64,
    pub mean_macro_f1: f64,
    pub mean_seizure_f1: f64,
    pub validated_segments: usize,
}

impl RunSummary {
    pub fn from_scores(scores: &[SegmentScore]) -> Option<Self> {
        if scores.is_empty() {
            return None;
        }
        let n = scores.len() as f64;
        Some(Self {
            mean_accuracy: scores.iter().map(|s| s.accuracy).sum::<f64>() / n,
            mean_macro_f1: scores.iter().map(|s| s.macro_f1).sum::<f64>() / n,
            mean_seizure_f1: scores.iter().map(|s| s.seizure_f1).sum::<f64>() / n,
            validated_segments: scores.len(),
        })
    }
}

#[derive(Debug)]
pub struct TrainOutcome {
    pub experiment: ExperimentDir,
    pub state: TrainingState,
    pub summary: Option<RunSummary>,
    pub held_out: Option<ValidationReport>,
}

pub fn run_train(args: TrainArgs) -> anyhow::Result<TrainOutcome> {
    validate_backend_choice(args.backend)?;
    let cfg = TrainingConfig::load(args.config.as_deref());
    run_train_with_config(args, cfg)
}

pub fn run_train_with_config(
    args: TrainArgs,
    mut cfg: TrainingConfig,
) -> anyhow::Result<TrainOutcome> {
    if let Some(root) = &args.experiments_root {
        cfg.experiments_root = root.clone();
    }
    let device = train_device(args.gpu);

    let (experiment, last_model) = match &args.resume {
        Some(dir) => {
            let exp = ExperimentDir::open(dir)?;
            let last = exp.find_last_model()?;
            log::info!("Resuming {} from {}", exp.root.display(), last.display());
            (exp, Some(last))
        }
        None => {
            let exp = ExperimentDir::create(
                &cfg.experiments_root,
                &args.id,
                args.model.cell().as_str(),
                args.opt.as_str(),
                args.lr,
            )?;
            log::info!("Created experiment {}", exp.root.display());
            (exp, None)
        }
    };

    log::info!("Creating Training Data Generator...");
    let generator = RecurrentBatchGenerator::from_index_files(
        std::slice::from_ref(&args.index),
        generator_config(&args, &cfg, true),
    )
    .with_context(|| format!("failed to build generator from {}", args.index.display()))?;

    let schedule = SegmentSchedule::new(
        generator.len(),
        cfg.segments,
        cfg.max_segments_in_history,
    )?;
    let estimate = schedule.estimate(cfg.estimated_batch_seconds);
    log::info!(
        "{} segments of {} batches; estimated total training time: {:.2} hours",
        schedule.segments(),
        schedule.batches_per_segment(),
        estimate.total_hours()
    );

    let input_shape = generator.input_shape();
    let (model, model_cfg, state) = match &last_model {
        Some(path) => {
            let model_cfg = resumed_model_config(&experiment, input_shape.1)?;
            let model = load_model::<ADBackend>(&model_cfg, path, &device)?;
            let state = experiment.load_state()?.unwrap_or_default();
            (model, model_cfg, state)
        }
        None => {
            let (model, model_cfg) = create_model::<ADBackend>(
                args.model.cell(),
                input_shape,
                cfg.num_classes,
                cfg.hidden,
                cfg.layers,
                &device,
            );
            experiment.save_model_config(&model_cfg)?;
            (model, model_cfg, TrainingState::default())
        }
    };
    let model_name = model_cfg.kind.as_str();
    if model_cfg.kind != args.model.cell() {
        log::warn!("experiment holds a {model_name} model; ignoring --model");
    }
    log::info!(
        "model: {} ({} layer(s), hidden {}, {} parameters), input {:?}",
        model_cfg.kind.as_str(),
        model_cfg.layers,
        model_cfg.hidden,
        model.num_params(),
        input_shape
    );

    let resumed = last_model.is_some();
    let opt = if resumed {
        match OptimizerKind::parse(&state.optimizer) {
            Some(saved) if saved != args.opt => {
                log::warn!(
                    "experiment was trained with {}; ignoring --opt {}",
                    saved.as_str(),
                    args.opt.as_str()
                );
                saved
            }
            _ => args.opt,
        }
    } else {
        args.opt
    };
    let learning_rate = if resumed && state.learning_rate > 0.0 {
        state.learning_rate
    } else {
        args.lr
    };
    let (start_epoch, start_segment) = if args.starting_epoch > 0 {
        (args.starting_epoch, 0)
    } else {
        (state.epoch, state.next_segment)
    };
    let state = TrainingState {
        optimizer: opt.as_str().to_string(),
        learning_rate,
        ..state
    };
    if start_epoch >= args.epochs {
        log::warn!(
            "starting epoch {start_epoch} is not below --epochs {}; nothing to train",
            args.epochs
        );
    }

    let run = SegmentRun {
        experiment: &experiment,
        generator: &generator,
        schedule,
        model_name,
        num_classes: model_cfg.num_classes,
        learning_rate,
        epochs: args.epochs,
        start_epoch,
        start_segment: start_segment.min(schedule.segments()),
        resume_optimizer: resumed,
        device: device.clone(),
    };
    let (model, state) = match opt {
        OptimizerKind::Adam => run.run(model, AdamConfig::new().init(), state)?,
        OptimizerKind::Sgd => run.run(model, SgdConfig::new().init(), state)?,
    };

    let summary = RunSummary::from_scores(&state.scores);
    match &summary {
        Some(s) => {
            log::info!("#################################################################");
            log::info!("Accuracy:\t{:.2}%", s.mean_accuracy * 100.0);
            log::info!("F1 score:\t{:.4}", s.mean_macro_f1);
            log::info!("Seizure F1 score:\t{:.4}", s.mean_seizure_f1);
            log::info!("#################################################################");
            for score in &state.scores {
                log::info!(
                    "epoch {} segment {}: acc={:.4} f1={:.4} seizure_f1={:.4}",
                    score.epoch,
                    score.segment,
                    score.accuracy,
                    score.macro_f1,
                    score.seizure_f1
                );
            }
        }
        None => log::info!("no segment was validated"),
    }

    let held_out = match &args.index_val {
        Some(index) => {
            log::info!("Creating Validation Data Generator...");
            let val_gen = RecurrentBatchGenerator::from_index_files(
                std::slice::from_ref(index),
                generator_config(&args, &cfg, false),
            )
            .with_context(|| format!("failed to build generator from {}", index.display()))?;
            let valid = model.valid();
            let report = evaluate_range::<TrainBackend>(
                &valid,
                &val_gen,
                0..val_gen.len(),
                model_cfg.num_classes,
                &device,
            )?;
            report.log("Held-out validation results");
            Some(report)
        }
        None => None,
    };

    Ok(TrainOutcome {
        experiment,
        state,
        summary,
        held_out,
    })
}

fn resumed_model_config(
    experiment: &ExperimentDir,
    window_samples: usize,
) -> anyhow::Result<models::RecurrentClassifierConfig> {
    let model_cfg = experiment.load_model_config()?;
    if model_cfg.input_size != window_samples {
        anyhow::bail!(
            "checkpoint expects {} samples per window but the generator yields {}; \
             check --window-length and the sampling rate",
            model_cfg.input_size,
            window_samples
        );
    }
    Ok(model_cfg)
}

pub fn generator_config(args: &TrainArgs, cfg: &TrainingConfig, training: bool) -> GeneratorConfig {
    GeneratorConfig {
        window_length_s: args.window_length,
        shift_s: args.shift,
        timesteps: args.timesteps,
        sampling_rate: cfg.sampling_rate,
        batch_size: args.batch_size,
        in_training_mode: training,
        balance_batches: training,
        patient_id: Some(args.id.clone()),
        normalize: true,
        seed: args.seed,
    }
}

#[cfg(feature = "backend-wgpu")]
pub fn train_device(gpu: usize) -> <TrainBackend as burn::tensor::backend::Backend>::Device {
    burn_wgpu::WgpuDevice::DiscreteGpu(gpu)
}

#[cfg(not(feature = "backend-wgpu"))]
pub fn train_device(gpu: usize) -> <TrainBackend as burn::tensor::backend::Backend>::Device {
    if gpu != 0 {
        log::warn!("--gpu {gpu} ignored: built without backend-wgpu, training on CPU");
    }
    Default::default()
}

pub fn validate_backend_choice(kind: BackendKind) -> anyhow::Result<()> {
    let built_wgpu = cfg!(feature = "backend-wgpu");
    match (kind, built_wgpu) {
        (BackendKind::Wgpu, false) => {
            anyhow::bail!("backend-wgpu feature not enabled; rebuild with --features backend-wgpu or choose ndarray backend")
        }
        (BackendKind::NdArray, true) => {
            log::warn!("built with backend-wgpu; training will still use the WGPU backend despite --backend nd-array");
        }
        _ => {}
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_driver() {
        let args =
            TrainArgs::try_parse_from(["train", "--index", "idx.txt", "--id", "chb02"]).unwrap();
        assert_eq!(args.model, ModelKind::Lstm);
        assert_eq!(args.opt, OptimizerKind::Adam);
        assert_eq!(args.batch_size, 64);
        assert_eq!(args.timesteps, 19);
        assert_eq!(args.epochs, 1);
        assert!((args.lr - 1e-4).abs() < 1e-12);
        assert!(args.resume.is_none());

        let gen = generator_config(&args, &TrainingConfig::default(), true);
        assert!(gen.in_training_mode && gen.balance_batches);
        assert_eq!(gen.patient_id.as_deref(), Some("chb02"));
        assert!(!generator_config(&args, &TrainingConfig::default(), false).balance_batches);
    }

    #[test]
    fn index_and_id_are_required() {
        assert!(TrainArgs::try_parse_from(["train", "--id", "chb01"]).is_err());
        assert!(TrainArgs::try_parse_from(["train", "--index", "i.txt"]).is_err());
    }

    #[test]
    fn summary_averages_segment_scores() {
        assert!(RunSummary::from_scores(&[]).is_none());
        let score = |accuracy, seizure_f1| SegmentScore {
            epoch: 0,
            segment: 0,
            accuracy,
            macro_f1: 0.5,
            seizure_f1,
        };
        let s = RunSummary::from_scores(&[score(0.8, 0.2), score(0.6, 0.4)]).unwrap();
        assert!((s.mean_accuracy - 0.7).abs() < 1e-12);
        assert!((s.mean_seizure_f1 - 0.3).abs() < 1e-12);
        assert_eq!(s.validated_segments, 2);
    }
}
