use std::path::PathBuf;

use clap::Parser;
use eeg_dataset::{GeneratorConfig, RecurrentBatchGenerator};
use training::experiment::{load_model, ExperimentDir};
use training::util::{train_device, validate_backend_choice, BackendKind};
use training::{evaluate_range, TrainBackend, TrainingConfig};

#[derive(Parser, Debug)]
#[command(
    name = "eval",
    about = "Evaluate a recurrent seizure detector checkpoint with channel-averaged predictions"
)]
struct Args {
    /// Experiment directory holding model.json and models/.
    #[arg(long)]
    experiment: PathBuf,
    /// Checkpoint to load (defaults to the experiment's last model).
    #[arg(long)]
    checkpoint: Option<PathBuf>,
    /// Index of recordings to evaluate on.
    #[arg(long)]
    index: PathBuf,
    /// Id of the patient the recordings must belong to.
    #[arg(long)]
    id: Option<String>,
    /// Backend to use (ndarray or wgpu if enabled).
    #[arg(long, value_enum, default_value_t = BackendKind::NdArray)]
    backend: BackendKind,
    #[arg(long, default_value_t = 0)]
    gpu: usize,
    #[arg(long, default_value_t = 64)]
    batch_size: usize,
    #[arg(long, default_value_t = 1.0)]
    window_length: f64,
    #[arg(long, default_value_t = 0.5)]
    shift: f64,
    #[arg(long, default_value_t = 19)]
    timesteps: usize,
    /// Training config file (TOML); only the sampling rate is used.
    #[arg(long)]
    config: Option<PathBuf>,
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();
    validate_backend_choice(args.backend)?;
    let cfg = TrainingConfig::load(args.config.as_deref());

    let experiment = ExperimentDir::open(&args.experiment)?;
    let checkpoint = match args.checkpoint {
        Some(p) => p,
        None => experiment.find_last_model()?,
    };
    let model_cfg = experiment.load_model_config()?;

    let generator = RecurrentBatchGenerator::from_index_files(
        std::slice::from_ref(&args.index),
        GeneratorConfig {
            window_length_s: args.window_length,
            shift_s: args.shift,
            timesteps: args.timesteps,
            sampling_rate: cfg.sampling_rate,
            batch_size: args.batch_size,
            patient_id: args.id.clone(),
            ..GeneratorConfig::default()
        },
    )?;
    let (_, window_samples) = generator.input_shape();
    if window_samples != model_cfg.input_size {
        anyhow::bail!(
            "checkpoint expects {} samples per window, generator yields {window_samples}",
            model_cfg.input_size
        );
    }

    let device = train_device(args.gpu);
    let model = load_model::<TrainBackend>(&model_cfg, &checkpoint, &device)?;
    log::info!(
        "Evaluating {} on {} batches of {}",
        checkpoint.display(),
        generator.len(),
        args.index.display()
    );
    let report = evaluate_range(
        &model,
        &generator,
        0..generator.len(),
        model_cfg.num_classes,
        &device,
    )?;
    report.log("Evaluation results");
    println!(
        "Eval complete: acc={:.4}, f1={:.4}, seizure_f1={:.4} (combined channels); acc={:.4} (single channel)",
        report.combined.accuracy(),
        report.combined.macro_f1(),
        report.combined.f1(1),
        report.single_channel.accuracy()
    );
    Ok(())
}
