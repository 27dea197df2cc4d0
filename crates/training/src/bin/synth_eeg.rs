use std::path::PathBuf;

use clap::Parser;
use data_contracts::SeizureInterval;
use eeg_dataset::{write_index, write_synthetic_recording, SynthRecordingSpec};

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Write synthetic EEG recordings and train/val index files for smoke runs"
)]
struct Args {
    /// Output directory for recordings and index files.
    #[arg(long, default_value = "synthetic_eeg")]
    output_root: PathBuf,
    #[arg(long, default_value = "chb01")]
    id: String,
    /// Number of training recordings (one extra recording is written for validation).
    #[arg(long, default_value_t = 3)]
    recordings: usize,
    #[arg(long, default_value_t = 256)]
    sampling_rate: u32,
    #[arg(long, default_value_t = 23)]
    channels: usize,
    /// Recording length in seconds.
    #[arg(long, default_value_t = 120.0)]
    duration: f64,
    /// Seizure length in seconds, placed in the middle of each recording.
    #[arg(long, default_value_t = 20.0)]
    seizure: f64,
    #[arg(long, default_value_t = 0)]
    seed: u64,
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();
    if args.seizure >= args.duration {
        anyhow::bail!("seizure ({}s) must be shorter than the recording ({}s)", args.seizure, args.duration);
    }
    let start = (args.duration - args.seizure) / 2.0;
    let recordings_dir = args.output_root.join(&args.id);

    let mut headers = Vec::with_capacity(args.recordings + 1);
    for i in 0..=args.recordings {
        let spec = SynthRecordingSpec {
            patient_id: args.id.clone(),
            sampling_rate: args.sampling_rate,
            channels: args.channels,
            duration_s: args.duration,
            seizures: vec![SeizureInterval {
                start_s: start,
                end_s: start + args.seizure,
            }],
            seed: args.seed.wrapping_add(i as u64),
        };
        let name = format!("{}_{:02}", args.id, i + 1);
        headers.push(write_synthetic_recording(&recordings_dir, &name, &spec)?);
    }

    let (train, val) = headers.split_at(args.recordings);
    let train_index = args.output_root.join(format!("{}_train.txt", args.id));
    let val_index = args.output_root.join(format!("{}_val.txt", args.id));
    write_index(&train_index, train)?;
    write_index(&val_index, val)?;
    log::info!(
        "wrote {} recordings under {}; indexes {} and {}",
        headers.len(),
        recordings_dir.display(),
        train_index.display(),
        val_index.display()
    );
    Ok(())
}
