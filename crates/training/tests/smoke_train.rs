use std::path::{Path, PathBuf};

use clap::Parser;
use data_contracts::SeizureInterval;
use eeg_dataset::{write_index, write_synthetic_recording, SynthRecordingSpec};
use training::{run_train_with_config, TrainArgs, TrainingConfig};

const SR: u32 = 64;

fn write_recordings(dir: &Path) -> (PathBuf, PathBuf) {
    let mut headers = Vec::new();
    for i in 0..3u64 {
        let spec = SynthRecordingSpec {
            patient_id: "chb01".into(),
            sampling_rate: SR,
            channels: 3,
            duration_s: 30.0,
            seizures: vec![SeizureInterval {
                start_s: 10.0,
                end_s: 18.0,
            }],
            seed: 7 + i,
        };
        headers.push(write_synthetic_recording(dir, &format!("chb01_{i:02}"), &spec).unwrap());
    }
    let train = dir.join("train.txt");
    let val = dir.join("val.txt");
    write_index(&train, &headers[..2]).unwrap();
    write_index(&val, &headers[2..]).unwrap();
    (train, val)
}

fn small_config(root: &Path) -> TrainingConfig {
    TrainingConfig {
        segments: 3,
        max_segments_in_history: 1,
        sampling_rate: SR,
        experiments_root: root.to_path_buf(),
        hidden: 8,
        ..TrainingConfig::default()
    }
}

fn args(extra: &[&str]) -> TrainArgs {
    let mut argv = vec![
        "train",
        "--id",
        "chb01",
        "--batch-size",
        "4",
        "--lr",
        "0.001",
        "--window-length",
        "0.5",
        "--shift",
        "0.5",
        "--timesteps",
        "2",
        "--seed",
        "3",
    ];
    argv.extend_from_slice(extra);
    TrainArgs::try_parse_from(argv).unwrap()
}

fn count_rows(path: &Path) -> usize {
    std::fs::read_to_string(path).unwrap().lines().count()
}

#[test]
fn trains_validates_and_resumes_on_synthetic_recordings() {
    let data = tempfile::tempdir().unwrap();
    let exps = tempfile::tempdir().unwrap();
    let (train, val) = write_recordings(data.path());
    let train = train.to_str().unwrap();
    let val = val.to_str().unwrap();

    let outcome = run_train_with_config(
        args(&["--index", train, "--index-val", val]),
        small_config(exps.path()),
    )
    .unwrap();

    let exp = &outcome.experiment;
    let name = exp.root.file_name().unwrap().to_str().unwrap().to_string();
    assert!(name.starts_with("detection_recurrent_chb01_lstm_adam_0.001_"), "{name}");

    // header + segments 0 and 1; the last segment has nothing after it to validate on
    assert_eq!(count_rows(&exp.metrics_log_path()), 3);
    let header = std::fs::read_to_string(exp.metrics_log_path()).unwrap();
    assert!(header.starts_with("segment,train_acc,train_loss,val_acc,val_loss,val_f1score,"));
    for row in header.lines().skip(1) {
        let cols: Vec<f64> = row.split(',').map(|v| v.parse().unwrap()).collect();
        assert_eq!(cols.len(), 8);
        let (train_loss, val_loss) = (cols[2], cols[4]);
        assert!(train_loss.is_finite() && train_loss > 0.0, "{row}");
        assert!(val_loss.is_finite() && val_loss > 0.0, "{row}");
    }

    assert!(exp.last_model_path("lstm").exists());
    assert!(exp.last_optim_path("lstm").exists());
    let best = std::fs::read_dir(&exp.models)
        .unwrap()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_name().to_string_lossy().starts_with("lstm_best_epoch_"))
        .count();
    assert!(best >= 1);

    let state = exp.load_state().unwrap().unwrap();
    assert_eq!(state.epoch, 1);
    assert_eq!(state.next_segment, 0);
    assert_eq!(state.scores.len(), 2);
    assert_eq!(state.optimizer, "adam");
    let summary = outcome.summary.unwrap();
    assert_eq!(summary.validated_segments, 2);
    assert!((0.0..=1.0).contains(&summary.mean_accuracy));

    // 59 sequences per 30 s recording -> 14 chronological batches of 4
    let held_out = outcome.held_out.unwrap();
    assert_eq!(held_out.combined.total(), 56);
    assert_eq!(held_out.channel_predictions, 14 * 3);

    let root = exp.root.to_str().unwrap().to_string();
    let resumed = run_train_with_config(
        args(&["--index", train, "--resume", &root, "--epochs", "2"]),
        small_config(exps.path()),
    )
    .unwrap();
    assert_eq!(resumed.experiment.root, exp.root);
    assert_eq!(count_rows(&exp.metrics_log_path()), 5);
    let state = resumed.state;
    assert_eq!(state.epoch, 2);
    assert_eq!(state.scores.len(), 4);
    assert_eq!(state.scores[3].epoch, 1);
    assert!(resumed.held_out.is_none());
}

#[test]
fn gru_with_sgd_runs_a_single_epoch() {
    let data = tempfile::tempdir().unwrap();
    let exps = tempfile::tempdir().unwrap();
    let (train, _) = write_recordings(data.path());
    let outcome = run_train_with_config(
        args(&[
            "--index",
            train.to_str().unwrap(),
            "--model",
            "gru",
            "--opt",
            "sgd",
        ]),
        small_config(exps.path()),
    )
    .unwrap();
    assert!(outcome.experiment.last_model_path("gru").exists());
    let cfg = outcome.experiment.load_model_config().unwrap();
    assert_eq!(cfg.kind, training::CellKind::Gru);
    assert_eq!(cfg.input_size, 32);
    assert_eq!(outcome.state.optimizer, "sgd");
}

#[test]
fn resume_without_models_dir_fails() {
    let data = tempfile::tempdir().unwrap();
    let exps = tempfile::tempdir().unwrap();
    let (train, _) = write_recordings(data.path());
    let missing = exps.path().join("nope");
    let err = run_train_with_config(
        args(&[
            "--index",
            train.to_str().unwrap(),
            "--resume",
            missing.to_str().unwrap(),
        ]),
        small_config(exps.path()),
    )
    .unwrap_err();
    assert!(err.to_string().contains("Last model not found"), "{err}");
}

#[test]
fn too_many_segments_for_the_data_is_rejected() {
    let data = tempfile::tempdir().unwrap();
    let exps = tempfile::tempdir().unwrap();
    let (train, _) = write_recordings(data.path());
    let cfg = TrainingConfig {
        segments: 1000,
        ..small_config(exps.path())
    };
    assert!(run_train_with_config(args(&["--index", train.to_str().unwrap()]), cfg).is_err());
}
