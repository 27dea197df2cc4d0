use data_contracts::{Endianness, RecordingHeader, SeizureInterval};
use eeg_dataset::{
    read_index, write_index, write_synthetic_recording, EegDatasetError, GeneratorConfig,
    Recording, RecurrentBatchGenerator, SynthRecordingSpec, ICTAL, INTERICTAL,
};
use std::fs;
use std::path::{Path, PathBuf};

type TestBackend = burn_ndarray::NdArray<f32>;

fn spec() -> SynthRecordingSpec {
    SynthRecordingSpec {
        patient_id: "chb01".into(),
        sampling_rate: 64,
        channels: 3,
        duration_s: 60.0,
        seizures: vec![SeizureInterval {
            start_s: 20.0,
            end_s: 30.0,
        }],
        seed: 7,
    }
}

fn cfg(batch_size: usize) -> GeneratorConfig {
    GeneratorConfig {
        window_length_s: 1.0,
        shift_s: 0.5,
        timesteps: 3,
        sampling_rate: 64,
        batch_size,
        patient_id: Some("chb01".into()),
        ..Default::default()
    }
}

fn one_recording(dir: &Path) -> anyhow::Result<Vec<PathBuf>> {
    Ok(vec![write_synthetic_recording(dir, "chb01_01", &spec())?])
}

#[test]
fn sequences_are_labelled_by_last_window_midpoint() {
    let tmp = tempfile::tempdir().unwrap();
    let headers = one_recording(tmp.path()).unwrap();
    let gen = RecurrentBatchGenerator::from_header_paths(&headers, cfg(8)).unwrap();

    // span = 2 * 32 + 64 = 128 samples; (3840 - 128) / 32 + 1 starts.
    assert_eq!(gen.sequences().len(), 117);
    let ictal: Vec<usize> = gen
        .sequences()
        .iter()
        .filter(|s| s.label == ICTAL)
        .map(|s| s.start)
        .collect();
    assert_eq!(ictal.len(), 20);
    assert_eq!(ictal.first().copied(), Some(37 * 32));
    assert_eq!(ictal.last().copied(), Some(56 * 32));
    assert_eq!(gen.len(), 117 / 8);
    assert_eq!(gen.channels(), 3);
    assert_eq!(gen.input_shape(), (3, 64));
}

#[test]
fn chronological_batches_in_evaluation_mode() {
    let tmp = tempfile::tempdir().unwrap();
    let headers = one_recording(tmp.path()).unwrap();
    let gen = RecurrentBatchGenerator::from_header_paths(&headers, cfg(8)).unwrap();

    let first = gen.get(0).unwrap();
    assert_eq!(first.dims(), [8, 3, 64, 3]);
    assert_eq!(first.x.len(), 8 * 3 * 64 * 3);
    assert!(first.y.iter().all(|&l| l == INTERICTAL));

    // Sequence 37 is the first ictal one: batch 4, slot 5.
    let fifth = gen.get(4).unwrap();
    assert_eq!(fifth.y[4], INTERICTAL);
    assert_eq!(fifth.y[5], ICTAL);
}

#[test]
fn balanced_batches_alternate_classes() {
    let tmp = tempfile::tempdir().unwrap();
    let headers = one_recording(tmp.path()).unwrap();
    let config = GeneratorConfig {
        in_training_mode: true,
        balance_batches: true,
        seed: Some(3),
        ..cfg(8)
    };
    let mut gen = RecurrentBatchGenerator::from_header_paths(&headers, config).unwrap();
    for i in 0..gen.len() {
        let batch = gen.get(i).unwrap();
        assert_eq!(batch.y, vec![1, 0, 1, 0, 1, 0, 1, 0]);
    }
    gen.shuffle_data();
    let batch = gen.get(0).unwrap();
    assert_eq!(batch.y.iter().filter(|&&l| l == ICTAL).count(), 4);
}

#[test]
fn out_of_range_batch_is_an_error() {
    let tmp = tempfile::tempdir().unwrap();
    let headers = one_recording(tmp.path()).unwrap();
    let gen = RecurrentBatchGenerator::from_header_paths(&headers, cfg(8)).unwrap();
    let err = gen.get(gen.len()).unwrap_err();
    assert!(matches!(err, EegDatasetError::IndexOutOfRange { .. }));
}

#[test]
fn windows_are_standardised_per_channel() {
    let tmp = tempfile::tempdir().unwrap();
    let headers = one_recording(tmp.path()).unwrap();
    let gen = RecurrentBatchGenerator::from_header_paths(&headers, cfg(4)).unwrap();
    let batch = gen.get(0).unwrap();
    let ch = batch.channel_slice(1);
    for window in ch.chunks(64) {
        let mean = window.iter().sum::<f32>() / 64.0;
        assert!(mean.abs() < 1e-3, "window mean {mean}");
    }
}

#[test]
fn channel_tensor_has_per_channel_shape() {
    let tmp = tempfile::tempdir().unwrap();
    let headers = one_recording(tmp.path()).unwrap();
    let gen = RecurrentBatchGenerator::from_header_paths(&headers, cfg(4)).unwrap();
    let batch = gen.get(0).unwrap();
    let device = Default::default();
    let x = batch.channel_tensor::<TestBackend>(2, &device);
    assert_eq!(x.dims(), [4, 3, 64]);
    let y = batch.targets::<TestBackend>(&device);
    assert_eq!(y.dims(), [4]);
}

#[test]
fn other_patient_rejected() {
    let tmp = tempfile::tempdir().unwrap();
    let headers = one_recording(tmp.path()).unwrap();
    let config = GeneratorConfig {
        patient_id: Some("chb02".into()),
        ..cfg(8)
    };
    let err = RecurrentBatchGenerator::from_header_paths(&headers, config).unwrap_err();
    assert!(matches!(err, EegDatasetError::PatientMismatch { .. }));
}

#[test]
fn sampling_rate_mismatch_rejected() {
    let tmp = tempfile::tempdir().unwrap();
    let headers = one_recording(tmp.path()).unwrap();
    let config = GeneratorConfig {
        sampling_rate: 256,
        ..cfg(8)
    };
    let err = RecurrentBatchGenerator::from_header_paths(&headers, config).unwrap_err();
    assert!(matches!(err, EegDatasetError::SamplingRateMismatch { .. }));
}

#[test]
fn truncated_signal_rejected() {
    let tmp = tempfile::tempdir().unwrap();
    let headers = one_recording(tmp.path()).unwrap();
    let signal = tmp.path().join("chb01_01.f32");
    let bytes = fs::read(&signal).unwrap();
    fs::write(&signal, &bytes[..bytes.len() / 2]).unwrap();
    let err = RecurrentBatchGenerator::from_header_paths(&headers, cfg(8)).unwrap_err();
    assert!(matches!(err, EegDatasetError::ShortSignal { .. }));
}

#[test]
fn index_file_resolves_relative_entries() {
    let tmp = tempfile::tempdir().unwrap();
    let rec_dir = tmp.path().join("recordings");
    let h1 = write_synthetic_recording(&rec_dir, "chb01_01", &spec()).unwrap();
    let h2 = write_synthetic_recording(
        &rec_dir,
        "chb01_02",
        &SynthRecordingSpec {
            seizures: Vec::new(),
            seed: 8,
            ..spec()
        },
    )
    .unwrap();
    let index = tmp.path().join("train.txt");
    write_index(&index, &[h1.clone(), h2.clone()]).unwrap();
    let mut raw = fs::read_to_string(&index).unwrap();
    raw.insert_str(0, "# training recordings\n\n");
    fs::write(&index, raw).unwrap();

    let entries = read_index(&index).unwrap();
    assert_eq!(entries, vec![h1, h2]);

    let gen = RecurrentBatchGenerator::from_index_files(&[index], cfg(8)).unwrap();
    assert_eq!(gen.sequences().len(), 2 * 117);
    assert_eq!(
        gen.sequences().iter().filter(|s| s.label == ICTAL).count(),
        20
    );
}

#[test]
fn recording_shorter_than_a_sequence_yields_empty_error() {
    let tmp = tempfile::tempdir().unwrap();
    let header = write_synthetic_recording(
        tmp.path(),
        "short",
        &SynthRecordingSpec {
            duration_s: 1.0,
            seizures: Vec::new(),
            ..spec()
        },
    )
    .unwrap();
    let err = RecurrentBatchGenerator::from_header_paths(&[header], cfg(8)).unwrap_err();
    assert!(matches!(err, EegDatasetError::Empty(_)));
}

#[test]
fn balancing_falls_back_when_a_class_is_missing() {
    let tmp = tempfile::tempdir().unwrap();
    let header = write_synthetic_recording(
        tmp.path(),
        "interictal_only",
        &SynthRecordingSpec {
            seizures: Vec::new(),
            ..spec()
        },
    )
    .unwrap();
    let config = GeneratorConfig {
        in_training_mode: true,
        balance_batches: true,
        seed: Some(5),
        ..cfg(8)
    };
    let gen = RecurrentBatchGenerator::from_header_paths(&[header], config).unwrap();
    assert!(!gen.is_empty());
    assert_eq!(gen.len(), 117 / 8);
    for i in 0..gen.len() {
        let batch = gen.get(i).unwrap();
        assert_eq!(batch.batch, 8);
        assert!(batch.y.iter().all(|&l| l == INTERICTAL));
    }
    let shown = format!("{gen:?}");
    assert!(shown.starts_with("RecurrentBatchGenerator"), "{shown}");
}

#[test]
fn big_endian_signal_reads_the_same_values() {
    let tmp = tempfile::tempdir().unwrap();
    let little = write_synthetic_recording(tmp.path(), "chb01_01", &spec()).unwrap();

    let mut header: RecordingHeader =
        serde_json::from_slice(&fs::read(&little).unwrap()).unwrap();
    let le_bytes = fs::read(tmp.path().join(&header.signal_file)).unwrap();
    let be_bytes: Vec<u8> = le_bytes
        .chunks_exact(4)
        .flat_map(|c| [c[3], c[2], c[1], c[0]])
        .collect();
    header.endianness = Endianness::Big;
    header.signal_file = "chb01_01_be.f32".into();
    fs::write(tmp.path().join(&header.signal_file), be_bytes).unwrap();
    let big = tmp.path().join("chb01_01_be.json");
    fs::write(&big, serde_json::to_vec(&header).unwrap()).unwrap();

    let le = Recording::open(&little).unwrap();
    let be = Recording::open(&big).unwrap();
    assert_eq!(be.header.endianness, Endianness::Big);
    for (sample, channel) in [(0, 0), (17, 1), (1000, 2), (3839, 2)] {
        assert_eq!(le.value(sample, channel), be.value(sample, channel));
    }
    let (mut a, mut b) = (Vec::new(), Vec::new());
    le.read_channel(1, 640, 64, &mut a);
    be.read_channel(1, 640, 64, &mut b);
    assert_eq!(a, b);
}

#[test]
fn channel_count_must_match_across_recordings() {
    let tmp = tempfile::tempdir().unwrap();
    let first = write_synthetic_recording(tmp.path(), "chb01_01", &spec()).unwrap();
    let second = write_synthetic_recording(
        tmp.path(),
        "chb01_02",
        &SynthRecordingSpec {
            channels: 2,
            seed: 9,
            ..spec()
        },
    )
    .unwrap();
    let err = RecurrentBatchGenerator::from_header_paths(&[first, second], cfg(8)).unwrap_err();
    assert!(matches!(
        err,
        EegDatasetError::ChannelMismatch {
            expected: 3,
            found: 2,
            ..
        }
    ));
}
