//! Synthetic EEG recordings for smoke tests and demos.

use crate::types::{DatasetResult, EegDatasetError};
use data_contracts::{Endianness, RecordingHeader, SeizureInterval, SignalDType};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::f32::consts::PI;
use std::fs;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

/// Parameters of a synthetic recording.
#[derive(Debug, Clone)]
pub struct SynthRecordingSpec {
    pub patient_id: String,
    pub sampling_rate: u32,
    pub channels: usize,
    pub duration_s: f64,
    pub seizures: Vec<SeizureInterval>,
    pub seed: u64,
}

impl Default for SynthRecordingSpec {
    fn default() -> Self {
        Self {
            patient_id: "chb01".into(),
            sampling_rate: 256,
            channels: 23,
            duration_s: 60.0,
            seizures: Vec::new(),
            seed: 42,
        }
    }
}

/// Write `<name>.json` and `<name>.f32` under `dir`; returns the header path.
///
/// Background activity is low-amplitude noise with a 10 Hz component.
/// Ictal stretches add a 3 Hz high-amplitude rhythm on every channel.
pub fn write_synthetic_recording(
    dir: &Path,
    name: &str,
    spec: &SynthRecordingSpec,
) -> DatasetResult<PathBuf> {
    fs::create_dir_all(dir).map_err(|e| EegDatasetError::Io {
        path: dir.to_path_buf(),
        source: e,
    })?;
    let samples = (spec.duration_s * spec.sampling_rate as f64).round() as usize;
    let header = RecordingHeader {
        patient_id: spec.patient_id.clone(),
        sampling_rate: spec.sampling_rate,
        channels: (0..spec.channels).map(|c| format!("CH{c:02}")).collect(),
        samples,
        signal_file: format!("{name}.f32"),
        dtype: SignalDType::F32,
        endianness: Endianness::Little,
        seizures: spec.seizures.clone(),
    };
    let header_path = dir.join(format!("{name}.json"));
    header.validate().map_err(|e| EegDatasetError::Validation {
        path: header_path.clone(),
        source: e,
    })?;

    let signal_path = dir.join(&header.signal_file);
    let file = fs::File::create(&signal_path).map_err(|e| EegDatasetError::Io {
        path: signal_path.clone(),
        source: e,
    })?;
    let mut w = BufWriter::new(file);
    let mut rng = StdRng::seed_from_u64(spec.seed);
    let phases: Vec<f32> = (0..spec.channels).map(|_| rng.gen::<f32>() * 2.0 * PI).collect();
    let sr = spec.sampling_rate as f32;
    for s in 0..samples {
        let t = s as f32 / sr;
        let ictal = header.is_ictal_at(s as f64 / spec.sampling_rate as f64);
        for phase in &phases {
            let mut v = 0.3 * (2.0 * PI * 10.0 * t + phase).sin() + (rng.gen::<f32>() - 0.5);
            if ictal {
                v += 4.0 * (2.0 * PI * 3.0 * t + phase).sin();
            }
            w.write_all(&v.to_le_bytes())
                .map_err(|e| EegDatasetError::Io {
                    path: signal_path.clone(),
                    source: e,
                })?;
        }
    }
    w.flush().map_err(|e| EegDatasetError::Io {
        path: signal_path.clone(),
        source: e,
    })?;

    let json = serde_json::to_vec_pretty(&header).map_err(|e| EegDatasetError::Json {
        path: header_path.clone(),
        source: e,
    })?;
    fs::write(&header_path, json).map_err(|e| EegDatasetError::Io {
        path: header_path.clone(),
        source: e,
    })?;
    Ok(header_path)
}

/// Write an index file listing `headers`, relative to the index directory when possible.
pub fn write_index(path: &Path, headers: &[PathBuf]) -> DatasetResult<()> {
    let base = path.parent().unwrap_or_else(|| Path::new("."));
    let mut body = String::new();
    for h in headers {
        let entry = h.strip_prefix(base).unwrap_or(h);
        body.push_str(&entry.display().to_string());
        body.push('\n');
    }
    fs::write(path, body).map_err(|e| EegDatasetError::Io {
        path: path.to_path_buf(),
        source: e,
    })
}
