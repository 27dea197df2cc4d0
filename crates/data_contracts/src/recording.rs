use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum SignalDType {
    #[default]
    F32,
}

impl SignalDType {
    pub fn size_bytes(&self) -> usize {
        match self {
            SignalDType::F32 => 4,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum Endianness {
    #[default]
    Little,
    Big,
}

/// Annotated seizure, in seconds from the start of the recording.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct SeizureInterval {
    pub start_s: f64,
    pub end_s: f64,
}

impl SeizureInterval {
    /// Half-open membership test: `[start_s, end_s)`.
    pub fn contains(&self, t: f64) -> bool {
        t >= self.start_s && t < self.end_s
    }
}

/// JSON sidecar describing one raw EEG signal file.
///
/// The signal file holds `samples * channels.len()` values laid out
/// sample-major: every channel of sample 0, then every channel of sample 1.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordingHeader {
    pub patient_id: String,
    pub sampling_rate: u32,
    pub channels: Vec<String>,
    pub samples: usize,
    /// Signal file name, relative to the header's directory.
    pub signal_file: String,
    #[serde(default)]
    pub dtype: SignalDType,
    #[serde(default)]
    pub endianness: Endianness,
    #[serde(default)]
    pub seizures: Vec<SeizureInterval>,
}

#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("sampling_rate must be positive")]
    ZeroSamplingRate,
    #[error("recording has no channels")]
    NoChannels,
    #[error("missing signal file name")]
    MissingSignalFile,
    #[error("seizure interval {index} invalid: [{start_s}, {end_s})")]
    InvalidSeizure {
        index: usize,
        start_s: f64,
        end_s: f64,
    },
    #[error("seizure interval {index} ends at {end_s}s past recording end {duration_s}s")]
    SeizurePastEnd {
        index: usize,
        end_s: f64,
        duration_s: f64,
    },
}

impl RecordingHeader {
    pub fn duration_s(&self) -> f64 {
        if self.sampling_rate == 0 {
            return 0.0;
        }
        self.samples as f64 / self.sampling_rate as f64
    }

    /// Expected byte length of the signal file.
    pub fn signal_len_bytes(&self) -> usize {
        self.samples * self.channels.len() * self.dtype.size_bytes()
    }

    pub fn is_ictal_at(&self, t: f64) -> bool {
        self.seizures.iter().any(|s| s.contains(t))
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.sampling_rate == 0 {
            return Err(ValidationError::ZeroSamplingRate);
        }
        if self.channels.is_empty() {
            return Err(ValidationError::NoChannels);
        }
        if self.signal_file.trim().is_empty() {
            return Err(ValidationError::MissingSignalFile);
        }
        let duration_s = self.duration_s();
        for (index, s) in self.seizures.iter().enumerate() {
            if s.start_s.is_nan() || s.end_s.is_nan() || s.start_s < 0.0 || s.start_s > s.end_s {
                return Err(ValidationError::InvalidSeizure {
                    index,
                    start_s: s.start_s,
                    end_s: s.end_s,
                });
            }
            if s.end_s > duration_s {
                return Err(ValidationError::SeizurePastEnd {
                    index,
                    end_s: s.end_s,
                    duration_s,
                });
            }
        }
        Ok(())
    }
}
