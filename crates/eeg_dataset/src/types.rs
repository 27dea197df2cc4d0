//! Core types, error definitions, and configuration for eeg_dataset.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

pub type DatasetResult<T> = Result<T, EegDatasetError>;

#[derive(Debug, Error)]
pub enum EegDatasetError {
    #[error("io error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("json parse error at {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("recording header invalid at {path}: {source}")]
    Validation {
        path: PathBuf,
        #[source]
        source: data_contracts::ValidationError,
    },
    #[error("recording {path} belongs to patient {found}, expected {expected}")]
    PatientMismatch {
        path: PathBuf,
        expected: String,
        found: String,
    },
    #[error("recording {path} sampled at {found} Hz, expected {expected} Hz")]
    SamplingRateMismatch {
        path: PathBuf,
        expected: u32,
        found: u32,
    },
    #[error("recording {path} has {found} channels, expected {expected}")]
    ChannelMismatch {
        path: PathBuf,
        expected: usize,
        found: usize,
    },
    #[error("signal file {path} holds {found} bytes, header requires {expected}")]
    ShortSignal {
        path: PathBuf,
        expected: usize,
        found: usize,
    },
    #[error("no sequences available: {0}")]
    Empty(String),
    #[error("batch index {index} out of range (len {len})")]
    IndexOutOfRange { index: usize, len: usize },
    #[error("invalid generator config: {0}")]
    Config(String),
}

/// Windowing and batching parameters of the recurrent generator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneratorConfig {
    /// Window length in seconds.
    pub window_length_s: f64,
    /// Shift between consecutive windows in seconds.
    pub shift_s: f64,
    /// Windows per sequence.
    pub timesteps: usize,
    /// Expected sampling rate in Hz.
    pub sampling_rate: u32,
    pub batch_size: usize,
    pub in_training_mode: bool,
    /// Alternate ictal/interictal sequences inside each batch (training only).
    pub balance_batches: bool,
    /// When set, recordings of any other patient are rejected.
    pub patient_id: Option<String>,
    /// Standardise every window per channel.
    pub normalize: bool,
    /// Seed for the training-mode shuffle; entropy when unset.
    pub seed: Option<u64>,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            window_length_s: 1.0,
            shift_s: 0.5,
            timesteps: 19,
            sampling_rate: 256,
            batch_size: 64,
            in_training_mode: false,
            balance_batches: false,
            patient_id: None,
            normalize: true,
            seed: None,
        }
    }
}

/// Sequence label: ictal (seizure) or interictal.
pub const INTERICTAL: u8 = 0;
pub const ICTAL: u8 = 1;

/// One batch of sequences.
///
/// `x` has logical shape `[batch, timesteps, window_samples, channels]`
/// stored row-major; `y` holds one label per sequence.
#[derive(Debug, Clone)]
pub struct EegBatch {
    pub x: Vec<f32>,
    pub y: Vec<u8>,
    pub batch: usize,
    pub timesteps: usize,
    pub window_samples: usize,
    pub channels: usize,
}

impl EegBatch {
    pub fn dims(&self) -> [usize; 4] {
        [self.batch, self.timesteps, self.window_samples, self.channels]
    }

    /// Values of one channel, shape `[batch, timesteps, window_samples]`.
    pub fn channel_slice(&self, channel: usize) -> Vec<f32> {
        let rows = self.batch * self.timesteps * self.window_samples;
        let mut out = Vec::with_capacity(rows);
        for row in 0..rows {
            out.push(self.x[row * self.channels + channel]);
        }
        out
    }

    /// One-hot targets, shape `[batch, num_classes]`.
    pub fn one_hot(&self, num_classes: usize) -> Vec<f32> {
        let mut out = vec![0.0f32; self.batch * num_classes];
        for (i, &label) in self.y.iter().enumerate() {
            let class = label as usize;
            if class < num_classes {
                out[i * num_classes + class] = 1.0;
            }
        }
        out
    }
}

#[cfg(feature = "burn-runtime")]
impl EegBatch {
    /// Channel input as a `[batch, timesteps, window_samples]` tensor.
    pub fn channel_tensor<B: burn::tensor::backend::Backend>(
        &self,
        channel: usize,
        device: &B::Device,
    ) -> burn::tensor::Tensor<B, 3> {
        burn::tensor::Tensor::<B, 3>::from_data(
            burn::tensor::TensorData::new(
                self.channel_slice(channel),
                [self.batch, self.timesteps, self.window_samples],
            ),
            device,
        )
    }

    /// Class indices as an int tensor of shape `[batch]`.
    pub fn targets<B: burn::tensor::backend::Backend>(
        &self,
        device: &B::Device,
    ) -> burn::tensor::Tensor<B, 1, burn::tensor::Int> {
        let labels: Vec<i64> = self.y.iter().map(|&v| v as i64).collect();
        burn::tensor::Tensor::<B, 1, burn::tensor::Int>::from_data(
            burn::tensor::TensorData::new(labels, [self.batch]),
            device,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn channel_slice_picks_strided_values() {
        // batch 1, timesteps 1, window 2, channels 3
        let batch = EegBatch {
            x: vec![0.0, 1.0, 2.0, 10.0, 11.0, 12.0],
            y: vec![ICTAL],
            batch: 1,
            timesteps: 1,
            window_samples: 2,
            channels: 3,
        };
        assert_eq!(batch.channel_slice(0), vec![0.0, 10.0]);
        assert_eq!(batch.channel_slice(2), vec![2.0, 12.0]);
        assert_eq!(batch.one_hot(2), vec![0.0, 1.0]);
    }
}
