//! Cutting recordings into sequences of overlapping windows.

use crate::recording::Recording;
use crate::types::{DatasetResult, EegDatasetError, GeneratorConfig, ICTAL, INTERICTAL};

/// Window geometry in samples.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowGeometry {
    pub window_samples: usize,
    pub shift_samples: usize,
    pub timesteps: usize,
}

impl WindowGeometry {
    pub fn from_config(cfg: &GeneratorConfig) -> DatasetResult<Self> {
        if cfg.timesteps == 0 {
            return Err(EegDatasetError::Config("timesteps must be positive".into()));
        }
        let sr = cfg.sampling_rate as f64;
        let window_samples = (cfg.window_length_s * sr).round();
        let shift_samples = (cfg.shift_s * sr).round();
        if window_samples.is_nan() || window_samples < 1.0 {
            return Err(EegDatasetError::Config(format!(
                "window of {}s at {} Hz covers no samples",
                cfg.window_length_s, cfg.sampling_rate
            )));
        }
        if shift_samples.is_nan() || shift_samples < 1.0 {
            return Err(EegDatasetError::Config(format!(
                "shift of {}s at {} Hz covers no samples",
                cfg.shift_s, cfg.sampling_rate
            )));
        }
        Ok(Self {
            window_samples: window_samples as usize,
            shift_samples: shift_samples as usize,
            timesteps: cfg.timesteps,
        })
    }

    /// Samples covered by one sequence.
    pub fn span(&self) -> usize {
        (self.timesteps - 1) * self.shift_samples + self.window_samples
    }

    /// Offset of the last window inside a sequence.
    pub fn last_window_offset(&self) -> usize {
        (self.timesteps - 1) * self.shift_samples
    }
}

/// A sequence start inside one recording.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SequenceRef {
    pub recording: usize,
    pub start: usize,
    pub label: u8,
}

/// Enumerate every sequence of every recording in chronological order.
///
/// A sequence is ictal when the midpoint of its last window falls inside an
/// annotated seizure.
pub fn build_sequences(recordings: &[Recording], geometry: WindowGeometry) -> Vec<SequenceRef> {
    let span = geometry.span();
    let mut out = Vec::new();
    for (rec_idx, rec) in recordings.iter().enumerate() {
        let samples = rec.samples();
        if samples < span {
            log::warn!(
                "recording {} shorter than one sequence ({} < {} samples); skipped",
                rec.header_path.display(),
                samples,
                span
            );
            continue;
        }
        let sr = rec.header.sampling_rate as f64;
        let mut start = 0usize;
        while start + span <= samples {
            let mid = start + geometry.last_window_offset() + geometry.window_samples / 2;
            let label = if rec.header.is_ictal_at(mid as f64 / sr) {
                ICTAL
            } else {
                INTERICTAL
            };
            out.push(SequenceRef {
                recording: rec_idx,
                start,
                label,
            });
            start += geometry.shift_samples;
        }
    }
    out
}

/// Standardise a window in place to zero mean and unit variance.
pub fn standardize(window: &mut [f32]) {
    if window.is_empty() {
        return;
    }
    let n = window.len() as f32;
    let mean = window.iter().sum::<f32>() / n;
    let var = window.iter().map(|v| (v - mean) * (v - mean)).sum::<f32>() / n;
    let std = var.max(1e-6).sqrt();
    for v in window.iter_mut() {
        *v = (*v - mean) / std;
    }
}
