//! Recurrent batch generator over indexed EEG recordings.

use crate::recording::{read_index, Recording};
use crate::types::{DatasetResult, EegBatch, EegDatasetError, GeneratorConfig, ICTAL};
use crate::windows::{build_sequences, standardize, SequenceRef, WindowGeometry};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use std::path::{Path, PathBuf};

/// Indexable source of `[batch, timesteps, window_samples, channels]` batches.
///
/// Batches are addressed by position so that a training schedule can walk
/// arbitrary contiguous ranges of them.
pub struct RecurrentBatchGenerator {
    cfg: GeneratorConfig,
    geometry: WindowGeometry,
    recordings: Vec<Recording>,
    sequences: Vec<SequenceRef>,
    order: Vec<usize>,
    ictal: Vec<usize>,
    interictal: Vec<usize>,
    channels: usize,
    rng: StdRng,
}

impl std::fmt::Debug for RecurrentBatchGenerator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecurrentBatchGenerator")
            .field("cfg", &self.cfg)
            .field("geometry", &self.geometry)
            .field("recordings", &self.recordings.len())
            .field("sequences", &self.sequences.len())
            .field("ictal", &self.ictal.len())
            .field("interictal", &self.interictal.len())
            .field("channels", &self.channels)
            .finish()
    }
}

impl RecurrentBatchGenerator {
    /// Build a generator from one or more index files.
    pub fn from_index_files(index_files: &[PathBuf], cfg: GeneratorConfig) -> DatasetResult<Self> {
        let mut headers = Vec::new();
        for index in index_files {
            headers.extend(read_index(index)?);
        }
        Self::from_header_paths(&headers, cfg)
    }

    pub fn from_header_paths(header_paths: &[PathBuf], cfg: GeneratorConfig) -> DatasetResult<Self> {
        if cfg.batch_size == 0 {
            return Err(EegDatasetError::Config("batch_size must be positive".into()));
        }
        let geometry = WindowGeometry::from_config(&cfg)?;
        let mut recordings = Vec::with_capacity(header_paths.len());
        let mut channels: Option<usize> = None;
        for path in header_paths {
            let rec = Recording::open(path)?;
            check_recording(&rec, path, &cfg, &mut channels)?;
            recordings.push(rec);
        }
        let channels = channels
            .ok_or_else(|| EegDatasetError::Empty("index lists no recordings".into()))?;

        let sequences = build_sequences(&recordings, geometry);
        if sequences.is_empty() {
            return Err(EegDatasetError::Empty(format!(
                "no recording is long enough for a {}-sample sequence",
                geometry.span()
            )));
        }

        let rng = match cfg.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let mut gen = Self {
            cfg,
            geometry,
            recordings,
            order: (0..sequences.len()).collect(),
            sequences,
            ictal: Vec::new(),
            interictal: Vec::new(),
            channels,
            rng,
        };
        if gen.cfg.in_training_mode {
            gen.order.shuffle(&mut gen.rng);
        }
        gen.rebuild_class_lists();

        log::info!(
            "generator ready: {} recordings, {} sequences ({} ictal / {} interictal), {} batches of {}",
            gen.recordings.len(),
            gen.sequences.len(),
            gen.ictal.len(),
            gen.interictal.len(),
            gen.len(),
            gen.cfg.batch_size
        );
        if gen.balancing() {
            log::info!("batches balanced between ictal and interictal sequences");
        } else if gen.cfg.balance_batches && gen.cfg.in_training_mode {
            log::warn!("cannot balance batches: one class has no sequences");
        }
        Ok(gen)
    }

    /// Number of batches.
    pub fn len(&self) -> usize {
        (self.sequences.len() / self.cfg.batch_size).max(1)
    }

    /// Always false: construction fails when no sequence fits.
    pub fn is_empty(&self) -> bool {
        self.sequences.is_empty()
    }

    pub fn channels(&self) -> usize {
        self.channels
    }

    pub fn geometry(&self) -> WindowGeometry {
        self.geometry
    }

    pub fn config(&self) -> &GeneratorConfig {
        &self.cfg
    }

    /// Per-channel model input shape: `(timesteps, window_samples)`.
    pub fn input_shape(&self) -> (usize, usize) {
        (self.geometry.timesteps, self.geometry.window_samples)
    }

    pub fn sequences(&self) -> &[SequenceRef] {
        &self.sequences
    }

    /// Reshuffle sequence order.
    pub fn shuffle_data(&mut self) {
        self.order.shuffle(&mut self.rng);
        self.rebuild_class_lists();
    }

    /// Assemble batch `index`.
    pub fn get(&self, index: usize) -> DatasetResult<EegBatch> {
        let len = self.len();
        if index >= len {
            return Err(EegDatasetError::IndexOutOfRange { index, len });
        }
        let picks = self.batch_members(index);
        Ok(self.assemble(&picks))
    }

    fn balancing(&self) -> bool {
        self.cfg.in_training_mode
            && self.cfg.balance_batches
            && !self.ictal.is_empty()
            && !self.interictal.is_empty()
    }

    fn rebuild_class_lists(&mut self) {
        let (ictal, interictal): (Vec<usize>, Vec<usize>) = self
            .order
            .iter()
            .copied()
            .partition(|&i| self.sequences[i].label == ICTAL);
        self.ictal = ictal;
        self.interictal = interictal;
    }

    fn batch_members(&self, index: usize) -> Vec<usize> {
        let bs = self.cfg.batch_size;
        if self.balancing() {
            let half = bs.div_ceil(2);
            (0..bs)
                .map(|k| {
                    let pos = index * half + k / 2;
                    if k % 2 == 0 {
                        self.ictal[pos % self.ictal.len()]
                    } else {
                        self.interictal[pos % self.interictal.len()]
                    }
                })
                .collect()
        } else {
            let start = index * bs;
            let end = (start + bs).min(self.order.len());
            self.order[start..end].to_vec()
        }
    }

    fn assemble(&self, picks: &[usize]) -> EegBatch {
        let g = self.geometry;
        let channels = self.channels;
        let batch = picks.len();
        let mut x = vec![0.0f32; batch * g.timesteps * g.window_samples * channels];
        let mut y = Vec::with_capacity(batch);
        let mut window = Vec::with_capacity(g.window_samples);
        for (b, &seq_idx) in picks.iter().enumerate() {
            let seq = self.sequences[seq_idx];
            let rec = &self.recordings[seq.recording];
            for t in 0..g.timesteps {
                let win_start = seq.start + t * g.shift_samples;
                for c in 0..channels {
                    rec.read_channel(c, win_start, g.window_samples, &mut window);
                    if self.cfg.normalize {
                        standardize(&mut window);
                    }
                    let base = (b * g.timesteps + t) * g.window_samples;
                    for (s, v) in window.iter().enumerate() {
                        x[(base + s) * channels + c] = *v;
                    }
                }
            }
            y.push(seq.label);
        }
        EegBatch {
            x,
            y,
            batch,
            timesteps: g.timesteps,
            window_samples: g.window_samples,
            channels,
        }
    }
}

fn check_recording(
    rec: &Recording,
    path: &Path,
    cfg: &GeneratorConfig,
    channels: &mut Option<usize>,
) -> DatasetResult<()> {
    if let Some(expected) = &cfg.patient_id {
        if &rec.header.patient_id != expected {
            return Err(EegDatasetError::PatientMismatch {
                path: path.to_path_buf(),
                expected: expected.clone(),
                found: rec.header.patient_id.clone(),
            });
        }
    }
    if rec.header.sampling_rate != cfg.sampling_rate {
        return Err(EegDatasetError::SamplingRateMismatch {
            path: path.to_path_buf(),
            expected: cfg.sampling_rate,
            found: rec.header.sampling_rate,
        });
    }
    match channels {
        Some(expected) if *expected != rec.channels() => Err(EegDatasetError::ChannelMismatch {
            path: path.to_path_buf(),
            expected: *expected,
            found: rec.channels(),
        }),
        Some(_) => Ok(()),
        None => {
            *channels = Some(rec.channels());
            Ok(())
        }
    }
}
