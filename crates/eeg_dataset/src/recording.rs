//! Index files and memory-mapped EEG recordings.

use crate::types::{DatasetResult, EegDatasetError};
use data_contracts::{Endianness, RecordingHeader};
use memmap2::{Mmap, MmapOptions};
use std::fs::{self, File};
use std::path::{Path, PathBuf};

/// Read an index file listing recording header paths, one per line.
///
/// Blank lines and `#` comments are skipped; relative entries resolve
/// against the index file's directory.
pub fn read_index(path: &Path) -> DatasetResult<Vec<PathBuf>> {
    let raw = fs::read_to_string(path).map_err(|e| EegDatasetError::Io {
        path: path.to_path_buf(),
        source: e,
    })?;
    let base = path.parent().unwrap_or_else(|| Path::new("."));
    let entries = raw
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(|line| {
            let p = PathBuf::from(line);
            if p.is_absolute() {
                p
            } else {
                base.join(p)
            }
        })
        .collect();
    Ok(entries)
}

/// A recording header plus its memory-mapped signal.
pub struct Recording {
    pub header_path: PathBuf,
    pub header: RecordingHeader,
    mmap: Mmap,
}

impl std::fmt::Debug for Recording {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Recording")
            .field("header_path", &self.header_path)
            .field("header", &self.header)
            .finish()
    }
}

impl Recording {
    pub fn load_header(path: &Path) -> DatasetResult<RecordingHeader> {
        let raw = fs::read(path).map_err(|e| EegDatasetError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;
        let header: RecordingHeader =
            serde_json::from_slice(&raw).map_err(|e| EegDatasetError::Json {
                path: path.to_path_buf(),
                source: e,
            })?;
        header.validate().map_err(|e| EegDatasetError::Validation {
            path: path.to_path_buf(),
            source: e,
        })?;
        Ok(header)
    }

    pub fn open(header_path: &Path) -> DatasetResult<Self> {
        let header = Self::load_header(header_path)?;
        let base = header_path.parent().unwrap_or_else(|| Path::new("."));
        let signal_path = base.join(&header.signal_file);
        let file = File::open(&signal_path).map_err(|e| EegDatasetError::Io {
            path: signal_path.clone(),
            source: e,
        })?;
        // Safety: the file is opened read-only and not mutated while mapped.
        let mmap = unsafe { MmapOptions::new().map(&file) }.map_err(|e| EegDatasetError::Io {
            path: signal_path.clone(),
            source: e,
        })?;
        let expected = header.signal_len_bytes();
        if mmap.len() < expected {
            return Err(EegDatasetError::ShortSignal {
                path: signal_path,
                expected,
                found: mmap.len(),
            });
        }
        Ok(Self {
            header_path: header_path.to_path_buf(),
            header,
            mmap,
        })
    }

    pub fn channels(&self) -> usize {
        self.header.channels.len()
    }

    pub fn samples(&self) -> usize {
        self.header.samples
    }

    /// Raw value at `(sample, channel)`.
    pub fn value(&self, sample: usize, channel: usize) -> f32 {
        let offset = (sample * self.channels() + channel) * 4;
        let bytes = [
            self.mmap[offset],
            self.mmap[offset + 1],
            self.mmap[offset + 2],
            self.mmap[offset + 3],
        ];
        match self.header.endianness {
            Endianness::Little => f32::from_le_bytes(bytes),
            Endianness::Big => f32::from_be_bytes(bytes),
        }
    }

    /// Copy `len` samples of one channel starting at `start`.
    pub fn read_channel(&self, channel: usize, start: usize, len: usize, out: &mut Vec<f32>) {
        out.clear();
        out.extend((start..start + len).map(|s| self.value(s, channel)));
    }
}
