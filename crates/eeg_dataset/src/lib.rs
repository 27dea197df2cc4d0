//! EEG recording loading and recurrent batch generation for seizure detection.
//!
//! This crate provides utilities for:
//! - Reading index files that list recording headers
//! - Memory-mapping raw multi-channel signal files
//! - Cutting recordings into sequences of overlapping windows
//! - Class-balanced batch generation for training
//! - Writing synthetic recordings for smoke tests and demos

pub mod generator;
pub mod recording;
pub mod synth;
pub mod types;
pub mod windows;

pub use generator::RecurrentBatchGenerator;
pub use recording::{read_index, Recording};
pub use synth::{write_index, write_synthetic_recording, SynthRecordingSpec};
pub use types::*;
pub use windows::{build_sequences, SequenceRef, WindowGeometry};
