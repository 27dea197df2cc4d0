//! Shared data contracts for EEG recordings consumed by the seizure trainer.

pub mod recording;

pub use recording::{
    Endianness, RecordingHeader, SeizureInterval, SignalDType, ValidationError,
};
