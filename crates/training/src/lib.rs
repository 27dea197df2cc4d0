#![recursion_limit = "256"]

pub mod config;
pub mod evaluate;
pub mod experiment;
pub mod metrics;
pub mod schedule;
pub mod trainer;
pub mod util;

pub use config::TrainingConfig;
pub use evaluate::{evaluate_range, ChannelAggregator, ValidationReport};
pub use experiment::{ExperimentDir, MetricsLog, MetricsRow, SegmentScore, TrainingState};
pub use metrics::ConfusionMatrix;
pub use models::{CellKind, RecurrentClassifier, RecurrentClassifierConfig};
pub use schedule::{SegmentSchedule, TimeEstimate};
pub use util::{run_train, run_train_with_config, TrainArgs, TrainOutcome};

/// Backend alias for training/eval (NdArray by default; WGPU if enabled).
#[cfg(feature = "backend-wgpu")]
pub type TrainBackend = burn_wgpu::Wgpu<f32>;
#[cfg(not(feature = "backend-wgpu"))]
pub type TrainBackend = burn_ndarray::NdArray<f32>;

pub type ADBackend = burn::backend::Autodiff<TrainBackend>;
