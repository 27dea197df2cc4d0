//! Burn recurrent models for EEG seizure detection.
//!
//! This crate defines the networks trained by the `training` crate:
//! - `LstmCell` / `GruCell`: single recurrent cells built from linear projections.
//! - `RecurrentClassifier`: a stack of cells unrolled over the timesteps of a
//!   single EEG channel, followed by a linear classification head.
//!
//! Models see one channel at a time: input shape is
//! `[batch, timesteps, window_samples]`, output is `[batch, num_classes]` logits.

use burn::module::Module;
use burn::nn;
use burn::tensor::activation::{sigmoid, softmax, tanh};
use burn::tensor::backend::Backend;
use burn::tensor::Tensor;
use serde::{Deserialize, Serialize};

/// Recurrent cell family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CellKind {
    Lstm,
    Gru,
}

impl CellKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            CellKind::Lstm => "lstm",
            CellKind::Gru => "gru",
        }
    }
}

#[derive(Debug, Module)]
pub struct LstmCell<B: Backend> {
    input: nn::Linear<B>,
    recurrent: nn::Linear<B>,
    hidden: usize,
}

impl<B: Backend> LstmCell<B> {
    pub fn new(d_input: usize, hidden: usize, device: &B::Device) -> Self {
        Self {
            input: nn::LinearConfig::new(d_input, 4 * hidden).init(device),
            recurrent: nn::LinearConfig::new(hidden, 4 * hidden)
                .with_bias(false)
                .init(device),
            hidden,
        }
    }

    /// One step: returns the new `(h, c)`.
    pub fn forward(
        &self,
        x: Tensor<B, 2>,
        h: Tensor<B, 2>,
        c: Tensor<B, 2>,
    ) -> (Tensor<B, 2>, Tensor<B, 2>) {
        let batch = x.dims()[0];
        let n = self.hidden;
        let gates = self.input.forward(x) + self.recurrent.forward(h);
        let i = sigmoid(gates.clone().slice([0..batch, 0..n]));
        let f = sigmoid(gates.clone().slice([0..batch, n..2 * n]));
        let g = tanh(gates.clone().slice([0..batch, 2 * n..3 * n]));
        let o = sigmoid(gates.slice([0..batch, 3 * n..4 * n]));
        let c = f * c + i * g;
        let h = o * tanh(c.clone());
        (h, c)
    }
}

#[derive(Debug, Module)]
pub struct GruCell<B: Backend> {
    input: nn::Linear<B>,
    recurrent: nn::Linear<B>,
    hidden: usize,
}

impl<B: Backend> GruCell<B> {
    pub fn new(d_input: usize, hidden: usize, device: &B::Device) -> Self {
        Self {
            input: nn::LinearConfig::new(d_input, 3 * hidden).init(device),
            recurrent: nn::LinearConfig::new(hidden, 3 * hidden).init(device),
            hidden,
        }
    }

    /// One step: returns the new hidden state.
    pub fn forward(&self, x: Tensor<B, 2>, h: Tensor<B, 2>) -> Tensor<B, 2> {
        let batch = x.dims()[0];
        let n = self.hidden;
        let gx = self.input.forward(x);
        let gh = self.recurrent.forward(h.clone());
        let r = sigmoid(
            gx.clone().slice([0..batch, 0..n]) + gh.clone().slice([0..batch, 0..n]),
        );
        let z = sigmoid(
            gx.clone().slice([0..batch, n..2 * n]) + gh.clone().slice([0..batch, n..2 * n]),
        );
        let candidate = tanh(
            gx.slice([0..batch, 2 * n..3 * n]) + r * gh.slice([0..batch, 2 * n..3 * n]),
        );
        let update = z.clone().neg().add_scalar(1.0);
        update * candidate + z * h
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecurrentClassifierConfig {
    pub kind: CellKind,
    /// Features per timestep (samples per window).
    pub input_size: usize,
    pub hidden: usize,
    pub layers: usize,
    pub num_classes: usize,
}

impl Default for RecurrentClassifierConfig {
    fn default() -> Self {
        Self {
            kind: CellKind::Lstm,
            input_size: 256,
            hidden: 128,
            layers: 1,
            num_classes: 2,
        }
    }
}

#[derive(Debug, Module)]
pub struct RecurrentClassifier<B: Backend> {
    lstm: Vec<LstmCell<B>>,
    gru: Vec<GruCell<B>>,
    head: nn::Linear<B>,
    hidden: usize,
}

impl<B: Backend> RecurrentClassifier<B> {
    pub fn new(cfg: &RecurrentClassifierConfig, device: &B::Device) -> Self {
        let layers = cfg.layers.max(1);
        let hidden = cfg.hidden.max(1);
        let d_in = |layer: usize| if layer == 0 { cfg.input_size } else { hidden };
        let (lstm, gru) = match cfg.kind {
            CellKind::Lstm => (
                (0..layers)
                    .map(|l| LstmCell::new(d_in(l), hidden, device))
                    .collect(),
                Vec::new(),
            ),
            CellKind::Gru => (
                Vec::new(),
                (0..layers)
                    .map(|l| GruCell::new(d_in(l), hidden, device))
                    .collect(),
            ),
        };
        let head = nn::LinearConfig::new(hidden, cfg.num_classes.max(1)).init(device);
        Self {
            lstm,
            gru,
            head,
            hidden,
        }
    }

    /// Logits `[batch, num_classes]` from the last hidden state of the top layer.
    pub fn forward(&self, input: Tensor<B, 3>) -> Tensor<B, 2> {
        let [batch, timesteps, features] = input.dims();
        let device = input.device();
        let zeros = || Tensor::<B, 2>::zeros([batch, self.hidden], &device);

        let last = if !self.lstm.is_empty() {
            let mut h: Vec<Tensor<B, 2>> = self.lstm.iter().map(|_| zeros()).collect();
            let mut c: Vec<Tensor<B, 2>> = self.lstm.iter().map(|_| zeros()).collect();
            for t in 0..timesteps {
                let mut x = step(&input, batch, t, features);
                for (l, cell) in self.lstm.iter().enumerate() {
                    let (h_next, c_next) = cell.forward(x, h[l].clone(), c[l].clone());
                    h[l] = h_next.clone();
                    c[l] = c_next;
                    x = h_next;
                }
            }
            h.pop().unwrap_or_else(zeros)
        } else {
            let mut h: Vec<Tensor<B, 2>> = self.gru.iter().map(|_| zeros()).collect();
            for t in 0..timesteps {
                let mut x = step(&input, batch, t, features);
                for (l, cell) in self.gru.iter().enumerate() {
                    let h_next = cell.forward(x, h[l].clone());
                    h[l] = h_next.clone();
                    x = h_next;
                }
            }
            h.pop().unwrap_or_else(zeros)
        };
        self.head.forward(last)
    }

    /// Class probabilities `[batch, num_classes]`.
    pub fn forward_probs(&self, input: Tensor<B, 3>) -> Tensor<B, 2> {
        softmax(self.forward(input), 1)
    }
}

fn step<B: Backend>(input: &Tensor<B, 3>, batch: usize, t: usize, features: usize) -> Tensor<B, 2> {
    input
        .clone()
        .slice([0..batch, t..t + 1, 0..features])
        .reshape([batch, features])
}

/// Model factory: build a classifier for `input_shape = (timesteps, window_samples)`.
pub fn create_model<B: Backend>(
    kind: CellKind,
    input_shape: (usize, usize),
    num_classes: usize,
    hidden: usize,
    layers: usize,
    device: &B::Device,
) -> (RecurrentClassifier<B>, RecurrentClassifierConfig) {
    let cfg = RecurrentClassifierConfig {
        kind,
        input_size: input_shape.1,
        hidden,
        layers,
        num_classes,
    };
    (RecurrentClassifier::new(&cfg, device), cfg)
}

pub mod prelude {
    pub use super::{
        create_model, CellKind, GruCell, LstmCell, RecurrentClassifier, RecurrentClassifierConfig,
    };
}
