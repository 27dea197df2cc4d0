//! Validation with per-channel inference and channel-averaged combination.

use crate::metrics::{argmax_rows, categorical_cross_entropy, ConfusionMatrix};
use burn::tensor::backend::Backend;
use eeg_dataset::RecurrentBatchGenerator;
use indicatif::{ProgressBar, ProgressStyle};
use models::RecurrentClassifier;
use std::ops::Range;

/// Collects single-channel and channel-averaged predictions.
///
/// Every channel of a sample is classified independently; the combined
/// prediction for the sample is the argmax of the mean channel probability.
#[derive(Debug, Clone)]
pub struct ChannelAggregator {
    num_classes: usize,
    single: ConfusionMatrix,
    combined: ConfusionMatrix,
    loss_sum: f64,
    loss_count: usize,
}

impl ChannelAggregator {
    pub fn new(num_classes: usize) -> Self {
        Self {
            num_classes,
            single: ConfusionMatrix::new(num_classes),
            combined: ConfusionMatrix::new(num_classes),
            loss_sum: 0.0,
            loss_count: 0,
        }
    }

    /// Add one batch: `channel_probs[c]` is the row-major `[batch, num_classes]`
    /// probability buffer of channel `c`.
    pub fn push_batch(&mut self, labels: &[usize], channel_probs: &[Vec<f32>]) {
        if channel_probs.is_empty() {
            return;
        }
        let k = self.num_classes;
        let mut summed = vec![0.0f32; labels.len() * k];
        for probs in channel_probs {
            self.loss_sum += categorical_cross_entropy(probs, labels, k);
            self.loss_count += 1;
            for (&truth, pred) in labels.iter().zip(argmax_rows(probs, k)) {
                self.single.add(truth, pred);
            }
            for (acc, p) in summed.iter_mut().zip(probs.iter()) {
                *acc += p;
            }
        }
        let channels = channel_probs.len() as f32;
        for v in summed.iter_mut() {
            *v /= channels;
        }
        for (&truth, pred) in labels.iter().zip(argmax_rows(&summed, k)) {
            self.combined.add(truth, pred);
        }
    }

    pub fn finish(self) -> ValidationReport {
        let loss = if self.loss_count == 0 {
            0.0
        } else {
            self.loss_sum / self.loss_count as f64
        };
        ValidationReport {
            single_channel: self.single,
            combined: self.combined,
            loss,
            channel_predictions: self.loss_count,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ValidationReport {
    pub single_channel: ConfusionMatrix,
    pub combined: ConfusionMatrix,
    /// Mean cross-entropy over every (batch, channel) prediction.
    pub loss: f64,
    pub channel_predictions: usize,
}

impl ValidationReport {
    /// Log both views the way the training driver reports a segment.
    pub fn log(&self, title: &str) {
        log::info!("***************************************************************");
        log::info!("{title}");
        log::info!(" -- Single channel results (no combination of channels) --");
        log_view(&self.single_channel);
        log::info!("--------------------------------------------------------------");
        log::info!(" -- All channels involved (combined for each timestamp) --");
        log_view(&self.combined);
        log::info!("validation loss: {:.5}", self.loss);
        log::info!("***************************************************************");
    }
}

fn log_view(m: &ConfusionMatrix) {
    log::info!("Validation acc : {:.5}", m.accuracy());
    log::info!("Validation macro f1-score : {:.5}", m.macro_f1());
    log::info!("Confusion matrix:\n{m}");
    log::info!("Classification report:\n{}", m.report());
}

/// Run channel-averaged validation of `model` over a range of batches.
pub fn evaluate_range<B: Backend>(
    model: &RecurrentClassifier<B>,
    generator: &RecurrentBatchGenerator,
    batches: Range<usize>,
    num_classes: usize,
    device: &B::Device,
) -> anyhow::Result<ValidationReport> {
    let mut agg = ChannelAggregator::new(num_classes);
    let pb = ProgressBar::new(batches.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("Validation [{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len}")
            .map_err(|e| anyhow::anyhow!("progress template: {e}"))?,
    );
    for j in batches {
        let batch = generator.get(j)?;
        let labels: Vec<usize> = batch.y.iter().map(|&l| l as usize).collect();
        let mut channel_probs = Vec::with_capacity(batch.channels);
        for c in 0..batch.channels {
            let probs = model.forward_probs(batch.channel_tensor::<B>(c, device));
            let probs = probs
                .into_data()
                .to_vec::<f32>()
                .map_err(|e| anyhow::anyhow!("failed to read predictions: {e:?}"))?;
            channel_probs.push(probs);
        }
        agg.push_batch(&labels, &channel_probs);
        pb.inc(1);
    }
    pb.finish_and_clear();
    Ok(agg.finish())
}
