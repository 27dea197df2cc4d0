use burn::module::AutodiffModule;
use burn::nn::loss::CrossEntropyLossConfig;
use burn::optim::{GradientsParams, Optimizer};
use burn::tensor::backend::Backend;
use eeg_dataset::RecurrentBatchGenerator;
use indicatif::{ProgressBar, ProgressStyle};
use models::RecurrentClassifier;
use std::ops::Range;

use crate::evaluate::evaluate_range;
use crate::experiment::{
    load_record, save_model, save_record, ExperimentDir, MetricsRow, SegmentScore, TrainingState,
};
use crate::metrics::argmax_rows;
use crate::schedule::SegmentSchedule;
use crate::ADBackend;

type Model = RecurrentClassifier<ADBackend>;
type Device = <ADBackend as Backend>::Device;

/// Running means over every channel step of a segment.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SegmentTrainStats {
    pub loss: f64,
    pub accuracy: f64,
    pub steps: usize,
}

/// Everything the segment loop needs besides the model and optimizer.
pub struct SegmentRun<'a> {
    pub experiment: &'a ExperimentDir,
    pub generator: &'a RecurrentBatchGenerator,
    pub schedule: SegmentSchedule,
    pub model_name: &'a str,
    pub num_classes: usize,
    pub learning_rate: f64,
    pub epochs: usize,
    pub start_epoch: usize,
    pub start_segment: usize,
    pub resume_optimizer: bool,
    pub device: Device,
}

impl SegmentRun<'_> {
    /// Walk the segment schedule for every remaining epoch.
    pub fn run<O>(
        &self,
        mut model: Model,
        mut optim: O,
        mut state: TrainingState,
    ) -> anyhow::Result<(Model, TrainingState)>
    where
        O: Optimizer<Model, ADBackend>,
    {
        let optim_path = self.experiment.last_optim_path(self.model_name);
        if self.resume_optimizer {
            if optim_path.exists() {
                let record = load_record::<ADBackend, O::Record>(&optim_path, &self.device)?;
                optim = optim.load_record(record);
                log::info!("Loaded optimizer state from {}", optim_path.display());
            } else {
                log::warn!(
                    "no optimizer state at {}; continuing with a fresh optimizer",
                    optim_path.display()
                );
            }
        }

        let mut metrics_log = self.experiment.metrics_log()?;
        let segments = self.schedule.segments();
        for epoch in self.start_epoch..self.epochs {
            let first = if epoch == self.start_epoch {
                self.start_segment
            } else {
                0
            };
            for seg in first..segments {
                log::info!("Training segment {seg}/{} (epoch {epoch})", segments - 1);
                let block = self.schedule.training_block(seg);
                log::info!(
                    "Segments: {} - {}; batches {} - {}",
                    self.schedule.first_segment(seg),
                    seg + 1,
                    block.start,
                    block.end
                );
                let (next, stats) = self.train_block(model, &mut optim, block)?;
                model = next;

                if let Some(range) = self.schedule.validation_block(seg) {
                    log::info!("Validation with segment {}...", seg + 1);
                    let valid = model.valid();
                    let report = evaluate_range(
                        &valid,
                        self.generator,
                        range,
                        self.num_classes,
                        &self.device,
                    )?;
                    report.log(&format!("Segment {seg}: Validation results"));

                    let accuracy = report.combined.accuracy();
                    let macro_f1 = report.combined.macro_f1();
                    metrics_log.append(&MetricsRow {
                        segment: seg,
                        train_acc: stats.accuracy,
                        train_loss: stats.loss,
                        val_acc: report.single_channel.accuracy(),
                        val_loss: report.loss,
                        val_f1: report.single_channel.macro_f1(),
                        val_acc_combined: accuracy,
                        val_f1_combined: macro_f1,
                    })?;
                    state.scores.push(SegmentScore {
                        epoch,
                        segment: seg,
                        accuracy,
                        macro_f1,
                        seizure_f1: report.combined.f1(1),
                    });

                    if accuracy > state.best_val_score {
                        state.best_val_score = accuracy;
                        let best = self.experiment.best_model_path(self.model_name, seg, accuracy);
                        save_model(&model, &best)?;
                        log::info!("New best combined accuracy {accuracy:.4}; saved {}", best.display());
                    }
                }

                save_model(&model, &self.experiment.last_model_path(self.model_name))?;
                save_record::<ADBackend, _>(optim.to_record(), &optim_path)?;
                if seg + 1 == segments {
                    state.epoch = epoch + 1;
                    state.next_segment = 0;
                } else {
                    state.epoch = epoch;
                    state.next_segment = seg + 1;
                }
                self.experiment.save_state(&state)?;
            }
        }
        Ok((model, state))
    }

    fn train_block<O>(
        &self,
        mut model: Model,
        optim: &mut O,
        block: Range<usize>,
    ) -> anyhow::Result<(Model, SegmentTrainStats)>
    where
        O: Optimizer<Model, ADBackend>,
    {
        let loss_fn = CrossEntropyLossConfig::new().init(&self.device);
        let k = self.num_classes;
        let pb = ProgressBar::new(block.len() as u64);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("Training [{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} {msg}")
                .map_err(|e| anyhow::anyhow!("progress template: {e}"))?,
        );

        let mut loss_sum = 0.0f64;
        let mut steps = 0usize;
        let mut correct = 0usize;
        let mut seen = 0usize;
        for i in block {
            let batch = self.generator.get(i)?;
            let labels: Vec<usize> = batch.y.iter().map(|&l| l as usize).collect();
            let targets = batch.targets::<ADBackend>(&self.device);
            for c in 0..batch.channels {
                let logits = model.forward(batch.channel_tensor::<ADBackend>(c, &self.device));
                let loss = loss_fn.forward(logits.clone(), targets.clone());

                let loss_val = loss
                    .clone()
                    .detach()
                    .into_data()
                    .to_vec::<f32>()
                    .map_err(|e| anyhow::anyhow!("failed to read training loss: {e:?}"))?
                    .first()
                    .copied()
                    .ok_or_else(|| anyhow::anyhow!("training loss tensor is empty"))?;
                let logits_host = logits
                    .detach()
                    .into_data()
                    .to_vec::<f32>()
                    .map_err(|e| anyhow::anyhow!("failed to read training logits: {e:?}"))?;
                correct += argmax_rows(&logits_host, k)
                    .into_iter()
                    .zip(labels.iter())
                    .filter(|(p, t)| p == *t)
                    .count();
                seen += labels.len();
                loss_sum += loss_val as f64;
                steps += 1;

                let grads = GradientsParams::from_grads(loss.backward(), &model);
                model = optim.step(self.learning_rate, model, grads);
            }
            pb.set_message(format!(
                "loss={:.5}, acc={:.5}",
                loss_sum / steps.max(1) as f64,
                correct as f64 / seen.max(1) as f64
            ));
            pb.inc(1);
        }
        pb.finish_and_clear();

        let stats = SegmentTrainStats {
            loss: loss_sum / steps.max(1) as f64,
            accuracy: correct as f64 / seen.max(1) as f64,
            steps,
        };
        log::info!(
            "segment training: loss={:.5}, acc={:.5} over {} channel steps",
            stats.loss,
            stats.accuracy,
            stats.steps
        );
        Ok((model, stats))
    }
}
