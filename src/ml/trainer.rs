// ============================================================
// Training Loop
// ============================================================
// Full fine-tune + validation loop using Burn's DataLoader and
// Adam, shared shape for both tasks:
//
//   - training batches run on the autodiff backend; gradients
//     are stepped at `lr`
//   - the first `freeze_epochs` epochs step ONLY the task
//     head's gradients (staged fine-tuning: the pretrained body
//     stays frozen while the head warms up)
//   - validation runs on the inner backend via model.valid(),
//     with dropout disabled
//   - per validation batch, argmax predictions and targets are
//     masked of ignore-labeled positions and fed to the metric
//     callbacks; per epoch the callbacks finalize into the CSV
//     log
//   - every epoch ends with a checkpoint
//
// Reference: Kingma & Ba (2015) Adam

use burn::{
    data::dataloader::DataLoaderBuilder,
    module::AutodiffModule,
    optim::{AdamConfig, GradientsParams, Optimizer},
    prelude::*,
    tensor::backend::AutodiffBackend,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::data::batcher::{LmBatchCfg, LmBatcher, Seq2SeqBatchCfg, Seq2SeqBatcher};
use crate::data::dataset::{LmItem, SummarizationItem, TextDataset};
use crate::error::Result;
use crate::infra::checkpoint::CheckpointManager;
use crate::infra::metrics::{masked_pairs, MetricSample, MetricsLogger, TaskMetric};
use crate::ml::lm::LmModel;
use crate::ml::loss::masked_cross_entropy;
use crate::ml::seq2seq::Seq2SeqModel;
use crate::ml::tokenizer::TokenizerAdapter;

/// Hyperparameters of one fine-tuning run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FitConfig {
    pub epochs:     usize,
    pub batch_size: usize,
    pub lr:         f64,
    /// Head-only warmup epochs before the whole module trains
    pub freeze_epochs: usize,
    /// Seed for dataloader shuffling (and masked-LM draws)
    pub seed: u64,
}

impl Default for FitConfig {
    fn default() -> Self {
        Self {
            epochs: 3,
            batch_size: 8,
            lr: 1e-4,
            freeze_epochs: 0,
            seed: 42,
        }
    }
}

/// Fine-tune a summarization model to completion.
#[allow(clippy::too_many_arguments)]
pub fn fit_seq2seq<B: AutodiffBackend>(
    mut model: Seq2SeqModel<B>,
    train_data: TextDataset<SummarizationItem>,
    valid_data: TextDataset<SummarizationItem>,
    batch_cfg: Seq2SeqBatchCfg,
    tokenizer: Arc<TokenizerAdapter>,
    metrics: &mut [Box<dyn TaskMetric>],
    ckpt: &CheckpointManager,
    logger: &MetricsLogger,
    fit: &FitConfig,
    device: B::Device,
) -> Result<Seq2SeqModel<B>> {
    let mut optim = AdamConfig::new().with_epsilon(1e-8).init();

    let train_batcher = Seq2SeqBatcher::<B>::new(batch_cfg.clone(), device.clone());
    let train_loader = DataLoaderBuilder::new(train_batcher)
        .batch_size(fit.batch_size)
        .shuffle(fit.seed)
        .num_workers(1)
        .build(train_data);

    let valid_batcher = Seq2SeqBatcher::<B::InnerBackend>::new(batch_cfg, device.clone());
    let valid_loader = DataLoaderBuilder::new(valid_batcher)
        .batch_size(fit.batch_size)
        .num_workers(1)
        .build(valid_data);

    for epoch in 1..=fit.epochs {
        let head_only = epoch <= fit.freeze_epochs;

        // ── Training phase ────────────────────────────────────────────────────
        let mut train_loss_sum = 0.0f64;
        let mut train_batches = 0usize;

        for batch in train_loader.iter() {
            let (loss, _) = model.forward_loss(&batch);
            train_loss_sum += loss.clone().into_scalar().elem::<f64>();
            train_batches += 1;

            let grads = loss.backward();
            let grads = if head_only {
                GradientsParams::from_grads(grads, &model.head_module())
            } else {
                GradientsParams::from_grads(grads, &model)
            };
            model = optim.step(fit.lr, model, grads);
        }
        let avg_train_loss = mean_or_nan(train_loss_sum, train_batches);

        // ── Validation phase ──────────────────────────────────────────────────
        let model_valid = model.valid();
        for metric in metrics.iter_mut() {
            metric.reset();
        }

        let mut val_loss_sum = 0.0f64;
        let mut val_batches = 0usize;

        for batch in valid_loader.iter() {
            let logits = model_valid.forward(
                batch.source_ids.clone(),
                batch.source_mask.clone(),
                batch.decoder_input_ids.clone(),
            );
            let loss = masked_cross_entropy(logits.clone(), batch.labels.clone());
            val_loss_sum += loss.into_scalar().elem::<f64>();
            val_batches += 1;

            accumulate_batch(metrics, &tokenizer, logits, batch.labels);
        }
        let avg_val_loss = mean_or_nan(val_loss_sum, val_batches);

        let rows: Vec<(&str, Option<f64>)> =
            metrics.iter().map(|m| (m.name(), m.finalize())).collect();
        report_epoch(epoch, fit.epochs, avg_train_loss, avg_val_loss, &rows);
        logger.log(epoch, avg_train_loss, avg_val_loss, &rows)?;

        ckpt.save_model(&model, epoch)?;
    }

    tracing::info!("Summarization fine-tuning complete");
    Ok(model)
}

/// Fine-tune a language model (causal or masked) to completion.
#[allow(clippy::too_many_arguments)]
pub fn fit_lm<B: AutodiffBackend>(
    mut model: LmModel<B>,
    train_data: TextDataset<LmItem>,
    valid_data: TextDataset<LmItem>,
    batch_cfg: LmBatchCfg,
    tokenizer: Arc<TokenizerAdapter>,
    metrics: &mut [Box<dyn TaskMetric>],
    ckpt: &CheckpointManager,
    logger: &MetricsLogger,
    fit: &FitConfig,
    device: B::Device,
) -> Result<LmModel<B>> {
    let mut optim = AdamConfig::new().with_epsilon(1e-8).init();

    let train_batcher = LmBatcher::<B>::new(batch_cfg.clone(), device.clone());
    let train_loader = DataLoaderBuilder::new(train_batcher)
        .batch_size(fit.batch_size)
        .shuffle(fit.seed)
        .num_workers(1)
        .build(train_data);

    let valid_batcher = LmBatcher::<B::InnerBackend>::new(batch_cfg, device.clone());
    let valid_loader = DataLoaderBuilder::new(valid_batcher)
        .batch_size(fit.batch_size)
        .num_workers(1)
        .build(valid_data);

    for epoch in 1..=fit.epochs {
        let head_only = epoch <= fit.freeze_epochs;

        // ── Training phase ────────────────────────────────────────────────────
        let mut train_loss_sum = 0.0f64;
        let mut train_batches = 0usize;

        for batch in train_loader.iter() {
            let (loss, _) = model.forward_loss(&batch);
            train_loss_sum += loss.clone().into_scalar().elem::<f64>();
            train_batches += 1;

            let grads = loss.backward();
            let grads = if head_only {
                GradientsParams::from_grads(grads, &model.head_module())
            } else {
                GradientsParams::from_grads(grads, &model)
            };
            model = optim.step(fit.lr, model, grads);
        }
        let avg_train_loss = mean_or_nan(train_loss_sum, train_batches);

        // ── Validation phase ──────────────────────────────────────────────────
        let model_valid = model.valid();
        for metric in metrics.iter_mut() {
            metric.reset();
        }

        let mut val_loss_sum = 0.0f64;
        let mut val_batches = 0usize;

        for batch in valid_loader.iter() {
            let logits = model_valid.forward(
                batch.input_ids.clone(),
                Some(batch.attention_mask.clone()),
            );
            let loss = masked_cross_entropy(logits.clone(), batch.labels.clone());
            val_loss_sum += loss.into_scalar().elem::<f64>();
            val_batches += 1;

            accumulate_batch(metrics, &tokenizer, logits, batch.labels);
        }
        let avg_val_loss = mean_or_nan(val_loss_sum, val_batches);

        let mut rows: Vec<(&str, Option<f64>)> =
            metrics.iter().map(|m| (m.name(), m.finalize())).collect();
        // perplexity comes straight from the validation loss
        let perplexity = (val_batches > 0).then(|| avg_val_loss.exp());
        rows.push(("perplexity", perplexity));

        report_epoch(epoch, fit.epochs, avg_train_loss, avg_val_loss, &rows);
        logger.log(epoch, avg_train_loss, avg_val_loss, &rows)?;

        ckpt.save_model(&model, epoch)?;
    }

    tracing::info!("Language-model fine-tuning complete");
    Ok(model)
}

// ─── Shared helpers ───────────────────────────────────────────────────────────

fn mean_or_nan(sum: f64, count: usize) -> f64 {
    if count > 0 {
        sum / count as f64
    } else {
        f64::NAN
    }
}

/// Argmax the logits, mask ignore-labeled positions out of both
/// predictions and targets, and hand each sample's surviving
/// aligned pairs to every metric. Samples with zero surviving
/// pairs are skipped entirely.
fn accumulate_batch<B: Backend>(
    metrics: &mut [Box<dyn TaskMetric>],
    tokenizer: &TokenizerAdapter,
    logits: Tensor<B, 3>,
    labels: Tensor<B, 2, Int>,
) {
    let [batch_size, seq_len, _] = logits.dims();
    let preds = int_matrix(logits.argmax(2).reshape([batch_size, seq_len]));
    let targets = int_matrix(labels);

    for row in 0..batch_size {
        let pred_row = &preds[row * seq_len..(row + 1) * seq_len];
        let target_row = &targets[row * seq_len..(row + 1) * seq_len];

        let pairs = masked_pairs(pred_row, target_row);
        if pairs.is_empty() {
            continue;
        }
        let (pred_ids, target_ids): (Vec<u32>, Vec<u32>) = pairs.into_iter().unzip();

        let sample = MetricSample {
            pred_text: tokenizer.decode(&pred_ids, true).unwrap_or_default(),
            target_text: tokenizer.decode(&target_ids, true).unwrap_or_default(),
            pred_ids,
            target_ids,
        };
        for metric in metrics.iter_mut() {
            metric.accumulate(&sample);
        }
    }
}

fn int_matrix<B: Backend>(tensor: Tensor<B, 2, Int>) -> Vec<i64> {
    tensor
        .into_data()
        .convert::<i64>()
        .to_vec()
        .unwrap_or_default()
}

fn report_epoch(
    epoch: usize,
    total: usize,
    train_loss: f64,
    val_loss: f64,
    metrics: &[(&str, Option<f64>)],
) {
    let rendered: Vec<String> = metrics
        .iter()
        .map(|(name, value)| match value {
            Some(v) => format!("{name}={v:.4}"),
            None => format!("{name}=undefined"),
        })
        .collect();
    println!(
        "Epoch {:>3}/{} | train_loss={:.4} | val_loss={:.4} | {}",
        epoch,
        total,
        train_loss,
        val_loss,
        rendered.join(" | "),
    );
}
