// ============================================================
// Batch Tokenization Adapter
// ============================================================
// Implements Burn's Batcher trait to turn raw text items into
// model-ready tensors AT BATCH TIME. Nothing is pre-tokenized;
// the dataset hands over plain strings and this adapter:
//
//   1. applies the architecture's input-text transform
//      (e.g. the instruction prefix one family requires)
//   2. tokenizes under the configured max lengths
//   3. pads/truncates into fixed-width [batch, seq] tensors
//      with attention masks
//   4. builds labels per task: shifted decoder targets for
//      summarization, causal-shift or masked-token labels for
//      language modeling (ignored positions carry -100)
//
// Burn's Batcher trait is infallible, so a tokenizer failure on
// a single item degrades to an empty row with an error log
// instead of aborting the epoch.

use burn::{data::dataloader::batcher::Batcher, prelude::*};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::data::dataset::{LmItem, SummarizationItem};
use crate::data::lm_strategy::{apply_masking, causal_labels, LmStrategy};
use crate::domain::arch::IGNORE_INDEX;
use crate::ml::tokenizer::TokenizerAdapter;

/// Pad `row` with `fill` up to `width` (truncating first).
fn pad_to<T: Copy>(mut row: Vec<T>, width: usize, fill: T) -> Vec<T> {
    row.truncate(width);
    while row.len() < width {
        row.push(fill);
    }
    row
}

/// Decoder input is the target shifted right by one behind the
/// start token: [start, t0, t1, ...], padded out to `width`.
fn shift_right(target: &[u32], start: u32, pad: u32, width: usize) -> Vec<u32> {
    let mut row = Vec::with_capacity(width);
    row.push(start);
    row.extend(target.iter().take(width.saturating_sub(1)));
    pad_to(row, width, pad)
}

fn rows_to_tensor<B: Backend>(
    rows: &[Vec<i32>],
    width: usize,
    device: &B::Device,
) -> Tensor<B, 2, Int> {
    let flat: Vec<i32> = rows.iter().flatten().copied().collect();
    Tensor::<B, 1, Int>::from_ints(flat.as_slice(), device).reshape([rows.len(), width])
}

// ─── Summarization ────────────────────────────────────────────────────────────

/// Everything a summarization batcher needs besides the device,
/// shared between the training and validation instances.
#[derive(Clone)]
pub struct Seq2SeqBatchCfg {
    pub tokenizer:         Arc<TokenizerAdapter>,
    /// Architecture input transform, applied before tokenizing
    pub input_prefix:      Option<&'static str>,
    pub max_length:        usize,
    pub max_target_length: usize,
    pub decoder_start:     u32,
    pub pad_id:            u32,
}

/// A batch of summarization samples ready for the forward pass.
/// All tensors have batch_size as their first dimension.
#[derive(Debug, Clone)]
pub struct Seq2SeqBatch<B: Backend> {
    /// Source token ids — shape: [batch, max_length]
    pub source_ids: Tensor<B, 2, Int>,
    /// 1 = real source token, 0 = padding — [batch, max_length]
    pub source_mask: Tensor<B, 2, Int>,
    /// Shifted target ids — [batch, max_target_length]
    pub decoder_input_ids: Tensor<B, 2, Int>,
    /// Target ids with padding as -100 — [batch, max_target_length]
    pub labels: Tensor<B, 2, Int>,
}

#[derive(Clone)]
pub struct Seq2SeqBatcher<B: Backend> {
    cfg:    Seq2SeqBatchCfg,
    device: B::Device,
}

impl<B: Backend> Seq2SeqBatcher<B> {
    pub fn new(cfg: Seq2SeqBatchCfg, device: B::Device) -> Self {
        Self { cfg, device }
    }
}

impl<B: Backend> Batcher<B, SummarizationItem, Seq2SeqBatch<B>> for Seq2SeqBatcher<B> {
    fn batch(&self, items: Vec<SummarizationItem>, _device: &B::Device) -> Seq2SeqBatch<B> {
        let cfg = &self.cfg;
        let mut source_rows = Vec::with_capacity(items.len());
        let mut mask_rows = Vec::with_capacity(items.len());
        let mut decoder_rows = Vec::with_capacity(items.len());
        let mut label_rows = Vec::with_capacity(items.len());

        for item in &items {
            let text = match cfg.input_prefix {
                Some(prefix) => format!("{prefix}{}", item.text),
                None => item.text.clone(),
            };

            let source = cfg.tokenizer.encode_source(&text).unwrap_or_else(|e| {
                tracing::error!("source tokenization failed: {e}");
                Vec::new()
            });
            let mut source: Vec<u32> = source;
            source.truncate(cfg.max_length);

            let target = cfg.tokenizer.encode(&item.summary, true).unwrap_or_else(|e| {
                tracing::error!("target tokenization failed: {e}");
                Vec::new()
            });
            let mut target: Vec<u32> = target;
            target.truncate(cfg.max_target_length);

            let real_len = source.len();
            let mut mask = vec![1i32; real_len];
            mask = pad_to(mask, cfg.max_length, 0);
            let source = pad_to(source, cfg.max_length, cfg.pad_id);

            let decoder_input =
                shift_right(&target, cfg.decoder_start, cfg.pad_id, cfg.max_target_length);
            let labels: Vec<i32> = pad_to(
                target.iter().map(|&id| id as i32).collect(),
                cfg.max_target_length,
                IGNORE_INDEX,
            );

            source_rows.push(source.iter().map(|&id| id as i32).collect::<Vec<_>>());
            mask_rows.push(mask);
            decoder_rows.push(decoder_input.iter().map(|&id| id as i32).collect::<Vec<_>>());
            label_rows.push(labels);
        }

        Seq2SeqBatch {
            source_ids: rows_to_tensor(&source_rows, cfg.max_length, &self.device),
            source_mask: rows_to_tensor(&mask_rows, cfg.max_length, &self.device),
            decoder_input_ids: rows_to_tensor(&decoder_rows, cfg.max_target_length, &self.device),
            labels: rows_to_tensor(&label_rows, cfg.max_target_length, &self.device),
        }
    }
}

// ─── Language modeling ────────────────────────────────────────────────────────

/// Shared configuration for the LM batcher. For the masked
/// strategy, `mask_id`, `special_ids`, and `vocab_size` must be
/// populated (the assembler validates this before construction).
#[derive(Clone)]
pub struct LmBatchCfg {
    pub tokenizer:   Arc<TokenizerAdapter>,
    pub strategy:    LmStrategy,
    pub max_length:  usize,
    pub pad_id:      u32,
    pub mask_id:     Option<u32>,
    pub special_ids: Arc<Vec<u32>>,
    pub vocab_size:  u32,
    /// Base seed for the per-batch masking RNG
    pub seed:        u64,
}

/// A batch of language-modeling samples.
#[derive(Debug, Clone)]
pub struct LmBatch<B: Backend> {
    /// Token ids — shape: [batch, max_length]
    pub input_ids: Tensor<B, 2, Int>,
    /// 1 = real token, 0 = padding — [batch, max_length]
    pub attention_mask: Tensor<B, 2, Int>,
    /// Strategy-built labels, ignored positions as -100
    pub labels: Tensor<B, 2, Int>,
}

#[derive(Clone)]
pub struct LmBatcher<B: Backend> {
    cfg:     LmBatchCfg,
    /// Per-batch draw counter; each batch gets its own RNG
    /// stream derived from (seed, draw index) so masking stays
    /// deterministic for a fixed seed
    draws:   Arc<AtomicU64>,
    device:  B::Device,
}

impl<B: Backend> LmBatcher<B> {
    pub fn new(cfg: LmBatchCfg, device: B::Device) -> Self {
        Self {
            cfg,
            draws: Arc::new(AtomicU64::new(0)),
            device,
        }
    }
}

impl<B: Backend> Batcher<B, LmItem, LmBatch<B>> for LmBatcher<B> {
    fn batch(&self, items: Vec<LmItem>, _device: &B::Device) -> LmBatch<B> {
        let cfg = &self.cfg;
        let draw = self.draws.fetch_add(1, Ordering::Relaxed);
        let mut rng = StdRng::seed_from_u64(cfg.seed.wrapping_add(draw.wrapping_mul(0x9E37_79B9)));

        let mut input_rows = Vec::with_capacity(items.len());
        let mut mask_rows = Vec::with_capacity(items.len());
        let mut label_rows = Vec::with_capacity(items.len());

        for item in &items {
            let mut ids = cfg.tokenizer.encode(&item.text, true).unwrap_or_else(|e| {
                tracing::error!("tokenization failed: {e}");
                Vec::new()
            });
            ids.truncate(cfg.max_length);

            let labels: Vec<i32> = match &cfg.strategy {
                LmStrategy::Causal => {
                    let prompt_len = match &item.prompt {
                        Some(prompt) => cfg
                            .tokenizer
                            .encode(prompt, false)
                            .map(|p| p.len().min(ids.len()))
                            .unwrap_or(0),
                        None => 0,
                    };
                    causal_labels(&ids, prompt_len)
                }
                LmStrategy::Masked(masking) => apply_masking(
                    &mut ids,
                    &cfg.special_ids,
                    cfg.mask_id.unwrap_or_default(),
                    cfg.vocab_size,
                    masking,
                    &mut rng,
                ),
            };

            let real_len = ids.len();
            let mask = pad_to(vec![1i32; real_len], cfg.max_length, 0);
            let input = pad_to(ids, cfg.max_length, cfg.pad_id);
            let labels = pad_to(labels, cfg.max_length, IGNORE_INDEX);

            input_rows.push(input.iter().map(|&id| id as i32).collect::<Vec<_>>());
            mask_rows.push(mask);
            label_rows.push(labels);
        }

        LmBatch {
            input_ids: rows_to_tensor(&input_rows, cfg.max_length, &self.device),
            attention_mask: rows_to_tensor(&mask_rows, cfg.max_length, &self.device),
            labels: rows_to_tensor(&label_rows, cfg.max_length, &self.device),
        }
    }
}
