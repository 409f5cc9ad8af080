// ============================================================
// Inference Helpers
// ============================================================
// Post-training conveniences, written as free functions over
// the components a task owns (no methods are grafted onto
// framework types):
//
//   summarize — greedy generation per input text, honoring the
//               task's stored generation kwargs or caller
//               overrides, decoded back to text
//   fill_mask — locate the tokenizer's mask token in the input,
//               run one forward pass, take the top-k vocabulary
//               entries at that position, and substitute each
//               candidate back into the original string

use burn::prelude::*;
use std::cmp::Ordering;

use crate::domain::arch::ArchFamily;
use crate::error::{Result, TaskError};
use crate::ml::generation::GenerationSpec;
use crate::ml::lm::LmModel;
use crate::ml::policy::{policy_for, GenKwargs};
use crate::ml::seq2seq::Seq2SeqModel;
use crate::ml::tokenizer::TokenizerAdapter;

/// Generated length used when neither the kwargs nor the
/// checkpoint declare a maximum.
const DEFAULT_SUMMARY_LENGTH: usize = 64;

/// One generated summary per input.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct SummaryResult {
    pub summary_text: String,
}

/// Generate a summary for each input text. `overrides`, when
/// given, replaces the task's stored kwargs entirely (and is
/// itself filtered, so junk keys are dropped, not rejected).
pub fn summarize<B: Backend>(
    model: &Seq2SeqModel<B>,
    tokenizer: &TokenizerAdapter,
    arch: ArchFamily,
    gen_kwargs: &GenKwargs,
    inputs: &[&str],
    overrides: Option<&GenKwargs>,
    device: &B::Device,
) -> Result<Vec<SummaryResult>> {
    let mut kwargs = overrides.cloned().unwrap_or_else(|| gen_kwargs.clone());
    kwargs.retain_supported(Seq2SeqModel::<B>::GENERATE_PARAMS);

    let spec = GenerationSpec::from_kwargs(
        &kwargs,
        DEFAULT_SUMMARY_LENGTH,
        Some(model.eos_token_id()),
        Some(model.decoder_start_token_id()),
    );
    let prefix = policy_for(arch).input_prefix;

    let mut results = Vec::with_capacity(inputs.len());
    for input in inputs {
        let text = match prefix {
            Some(prefix) => format!("{prefix}{input}"),
            None => (*input).to_string(),
        };
        let source = tokenizer.encode_source(&text)?;
        let generated = model.generate(&source, &spec, device);
        let summary = tokenizer.decode(&generated, true)?;
        results.push(SummaryResult {
            summary_text: summary.trim().to_string(),
        });
    }
    Ok(results)
}

/// Top-k mask filling. The input must contain the tokenizer's
/// designated mask token; returns `n_preds` candidate strings
/// ordered by descending model score, each with the mask token
/// replaced and everything else untouched.
pub fn fill_mask<B: Backend>(
    model: &LmModel<B>,
    tokenizer: &TokenizerAdapter,
    input: &str,
    n_preds: usize,
    device: &B::Device,
) -> Result<Vec<String>> {
    if model.is_causal() {
        return Err(TaskError::Invalid(
            "mask filling requires a masked language model".into(),
        ));
    }
    let mask_token = tokenizer
        .mask_token()
        .ok_or_else(|| TaskError::Invalid("tokenizer has no mask token".into()))?
        .to_string();
    let mask_id = tokenizer
        .mask_id()
        .ok_or_else(|| TaskError::Invalid("tokenizer has no mask token".into()))?;

    let mut ids = tokenizer.encode(input, true)?;
    ids.truncate(model.max_positions());
    let position = ids.iter().position(|&id| id == mask_id).ok_or_else(|| {
        TaskError::Invalid(format!("input does not contain the mask token '{mask_token}'"))
    })?;

    let seq_len = ids.len();
    let flat: Vec<i32> = ids.iter().map(|&id| id as i32).collect();
    let input_ids = Tensor::<B, 1, Int>::from_ints(flat.as_slice(), device).reshape([1, seq_len]);

    let logits = model.forward(input_ids, None);
    let vocab = logits.dims()[2];
    let scores: Vec<f32> = logits
        .slice([0..1, position..position + 1, 0..vocab])
        .reshape([vocab])
        .into_data()
        .convert::<f32>()
        .to_vec()
        .unwrap_or_default();

    let mut order: Vec<usize> = (0..scores.len()).collect();
    order.sort_by(|&a, &b| {
        scores[b]
            .partial_cmp(&scores[a])
            .unwrap_or(Ordering::Equal)
    });

    let mut candidates = Vec::with_capacity(n_preds);
    for &token_id in order.iter().take(n_preds) {
        let decoded = tokenizer.decode(&[token_id as u32], true)?;
        candidates.push(input.replacen(&mask_token, decoded.trim(), 1));
    }
    Ok(candidates)
}
