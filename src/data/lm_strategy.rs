// ============================================================
// Language-Modeling Label Strategies
// ============================================================
// How a tokenized text becomes (inputs, labels) depends on the
// training objective:
//
//   Causal — inputs are unchanged; the label at position i is
//            the token at position i+1 (next-token prediction).
//            Labels inside the prompt span and the final
//            position carry the ignore sentinel.
//
//   Masked — a fraction of non-special positions is selected;
//            selected inputs are replaced by the mask token
//            (80%), a random vocabulary token (10%), or left
//            unchanged (10%), and the ORIGINAL token becomes
//            the label. Every unselected position is ignored.
//
// Masking is randomized per batch draw. Callers own the RNG and
// must seed it, so tests assert mask rates and label integrity
// under a fixed seed rather than exact positions.
//
// Reference: Devlin et al. (2019) BERT, §3.1 masking procedure

use rand::rngs::StdRng;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::domain::arch::IGNORE_INDEX;

/// The language-modeling objective applied at batch time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum LmStrategy {
    Causal,
    Masked(MaskingConfig),
}

/// Masked-LM selection probabilities.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MaskingConfig {
    /// Fraction of maskable positions selected for prediction
    pub mask_prob: f32,
    /// Of the selected: replaced by the mask token
    pub mask_token_prob: f32,
    /// Of the selected: replaced by a random vocabulary token
    pub random_token_prob: f32,
    // remainder of the selected: left unchanged
}

impl Default for MaskingConfig {
    fn default() -> Self {
        Self {
            mask_prob: 0.15,
            mask_token_prob: 0.8,
            random_token_prob: 0.1,
        }
    }
}

/// Next-token labels for a causal sequence. `prompt_len` is the
/// number of leading tokens whose prediction is excluded from
/// the loss (zero when there is no prompt).
pub fn causal_labels(input_ids: &[u32], prompt_len: usize) -> Vec<i32> {
    let len = input_ids.len();
    let mut labels = vec![IGNORE_INDEX; len];
    for i in 0..len.saturating_sub(1) {
        // label at i predicts the token at i + 1
        if i + 1 >= prompt_len {
            labels[i] = input_ids[i + 1] as i32;
        }
    }
    labels
}

/// Apply masked-LM selection in place; returns the labels.
///
/// `special_ids` are never selected (pad, separators, the mask
/// token itself). `vocab_size` bounds the random-replacement
/// draw.
pub fn apply_masking(
    input_ids: &mut [u32],
    special_ids: &[u32],
    mask_id: u32,
    vocab_size: u32,
    cfg: &MaskingConfig,
    rng: &mut StdRng,
) -> Vec<i32> {
    let mut labels = vec![IGNORE_INDEX; input_ids.len()];

    for (i, id) in input_ids.iter_mut().enumerate() {
        if special_ids.contains(id) {
            continue;
        }
        if rng.gen::<f32>() >= cfg.mask_prob {
            continue;
        }

        labels[i] = *id as i32;

        let draw = rng.gen::<f32>();
        if draw < cfg.mask_token_prob {
            *id = mask_id;
        } else if draw < cfg.mask_token_prob + cfg.random_token_prob {
            *id = rng.gen_range(0..vocab_size);
        }
        // else: keep the original token, label it anyway
    }

    labels
}
