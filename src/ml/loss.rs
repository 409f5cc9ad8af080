// ============================================================
// Ignore-Aware Cross Entropy
// ============================================================
// Cross-entropy over per-position logits where any label equal
// to IGNORE_INDEX contributes nothing to the loss. Positions
// are masked BEFORE averaging, so the denominator is the count
// of real targets, not the sequence length.
//
// A batch with zero real targets yields a zero loss (the count
// is clamped to one), never a NaN.

use burn::{prelude::*, tensor::activation};

use crate::domain::arch::IGNORE_INDEX;

/// logits: [batch, seq_len, vocab], labels: [batch, seq_len].
/// Returns the mean negative log-likelihood over non-ignored
/// positions as a single-element tensor.
pub fn masked_cross_entropy<B: Backend>(
    logits: Tensor<B, 3>,
    labels: Tensor<B, 2, Int>,
) -> Tensor<B, 1> {
    let [batch_size, seq_len, vocab_size] = logits.dims();
    let flat_logits = logits.reshape([batch_size * seq_len, vocab_size]);
    let flat_labels = labels.reshape([batch_size * seq_len]);

    let keep = flat_labels.clone().not_equal_elem(IGNORE_INDEX);
    // ignored labels are out of vocabulary range; gather needs a
    // valid index, so they are pointed at class 0 and zeroed out
    let safe_labels = flat_labels.mask_fill(keep.clone().bool_not(), 0);

    let log_probs = activation::log_softmax(flat_logits, 1);
    let picked = log_probs
        .gather(1, safe_labels.reshape([batch_size * seq_len, 1]))
        .reshape([batch_size * seq_len]);

    let keep = keep.float();
    let count = keep.clone().sum().clamp_min(1.0);
    (picked * keep).sum().neg().div(count)
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    type TestBackend = burn::backend::NdArray;

    #[test]
    fn test_uniform_logits_give_log_vocab() {
        let device = Default::default();
        let logits = Tensor::<TestBackend, 3>::zeros([1, 2, 4], &device);
        let labels = Tensor::<TestBackend, 1, Int>::from_ints([1, 2].as_slice(), &device)
            .reshape([1, 2]);

        let loss: f64 = masked_cross_entropy(logits, labels).into_scalar().elem::<f64>();
        let expected = (4.0f64).ln();
        assert!((loss - expected).abs() < 1e-5, "loss {loss} vs {expected}");
    }

    #[test]
    fn test_ignored_positions_do_not_count() {
        let device = Default::default();
        // position 1 has a huge logit on its (ignored) label;
        // only position 0 must contribute
        let logits = Tensor::<TestBackend, 1>::from_floats(
            [0.0, 0.0, 0.0, 0.0, 100.0, 0.0, 0.0, 0.0].as_slice(),
            &device,
        )
        .reshape([1, 2, 4]);
        let labels =
            Tensor::<TestBackend, 1, Int>::from_ints([1, IGNORE_INDEX].as_slice(), &device)
                .reshape([1, 2]);

        let loss: f64 = masked_cross_entropy(logits, labels).into_scalar().elem::<f64>();
        let expected = (4.0f64).ln();
        assert!((loss - expected).abs() < 1e-5, "loss {loss} vs {expected}");
    }

    #[test]
    fn test_all_ignored_yields_zero_not_nan() {
        let device = Default::default();
        let logits = Tensor::<TestBackend, 3>::zeros([1, 3, 4], &device);
        let labels = Tensor::<TestBackend, 1, Int>::from_ints(
            [IGNORE_INDEX, IGNORE_INDEX, IGNORE_INDEX].as_slice(),
            &device,
        )
        .reshape([1, 3]);

        let loss: f64 = masked_cross_entropy(logits, labels).into_scalar().elem::<f64>();
        assert_eq!(loss, 0.0);
    }
}
