// ============================================================
// Task Metrics
// ============================================================
// Metrics run as callbacks with three phases per evaluation
// epoch:
//
//   reset      — clear the accumulation state
//   accumulate — per validation batch, AFTER ignore-labeled
//                positions have been masked out of predictions
//                and targets (see `masked_pairs`)
//   finalize   — compute the metric over everything
//                accumulated; ZERO accumulated samples yields
//                None ("undefined for this epoch"), never an
//                error
//
// Implementations:
//   TokenAccuracy       — exact-match over aligned token pairs
//   RougeScore          — n-gram overlap / longest common
//                         subsequence F1 (Lin, 2004)
//   EmbeddingSimilarity — greedy cosine matching over the
//                         model's own token embeddings, in the
//                         style of learned-similarity scorers
//                         (Zhang et al., 2020)
//
// Plus the CSV epoch logger. Header writing is keyed on file
// existence, so registering the same names across repeated
// fits is idempotent.

use std::collections::HashMap;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::PathBuf;

use crate::domain::arch::IGNORE_INDEX;
use crate::error::Result;

/// One masked, aligned prediction/target pair plus its decoded
/// text forms.
#[derive(Debug, Clone)]
pub struct MetricSample {
    pub pred_ids:    Vec<u32>,
    pub target_ids:  Vec<u32>,
    pub pred_text:   String,
    pub target_text: String,
}

pub trait TaskMetric: Send {
    /// Display name, registered once with the epoch logger.
    fn name(&self) -> &'static str;
    fn reset(&mut self);
    fn accumulate(&mut self, sample: &MetricSample);
    /// None when nothing was accumulated this epoch.
    fn finalize(&self) -> Option<f64>;
}

/// Drop every position whose target carries the ignore
/// sentinel; survivors stay aligned. N input pairs with M
/// ignored yield exactly N - M pairs.
pub fn masked_pairs(preds: &[i64], targets: &[i64]) -> Vec<(u32, u32)> {
    preds
        .iter()
        .zip(targets.iter())
        .filter(|(_, &t)| t != IGNORE_INDEX as i64)
        .map(|(&p, &t)| (p.max(0) as u32, t.max(0) as u32))
        .collect()
}

// ─── TokenAccuracy ────────────────────────────────────────────────────────────

/// Exact-match accuracy over aligned token pairs.
#[derive(Debug, Default)]
pub struct TokenAccuracy {
    correct: usize,
    total:   usize,
}

impl TokenAccuracy {
    pub fn new() -> Self {
        Self::default()
    }
}

impl TaskMetric for TokenAccuracy {
    fn name(&self) -> &'static str {
        "lm_accuracy"
    }

    fn reset(&mut self) {
        self.correct = 0;
        self.total = 0;
    }

    fn accumulate(&mut self, sample: &MetricSample) {
        for (p, t) in sample.pred_ids.iter().zip(sample.target_ids.iter()) {
            self.total += 1;
            if p == t {
                self.correct += 1;
            }
        }
    }

    fn finalize(&self) -> Option<f64> {
        (self.total > 0).then(|| self.correct as f64 / self.total as f64)
    }
}

// ─── ROUGE ────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy)]
enum RougeVariant {
    Ngram(usize),
    Lcs,
}

/// Sentence-level ROUGE F1, averaged over accumulated samples.
pub struct RougeScore {
    variant: RougeVariant,
    name:    &'static str,
    sum:     f64,
    count:   usize,
}

impl RougeScore {
    pub fn rouge1() -> Self {
        Self { variant: RougeVariant::Ngram(1), name: "rouge1", sum: 0.0, count: 0 }
    }

    pub fn rouge2() -> Self {
        Self { variant: RougeVariant::Ngram(2), name: "rouge2", sum: 0.0, count: 0 }
    }

    pub fn rouge_l() -> Self {
        Self { variant: RougeVariant::Lcs, name: "rougeL", sum: 0.0, count: 0 }
    }
}

impl TaskMetric for RougeScore {
    fn name(&self) -> &'static str {
        self.name
    }

    fn reset(&mut self) {
        self.sum = 0.0;
        self.count = 0;
    }

    fn accumulate(&mut self, sample: &MetricSample) {
        let pred = simple_tokens(&sample.pred_text);
        let target = simple_tokens(&sample.target_text);
        if target.is_empty() {
            return;
        }
        let f1 = match self.variant {
            RougeVariant::Ngram(n) => ngram_f1(&pred, &target, n),
            RougeVariant::Lcs => lcs_f1(&pred, &target),
        };
        self.sum += f1;
        self.count += 1;
    }

    fn finalize(&self) -> Option<f64> {
        (self.count > 0).then(|| self.sum / self.count as f64)
    }
}

fn simple_tokens(text: &str) -> Vec<String> {
    text.split_whitespace()
        .map(|w| w.to_lowercase())
        .collect()
}

fn ngram_counts(tokens: &[String], n: usize) -> HashMap<&[String], usize> {
    let mut counts: HashMap<&[String], usize> = HashMap::new();
    for window in tokens.windows(n) {
        *counts.entry(window).or_insert(0) += 1;
    }
    counts
}

fn ngram_f1(pred: &[String], target: &[String], n: usize) -> f64 {
    let pred_counts = ngram_counts(pred, n);
    let target_counts = ngram_counts(target, n);
    let pred_total: usize = pred_counts.values().sum();
    let target_total: usize = target_counts.values().sum();
    if pred_total == 0 || target_total == 0 {
        return 0.0;
    }

    // clipped overlap, the standard ROUGE-N counting
    let overlap: usize = target_counts
        .iter()
        .map(|(gram, &t_count)| t_count.min(pred_counts.get(gram).copied().unwrap_or(0)))
        .sum();

    f_measure(overlap as f64 / pred_total as f64, overlap as f64 / target_total as f64)
}

fn lcs_f1(pred: &[String], target: &[String]) -> f64 {
    if pred.is_empty() || target.is_empty() {
        return 0.0;
    }
    let lcs = lcs_length(pred, target) as f64;
    f_measure(lcs / pred.len() as f64, lcs / target.len() as f64)
}

fn lcs_length(a: &[String], b: &[String]) -> usize {
    let mut row = vec![0usize; b.len() + 1];
    for item_a in a {
        let mut prev_diag = 0usize;
        for (j, item_b) in b.iter().enumerate() {
            let current = row[j + 1];
            row[j + 1] = if item_a == item_b {
                prev_diag + 1
            } else {
                row[j + 1].max(row[j])
            };
            prev_diag = current;
        }
    }
    row[b.len()]
}

fn f_measure(precision: f64, recall: f64) -> f64 {
    if precision + recall == 0.0 {
        0.0
    } else {
        2.0 * precision * recall / (precision + recall)
    }
}

// ─── Embedding similarity ─────────────────────────────────────────────────────

/// Greedy cosine-matching F1 over token embedding rows. The
/// matrix is captured once at assembly from the resolved model,
/// so scores reflect what that model considers similar.
pub struct EmbeddingSimilarity {
    embeddings: Vec<f32>,
    dim:        usize,
    sum:        f64,
    count:      usize,
}

impl EmbeddingSimilarity {
    /// `embeddings` is row-major [vocab, dim].
    pub fn from_matrix(embeddings: Vec<f32>, dim: usize) -> Self {
        Self { embeddings, dim, sum: 0.0, count: 0 }
    }

    fn row(&self, id: u32) -> Option<&[f32]> {
        let start = id as usize * self.dim;
        self.embeddings.get(start..start + self.dim)
    }

    fn greedy_match(&self, from: &[u32], to: &[u32]) -> f64 {
        let mut total = 0.0;
        let mut counted = 0usize;
        for &a in from {
            let Some(row_a) = self.row(a) else { continue };
            let mut best = 0.0f64;
            for &b in to {
                let Some(row_b) = self.row(b) else { continue };
                best = best.max(cosine(row_a, row_b));
            }
            total += best;
            counted += 1;
        }
        if counted == 0 {
            0.0
        } else {
            total / counted as f64
        }
    }
}

impl TaskMetric for EmbeddingSimilarity {
    fn name(&self) -> &'static str {
        "similarity"
    }

    fn reset(&mut self) {
        self.sum = 0.0;
        self.count = 0;
    }

    fn accumulate(&mut self, sample: &MetricSample) {
        if sample.pred_ids.is_empty() || sample.target_ids.is_empty() {
            return;
        }
        let precision = self.greedy_match(&sample.pred_ids, &sample.target_ids);
        let recall = self.greedy_match(&sample.target_ids, &sample.pred_ids);
        self.sum += f_measure(precision, recall);
        self.count += 1;
    }

    fn finalize(&self) -> Option<f64> {
        (self.count > 0).then(|| self.sum / self.count as f64)
    }
}

fn cosine(a: &[f32], b: &[f32]) -> f64 {
    let mut dot = 0.0f64;
    let mut norm_a = 0.0f64;
    let mut norm_b = 0.0f64;
    for (&x, &y) in a.iter().zip(b.iter()) {
        dot += (x * y) as f64;
        norm_a += (x * x) as f64;
        norm_b += (y * y) as f64;
    }
    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        dot / (norm_a.sqrt() * norm_b.sqrt())
    }
}

// ─── Epoch CSV log ────────────────────────────────────────────────────────────

/// Appends one row of epoch metrics to metrics.csv. The header
/// is written only when the file does not exist yet, so the log
/// survives across runs and repeated setup is idempotent.
pub struct MetricsLogger {
    csv_path: PathBuf,
}

impl MetricsLogger {
    pub fn new(dir: impl Into<PathBuf>, metric_names: &[&str]) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        let csv_path = dir.join("metrics.csv");

        if !csv_path.exists() {
            let mut file = fs::File::create(&csv_path)?;
            writeln!(file, "epoch,train_loss,val_loss,{}", metric_names.join(","))?;
        }

        Ok(Self { csv_path })
    }

    /// Append one epoch row. Undefined metrics render as empty
    /// cells.
    pub fn log(
        &self,
        epoch: usize,
        train_loss: f64,
        val_loss: f64,
        metrics: &[(&str, Option<f64>)],
    ) -> Result<()> {
        let mut file = OpenOptions::new().append(true).open(&self.csv_path)?;

        let rendered: Vec<String> = metrics
            .iter()
            .map(|(_, value)| value.map(|v| format!("{v:.6}")).unwrap_or_default())
            .collect();
        writeln!(
            file,
            "{},{:.6},{:.6},{}",
            epoch,
            train_loss,
            val_loss,
            rendered.join(",")
        )?;
        Ok(())
    }

    pub fn csv_path(&self) -> &PathBuf {
        &self.csv_path
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    fn sample(pred: &[u32], target: &[u32], pred_text: &str, target_text: &str) -> MetricSample {
        MetricSample {
            pred_ids: pred.to_vec(),
            target_ids: target.to_vec(),
            pred_text: pred_text.to_string(),
            target_text: target_text.to_string(),
        }
    }

    #[test]
    fn test_masked_pairs_retains_exactly_unignored() {
        let ignore = IGNORE_INDEX as i64;
        let preds = vec![1, 2, 3, 4, 5];
        let targets = vec![1, ignore, 9, ignore, 5];
        let pairs = masked_pairs(&preds, &targets);
        // 5 pairs, 2 ignore-labeled → exactly 3 survive
        assert_eq!(pairs, vec![(1, 1), (3, 9), (5, 5)]);
    }

    #[test]
    fn test_accuracy_over_pairs() {
        let mut metric = TokenAccuracy::new();
        metric.accumulate(&sample(&[1, 2, 3, 4], &[1, 9, 3, 9], "", ""));
        assert_eq!(metric.finalize(), Some(0.5));
    }

    #[test]
    fn test_zero_accumulation_is_undefined_not_an_error() {
        let accuracy = TokenAccuracy::new();
        assert_eq!(accuracy.finalize(), None);
        let rouge = RougeScore::rouge1();
        assert_eq!(rouge.finalize(), None);
        let sim = EmbeddingSimilarity::from_matrix(vec![1.0, 0.0], 2);
        assert_eq!(sim.finalize(), None);
    }

    #[test]
    fn test_reset_clears_state() {
        let mut metric = TokenAccuracy::new();
        metric.accumulate(&sample(&[1], &[1], "", ""));
        assert_eq!(metric.finalize(), Some(1.0));
        metric.reset();
        assert_eq!(metric.finalize(), None);
    }

    #[test]
    fn test_rouge1_identical_texts() {
        let mut metric = RougeScore::rouge1();
        metric.accumulate(&sample(&[], &[], "the cat sat", "the cat sat"));
        assert_eq!(metric.finalize(), Some(1.0));
    }

    #[test]
    fn test_rouge1_known_value() {
        let mut metric = RougeScore::rouge1();
        // overlap 2 ("the", "cat"); p = 2/3, r = 2/4 → f1 = 4/7
        metric.accumulate(&sample(&[], &[], "the cat ran", "the cat sat down"));
        let value = metric.finalize().unwrap();
        assert!((value - 4.0 / 7.0).abs() < 1e-9, "got {value}");
    }

    #[test]
    fn test_rouge2_disjoint_texts() {
        let mut metric = RougeScore::rouge2();
        metric.accumulate(&sample(&[], &[], "a b c", "x y z"));
        assert_eq!(metric.finalize(), Some(0.0));
    }

    #[test]
    fn test_rouge_l_subsequence() {
        let mut metric = RougeScore::rouge_l();
        // LCS("a b c d", "a c d") = 3; p = 3/4, r = 3/3 → 6/7
        metric.accumulate(&sample(&[], &[], "a b c d", "a c d"));
        let value = metric.finalize().unwrap();
        assert!((value - 6.0 / 7.0).abs() < 1e-9, "got {value}");
    }

    #[test]
    fn test_similarity_identical_ids_score_one() {
        // orthonormal 2-d embeddings for ids 0 and 1
        let matrix = vec![1.0, 0.0, 0.0, 1.0];
        let mut metric = EmbeddingSimilarity::from_matrix(matrix, 2);
        metric.accumulate(&sample(&[0, 1], &[0, 1], "", ""));
        let value = metric.finalize().unwrap();
        assert!((value - 1.0).abs() < 1e-9, "got {value}");
    }

    #[test]
    fn test_similarity_orthogonal_ids_score_zero() {
        let matrix = vec![1.0, 0.0, 0.0, 1.0];
        let mut metric = EmbeddingSimilarity::from_matrix(matrix, 2);
        metric.accumulate(&sample(&[0], &[1], "", ""));
        assert_eq!(metric.finalize(), Some(0.0));
    }

    #[test]
    fn test_logger_header_written_once() {
        let dir = tempfile::tempdir().unwrap();
        {
            let logger = MetricsLogger::new(dir.path(), &["rouge1", "similarity"]).unwrap();
            logger
                .log(1, 2.5, 2.4, &[("rouge1", Some(0.5)), ("similarity", None)])
                .unwrap();
        }
        // second setup with the same names must not duplicate the header
        let logger = MetricsLogger::new(dir.path(), &["rouge1", "similarity"]).unwrap();
        logger
            .log(2, 2.0, 1.9, &[("rouge1", Some(0.6)), ("similarity", Some(0.4))])
            .unwrap();

        let contents = std::fs::read_to_string(logger.csv_path()).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], "epoch,train_loss,val_loss,rouge1,similarity");
        assert!(lines[1].ends_with("0.500000,"));
    }
}
