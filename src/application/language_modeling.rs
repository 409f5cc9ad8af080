// ============================================================
// Language-Modeling Task
// ============================================================
// Assembles causal or masked language-model fine-tuning over a
// single text field. Beyond the shared pipeline (ingest →
// resolve → split → items) this task owns two special steps:
//
//   pad fixup — some families ship tokenizers with no pad
//     token at all. One is registered, the spec's pad id is
//     pointed at the new vocabulary entry, and the model's
//     embedding table is grown to match.
//
//   windowing — documents longer than the input budget can be
//     cut into overlapping word windows, each becoming its own
//     training item (mutually exclusive with prompt masking).

use burn::tensor::backend::AutodiffBackend;
use std::path::Path;
use std::sync::Arc;

use crate::application::display::{lm_row, print_rows};
use crate::data::batcher::{LmBatchCfg, LmBatcher};
use crate::data::chunker::TextWindows;
use crate::data::dataset::{LmItem, TextDataset};
use crate::data::ingest::{self, DataSource};
use crate::data::lm_strategy::{LmStrategy, MaskingConfig};
use crate::data::preprocessor::TextCleaner;
use crate::data::splitter::{infer_split, split_records, SplitStrategy};
use crate::domain::arch::{ArchFamily, LmKind};
use crate::domain::record::Record;
use crate::error::{Result, TaskError};
use crate::infra::checkpoint::CheckpointManager;
use crate::infra::metrics::{MetricsLogger, TaskMetric, TokenAccuracy};
use crate::ml::inferencer;
use crate::ml::lm::LmModel;
use crate::ml::resolver::{ModelSpec, ResolvedParts, Resolver, ResolverConfig};
use crate::ml::tokenizer::TokenizerAdapter;
use crate::ml::trainer::{self, FitConfig};

pub const TASK_CONFIG_FILE: &str = "task_config.json";

/// Token registered when a checkpoint's tokenizer has no pad.
const FALLBACK_PAD_TOKEN: &str = "<pad>";

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct LmOptions {
    /// Field holding the raw text
    pub text_field: String,
    /// Optional field holding a prompt prefix whose span is
    /// excluded from the loss (causal only)
    pub prompt_field: Option<String>,
    /// Input token budget
    pub max_length: usize,
    /// Validation fraction for the inferred random split
    pub valid_fraction: f64,
    /// Explicit split strategy; None = infer from the data
    pub split: Option<SplitStrategy>,
    /// Extra tokenizer-construction kwargs
    pub tok_kwargs: crate::ml::policy::TokKwargs,
    /// Masked-LM selection probabilities
    pub masking: MaskingConfig,
    /// Cut documents into windows of this many words; None =
    /// plain truncation
    pub window_words: Option<usize>,
    pub fit: FitConfig,
}

impl Default for LmOptions {
    fn default() -> Self {
        Self {
            text_field: "text".into(),
            prompt_field: None,
            max_length: 128,
            valid_fraction: 0.2,
            split: None,
            tok_kwargs: Default::default(),
            masking: MaskingConfig::default(),
            window_words: None,
            fit: FitConfig::default(),
        }
    }
}

/// A ready-to-train language-modeling task. The `kind` tag
/// drives every objective-specific branch, including result
/// display.
pub struct LanguageModelTask<B: AutodiffBackend> {
    pub kind: LmKind,
    pub arch: ArchFamily,
    spec:        ModelSpec,
    tokenizer:   Arc<TokenizerAdapter>,
    model:       LmModel<B>,
    train_items: Vec<LmItem>,
    valid_items: Vec<LmItem>,
    options:     LmOptions,
    device:      B::Device,
}

impl<B: AutodiffBackend> LanguageModelTask<B> {
    /// Build a task from a raw data source, a model directory,
    /// and the objective kind.
    pub fn from_data(
        source: DataSource,
        model_dir: impl AsRef<Path>,
        kind: LmKind,
        options: LmOptions,
        resolver_cfg: ResolverConfig,
        device: &B::Device,
    ) -> Result<Self> {
        if options.prompt_field.is_some() && options.window_words.is_some() {
            return Err(TaskError::Invalid(
                "prompt_field cannot be combined with window chunking".into(),
            ));
        }

        let records = ingest::load(source)?;
        let strategy = options
            .split
            .clone()
            .unwrap_or_else(|| infer_split(&records, options.valid_fraction, options.fit.seed));

        let resolver = Resolver::new(resolver_cfg);
        let (parts, model) =
            resolver.load_lm::<B>(model_dir.as_ref(), kind, &options.tok_kwargs, device)?;
        let ResolvedParts {
            arch,
            mut spec,
            mut tokenizer,
            ..
        } = parts;
        let mut model = model;

        // pad fixup: register a pad token and grow the embedding
        // table so padded batches stay in vocabulary range
        if tokenizer.pad_id().is_none() {
            let pad_id = tokenizer.ensure_pad_token(FALLBACK_PAD_TOKEN)?;
            spec.pad_token_id = Some(pad_id);
            model = model.resize_vocab(tokenizer.vocab_size(), device);
        }

        if kind == LmKind::Masked && tokenizer.mask_id().is_none() {
            return Err(TaskError::Invalid(
                "masked language modeling needs a tokenizer with a mask token".into(),
            ));
        }

        let (train_records, valid_records) = split_records(records, &strategy);
        let cleaner = TextCleaner::new();
        let windows = options.window_words.map(TextWindows::for_budget);
        let train_items = to_items(&train_records, &options, &cleaner, windows.as_ref());
        let valid_items = to_items(&valid_records, &options, &cleaner, windows.as_ref());
        if train_items.is_empty() {
            return Err(TaskError::Invalid(format!(
                "no usable records: every row lacks '{}'",
                options.text_field
            )));
        }

        tracing::info!(
            "LM task ready ({:?}): {} train / {} validation items, family '{}'",
            kind,
            train_items.len(),
            valid_items.len(),
            arch.tag()
        );

        Ok(Self {
            kind,
            arch,
            spec,
            tokenizer: Arc::new(tokenizer),
            model,
            train_items,
            valid_items,
            options,
            device: device.clone(),
        })
    }

    /// Run fine-tuning to completion, checkpointing into
    /// `checkpoint_dir`.
    pub fn fit(mut self, checkpoint_dir: impl AsRef<Path>) -> Result<Self> {
        let ckpt = CheckpointManager::new(checkpoint_dir.as_ref());
        ckpt.save_config(TASK_CONFIG_FILE, &self.options)?;

        let mut metrics: Vec<Box<dyn TaskMetric>> = vec![Box::new(TokenAccuracy::new())];
        let mut names: Vec<&str> = metrics.iter().map(|m| m.name()).collect();
        names.push("perplexity");
        let logger = MetricsLogger::new(ckpt.dir(), &names)?;
        let batch_cfg = self.batch_cfg();

        let model = trainer::fit_lm(
            self.model,
            TextDataset::new(self.train_items.clone()),
            TextDataset::new(self.valid_items.clone()),
            batch_cfg,
            self.tokenizer.clone(),
            &mut metrics,
            &ckpt,
            &logger,
            &self.options.fit,
            self.device.clone(),
        )?;

        self.model = model;
        Ok(self)
    }

    /// Top-k mask filling (masked objective only).
    pub fn fill_mask(&self, input: &str, n_preds: usize) -> Result<Vec<String>> {
        inferencer::fill_mask(&self.model, &self.tokenizer, input, n_preds, &self.device)
    }

    /// Print up to `max_n` validation items with targets and
    /// predictions. One switch over the task category selects
    /// the causal or masked view.
    pub fn show_results(&self, max_n: usize) -> Result<()> {
        let items: Vec<LmItem> = self.valid_items.iter().take(max_n).cloned().collect();
        if items.is_empty() {
            return Ok(());
        }

        let batcher = LmBatcher::<B>::new(self.batch_cfg(), self.device.clone());
        let batch = burn::data::dataloader::batcher::Batcher::batch(&batcher, items, &self.device);
        let logits = self
            .model
            .forward(batch.input_ids.clone(), Some(batch.attention_mask.clone()));

        let [batch_size, seq_len, _] = logits.dims();
        let preds: Vec<i64> = logits
            .argmax(2)
            .reshape([batch_size, seq_len])
            .into_data()
            .convert::<i64>()
            .to_vec()
            .unwrap_or_default();
        let inputs: Vec<i64> = batch
            .input_ids
            .into_data()
            .convert::<i64>()
            .to_vec()
            .unwrap_or_default();
        let targets: Vec<i64> = batch
            .labels
            .into_data()
            .convert::<i64>()
            .to_vec()
            .unwrap_or_default();

        let mut rows = Vec::with_capacity(batch_size);
        for row in 0..batch_size {
            let range = row * seq_len..(row + 1) * seq_len;
            rows.push(lm_row(
                self.kind,
                &self.tokenizer,
                &inputs[range.clone()],
                &preds[range.clone()],
                &targets[range],
                self.tokenizer.pad_id_or_zero(),
            ));
        }
        print_rows(&rows);
        Ok(())
    }

    fn batch_cfg(&self) -> LmBatchCfg {
        LmBatchCfg {
            tokenizer: self.tokenizer.clone(),
            strategy: match self.kind {
                LmKind::Causal => LmStrategy::Causal,
                LmKind::Masked => LmStrategy::Masked(self.options.masking.clone()),
            },
            max_length: self.options.max_length,
            pad_id: self.tokenizer.pad_id_or_zero(),
            mask_id: self.tokenizer.mask_id(),
            special_ids: Arc::new(self.tokenizer.special_ids()),
            vocab_size: self.tokenizer.vocab_size() as u32,
            seed: self.options.fit.seed,
        }
    }

    // accessors used by inference call sites and tests

    pub fn spec(&self) -> &ModelSpec {
        &self.spec
    }

    pub fn tokenizer(&self) -> &TokenizerAdapter {
        &self.tokenizer
    }

    pub fn model(&self) -> &LmModel<B> {
        &self.model
    }

    pub fn train_items(&self) -> &[LmItem] {
        &self.train_items
    }

    pub fn valid_items(&self) -> &[LmItem] {
        &self.valid_items
    }
}

/// Map records to items: clean, then either window long texts
/// or keep one item per record (with its optional prompt).
fn to_items(
    records: &[Record],
    options: &LmOptions,
    cleaner: &TextCleaner,
    windows: Option<&TextWindows>,
) -> Vec<LmItem> {
    let mut items = Vec::with_capacity(records.len());
    for record in records {
        let Some(text) = record.text(&options.text_field) else {
            tracing::warn!("skipping record without '{}'", options.text_field);
            continue;
        };
        let text = cleaner.clean(&text);

        match windows {
            Some(windows) => {
                for window in windows.split(&text) {
                    items.push(LmItem {
                        text: window,
                        prompt: None,
                    });
                }
            }
            None => {
                let prompt = options
                    .prompt_field
                    .as_ref()
                    .and_then(|field| record.text(field))
                    .map(|p| cleaner.clean(&p));
                items.push(LmItem { text, prompt });
            }
        }
    }
    items
}
