// ============================================================
// Summarization Task
// ============================================================
// Assembles the full pipeline for sequence-to-sequence
// summarization:
//
//   1. ingest the raw source into records
//   2. resolve the checkpoint (tokenizer, spec, weights) for
//      the seq2seq category — the family tag is known before
//      the tokenizer exists
//   3. apply the generation-kwargs pipeline (checkpoint
//      defaults → filter → decoder-start override)
//   4. split into train/validation (validity column if the
//      data carries one, seeded random otherwise)
//   5. map records into raw text items; tokenization itself
//      happens per batch inside the batcher
//
// `fit` hands everything to the trainer with the task's
// default metric set (n-gram overlap + embedding similarity).

use burn::prelude::*;
use burn::tensor::backend::AutodiffBackend;
use std::path::Path;
use std::sync::Arc;

use crate::application::display::{print_rows, truncate_chars, ResultRow};
use crate::data::batcher::{Seq2SeqBatchCfg, Seq2SeqBatcher};
use crate::data::dataset::{SummarizationItem, TextDataset};
use crate::data::ingest::{self, DataSource};
use crate::data::preprocessor::TextCleaner;
use crate::data::splitter::{infer_split, split_records, SplitStrategy};
use crate::domain::arch::ArchFamily;
use crate::domain::record::Record;
use crate::error::{Result, TaskError};
use crate::infra::checkpoint::CheckpointManager;
use crate::infra::metrics::{EmbeddingSimilarity, MetricsLogger, RougeScore, TaskMetric};
use crate::ml::inferencer::{self, SummaryResult};
use crate::ml::policy::{policy_for, resolve_gen_kwargs, GenKwargs, TokKwargs};
use crate::ml::resolver::{ModelSpec, ResolvedParts, Resolver, ResolverConfig};
use crate::ml::seq2seq::Seq2SeqModel;
use crate::ml::tokenizer::TokenizerAdapter;
use crate::ml::trainer::{self, FitConfig};

pub const TASK_CONFIG_FILE: &str = "task_config.json";

/// Everything `from_data` accepts besides the data and the
/// model directory. Serializable so a run's configuration lands
/// next to its checkpoints.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct SummarizerOptions {
    /// Field holding the raw input text
    pub text_field: String,
    /// Field holding the target summary
    pub summary_field: String,
    /// Input token budget
    pub max_length: usize,
    /// Target token budget
    pub max_target_length: usize,
    /// Validation fraction for the inferred random split
    pub valid_fraction: f64,
    /// Explicit split strategy; None = infer from the data
    pub split: Option<SplitStrategy>,
    /// Extra tokenizer-construction kwargs
    pub tok_kwargs: TokKwargs,
    /// Generation kwargs; None = the checkpoint's own defaults
    /// for families that ship them
    pub gen_kwargs: Option<GenKwargs>,
    pub fit: FitConfig,
}

impl Default for SummarizerOptions {
    fn default() -> Self {
        Self {
            text_field: "text".into(),
            summary_field: "summary".into(),
            max_length: 256,
            max_target_length: 64,
            valid_fraction: 0.2,
            split: None,
            tok_kwargs: TokKwargs::default(),
            gen_kwargs: None,
            fit: FitConfig::default(),
        }
    }
}

/// A ready-to-train summarization task: data + model + policy
/// outputs + metrics, owned as one unit by the training loop.
#[derive(Debug)]
pub struct SummarizationTask<B: AutodiffBackend> {
    pub arch: ArchFamily,
    spec:        ModelSpec,
    tokenizer:   Arc<TokenizerAdapter>,
    model:       Seq2SeqModel<B>,
    train_items: Vec<SummarizationItem>,
    valid_items: Vec<SummarizationItem>,
    gen_kwargs:  GenKwargs,
    options:     SummarizerOptions,
    device:      B::Device,
}

impl<B: AutodiffBackend> SummarizationTask<B> {
    /// Build a task from a raw data source and a model
    /// directory. Fails on unreadable/unsupported sources and
    /// on checkpoints incompatible with the seq2seq category.
    pub fn from_data(
        source: DataSource,
        model_dir: impl AsRef<Path>,
        options: SummarizerOptions,
        resolver_cfg: ResolverConfig,
        device: &B::Device,
    ) -> Result<Self> {
        let records = ingest::load(source)?;
        let strategy = options
            .split
            .clone()
            .unwrap_or_else(|| infer_split(&records, options.valid_fraction, options.fit.seed));

        let resolver = Resolver::new(resolver_cfg);
        let (parts, model) =
            resolver.load_seq2seq::<B>(model_dir.as_ref(), &options.tok_kwargs, device)?;
        let ResolvedParts {
            arch,
            spec,
            tokenizer,
            ..
        } = parts;

        let gen_kwargs = resolve_gen_kwargs(
            arch,
            spec.summarization_defaults(),
            options.gen_kwargs.clone(),
            Seq2SeqModel::<B>::GENERATE_PARAMS,
            |token| tokenizer.token_to_id(token),
        );

        let (train_records, valid_records) = split_records(records, &strategy);
        let cleaner = TextCleaner::new();
        let train_items = to_items(&train_records, &options, &cleaner);
        let valid_items = to_items(&valid_records, &options, &cleaner);
        if train_items.is_empty() {
            return Err(TaskError::Invalid(format!(
                "no usable records: every row lacks '{}' or '{}'",
                options.text_field, options.summary_field
            )));
        }

        tracing::info!(
            "Summarization task ready: {} train / {} validation items, family '{}'",
            train_items.len(),
            valid_items.len(),
            arch.tag()
        );

        Ok(Self {
            arch,
            spec,
            tokenizer: Arc::new(tokenizer),
            model,
            train_items,
            valid_items,
            gen_kwargs,
            options,
            device: device.clone(),
        })
    }

    /// Run fine-tuning to completion, checkpointing into
    /// `checkpoint_dir`. Returns the task with trained weights.
    pub fn fit(mut self, checkpoint_dir: impl AsRef<Path>) -> Result<Self> {
        let ckpt = CheckpointManager::new(checkpoint_dir.as_ref());
        ckpt.save_config(TASK_CONFIG_FILE, &self.options)?;

        let mut metrics = self.default_metrics();
        let names: Vec<&str> = metrics.iter().map(|m| m.name()).collect();
        let logger = MetricsLogger::new(ckpt.dir(), &names)?;

        let model = trainer::fit_seq2seq(
            self.model,
            TextDataset::new(self.train_items.clone()),
            TextDataset::new(self.valid_items.clone()),
            Seq2SeqBatchCfg {
                tokenizer: self.tokenizer.clone(),
                input_prefix: policy_for(self.arch).input_prefix,
                max_length: self.options.max_length,
                max_target_length: self.options.max_target_length,
                decoder_start: self
                    .gen_kwargs
                    .u32_value("decoder_start_token_id")
                    .unwrap_or_else(|| self.spec.decoder_start()),
                pad_id: self.tokenizer.pad_id_or_zero(),
            },
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

    /// Generate one summary per input. `overrides`, when given,
    /// replaces the task's stored generation kwargs.
    pub fn summarize(
        &self,
        inputs: &[&str],
        overrides: Option<&GenKwargs>,
    ) -> Result<Vec<SummaryResult>> {
        inferencer::summarize(
            &self.model,
            &self.tokenizer,
            self.arch,
            &self.gen_kwargs,
            inputs,
            overrides,
            &self.device,
        )
    }

    /// Print up to `max_n` validation items with their target
    /// and generated summaries.
    pub fn show_results(&self, max_n: usize) -> Result<()> {
        let mut rows = Vec::new();
        for item in self.valid_items.iter().take(max_n) {
            let generated = self.summarize(&[item.text.as_str()], None)?;
            rows.push(ResultRow {
                text: truncate_chars(&item.text, 80),
                target: item.summary.clone(),
                prediction: generated
                    .into_iter()
                    .next()
                    .map(|r| r.summary_text)
                    .unwrap_or_default(),
            });
        }
        print_rows(&rows);
        Ok(())
    }

    fn default_metrics(&self) -> Vec<Box<dyn TaskMetric>> {
        let weights = self.model.token_embeddings();
        let [_, dim] = weights.dims();
        let matrix: Vec<f32> = weights
            .into_data()
            .convert::<f32>()
            .to_vec()
            .unwrap_or_default();

        vec![
            Box::new(RougeScore::rouge1()),
            Box::new(RougeScore::rouge2()),
            Box::new(RougeScore::rouge_l()),
            Box::new(EmbeddingSimilarity::from_matrix(matrix, dim)),
        ]
    }

    // accessors used by inference call sites and tests

    pub fn spec(&self) -> &ModelSpec {
        &self.spec
    }

    pub fn tokenizer(&self) -> &TokenizerAdapter {
        &self.tokenizer
    }

    pub fn model(&self) -> &Seq2SeqModel<B> {
        &self.model
    }

    pub fn gen_kwargs(&self) -> &GenKwargs {
        &self.gen_kwargs
    }

    pub fn train_items(&self) -> &[SummarizationItem] {
        &self.train_items
    }

    pub fn valid_items(&self) -> &[SummarizationItem] {
        &self.valid_items
    }

    /// A batcher over this task's tokenization settings, for
    /// any backend (validation runs on the inner backend).
    pub fn batcher<B2: Backend>(&self, device: B2::Device) -> Seq2SeqBatcher<B2> {
        Seq2SeqBatcher::new(
            Seq2SeqBatchCfg {
                tokenizer: self.tokenizer.clone(),
                input_prefix: policy_for(self.arch).input_prefix,
                max_length: self.options.max_length,
                max_target_length: self.options.max_target_length,
                decoder_start: self
                    .gen_kwargs
                    .u32_value("decoder_start_token_id")
                    .unwrap_or_else(|| self.spec.decoder_start()),
                pad_id: self.tokenizer.pad_id_or_zero(),
            },
            device,
        )
    }
}

/// Map records to items, skipping rows that lack either field.
fn to_items(
    records: &[Record],
    options: &SummarizerOptions,
    cleaner: &TextCleaner,
) -> Vec<SummarizationItem> {
    let mut items = Vec::with_capacity(records.len());
    for record in records {
        let (Some(text), Some(summary)) = (
            record.text(&options.text_field),
            record.text(&options.summary_field),
        ) else {
            tracing::warn!(
                "skipping record without '{}'/'{}'",
                options.text_field,
                options.summary_field
            );
            continue;
        };
        items.push(SummarizationItem {
            text: cleaner.clean(&text),
            summary: cleaner.clean(&summary),
        });
    }
    items
}
