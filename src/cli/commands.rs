// ============================================================
// CLI Commands and Arguments
// ============================================================
// Three subcommands:
//   train      — assemble a task from data + a model directory
//                and fine-tune it
//   summarize  — generate summaries with a (fine-tuned) model
//   fill-mask  — top-k mask filling with a masked-LM model
//
// clap's derive macros generate the parsing, help text, and
// type conversion; this module only declares the surface and
// converts arguments into application-layer option structs.

use clap::{Args, Subcommand, ValueEnum};
use std::path::PathBuf;

use crate::application::language_modeling::LmOptions;
use crate::application::summarization::SummarizerOptions;
use crate::data::lm_strategy::MaskingConfig;
use crate::ml::trainer::FitConfig;

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Fine-tune a task on tabular text data
    Train(TrainArgs),

    /// Summarize input text with a trained checkpoint
    Summarize(SummarizeArgs),

    /// Predict the top-k fillers for a masked position
    FillMask(FillMaskArgs),
}

/// Which task adapter `train` assembles.
#[derive(ValueEnum, Clone, Copy, Debug)]
pub enum TaskArg {
    Summarization,
    CausalLm,
    MaskedLm,
}

#[derive(Args, Debug)]
pub struct TrainArgs {
    /// The task to fine-tune
    #[arg(long, value_enum)]
    pub task: TaskArg,

    /// Data source: .xlsx, .xls, .csv, .json, or .jsonl
    #[arg(long)]
    pub data: PathBuf,

    /// Model directory (config.json + tokenizer.json + optional
    /// model.mpk.gz)
    #[arg(long)]
    pub model_dir: PathBuf,

    /// Directory for checkpoints, config, and the metrics log
    #[arg(long, default_value = "checkpoints")]
    pub checkpoint_dir: String,

    /// Field holding the raw input text
    #[arg(long, default_value = "text")]
    pub text_field: String,

    /// Field holding the target summary (summarization)
    #[arg(long, default_value = "summary")]
    pub summary_field: String,

    /// Field holding a prompt prefix excluded from the loss
    /// (causal LM)
    #[arg(long)]
    pub prompt_field: Option<String>,

    /// Input token budget
    #[arg(long, default_value_t = 256)]
    pub max_length: usize,

    /// Target token budget (summarization)
    #[arg(long, default_value_t = 64)]
    pub max_target_length: usize,

    /// Cut long documents into windows of this many words (LM)
    #[arg(long)]
    pub window_words: Option<usize>,

    #[arg(long, default_value_t = 8)]
    pub batch_size: usize,

    #[arg(long, default_value_t = 3)]
    pub epochs: usize,

    #[arg(long, default_value_t = 1e-4)]
    pub lr: f64,

    /// Head-only warmup epochs before the whole model trains
    #[arg(long, default_value_t = 0)]
    pub freeze_epochs: usize,

    /// Seed for the random split, shuffling, and masking
    #[arg(long, default_value_t = 42)]
    pub seed: u64,

    /// Validation fraction when the data has no is_valid column
    #[arg(long, default_value_t = 0.2)]
    pub valid_fraction: f64,

    /// Fraction of maskable tokens selected (masked LM)
    #[arg(long, default_value_t = 0.15)]
    pub mask_prob: f32,

    /// Suppress resolver warnings
    #[arg(long)]
    pub quiet: bool,
}

impl TrainArgs {
    fn fit_config(&self) -> FitConfig {
        FitConfig {
            epochs: self.epochs,
            batch_size: self.batch_size,
            lr: self.lr,
            freeze_epochs: self.freeze_epochs,
            seed: self.seed,
        }
    }

    /// CLI args → application options, summarization flavor.
    pub fn summarizer_options(&self) -> SummarizerOptions {
        SummarizerOptions {
            text_field: self.text_field.clone(),
            summary_field: self.summary_field.clone(),
            max_length: self.max_length,
            max_target_length: self.max_target_length,
            valid_fraction: self.valid_fraction,
            fit: self.fit_config(),
            ..SummarizerOptions::default()
        }
    }

    /// CLI args → application options, language-modeling flavor.
    pub fn lm_options(&self) -> LmOptions {
        LmOptions {
            text_field: self.text_field.clone(),
            prompt_field: self.prompt_field.clone(),
            max_length: self.max_length,
            valid_fraction: self.valid_fraction,
            masking: MaskingConfig {
                mask_prob: self.mask_prob,
                ..MaskingConfig::default()
            },
            window_words: self.window_words,
            fit: self.fit_config(),
            ..LmOptions::default()
        }
    }
}

#[derive(Args, Debug)]
pub struct SummarizeArgs {
    /// Model directory used for training
    #[arg(long)]
    pub model_dir: PathBuf,

    /// Checkpoint directory to restore fine-tuned weights from
    #[arg(long)]
    pub checkpoint_dir: Option<String>,

    /// Input text(s) to summarize
    #[arg(long, required = true, num_args = 1..)]
    pub text: Vec<String>,

    /// Override the generated maximum length
    #[arg(long)]
    pub max_length: Option<usize>,
}

#[derive(Args, Debug)]
pub struct FillMaskArgs {
    /// Model directory used for training
    #[arg(long)]
    pub model_dir: PathBuf,

    /// Checkpoint directory to restore fine-tuned weights from
    #[arg(long)]
    pub checkpoint_dir: Option<String>,

    /// Input containing the tokenizer's mask token
    #[arg(long)]
    pub text: String,

    /// Number of candidate fillers to return
    #[arg(long, default_value_t = 3)]
    pub n_preds: usize,
}
