// ============================================================
// CLI / Presentation Layer
// ============================================================
// Entry point for all user interaction. Parses arguments with
// clap and routes to the application layer; no task logic lives
// here. Training runs on the autodiff WGPU backend, inference
// on plain WGPU.

pub mod commands;

use anyhow::Result;
use clap::Parser;

use commands::{Commands, FillMaskArgs, SummarizeArgs, TaskArg, TrainArgs};

use crate::application::language_modeling::LanguageModelTask;
use crate::application::summarization::SummarizationTask;
use crate::data::ingest::DataSource;
use crate::domain::arch::LmKind;
use crate::infra::checkpoint::CheckpointManager;
use crate::ml::inferencer;
use crate::ml::policy::{resolve_gen_kwargs, GenKwargs, TokKwargs};
use crate::ml::resolver::{Resolver, ResolverConfig};
use crate::ml::seq2seq::Seq2SeqModel;

type TrainBackend = burn::backend::Autodiff<burn::backend::Wgpu>;
type InferBackend = burn::backend::Wgpu;

fn device() -> burn::backend::wgpu::WgpuDevice {
    burn::backend::wgpu::WgpuDevice::default()
}

#[derive(Parser, Debug)]
#[command(
    name = "text-tune",
    version,
    about = "Fine-tune transformer text tasks (summarization, language modeling) on Burn."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Match on the subcommand and dispatch. This layer only
    /// routes, never computes.
    pub fn run(self) -> Result<()> {
        match self.command {
            Commands::Train(args) => run_train(args),
            Commands::Summarize(args) => run_summarize(args),
            Commands::FillMask(args) => run_fill_mask(args),
        }
    }
}

fn run_train(args: TrainArgs) -> Result<()> {
    let device = device();
    let resolver_cfg = ResolverConfig { quiet: args.quiet };
    let source = DataSource::Path(args.data.clone());

    match args.task {
        TaskArg::Summarization => {
            let task = SummarizationTask::<TrainBackend>::from_data(
                source,
                &args.model_dir,
                args.summarizer_options(),
                resolver_cfg,
                &device,
            )?;
            let task = task.fit(&args.checkpoint_dir)?;
            task.show_results(4)?;
        }
        TaskArg::CausalLm | TaskArg::MaskedLm => {
            let kind = match args.task {
                TaskArg::CausalLm => LmKind::Causal,
                _ => LmKind::Masked,
            };
            let task = LanguageModelTask::<TrainBackend>::from_data(
                source,
                &args.model_dir,
                kind,
                args.lm_options(),
                resolver_cfg,
                &device,
            )?;
            let task = task.fit(&args.checkpoint_dir)?;
            task.show_results(4)?;
        }
    }

    println!("Training complete. Checkpoint saved.");
    Ok(())
}

fn run_summarize(args: SummarizeArgs) -> Result<()> {
    let device = device();
    let resolver = Resolver::new(ResolverConfig::default());
    let (parts, model) =
        resolver.load_seq2seq::<InferBackend>(&args.model_dir, &TokKwargs::default(), &device)?;
    let model = restore(model, args.checkpoint_dir.as_deref(), &device)?;

    let mut user = GenKwargs::new();
    if let Some(max_length) = args.max_length {
        user.set("max_length", max_length);
    }
    let gen_kwargs = resolve_gen_kwargs(
        parts.arch,
        parts.spec.summarization_defaults(),
        (!user.is_empty()).then_some(user),
        Seq2SeqModel::<InferBackend>::GENERATE_PARAMS,
        |token| parts.tokenizer.token_to_id(token),
    );

    let inputs: Vec<&str> = args.text.iter().map(String::as_str).collect();
    let results = inferencer::summarize(
        &model,
        &parts.tokenizer,
        parts.arch,
        &gen_kwargs,
        &inputs,
        None,
        &device,
    )?;

    for result in results {
        println!("{}", result.summary_text);
    }
    Ok(())
}

fn run_fill_mask(args: FillMaskArgs) -> Result<()> {
    let device = device();
    let resolver = Resolver::new(ResolverConfig::default());
    let (parts, model) = resolver.load_lm::<InferBackend>(
        &args.model_dir,
        LmKind::Masked,
        &TokKwargs::default(),
        &device,
    )?;
    let model = restore(model, args.checkpoint_dir.as_deref(), &device)?;

    let candidates =
        inferencer::fill_mask(&model, &parts.tokenizer, &args.text, args.n_preds, &device)?;
    for (rank, candidate) in candidates.iter().enumerate() {
        println!("{}. {}", rank + 1, candidate);
    }
    Ok(())
}

/// Restore fine-tuned weights when a checkpoint directory was
/// given and holds one; otherwise keep the resolved weights.
fn restore<M: burn::module::Module<InferBackend>>(
    model: M,
    checkpoint_dir: Option<&str>,
    device: &burn::backend::wgpu::WgpuDevice,
) -> Result<M> {
    let Some(dir) = checkpoint_dir else {
        return Ok(model);
    };
    let ckpt = CheckpointManager::new(dir);
    if !ckpt.has_checkpoint() {
        tracing::warn!("no checkpoint in '{dir}'; using resolved weights");
        return Ok(model);
    }
    Ok(ckpt.load_latest(model, device)?)
}
