//! text-tune — a thin adaptation layer that wires tabular text
//! data into Burn's training loop with a pretrained tokenizer,
//! for summarization and language-modeling fine-tuning.
//!
//! The public surface is the per-task `from_data` constructor:
//! hand it a data source and a model directory, get back a
//! ready-to-train task object with the architecture's
//! special-casing already applied.

#![recursion_limit = "256"]

pub mod application;
pub mod cli;
pub mod data;
pub mod domain;
pub mod error;
pub mod infra;
pub mod ml;

pub use application::language_modeling::{LanguageModelTask, LmOptions};
pub use application::summarization::{SummarizationTask, SummarizerOptions};
pub use data::ingest::DataSource;
pub use domain::arch::{ArchFamily, LmKind};
pub use error::TaskError;
