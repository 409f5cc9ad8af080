// ============================================================
// Model Resolver
// ============================================================
// Turns a model directory into ready objects for one task
// category. A directory follows the registry checkpoint layout:
//
//   config.json      — the model spec (class name, dimensions,
//                      special-token ids, task params)
//   tokenizer.json   — the pretrained tokenizer
//   model.mpk.gz     — weights record (optional; absent means
//                      fresh initialization, e.g. training from
//                      scratch)
//
// Resolution order is fixed: the spec is read FIRST so the
// architecture family is known before the tokenizer is
// constructed (language-tag kwargs) and before generation
// kwargs are filtered. A missing config/tokenizer, a class name
// incompatible with the requested category, or an unreadable
// weights record is a Resolution error; an unrecognized class
// name is NOT — it just disables special-casing.
//
// Resolution performs plain synchronous reads with no retry; a
// failure is terminal for the attempt.

use burn::{
    prelude::*,
    record::{CompactRecorder, Recorder},
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

use crate::domain::arch::{ArchFamily, LmKind, ModelCategory};
use crate::error::{Result, TaskError};
use crate::ml::lm::{LmModel, LmModelConfig};
use crate::ml::policy::{policy_for, GenKwargs, TokKwargs};
use crate::ml::seq2seq::{Seq2SeqModel, Seq2SeqModelConfig};
use crate::ml::tokenizer::TokenizerAdapter;

const CONFIG_FILE: &str = "config.json";
const TOKENIZER_FILE: &str = "tokenizer.json";
const WEIGHTS_BASENAME: &str = "model";
const WEIGHTS_FILE: &str = "model.mpk.gz";

/// Explicit resolver configuration — verbosity is an argument,
/// not process-wide state.
#[derive(Debug, Clone, Default)]
pub struct ResolverConfig {
    /// Suppress the unknown-architecture and fresh-weights warnings
    pub quiet: bool,
}

/// The model spec persisted as `config.json`. Field names
/// follow checkpoint-config conventions; aliases cover the
/// per-family spellings of the same quantity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelSpec {
    /// Declared concrete class name(s); the first entry drives
    /// the architecture tag and the category check
    #[serde(default)]
    pub architectures: Vec<String>,

    pub vocab_size: usize,

    #[serde(default = "default_d_model", alias = "hidden_size", alias = "n_embd")]
    pub d_model: usize,

    #[serde(
        default = "default_num_heads",
        alias = "num_attention_heads",
        alias = "encoder_attention_heads",
        alias = "n_head"
    )]
    pub num_heads: usize,

    #[serde(default, alias = "num_hidden_layers", alias = "n_layer")]
    pub num_layers: Option<usize>,

    #[serde(default)]
    pub encoder_layers: Option<usize>,

    #[serde(default)]
    pub decoder_layers: Option<usize>,

    #[serde(
        default,
        alias = "ffn_dim",
        alias = "encoder_ffn_dim",
        alias = "intermediate_size",
        alias = "n_inner"
    )]
    pub d_ff: Option<usize>,

    #[serde(default = "default_dropout")]
    pub dropout: f64,

    #[serde(default = "default_max_positions", alias = "n_positions", alias = "n_ctx")]
    pub max_position_embeddings: usize,

    #[serde(default)]
    pub pad_token_id: Option<u32>,
    #[serde(default)]
    pub bos_token_id: Option<u32>,
    #[serde(default)]
    pub eos_token_id: Option<u32>,
    #[serde(default)]
    pub decoder_start_token_id: Option<u32>,

    /// Per-task generation defaults shipped with the checkpoint
    #[serde(default)]
    pub task_specific_params: BTreeMap<String, GenKwargs>,
}

fn default_d_model() -> usize {
    512
}
fn default_num_heads() -> usize {
    8
}
fn default_dropout() -> f64 {
    0.1
}
fn default_max_positions() -> usize {
    512
}

impl ModelSpec {
    pub fn class_name(&self) -> Option<&str> {
        self.architectures.first().map(String::as_str)
    }

    pub fn encoder_depth(&self) -> usize {
        self.encoder_layers.or(self.num_layers).unwrap_or(6)
    }

    pub fn decoder_depth(&self) -> usize {
        self.decoder_layers.or(self.num_layers).unwrap_or(6)
    }

    pub fn depth(&self) -> usize {
        self.num_layers.or(self.encoder_layers).unwrap_or(6)
    }

    pub fn ffn_dim(&self) -> usize {
        self.d_ff.unwrap_or(self.d_model * 4)
    }

    /// Generation defaults the checkpoint declares for
    /// summarization, if any.
    pub fn summarization_defaults(&self) -> Option<&GenKwargs> {
        self.task_specific_params.get("summarization")
    }

    /// Start token for the decoder: explicit, else end token,
    /// else pad, else 0.
    pub fn decoder_start(&self) -> u32 {
        self.decoder_start_token_id
            .or(self.eos_token_id)
            .or(self.pad_token_id)
            .unwrap_or(0)
    }
}

/// Everything `load_*` resolves besides the model itself.
pub struct ResolvedParts {
    pub arch:       ArchFamily,
    pub class_name: String,
    pub spec:       ModelSpec,
    pub tokenizer:  TokenizerAdapter,
}

pub struct Resolver {
    cfg: ResolverConfig,
}

impl Resolver {
    pub fn new(cfg: ResolverConfig) -> Self {
        Self { cfg }
    }

    /// Read the spec, derive the tag, check the category, and
    /// construct the tokenizer with merged kwargs.
    pub fn load_parts(
        &self,
        dir: &Path,
        category: ModelCategory,
        tok_kwargs: &TokKwargs,
    ) -> Result<ResolvedParts> {
        let spec = self.load_spec(dir)?;

        let class_name = spec
            .class_name()
            .ok_or_else(|| TaskError::resolution(dir, "config declares no architecture class"))?
            .to_string();

        if !category.matches_class(&class_name) {
            return Err(TaskError::resolution(
                dir,
                format!(
                    "class '{}' is not compatible with {}",
                    class_name,
                    category.label()
                ),
            ));
        }

        let arch = ArchFamily::from_class_name(&class_name);
        if arch == ArchFamily::Other && !self.cfg.quiet {
            tracing::warn!(
                "class '{}' matches no known family; no special-casing will apply",
                class_name
            );
        }
        tracing::info!("Resolved '{}' as family '{}'", class_name, arch.tag());

        // policy tokenizer kwargs merge under the caller's,
        // BEFORE the adapter is constructed
        let mut merged = tok_kwargs.clone();
        merged.merge_defaults(policy_for(arch).tok_kwargs);

        let tokenizer_path = dir.join(TOKENIZER_FILE);
        let inner = tokenizers::Tokenizer::from_file(&tokenizer_path).map_err(|e| {
            TaskError::resolution(dir, format!("cannot load '{TOKENIZER_FILE}': {e}"))
        })?;
        let tokenizer = TokenizerAdapter::new(inner, &merged);

        Ok(ResolvedParts {
            arch,
            class_name,
            spec,
            tokenizer,
        })
    }

    /// Resolve a summarization-capable checkpoint.
    pub fn load_seq2seq<B: Backend>(
        &self,
        dir: &Path,
        tok_kwargs: &TokKwargs,
        device: &B::Device,
    ) -> Result<(ResolvedParts, Seq2SeqModel<B>)> {
        let parts = self.load_parts(dir, ModelCategory::Seq2Seq, tok_kwargs)?;
        let spec = &parts.spec;

        let model = Seq2SeqModelConfig::new(
            spec.vocab_size,
            spec.max_position_embeddings,
            spec.d_model,
            spec.num_heads,
            spec.encoder_depth(),
            spec.decoder_depth(),
            spec.ffn_dim(),
            spec.dropout,
            spec.pad_token_id.unwrap_or(0) as usize,
            spec.decoder_start() as usize,
            spec.eos_token_id.unwrap_or(0) as usize,
        )
        .init(device);

        let model = self.load_weights(dir, model, device)?;
        Ok((parts, model))
    }

    /// Resolve a language-modeling checkpoint (causal or masked).
    pub fn load_lm<B: Backend>(
        &self,
        dir: &Path,
        kind: LmKind,
        tok_kwargs: &TokKwargs,
        device: &B::Device,
    ) -> Result<(ResolvedParts, LmModel<B>)> {
        let parts = self.load_parts(dir, kind.category(), tok_kwargs)?;
        let spec = &parts.spec;

        let model = LmModelConfig::new(
            spec.vocab_size,
            spec.max_position_embeddings,
            spec.d_model,
            spec.num_heads,
            spec.depth(),
            spec.ffn_dim(),
            spec.dropout,
            matches!(kind, LmKind::Causal),
            spec.pad_token_id.unwrap_or(0) as usize,
        )
        .init(device);

        let model = self.load_weights(dir, model, device)?;
        Ok((parts, model))
    }

    fn load_spec(&self, dir: &Path) -> Result<ModelSpec> {
        let config_path = dir.join(CONFIG_FILE);
        let raw = std::fs::read_to_string(&config_path).map_err(|e| {
            TaskError::resolution(dir, format!("cannot read '{CONFIG_FILE}': {e}"))
        })?;
        serde_json::from_str(&raw)
            .map_err(|e| TaskError::resolution(dir, format!("invalid '{CONFIG_FILE}': {e}")))
    }

    /// Load the weights record when present. A directory without
    /// one yields freshly initialized parameters; a record that
    /// exists but cannot be loaded into this architecture is a
    /// Resolution error.
    fn load_weights<B: Backend, M: Module<B>>(
        &self,
        dir: &Path,
        model: M,
        device: &B::Device,
    ) -> Result<M> {
        if !dir.join(WEIGHTS_FILE).exists() {
            if !self.cfg.quiet {
                tracing::warn!(
                    "no '{}' in '{}'; using fresh parameters",
                    WEIGHTS_FILE,
                    dir.display()
                );
            }
            return Ok(model);
        }

        let record: M::Record = CompactRecorder::new()
            .load(dir.join(WEIGHTS_BASENAME), device)
            .map_err(|e| {
                TaskError::resolution(dir, format!("weights incompatible with this model: {e}"))
            })?;
        tracing::info!("Loaded pretrained weights from '{}'", dir.display());
        Ok(model.load_record(record))
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spec_parses_canonical_names() {
        let spec: ModelSpec = serde_json::from_str(
            r#"{
                "architectures": ["BartForConditionalGeneration"],
                "vocab_size": 64,
                "d_model": 32,
                "num_heads": 2,
                "encoder_layers": 1,
                "decoder_layers": 1,
                "d_ff": 64,
                "pad_token_id": 1,
                "eos_token_id": 2,
                "task_specific_params": {
                    "summarization": {"max_length": 142, "num_beams": 4}
                }
            }"#,
        )
        .unwrap();

        assert_eq!(spec.class_name(), Some("BartForConditionalGeneration"));
        assert_eq!(spec.encoder_depth(), 1);
        assert_eq!(spec.ffn_dim(), 64);
        assert_eq!(spec.decoder_start(), 2);
        assert_eq!(
            spec.summarization_defaults().unwrap().usize_value("max_length"),
            Some(142)
        );
    }

    #[test]
    fn test_spec_parses_aliased_names() {
        let spec: ModelSpec = serde_json::from_str(
            r#"{
                "architectures": ["GPT2LMHeadModel"],
                "vocab_size": 100,
                "n_embd": 48,
                "n_head": 4,
                "n_layer": 2,
                "n_positions": 128
            }"#,
        )
        .unwrap();

        assert_eq!(spec.d_model, 48);
        assert_eq!(spec.num_heads, 4);
        assert_eq!(spec.depth(), 2);
        assert_eq!(spec.max_position_embeddings, 128);
        assert_eq!(spec.ffn_dim(), 48 * 4);
    }

    #[test]
    fn test_spec_defaults_fill_gaps() {
        let spec: ModelSpec =
            serde_json::from_str(r#"{"architectures": ["BertForMaskedLM"], "vocab_size": 10}"#)
                .unwrap();
        assert_eq!(spec.d_model, 512);
        assert_eq!(spec.num_heads, 8);
        assert_eq!(spec.depth(), 6);
        assert_eq!(spec.max_position_embeddings, 512);
        assert!(spec.summarization_defaults().is_none());
    }
}
