// ============================================================
// Architecture Policy Table
// ============================================================
// Pure lookup from architecture family to its special-case
// adjustments. Only a handful of families need anything:
//
//   t5    — instruction prefix on every input text, and config
//           generation defaults apply
//   bart  — config generation defaults apply
//   mbart — explicit source/target language codes at tokenizer
//           construction, and a forced decoder start token
//   everything else — the empty policy
//
// Application order is fixed and matters:
//   1. tokenizer kwargs merge BEFORE the tokenizer adapter is
//      constructed (caller keys win over policy defaults)
//   2. generation defaults merge, then the mapping is FILTERED
//      against the model's accepted parameter names — any key
//      the generation routine does not accept is silently
//      dropped, by design
//   3. the decoder-start override merges LAST, after the
//      filter, so the filter can never remove it

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

use crate::domain::arch::ArchFamily;

/// Instruction prefix one family requires before its inputs.
pub const T5_PREFIX: &str = "summarize: ";

/// Language code the multilingual family defaults to.
pub const MBART_LANG: &str = "en_XX";

/// Per-family special-case adjustments.
#[derive(Debug, Clone)]
pub struct ArchPolicy {
    /// Prepended to every raw input text before tokenization
    pub input_prefix: Option<&'static str>,
    /// Extra tokenizer-construction kwargs (defaults; caller wins)
    pub tok_kwargs: &'static [(&'static str, &'static str)],
    /// Whether the model spec's summarization params seed the
    /// generation kwargs when the caller passes none
    pub config_gen_defaults: bool,
    /// Token forced as the decoder start (merged after filtering)
    pub decoder_start_token: Option<&'static str>,
}

const EMPTY_POLICY: ArchPolicy = ArchPolicy {
    input_prefix: None,
    tok_kwargs: &[],
    config_gen_defaults: false,
    decoder_start_token: None,
};

/// Look up the policy for a family. Unknown families get the
/// empty policy — no accidental special-casing.
pub fn policy_for(arch: ArchFamily) -> ArchPolicy {
    match arch {
        ArchFamily::T5 => ArchPolicy {
            input_prefix: Some(T5_PREFIX),
            config_gen_defaults: true,
            ..EMPTY_POLICY
        },
        ArchFamily::Bart => ArchPolicy {
            config_gen_defaults: true,
            ..EMPTY_POLICY
        },
        ArchFamily::Mbart => ArchPolicy {
            tok_kwargs: &[("src_lang", MBART_LANG), ("tgt_lang", MBART_LANG)],
            decoder_start_token: Some(MBART_LANG),
            ..EMPTY_POLICY
        },
        ArchFamily::Gpt2 | ArchFamily::Bert | ArchFamily::Other => EMPTY_POLICY,
    }
}

// ─── Tokenizer kwargs ─────────────────────────────────────────────────────────
/// Keyword arguments applied at tokenizer construction.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TokKwargs(BTreeMap<String, Value>);

impl TokKwargs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set(key, value);
        self
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(Value::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Insert defaults only where the caller set nothing.
    pub fn merge_defaults(&mut self, defaults: &[(&str, &str)]) {
        for (key, value) in defaults {
            self.0
                .entry((*key).to_string())
                .or_insert_with(|| Value::from(*value));
        }
    }
}

// ─── Generation kwargs ────────────────────────────────────────────────────────
/// Keyword arguments for text generation. A plain string→value
/// mapping so callers can pass whatever a checkpoint's config
/// declares; unsupported keys are dropped by `retain_supported`
/// rather than rejected.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GenKwargs(BTreeMap<String, Value>);

impl GenKwargs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set(key, value);
        self
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Insert defaults only where the caller set nothing —
    /// caller keys always win.
    pub fn merge_defaults(&mut self, defaults: &GenKwargs) {
        for (key, value) in &defaults.0 {
            self.0.entry(key.clone()).or_insert_with(|| value.clone());
        }
    }

    /// Drop every key the target's generation routine does not
    /// accept. Silent by design; filtering an already-filtered
    /// mapping is a no-op.
    pub fn retain_supported(&mut self, accepted: &[&str]) {
        self.0.retain(|key, _| accepted.contains(&key.as_str()));
    }

    pub fn usize_value(&self, key: &str) -> Option<usize> {
        self.0.get(key)?.as_u64().map(|v| v as usize)
    }

    pub fn u32_value(&self, key: &str) -> Option<u32> {
        self.0.get(key)?.as_u64().map(|v| v as u32)
    }
}

/// Apply the full generation-kwargs pipeline for one family:
/// checkpoint defaults merge under the caller's kwargs (only
/// for families that ship defaults), the result is filtered
/// against `accepted`, and the decoder-start override merges
/// LAST so the filter cannot drop it. `lookup` resolves the
/// override token to a vocabulary id.
pub fn resolve_gen_kwargs(
    arch: ArchFamily,
    config_defaults: Option<&GenKwargs>,
    user: Option<GenKwargs>,
    accepted: &[&str],
    lookup: impl Fn(&str) -> Option<u32>,
) -> GenKwargs {
    let policy = policy_for(arch);
    let mut kwargs = user.unwrap_or_default();

    if policy.config_gen_defaults {
        if let Some(defaults) = config_defaults {
            kwargs.merge_defaults(defaults);
        }
    }
    kwargs.retain_supported(accepted);

    if let Some(token) = policy.decoder_start_token {
        match lookup(token) {
            Some(id) => {
                let mut start = GenKwargs::new();
                start.set("decoder_start_token_id", id);
                // caller-specified start token still wins
                kwargs.merge_defaults(&start);
            }
            None => tracing::warn!(
                "decoder start token '{token}' is not in the vocabulary; override skipped"
            ),
        }
    }

    kwargs
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_families_get_the_empty_policy() {
        // no accidental special-casing leakage outside the known set
        for arch in [ArchFamily::Gpt2, ArchFamily::Bert, ArchFamily::Other] {
            let policy = policy_for(arch);
            assert!(policy.input_prefix.is_none());
            assert!(policy.tok_kwargs.is_empty());
            assert!(!policy.config_gen_defaults);
            assert!(policy.decoder_start_token.is_none());
        }
    }

    #[test]
    fn test_special_cased_families() {
        assert_eq!(policy_for(ArchFamily::T5).input_prefix, Some(T5_PREFIX));
        assert!(policy_for(ArchFamily::Bart).config_gen_defaults);
        let mbart = policy_for(ArchFamily::Mbart);
        assert_eq!(mbart.tok_kwargs.len(), 2);
        assert_eq!(mbart.decoder_start_token, Some(MBART_LANG));
    }

    #[test]
    fn test_tok_kwargs_caller_wins_over_policy() {
        let mut kwargs = TokKwargs::new().with("src_lang", "de_DE");
        kwargs.merge_defaults(policy_for(ArchFamily::Mbart).tok_kwargs);
        assert_eq!(kwargs.get_str("src_lang"), Some("de_DE"));
        assert_eq!(kwargs.get_str("tgt_lang"), Some(MBART_LANG));
    }

    #[test]
    fn test_gen_kwargs_merge_defaults_precedence() {
        let mut kwargs = GenKwargs::new().with("max_length", 80);
        let defaults = GenKwargs::new().with("max_length", 142).with("min_length", 56);
        kwargs.merge_defaults(&defaults);
        assert_eq!(kwargs.usize_value("max_length"), Some(80));
        assert_eq!(kwargs.usize_value("min_length"), Some(56));
    }

    #[test]
    fn test_filter_drops_unsupported_keys_silently() {
        let mut kwargs = GenKwargs::new()
            .with("max_length", 142)
            .with("num_beams", 4)
            .with("length_penalty", 2.0);
        kwargs.retain_supported(&["max_length", "min_length"]);
        assert_eq!(kwargs.len(), 1);
        assert!(kwargs.contains("max_length"));
    }

    #[test]
    fn test_filter_is_idempotent() {
        let accepted = ["max_length", "min_length", "no_repeat_ngram_size"];
        let mut kwargs = GenKwargs::new()
            .with("max_length", 200)
            .with("no_repeat_ngram_size", 3)
            .with("early_stopping", true);
        kwargs.retain_supported(&accepted);
        let once = kwargs.clone();
        kwargs.retain_supported(&accepted);
        assert_eq!(kwargs, once);
    }

    const ACCEPTED: &[&str] = &[
        "max_length",
        "min_length",
        "no_repeat_ngram_size",
        "decoder_start_token_id",
    ];

    #[test]
    fn test_resolve_pipeline_defaults_filter_then_start() {
        // bart-style checkpoint defaults carry beams the model
        // does not accept
        let defaults = GenKwargs::new()
            .with("max_length", 142)
            .with("min_length", 56)
            .with("num_beams", 4)
            .with("early_stopping", true);
        let user = GenKwargs::new().with("max_length", 80);

        let resolved =
            resolve_gen_kwargs(ArchFamily::Bart, Some(&defaults), Some(user), ACCEPTED, |_| None);

        assert_eq!(resolved.usize_value("max_length"), Some(80));
        assert_eq!(resolved.usize_value("min_length"), Some(56));
        assert!(!resolved.contains("num_beams"));
        assert!(!resolved.contains("early_stopping"));
        assert!(!resolved.contains("decoder_start_token_id"));
    }

    #[test]
    fn test_resolve_decoder_start_survives_the_filter() {
        let resolved =
            resolve_gen_kwargs(ArchFamily::Mbart, None, None, ACCEPTED, |token| {
                (token == MBART_LANG).then_some(250004)
            });
        assert_eq!(resolved.u32_value("decoder_start_token_id"), Some(250004));
    }

    #[test]
    fn test_resolve_untagged_family_passes_kwargs_through() {
        // outside the special-cased set the caller's mapping is
        // unchanged apart from the accepted-name filter
        let user = GenKwargs::new().with("max_length", 32).with("min_length", 4);
        let defaults = GenKwargs::new().with("max_length", 999);
        let resolved = resolve_gen_kwargs(
            ArchFamily::Other,
            Some(&defaults),
            Some(user.clone()),
            ACCEPTED,
            |_| Some(1),
        );
        assert_eq!(resolved, user);
    }
}
