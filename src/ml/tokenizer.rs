// ============================================================
// Tokenizer Adapter
// ============================================================
// Thin wrapper over the tokenizers library that adds the three
// things this layer needs on top of encode/decode:
//
//   - construction kwargs: multilingual checkpoints carry
//     source/target language codes that must be resolved to
//     vocabulary ids before any encoding happens
//   - special-token probing: pad and mask tokens are found by
//     their conventional spellings; a checkpoint without a pad
//     token reports None so the caller can add one
//   - pad fixup: `ensure_pad_token` registers a new special
//     token and returns its id (the model's embedding table
//     must then be resized by the caller)

use tokenizers::{AddedToken, Tokenizer};

use crate::error::{Result, TaskError};
use crate::ml::policy::TokKwargs;

/// Conventional spellings probed for the pad token.
const PAD_CANDIDATES: &[&str] = &["<pad>", "[PAD]", "<|pad|>"];
/// Conventional spellings probed for the mask token.
const MASK_CANDIDATES: &[&str] = &["[MASK]", "<mask>"];
/// Other conventional special tokens, used to build the
/// do-not-mask set for masked-LM training.
const OTHER_SPECIALS: &[&str] = &[
    "[CLS]", "[SEP]", "[UNK]", "<s>", "</s>", "<unk>", "<|endoftext|>",
];

#[derive(Debug)]
pub struct TokenizerAdapter {
    inner: Tokenizer,
    src_lang_id: Option<u32>,
    tgt_lang_id: Option<u32>,
    pad: Option<(String, u32)>,
    mask: Option<(String, u32)>,
}

impl TokenizerAdapter {
    /// Wrap a loaded tokenizer, applying construction kwargs.
    ///
    /// Known kwargs: `src_lang`, `tgt_lang` (language codes that
    /// must exist in the vocabulary). Unknown kwargs are ignored
    /// with a debug line — permissiveness mirrors the generation
    /// kwargs policy.
    pub fn new(inner: Tokenizer, kwargs: &TokKwargs) -> Self {
        let resolve_lang = |key: &str| {
            let code = kwargs.get_str(key)?;
            match inner.token_to_id(code) {
                Some(id) => Some(id),
                None => {
                    tracing::warn!("{key} '{code}' is not in the vocabulary; ignoring");
                    None
                }
            }
        };
        let src_lang_id = resolve_lang("src_lang");
        let tgt_lang_id = resolve_lang("tgt_lang");

        let probe = |candidates: &[&str]| {
            candidates
                .iter()
                .find_map(|tok| inner.token_to_id(tok).map(|id| (tok.to_string(), id)))
        };
        let pad = probe(PAD_CANDIDATES);
        let mask = probe(MASK_CANDIDATES);

        Self {
            inner,
            src_lang_id,
            tgt_lang_id,
            pad,
            mask,
        }
    }

    pub fn encode(&self, text: &str, add_special_tokens: bool) -> Result<Vec<u32>> {
        let encoding = self
            .inner
            .encode(text, add_special_tokens)
            .map_err(|e| TaskError::Tokenizer(e.to_string()))?;
        Ok(encoding.get_ids().to_vec())
    }

    /// Encode a source text, appending the source-language tag
    /// when one was configured (multilingual checkpoints).
    pub fn encode_source(&self, text: &str) -> Result<Vec<u32>> {
        let mut ids = self.encode(text, true)?;
        if let Some(lang) = self.src_lang_id {
            ids.push(lang);
        }
        Ok(ids)
    }

    pub fn decode(&self, ids: &[u32], skip_special_tokens: bool) -> Result<String> {
        self.inner
            .decode(ids, skip_special_tokens)
            .map_err(|e| TaskError::Tokenizer(e.to_string()))
    }

    pub fn token_to_id(&self, token: &str) -> Option<u32> {
        self.inner.token_to_id(token)
    }

    pub fn id_to_token(&self, id: u32) -> Option<String> {
        self.inner.id_to_token(id)
    }

    /// Vocabulary size including added tokens.
    pub fn vocab_size(&self) -> usize {
        self.inner.get_vocab_size(true)
    }

    pub fn pad_id(&self) -> Option<u32> {
        self.pad.as_ref().map(|(_, id)| *id)
    }

    /// Pad id, defaulting to 0 for checkpoints that never pad.
    pub fn pad_id_or_zero(&self) -> u32 {
        self.pad_id().unwrap_or(0)
    }

    pub fn mask_id(&self) -> Option<u32> {
        self.mask.as_ref().map(|(_, id)| *id)
    }

    pub fn mask_token(&self) -> Option<&str> {
        self.mask.as_ref().map(|(tok, _)| tok.as_str())
    }

    pub fn target_lang_id(&self) -> Option<u32> {
        self.tgt_lang_id
    }

    /// Register a pad token that the vocabulary lacks. Returns
    /// the new id; the caller must resize the model's embedding
    /// table to `vocab_size()` afterwards.
    pub fn ensure_pad_token(&mut self, token: &str) -> Result<u32> {
        if let Some(id) = self.pad_id() {
            return Ok(id);
        }
        self.inner
            .add_special_tokens(&[AddedToken::from(token.to_string(), true)]);
        let id = self.inner.token_to_id(token).ok_or_else(|| {
            TaskError::Tokenizer(format!("pad token '{token}' could not be registered"))
        })?;
        self.pad = Some((token.to_string(), id));
        tracing::info!("Added pad token '{}' with id {}", token, id);
        Ok(id)
    }

    /// Ids that must never be selected for masking: every
    /// conventional special token present in this vocabulary.
    pub fn special_ids(&self) -> Vec<u32> {
        let mut ids: Vec<u32> = OTHER_SPECIALS
            .iter()
            .filter_map(|tok| self.inner.token_to_id(tok))
            .collect();
        ids.extend(self.pad_id());
        ids.extend(self.mask_id());
        ids.extend(self.src_lang_id);
        ids.extend(self.tgt_lang_id);
        ids.sort_unstable();
        ids.dedup();
        ids
    }
}
