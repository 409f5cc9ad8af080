// Shared fixtures for the end-to-end tests: tiny model
// directories written to disk in the registry checkpoint layout
// (config.json + tokenizer.json, no weights record — the
// resolver initializes fresh parameters for those).

use serde_json::{json, Map, Value};
use std::path::Path;
use tempfile::TempDir;

/// Words every fixture vocabulary contains, after the specials.
pub const WORDS: &[&str] = &[
    "the", "a", "cat", "dog", "sat", "on", "mat", "ran", "fast", "big", "news", "story", "about",
    "animals", "short", "summary", "capital", "of", "france", "is", "paris", "city", "lights",
    "make", "people", "happy", "every", "night", "summer", "days", "are", "long", "warm", ".",
];

pub struct Fixture {
    pub dir: TempDir,
    pub vocab_size: usize,
}

impl Fixture {
    pub fn path(&self) -> &Path {
        self.dir.path()
    }
}

/// Write a word-level tokenizer JSON with the given special
/// tokens at ids 0..k and WORDS after them.
fn write_tokenizer(dir: &Path, specials: &[&str]) -> usize {
    let mut vocab = Map::new();
    let mut added = Vec::new();
    for (id, token) in specials.iter().enumerate() {
        vocab.insert((*token).to_string(), json!(id));
        added.push(json!({
            "id": id,
            "content": token,
            "single_word": false,
            "lstrip": false,
            "rstrip": false,
            "normalized": false,
            "special": true
        }));
    }
    for (offset, word) in WORDS.iter().enumerate() {
        vocab.insert((*word).to_string(), json!(specials.len() + offset));
    }
    let vocab_size = specials.len() + WORDS.len();

    let tokenizer = json!({
        "version": "1.0",
        "truncation": null,
        "padding": null,
        "added_tokens": added,
        "normalizer": {
            "type": "BertNormalizer",
            "clean_text": true,
            "handle_chinese_chars": true,
            "strip_accents": null,
            "lowercase": true
        },
        "pre_tokenizer": { "type": "Whitespace" },
        "post_processor": null,
        "decoder": null,
        "model": {
            "type": "WordLevel",
            "vocab": Value::Object(vocab),
            "unk_token": "[UNK]"
        }
    });

    std::fs::write(
        dir.join("tokenizer.json"),
        serde_json::to_string_pretty(&tokenizer).unwrap(),
    )
    .unwrap();
    vocab_size
}

fn write_config(dir: &Path, config: Value) {
    std::fs::write(
        dir.join("config.json"),
        serde_json::to_string_pretty(&config).unwrap(),
    )
    .unwrap();
}

/// A bart-flavored seq2seq checkpoint: pad/eos present, and
/// summarization generation defaults that include parameters
/// the generate routine does not accept.
pub fn seq2seq_model_dir() -> Fixture {
    let dir = TempDir::new().unwrap();
    // specials: <pad>=0, [UNK]=1, </s>=2
    let vocab_size = write_tokenizer(dir.path(), &["<pad>", "[UNK]", "</s>"]);
    write_config(
        dir.path(),
        json!({
            "architectures": ["BartForConditionalGeneration"],
            "vocab_size": vocab_size,
            "d_model": 32,
            "num_heads": 2,
            "encoder_layers": 1,
            "decoder_layers": 1,
            "d_ff": 64,
            "max_position_embeddings": 64,
            "dropout": 0.1,
            "pad_token_id": 0,
            "eos_token_id": 2,
            "decoder_start_token_id": 2,
            "task_specific_params": {
                "summarization": {
                    "max_length": 24,
                    "min_length": 2,
                    "num_beams": 4,
                    "early_stopping": true,
                    "length_penalty": 2.0
                }
            }
        }),
    );
    Fixture { dir, vocab_size }
}

/// A bert-flavored masked-LM checkpoint whose tokenizer has NO
/// pad token.
pub fn masked_model_dir_without_pad() -> Fixture {
    let dir = TempDir::new().unwrap();
    // specials: [UNK]=0, [CLS]=1, [SEP]=2, [MASK]=3 — no pad
    let vocab_size = write_tokenizer(dir.path(), &["[UNK]", "[CLS]", "[SEP]", "[MASK]"]);
    write_config(
        dir.path(),
        json!({
            "architectures": ["BertForMaskedLM"],
            "vocab_size": vocab_size,
            "d_model": 32,
            "num_heads": 2,
            "num_layers": 1,
            "d_ff": 64,
            "max_position_embeddings": 64,
            "dropout": 0.1
        }),
    );
    Fixture { dir, vocab_size }
}

/// A gpt2-flavored causal checkpoint, aliased config spellings
/// included, tokenizer without a pad token.
pub fn causal_model_dir() -> Fixture {
    let dir = TempDir::new().unwrap();
    let vocab_size = write_tokenizer(dir.path(), &["[UNK]", "<|endoftext|>"]);
    write_config(
        dir.path(),
        json!({
            "architectures": ["GPT2LMHeadModel"],
            "vocab_size": vocab_size,
            "n_embd": 32,
            "n_head": 2,
            "n_layer": 1,
            "n_positions": 64,
            "eos_token_id": 1
        }),
    );
    Fixture { dir, vocab_size }
}
