// ============================================================
// ML / Model Layer (Burn)
// ============================================================
// All Burn framework specific code lives in this layer, plus
// the pieces that decide HOW a pretrained checkpoint is wired
// up for a task:
//
//   tokenizer.rs  — adapter over the tokenizers library:
//                   special-token probing, language-tag kwargs,
//                   pad-token fixup
//   policy.rs     — architecture policy table and the
//                   tokenizer/generation kwargs machinery
//   resolver.rs   — loads spec + tokenizer + weights from a
//                   model directory, derives the family tag,
//                   checks task-category compatibility
//   blocks.rs     — embeddings and encoder/decoder blocks
//   loss.rs       — ignore-aware cross entropy
//   seq2seq.rs    — encoder-decoder model + greedy generation
//   lm.rs         — single-stack LM (causal or bidirectional)
//   generation.rs — next-token selection rules
//   trainer.rs    — the fine-tuning loop
//   inferencer.rs — post-training helpers (summarize, fill-mask)

pub mod blocks;
pub mod generation;
pub mod inferencer;
pub mod lm;
pub mod loss;
pub mod policy;
pub mod resolver;
pub mod seq2seq;
pub mod tokenizer;
pub mod trainer;
