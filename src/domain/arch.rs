// ============================================================
// Architecture Families and Task Categories
// ============================================================
// The architecture tag classifies a loaded model's family and
// drives every special-case branch in the adapter: input
// prefixing, tokenizer construction kwargs, generation
// defaults, and the decoder start-token override.
//
// The tag is derived exactly once, from the class name a model
// directory declares, BEFORE the tokenizer is constructed and
// BEFORE generation kwargs are filtered — both depend on it.

use serde::{Deserialize, Serialize};

/// Label value excluded from loss and from every metric.
/// Targets carrying this sentinel are masked out before any
/// scoring happens.
pub const IGNORE_INDEX: i32 = -100;

/// Known model families. `Other` means "no special-casing":
/// an unrecognized class name is not an error, it simply gets
/// the default (empty) policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ArchFamily {
    T5,
    Bart,
    Mbart,
    Gpt2,
    Bert,
    Other,
}

/// Ordered class-name fragments. Order matters: "MBart" would
/// also match "Bart", so the more specific entry comes first.
const FAMILY_TABLE: &[(&str, ArchFamily)] = &[
    ("mbart", ArchFamily::Mbart),
    ("bart", ArchFamily::Bart),
    ("mt5", ArchFamily::T5),
    ("t5", ArchFamily::T5),
    ("gpt2", ArchFamily::Gpt2),
    ("bert", ArchFamily::Bert),
];

impl ArchFamily {
    /// Classify a declared class name such as
    /// "MBartForConditionalGeneration" or "GPT2LMHeadModel".
    /// First fragment match wins; no match yields `Other`.
    pub fn from_class_name(class_name: &str) -> Self {
        let lowered = class_name.to_lowercase();
        FAMILY_TABLE
            .iter()
            .find(|(fragment, _)| lowered.contains(fragment))
            .map(|(_, family)| *family)
            .unwrap_or(ArchFamily::Other)
    }

    /// Short display tag, e.g. for log lines.
    pub fn tag(&self) -> &'static str {
        match self {
            ArchFamily::T5 => "t5",
            ArchFamily::Bart => "bart",
            ArchFamily::Mbart => "mbart",
            ArchFamily::Gpt2 => "gpt2",
            ArchFamily::Bert => "bert",
            ArchFamily::Other => "other",
        }
    }
}

/// The model-class category a task requests from the resolver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ModelCategory {
    Seq2Seq,
    CausalLm,
    MaskedLm,
}

impl ModelCategory {
    /// Whether a declared class name is compatible with this
    /// category. Follows the class-suffix naming convention of
    /// pretrained-transformer checkpoints.
    pub fn matches_class(self, class_name: &str) -> bool {
        match self {
            ModelCategory::Seq2Seq => class_name.contains("ForConditionalGeneration"),
            ModelCategory::CausalLm => {
                class_name.contains("ForCausalLM") || class_name.contains("LMHeadModel")
            }
            ModelCategory::MaskedLm => class_name.contains("ForMaskedLM"),
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            ModelCategory::Seq2Seq => "sequence-to-sequence",
            ModelCategory::CausalLm => "causal language modeling",
            ModelCategory::MaskedLm => "masked language modeling",
        }
    }
}

/// Which language-modeling objective a task trains with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LmKind {
    /// Next-token prediction (decoder-only, autoregressive mask)
    Causal,
    /// Fill-in-the-blank prediction (bidirectional, masked tokens)
    Masked,
}

impl LmKind {
    pub fn category(self) -> ModelCategory {
        match self {
            LmKind::Causal => ModelCategory::CausalLm,
            LmKind::Masked => ModelCategory::MaskedLm,
        }
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mbart_wins_over_bart() {
        assert_eq!(
            ArchFamily::from_class_name("MBartForConditionalGeneration"),
            ArchFamily::Mbart
        );
        assert_eq!(
            ArchFamily::from_class_name("BartForConditionalGeneration"),
            ArchFamily::Bart
        );
    }

    #[test]
    fn test_common_class_names() {
        assert_eq!(ArchFamily::from_class_name("T5ForConditionalGeneration"), ArchFamily::T5);
        assert_eq!(ArchFamily::from_class_name("GPT2LMHeadModel"), ArchFamily::Gpt2);
        assert_eq!(ArchFamily::from_class_name("BertForMaskedLM"), ArchFamily::Bert);
        assert_eq!(ArchFamily::from_class_name("DistilBertForMaskedLM"), ArchFamily::Bert);
        assert_eq!(ArchFamily::from_class_name("ReformerModelWithLMHead"), ArchFamily::Other);
    }

    #[test]
    fn test_category_compatibility() {
        assert!(ModelCategory::Seq2Seq.matches_class("BartForConditionalGeneration"));
        assert!(!ModelCategory::Seq2Seq.matches_class("BertForMaskedLM"));
        assert!(ModelCategory::CausalLm.matches_class("GPT2LMHeadModel"));
        assert!(ModelCategory::MaskedLm.matches_class("RobertaForMaskedLM"));
        assert!(!ModelCategory::MaskedLm.matches_class("GPT2LMHeadModel"));
    }
}
