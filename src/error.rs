// ============================================================
// Error Taxonomy
// ============================================================
// Every failure the adapter layer can produce, as one enum.
// The two named failure modes from the public contract:
//
//   Resolution        — a model directory cannot be loaded, or
//                       its declared class is incompatible with
//                       the requested task category
//   UnsupportedFormat — a data source's content type matches
//                       none of spreadsheet / CSV / JSONL
//
// Both are fatal and surface synchronously; there is no retry
// anywhere in this layer. Unsupported generation kwargs are
// NOT an error — they are silently dropped (see ml/policy.rs).

use thiserror::Error;

#[derive(Debug, Error)]
pub enum TaskError {
    /// Model/tokenizer could not be loaded, or the loaded class
    /// does not match the requested task category.
    #[error("model resolution failed for '{path}': {reason}")]
    Resolution { path: String, reason: String },

    /// A data source path whose content type is none of
    /// spreadsheet, CSV, or line-delimited JSON.
    #[error("unsupported data source '{path}': {detail}")]
    UnsupportedFormat { path: String, detail: String },

    /// The tokenizers library reported an error.
    #[error("tokenizer error: {0}")]
    Tokenizer(String),

    /// Caller misuse that is detectable up front, e.g. mask
    /// filling on input that contains no mask token.
    #[error("invalid request: {0}")]
    Invalid(String),

    /// A model record could not be written or restored.
    #[error("checkpoint error: {0}")]
    Checkpoint(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

impl TaskError {
    /// Shorthand for a `Resolution` error tied to a path.
    pub fn resolution(path: impl AsRef<std::path::Path>, reason: impl Into<String>) -> Self {
        Self::Resolution {
            path:   path.as_ref().display().to_string(),
            reason: reason.into(),
        }
    }

    /// Shorthand for an `UnsupportedFormat` error tied to a path.
    pub fn unsupported(path: impl AsRef<std::path::Path>, detail: impl Into<String>) -> Self {
        Self::UnsupportedFormat {
            path:   path.as_ref().display().to_string(),
            detail: detail.into(),
        }
    }
}

/// Library-wide result alias. The CLI boundary converts into
/// `anyhow::Result` via `?`.
pub type Result<T> = std::result::Result<T, TaskError>;
