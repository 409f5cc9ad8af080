// ============================================================
// Text Windows
// ============================================================
// Cuts long documents into overlapping word windows for
// language-model training. Transformer inputs are bounded by
// max_length; truncating a long document would silently drop
// most of it, so instead every window of `window` words becomes
// its own training example, advancing by `stride` words so
// context around a window boundary appears in two windows.
//
// Example with window=5, stride=3:
//   "a b c d e f g h"
//     window 1: a b c d e
//     window 2: d e f g h

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct TextWindows {
    /// Words per window
    window: usize,
    /// Words advanced between windows; must be in 1..=window
    stride: usize,
}

impl TextWindows {
    /// # Panics
    /// Panics if `stride` is zero or larger than `window` —
    /// a zero stride would never advance.
    pub fn new(window: usize, stride: usize) -> Self {
        assert!(
            stride > 0 && stride <= window,
            "stride ({stride}) must be in 1..={window}"
        );
        Self { window, stride }
    }

    /// A window sized for a token budget, assuming roughly one
    /// word per token with half-window overlap.
    pub fn for_budget(max_tokens: usize) -> Self {
        let window = max_tokens.max(2);
        Self::new(window, (window / 2).max(1))
    }

    /// Split text into overlapping word windows. Returns at
    /// most one window for short texts, nothing for empty text.
    pub fn split(&self, text: &str) -> Vec<String> {
        let words: Vec<&str> = text.split_whitespace().collect();
        if words.is_empty() {
            return Vec::new();
        }

        let mut windows = Vec::new();
        let mut start = 0usize;
        loop {
            let end = (start + self.window).min(words.len());
            windows.push(words[start..end].join(" "));
            if end == words.len() {
                return windows;
            }
            start += self.stride;
        }
    }
}
