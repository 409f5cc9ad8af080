use burn::data::dataset::Dataset;
use serde::{Deserialize, Serialize};

/// One raw summarization example. Tokenisation happens at batch
/// time, so items stay plain text.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SummarizationItem {
    pub text:    String,
    pub summary: String,
}

/// One raw language-modeling example. `prompt` is an optional
/// prefix of `text` whose span is excluded from the loss.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LmItem {
    pub text:   String,
    pub prompt: Option<String>,
}

/// In-memory dataset over raw task items.
pub struct TextDataset<I> {
    items: Vec<I>,
}

impl<I> TextDataset<I> {
    pub fn new(items: Vec<I>) -> Self {
        Self { items }
    }

    pub fn items(&self) -> &[I] {
        &self.items
    }

    pub fn item_count(&self) -> usize {
        self.items.len()
    }
}

impl<I: Clone + Send + Sync> Dataset<I> for TextDataset<I> {
    fn get(&self, index: usize) -> Option<I> {
        self.items.get(index).cloned()
    }

    fn len(&self) -> usize {
        self.items.len()
    }
}
