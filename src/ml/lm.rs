// ============================================================
// Language Model
// ============================================================
// One transformer stack serves both objectives:
//
//   causal = true  — an autoregressive mask makes every
//                    position blind to its future (GPT-style
//                    next-token prediction)
//   causal = false — full bidirectional attention (BERT-style
//                    masked-token prediction)
//
// The head projects back to vocabulary logits. `resize_vocab`
// grows the embedding table and head together when the
// tokenizer gained tokens after the weights were created
// (pad-token fixup).

use burn::{
    nn::{attention::generate_autoregressive_mask, LayerNorm, LayerNormConfig, Linear, LinearConfig},
    prelude::*,
};

use crate::data::batcher::LmBatch;
use crate::ml::blocks::{grow_linear_output, BlockConfig, EmbeddingLayer, EmbeddingLayerConfig, EncoderBlock};
use crate::ml::loss::masked_cross_entropy;

#[derive(Config, Debug)]
pub struct LmModelConfig {
    pub vocab_size:    usize,
    pub max_positions: usize,
    pub d_model:       usize,
    pub num_heads:     usize,
    pub num_layers:    usize,
    pub d_ff:          usize,
    pub dropout:       f64,
    pub causal:        bool,
    pub pad_token_id:  usize,
}

impl LmModelConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> LmModel<B> {
        let embedding = EmbeddingLayerConfig::new(
            self.vocab_size,
            self.max_positions,
            self.d_model,
            self.dropout,
        )
        .init(device);

        let block_cfg = BlockConfig::new(self.d_model, self.num_heads, self.d_ff, self.dropout);
        let layers = (0..self.num_layers)
            .map(|_| block_cfg.init_encoder(device))
            .collect();

        LmModel {
            embedding,
            layers,
            final_norm: LayerNormConfig::new(self.d_model).init(device),
            lm_head: LinearConfig::new(self.d_model, self.vocab_size)
                .with_bias(false)
                .init(device),
            causal: self.causal,
            pad_token_id: self.pad_token_id,
            max_positions: self.max_positions,
        }
    }
}

#[derive(Module, Debug)]
pub struct LmModel<B: Backend> {
    pub embedding:  EmbeddingLayer<B>,
    pub layers:     Vec<EncoderBlock<B>>,
    pub final_norm: LayerNorm<B>,
    pub lm_head:    Linear<B>,
    causal:        bool,
    pad_token_id:  usize,
    max_positions: usize,
}

impl<B: Backend> LmModel<B> {
    /// input_ids: [batch, seq_len] → logits [batch, seq_len, vocab].
    /// `attention_mask` (1 = real, 0 = pad) may be omitted for
    /// unpadded inference input.
    pub fn forward(
        &self,
        input_ids: Tensor<B, 2, Int>,
        attention_mask: Option<Tensor<B, 2, Int>>,
    ) -> Tensor<B, 3> {
        let [batch_size, seq_len] = input_ids.dims();

        let pad_mask = attention_mask.map(|mask| mask.equal_elem(0));
        let mut x = self.embedding.forward(input_ids);

        let attn_mask = if self.causal {
            Some(generate_autoregressive_mask::<B>(batch_size, seq_len, &x.device()))
        } else {
            None
        };

        for block in &self.layers {
            x = block.forward(x, pad_mask.clone(), attn_mask.clone());
        }
        self.lm_head.forward(self.final_norm.forward(x))
    }

    pub fn forward_loss(&self, batch: &LmBatch<B>) -> (Tensor<B, 1>, Tensor<B, 3>) {
        let logits = self.forward(batch.input_ids.clone(), Some(batch.attention_mask.clone()));
        let loss = masked_cross_entropy(logits.clone(), batch.labels.clone());
        (loss, logits)
    }

    /// Grow the embedding table and head to `new_vocab` entries,
    /// keeping every trained row. Required after the tokenizer
    /// gains tokens (e.g. a registered pad token).
    pub fn resize_vocab(self, new_vocab: usize, device: &B::Device) -> Self {
        let Self {
            embedding,
            layers,
            final_norm,
            lm_head,
            causal,
            pad_token_id,
            max_positions,
        } = self;

        Self {
            embedding: embedding.resize_vocab(new_vocab, device),
            layers,
            final_norm,
            lm_head: grow_linear_output(lm_head, new_vocab, device),
            causal,
            pad_token_id,
            max_positions,
        }
    }

    pub fn vocab_size(&self) -> usize {
        self.embedding.vocab_rows()
    }

    pub fn is_causal(&self) -> bool {
        self.causal
    }

    pub fn pad_token_id(&self) -> u32 {
        self.pad_token_id as u32
    }

    pub fn max_positions(&self) -> usize {
        self.max_positions
    }

    /// The token embedding matrix, for similarity scoring.
    pub fn token_embeddings(&self) -> Tensor<B, 2> {
        self.embedding.token_weight()
    }

    /// The task head as its own module, for head-only warmup
    /// steps during staged fine-tuning.
    pub fn head_module(&self) -> Linear<B> {
        self.lm_head.clone()
    }
}
