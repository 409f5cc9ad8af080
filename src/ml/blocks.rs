// ============================================================
// Transformer Building Blocks
// ============================================================
// Shared pieces the task models are assembled from:
//
//   EmbeddingLayer — token + learned position embeddings.
//                    Self-attention is permutation-invariant,
//                    so position must be injected explicitly.
//   EncoderBlock   — pre-norm-free residual block: self
//                    attention + GELU feed-forward. Doubles as
//                    the decoder-only LM block when given an
//                    autoregressive attention mask.
//   DecoderBlock   — EncoderBlock plus cross-attention over an
//                    encoder memory (sequence-to-sequence).
//
// Plus the embedding-growth helpers used when a tokenizer gains
// tokens after the weights were created (pad-token fixup).
//
// Reference: Vaswani et al. (2017) Attention Is All You Need

use burn::{
    module::Param,
    nn::{
        attention::{MhaInput, MultiHeadAttention, MultiHeadAttentionConfig},
        Dropout, DropoutConfig, Embedding, EmbeddingConfig, LayerNorm, LayerNormConfig, Linear,
        LinearConfig,
    },
    prelude::*,
};

// ─── Embeddings ───────────────────────────────────────────────────────────────

#[derive(Config, Debug)]
pub struct EmbeddingLayerConfig {
    pub vocab_size:    usize,
    pub max_positions: usize,
    pub d_model:       usize,
    pub dropout:       f64,
}

impl EmbeddingLayerConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> EmbeddingLayer<B> {
        EmbeddingLayer {
            token:    EmbeddingConfig::new(self.vocab_size, self.d_model).init(device),
            position: EmbeddingConfig::new(self.max_positions, self.d_model).init(device),
            dropout:  DropoutConfig::new(self.dropout).init(),
        }
    }
}

#[derive(Module, Debug)]
pub struct EmbeddingLayer<B: Backend> {
    pub token:    Embedding<B>,
    pub position: Embedding<B>,
    pub dropout:  Dropout,
}

impl<B: Backend> EmbeddingLayer<B> {
    /// input_ids: [batch, seq_len] → [batch, seq_len, d_model]
    pub fn forward(&self, input_ids: Tensor<B, 2, Int>) -> Tensor<B, 3> {
        let [batch_size, seq_len] = input_ids.dims();

        let tok_emb = self.token.forward(input_ids);
        let positions = Tensor::<B, 1, Int>::arange(0..seq_len as i64, &tok_emb.device())
            .unsqueeze::<2>()
            .expand([batch_size, seq_len]);
        let pos_emb = self.position.forward(positions);

        self.dropout.forward(tok_emb + pos_emb)
    }

    /// Rows in the token embedding table.
    pub fn vocab_rows(&self) -> usize {
        self.token.weight.val().dims()[0]
    }

    /// The raw token embedding matrix [vocab, d_model].
    pub fn token_weight(&self) -> Tensor<B, 2> {
        self.token.weight.val()
    }

    /// Grow the token table to `new_vocab` rows, keeping every
    /// existing row. No-op if the table is already large enough.
    pub fn resize_vocab(mut self, new_vocab: usize, device: &B::Device) -> Self {
        self.token = grow_embedding(self.token, new_vocab, device);
        self
    }
}

/// Copy an embedding into a larger table; new rows keep their
/// fresh initialization.
pub fn grow_embedding<B: Backend>(
    embedding: Embedding<B>,
    new_rows: usize,
    device: &B::Device,
) -> Embedding<B> {
    let weight = embedding.weight.val();
    let [rows, cols] = weight.dims();
    if new_rows <= rows {
        return embedding;
    }

    let mut grown = EmbeddingConfig::new(new_rows, cols).init(device);
    let merged = grown.weight.val().slice_assign([0..rows, 0..cols], weight);
    grown.weight = Param::from_tensor(merged.detach());
    grown
}

/// Same growth for a (bias-free) projection's output dimension.
pub fn grow_linear_output<B: Backend>(
    linear: Linear<B>,
    new_out: usize,
    device: &B::Device,
) -> Linear<B> {
    let weight = linear.weight.val();
    let [d_in, d_out] = weight.dims();
    if new_out <= d_out {
        return linear;
    }

    let mut grown = LinearConfig::new(d_in, new_out).with_bias(false).init(device);
    let merged = grown.weight.val().slice_assign([0..d_in, 0..d_out], weight);
    grown.weight = Param::from_tensor(merged.detach());
    grown
}

// ─── Blocks ───────────────────────────────────────────────────────────────────

#[derive(Config, Debug)]
pub struct BlockConfig {
    pub d_model:   usize,
    pub num_heads: usize,
    pub d_ff:      usize,
    pub dropout:   f64,
}

impl BlockConfig {
    pub fn init_encoder<B: Backend>(&self, device: &B::Device) -> EncoderBlock<B> {
        EncoderBlock {
            self_attn: MultiHeadAttentionConfig::new(self.d_model, self.num_heads)
                .with_dropout(self.dropout)
                .init(device),
            ffn_linear1: LinearConfig::new(self.d_model, self.d_ff).init(device),
            ffn_linear2: LinearConfig::new(self.d_ff, self.d_model).init(device),
            norm1:   LayerNormConfig::new(self.d_model).init(device),
            norm2:   LayerNormConfig::new(self.d_model).init(device),
            dropout: DropoutConfig::new(self.dropout).init(),
        }
    }

    pub fn init_decoder<B: Backend>(&self, device: &B::Device) -> DecoderBlock<B> {
        DecoderBlock {
            self_attn: MultiHeadAttentionConfig::new(self.d_model, self.num_heads)
                .with_dropout(self.dropout)
                .init(device),
            cross_attn: MultiHeadAttentionConfig::new(self.d_model, self.num_heads)
                .with_dropout(self.dropout)
                .init(device),
            ffn_linear1: LinearConfig::new(self.d_model, self.d_ff).init(device),
            ffn_linear2: LinearConfig::new(self.d_ff, self.d_model).init(device),
            norm1:   LayerNormConfig::new(self.d_model).init(device),
            norm2:   LayerNormConfig::new(self.d_model).init(device),
            norm3:   LayerNormConfig::new(self.d_model).init(device),
            dropout: DropoutConfig::new(self.dropout).init(),
        }
    }
}

#[derive(Module, Debug)]
pub struct EncoderBlock<B: Backend> {
    pub self_attn:   MultiHeadAttention<B>,
    pub ffn_linear1: Linear<B>,
    pub ffn_linear2: Linear<B>,
    pub norm1:       LayerNorm<B>,
    pub norm2:       LayerNorm<B>,
    pub dropout:     Dropout,
}

impl<B: Backend> EncoderBlock<B> {
    /// `pad_mask`: true where the position is padding.
    /// `attn_mask`: true where attention is forbidden (used for
    /// the autoregressive mask in decoder-only models).
    pub fn forward(
        &self,
        x: Tensor<B, 3>,
        pad_mask: Option<Tensor<B, 2, Bool>>,
        attn_mask: Option<Tensor<B, 3, Bool>>,
    ) -> Tensor<B, 3> {
        let mut input = MhaInput::self_attn(x.clone());
        if let Some(mask) = pad_mask {
            input = input.mask_pad(mask);
        }
        if let Some(mask) = attn_mask {
            input = input.mask_attn(mask);
        }
        let attn_output = self.self_attn.forward(input).context;
        let x = self.norm1.forward(x + self.dropout.forward(attn_output));

        let ffn_out = self
            .ffn_linear2
            .forward(burn::tensor::activation::gelu(self.ffn_linear1.forward(x.clone())));
        self.norm2.forward(x + self.dropout.forward(ffn_out))
    }
}

#[derive(Module, Debug)]
pub struct DecoderBlock<B: Backend> {
    pub self_attn:   MultiHeadAttention<B>,
    pub cross_attn:  MultiHeadAttention<B>,
    pub ffn_linear1: Linear<B>,
    pub ffn_linear2: Linear<B>,
    pub norm1:       LayerNorm<B>,
    pub norm2:       LayerNorm<B>,
    pub norm3:       LayerNorm<B>,
    pub dropout:     Dropout,
}

impl<B: Backend> DecoderBlock<B> {
    /// `causal_mask` forbids attending to future target
    /// positions; `memory_pad_mask` hides padded source
    /// positions from cross-attention.
    pub fn forward(
        &self,
        x: Tensor<B, 3>,
        memory: Tensor<B, 3>,
        causal_mask: Tensor<B, 3, Bool>,
        target_pad_mask: Option<Tensor<B, 2, Bool>>,
        memory_pad_mask: Option<Tensor<B, 2, Bool>>,
    ) -> Tensor<B, 3> {
        let mut input = MhaInput::self_attn(x.clone()).mask_attn(causal_mask);
        if let Some(mask) = target_pad_mask {
            input = input.mask_pad(mask);
        }
        let attn_output = self.self_attn.forward(input).context;
        let x = self.norm1.forward(x + self.dropout.forward(attn_output));

        let mut cross = MhaInput::new(x.clone(), memory.clone(), memory);
        if let Some(mask) = memory_pad_mask {
            cross = cross.mask_pad(mask);
        }
        let cross_output = self.cross_attn.forward(cross).context;
        let x = self.norm2.forward(x + self.dropout.forward(cross_output));

        let ffn_out = self
            .ffn_linear2
            .forward(burn::tensor::activation::gelu(self.ffn_linear1.forward(x.clone())));
        self.norm3.forward(x + self.dropout.forward(ffn_out))
    }
}
