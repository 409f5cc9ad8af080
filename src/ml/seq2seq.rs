// ============================================================
// Sequence-to-Sequence Model
// ============================================================
// Encoder-decoder transformer with a language-model head over
// the decoder, used for summarization. The decoder is driven
// teacher-forced during training (shifted targets from the
// batcher) and autoregressively during generation.
//
// The accepted generation parameters are exactly the knobs the
// greedy decoder honors; the kwargs filter drops everything
// else before it reaches this model.

use burn::{
    nn::{attention::generate_autoregressive_mask, LayerNorm, LayerNormConfig, Linear, LinearConfig},
    prelude::*,
};

use crate::data::batcher::Seq2SeqBatch;
use crate::ml::blocks::{BlockConfig, DecoderBlock, EmbeddingLayer, EmbeddingLayerConfig, EncoderBlock};
use crate::ml::generation::{select_next, GenerationSpec};
use crate::ml::loss::masked_cross_entropy;

#[derive(Config, Debug)]
pub struct Seq2SeqModelConfig {
    pub vocab_size:             usize,
    pub max_positions:          usize,
    pub d_model:                usize,
    pub num_heads:              usize,
    pub encoder_layers:         usize,
    pub decoder_layers:         usize,
    pub d_ff:                   usize,
    pub dropout:                f64,
    pub pad_token_id:           usize,
    pub decoder_start_token_id: usize,
    pub eos_token_id:           usize,
}

impl Seq2SeqModelConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> Seq2SeqModel<B> {
        let embedding = EmbeddingLayerConfig::new(
            self.vocab_size,
            self.max_positions,
            self.d_model,
            self.dropout,
        )
        .init(device);

        let block_cfg = BlockConfig::new(self.d_model, self.num_heads, self.d_ff, self.dropout);
        let encoder = (0..self.encoder_layers)
            .map(|_| block_cfg.init_encoder(device))
            .collect();
        let decoder = (0..self.decoder_layers)
            .map(|_| block_cfg.init_decoder(device))
            .collect();

        Seq2SeqModel {
            embedding,
            encoder,
            decoder,
            final_norm: LayerNormConfig::new(self.d_model).init(device),
            lm_head: LinearConfig::new(self.d_model, self.vocab_size)
                .with_bias(false)
                .init(device),
            pad_token_id: self.pad_token_id,
            decoder_start_token_id: self.decoder_start_token_id,
            eos_token_id: self.eos_token_id,
            max_positions: self.max_positions,
        }
    }
}

#[derive(Module, Debug)]
pub struct Seq2SeqModel<B: Backend> {
    pub embedding:  EmbeddingLayer<B>,
    pub encoder:    Vec<EncoderBlock<B>>,
    pub decoder:    Vec<DecoderBlock<B>>,
    pub final_norm: LayerNorm<B>,
    pub lm_head:    Linear<B>,
    pad_token_id:           usize,
    decoder_start_token_id: usize,
    eos_token_id:           usize,
    max_positions:          usize,
}

impl<B: Backend> Seq2SeqModel<B> {
    /// Parameter names the generation entry point accepts. Any
    /// other key in a generation-kwargs mapping is dropped by
    /// the filter before reaching `generate`.
    pub const GENERATE_PARAMS: &'static [&'static str] = &[
        "max_length",
        "min_length",
        "no_repeat_ngram_size",
        "decoder_start_token_id",
    ];

    /// Run the encoder stack. Returns the memory and the source
    /// padding mask for cross-attention.
    pub fn encode(
        &self,
        source_ids: Tensor<B, 2, Int>,
        source_mask: Tensor<B, 2, Int>,
    ) -> (Tensor<B, 3>, Tensor<B, 2, Bool>) {
        let src_pad = source_mask.equal_elem(0);
        let mut x = self.embedding.forward(source_ids);
        for block in &self.encoder {
            x = block.forward(x, Some(src_pad.clone()), None);
        }
        (x, src_pad)
    }

    /// Run the decoder stack over `decoder_input_ids` against an
    /// encoded memory. Returns per-position logits [batch, t, vocab].
    pub fn decode(
        &self,
        memory: Tensor<B, 3>,
        memory_pad: Tensor<B, 2, Bool>,
        decoder_input_ids: Tensor<B, 2, Int>,
    ) -> Tensor<B, 3> {
        let [batch_size, target_len] = decoder_input_ids.dims();
        let target_pad = decoder_input_ids.clone().equal_elem(self.pad_token_id as i32);
        let causal =
            generate_autoregressive_mask::<B>(batch_size, target_len, &memory.device());

        let mut y = self.embedding.forward(decoder_input_ids);
        for block in &self.decoder {
            y = block.forward(
                y,
                memory.clone(),
                causal.clone(),
                Some(target_pad.clone()),
                Some(memory_pad.clone()),
            );
        }
        self.lm_head.forward(self.final_norm.forward(y))
    }

    /// Full teacher-forced pass: [batch, t, vocab] logits.
    pub fn forward(
        &self,
        source_ids: Tensor<B, 2, Int>,
        source_mask: Tensor<B, 2, Int>,
        decoder_input_ids: Tensor<B, 2, Int>,
    ) -> Tensor<B, 3> {
        let (memory, src_pad) = self.encode(source_ids, source_mask);
        self.decode(memory, src_pad, decoder_input_ids)
    }

    pub fn forward_loss(&self, batch: &Seq2SeqBatch<B>) -> (Tensor<B, 1>, Tensor<B, 3>) {
        let logits = self.forward(
            batch.source_ids.clone(),
            batch.source_mask.clone(),
            batch.decoder_input_ids.clone(),
        );
        let loss = masked_cross_entropy(logits.clone(), batch.labels.clone());
        (loss, logits)
    }

    /// Greedy autoregressive generation for one source sequence.
    /// Returns the produced ids including the start token (and
    /// the end token when one was emitted).
    pub fn generate(
        &self,
        source_ids: &[u32],
        spec: &GenerationSpec,
        device: &B::Device,
    ) -> Vec<u32> {
        if source_ids.is_empty() {
            return Vec::new();
        }

        let source: Vec<i32> = source_ids
            .iter()
            .take(self.max_positions)
            .map(|&id| id as i32)
            .collect();
        let source_len = source.len();
        let source_ids_t =
            Tensor::<B, 1, Int>::from_ints(source.as_slice(), device).reshape([1, source_len]);
        let source_mask = Tensor::<B, 1, Int>::from_ints(
            vec![1i32; source_len].as_slice(),
            device,
        )
        .reshape([1, source_len]);

        let (memory, src_pad) = self.encode(source_ids_t, source_mask);

        let start = spec
            .decoder_start
            .unwrap_or(self.decoder_start_token_id as u32);
        let mut generated = vec![start];
        let cap = spec.max_length.min(self.max_positions).max(2);

        while generated.len() < cap {
            let step_len = generated.len();
            let decoder_ids: Vec<i32> = generated.iter().map(|&id| id as i32).collect();
            let decoder_ids =
                Tensor::<B, 1, Int>::from_ints(decoder_ids.as_slice(), device)
                    .reshape([1, step_len]);

            let logits = self.decode(memory.clone(), src_pad.clone(), decoder_ids);
            let vocab = logits.dims()[2];
            let scores: Vec<f32> = logits
                .slice([0..1, step_len - 1..step_len, 0..vocab])
                .reshape([vocab])
                .into_data()
                .convert::<f32>()
                .to_vec()
                .unwrap_or_default();

            let next = select_next(&scores, &generated, spec);
            generated.push(next);
            if Some(next) == spec.eos_token_id {
                break;
            }
        }

        generated
    }

    pub fn vocab_size(&self) -> usize {
        self.embedding.vocab_rows()
    }

    pub fn decoder_start_token_id(&self) -> u32 {
        self.decoder_start_token_id as u32
    }

    pub fn eos_token_id(&self) -> u32 {
        self.eos_token_id as u32
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
