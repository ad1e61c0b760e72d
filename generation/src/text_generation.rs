use burn::{
    nn::{
        Embedding, EmbeddingConfig, Initializer, LayerNorm, LayerNormConfig, Linear, LinearConfig,
        attention::generate_autoregressive_mask,
        transformer::{TransformerEncoder, TransformerEncoderConfig, TransformerEncoderInput},
    },
    prelude::*,
    record::{DefaultRecorder, Recorder},
};
use deval_config::ModelArch;
use deval_data::TokenizerTrait;

use crate::model::{LanguageModel, ModelError};

#[derive(Clone, Debug)]
pub struct DecoderModelConfig {
    pub arch: ModelArch,
    pub vocab_size: usize,
}

/// Decoder-only transformer: causal self-attention blocks over learned token and
/// position embeddings.
#[derive(Module, Debug)]
pub struct DecoderModel<B: Backend> {
    pub token_embedding: Embedding<B>,
    pub position_embedding: Embedding<B>,
    pub transformer: TransformerEncoder<B>,
    pub norm: LayerNorm<B>,
    pub lm_head: Linear<B>,
    pub context_length: usize,
    pub vocab_size: usize,
}

impl DecoderModelConfig {
    #[must_use]
    pub fn new(arch: ModelArch, vocab_size: usize) -> Self {
        Self { arch, vocab_size }
    }

    pub fn from_tokenizer(arch: ModelArch, tokenizer: &dyn TokenizerTrait) -> Self {
        Self::new(arch, tokenizer.vocab_size())
    }

    pub fn init<B: Backend>(&self, device: &B::Device) -> DecoderModel<B> {
        let arch = &self.arch;
        let initializer = Initializer::Normal {
            mean: 0.0,
            std: 0.02,
        };

        DecoderModel {
            token_embedding: EmbeddingConfig::new(self.vocab_size, arch.d_model)
                .with_initializer(initializer.clone())
                .init(device),
            position_embedding: EmbeddingConfig::new(arch.context_length, arch.d_model)
                .with_initializer(initializer.clone())
                .init(device),
            transformer: TransformerEncoderConfig::new(
                arch.d_model,
                arch.d_ff,
                arch.num_heads,
                arch.num_blocks,
            )
            .with_dropout(arch.dropout)
            .with_norm_first(true)
            .init(device),
            norm: LayerNormConfig::new(arch.d_model).init(device),
            lm_head: LinearConfig::new(arch.d_model, self.vocab_size)
                .with_initializer(initializer)
                .init(device),
            context_length: arch.context_length,
            vocab_size: self.vocab_size,
        }
    }

    /// Initialize, then load trained weights recorded at `model_path`.
    pub fn load<B: Backend>(
        &self,
        model_path: &str,
        device: &B::Device,
    ) -> Result<DecoderModel<B>, ModelError> {
        let record = DefaultRecorder::new()
            .load(model_path.into(), device)
            .map_err(|e| ModelError::Load(model_path.to_string(), e.to_string()))?;
        Ok(self.init::<B>(device).load_record(record))
    }
}

impl<B: Backend> DecoderModel<B> {
    /// `[batch, seq]` token ids to `[batch, seq, vocab]` logits.
    pub fn forward(&self, tokens: Tensor<B, 2, Int>) -> Tensor<B, 3> {
        let [batch_size, seq_length] = tokens.dims();
        let device = tokens.device();

        let positions = Tensor::<B, 1, Int>::arange(0..seq_length as i64, &device)
            .reshape([1, seq_length])
            .repeat_dim(0, batch_size);

        let x = self.token_embedding.forward(tokens) + self.position_embedding.forward(positions);
        let mask = generate_autoregressive_mask::<B>(batch_size, seq_length, &device);
        let x = self
            .transformer
            .forward(TransformerEncoderInput::new(x).mask_attn(mask));

        self.lm_head.forward(self.norm.forward(x))
    }
}

impl<B: Backend> LanguageModel for DecoderModel<B> {
    fn infer(&self, context: &[usize]) -> Result<Vec<f32>, ModelError> {
        if context.is_empty() {
            return Err(ModelError::EmptyContext);
        }
        // Position embeddings only cover `context_length` slots
        let context = &context[context.len().saturating_sub(self.context_length)..];

        let ids = context
            .iter()
            .map(|&token| {
                i32::try_from(token)
                    .ok()
                    .filter(|_| token < self.vocab_size)
                    .ok_or(ModelError::TokenOutOfRange {
                        token,
                        vocab_size: self.vocab_size,
                    })
            })
            .collect::<Result<Vec<i32>, _>>()?;

        let seq_length = ids.len();
        let device = self.lm_head.weight.val().device();
        let input =
            Tensor::<B, 1, Int>::from_ints(ids.as_slice(), &device).reshape([1, seq_length]);

        let logits = self.forward(input);
        let last = logits
            .slice(s![.., (seq_length - 1)..seq_length, ..])
            .reshape([self.vocab_size]);

        last.into_data()
            .convert::<f32>()
            .to_vec::<f32>()
            .map_err(|e| ModelError::Backend(format!("{e:?}")))
    }
}

#[cfg(test)]
mod tests {
    use burn::backend::NdArray;

    use super::*;

    type TestBackend = NdArray<f32>;

    fn tiny_config() -> DecoderModelConfig {
        DecoderModelConfig::new(
            ModelArch {
                context_length: 4,
                d_model: 8,
                d_ff: 32,
                num_blocks: 2,
                num_heads: 2,
                dropout: 0.0,
            },
            11,
        )
    }

    #[test]
    fn test_forward_shape() {
        let device = Default::default();
        let model = tiny_config().init::<TestBackend>(&device);
        let tokens = Tensor::<TestBackend, 1, Int>::from_ints([1, 2, 3].as_slice(), &device)
            .reshape([1, 3]);
        assert_eq!(model.forward(tokens).dims(), [1, 3, 11]);
    }

    #[test]
    fn test_infer_returns_vocab_logits() {
        let device = Default::default();
        let model = tiny_config().init::<TestBackend>(&device);
        let logits = model.infer(&[1, 2, 3]).unwrap();
        assert_eq!(logits.len(), 11);
        assert!(logits.iter().all(|l| l.is_finite()));
    }

    #[test]
    fn test_infer_uses_trailing_window() {
        let device = Default::default();
        let model = tiny_config().init::<TestBackend>(&device);
        let long = model.infer(&[9, 9, 1, 2, 3, 4]).unwrap();
        let tail = model.infer(&[1, 2, 3, 4]).unwrap();
        assert_eq!(long, tail);
    }

    #[test]
    fn test_infer_rejects_bad_context() {
        let device = Default::default();
        let model = tiny_config().init::<TestBackend>(&device);
        assert!(matches!(model.infer(&[]), Err(ModelError::EmptyContext)));
        assert!(matches!(
            model.infer(&[1, 11]),
            Err(ModelError::TokenOutOfRange { token: 11, .. })
        ));
    }

    #[test]
    fn test_load_recorded_weights() {
        let device = Default::default();
        let config = tiny_config();
        let model = config.init::<TestBackend>(&device);
        let expected = model.infer(&[3, 1, 4]).unwrap();

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model");
        model
            .save_file(path.clone(), &DefaultRecorder::new())
            .unwrap();

        let loaded = config
            .load::<TestBackend>(path.to_str().unwrap(), &device)
            .unwrap();
        assert_eq!(loaded.infer(&[3, 1, 4]).unwrap(), expected);
    }

    #[test]
    fn test_load_missing_weights() {
        let device = Default::default();
        let result = tiny_config().load::<TestBackend>("/nonexistent/model", &device);
        assert!(matches!(result, Err(ModelError::Load(..))));
    }
}
