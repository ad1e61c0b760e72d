//! The inference boundary: a context window in, next-token logits out.

/// Anything that can score the next token given a window of previous tokens.
pub trait LanguageModel {
    /// Logits over the vocabulary for the token following `context`.
    fn infer(&self, context: &[usize]) -> Result<Vec<f32>, ModelError>;
}

impl<M: LanguageModel + ?Sized> LanguageModel for &M {
    fn infer(&self, context: &[usize]) -> Result<Vec<f32>, ModelError> {
        (**self).infer(context)
    }
}

impl<M: LanguageModel + ?Sized> LanguageModel for std::sync::Arc<M> {
    fn infer(&self, context: &[usize]) -> Result<Vec<f32>, ModelError> {
        (**self).infer(context)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ModelError {
    #[error("empty context window")]
    EmptyContext,
    #[error("token {token} is outside the vocabulary of {vocab_size}")]
    TokenOutOfRange { token: usize, vocab_size: usize },
    #[error("unusable next-token distribution: {0}")]
    InvalidLogits(String),
    #[error("failed to load model weights from {0}: {1}")]
    Load(String, String),
    #[error("inference failed: {0}")]
    Backend(String),
}
