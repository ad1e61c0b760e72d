//! Deterministic stand-in models and vocabularies for tests and benchmarks.

use std::sync::{
    Arc, Mutex,
    atomic::{AtomicUsize, Ordering},
};

use deval_data::{CharTokenizer, TokenizerTrait};

use crate::model::{LanguageModel, ModelError};

/// Always puts a large logit on `token`.
#[derive(Clone, Copy, Debug)]
pub struct FixedTokenModel {
    pub token: usize,
    pub vocab_size: usize,
}

impl LanguageModel for FixedTokenModel {
    fn infer(&self, _context: &[usize]) -> Result<Vec<f32>, ModelError> {
        let mut logits = vec![0.0; self.vocab_size];
        logits[self.token] = 10.0;
        Ok(logits)
    }
}

/// Returns the same logits regardless of context.
#[derive(Clone, Debug)]
pub struct StaticLogitsModel {
    pub logits: Vec<f32>,
}

impl StaticLogitsModel {
    #[must_use]
    pub fn uniform(vocab_size: usize) -> Self {
        Self {
            logits: vec![0.0; vocab_size],
        }
    }
}

impl LanguageModel for StaticLogitsModel {
    fn infer(&self, _context: &[usize]) -> Result<Vec<f32>, ModelError> {
        Ok(self.logits.clone())
    }
}

/// Favours the token after the last one in the window, wrapping around the vocabulary.
#[derive(Clone, Copy, Debug)]
pub struct SuccessorModel {
    pub vocab_size: usize,
}

impl LanguageModel for SuccessorModel {
    fn infer(&self, context: &[usize]) -> Result<Vec<f32>, ModelError> {
        let last = *context.last().ok_or(ModelError::EmptyContext)?;
        let mut logits = vec![0.0; self.vocab_size];
        logits[(last + 1) % self.vocab_size] = 10.0;
        Ok(logits)
    }
}

/// Fails once it has answered `succeed_for` queries.
#[derive(Clone, Debug, Default)]
pub struct FailingModel {
    pub succeed_for: usize,
    pub vocab_size: usize,
    calls: Arc<AtomicUsize>,
}

impl FailingModel {
    #[must_use]
    pub fn new(succeed_for: usize, vocab_size: usize) -> Self {
        Self {
            succeed_for,
            vocab_size,
            calls: Arc::default(),
        }
    }
}

impl LanguageModel for FailingModel {
    fn infer(&self, _context: &[usize]) -> Result<Vec<f32>, ModelError> {
        if self.calls.fetch_add(1, Ordering::SeqCst) >= self.succeed_for {
            return Err(ModelError::Backend("device lost".into()));
        }
        Ok(vec![0.0; self.vocab_size])
    }
}

/// Records every context window it is queried with. Clones share the record.
#[derive(Clone, Debug)]
pub struct RecordingModel<M> {
    pub inner: M,
    contexts: Arc<Mutex<Vec<Vec<usize>>>>,
}

impl<M> RecordingModel<M> {
    pub fn new(inner: M) -> Self {
        Self {
            inner,
            contexts: Arc::default(),
        }
    }

    /// Snapshot of the windows seen so far.
    #[must_use]
    pub fn contexts(&self) -> Vec<Vec<usize>> {
        self.contexts
            .lock()
            .map(|c| c.clone())
            .unwrap_or_default()
    }

    #[must_use]
    pub fn calls(&self) -> usize {
        self.contexts.lock().map(|c| c.len()).unwrap_or_default()
    }
}

impl<M: LanguageModel> LanguageModel for RecordingModel<M> {
    fn infer(&self, context: &[usize]) -> Result<Vec<f32>, ModelError> {
        if let Ok(mut contexts) = self.contexts.lock() {
            contexts.push(context.to_vec());
        }
        self.inner.infer(context)
    }
}

/// Lowercase letters, space and `.`; no end-of-sequence token.
#[must_use]
pub fn letters() -> CharTokenizer {
    CharTokenizer::new("abcdefghijklmnopqrstuvwxyz .".chars())
}

#[must_use]
pub fn letters_tokenizer() -> Arc<dyn TokenizerTrait> {
    Arc::new(letters())
}
