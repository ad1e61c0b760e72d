use std::{
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    time::{Duration, Instant},
};

use deval_data::TokenizerTrait;
use rand::{Rng, SeedableRng, rngs::StdRng};
use serde::Serialize;

use crate::{
    GenerationError,
    model::LanguageModel,
    sampler::{SampleConfig, Sampler},
    window::ContextWindow,
};

/// Shared flag that aborts in-flight generations at their next step.
#[derive(Clone, Debug, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Conditions checked before every model query.
#[derive(Clone, Debug, Default)]
pub struct Interrupt {
    cancel: Option<CancelToken>,
    deadline: Option<Instant>,
}

impl Interrupt {
    #[must_use]
    pub fn none() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_cancel(mut self, token: CancelToken) -> Self {
        self.cancel = Some(token);
        self
    }

    /// Deadline `timeout` from now.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.deadline = Some(Instant::now() + timeout);
        self
    }

    fn check(&self, produced: usize) -> Result<(), GenerationError> {
        if self.cancel.as_ref().is_some_and(CancelToken::is_cancelled) {
            return Err(GenerationError::Cancelled(produced));
        }
        if self.deadline.is_some_and(|d| Instant::now() >= d) {
            return Err(GenerationError::TimedOut(produced));
        }
        Ok(())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// Produced `max_tokens` tokens
    MaxTokens,
    /// Sampled the vocabulary's end-of-sequence token
    EndOfSequence,
    /// `max_tokens` was zero
    Empty,
}

/// Result of one generation call.
#[derive(Clone, Debug)]
pub struct Generation {
    /// Decoded continuation, special tokens skipped.
    pub text: String,
    pub tokens: Vec<usize>,
    /// Probability of each token under the distribution it was drawn from.
    pub probabilities: Vec<f32>,
    pub stop_reason: StopReason,
}

impl Generation {
    fn empty() -> Self {
        Self {
            text: String::new(),
            tokens: Vec::new(),
            probabilities: Vec::new(),
            stop_reason: StopReason::Empty,
        }
    }
}

/// Autoregressive generation over a sliding context window.
#[derive(Clone)]
pub struct TextGenerator<M> {
    model: M,
    tokenizer: Arc<dyn TokenizerTrait>,
    context_length: usize,
}

impl<M: LanguageModel> TextGenerator<M> {
    pub fn new(
        model: M,
        tokenizer: Arc<dyn TokenizerTrait>,
        context_length: usize,
    ) -> Result<Self, GenerationError> {
        if context_length == 0 {
            return Err(GenerationError::InvalidConfig(
                "context length must be at least 1".into(),
            ));
        }
        Ok(Self {
            model,
            tokenizer,
            context_length,
        })
    }

    pub fn model(&self) -> &M {
        &self.model
    }

    pub fn tokenizer(&self) -> &Arc<dyn TokenizerTrait> {
        &self.tokenizer
    }

    pub fn context_length(&self) -> usize {
        self.context_length
    }

    pub fn generate<R: Rng + ?Sized>(
        &self,
        prompt: &str,
        config: &SampleConfig,
        rng: &mut R,
    ) -> Result<Generation, GenerationError> {
        self.generate_with(prompt, config, rng, &Interrupt::none())
    }

    /// Continue `prompt` by up to `config.max_tokens` tokens.
    ///
    /// The window starts from the last `context_length` prompt tokens and slides as tokens
    /// are produced. Stops early on the end-of-sequence token when the vocabulary has one.
    pub fn generate_with<R: Rng + ?Sized>(
        &self,
        prompt: &str,
        config: &SampleConfig,
        rng: &mut R,
        interrupt: &Interrupt,
    ) -> Result<Generation, GenerationError> {
        let sampler = Sampler::new(config)?;
        if config.max_tokens == 0 {
            return Ok(Generation::empty());
        }

        let prompt_tokens = self.tokenizer.encode(prompt, true)?;
        if prompt_tokens.is_empty() {
            return Err(GenerationError::InvalidConfig(
                "prompt encodes to no tokens".into(),
            ));
        }

        let mut window = ContextWindow::from_prompt(&prompt_tokens, self.context_length)?;
        let eos = self.tokenizer.eos_token();

        let mut tokens = Vec::with_capacity(config.max_tokens);
        let mut probabilities = Vec::with_capacity(config.max_tokens);
        let mut stop_reason = StopReason::MaxTokens;

        for _ in 0..config.max_tokens {
            interrupt.check(tokens.len())?;

            let logits = self.model.infer(window.as_slice())?;
            let sample = sampler.sample(&logits, rng)?;

            tokens.push(sample.token);
            probabilities.push(sample.probability);
            window.push(sample.token);

            if Some(sample.token) == eos {
                stop_reason = StopReason::EndOfSequence;
                break;
            }
        }

        tracing::trace!(
            prompt_tokens = prompt_tokens.len(),
            generated = tokens.len(),
            ?stop_reason,
            "generation finished"
        );

        Ok(Generation {
            text: self.tokenizer.decode(&tokens, true)?,
            tokens,
            probabilities,
            stop_reason,
        })
    }

    /// Seeded generation returning only the text.
    pub fn generate_text(
        &self,
        prompt: &str,
        config: &SampleConfig,
        seed: u64,
    ) -> Result<String, GenerationError> {
        let mut rng = StdRng::seed_from_u64(seed);
        Ok(self.generate(prompt, config, &mut rng)?.text)
    }
}
