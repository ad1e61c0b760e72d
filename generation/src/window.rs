use std::collections::VecDeque;

use crate::GenerationError;

/// The bounded sequence of most recent token ids fed to the model.
///
/// Pushing onto a full window evicts the oldest token, so `len() <= capacity()` always holds.
#[derive(Clone, Debug)]
pub struct ContextWindow {
    tokens: VecDeque<usize>,
    capacity: usize,
}

impl ContextWindow {
    pub fn new(capacity: usize) -> Result<Self, GenerationError> {
        if capacity == 0 {
            return Err(GenerationError::InvalidConfig(
                "context length must be at least 1".into(),
            ));
        }
        Ok(Self {
            tokens: VecDeque::with_capacity(capacity),
            capacity,
        })
    }

    /// Seed the window with the last `capacity` tokens of `prompt`.
    pub fn from_prompt(prompt: &[usize], capacity: usize) -> Result<Self, GenerationError> {
        let mut window = Self::new(capacity)?;
        let start = prompt.len().saturating_sub(capacity);
        window.tokens.extend(&prompt[start..]);
        Ok(window)
    }

    /// Append `token`, returning the evicted oldest token if the window was full.
    pub fn push(&mut self, token: usize) -> Option<usize> {
        let evicted = if self.is_full() {
            self.tokens.pop_front()
        } else {
            None
        };
        self.tokens.push_back(token);
        evicted
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    #[must_use]
    pub fn is_full(&self) -> bool {
        self.tokens.len() == self.capacity
    }

    /// Oldest-first view of the window.
    pub fn as_slice(&mut self) -> &[usize] {
        self.tokens.make_contiguous()
    }
}
