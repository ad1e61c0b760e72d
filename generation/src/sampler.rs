//! Temperature-scaled top-k sampling over next-token logits.

use deval_config::GenerationParams;
use rand::Rng;

use crate::{GenerationError, model::ModelError};

/// Sampling settings for one generation.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SampleConfig {
    pub temperature: f32,
    pub top_k: usize,
    pub max_tokens: usize,
}

impl SampleConfig {
    pub fn new(temperature: f32, top_k: usize, max_tokens: usize) -> Result<Self, GenerationError> {
        let config = Self {
            temperature,
            top_k,
            max_tokens,
        };
        config.validate()?;
        Ok(config)
    }

    /// Resolve run parameters, falling back to `default_max_tokens` when the run leaves it unset.
    pub fn from_params(
        params: &GenerationParams,
        default_max_tokens: usize,
    ) -> Result<Self, GenerationError> {
        Self::new(
            params.temperature,
            params.top_k,
            params.max_tokens.unwrap_or(default_max_tokens),
        )
    }

    pub fn validate(&self) -> Result<(), GenerationError> {
        if !(self.temperature.is_finite() && self.temperature > 0.0) {
            return Err(GenerationError::InvalidConfig(format!(
                "temperature must be a positive number, got {}",
                self.temperature
            )));
        }
        if self.top_k == 0 {
            return Err(GenerationError::InvalidConfig(
                "top_k must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

/// A drawn token and the probability it had under the truncated distribution.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Sample {
    pub token: usize,
    pub probability: f32,
}

#[derive(Clone, Copy, Debug)]
pub struct Sampler {
    temperature: f64,
    top_k: usize,
}

impl Sampler {
    /// Fails with `InvalidConfig` unless the temperature is positive and `top_k >= 1`.
    pub fn new(config: &SampleConfig) -> Result<Self, GenerationError> {
        config.validate()?;
        Ok(Self {
            temperature: f64::from(config.temperature),
            top_k: config.top_k,
        })
    }

    /// Draw one token id from `logits`.
    ///
    /// Only the `top_k` highest logits are eligible; equal logits rank by lower index.
    /// The draw consumes exactly one value from `rng` unless a single candidate remains.
    pub fn sample<R: Rng + ?Sized>(
        &self,
        logits: &[f32],
        rng: &mut R,
    ) -> Result<Sample, GenerationError> {
        let (candidates, weights) = self.weights(logits)?;
        let total: f64 = weights.iter().sum();

        if candidates.len() == 1 {
            return Ok(Sample {
                token: candidates[0],
                probability: 1.0,
            });
        }

        let target = rng.random::<f64>() * total;
        let mut cumulative = 0.0;
        // Rounding can leave `target` just past the final sum
        let mut chosen = weights.iter().rposition(|&w| w > 0.0).unwrap_or(0);
        for (i, &w) in weights.iter().enumerate() {
            cumulative += w;
            if w > 0.0 && target < cumulative {
                chosen = i;
                break;
            }
        }

        Ok(Sample {
            token: candidates[chosen],
            probability: (weights[chosen] / total) as f32,
        })
    }

    /// The truncated, temperature-scaled distribution as `(token, probability)` pairs,
    /// most likely first.
    pub fn probabilities(&self, logits: &[f32]) -> Result<Vec<(usize, f64)>, GenerationError> {
        let (candidates, weights) = self.weights(logits)?;
        let total: f64 = weights.iter().sum();
        Ok(candidates
            .into_iter()
            .zip(weights)
            .map(|(token, w)| (token, w / total))
            .collect())
    }

    /// Retained token ids (best first) and their unnormalized softmax weights.
    fn weights(&self, logits: &[f32]) -> Result<(Vec<usize>, Vec<f64>), GenerationError> {
        if logits.is_empty() {
            return Err(ModelError::InvalidLogits("empty logits".into()).into());
        }
        if let Some(i) = logits.iter().position(|l| l.is_nan()) {
            return Err(ModelError::InvalidLogits(format!("NaN logit at index {i}")).into());
        }

        let candidates = top_k_indices(logits, self.top_k);
        let scaled: Vec<f64> = candidates
            .iter()
            .map(|&i| f64::from(logits[i]) / self.temperature)
            .collect();
        let max = scaled[0];

        let weights = if max.is_infinite() {
            // Mass goes to the +inf logits, or uniformly over an all -inf set
            scaled
                .iter()
                .map(|&s| if s == max { 1.0 } else { 0.0 })
                .collect()
        } else {
            scaled.iter().map(|&s| (s - max).exp()).collect()
        };
        Ok((candidates, weights))
    }
}

/// Indices of the `k` largest values, ordered best first with ties by ascending index.
fn top_k_indices(logits: &[f32], k: usize) -> Vec<usize> {
    let by_rank = |a: &usize, b: &usize| logits[*b].total_cmp(&logits[*a]).then(a.cmp(b));

    let mut indices: Vec<usize> = (0..logits.len()).collect();
    let k = k.clamp(1, indices.len());
    if k < indices.len() {
        indices.select_nth_unstable_by(k - 1, by_rank);
        indices.truncate(k);
    }
    indices.sort_unstable_by(by_rank);
    indices
}
