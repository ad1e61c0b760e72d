//! Model architecture and artifact locations, as stored in `config.json`.

use serde::{Deserialize, Serialize};

use crate::ConfigError;

/// Decoder-only transformer dimensions.
///
/// Field names follow the `model` section of the project's `config.json`.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ModelArch {
    /// Number of tokens the model attends over (context window capacity).
    #[serde(default = "default_context_length")]
    pub context_length: usize,
    /// Hidden size, must be divisible by `num_heads`.
    #[serde(default = "default_d_model")]
    pub d_model: usize,
    /// Feed-forward inner size (conventionally `4 * d_model`).
    #[serde(default = "default_d_ff")]
    pub d_ff: usize,
    #[serde(default = "default_num_blocks")]
    pub num_blocks: usize,
    #[serde(default = "default_num_heads")]
    pub num_heads: usize,
    #[serde(default = "default_dropout")]
    pub dropout: f64,
}

fn default_context_length() -> usize {
    16
}
fn default_d_model() -> usize {
    64
}
fn default_d_ff() -> usize {
    256
}
fn default_num_blocks() -> usize {
    8
}
fn default_num_heads() -> usize {
    4
}
fn default_dropout() -> f64 {
    0.1
}

impl Default for ModelArch {
    fn default() -> Self {
        Self {
            context_length: default_context_length(),
            d_model: default_d_model(),
            d_ff: default_d_ff(),
            num_blocks: default_num_blocks(),
            num_heads: default_num_heads(),
            dropout: default_dropout(),
        }
    }
}

impl ModelArch {
    #[must_use]
    pub fn head_dim(&self) -> usize {
        self.d_model / self.num_heads
    }

    /// Reject architectures the decoder cannot be built from.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.context_length == 0 {
            return Err(ConfigError::Invalid(
                "model.context_length must be at least 1".into(),
            ));
        }
        if self.num_heads == 0 || !self.d_model.is_multiple_of(self.num_heads) {
            return Err(ConfigError::Invalid(format!(
                "model.d_model ({}) must be divisible by model.num_heads ({})",
                self.d_model, self.num_heads
            )));
        }
        if !(0.0..1.0).contains(&self.dropout) {
            return Err(ConfigError::Invalid(format!(
                "model.dropout must be in [0, 1), got {}",
                self.dropout
            )));
        }
        Ok(())
    }
}

/// Where the trained weights and the evaluation corpus live.
///
/// Kept under the `train` key for compatibility with the training project's config file.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ArtifactPaths {
    #[serde(default = "default_model_path")]
    pub model_path: String,
    #[serde(default = "default_dataset_path")]
    pub dataset_path: String,
}

fn default_model_path() -> String {
    "./artifacts/model".into()
}
fn default_dataset_path() -> String {
    "vesteinn/babylm".into()
}

impl Default for ArtifactPaths {
    fn default() -> Self {
        Self {
            model_path: default_model_path(),
            dataset_path: default_dataset_path(),
        }
    }
}
