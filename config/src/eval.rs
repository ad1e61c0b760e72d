//! Generation and evaluation-run parameters, and the on-disk run configuration.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::{ArtifactPaths, ModelArch};

/// Per-run sampling parameters.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[cfg_attr(feature = "clap", derive(clap::Args))]
pub struct GenerationParams {
    /// Softmax temperature (must be > 0)
    #[serde(default = "default_temperature")]
    #[cfg_attr(feature = "clap", arg(long, default_value = "0.7"))]
    pub temperature: f32,
    /// Sample only among the k highest-scoring tokens
    #[serde(default = "default_top_k")]
    #[cfg_attr(feature = "clap", arg(long, default_value = "50"))]
    pub top_k: usize,
    /// Upper bound on generated tokens. When unset, each sample generates up to the
    /// character length of its reference record.
    #[serde(default)]
    #[cfg_attr(feature = "clap", arg(long))]
    pub max_tokens: Option<usize>,
}

fn default_temperature() -> f32 {
    0.7
}
fn default_top_k() -> usize {
    50
}

impl Default for GenerationParams {
    fn default() -> Self {
        Self {
            temperature: default_temperature(),
            top_k: default_top_k(),
            max_tokens: None,
        }
    }
}

/// Parameters of one evaluation run.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[cfg_attr(feature = "clap", derive(clap::Args))]
pub struct EvalParams {
    /// Tokenizer: HuggingFace model name, local tokenizer.json, or "chars:<alphabet file>"
    #[serde(default = "default_tokenizer")]
    #[cfg_attr(feature = "clap", arg(long, default_value = "gpt2"))]
    pub tokenizer: String,
    /// Dataset split to draw records from
    #[serde(default = "default_split")]
    #[cfg_attr(feature = "clap", arg(long, default_value = "train"))]
    pub split: String,
    /// Number of leading records evaluated
    #[serde(default = "default_samples")]
    #[cfg_attr(feature = "clap", arg(long, default_value = "10"))]
    pub samples: usize,
    /// Base seed; each sample derives its own random source from it
    #[serde(default)]
    #[cfg_attr(feature = "clap", arg(long, default_value = "0"))]
    pub seed: u64,
    /// Worker threads generating samples concurrently
    #[serde(default = "default_workers")]
    #[cfg_attr(feature = "clap", arg(long, default_value = "1"))]
    pub workers: usize,
    /// Abort a single sample's generation after this many seconds
    #[serde(default)]
    #[cfg_attr(feature = "clap", arg(long))]
    pub timeout_secs: Option<u64>,
    /// Corpus metrics to compute (comma-separated)
    #[serde(default = "default_metrics")]
    #[cfg_attr(
        feature = "clap",
        arg(long, value_delimiter = ',', default_value = "bleu,rouge")
    )]
    pub metrics: Vec<String>,
    /// Prepend the prompt to the generated continuation before alignment
    #[serde(default)]
    #[cfg_attr(feature = "clap", arg(long))]
    pub echo_prompt: bool,
    #[serde(default, flatten)]
    #[cfg_attr(feature = "clap", command(flatten))]
    pub generation: GenerationParams,
}

fn default_tokenizer() -> String {
    "gpt2".into()
}
fn default_split() -> String {
    "train".into()
}
fn default_samples() -> usize {
    10
}
fn default_workers() -> usize {
    1
}
fn default_metrics() -> Vec<String> {
    vec!["bleu".into(), "rouge".into()]
}

impl Default for EvalParams {
    fn default() -> Self {
        Self {
            tokenizer: default_tokenizer(),
            split: default_split(),
            samples: default_samples(),
            seed: 0,
            workers: default_workers(),
            timeout_secs: None,
            metrics: default_metrics(),
            echo_prompt: false,
            generation: GenerationParams::default(),
        }
    }
}

impl EvalParams {
    #[must_use]
    pub fn timeout(&self) -> Option<std::time::Duration> {
        self.timeout_secs.map(std::time::Duration::from_secs)
    }
}

/// Everything read from `config.json`.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct RunConfig {
    #[serde(default)]
    pub model: ModelArch,
    #[serde(default, rename = "train")]
    pub paths: ArtifactPaths,
    #[serde(default)]
    pub eval: EvalParams,
}

impl RunConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Io(path.display().to_string(), e))?;
        let config: Self = serde_json::from_str(&json)
            .map_err(|e| ConfigError::Parse(path.display().to_string(), e))?;
        config.model.validate()?;
        Ok(config)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let path = path.as_ref();
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| ConfigError::Parse(path.display().to_string(), e))?;
        std::fs::write(path, json).map_err(|e| ConfigError::Io(path.display().to_string(), e))
    }
}

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read/write config file {0}: {1}")]
    Io(String, std::io::Error),
    #[error("failed to parse config file {0}: {1}")]
    Parse(String, serde_json::Error),
    #[error("invalid configuration: {0}")]
    Invalid(String),
}
