#![warn(clippy::pedantic)]
#![allow(
    clippy::missing_panics_doc,
    clippy::missing_errors_doc,
    clippy::doc_markdown,
    clippy::module_name_repetitions
)]

//! Facade crate for the `deval` binary: backend selection, run assembly and report
//! printing on top of the library crates.

pub mod report;

use std::{path::Path, sync::Arc};

use deval_config::{ConfigError, EvalParams, RunConfig};
use deval_data::{DatasetError, TokenizerError, TokenizerTrait};
use deval_generation::{DecoderModel, DecoderModelConfig, EvalError, GenerationError, ModelError};

pub use deval_config::{ArtifactPaths, GenerationParams, ModelArch};
pub use deval_data::{TextDataset, load_tokenizer};
pub use deval_generation::{EvalPipeline, Evaluator, TextGenerator};

#[cfg(feature = "wgpu")]
pub type InferenceBackend = burn::backend::Wgpu;

#[cfg(all(feature = "ndarray", not(feature = "wgpu")))]
pub type InferenceBackend = burn::backend::NdArray<f32>;

#[cfg(not(any(feature = "ndarray", feature = "wgpu")))]
compile_error!("At least one backend must be enabled, please run with `--features ndarray/wgpu`");

#[derive(Debug, thiserror::Error)]
pub enum CliError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Dataset(#[from] DatasetError),
    #[error(transparent)]
    Tokenizer(#[from] TokenizerError),
    #[error(transparent)]
    Model(#[from] ModelError),
    #[error(transparent)]
    Generation(#[from] GenerationError),
    #[error(transparent)]
    Eval(#[from] EvalError),
    #[error("failed to read {0}: {1}")]
    Io(String, std::io::Error),
    #[error("failed to encode report: {0}")]
    Json(#[from] serde_json::Error),
}

/// Evaluation flags. Each one left off the command line keeps the `eval` value from
/// `config.json` (or its built-in default).
#[derive(Clone, Debug, Default, PartialEq, clap::Args)]
pub struct EvalOverrides {
    /// Tokenizer: HuggingFace model name, local tokenizer.json, or "chars:<alphabet file>"
    #[arg(long)]
    pub tokenizer: Option<String>,
    /// Dataset split to draw records from
    #[arg(long)]
    pub split: Option<String>,
    /// Number of leading records evaluated
    #[arg(long)]
    pub samples: Option<usize>,
    /// Base seed; each sample derives its own random source from it
    #[arg(long)]
    pub seed: Option<u64>,
    /// Worker threads generating samples concurrently
    #[arg(long)]
    pub workers: Option<usize>,
    /// Abort a single sample's generation after this many seconds
    #[arg(long)]
    pub timeout_secs: Option<u64>,
    /// Corpus metrics to compute (comma-separated)
    #[arg(long, value_delimiter = ',')]
    pub metrics: Option<Vec<String>>,
    /// Prepend the prompt to the generated continuation before alignment
    #[arg(long, num_args = 0..=1, default_missing_value = "true")]
    pub echo_prompt: Option<bool>,
    /// Softmax temperature (must be > 0)
    #[arg(long)]
    pub temperature: Option<f32>,
    /// Sample only among the k highest-scoring tokens
    #[arg(long)]
    pub top_k: Option<usize>,
    /// Upper bound on generated tokens
    #[arg(long)]
    pub max_tokens: Option<usize>,
}

/// Apply the flags given on the command line on top of the file's `eval` section.
#[must_use]
pub fn overlay_params(file: EvalParams, cli: EvalOverrides) -> EvalParams {
    EvalParams {
        tokenizer: cli.tokenizer.unwrap_or(file.tokenizer),
        split: cli.split.unwrap_or(file.split),
        samples: cli.samples.unwrap_or(file.samples),
        seed: cli.seed.unwrap_or(file.seed),
        workers: cli.workers.unwrap_or(file.workers),
        timeout_secs: cli.timeout_secs.or(file.timeout_secs),
        metrics: cli.metrics.unwrap_or(file.metrics),
        echo_prompt: cli.echo_prompt.unwrap_or(file.echo_prompt),
        generation: GenerationParams {
            temperature: cli.temperature.unwrap_or(file.generation.temperature),
            top_k: cli.top_k.unwrap_or(file.generation.top_k),
            max_tokens: cli.max_tokens.or(file.generation.max_tokens),
        },
    }
}

/// `config.json` when it exists, otherwise the built-in defaults.
pub fn load_run_config(path: &Path) -> Result<RunConfig, CliError> {
    if path.exists() {
        Ok(RunConfig::load(path)?)
    } else {
        tracing::warn!(
            "{} not found, using default model architecture and paths",
            path.display()
        );
        Ok(RunConfig::default())
    }
}

/// Build the decoder for `tokenizer`'s vocabulary and load its trained weights.
pub fn load_model(
    config: &RunConfig,
    tokenizer: &dyn TokenizerTrait,
) -> Result<DecoderModel<InferenceBackend>, CliError> {
    let device = Default::default();
    let model_config = DecoderModelConfig::from_tokenizer(config.model.clone(), tokenizer);
    tracing::info!(
        model_path = %config.paths.model_path,
        vocab_size = model_config.vocab_size,
        context_length = config.model.context_length,
        "loading model"
    );
    Ok(model_config.load::<InferenceBackend>(&config.paths.model_path, &device)?)
}

pub fn generator_for(
    config: &RunConfig,
    tokenizer: Arc<dyn TokenizerTrait>,
) -> Result<TextGenerator<DecoderModel<InferenceBackend>>, CliError> {
    let model = load_model(config, tokenizer.as_ref())?;
    Ok(TextGenerator::new(
        model,
        tokenizer,
        config.model.context_length,
    )?)
}

/// Non-empty lines of a text file.
pub fn read_lines(path: &Path) -> Result<Vec<String>, CliError> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| CliError::Io(path.display().to_string(), e))?;
    Ok(text
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(str::to_string)
        .collect())
}
