use deval_data::TokenizerError;
use deval_metrics::MetricError;

use crate::model::ModelError;

/// Failure of a single sample's generation. The rest of the batch is unaffected.
#[derive(Debug, thiserror::Error)]
pub enum GenerationError {
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("model unavailable: {0}")]
    ModelUnavailable(#[from] ModelError),
    #[error("tokenizer error: {0}")]
    Tokenizer(#[from] TokenizerError),
    #[error("generation cancelled after {0} tokens")]
    Cancelled(usize),
    #[error("generation timed out after {0} tokens")]
    TimedOut(usize),
}

/// Failure of the scoring step. Generated texts stay valid.
#[derive(Debug, thiserror::Error)]
pub enum EvalError {
    #[error("no evaluation pairs to score")]
    EmptyBatch,
    #[error("{generated} generated texts but {references} references")]
    LengthMismatch { generated: usize, references: usize },
    #[error("metric '{name}' unavailable: {source}")]
    MetricUnavailable {
        name: String,
        #[source]
        source: MetricError,
    },
}
